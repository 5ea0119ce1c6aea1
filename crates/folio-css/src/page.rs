//! The page-flow cursor.
//!
//! One [`PageState`] threads through every layout call: the current vertical
//! position, the current page, the horizontal band content may occupy, and
//! the floats that still intrude into it. It is the single source of
//! pagination truth — nothing else decides when a page ends.

use serde::Serialize;

use crate::device::{PageGeometry, Side};
use crate::error::LayoutError;
use crate::tree::{BoxId, BoxTree};

/// The mutable layout cursor.
///
/// Invariant: `min_x <= max_x` after any mutation; the band setters clamp
/// to keep it. The floats list holds only floats not yet vertically
/// cleared, in encounter order.
#[derive(Debug, Clone, Serialize)]
pub struct PageState {
    /// Current vertical offset on the current page.
    pub y: f32,
    /// Current page index.
    pub page: usize,
    /// Left edge of the current horizontal band.
    pub min_x: f32,
    /// Right edge of the current horizontal band.
    pub max_x: f32,
    /// Pending floats, in the order they were placed.
    pub floats: Vec<BoxId>,
    /// Rightmost extent content has reached, for width-convergence
    /// measurement by the driver.
    pub widest: f32,
    /// A band that replaces the per-page content band on every page, used
    /// for the driver's widened re-layout passes.
    pub band_override: Option<(f32, f32)>,
}

impl PageState {
    /// A cursor at the top of `page`'s content area.
    ///
    /// # Errors
    ///
    /// [`LayoutError::DegeneratePage`] when the page has no usable content
    /// height.
    pub fn at_page_top(geometry: &dyn PageGeometry, page: usize) -> Result<Self, LayoutError> {
        let mut state = PageState {
            y: geometry.margin(Side::Top),
            page,
            min_x: 0.0,
            max_x: 0.0,
            floats: Vec::new(),
            widest: 0.0,
            band_override: None,
        };
        state.reset_band(geometry);
        state.check_usable(geometry)?;
        Ok(state)
    }

    /// A free-standing cursor pinned to a band, for scratch layouts:
    /// float slots, table cells, probes, absolute boxes.
    #[must_use]
    pub fn detached(page: usize, y: f32, min_x: f32, max_x: f32) -> Self {
        PageState {
            y,
            page,
            min_x,
            max_x: max_x.max(min_x),
            floats: Vec::new(),
            widest: 0.0,
            band_override: None,
        }
    }

    /// Width of the current band.
    #[must_use]
    pub fn band_width(&self) -> f32 {
        self.max_x - self.min_x
    }

    /// Set the band, clamping so `min_x <= max_x` holds.
    pub fn set_band(&mut self, min_x: f32, max_x: f32) {
        self.min_x = min_x;
        self.max_x = max_x.max(min_x);
    }

    /// Reset the band to the full content area of the current page, or to
    /// the override band when one is pinned.
    pub fn reset_band(&mut self, geometry: &dyn PageGeometry) {
        if let Some((left, right)) = self.band_override {
            self.set_band(left, right);
            return;
        }
        let left = geometry.margin(Side::Left);
        let right = geometry.page_width(self.page) - geometry.margin(Side::Right);
        self.set_band(left, right);
    }

    /// Record that content reached `x`, for the driver's width-convergence
    /// check.
    pub fn record_extent(&mut self, x: f32) {
        self.widest = self.widest.max(x);
    }

    /// The lowest usable y on the current page.
    #[must_use]
    pub fn usable_bottom(&self, geometry: &dyn PageGeometry) -> f32 {
        geometry.page_height(self.page) - geometry.margin(Side::Bottom)
    }

    fn check_usable(&self, geometry: &dyn PageGeometry) -> Result<(), LayoutError> {
        let usable = self.usable_bottom(geometry) - geometry.margin(Side::Top);
        if usable <= 0.0 {
            return Err(LayoutError::DegeneratePage {
                page: self.page,
                usable,
            });
        }
        Ok(())
    }

    /// Advance to the top of the next page.
    ///
    /// Floats whose fragments never reach the new page are dropped; the
    /// band is recomputed from the new page's content area (floats that
    /// carry over keep narrowing it through the float manager, not here).
    ///
    /// # Errors
    ///
    /// [`LayoutError::DegeneratePage`] when the new page has no usable
    /// content height — a forced page advance that cannot make room is
    /// unrecoverable.
    pub fn advance_page(
        &mut self,
        tree: &BoxTree,
        geometry: &dyn PageGeometry,
    ) -> Result<(), LayoutError> {
        self.page += 1;
        self.y = geometry.margin(Side::Top);
        self.check_usable(geometry)?;

        let page = self.page;
        self.floats.retain(|&float_id| {
            tree.node(float_id)
                .block_fragments
                .iter()
                .any(|f| f.page >= page)
        });

        self.reset_band(geometry);
        Ok(())
    }

    /// Whether the cursor sits at the pristine top of its page.
    #[must_use]
    pub fn at_page_top_edge(&self, geometry: &dyn PageGeometry) -> bool {
        (self.y - geometry.margin(Side::Top)).abs() < f32::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::UniformPages;

    #[test]
    fn band_invariant_holds_after_mutation() {
        let geometry = UniformPages::new(400.0, 600.0);
        let mut state = PageState::at_page_top(&geometry, 0).unwrap();
        assert!(state.min_x <= state.max_x);

        state.set_band(300.0, 100.0);
        assert!(state.min_x <= state.max_x);
        assert_eq!(state.band_width(), 0.0);
    }

    #[test]
    fn advance_page_resets_cursor_and_band() {
        let geometry = UniformPages::with_margin(400.0, 600.0, 20.0);
        let tree = BoxTree::build(&folio_dom::ElementTree::new());
        let mut state = PageState::at_page_top(&geometry, 0).unwrap();
        state.y = 500.0;
        state.set_band(100.0, 200.0);

        state.advance_page(&tree, &geometry).unwrap();
        assert_eq!(state.page, 1);
        assert!((state.y - 20.0).abs() < f32::EPSILON);
        assert!((state.min_x - 20.0).abs() < f32::EPSILON);
        assert!((state.max_x - 380.0).abs() < f32::EPSILON);
    }

    #[test]
    fn degenerate_page_is_fatal() {
        let geometry = UniformPages::with_margin(400.0, 30.0, 20.0);
        assert!(matches!(
            PageState::at_page_top(&geometry, 0),
            Err(LayoutError::DegeneratePage { .. })
        ));
    }
}
