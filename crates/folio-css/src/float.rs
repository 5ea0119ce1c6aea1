//! Float placement and clearance.
//!
//! [§ 9.5 Floats](https://www.w3.org/TR/CSS2/visuren.html#floats)
//!
//! "A floated box is shifted to the left or right until its outer edge
//! touches the containing block edge or the outer edge of another float."
//!
//! Floats live on the page cursor as an ordered list of pending box ids;
//! their geometry is read back from the fragments block layout committed.
//! A float stops being pending once the cursor has moved vertically past
//! its bottom edge.

use crate::block::{self, LayoutEnv};
use crate::error::LayoutError;
use crate::page::PageState;
use crate::tree::{BoxId, BoxTree, FloatSide};

/// Band-fitting tolerance: float and table width negotiation accumulate
/// f32 rounding, a fraction of a pixel never changes a layout decision.
pub(crate) const EPSILON: f32 = 0.01;

/// Shrink `band` by every pending float whose fragment covers `(y, page)`.
///
/// "The current and subsequent line boxes created next to the float are
/// shortened as necessary to make room for the margin box of the float."
///
/// Left floats raise the left edge, right floats lower the right edge;
/// returns early once the band is empty.
#[must_use]
pub fn available_band(
    tree: &BoxTree,
    floats: &[BoxId],
    y: f32,
    page: usize,
    band: (f32, f32),
) -> (f32, f32) {
    let (mut left, mut right) = band;

    for &float_id in floats {
        let node = tree.node(float_id);
        let side = node.float_side.unwrap_or(FloatSide::Left);
        for fragment in &node.block_fragments {
            if fragment.page != page {
                continue;
            }
            // Covers the cursor line: top at or above y, bottom below it.
            if fragment.y > y + EPSILON || fragment.bottom() <= y + EPSILON {
                continue;
            }
            match side {
                FloatSide::Left => left = left.max(fragment.right()),
                FloatSide::Right => right = right.min(fragment.x),
            }
        }
        if left >= right {
            return (left, left);
        }
    }

    (left, right)
}

/// Drop every pending float whose bottom fragment lies on or before the
/// current page, advancing the cursor below the bottoms on this page.
///
/// Used by the driver to clear residual floats after the document body,
/// and wherever the flow must continue below all floats.
pub fn clear_floats(tree: &BoxTree, state: &mut PageState) {
    let page = state.page;
    let mut bottom = state.y;
    for &float_id in &state.floats {
        for fragment in &tree.node(float_id).block_fragments {
            if fragment.page == page {
                bottom = bottom.max(fragment.bottom());
            }
        }
    }
    state.y = bottom;
    state.floats.retain(|&float_id| {
        tree.node(float_id)
            .block_fragments
            .iter()
            .any(|f| f.page > page)
    });
}

/// Advance the cursor to the bottom of the earliest pending float (FIFO),
/// repeatedly, until the band at the cursor is at least `min_width` wide
/// or no floats remain.
///
/// # Errors
///
/// [`LayoutError::DegeneratePage`] when following a float onto a page with
/// no usable height.
pub fn clear_floats_for_width(
    tree: &BoxTree,
    state: &mut PageState,
    env: &LayoutEnv<'_>,
    min_width: f32,
) -> Result<(), LayoutError> {
    loop {
        let band = available_band(
            tree,
            &state.floats,
            state.y,
            state.page,
            (state.min_x, state.max_x),
        );
        if band.1 - band.0 + EPSILON >= min_width || state.floats.is_empty() {
            return Ok(());
        }

        let earliest = state.floats[0];
        let last = tree
            .node(earliest)
            .block_fragments
            .iter()
            .max_by_key(|f| f.page)
            .copied();
        match last {
            Some(fragment) if fragment.page > state.page => {
                // The float runs onto a later page: move there.
                state.advance_page(tree, env.geometry)?;
            }
            Some(fragment) => {
                if fragment.page == state.page {
                    state.y = state.y.max(fragment.bottom());
                }
                let _ = state.floats.remove(0);
            }
            None => {
                let _ = state.floats.remove(0);
            }
        }
    }
}

/// Place a float at the left or right edge of the band at or after the
/// current position.
///
/// The cursor is pushed down a line at a time until room for the expected
/// width exists; with no room in an empty band the fallbacks apply: grow
/// the band (`can_grow`), clear floats for width, or place the float
/// overflowing. A float of undetermined width that comes out wider than
/// its slot is retried once at the enlarged width.
pub fn place_float(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    float_id: BoxId,
    state: &mut PageState,
    can_grow: bool,
) -> Result<(), LayoutError> {
    let side = tree.node(float_id).float_side.unwrap_or(FloatSide::Left);
    let declared = block::declared_outer_width(tree, env, float_id, state);
    let undetermined = declared.is_none();
    let mut expected = match declared {
        Some(width) => width,
        None => {
            let band_width = state.band_width();
            block::measure_min_content(tree, env, float_id)?.min(band_width.max(1.0))
        }
    };

    let line_step = env
        .measurer
        .font_metrics(&tree.node(float_id).font)
        .line_height()
        .max(1.0);

    let mut retried = false;
    loop {
        find_room(tree, env, state, expected, line_step, can_grow)?;

        let (left, right) = available_band(
            tree,
            &state.floats,
            state.y,
            state.page,
            (state.min_x, state.max_x),
        );
        let slot_x = match side {
            FloatSide::Left => left,
            FloatSide::Right => (right - expected).max(left),
        };

        let mut float_state = PageState::detached(state.page, state.y, slot_x, slot_x + expected);
        let _ = block::layout_block(
            tree,
            env,
            float_id,
            &mut float_state,
            undetermined,
            0.0,
            false,
            None,
        )?;

        let actual = tree
            .node(float_id)
            .block_fragments
            .iter()
            .map(|f| f.width)
            .fold(0.0_f32, f32::max);
        if undetermined && !retried && actual > expected + EPSILON {
            // Wider than expected with room to grow: retry once.
            retried = true;
            expected = actual;
            tree.reset_subtree_layout(float_id);
            continue;
        }

        state.record_extent(slot_x + actual);
        break;
    }

    state.floats.push(float_id);
    Ok(())
}

/// Push the cursor down until the band fits `width`, falling back to band
/// growth, float clearing, or overflow when even an empty band is too
/// narrow.
fn find_room(
    tree: &BoxTree,
    env: &LayoutEnv<'_>,
    state: &mut PageState,
    width: f32,
    line_step: f32,
    can_grow: bool,
) -> Result<(), LayoutError> {
    loop {
        let (left, right) = available_band(
            tree,
            &state.floats,
            state.y,
            state.page,
            (state.min_x, state.max_x),
        );
        if right - left + EPSILON >= width {
            return Ok(());
        }

        let band_is_empty_of_floats =
            (left - state.min_x).abs() < EPSILON && (right - state.max_x).abs() < EPSILON;
        if band_is_empty_of_floats {
            // No float to wait out: the band itself is too narrow.
            if can_grow {
                let deficit = width - (right - left);
                state.set_band(state.min_x, state.max_x + deficit);
                state.record_extent(state.max_x);
            }
            // Otherwise place overflowing; the caller records the extent.
            return Ok(());
        }

        state.y += line_step;
        if state.y >= state.usable_bottom(env.geometry) {
            state.advance_page(tree, env.geometry)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{BlockFragment, BoxKind, ElementKind};

    fn tree_with_float(side: FloatSide, fragment: BlockFragment) -> (BoxTree, BoxId) {
        let mut tree = BoxTree::build(&folio_dom::ElementTree::new());
        let float_id = tree.alloc(BoxKind::Element(ElementKind::Div));
        {
            let node = tree.node_mut(float_id);
            node.float_side = Some(side);
            node.block_fragments.push(fragment);
        }
        (tree, float_id)
    }

    #[test]
    fn left_float_raises_left_edge() {
        let (tree, float_id) = tree_with_float(
            FloatSide::Left,
            BlockFragment {
                page: 0,
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 50.0,
            },
        );
        let band = available_band(&tree, &[float_id], 20.0, 0, (0.0, 400.0));
        assert!((band.0 - 100.0).abs() < EPSILON);
        assert!((band.1 - 400.0).abs() < EPSILON);
    }

    #[test]
    fn float_does_not_affect_other_pages_or_cleared_bands() {
        let (tree, float_id) = tree_with_float(
            FloatSide::Right,
            BlockFragment {
                page: 0,
                x: 300.0,
                y: 0.0,
                width: 100.0,
                height: 50.0,
            },
        );
        // Below the float's bottom.
        let band = available_band(&tree, &[float_id], 60.0, 0, (0.0, 400.0));
        assert!((band.1 - 400.0).abs() < EPSILON);
        // Other page.
        let band = available_band(&tree, &[float_id], 20.0, 1, (0.0, 400.0));
        assert!((band.1 - 400.0).abs() < EPSILON);
    }

    #[test]
    fn opposing_floats_never_cross() {
        let (mut tree, left_id) = tree_with_float(
            FloatSide::Left,
            BlockFragment {
                page: 0,
                x: 0.0,
                y: 0.0,
                width: 180.0,
                height: 50.0,
            },
        );
        let right_id = tree.alloc(BoxKind::Element(ElementKind::Div));
        {
            let node = tree.node_mut(right_id);
            node.float_side = Some(FloatSide::Right);
            node.block_fragments.push(BlockFragment {
                page: 0,
                x: 250.0,
                y: 10.0,
                width: 150.0,
                height: 50.0,
            });
        }
        let band = available_band(&tree, &[left_id, right_id], 20.0, 0, (0.0, 400.0));
        // Left float right edge (180) never exceeds right float left edge (250).
        assert!(band.0 <= band.1);
        assert!((band.0 - 180.0).abs() < EPSILON);
        assert!((band.1 - 250.0).abs() < EPSILON);
    }

    #[test]
    fn clear_floats_drops_and_descends() {
        let (tree, float_id) = tree_with_float(
            FloatSide::Left,
            BlockFragment {
                page: 0,
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 50.0,
            },
        );
        let mut state = PageState::detached(0, 10.0, 0.0, 400.0);
        state.floats.push(float_id);
        clear_floats(&tree, &mut state);
        assert!((state.y - 50.0).abs() < EPSILON);
        assert!(state.floats.is_empty());
    }
}
