//! Interfaces to the measuring/painting surface and the page geometry.
//!
//! Layout never touches a concrete canvas: it measures text through
//! [`TextMeasurer`], reads page dimensions through [`PageGeometry`], and asks
//! [`ResourceResolver`] for intrinsic image sizes. The paint layer extends
//! these with drawing operations (see `folio-render`).

use serde::Serialize;

/// [§ 3.2 font-weight](https://www.w3.org/TR/css-fonts-4/#font-weight-prop)
///
/// Numeric weight: 400 = normal, 700 = bold.
pub type FontWeight = u16;

/// [§ 3.3 font-style](https://www.w3.org/TR/css-fonts-4/#font-style-prop)
///
/// "The font-style property allows italic or oblique faces to be selected."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FontStyle {
    /// Upright glyphs.
    #[default]
    Normal,
    /// Italic or oblique glyphs.
    Italic,
}

/// A resolved font request: everything a device needs to pick a face and
/// size for measurement or drawing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontSpec {
    /// Requested family list, as written in CSS.
    pub family: String,
    /// Font size in pixels.
    pub size: f32,
    /// Numeric weight (400 normal, 700 bold).
    pub weight: FontWeight,
    /// Upright or italic.
    pub style: FontStyle,
}

impl Default for FontSpec {
    fn default() -> Self {
        FontSpec {
            family: String::new(),
            size: crate::style::values::DEFAULT_FONT_SIZE_PX,
            weight: 400,
            style: FontStyle::Normal,
        }
    }
}

/// Vertical font metrics for a [`FontSpec`].
///
/// [§ 10.8 Line height calculations](https://www.w3.org/TR/CSS2/visudet.html#line-height)
///
/// "CSS assumes that every font has font metrics that specify a
/// characteristic height above the baseline and a depth below it."
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FontMetrics {
    /// Distance from the baseline to the top of the ascent box.
    pub ascent: f32,
    /// Total glyph box height (ascent + descent).
    pub height: f32,
    /// Extra vertical space added to each line beyond `height`.
    pub leading: f32,
}

impl FontMetrics {
    /// The advance from one baseline to the next.
    #[must_use]
    pub fn line_height(&self) -> f32 {
        self.height + self.leading
    }
}

/// Result of measuring a text run against an optional width limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMeasurement {
    /// Byte length of the prefix that fits (whole breakable units only).
    /// Includes any whitespace consumed after the last fitting unit.
    pub consumed: usize,
    /// Advance width of the fitting prefix, trailing whitespace excluded.
    pub width: f32,
    /// Advance width of the fitting prefix plus the next breakable unit,
    /// or 0.0 when the text was fully consumed. Lets the caller decide
    /// whether to break the line or let the next unit overflow.
    pub next_width: f32,
}

/// Text measurement interface used during layout.
pub trait TextMeasurer {
    /// Measure `text` in `font`.
    ///
    /// With `max_width`, returns the longest prefix of whole
    /// whitespace-delimited units that fits; without, measures the whole
    /// string (`consumed == text.len()`, `next_width == 0`).
    fn measure_text(&self, font: &FontSpec, text: &str, max_width: Option<f32>)
    -> TextMeasurement;

    /// Vertical metrics for `font`.
    fn font_metrics(&self, font: &FontSpec) -> FontMetrics;
}

/// A page edge, for margin lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    /// Top edge.
    Top,
    /// Right edge.
    Right,
    /// Bottom edge.
    Bottom,
    /// Left edge.
    Left,
}

/// Page dimensions and margins, per page index.
///
/// Pages may differ in size (e.g. a landscape insert); the engine asks per
/// index.
pub trait PageGeometry {
    /// Full page width for `page`.
    fn page_width(&self, page: usize) -> f32;
    /// Full page height for `page`.
    fn page_height(&self, page: usize) -> f32;
    /// Margin for one edge, identical across pages.
    fn margin(&self, side: Side) -> f32;
}

/// Resolves intrinsic dimensions for replaced content.
pub trait ResourceResolver {
    /// Intrinsic `(width, height)` of the resource at `src`, or `None` if
    /// it cannot be resolved.
    fn intrinsic_size(&self, src: &str) -> Option<(f32, f32)>;
}

/// A resolver that knows nothing; images fall back to attribute sizes or a
/// default placeholder size.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResources;

impl ResourceResolver for NoResources {
    fn intrinsic_size(&self, _src: &str) -> Option<(f32, f32)> {
        None
    }
}

/// Shared word-fitting algorithm for [`TextMeasurer`] implementations.
///
/// Splits `text` at ASCII whitespace and accumulates whole units while the
/// advance (per `advance`, which measures a string slice) stays within
/// `max_width`. Returns the standard measurement triple.
pub fn measure_breakable<F>(advance: F, text: &str, max_width: Option<f32>) -> TextMeasurement
where
    F: Fn(&str) -> f32,
{
    let Some(max_width) = max_width else {
        return TextMeasurement {
            consumed: text.len(),
            width: advance(text.trim_end()),
            next_width: 0.0,
        };
    };

    let mut consumed = 0usize;
    let mut width = 0.0f32;
    let mut next_width = 0.0f32;

    // Walk unit by unit: a unit is a run of non-space bytes plus the
    // whitespace that follows it.
    let bytes = text.as_bytes();
    let mut pos = 0usize;
    while pos < text.len() {
        let unit_start = pos;
        while pos < text.len() && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let unit_end = pos;
        while pos < text.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let prefix_width = advance(text[..unit_end].trim_end());
        if prefix_width <= max_width || unit_end == unit_start {
            consumed = pos;
            width = prefix_width;
        } else {
            next_width = prefix_width;
            break;
        }
    }

    TextMeasurement {
        consumed,
        width,
        next_width,
    }
}

/// Fixed-ratio metrics for tests and font-less fallback.
///
/// Every glyph advances 0.6× the font size (a typical proportional-font
/// average); ascent is 0.8×, descent 0.2×, leading 0.2×. Deterministic by
/// construction, which is what geometry tests need.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMetrics;

impl FixedMetrics {
    /// The advance-per-character ratio.
    pub const CHAR_WIDTH_RATIO: f32 = 0.6;

    fn advance(font_size: f32, text: &str) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let chars = text.chars().count() as f32;
        chars * font_size * Self::CHAR_WIDTH_RATIO
    }
}

impl TextMeasurer for FixedMetrics {
    fn measure_text(
        &self,
        font: &FontSpec,
        text: &str,
        max_width: Option<f32>,
    ) -> TextMeasurement {
        measure_breakable(|s| Self::advance(font.size, s), text, max_width)
    }

    fn font_metrics(&self, font: &FontSpec) -> FontMetrics {
        FontMetrics {
            ascent: font.size * 0.8,
            height: font.size,
            leading: font.size * 0.2,
        }
    }
}

/// Uniform page geometry: every page has the same size and margins.
#[derive(Debug, Clone, Copy)]
pub struct UniformPages {
    /// Page width.
    pub width: f32,
    /// Page height.
    pub height: f32,
    /// Margins as `[top, right, bottom, left]`.
    pub margins: [f32; 4],
}

impl UniformPages {
    /// Uniform pages with no margins.
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        UniformPages {
            width,
            height,
            margins: [0.0; 4],
        }
    }

    /// Uniform pages with the same margin on every edge.
    #[must_use]
    pub const fn with_margin(width: f32, height: f32, margin: f32) -> Self {
        UniformPages {
            width,
            height,
            margins: [margin; 4],
        }
    }
}

impl PageGeometry for UniformPages {
    fn page_width(&self, _page: usize) -> f32 {
        self.width
    }

    fn page_height(&self, _page: usize) -> f32 {
        self.height
    }

    fn margin(&self, side: Side) -> f32 {
        match side {
            Side::Top => self.margins[0],
            Side::Right => self.margins[1],
            Side::Bottom => self.margins[2],
            Side::Left => self.margins[3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font(size: f32) -> FontSpec {
        FontSpec {
            size,
            ..FontSpec::default()
        }
    }

    #[test]
    fn measures_whole_string_without_limit() {
        let m = FixedMetrics.measure_text(&font(10.0), "ab cd", None);
        assert_eq!(m.consumed, 5);
        assert!((m.width - 5.0 * 6.0).abs() < 0.01);
        assert_eq!(m.next_width, 0.0);
    }

    #[test]
    fn breaks_at_word_boundaries() {
        // Each char is 6px at size 10. "ab cd ef" widths: "ab"=12,
        // "ab cd"=30, "ab cd ef"=48.
        let m = FixedMetrics.measure_text(&font(10.0), "ab cd ef", Some(35.0));
        assert_eq!(&"ab cd ef"[..m.consumed], "ab cd ");
        assert!((m.width - 30.0).abs() < 0.01);
        assert!((m.next_width - 48.0).abs() < 0.01);
    }

    #[test]
    fn first_unit_reported_when_nothing_fits() {
        let m = FixedMetrics.measure_text(&font(10.0), "wide word", Some(5.0));
        assert_eq!(m.consumed, 0);
        assert_eq!(m.width, 0.0);
        assert!((m.next_width - 24.0).abs() < 0.01);
    }

    #[test]
    fn trailing_space_excluded_from_width() {
        let m = FixedMetrics.measure_text(&font(10.0), "ab ", Some(100.0));
        assert_eq!(m.consumed, 3);
        assert!((m.width - 12.0).abs() < 0.01);
    }
}
