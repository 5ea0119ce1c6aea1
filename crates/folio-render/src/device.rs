//! Painting-side device interfaces.
//!
//! The layout crate only measures; painting needs the drawing half of the
//! surface. A [`Device`] is one page's paint target, handed out by a
//! [`PageProvider`] in increasing page order and finalized page by page.

use folio_css::style::Stylesheet;
use folio_css::{Color, FontSpec, PageGeometry, TextMeasurer};

/// A paint surface for one page.
///
/// Extends [`TextMeasurer`] so a device can serve as the measuring surface
/// during layout as well.
pub trait Device: TextMeasurer {
    /// Fill a rectangle with a color.
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color);

    /// Stroke a line of the given width between two points.
    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Color);

    /// Draw text with its baseline at `y`.
    fn draw_text(&mut self, font: &FontSpec, x: f32, y: f32, text: &str, color: Color);

    /// Draw the image at `src` scaled into the given rectangle.
    fn draw_image(&mut self, src: &str, x: f32, y: f32, width: f32, height: f32);

    /// Push the current transform state.
    fn save(&mut self);

    /// Pop to the previously saved transform state.
    fn restore(&mut self);

    /// Offset all subsequent drawing.
    fn translate(&mut self, dx: f32, dy: f32);
}

/// The per-page surface factory.
///
/// Pages are requested in increasing index order; each `start_page` is
/// paired with one `end_page` after painting finishes.
pub trait PageProvider: PageGeometry {
    /// Open the paint surface for `page`.
    fn start_page(&mut self, page: usize) -> &mut dyn Device;

    /// Finalize the surface opened for `page`.
    fn end_page(&mut self, page: usize);
}

/// External CSS frontend: turns `<style>` text into a stylesheet.
pub trait CssParser {
    /// Parse a stylesheet from raw CSS text. Unparseable constructs are
    /// the frontend's business; the engine takes whatever rulesets come
    /// back.
    fn parse_stylesheet(&self, css: &str) -> Stylesheet;
}
