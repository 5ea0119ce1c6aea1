//! The render driver: parse → style → layout → paint, per document.
//!
//! One [`Renderer::render`] call runs the entire pipeline synchronously.
//! Stylesheets bound through the API and collected from in-document
//! `<style>` elements merge in registration order, so later registrations
//! win specificity ties. Layout runs up to twice against progressively
//! widened bands until the measured content width no longer exceeds the
//! offered width; the first overflow is logged once as a warning. Pages
//! are then painted in increasing index order.

use std::rc::Rc;

use folio_common::warning::{clear_warnings, warn_once};
use folio_css::style::Stylesheet;
use folio_css::{
    BoxTree, LayoutEnv, LayoutError, PageGeometry, ResourceResolver, Side, TextMeasurer, float,
    layout_document, structure, whitespace,
};
use folio_dom::ElementTree;
use thiserror::Error;

use crate::device::{CssParser, PageProvider};
use crate::paint;

/// A failure that aborts the whole render call. Recoverable conditions are
/// logged through the warning channel and never reach here.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Layout hit an unrecoverable condition.
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// The top-level engine: owns the bound stylesheet and borrows the
/// external collaborators for the duration of a render.
pub struct Renderer<'a> {
    pages: &'a mut dyn PageProvider,
    measurer: &'a dyn TextMeasurer,
    resources: &'a dyn ResourceResolver,
    css_parser: Option<&'a dyn CssParser>,
    stylesheet: Stylesheet,
}

impl<'a> Renderer<'a> {
    /// A renderer over the given page factory, measuring surface, and
    /// resource resolver.
    pub fn new(
        pages: &'a mut dyn PageProvider,
        measurer: &'a dyn TextMeasurer,
        resources: &'a dyn ResourceResolver,
    ) -> Self {
        Renderer {
            pages,
            measurer,
            resources,
            css_parser: None,
            stylesheet: Stylesheet::new(),
        }
    }

    /// Attach the external CSS frontend used to parse in-document
    /// `<style>` elements. Without one, those elements are skipped.
    #[must_use]
    pub fn with_css_parser(mut self, parser: &'a dyn CssParser) -> Self {
        self.css_parser = Some(parser);
        self
    }

    /// Bind a stylesheet through the API. In-document sheets are appended
    /// after it, so they win specificity ties.
    pub fn set_stylesheet(&mut self, sheet: Stylesheet) {
        self.stylesheet = sheet;
    }

    /// Render `doc` starting at `start_y` on page 0.
    ///
    /// Returns the vertical position after the last content, below any
    /// residual floats.
    ///
    /// # Errors
    ///
    /// [`RenderError`] when layout hits an unrecoverable condition; the
    /// render produces no pages in that case.
    pub fn render(&mut self, doc: &ElementTree, start_y: f32) -> Result<f32, RenderError> {
        clear_warnings();

        // ── Style ──────────────────────────────────────────────────────
        let mut tree = BoxTree::build(doc);
        let mut merged = self.stylesheet.clone();
        if let Some(parser) = self.css_parser {
            for css in collect_style_text(doc) {
                merged.append(parser.parse_stylesheet(&css));
            }
        } else if !collect_style_text(doc).is_empty() {
            warn_once("render", "document has <style> elements but no CSS parser is attached");
        }
        tree.bind_stylesheet(Rc::new(merged));

        // ── Structure ──────────────────────────────────────────────────
        structure::apply(&mut tree);
        tree.resolve_fonts();
        whitespace::normalize(&mut tree);

        // ── Layout, twice if the first pass overflows ──────────────────
        let (end_y, last_page) = {
            let geometry: &dyn PageGeometry = &*self.pages;
            let env = LayoutEnv {
                measurer: self.measurer,
                geometry,
                resources: self.resources,
            };

            let mut state = layout_document(&mut tree, &env, start_y, None)?;
            let offered_right = geometry.page_width(0) - geometry.margin(Side::Right);
            if state.widest > offered_right + 0.01 {
                warn_once(
                    "render",
                    &format!(
                        "content width {:.1}px exceeds the page band, widening",
                        state.widest
                    ),
                );
                let widened = (geometry.margin(Side::Left), state.widest);
                tree.reset_layout();
                state = layout_document(&mut tree, &env, start_y, Some(widened))?;
            }

            float::clear_floats(&tree, &mut state);
            let last_page = tree.last_page().unwrap_or(0).max(state.page);
            (state.y, last_page)
        };

        // ── Paint, in increasing page order ────────────────────────────
        for page in 0..=last_page {
            let device = self.pages.start_page(page);
            paint::paint_page(&mut tree, device, page);
            self.pages.end_page(page);
        }

        Ok(end_y)
    }
}

/// The CSS text of every `<style>` element, in document order.
fn collect_style_text(doc: &ElementTree) -> Vec<String> {
    let mut sheets = Vec::new();
    for id in doc.iter_ids() {
        let Some(element) = doc.as_element(id) else {
            continue;
        };
        if !element.tag.eq_ignore_ascii_case("style") {
            continue;
        }
        let mut css = String::new();
        for &child in doc.children(id) {
            if let Some(text) = doc.as_text(child) {
                css.push_str(text);
            }
        }
        if !css.trim().is_empty() {
            sheets.push(css);
        }
    }
    sheets
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_dom::NodeId;

    #[test]
    fn collects_style_elements_in_document_order() {
        let mut doc = ElementTree::new();
        let html = doc.append_element(NodeId::ROOT, "html", folio_dom::AttributeMap::new());
        let s1 = doc.append_element(html, "style", folio_dom::AttributeMap::new());
        let _ = doc.append_text(s1, "p { color: #111; }");
        let _ = doc.append_element(html, "body", folio_dom::AttributeMap::new());
        let s2 = doc.append_element(html, "style", folio_dom::AttributeMap::new());
        let _ = doc.append_text(s2, "p { color: #222; }");

        let sheets = collect_style_text(&doc);
        assert_eq!(sheets.len(), 2);
        assert!(sheets[0].contains("#111"));
        assert!(sheets[1].contains("#222"));
    }
}
