//! Full-pipeline render tests against a recording device.
//!
//! The recording page set captures every draw call per page, so tests can
//! assert on painted output — page count, paint order, colors — without a
//! rasterizer. Text measurement delegates to the fixed-ratio metrics.

use std::cell::RefCell;
use std::rc::Rc;

use folio_css::style::{SimpleSelector, Stylesheet, parse_declaration_block};
use folio_css::{
    Color, FixedMetrics, FontMetrics, FontSpec, PageGeometry, Side, TextMeasurement, TextMeasurer,
};
use folio_dom::{AttributeMap, ElementTree, NodeId};
use folio_render::device::{CssParser, Device, PageProvider};
use folio_render::{DataUriResolver, Renderer};

#[derive(Debug, Clone, PartialEq)]
enum Draw {
    Rect(f32, f32, f32, f32, Color),
    Text(f32, f32, String),
    Image(String, f32, f32, f32, f32),
}

#[derive(Default)]
struct RecordingDevice {
    draws: Rc<RefCell<Vec<Draw>>>,
}

impl TextMeasurer for RecordingDevice {
    fn measure_text(
        &self,
        font: &FontSpec,
        text: &str,
        max_width: Option<f32>,
    ) -> TextMeasurement {
        FixedMetrics.measure_text(font, text, max_width)
    }

    fn font_metrics(&self, font: &FontSpec) -> FontMetrics {
        FixedMetrics.font_metrics(font)
    }
}

impl Device for RecordingDevice {
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        self.draws.borrow_mut().push(Draw::Rect(x, y, width, height, color));
    }

    fn draw_line(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: Color) {}

    fn draw_text(&mut self, _font: &FontSpec, x: f32, y: f32, text: &str, _color: Color) {
        self.draws.borrow_mut().push(Draw::Text(x, y, text.to_string()));
    }

    fn draw_image(&mut self, src: &str, x: f32, y: f32, width: f32, height: f32) {
        self.draws
            .borrow_mut()
            .push(Draw::Image(src.to_string(), x, y, width, height));
    }

    fn save(&mut self) {}

    fn restore(&mut self) {}

    fn translate(&mut self, _: f32, _: f32) {}
}

/// Uniform pages that hand out recording devices and keep each page's
/// draw log.
struct RecordingPages {
    width: f32,
    height: f32,
    current: Option<RecordingDevice>,
    pages: Vec<Vec<Draw>>,
}

impl RecordingPages {
    fn new(width: f32, height: f32) -> Self {
        RecordingPages {
            width,
            height,
            current: None,
            pages: Vec::new(),
        }
    }
}

impl PageGeometry for RecordingPages {
    fn page_width(&self, _page: usize) -> f32 {
        self.width
    }

    fn page_height(&self, _page: usize) -> f32 {
        self.height
    }

    fn margin(&self, _side: Side) -> f32 {
        0.0
    }
}

impl PageProvider for RecordingPages {
    fn start_page(&mut self, _page: usize) -> &mut dyn Device {
        self.current = Some(RecordingDevice::default());
        self.current.as_mut().expect("page just created")
    }

    fn end_page(&mut self, _page: usize) {
        if let Some(device) = self.current.take() {
            self.pages.push(device.draws.borrow().clone());
        }
    }
}

/// Just enough CSS parsing for tests: `selector { decls }` blocks with
/// comma-separated simple selectors.
struct TestCss;

impl CssParser for TestCss {
    fn parse_stylesheet(&self, css: &str) -> Stylesheet {
        let mut sheet = Stylesheet::new();
        for block in css.split('}') {
            let Some((selectors, decls)) = block.split_once('{') else {
                continue;
            };
            let declarations = parse_declaration_block(decls);
            for selector in selectors.split(',') {
                if let Some(parsed) = SimpleSelector::parse(selector) {
                    sheet.push(Rc::new(parsed), declarations.clone());
                }
            }
        }
        sheet
    }
}

fn doc_with_body(build: impl FnOnce(&mut ElementTree, NodeId)) -> ElementTree {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    build(&mut doc, html);
    doc
}

#[test]
fn renders_text_onto_the_first_page() {
    let doc = doc_with_body(|doc, html| {
        let p = doc.append_element(html, "p", AttributeMap::new());
        let _ = doc.append_text(p, "hello world");
    });

    let mut pages = RecordingPages::new(400.0, 600.0);
    let resources = DataUriResolver;
    let measurer = FixedMetrics;
    let mut renderer = Renderer::new(&mut pages, &measurer, &resources);
    let end_y = renderer.render(&doc, 0.0).expect("render");

    assert_eq!(pages.pages.len(), 1);
    let texts: Vec<&Draw> = pages.pages[0]
        .iter()
        .filter(|d| matches!(d, Draw::Text(..)))
        .collect();
    assert_eq!(texts.len(), 1);
    if let Draw::Text(_, _, text) = texts[0] {
        assert_eq!(text, "hello world");
    }
    assert!(end_y > 0.0);
}

#[test]
fn multi_page_content_paints_every_page_in_order() {
    let doc = doc_with_body(|doc, html| {
        for _ in 0..3 {
            let _ = doc.append_element(html, "div", {
                let mut attrs = AttributeMap::new();
                let _ = attrs.insert("style".to_string(), "height: 90px".to_string());
                attrs
            });
        }
    });

    // 100px pages: three 90px blocks → pages 0, 1, 2... block two crosses
    // into page 1, block three into page 2.
    let mut pages = RecordingPages::new(200.0, 100.0);
    let resources = DataUriResolver;
    let measurer = FixedMetrics;
    let mut renderer = Renderer::new(&mut pages, &measurer, &resources);
    let _ = renderer.render(&doc, 0.0).expect("render");

    assert_eq!(pages.pages.len(), 3);
}

#[test]
fn document_stylesheet_wins_ties_against_api_stylesheet() {
    let doc = doc_with_body(|doc, html| {
        let style = doc.append_element(html, "style", AttributeMap::new());
        let _ = doc.append_text(style, "p { background-color: #222222; }");
        let p = doc.append_element(html, "p", AttributeMap::new());
        let _ = doc.append_text(p, "x");
    });

    let mut pages = RecordingPages::new(400.0, 600.0);
    let resources = DataUriResolver;
    let measurer = FixedMetrics;
    let parser = TestCss;
    let mut renderer = Renderer::new(&mut pages, &measurer, &resources).with_css_parser(&parser);
    renderer.set_stylesheet(TestCss.parse_stylesheet("p { background-color: #111111; }"));
    let _ = renderer.render(&doc, 0.0).expect("render");

    // The in-document sheet registered later, so its background wins the
    // specificity tie.
    let winner = Color::rgb(0x22, 0x22, 0x22);
    let loser = Color::rgb(0x11, 0x11, 0x11);
    let rects: Vec<&Draw> = pages.pages[0]
        .iter()
        .filter(|d| matches!(d, Draw::Rect(..)))
        .collect();
    assert!(rects.iter().any(|d| matches!(d, Draw::Rect(_, _, _, _, c) if *c == winner)));
    assert!(!rects.iter().any(|d| matches!(d, Draw::Rect(_, _, _, _, c) if *c == loser)));
}

#[test]
fn overwide_content_triggers_the_widened_second_pass() {
    let doc = doc_with_body(|doc, html| {
        let mut attrs = AttributeMap::new();
        let _ = attrs.insert(
            "style".to_string(),
            "width: 500px; height: 20px; background-color: #333333".to_string(),
        );
        let _ = doc.append_element(html, "div", attrs);
    });

    let mut pages = RecordingPages::new(400.0, 600.0);
    let resources = DataUriResolver;
    let measurer = FixedMetrics;
    let mut renderer = Renderer::new(&mut pages, &measurer, &resources);
    let _ = renderer.render(&doc, 0.0).expect("render");

    // The declared 500px box is painted at full width even though the
    // page offers only 400px.
    let color = Color::rgb(0x33, 0x33, 0x33);
    assert!(pages.pages[0].iter().any(
        |d| matches!(d, Draw::Rect(_, _, w, _, c) if *c == color && (*w - 500.0).abs() < 0.01)
    ));
}

#[test]
fn inline_data_uri_image_lays_out_at_intrinsic_size() {
    // A 1x1 transparent PNG, scaled nowhere: intrinsic 1x1.
    let png = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
    let doc = doc_with_body(|doc, html| {
        let p = doc.append_element(html, "p", AttributeMap::new());
        let mut attrs = AttributeMap::new();
        let _ = attrs.insert("src".to_string(), png.to_string());
        let _ = doc.append_element(p, "img", attrs);
    });

    let mut pages = RecordingPages::new(400.0, 600.0);
    let resources = DataUriResolver;
    let measurer = FixedMetrics;
    let mut renderer = Renderer::new(&mut pages, &measurer, &resources);
    let _ = renderer.render(&doc, 0.0).expect("render");

    assert!(pages.pages[0].iter().any(|d| matches!(
        d,
        Draw::Image(_, _, _, w, h) if (*w - 1.0).abs() < 0.01 && (*h - 1.0).abs() < 0.01
    )));
}

#[test]
fn start_y_offsets_the_first_page_only() {
    let doc = doc_with_body(|doc, html| {
        let mut attrs = AttributeMap::new();
        let _ = attrs.insert("style".to_string(), "height: 40px".to_string());
        let _ = doc.append_element(html, "div", attrs);
    });

    let mut pages = RecordingPages::new(400.0, 600.0);
    let resources = DataUriResolver;
    let measurer = FixedMetrics;
    let mut renderer = Renderer::new(&mut pages, &measurer, &resources);
    let end_y = renderer.render(&doc, 100.0).expect("render");

    assert!((end_y - 140.0).abs() < 0.01, "ended at {end_y}");
}
