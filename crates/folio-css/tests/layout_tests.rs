//! End-to-end layout tests: build a document, run the full pass pipeline,
//! assert fragment geometry.
//!
//! All tests use the fixed-ratio metrics (0.6 × font size per character,
//! 1.2 × line advance) so every expected coordinate is exact arithmetic.

use std::rc::Rc;

use folio_css::{
    BoxId, BoxTree, ElementKind, FixedMetrics, LayoutEnv, NoResources, PageState, Stylesheet,
    UniformPages, layout_document, structure, whitespace,
};
use folio_dom::{AttributeMap, ElementTree, NodeId};

const FONT: f32 = 16.0;
const CHAR: f32 = FONT * 0.6;
const LINE: f32 = FONT * 1.2;

fn styled(style: &str) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    if !style.is_empty() {
        let _ = attrs.insert("style".to_string(), style.to_string());
    }
    attrs
}

fn layout(doc: &ElementTree, page_width: f32, page_height: f32) -> (BoxTree, PageState) {
    let mut tree = BoxTree::build(doc);
    tree.bind_stylesheet(Rc::new(Stylesheet::new()));
    structure::apply(&mut tree);
    tree.resolve_fonts();
    whitespace::normalize(&mut tree);

    let geometry = UniformPages::new(page_width, page_height);
    let env = LayoutEnv {
        measurer: &FixedMetrics,
        geometry: &geometry,
        resources: &NoResources,
    };
    let state = layout_document(&mut tree, &env, 0.0, None).expect("layout");
    (tree, state)
}

fn relayout(tree: &mut BoxTree, page_width: f32, page_height: f32) -> PageState {
    tree.reset_layout();
    let geometry = UniformPages::new(page_width, page_height);
    let env = LayoutEnv {
        measurer: &FixedMetrics,
        geometry: &geometry,
        resources: &NoResources,
    };
    layout_document(tree, &env, 0.0, None).expect("layout")
}

/// Depth-first search for the first box of a given element kind.
fn find_kind(tree: &BoxTree, kind: ElementKind) -> BoxId {
    tree.iter_ids()
        .find(|&id| tree.node(id).element_kind() == Some(kind))
        .expect("element present")
}

fn find_text(tree: &BoxTree, needle: &str) -> BoxId {
    tree.iter_ids()
        .find(|&id| tree.node(id).is_text() && tree.node(id).text.contains(needle))
        .expect("text node present")
}

#[test]
fn sibling_margins_collapse_to_the_larger() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let _ = doc.append_element(html, "div", styled("height: 30px; margin-bottom: 10px"));
    let _ = doc.append_element(html, "div", styled("height: 30px; margin-top: 20px"));

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let root = tree.root().unwrap();
    let first = tree.node(root).children[0];
    let second = tree.node(root).children[1];

    let first_bottom = tree.node(first).block_fragments[0].bottom();
    let second_top = tree.node(second).block_fragments[0].y;
    // max(10, 20), not 10 + 20.
    assert!(
        ((second_top - first_bottom) - 20.0).abs() < 0.01,
        "gap was {}",
        second_top - first_bottom
    );
}

#[test]
fn page_break_before_starts_a_new_page_at_top() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let _ = doc.append_element(html, "div", styled("height: 100px"));
    let _ = doc.append_element(
        html,
        "div",
        styled("height: 50px; page-break-before: always"),
    );

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let root = tree.root().unwrap();
    let second = tree.node(root).children[1];
    let fragment = tree.node(second).block_fragments[0];
    assert_eq!(fragment.page, 1);
    assert!(fragment.y.abs() < 0.01);
}

#[test]
fn oversized_word_overflows_without_truncation() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let div = doc.append_element(html, "div", styled("width: 100px"));
    let _ = doc.append_text(div, "tiny extraordinarily");

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let div_box = find_kind(&tree, ElementKind::Div);
    let text = find_text(&tree, "extraordinarily");

    // The box keeps its declared width.
    assert!((tree.node(div_box).block_fragments[0].width - 100.0).abs() < 0.01);

    // "tiny" fits on the first line; "extraordinarily" (15 chars = 144px)
    // breaks to its own line and overflows at full measure.
    let fragments = &tree.node(text).inline_fragments;
    assert_eq!(fragments.len(), 2);
    let long = &fragments[1];
    assert!((long.width - 15.0 * CHAR).abs() < 0.01);
    assert!(long.width > 100.0);
    assert!(long.y > fragments[0].y);
}

#[test]
fn text_flows_across_pages() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let div = doc.append_element(html, "div", AttributeMap::new());
    // 8 lines of one word each: "word" is 38.4px, the band is 40px.
    let _ = doc.append_text(div, &"word ".repeat(8));

    let (tree, state) = layout(&doc, 40.0, 4.5 * LINE);
    assert_eq!(state.page, 1);

    let text = find_text(&tree, "word");
    let pages: Vec<usize> = tree
        .node(text)
        .inline_fragments
        .iter()
        .map(|f| f.page)
        .collect();
    assert_eq!(pages, vec![0, 0, 0, 0, 1, 1, 1, 1]);

    // The block wrapping the text owns one fragment per page it spans.
    let div_box = find_kind(&tree, ElementKind::Div);
    let block_pages: Vec<usize> = tree
        .node(div_box)
        .block_fragments
        .iter()
        .map(|f| f.page)
        .collect();
    assert_eq!(block_pages, vec![0, 1]);
}

#[test]
fn block_fragments_never_overlap_on_a_page() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let div = doc.append_element(html, "div", AttributeMap::new());
    let _ = doc.append_text(div, &"word ".repeat(20));

    let (tree, _) = layout(&doc, 40.0, 5.0 * LINE);
    for id in tree.iter_ids() {
        let fragments = &tree.node(id).block_fragments;
        for (i, a) in fragments.iter().enumerate() {
            for b in fragments.iter().skip(i + 1) {
                if a.page == b.page {
                    let disjoint = a.bottom() <= b.y + 0.01 || b.bottom() <= a.y + 0.01;
                    assert!(disjoint, "fragments overlap: {a:?} vs {b:?}");
                }
            }
        }
        // A node never carries both kinds of fragments.
        assert!(
            tree.node(id).block_fragments.is_empty()
                || tree.node(id).inline_fragments.is_empty()
        );
    }
}

#[test]
fn layout_is_idempotent() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let div = doc.append_element(html, "div", styled("margin: 10px; padding: 4px"));
    let _ = doc.append_text(div, &"repeatable content ".repeat(12));
    let table = doc.append_element(html, "table", AttributeMap::new());
    let tr = doc.append_element(table, "tr", AttributeMap::new());
    let td = doc.append_element(tr, "td", AttributeMap::new());
    let _ = doc.append_text(td, "cell");

    let (mut tree, _) = layout(&doc, 300.0, 200.0);
    let first: Vec<_> = tree
        .iter_ids()
        .map(|id| {
            (
                tree.node(id).block_fragments.clone(),
                tree.node(id).inline_fragments.clone(),
            )
        })
        .collect();

    let _ = relayout(&mut tree, 300.0, 200.0);
    let second: Vec<_> = tree
        .iter_ids()
        .map(|id| {
            (
                tree.node(id).block_fragments.clone(),
                tree.node(id).inline_fragments.clone(),
            )
        })
        .collect();

    assert_eq!(first, second);
}

#[test]
fn left_float_narrows_the_line_band() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let div = doc.append_element(html, "div", AttributeMap::new());
    let _ = doc.append_element(div, "div", styled("float: left; width: 50px; height: 40px"));
    let _ = doc.append_text(div, "abc def");

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let text = find_text(&tree, "abc");
    let first = &tree.node(text).inline_fragments[0];
    assert!((first.x - 50.0).abs() < 0.01, "line started at {}", first.x);
}

#[test]
fn cell_with_percent_width_resolves_against_the_table() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let table = doc.append_element(html, "table", AttributeMap::new());
    let tr = doc.append_element(table, "tr", AttributeMap::new());
    let td = doc.append_element(tr, "td", styled("width: 50%"));
    let _ = doc.append_text(td, "x");

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let td_box = find_kind(&tree, ElementKind::Td);
    let fragment = tree.node(td_box).block_fragments[0];
    assert!(
        (fragment.width - 200.0).abs() < 0.01,
        "cell width was {}",
        fragment.width
    );
}

#[test]
fn column_widths_sum_to_the_table_target() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let table = doc.append_element(
        html,
        "table",
        styled("width: 300px; border-spacing: 2px"),
    );
    for row in 0..2 {
        let tr = doc.append_element(table, "tr", AttributeMap::new());
        let td1 = doc.append_element(tr, "td", AttributeMap::new());
        let _ = doc.append_text(td1, if row == 0 { "left side" } else { "l" });
        let td2 = doc.append_element(tr, "td", AttributeMap::new());
        let _ = doc.append_text(td2, "right");
    }

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let rows: Vec<BoxId> = tree
        .iter_ids()
        .filter(|&id| tree.node(id).element_kind() == Some(ElementKind::Tr))
        .collect();
    for row in rows {
        let cells: Vec<f32> = tree
            .node(row)
            .children
            .iter()
            .filter(|&&c| tree.node(c).element_kind() == Some(ElementKind::Td))
            .map(|&c| tree.node(c).block_fragments[0].width)
            .collect();
        assert_eq!(cells.len(), 2);
        // Two cells plus three inter-column gaps equal the table width.
        let total: f32 = cells.iter().sum::<f32>() + 3.0 * 2.0;
        assert!(
            (total - 300.0).abs() < 0.1,
            "row total was {total} ({cells:?})"
        );
    }
}

#[test]
fn rowspan_cell_spans_the_accumulated_row_heights() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let table = doc.append_element(html, "table", styled("border-spacing: 0"));
    let tr1 = doc.append_element(table, "tr", AttributeMap::new());
    let mut span_attrs = styled("");
    let _ = span_attrs.insert("rowspan".to_string(), "2".to_string());
    let tall = doc.append_element(tr1, "td", span_attrs);
    let _ = doc.append_text(tall, "s");
    let a = doc.append_element(tr1, "td", styled("height: 30px"));
    let _ = doc.append_text(a, "a");
    let tr2 = doc.append_element(table, "tr", AttributeMap::new());
    let b = doc.append_element(tr2, "td", styled("height: 40px"));
    let _ = doc.append_text(b, "b");

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let tall_box = tree
        .iter_ids()
        .find(|&id| tree.node(id).cell_slot.is_some_and(|s| s.rowspan == 2))
        .unwrap();
    let fragment = tree.node(tall_box).block_fragments[0];
    assert!(
        (fragment.height - 70.0).abs() < 0.5,
        "rowspan cell height was {}",
        fragment.height
    );
}

#[test]
fn absolute_all_auto_uses_static_position_and_shrinks_to_fit() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let container = doc.append_element(
        html,
        "div",
        styled("position: relative; height: 100px; margin-top: 40px"),
    );
    let abs = doc.append_element(container, "div", styled("position: absolute"));
    let _ = doc.append_text(abs, "hi");

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let container_box = tree.node(tree.root().unwrap()).children[0];
    let abs_box = tree.node(container_box).children[0];

    let container_fragment = tree.node(container_box).block_fragments[0];
    let fragment = tree.node(abs_box).block_fragments[0];
    // Static position: the container's content origin.
    assert!((fragment.x - container_fragment.x).abs() < 0.01);
    assert!((fragment.y - container_fragment.y).abs() < 0.01);
    // Shrink-to-fit: exactly "hi".
    assert!((fragment.width - 2.0 * CHAR).abs() < 0.01);
}

#[test]
fn absolute_with_offsets_positions_against_containing_block() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let container = doc.append_element(
        html,
        "div",
        styled("position: relative; height: 200px"),
    );
    let abs = doc.append_element(
        container,
        "div",
        styled("position: absolute; left: 10px; top: 20px; width: 60px"),
    );
    let _ = doc.append_text(abs, "x");

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let container_box = tree.node(tree.root().unwrap()).children[0];
    let abs_box = tree.node(container_box).children[0];
    let fragment = tree.node(abs_box).block_fragments[0];
    assert!((fragment.x - 10.0).abs() < 0.01);
    assert!((fragment.y - 20.0).abs() < 0.01);
    assert!((fragment.width - 60.0).abs() < 0.01);
}

#[test]
fn centered_block_with_auto_margins() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let _ = doc.append_element(
        html,
        "div",
        styled("width: 100px; height: 10px; margin-left: auto; margin-right: auto"),
    );

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let div_box = find_kind(&tree, ElementKind::Div);
    let fragment = tree.node(div_box).block_fragments[0];
    assert!((fragment.x - 150.0).abs() < 0.01);
}

#[test]
fn text_align_right_anchors_to_band_end() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let div = doc.append_element(html, "div", styled("text-align: right"));
    let _ = doc.append_text(div, "abcde");

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let text = find_text(&tree, "abcde");
    let fragment = &tree.node(text).inline_fragments[0];
    assert!(((fragment.x + fragment.width) - 400.0).abs() < 0.01);
}

#[test]
fn empty_block_leaves_a_zero_height_anchor() {
    let mut doc = ElementTree::new();
    let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
    let _ = doc.append_element(html, "div", AttributeMap::new());

    let (tree, _) = layout(&doc, 400.0, 600.0);
    let div_box = find_kind(&tree, ElementKind::Div);
    let fragments = &tree.node(div_box).block_fragments;
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].height.abs() < 0.01);
}
