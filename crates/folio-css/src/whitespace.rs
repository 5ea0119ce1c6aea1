//! Inline whitespace collapsing.
//!
//! [§ 16.6.1 The 'white-space' processing model](https://www.w3.org/TR/CSS2/text.html#white-space-model)
//!
//! Runs of whitespace inside an inline formatting context collapse to a
//! single space; whitespace touching a block boundary disappears entirely.
//! The pass runs once, after the structure pass, and rewrites the text of
//! every text node in place.

use crate::tree::{BoxId, BoxTree};

/// Collapse whitespace across the whole tree.
pub fn normalize(tree: &mut BoxTree) {
    let Some(root) = tree.root() else { return };
    normalize_from(tree, root);
}

fn normalize_from(tree: &mut BoxTree, id: BoxId) {
    if establishes_inline_context(tree, id) {
        normalize_context(tree, id);
    }
    let children = tree.node(id).children.clone();
    for child in children {
        // Inline descendants were handled as part of this context; only
        // block-level subtrees (including floats) start fresh.
        if !tree.node(child).inline || tree.node(child).float_side.is_some() {
            normalize_from(tree, child);
        }
    }
}

/// A block container whose in-flow children are inline-level establishes an
/// inline formatting context.
fn establishes_inline_context(tree: &BoxTree, id: BoxId) -> bool {
    let node = tree.node(id);
    if node.inline {
        return false;
    }
    node.children.iter().any(|&c| tree.node(c).inline)
}

/// Collapse all text inside one inline formatting context, treating its
/// start and end as block boundaries.
fn normalize_context(tree: &mut BoxTree, root: BoxId) {
    let mut text_nodes = Vec::new();
    collect_inline_text(tree, root, &mut text_nodes);

    // A space materializes only between two pieces of content; leading and
    // trailing whitespace of the whole context is dropped. A separator
    // that falls between nodes attaches as a trailing space on the earlier
    // run, where line layout's post-hoc space accounting expects it.
    let mut had_content = false;
    let mut pending_space = false;
    let mut last_content: Option<BoxId> = None;

    for id in text_nodes {
        let source = std::mem::take(&mut tree.node_mut(id).text);
        let mut out = String::with_capacity(source.len());
        for ch in source.chars() {
            if ch.is_whitespace() {
                pending_space = true;
            } else {
                if pending_space && had_content {
                    if out.is_empty() {
                        if let Some(prev) = last_content {
                            tree.node_mut(prev).text.push(' ');
                        }
                    } else {
                        out.push(' ');
                    }
                }
                pending_space = false;
                had_content = true;
                out.push(ch);
            }
        }
        let has_content = !out.is_empty();
        tree.node_mut(id).text = out;
        if has_content {
            last_content = Some(id);
        }
    }
}

fn collect_inline_text(tree: &BoxTree, id: BoxId, out: &mut Vec<BoxId>) {
    for &child in &tree.node(id).children {
        let node = tree.node(child);
        // Floats and absolutely positioned boxes are their own contexts.
        if node.float_side.is_some() || node.position.is_out_of_flow() {
            continue;
        }
        if node.is_text() {
            out.push(child);
        } else if node.inline {
            collect_inline_text(tree, child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::structure;
    use crate::style::Stylesheet;
    use folio_dom::{AttributeMap, ElementTree, NodeId};

    fn normalized(doc: &ElementTree) -> BoxTree {
        let mut tree = BoxTree::build(doc);
        tree.bind_stylesheet(Rc::new(Stylesheet::new()));
        structure::apply(&mut tree);
        normalize(&mut tree);
        tree
    }

    #[test]
    fn collapses_runs_and_trims_boundaries() {
        let mut doc = ElementTree::new();
        let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
        let p = doc.append_element(html, "p", AttributeMap::new());
        let _ = doc.append_text(p, "  hello \n\t world  ");

        let tree = normalized(&doc);
        let root = tree.root().unwrap();
        let p_box = tree.node(root).children[0];
        let text = tree.node(p_box).children[0];
        assert_eq!(tree.node(text).text, "hello world");
    }

    #[test]
    fn space_between_nodes_attaches_to_the_earlier_run() {
        let mut doc = ElementTree::new();
        let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
        let p = doc.append_element(html, "p", AttributeMap::new());
        let _ = doc.append_text(p, "one ");
        let span = doc.append_element(p, "span", AttributeMap::new());
        let _ = doc.append_text(span, "  two");

        let tree = normalized(&doc);
        let root = tree.root().unwrap();
        let p_box = tree.node(root).children[0];
        let first = tree.node(p_box).children[0];
        let span_box = tree.node(p_box).children[1];
        let second = tree.node(span_box).children[0];
        assert_eq!(tree.node(first).text, "one ");
        assert_eq!(tree.node(second).text, "two");
    }

    #[test]
    fn trailing_space_before_block_end_dropped() {
        let mut doc = ElementTree::new();
        let html = doc.append_element(NodeId::ROOT, "html", AttributeMap::new());
        let p = doc.append_element(html, "p", AttributeMap::new());
        let _ = doc.append_text(p, "word   ");

        let tree = normalized(&doc);
        let root = tree.root().unwrap();
        let p_box = tree.node(root).children[0];
        let text = tree.node(p_box).children[0];
        assert_eq!(tree.node(text).text, "word");
    }
}
