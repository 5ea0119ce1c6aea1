//! The display/structure pass.
//!
//! One depth-first walk, children before parent, that fixes everything
//! layout needs to know about the tree's shape before any geometry exists:
//!
//! - float side per node, from `float` or the legacy `align` attribute;
//! - inline vs. block level, from `display` and the per-tag default table;
//! - anonymous block wrappers around maximal runs of inline/float siblings,
//!   so every block container has display-homogeneous children;
//! - offset-parent links for absolutely positioned descendants;
//! - table cell numbering with rowspan/colspan tracking.

use folio_common::warning::warn_once;

use crate::tree::{
    BoxId, BoxKind, BoxTree, CellSlot, ElementKind, FloatSide, PositionScheme, TableGrid,
};

/// Run the full structure pass over the tree.
pub fn apply(tree: &mut BoxTree) {
    let Some(root) = tree.root() else { return };
    resolve_node(tree, root);
    link_offset_parents(tree);
    number_tables(tree);
}

fn resolve_node(tree: &mut BoxTree, id: BoxId) {
    let children = tree.node(id).children.clone();
    for child in children {
        resolve_node(tree, child);
    }

    resolve_float(tree, id);
    resolve_position(tree, id);
    resolve_level(tree, id);
    wrap_mixed_children(tree, id);
}

/// [§ 9.5.1 Positioning the float](https://www.w3.org/TR/CSS2/visuren.html#float-position)
///
/// `float: left|right|none`, with the legacy `align` attribute accepted on
/// images and tables. Unsupported values are logged and ignored.
fn resolve_float(tree: &mut BoxTree, id: BoxId) {
    if let Some(value) = tree.resolved_value(id, "float") {
        match value.as_str() {
            "left" => tree.node_mut(id).float_side = Some(FloatSide::Left),
            "right" => tree.node_mut(id).float_side = Some(FloatSide::Right),
            "none" => tree.node_mut(id).float_side = None,
            other => warn_once("structure", &format!("unsupported float value '{other}'")),
        }
        return;
    }

    let kind = tree.node(id).element_kind();
    if matches!(kind, Some(ElementKind::Img | ElementKind::Table)) {
        if let Some(align) = tree.node(id).attr("align").map(str::to_ascii_lowercase) {
            match align.as_str() {
                "left" => tree.node_mut(id).float_side = Some(FloatSide::Left),
                "right" => tree.node_mut(id).float_side = Some(FloatSide::Right),
                other => {
                    warn_once("structure", &format!("unsupported align value '{other}'"));
                }
            }
        }
    }
}

fn resolve_position(tree: &mut BoxTree, id: BoxId) {
    let Some(value) = tree.resolved_value(id, "position") else {
        return;
    };
    let scheme = match value.as_str() {
        "static" => PositionScheme::Static,
        "relative" => PositionScheme::Relative,
        "absolute" => PositionScheme::Absolute,
        "fixed" => PositionScheme::Fixed,
        other => {
            warn_once("structure", &format!("unsupported position value '{other}'"));
            return;
        }
    };
    tree.node_mut(id).position = scheme;
}

/// [§ 9.2 Controlling box generation](https://www.w3.org/TR/CSS2/visuren.html#box-gen)
///
/// Assign inline vs. block level. Text is always inline. Elements follow
/// the `display` declaration, defaulting per tag; an element declared
/// inline while containing in-flow block children is logged and demoted to
/// the block-safe default.
fn resolve_level(tree: &mut BoxTree, id: BoxId) {
    let inline = match tree.node(id).kind {
        BoxKind::Text => true,
        BoxKind::Anonymous => false,
        BoxKind::Element(kind) => {
            let declared = tree.resolved_value(id, "display");
            match declared.as_deref() {
                Some("inline") => true,
                Some("block") => false,
                Some(other) => {
                    warn_once(
                        "structure",
                        &format!("unsupported display value '{other}', using tag default"),
                    );
                    !kind.default_block()
                }
                None => !kind.default_block(),
            }
        }
    };

    let inline = if inline && has_block_child(tree, id) {
        warn_once(
            "structure",
            &format!(
                "inline element <{}> contains block children, treating as block",
                tree.node(id).tag_name().unwrap_or("?")
            ),
        );
        false
    } else {
        inline
    };

    tree.node_mut(id).inline = inline;
}

fn has_block_child(tree: &BoxTree, id: BoxId) -> bool {
    tree.node(id)
        .children
        .iter()
        .any(|&child| is_block_in_flow(tree, child))
}

/// An in-flow block-level child: not inline, not floated, not absolutely
/// positioned.
fn is_block_in_flow(tree: &BoxTree, id: BoxId) -> bool {
    let node = tree.node(id);
    !node.inline && node.float_side.is_none() && !node.position.is_out_of_flow()
}

/// Whitespace-only text nodes are neutral for homogeneity: they attach to
/// an adjacent inline run or stay as direct children (layout skips empty
/// text in a block context).
fn is_neutral(tree: &BoxTree, id: BoxId) -> bool {
    let node = tree.node(id);
    node.is_text() && node.text.chars().all(char::is_whitespace)
}

/// [§ 9.2.1.1 Anonymous block boxes](https://www.w3.org/TR/CSS2/visuren.html#anonymous-block-level)
///
/// "The line boxes before the break and after the break are enclosed in
/// anonymous block boxes, and the block-level box becomes a sibling of
/// those anonymous boxes."
///
/// Wrap maximal runs of inline/float siblings so block-level parents have
/// homogeneous children.
fn wrap_mixed_children(tree: &mut BoxTree, id: BoxId) {
    let children = tree.node(id).children.clone();
    let has_block = children.iter().any(|&c| is_block_in_flow(tree, c));
    let has_inline = children
        .iter()
        .any(|&c| !is_block_in_flow(tree, c) && !is_neutral(tree, c));
    if !(has_block && has_inline) {
        return;
    }

    let mut rebuilt: Vec<BoxId> = Vec::with_capacity(children.len());
    let mut run: Vec<BoxId> = Vec::new();

    for child in children {
        if is_block_in_flow(tree, child) || (is_neutral(tree, child) && run.is_empty()) {
            flush_run(tree, id, &mut run, &mut rebuilt);
            rebuilt.push(child);
        } else {
            run.push(child);
        }
    }
    flush_run(tree, id, &mut run, &mut rebuilt);

    tree.node_mut(id).children = rebuilt;
}

fn flush_run(tree: &mut BoxTree, parent: BoxId, run: &mut Vec<BoxId>, rebuilt: &mut Vec<BoxId>) {
    if run.is_empty() {
        return;
    }
    let wrapper = tree.alloc(BoxKind::Anonymous);
    {
        let node = tree.node_mut(wrapper);
        node.parent = Some(parent);
        node.inline = false;
    }
    for &child in run.iter() {
        tree.node_mut(child).parent = Some(wrapper);
    }
    tree.node_mut(wrapper).children = std::mem::take(run);
    rebuilt.push(wrapper);
}

/// Link every absolutely/fixed positioned node to its offset parent: the
/// nearest positioned ancestor, or the root when none exists. The offset
/// parent keeps the list of such descendants; both directions are
/// relationships, not ownership.
fn link_offset_parents(tree: &mut BoxTree) {
    let Some(root) = tree.root() else { return };
    let ids: Vec<BoxId> = tree.iter_ids().collect();
    for id in ids {
        if !tree.node(id).position.is_out_of_flow() {
            continue;
        }
        let offset_parent = tree
            .ancestors(id)
            .find(|&a| tree.node(a).position.is_positioned())
            .unwrap_or(root);
        tree.node_mut(id).offset_parent = Some(offset_parent);
        tree.node_mut(offset_parent).abs_descendants.push(id);
    }
}

/// Number the cells of every table and record the grid summary.
///
/// Walks rows in document order; each cell gets the first free column
/// index, skipping columns still covered by an unfinished rowspan from an
/// earlier row.
fn number_tables(tree: &mut BoxTree) {
    let tables: Vec<BoxId> = tree
        .iter_ids()
        .filter(|&id| tree.node(id).element_kind() == Some(ElementKind::Table))
        .collect();
    for table in tables {
        number_table(tree, table);
    }
}

/// The `<tr>` children of a table, in document order, looking through row
/// groups.
pub fn table_rows(tree: &BoxTree, table: BoxId) -> Vec<BoxId> {
    let mut rows = Vec::new();
    for &child in &tree.node(table).children {
        match tree.node(child).element_kind() {
            Some(ElementKind::Tr) => rows.push(child),
            Some(kind) if kind.is_row_group() => {
                for &row in &tree.node(child).children {
                    if tree.node(row).element_kind() == Some(ElementKind::Tr) {
                        rows.push(row);
                    }
                }
            }
            _ => {}
        }
    }
    rows
}

/// The cell children (`td`/`th`) of one row.
pub fn row_cells(tree: &BoxTree, row: BoxId) -> Vec<BoxId> {
    tree.node(row)
        .children
        .iter()
        .copied()
        .filter(|&c| {
            tree.node(c)
                .element_kind()
                .is_some_and(ElementKind::is_cell)
        })
        .collect()
}

fn span_attr(tree: &BoxTree, cell: BoxId, name: &str) -> usize {
    tree.node(cell)
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&v| v >= 1)
        .unwrap_or(1)
}

fn number_table(tree: &mut BoxTree, table: BoxId) {
    let rows = table_rows(tree, table);
    // Remaining rowspan coverage per column index.
    let mut pending: Vec<usize> = Vec::new();
    let mut max_cols = 0usize;

    for (row_index, &row) in rows.iter().enumerate() {
        let mut col = 0usize;
        for cell in row_cells(tree, row) {
            while pending.get(col).copied().unwrap_or(0) > 0 {
                col += 1;
            }
            let colspan = span_attr(tree, cell, "colspan");
            let rowspan = span_attr(tree, cell, "rowspan");

            tree.node_mut(cell).cell_slot = Some(CellSlot {
                row: row_index,
                col,
                colspan,
                rowspan,
            });

            if pending.len() < col + colspan {
                pending.resize(col + colspan, 0);
            }
            for slot in &mut pending[col..col + colspan] {
                *slot = rowspan;
            }
            col += colspan;
        }
        max_cols = max_cols.max(col.max(pending.len()));
        for slot in &mut pending {
            *slot = slot.saturating_sub(1);
        }
    }

    let total_rows = rows.len();
    tree.node_mut(table).grid = Some(TableGrid {
        rows: total_rows,
        cols: max_cols,
    });

    // Clamp rowspans that run past the last row.
    for &row in &rows {
        for cell in row_cells(tree, row) {
            if let Some(slot) = tree.node(cell).cell_slot {
                let clamped = slot.rowspan.min(total_rows - slot.row);
                if clamped != slot.rowspan {
                    tree.node_mut(cell).cell_slot = Some(CellSlot {
                        rowspan: clamped.max(1),
                        ..slot
                    });
                }
            }
        }
    }
}
