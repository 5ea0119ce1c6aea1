//! Table layout: two-pass column negotiation and row-at-a-time cell layout.
//!
//! [§ 17.5.2 Automatic table layout](https://www.w3.org/TR/CSS2/tables.html#auto-table-layout)
//!
//! "Calculate the minimum and maximum width of each cell... For each
//! column, determine a minimum and maximum column width from the cells
//! that span only that column."
//!
//! Column minimum/maximum widths come from per-cell content probes; the
//! target width interpolates between the two totals. Rows lay out one at a
//! time; cells spanning several rows wait in a backlog until their
//! terminating row's height is known.

use folio_common::warning::warn_once;

use crate::block::{self, LayoutEnv};
use crate::error::LayoutError;
use crate::float::{self, EPSILON};
use crate::page::PageState;
use crate::structure::{row_cells, table_rows};
use crate::style::values::parse_length;
use crate::tree::{BlockFragment, BoxId, BoxTree, CellSlot, ElementKind};

/// [§ 17.6.1 The separated borders model](https://www.w3.org/TR/CSS2/tables.html#separated-borders)
///
/// "The 'border-spacing' property specifies the distance that separates
/// adjoining cell borders." UA default is 2px.
const DEFAULT_BORDER_SPACING: f32 = 2.0;

/// A rowspan cell waiting for its terminating row.
struct DeferredCell {
    cell: BoxId,
    slot: CellSlot,
    page: usize,
    y: f32,
}

/// Lay out the rows and cells of `table` inside the current content band.
///
/// Returns the table's used content width, which the caller turns into the
/// table's fragment width.
///
/// # Errors
///
/// Fatal layout failures only.
pub fn layout_table_content(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    table: BoxId,
    state: &mut PageState,
    can_grow: bool,
) -> Result<f32, LayoutError> {
    let grid = tree.node(table).grid.unwrap_or_default();
    if grid.rows == 0 || grid.cols == 0 {
        return Ok(0.0);
    }
    let rows = table_rows(tree, table);
    let collapse = borders_collapse(tree, table);
    let spacing = if collapse {
        0.0
    } else {
        border_spacing(tree, table)
    };

    // ── Column width negotiation ───────────────────────────────────────
    let n = grid.cols;
    let mut col_min = vec![0.0_f32; n];
    let mut col_max = vec![0.0_f32; n];
    let mut col_declared: Vec<Option<f32>> = vec![None; n];
    let band_width = state.band_width();

    for &row in &rows {
        for cell in row_cells(tree, row) {
            let Some(slot) = tree.node(cell).cell_slot else {
                continue;
            };
            let span = slot.colspan.min(n.saturating_sub(slot.col)).max(1);
            let font_size = tree.node(cell).font.size;
            let declared = block::declared_width(tree, cell, font_size, band_width);
            let min_w = block::measure_min_content(tree, env, cell)?;
            let max_w = block::measure_max_content(tree, env, cell)?.max(min_w);

            if span == 1 {
                col_min[slot.col] = col_min[slot.col].max(min_w);
                col_max[slot.col] = col_max[slot.col].max(max_w);
                if let Some(w) = declared {
                    col_declared[slot.col] =
                        Some(col_declared[slot.col].map_or(w, |d: f32| d.max(w)));
                }
            } else {
                // Spread any shortfall evenly across the spanned columns.
                spread_shortfall(&mut col_min[slot.col..slot.col + span], min_w, spacing);
                spread_shortfall(&mut col_max[slot.col..slot.col + span], max_w, spacing);
            }
        }
    }

    // Declared column widths clamp the minimum upward.
    for c in 0..n {
        if let Some(d) = col_declared[c] {
            col_min[c] = col_min[c].max(d);
        }
        col_max[c] = col_max[c].max(col_min[c]);
    }

    #[allow(clippy::cast_precision_loss)]
    let spacing_total = spacing * (n + 1) as f32;
    let sum_min: f32 = col_min.iter().sum();
    let sum_max: f32 = col_max.iter().sum();
    let total_min = sum_min + spacing_total;
    let total_max = sum_max + spacing_total;

    // Desired width: the max-content ceiling, clamped by a declared table
    // width when that still exceeds the min-content floor. The declared
    // width already narrowed the band in block layout, so it appears here
    // as the band width.
    let declared_table = {
        let font_size = tree.node(table).font.size;
        let base = tree.percentage_base(table).unwrap_or(band_width);
        block::declared_width(tree, table, font_size, base)
    };
    let desired = match declared_table {
        Some(w) => w.max(total_min),
        None => total_max,
    };

    // Resolve against the containing band: grow it, clear floats for
    // room, or accept the available width as final.
    let mut available = state.band_width();
    if desired > available + EPSILON {
        if can_grow {
            state.set_band(state.min_x, state.min_x + desired);
            state.record_extent(state.max_x);
            available = desired;
        } else if !state.floats.is_empty() {
            float::clear_floats_for_width(tree, state, env, desired)?;
            let (left, right) = float::available_band(
                tree,
                &state.floats,
                state.y,
                state.page,
                (state.min_x, state.max_x),
            );
            available = right - left;
        }
    }
    let target = desired.min(available).max(0.0);

    let widths = distribute_columns(
        &col_min,
        &col_max,
        &col_declared,
        (target - spacing_total).max(0.0),
    );

    // ── Row layout ─────────────────────────────────────────────────────
    let table_left = state.min_x;
    let mut col_x = Vec::with_capacity(n);
    let mut x = table_left + spacing;
    for &w in &widths {
        col_x.push(x);
        x += w + spacing;
    }

    let span_width = |slot: &CellSlot| -> f32 {
        let span = slot.colspan.min(n - slot.col).max(1);
        let cols: f32 = widths[slot.col..slot.col + span].iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let gaps = spacing * (span - 1) as f32;
        cols + gaps
    };

    let mut backlog: Vec<DeferredCell> = Vec::new();
    let mut row_heights = vec![0.0_f32; rows.len()];

    state.y += spacing;
    for (r, &row) in rows.iter().enumerate() {
        let row_page = state.page;
        let row_top = state.y;
        let mut bottom_page = row_page;
        let mut bottom_y = row_top;

        let cells = row_cells(tree, row);
        for &cell in &cells {
            let Some(slot) = tree.node(cell).cell_slot else {
                continue;
            };
            if slot.rowspan > 1 {
                // Deferred until the terminating row, in encounter order.
                backlog.push(DeferredCell {
                    cell,
                    slot,
                    page: row_page,
                    y: row_top,
                });
                continue;
            }
            let x0 = col_x[slot.col];
            let mut cell_state = cell_page_state(x0, span_width(&slot), row_page, row_top);
            let _ = block::layout_block(
                tree,
                env,
                cell,
                &mut cell_state,
                false,
                0.0,
                false,
                None,
            )?;
            state.record_extent(cell_state.widest);
            if cell_state.page > bottom_page
                || (cell_state.page == bottom_page && cell_state.y > bottom_y)
            {
                bottom_page = cell_state.page;
                bottom_y = cell_state.y;
            }
        }

        let same_page = bottom_page == row_page;
        let row_height = if same_page { bottom_y - row_top } else { 0.0 };
        row_heights[r] = row_height;

        // Second pass: stretch every single-row cell to the row height so
        // backgrounds and borders fill the row.
        if same_page && row_height > 0.0 {
            for &cell in &cells {
                let Some(slot) = tree.node(cell).cell_slot else {
                    continue;
                };
                if slot.rowspan > 1 {
                    continue;
                }
                let short_of_row = tree
                    .node(cell)
                    .last_block_fragment()
                    .is_none_or(|f| f.height + EPSILON < row_height);
                if short_of_row {
                    tree.reset_subtree_layout(cell);
                    let x0 = col_x[slot.col];
                    let mut cell_state =
                        cell_page_state(x0, span_width(&slot), row_page, row_top);
                    let _ = block::layout_block(
                        tree,
                        env,
                        cell,
                        &mut cell_state,
                        false,
                        0.0,
                        false,
                        Some(row_height),
                    )?;
                }
            }
        }

        // The row box itself, for painting and anchoring.
        tree.node_mut(row).block_fragments.push(BlockFragment {
            page: row_page,
            x: table_left,
            y: row_top,
            width: target,
            height: row_height,
        });

        state.page = bottom_page;
        state.y = bottom_y + spacing;

        // Drain deferred cells terminating here, in insertion order.
        let mut i = 0;
        while i < backlog.len() {
            if backlog[i].slot.row + backlog[i].slot.rowspan - 1 != r {
                i += 1;
                continue;
            }
            let deferred = backlog.remove(i);
            let heights = &row_heights[deferred.slot.row..=r];
            #[allow(clippy::cast_precision_loss)]
            let spanned: f32 =
                heights.iter().sum::<f32>() + spacing * (heights.len() - 1) as f32;
            let x0 = col_x[deferred.slot.col];
            let mut cell_state = cell_page_state(
                x0,
                span_width(&deferred.slot),
                deferred.page,
                deferred.y,
            );
            let _ = block::layout_block(
                tree,
                env,
                deferred.cell,
                &mut cell_state,
                false,
                0.0,
                false,
                Some(spanned),
            )?;
            // A spanning cell taller than its rows pushes the flow down.
            if cell_state.page == state.page && cell_state.y + spacing > state.y {
                state.y = cell_state.y + spacing;
            }
        }
    }

    Ok(target)
}

fn cell_page_state(x: f32, width: f32, page: usize, y: f32) -> PageState {
    PageState::detached(page, y, x, x + width)
}

/// Raise the widths in `cols` evenly until they cover `needed` (including
/// the spacing between them).
fn spread_shortfall(cols: &mut [f32], needed: f32, spacing: f32) {
    #[allow(clippy::cast_precision_loss)]
    let gaps = spacing * (cols.len() - 1) as f32;
    let current: f32 = cols.iter().sum::<f32>() + gaps;
    if needed <= current + EPSILON {
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    let bump = (needed - current) / cols.len() as f32;
    for col in cols {
        *col += bump;
    }
}

/// Final column widths for a target content width.
///
/// At or below the minimum total the minimums are used (the table
/// overflows); at or above the maximum total the excess goes to columns
/// without declared widths (equal split when none qualify); in between,
/// each column interpolates linearly by the available slack.
fn distribute_columns(
    col_min: &[f32],
    col_max: &[f32],
    col_declared: &[Option<f32>],
    target: f32,
) -> Vec<f32> {
    let sum_min: f32 = col_min.iter().sum();
    let sum_max: f32 = col_max.iter().sum();

    if target <= sum_min + EPSILON {
        return col_min.to_vec();
    }

    if target >= sum_max - EPSILON {
        let excess = target - sum_max;
        let mut widths = col_max.to_vec();
        let stretchable: Vec<usize> = (0..widths.len())
            .filter(|&c| col_declared[c].is_none())
            .collect();
        if stretchable.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let each = excess / widths.len() as f32;
            for w in &mut widths {
                *w += each;
            }
        } else {
            let stretch_sum: f32 = stretchable.iter().map(|&c| col_max[c]).sum();
            if stretch_sum > EPSILON {
                for &c in &stretchable {
                    widths[c] += excess * col_max[c] / stretch_sum;
                }
            } else {
                #[allow(clippy::cast_precision_loss)]
                let each = excess / stretchable.len() as f32;
                for &c in &stretchable {
                    widths[c] += each;
                }
            }
        }
        return widths;
    }

    let slack = sum_max - sum_min;
    let t = (target - sum_min) / slack;
    col_min
        .iter()
        .zip(col_max)
        .map(|(&lo, &hi)| lo + t * (hi - lo))
        .collect()
}

fn border_spacing(tree: &mut BoxTree, table: BoxId) -> f32 {
    let Some(value) = tree.resolved_value(table, "border-spacing") else {
        return DEFAULT_BORDER_SPACING;
    };
    let font_size = tree.node(table).font.size;
    parse_length(&value).map_or_else(
        || {
            warn_once("table", &format!("unsupported border-spacing value '{value}'"));
            DEFAULT_BORDER_SPACING
        },
        |l| l.resolve_against(font_size, 0.0).max(0.0),
    )
}

fn borders_collapse(tree: &mut BoxTree, table: BoxId) -> bool {
    matches!(
        tree.resolved_value(table, "border-collapse").as_deref(),
        Some("collapse")
    )
}

/// Whether `cell` sits in a table with `border-collapse: collapse`.
pub fn cell_borders_collapse(tree: &mut BoxTree, cell: BoxId) -> bool {
    let Some(table) = containing_table(tree, cell) else {
        return false;
    };
    borders_collapse(tree, table)
}

fn containing_table(tree: &BoxTree, cell: BoxId) -> Option<BoxId> {
    tree.ancestors(cell)
        .find(|&a| tree.node(a).element_kind() == Some(ElementKind::Table))
}

/// [§ 17.6.2 The collapsing border model](https://www.w3.org/TR/CSS2/tables.html#collapsing-borders)
///
/// "The border width is the width of the widest border... A border style
/// of 'hidden' takes precedence over all other conflicting borders."
///
/// Resolve the effective width of one edge of a cell by comparing the
/// candidate borders of both adjacent cells, or the table edge at the
/// boundary; a `hidden` candidate short-circuits to zero.
pub fn collapsed_cell_border(tree: &mut BoxTree, cell: BoxId, side: &str) -> f32 {
    let Some(table) = containing_table(tree, cell) else {
        return tree.border_width(cell, side);
    };
    let Some(slot) = tree.node(cell).cell_slot else {
        return tree.border_width(cell, side);
    };
    let grid = tree.node(table).grid.unwrap_or_default();

    let own_hidden = matches!(tree.border_style(cell, side).as_deref(), Some("hidden"));
    if own_hidden {
        return 0.0;
    }
    let own = tree.border_width(cell, side);

    let (neighbor, neighbor_side): (Option<BoxId>, &str) = match side {
        "left" if slot.col == 0 => (None, "left"),
        "left" => (find_cell_at(tree, table, slot.row, slot.col - 1), "right"),
        "right" if slot.col + slot.colspan >= grid.cols => (None, "right"),
        "right" => (
            find_cell_at(tree, table, slot.row, slot.col + slot.colspan),
            "left",
        ),
        "top" if slot.row == 0 => (None, "top"),
        "top" => (
            find_cell_at(tree, table, slot.row - 1, slot.col),
            "bottom",
        ),
        "bottom" if slot.row + slot.rowspan >= grid.rows => (None, "bottom"),
        "bottom" => (
            find_cell_at(tree, table, slot.row + slot.rowspan, slot.col),
            "top",
        ),
        _ => (None, side),
    };

    let other = match neighbor {
        Some(other_cell) => {
            if matches!(
                tree.border_style(other_cell, neighbor_side).as_deref(),
                Some("hidden")
            ) {
                return 0.0;
            }
            tree.border_width(other_cell, neighbor_side)
        }
        // Table edge: the table's own border competes.
        None => {
            if matches!(tree.border_style(table, side).as_deref(), Some("hidden")) {
                return 0.0;
            }
            tree.border_width(table, side)
        }
    };

    own.max(other)
}

/// The cell whose slot covers `(row, col)`, if any.
fn find_cell_at(tree: &BoxTree, table: BoxId, row: usize, col: usize) -> Option<BoxId> {
    for r in table_rows(tree, table) {
        for cell in row_cells(tree, r) {
            if let Some(slot) = tree.node(cell).cell_slot {
                if row >= slot.row
                    && row < slot.row + slot.rowspan
                    && col >= slot.col
                    && col < slot.col + slot.colspan
                {
                    return Some(cell);
                }
            }
        }
    }
    None
}
