//! Recursive block layout with margin collapsing and pagination.
//!
//! [§ 9.4.1 Block formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#block-formatting)
//!
//! "In a block formatting context, boxes are laid out one after the other,
//! vertically, beginning at the top of a containing block. The vertical
//! distance between two sibling boxes is determined by the 'margin'
//! properties. Vertical margins between adjacent block-level boxes in a
//! block formatting context collapse."
//!
//! One cursor — the [`PageState`] — threads through the whole recursion;
//! every box narrows the band for its children, lays them out, commits one
//! border-box fragment per page it spanned, and restores the band.

use folio_common::warning::warn_once;

use crate::device::{PageGeometry, ResourceResolver, Side, TextMeasurer};
use crate::error::LayoutError;
use crate::float;
use crate::line;
use crate::page::PageState;
use crate::positioned;
use crate::style::values::{AutoLength, Length, parse_auto_length, parse_length};
use crate::table;
use crate::tree::{BlockFragment, BoxId, BoxTree, ElementKind};

/// The read-only collaborators layout needs at every step.
pub struct LayoutEnv<'a> {
    /// Text measurement.
    pub measurer: &'a dyn TextMeasurer,
    /// Page dimensions and margins.
    pub geometry: &'a dyn PageGeometry,
    /// Intrinsic sizes for replaced content.
    pub resources: &'a dyn ResourceResolver,
}

/// Fallback intrinsic size for replaced content the resolver cannot
/// identify, per the usual UA convention.
const REPLACED_FALLBACK: (f32, f32) = (300.0, 150.0);

/// Lay out the whole document from its root box.
///
/// `start_y` positions the first content on page 0; `band_override`
/// replaces the page-0 content band (the driver uses it for the widened
/// second pass). Returns the final cursor.
///
/// # Errors
///
/// Fatal layout failures only; see [`LayoutError`].
pub fn layout_document(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    start_y: f32,
    band_override: Option<(f32, f32)>,
) -> Result<PageState, LayoutError> {
    let mut state = PageState::at_page_top(env.geometry, 0)?;
    if let Some((min_x, max_x)) = band_override {
        state.band_override = band_override;
        state.set_band(min_x, max_x);
    }
    state.y = state.y.max(start_y);

    if let Some(root) = tree.root() {
        let _ = layout_block(tree, env, root, &mut state, false, 0.0, true, None)?;
    }
    Ok(state)
}

/// Lay out one block-level box.
///
/// `collapse_top` is the margin amount the previous adjacent edge already
/// applied to the cursor; this box applies only the excess of its own top
/// margin over it, so adjacent margins merge to the larger of the two.
/// With `collapse_bottom`, the box applies its bottom margin and returns
/// it as the carry for the next sibling; without, the bottom margin is
/// suppressed (table cells, forced-height slots) and the carry is zero.
/// `forced_height` overrides the natural border-box height, growing only.
///
/// # Errors
///
/// Fatal layout failures only; recoverable conditions are logged and fall
/// back.
#[allow(clippy::too_many_arguments)]
pub fn layout_block(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    id: BoxId,
    state: &mut PageState,
    can_grow: bool,
    collapse_top: f32,
    collapse_bottom: bool,
    forced_height: Option<f32>,
) -> Result<f32, LayoutError> {
    // [§ 13.3.3 Forced page breaks](https://www.w3.org/TR/CSS2/page.html#forced)
    if page_break_requested(tree, id, "page-break-before")
        && !state.at_page_top_edge(env.geometry)
    {
        state.advance_page(tree, env.geometry)?;
    }

    let kind = tree.node(id).element_kind();
    let font_size = tree.node(id).font.size;
    let percent_base = tree.percentage_base(id).unwrap_or_else(|| state.band_width());
    let resolve = |len: Length| len.resolve_against(font_size, percent_base);

    // [§ 8.3.1 Collapsing margins](https://www.w3.org/TR/CSS2/box.html#collapsing-margins)
    //
    // The cursor has already moved by `collapse_top`; apply only what this
    // box's own margin adds beyond it.
    let margin_top = match tree.margin_value(id, "top") {
        AutoLength::Auto => 0.0,
        AutoLength::Length(l) => resolve(l),
    };
    let margin_bottom = match tree.margin_value(id, "bottom") {
        AutoLength::Auto => 0.0,
        AutoLength::Length(l) => resolve(l),
    };
    let margin_left = tree.margin_value(id, "left");
    let margin_right = tree.margin_value(id, "right");

    state.y += margin_top - margin_top.min(collapse_top);

    // A box that would start at or past the page bottom opens on the next
    // page instead.
    if state.y >= state.usable_bottom(env.geometry) {
        state.advance_page(tree, env.geometry)?;
    }

    let border = effective_border_widths(tree, id);
    let padding = [
        resolve(tree.padding_value(id, "top")),
        resolve(tree.padding_value(id, "right")),
        resolve(tree.padding_value(id, "bottom")),
        resolve(tree.padding_value(id, "left")),
    ];

    // Carried into the first child: the merged margin, unless border or
    // padding separate it from the children.
    let carried_into_children = if border[0] > 0.0 || padding[0] > 0.0 {
        0.0
    } else {
        margin_top.max(collapse_top)
    };

    // ── Horizontal geometry ────────────────────────────────────────────
    //
    // [§ 10.3.3 Block-level, non-replaced elements](https://www.w3.org/TR/CSS2/visudet.html#blockwidth)
    //
    // Declared widths are border-box; `margin: auto` combinations place
    // the narrowed band left, centered, or right within the available one.
    let outer_left = state.min_x;
    let outer_right = state.max_x;
    let avail = outer_right - outer_left;

    let ml = match margin_left {
        AutoLength::Auto => None,
        AutoLength::Length(l) => Some(resolve(l)),
    };
    let mr = match margin_right {
        AutoLength::Auto => None,
        AutoLength::Length(l) => Some(resolve(l)),
    };

    // Table cells take their band from column negotiation; a declared
    // width already participated there.
    let declared = if kind.is_some_and(ElementKind::is_cell) {
        None
    } else {
        declared_width(tree, id, font_size, percent_base)
    };

    let (bb_left, bb_right) = match declared {
        Some(width) => {
            let left = match (ml, mr) {
                (None, None) => outer_left + (avail - width) / 2.0,
                (None, Some(right_margin)) => outer_right - right_margin - width,
                (Some(left_margin), _) => outer_left + left_margin,
            };
            (left, left + width)
        }
        None => (
            outer_left + ml.unwrap_or(0.0),
            outer_right - mr.unwrap_or(0.0),
        ),
    };
    let bb_right = bb_right.max(bb_left);

    let start_page = state.page;
    let start_y = state.y;

    // ── Replaced content ───────────────────────────────────────────────
    if kind == Some(ElementKind::Img) {
        let carry = layout_block_image(
            tree,
            env,
            id,
            state,
            bb_left,
            margin_bottom,
            collapse_bottom,
        )?;
        if page_break_requested(tree, id, "page-break-after") {
            state.advance_page(tree, env.geometry)?;
        }
        return Ok(carry);
    }

    // ── Content band ───────────────────────────────────────────────────
    let saved_band = (state.min_x, state.max_x);
    let content_left = bb_left + border[3] + padding[3];
    let content_right = (bb_right - border[1] - padding[1]).max(content_left);
    state.set_band(content_left, content_right);
    tree.node_mut(id).content_width = Some(content_right - content_left);

    state.y += border[0] + padding[0];

    let widest_before_children = state.widest;

    // ── Children ───────────────────────────────────────────────────────
    let mut table_width = None;
    if kind == Some(ElementKind::Table) {
        table_width = Some(table::layout_table_content(tree, env, id, state, can_grow)?);
    } else if has_inline_content(tree, id) {
        line::layout_inline_children(tree, env, id, state, can_grow)?;
    } else {
        let children = tree.node(id).children.clone();
        let mut carry = carried_into_children;
        for child in children {
            let node = tree.node(child);
            if node.is_text() {
                // Only neutral whitespace text survives here; nothing to
                // lay out.
                continue;
            }
            if node.position.is_out_of_flow() {
                tree.node_mut(child).static_position =
                    Some((state.page, state.min_x, state.y));
                continue;
            }
            if node.float_side.is_some() {
                float::place_float(tree, env, child, state, can_grow)?;
                continue;
            }
            carry = layout_block(tree, env, child, state, can_grow, carry, true, None)?;
        }
    }

    // Content that pushed past the band contributes this box's right edge
    // thickness to the measured width.
    if state.widest > widest_before_children {
        state.record_extent(state.widest + padding[1] + border[1]);
    }

    state.y += padding[2] + border[2];

    // ── Explicit height ────────────────────────────────────────────────
    //
    // Overrides the natural height, except that tables and cells never
    // move the cursor backward.
    let declared_h = declared_height(tree, id, font_size);
    if let Some(height) = forced_height.or(declared_h) {
        if state.page == start_page {
            let target = start_y + height;
            let table_like = matches!(
                kind,
                Some(
                    ElementKind::Table
                        | ElementKind::Tr
                        | ElementKind::Td
                        | ElementKind::Th
                )
            );
            if target > state.y {
                state.y = target;
            } else if !table_like && forced_height.is_none() {
                state.y = target;
            }
        }
        // A box that already crossed pages keeps its natural extent.
    }

    // Spill height that ran past the page bottom onto following pages.
    // Content-driven flows (lines, children) paginate as they go; this
    // catches explicit heights and bottom padding.
    while state.y > state.usable_bottom(env.geometry) + 0.01 {
        let leftover = state.y - state.usable_bottom(env.geometry);
        state.advance_page(tree, env.geometry)?;
        state.y += leftover;
    }

    // ── Fragments ──────────────────────────────────────────────────────
    let fragment_width = table_width.map_or(bb_right - bb_left, |w| {
        w + padding[1] + padding[3] + border[1] + border[3]
    });
    commit_fragments(tree, env, id, bb_left, fragment_width, start_page, start_y, state);
    state.record_extent(bb_left + fragment_width);

    state.set_band(saved_band.0, saved_band.1);

    // Absolutely positioned descendants wait for their containing block's
    // geometry, which is now settled.
    if !tree.node(id).abs_descendants.is_empty() {
        positioned::layout_absolute_children(tree, env, id)?;
    }

    // ── Bottom margin ──────────────────────────────────────────────────
    let carry_out = if collapse_bottom {
        state.y += margin_bottom;
        margin_bottom
    } else {
        0.0
    };

    if page_break_requested(tree, id, "page-break-after") {
        state.advance_page(tree, env.geometry)?;
    }

    Ok(carry_out)
}

fn page_break_requested(tree: &mut BoxTree, id: BoxId, property: &str) -> bool {
    match tree.resolved_value(id, property).as_deref() {
        Some("always") => true,
        None | Some("auto") => false,
        Some(other) => {
            warn_once("block", &format!("unsupported {property} value '{other}'"));
            false
        }
    }
}

/// Whether the box's in-flow children form an inline formatting context.
fn has_inline_content(tree: &BoxTree, id: BoxId) -> bool {
    tree.node(id).children.iter().any(|&c| {
        let node = tree.node(c);
        node.inline && node.float_side.is_none() && !node.position.is_out_of_flow()
    })
}

/// The declared border-box width from CSS `width` or, for replaced and
/// table elements, the legacy `width` attribute. `None` means auto.
pub(crate) fn declared_width(
    tree: &mut BoxTree,
    id: BoxId,
    font_size: f32,
    percent_base: f32,
) -> Option<f32> {
    if let Some(value) = tree.styled_or_default(id, "width") {
        match parse_auto_length(&value) {
            Some(AutoLength::Auto) => return None,
            Some(AutoLength::Length(l)) => {
                return Some(l.resolve_against(font_size, percent_base).max(0.0));
            }
            None => warn_once("block", &format!("unsupported width value '{value}'")),
        }
    }
    let legacy = matches!(
        tree.node(id).element_kind(),
        Some(ElementKind::Img | ElementKind::Table | ElementKind::Td | ElementKind::Th)
    );
    if legacy {
        if let Some(value) = tree.node(id).attr("width") {
            if let Some(l) = parse_length(value) {
                return Some(l.resolve_against(font_size, percent_base).max(0.0));
            }
        }
    }
    None
}

/// The declared border-box height. Percentages have no reliable base in a
/// paged flow and are ignored with a warning.
pub(crate) fn declared_height(tree: &mut BoxTree, id: BoxId, font_size: f32) -> Option<f32> {
    let from_value = |value: &str, tree_font: f32| match parse_auto_length(value) {
        Some(AutoLength::Auto) => None,
        Some(AutoLength::Length(Length::Percent(_))) => {
            warn_once("block", "percentage heights are ignored in paged flow");
            None
        }
        Some(AutoLength::Length(l)) => Some(l.resolve_against(tree_font, 0.0).max(0.0)),
        None => {
            warn_once("block", &format!("unsupported height value '{value}'"));
            None
        }
    };
    if let Some(value) = tree.styled_or_default(id, "height") {
        return from_value(&value, font_size);
    }
    if let Some(value) = tree.node(id).attr("height").map(ToString::to_string) {
        return from_value(&value, font_size);
    }
    None
}

/// The declared outer (margin-box) width of a box, for float slotting.
/// `None` when the width is auto.
pub(crate) fn declared_outer_width(
    tree: &mut BoxTree,
    _env: &LayoutEnv<'_>,
    id: BoxId,
    state: &PageState,
) -> Option<f32> {
    let font_size = tree.node(id).font.size;
    let percent_base = tree
        .percentage_base(id)
        .unwrap_or_else(|| state.band_width());
    let width = declared_width(tree, id, font_size, percent_base)?;
    let resolve_margin = |tree: &mut BoxTree, side: &str| match tree.margin_value(id, side) {
        AutoLength::Auto => 0.0,
        AutoLength::Length(l) => l.resolve_against(font_size, percent_base),
    };
    let ml = resolve_margin(tree, "left");
    let mr = resolve_margin(tree, "right");
    Some(width + ml + mr)
}

/// The used size of a replaced box: declared dimensions first, the
/// resolver's intrinsic size for whatever is missing, aspect ratio
/// preserved, UA fallback last.
pub(crate) fn image_size(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    id: BoxId,
    state: &PageState,
) -> (f32, f32) {
    let font_size = tree.node(id).font.size;
    let percent_base = tree
        .percentage_base(id)
        .unwrap_or_else(|| state.band_width());
    let declared_w = declared_width(tree, id, font_size, percent_base);
    let declared_h = declared_height(tree, id, font_size);

    let intrinsic = tree
        .node(id)
        .attr("src")
        .and_then(|src| env.resources.intrinsic_size(src));

    match (declared_w, declared_h) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let h = intrinsic
                .filter(|&(iw, _)| iw > 0.0)
                .map_or(w, |(iw, ih)| w * ih / iw);
            (w, h)
        }
        (None, Some(h)) => {
            let w = intrinsic
                .filter(|&(_, ih)| ih > 0.0)
                .map_or(h, |(iw, ih)| h * iw / ih);
            (w, h)
        }
        (None, None) => intrinsic.unwrap_or(REPLACED_FALLBACK),
    }
}

/// A block-level (or floated) image: a single opaque box that may force a
/// page break when it does not fit the remaining page height.
fn layout_block_image(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    id: BoxId,
    state: &mut PageState,
    x: f32,
    margin_bottom: f32,
    collapse_bottom: bool,
) -> Result<f32, LayoutError> {
    let (width, height) = image_size(tree, env, id, state);

    let usable_bottom = state.usable_bottom(env.geometry);
    let page_height = usable_bottom - env.geometry.margin(Side::Top);
    if state.y + height > usable_bottom && height <= page_height {
        state.advance_page(tree, env.geometry)?;
    }

    tree.node_mut(id).block_fragments.push(BlockFragment {
        page: state.page,
        x,
        y: state.y,
        width,
        height,
    });
    state.record_extent(x + width);
    state.y += height;

    let carry = if collapse_bottom {
        state.y += margin_bottom;
        margin_bottom
    } else {
        0.0
    };
    Ok(carry)
}

/// Commit one border-box fragment per page the box's content spanned.
/// A box that produced no content gets a zero-height anchor fragment.
#[allow(clippy::too_many_arguments)]
fn commit_fragments(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    id: BoxId,
    x: f32,
    width: f32,
    start_page: usize,
    start_y: f32,
    state: &PageState,
) {
    let top = env.geometry.margin(Side::Top);
    for page in start_page..=state.page {
        let y0 = if page == start_page { start_y } else { top };
        let y1 = if page == state.page {
            state.y
        } else {
            env.geometry.page_height(page) - env.geometry.margin(Side::Bottom)
        };
        let height = (y1 - y0).max(0.0);
        if height <= 0.0 && page != start_page {
            continue;
        }
        tree.node_mut(id).block_fragments.push(BlockFragment {
            page,
            x,
            y: y0,
            width,
            height,
        });
    }
}

/// Border widths per side (`[top, right, bottom, left]`), with the
/// half-width discount applied to cells under collapsed table borders.
fn effective_border_widths(tree: &mut BoxTree, id: BoxId) -> [f32; 4] {
    if tree.node(id).cell_slot.is_some() && table::cell_borders_collapse(tree, id) {
        return [
            table::collapsed_cell_border(tree, id, "top") / 2.0,
            table::collapsed_cell_border(tree, id, "right") / 2.0,
            table::collapsed_cell_border(tree, id, "bottom") / 2.0,
            table::collapsed_cell_border(tree, id, "left") / 2.0,
        ];
    }
    [
        tree.border_width(id, "top"),
        tree.border_width(id, "right"),
        tree.border_width(id, "bottom"),
        tree.border_width(id, "left"),
    ]
}

// ── Content-width probes ───────────────────────────────────────────────

/// One enormous margin-less page, so probes never paginate.
struct ProbeGeometry;

const PROBE_EXTENT: f32 = 1.0e9;

impl PageGeometry for ProbeGeometry {
    fn page_width(&self, _page: usize) -> f32 {
        PROBE_EXTENT
    }

    fn page_height(&self, _page: usize) -> f32 {
        PROBE_EXTENT
    }

    fn margin(&self, _side: Side) -> f32 {
        0.0
    }
}

/// Minimum content width: the widest unbreakable unit, measured by laying
/// the box into a zero-width band that may not grow.
///
/// # Errors
///
/// Fatal layout failures only.
pub fn measure_min_content(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    id: BoxId,
) -> Result<f32, LayoutError> {
    measure_content(tree, env, id, false)
}

/// Maximum content width: the unwrapped width, measured by laying the box
/// into a zero-width band that grows to fit every run.
///
/// # Errors
///
/// Fatal layout failures only.
pub fn measure_max_content(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    id: BoxId,
) -> Result<f32, LayoutError> {
    measure_content(tree, env, id, true)
}

fn measure_content(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    id: BoxId,
    can_grow: bool,
) -> Result<f32, LayoutError> {
    let probe_geometry = ProbeGeometry;
    let probe_env = LayoutEnv {
        measurer: env.measurer,
        geometry: &probe_geometry,
        resources: env.resources,
    };
    let mut probe = PageState::detached(0, 0.0, 0.0, 0.0);
    let _ = layout_block(tree, &probe_env, id, &mut probe, can_grow, 0.0, false, None)?;
    let width = probe.widest.max(0.0);
    tree.reset_subtree_layout(id);
    Ok(width)
}
