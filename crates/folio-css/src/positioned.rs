//! Absolute and fixed positioning.
//!
//! [§ 10.3.7 Absolutely positioned, non-replaced elements](https://www.w3.org/TR/CSS2/visudet.html#abs-non-replaced-width)
//!
//! "The constraint that determines the used values for these elements is:
//! 'left' + 'margin-left' + 'border-left-width' + 'padding-left' + 'width' +
//! 'padding-right' + 'border-right-width' + 'margin-right' + 'right'
//! = width of containing block"
//!
//! A box leaves the normal flow during block layout, which records only its
//! static position. Once the containing block's geometry settles, the
//! over/under-constrained offset equations are solved here and the box is
//! laid out at the solved rectangle.

use crate::block::{self, LayoutEnv};
use crate::device::Side;
use crate::error::LayoutError;
use crate::page::PageState;
use crate::style::values::parse_length;
use crate::tree::{BoxId, BoxTree, PositionScheme};

/// The containing block rectangle for one absolutely positioned box.
struct ContainingBlock {
    page: usize,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// Lay out every absolutely positioned descendant registered to
/// `offset_parent`, whose own geometry is now final.
///
/// # Errors
///
/// Fatal layout failures only.
pub fn layout_absolute_children(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    offset_parent: BoxId,
) -> Result<(), LayoutError> {
    let descendants = tree.node(offset_parent).abs_descendants.clone();
    for abs in descendants {
        if !tree.node(abs).block_fragments.is_empty() {
            continue;
        }
        layout_absolute(tree, env, offset_parent, abs)?;
    }
    Ok(())
}

fn layout_absolute(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    offset_parent: BoxId,
    abs: BoxId,
) -> Result<(), LayoutError> {
    let (static_page, static_x, static_y) = tree
        .node(abs)
        .static_position
        .unwrap_or((0, 0.0, env.geometry.margin(Side::Top)));
    let cb = containing_block(tree, env, offset_parent, abs, static_page);

    let font_size = tree.node(abs).font.size;
    let left = offset_value(tree, abs, "left", font_size, cb.width);
    let right = offset_value(tree, abs, "right", font_size, cb.width);
    let top = offset_value(tree, abs, "top", font_size, cb.height);
    let bottom = offset_value(tree, abs, "bottom", font_size, cb.height);
    let declared_w = block::declared_width(tree, abs, font_size, cb.width);
    let declared_h = block::declared_height(tree, abs, font_size);

    // ── Horizontal: left / width / right ───────────────────────────────
    //
    // [§ 10.3.7](https://www.w3.org/TR/CSS2/visudet.html#abs-non-replaced-width)
    //
    // All three auto: static position and shrink-to-fit width. One auto:
    // solve for it. Width auto with both edges fixed: derived from the
    // containing block. Over-constrained: 'right' is ignored.
    let (x, width) = match (left, declared_w, right) {
        (None, None, None) => {
            let width = shrink_to_fit(tree, env, abs, (cb.x + cb.width - static_x).max(0.0))?;
            (static_x, width)
        }
        (Some(l), None, None) => {
            let width = shrink_to_fit(tree, env, abs, (cb.width - l).max(0.0))?;
            (cb.x + l, width)
        }
        (None, None, Some(r)) => {
            let width = shrink_to_fit(tree, env, abs, (cb.width - r).max(0.0))?;
            (cb.x + cb.width - r - width, width)
        }
        (None, Some(w), None) => (static_x, w),
        (Some(l), Some(w), None) => (cb.x + l, w),
        (None, Some(w), Some(r)) => (cb.x + cb.width - r - w, w),
        (Some(l), None, Some(r)) => (cb.x + l, (cb.width - l - r).max(0.0)),
        (Some(l), Some(w), Some(_)) => (cb.x + l, w),
    };

    // ── Vertical: top / height / bottom ────────────────────────────────
    //
    // [§ 10.6.4](https://www.w3.org/TR/CSS2/visudet.html#abs-non-replaced-height)
    let (y, forced_h) = match (top, declared_h, bottom) {
        (None, None, None) => (static_y, None),
        (Some(t), h, None) => (cb.y + t, h),
        (None, h, Some(b)) => {
            let height = match h {
                Some(h) => h,
                None => natural_height(tree, env, abs, cb.page, x, width)?,
            };
            (cb.y + cb.height - b - height, Some(height))
        }
        (None, Some(h), None) => (static_y, Some(h)),
        (Some(t), None, Some(b)) => (cb.y + t, Some((cb.height - t - b).max(0.0))),
        (Some(t), Some(h), Some(_)) => (cb.y + t, Some(h)),
    };

    // Re-layout at the solved rectangle.
    let mut state = PageState::detached(cb.page, y, x, x + width);
    let _ = block::layout_block(tree, env, abs, &mut state, false, 0.0, false, forced_h)?;
    Ok(())
}

/// The containing block: the offset parent's padding box on its first
/// fragment page, or the page content area for fixed boxes and for a root
/// that is not itself positioned.
fn containing_block(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    offset_parent: BoxId,
    abs: BoxId,
    static_page: usize,
) -> ContainingBlock {
    let fixed = tree.node(abs).position == PositionScheme::Fixed;
    let parent_positioned = tree.node(offset_parent).position.is_positioned();

    if !fixed && parent_positioned {
        if let Some(fragment) = tree.node(offset_parent).block_fragments.first().copied() {
            let border = [
                tree.border_width(offset_parent, "top"),
                tree.border_width(offset_parent, "right"),
                tree.border_width(offset_parent, "bottom"),
                tree.border_width(offset_parent, "left"),
            ];
            return ContainingBlock {
                page: fragment.page,
                x: fragment.x + border[3],
                y: fragment.y + border[0],
                width: (fragment.width - border[1] - border[3]).max(0.0),
                height: (fragment.height - border[0] - border[2]).max(0.0),
            };
        }
    }

    // Page content area.
    let top = env.geometry.margin(Side::Top);
    let left = env.geometry.margin(Side::Left);
    ContainingBlock {
        page: static_page,
        x: left,
        y: top,
        width: (env.geometry.page_width(static_page) - left - env.geometry.margin(Side::Right))
            .max(0.0),
        height: (env.geometry.page_height(static_page) - top - env.geometry.margin(Side::Bottom))
            .max(0.0),
    }
}

fn offset_value(
    tree: &mut BoxTree,
    id: BoxId,
    property: &str,
    font_size: f32,
    percent_base: f32,
) -> Option<f32> {
    let value = tree.resolved_value(id, property)?;
    if value == "auto" {
        return None;
    }
    parse_length(&value).map(|l| l.resolve_against(font_size, percent_base))
}

/// [§ 10.3.5 Floating, non-replaced elements](https://www.w3.org/TR/CSS2/visudet.html#float-width)
///
/// "min(max(preferred minimum width, available width), preferred width)"
fn shrink_to_fit(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    id: BoxId,
    available: f32,
) -> Result<f32, LayoutError> {
    let preferred_min = block::measure_min_content(tree, env, id)?;
    let preferred = block::measure_max_content(tree, env, id)?;
    Ok(preferred_min.max(available.min(preferred)).max(0.0))
}

/// Natural height probe: lay the box out at its solved width and read the
/// resulting extent, then discard the fragments.
fn natural_height(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    id: BoxId,
    page: usize,
    x: f32,
    width: f32,
) -> Result<f32, LayoutError> {
    let mut probe = PageState::detached(page, 0.0, x, x + width);
    let start = probe.y;
    let _ = block::layout_block(tree, env, id, &mut probe, false, 0.0, false, None)?;
    let height = (probe.y - start).max(0.0);
    tree.reset_subtree_layout(id);
    Ok(height)
}
