//! Inline layout: greedy line filling with float re-flow.
//!
//! [§ 9.4.2 Inline formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#inline-formatting)
//!
//! "In an inline formatting context, boxes are laid out horizontally, one
//! after the other, beginning at the top of a containing block."
//!
//! Runs of text and replaced content accumulate into a [`Line`] while they
//! fit the current band; on overflow the line is finished (alignment
//! applied, fragments committed) and a new one starts a line height lower.
//! A line whose bottom would cross the page edge moves wholesale to the
//! next page.

use std::ops::Range;

use folio_common::warning::warn_once;

use crate::block::{LayoutEnv, image_size};
use crate::device::{FontSpec, TextMeasurer};
use crate::error::LayoutError;
use crate::float::{self, EPSILON};
use crate::page::PageState;
use crate::tree::{BoxId, BoxKind, BoxTree, ElementKind, InlineFragment};

/// [§ 16.2 Alignment: the 'text-align' property](https://www.w3.org/TR/CSS2/text.html#alignment-prop)
///
/// "This property describes how inline-level content of a block container
/// is aligned."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    /// Anchor lines to the band's left edge.
    #[default]
    Left,
    /// Split the leftover width evenly.
    Center,
    /// Anchor lines to the band's right edge.
    Right,
    /// Shares left-anchoring with `Left`; no inter-word stretching.
    Justify,
}

impl TextAlign {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(TextAlign::Left),
            "center" => Some(TextAlign::Center),
            "right" => Some(TextAlign::Right),
            "justify" => Some(TextAlign::Justify),
            _ => None,
        }
    }
}

/// [§ 10.8 Line height calculations](https://www.w3.org/TR/CSS2/visudet.html#line-height)
///
/// Baseline policy for replaced content on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum VerticalAlign {
    /// The box's bottom sits on the baseline.
    #[default]
    Baseline,
    /// The box's midpoint sits on the baseline.
    Middle,
    /// The box's top aligns with the top of the text.
    TextTop,
}

/// One placed item on the line being built.
#[derive(Debug, Clone)]
struct LineItem {
    node: BoxId,
    x: f32,
    /// Text range for text runs; empty for replaced content.
    range: Range<usize>,
    width: f32,
    /// Distance the item extends above the baseline.
    ascent: f32,
    /// Total item height.
    height: f32,
    /// Measured width of the item's trailing space.
    space_width: f32,
}

/// The line box accumulator.
///
/// Created per visual line; consumed by `finish` (which applies alignment
/// and commits fragments) and either discarded or continued via a fresh
/// line at the next y.
#[derive(Debug)]
struct Line {
    start_x: f32,
    end_x: f32,
    x: f32,
    y: f32,
    page: usize,
    items: Vec<LineItem>,
    /// Trailing space of the last item, applied when another item follows.
    pending_space: f32,
}

/// Inline layout over the children of one block container.
struct LineFlow<'e> {
    env: &'e LayoutEnv<'e>,
    align: TextAlign,
    can_grow: bool,
    parent: BoxId,
    line: Line,
}

/// Lay out the inline-level children of `parent` into lines.
///
/// The cursor enters at the top of the content band and leaves below the
/// last line.
///
/// # Errors
///
/// Fatal layout failures only: a degenerate page during a page advance, or
/// a measured run with zero width where content exists.
pub fn layout_inline_children(
    tree: &mut BoxTree,
    env: &LayoutEnv<'_>,
    parent: BoxId,
    state: &mut PageState,
    can_grow: bool,
) -> Result<(), LayoutError> {
    let align = tree
        .inherited_value(parent, "text-align")
        .and_then(|v| {
            let parsed = TextAlign::parse(&v);
            if parsed.is_none() {
                warn_once("line", &format!("unsupported text-align value '{v}'"));
            }
            parsed
        })
        .unwrap_or_default();

    let mut flow = LineFlow {
        env,
        align,
        can_grow,
        parent,
        line: new_line(tree, state),
    };

    flow_children(tree, &mut flow, state, parent)?;

    if !flow.line.items.is_empty() {
        finish_line(tree, &mut flow, state, false)?;
    }
    Ok(())
}

fn new_line(tree: &BoxTree, state: &PageState) -> Line {
    let (left, right) = float::available_band(
        tree,
        &state.floats,
        state.y,
        state.page,
        (state.min_x, state.max_x),
    );
    Line {
        start_x: left,
        end_x: right,
        x: left,
        y: state.y,
        page: state.page,
        items: Vec::new(),
        pending_space: 0.0,
    }
}

fn flow_children(
    tree: &mut BoxTree,
    flow: &mut LineFlow<'_>,
    state: &mut PageState,
    id: BoxId,
) -> Result<(), LayoutError> {
    let children = tree.node(id).children.clone();
    for child in children {
        if tree.node(child).position.is_out_of_flow() {
            // Deferred to the absolute resolver; remember where the box
            // would have gone.
            tree.node_mut(child).static_position = Some((flow.line.page, flow.line.x, flow.line.y));
            continue;
        }
        if tree.node(child).float_side.is_some() {
            float::place_float(tree, flow.env, child, state, flow.can_grow)?;
            reflow_after_float(tree, flow, state)?;
            continue;
        }
        match tree.node(child).kind {
            BoxKind::Text => flow_text(tree, flow, state, child)?,
            BoxKind::Element(ElementKind::Br) => {
                finish_line(tree, flow, state, true)?;
            }
            BoxKind::Element(ElementKind::Img) => flow_image(tree, flow, state, child)?,
            // Inline elements contribute their contents to the same line.
            _ => flow_children(tree, flow, state, child)?,
        }
    }
    Ok(())
}

/// A float placed mid-line narrows the band; if the line no longer fits,
/// break it and continue below.
fn reflow_after_float(
    tree: &mut BoxTree,
    flow: &mut LineFlow<'_>,
    state: &mut PageState,
) -> Result<(), LayoutError> {
    let (left, right) = float::available_band(
        tree,
        &state.floats,
        flow.line.y,
        flow.line.page,
        (state.min_x, state.max_x),
    );
    if flow.line.items.is_empty() {
        flow.line.start_x = left;
        flow.line.x = left;
    }
    flow.line.end_x = right;
    if flow.line.x > right + EPSILON {
        finish_line(tree, flow, state, false)?;
    }
    Ok(())
}

fn space_width(measurer: &dyn TextMeasurer, font: &FontSpec) -> f32 {
    measurer.measure_text(font, " ", None).width.max(0.0)
}

fn flow_text(
    tree: &mut BoxTree,
    flow: &mut LineFlow<'_>,
    state: &mut PageState,
    id: BoxId,
) -> Result<(), LayoutError> {
    let text = tree.node(id).text.clone();
    if text.is_empty() {
        return Ok(());
    }
    let font = tree.node(id).font.clone();
    let metrics = flow.env.measurer.font_metrics(&font);
    let item_height = metrics.line_height();
    let item_ascent = metrics.ascent + metrics.leading / 2.0;
    let trailing_space = space_width(flow.env.measurer, &font);

    let mut pos = 0usize;
    while pos < text.len() {
        let rest = &text[pos..];
        let avail = (flow.line.end_x - flow.line.x - flow.line.pending_space).max(0.0);
        let measured = flow.env.measurer.measure_text(&font, rest, Some(avail));

        if measured.consumed == 0 {
            if !flow.line.items.is_empty() {
                // Retry on a fresh line.
                finish_line(tree, flow, state, false)?;
                continue;
            }
            // A single unit wider than the whole empty band.
            let needed = measured.next_width;
            if needed <= 0.0 {
                // Leading whitespace only; the measurer always consumes it.
                return Err(LayoutError::Invariant(format!(
                    "unbreakable run measured at zero width: '{rest}'"
                )));
            }
            if flow.can_grow {
                let new_max = state.max_x.max(flow.line.x + needed);
                state.set_band(state.min_x, new_max);
                state.record_extent(new_max);
                flow.line.end_x = flow.line.end_x.max(flow.line.x + needed);
                continue;
            }
            if !state.floats.is_empty() {
                float::clear_floats_for_width(tree, state, flow.env, needed)?;
                flow.line = new_line(tree, state);
                continue;
            }
            // Nothing can widen the band: place the word overflowing. The
            // line break still happened; the word itself is not truncated.
            let overflowing = flow.env.measurer.measure_text(&font, rest, Some(needed));
            push_item(
                flow,
                LineItem {
                    node: id,
                    x: 0.0,
                    range: pos..pos + trimmed_len(&text[pos..pos + overflowing.consumed]),
                    width: overflowing.width,
                    ascent: item_ascent,
                    height: item_height,
                    space_width: trailing_space,
                },
                ends_with_space(&text[pos..pos + overflowing.consumed]),
            );
            state.record_extent(flow.line.x);
            pos += overflowing.consumed;
            if pos < text.len() {
                finish_line(tree, flow, state, false)?;
            }
            continue;
        }

        if measured.width <= 0.0 && !rest[..measured.consumed].trim().is_empty() {
            return Err(LayoutError::Invariant(format!(
                "measured run has zero width: '{}'",
                &rest[..measured.consumed]
            )));
        }

        if measured.width > 0.0 {
            push_item(
                flow,
                LineItem {
                    node: id,
                    x: 0.0,
                    range: pos..pos + trimmed_len(&text[pos..pos + measured.consumed]),
                    width: measured.width,
                    ascent: item_ascent,
                    height: item_height,
                    space_width: trailing_space,
                },
                ends_with_space(&rest[..measured.consumed]),
            );
        } else if !flow.line.items.is_empty() {
            // A run that begins with the space separating it from the
            // previous sibling: keep it pending, to materialize only if
            // more content lands on this line.
            flow.line.pending_space = flow.line.pending_space.max(trailing_space);
        }
        pos += measured.consumed;
        if pos < text.len() {
            // More text than the line could take: break here.
            finish_line(tree, flow, state, false)?;
        }
    }
    Ok(())
}

/// Byte length of `run` with trailing ASCII whitespace removed.
fn trimmed_len(run: &str) -> usize {
    run.trim_end().len()
}

fn ends_with_space(run: &str) -> bool {
    run.ends_with(|c: char| c.is_whitespace())
}

fn push_item(flow: &mut LineFlow<'_>, mut item: LineItem, trailing_space: bool) {
    // The previous item's trailing space materializes now that it is not
    // line-final.
    flow.line.x += flow.line.pending_space;
    flow.line.pending_space = 0.0;

    item.x = flow.line.x;
    flow.line.x += item.width;
    if trailing_space {
        flow.line.pending_space = item.space_width;
    }
    flow.line.items.push(item);
}

fn flow_image(
    tree: &mut BoxTree,
    flow: &mut LineFlow<'_>,
    state: &mut PageState,
    id: BoxId,
) -> Result<(), LayoutError> {
    let (width, height) = image_size(tree, flow.env, id, state);
    if width <= 0.0 || height <= 0.0 {
        return Ok(());
    }

    // Break first if the image does not fit the current line.
    if flow.line.x + flow.line.pending_space + width > flow.line.end_x + EPSILON
        && !flow.line.items.is_empty()
    {
        finish_line(tree, flow, state, false)?;
    }
    if flow.line.x + width > flow.line.end_x + EPSILON && flow.can_grow {
        let new_max = state.max_x.max(flow.line.x + width);
        state.set_band(state.min_x, new_max);
        state.record_extent(new_max);
        flow.line.end_x = flow.line.end_x.max(flow.line.x + width);
    }

    let font = tree.node(id).font.clone();
    let metrics = flow.env.measurer.font_metrics(&font);
    let valign = match tree.resolved_value(id, "vertical-align").as_deref() {
        Some("middle") => VerticalAlign::Middle,
        Some("text-top") => VerticalAlign::TextTop,
        None | Some("baseline") => VerticalAlign::Baseline,
        Some(other) => {
            warn_once("line", &format!("unsupported vertical-align value '{other}'"));
            VerticalAlign::Baseline
        }
    };
    // [§ 10.8.1](https://www.w3.org/TR/CSS2/visudet.html#leading)
    //
    // baseline: bottom edge sits on the baseline; middle: midpoint on the
    // baseline; text-top: top aligned with the text's ascent box.
    let ascent = match valign {
        VerticalAlign::Baseline => height,
        VerticalAlign::Middle => height / 2.0,
        VerticalAlign::TextTop => metrics.ascent,
    };

    push_item(
        flow,
        LineItem {
            node: id,
            x: 0.0,
            range: 0..0,
            width,
            ascent,
            height,
            space_width: 0.0,
        },
        false,
    );
    state.record_extent(flow.line.x);
    Ok(())
}

/// Finish the current line: move it to the next page if it overflows this
/// one, apply horizontal alignment, commit fragments, and open a new line
/// below.
fn finish_line(
    tree: &mut BoxTree,
    flow: &mut LineFlow<'_>,
    state: &mut PageState,
    forced: bool,
) -> Result<(), LayoutError> {
    let parent_font = tree.node(flow.parent).font.clone();
    let empty_height = flow.env.measurer.font_metrics(&parent_font).line_height();

    let (baseline, height) = if flow.line.items.is_empty() {
        if !forced {
            // Nothing to commit; just refresh the band at the current y.
            flow.line = new_line(tree, state);
            return Ok(());
        }
        (empty_height * 0.8, empty_height)
    } else {
        let baseline = flow
            .line
            .items
            .iter()
            .map(|i| i.ascent)
            .fold(0.0_f32, f32::max);
        let descent = flow
            .line
            .items
            .iter()
            .map(|i| i.height - i.ascent)
            .fold(0.0_f32, f32::max);
        (baseline, baseline + descent)
    };

    // Page overflow: carry the whole line to the next page, unless the
    // line alone is taller than a page.
    let usable_bottom = state.usable_bottom(flow.env.geometry);
    if flow.line.y + height > usable_bottom && height <= page_content_height(flow.env, state) {
        let old_start = flow.line.start_x;
        state.advance_page(tree, flow.env.geometry)?;
        let moved = new_line(tree, state);
        let dx = moved.start_x - old_start;
        let (y, page, start_x, end_x) = (moved.y, moved.page, moved.start_x, moved.end_x);
        for item in &mut flow.line.items {
            item.x += dx;
        }
        flow.line.y = y;
        flow.line.page = page;
        flow.line.x += dx;
        flow.line.start_x = start_x;
        flow.line.end_x = end_x;
    }

    // [§ 16.2](https://www.w3.org/TR/CSS2/text.html#alignment-prop)
    //
    // Justify shares left-anchoring; center splits the leftover; right
    // anchors to the band end. The trailing space never participates.
    let leftover = (flow.line.end_x - flow.line.x).max(0.0);
    let shift = match flow.align {
        TextAlign::Left | TextAlign::Justify => 0.0,
        TextAlign::Center => leftover / 2.0,
        TextAlign::Right => leftover,
    };

    state.record_extent(flow.line.x);

    let line_y = flow.line.y;
    let line_page = flow.line.page;
    for (index, item) in flow.line.items.iter().enumerate() {
        let line_final = index + 1 == flow.line.items.len();
        tree.node_mut(item.node).inline_fragments.push(InlineFragment {
            page: line_page,
            x: item.x + shift,
            y: line_y + (baseline - item.ascent),
            width: item.width,
            height: item.height,
            baseline: item.ascent,
            text_range: item.range.clone(),
            space_width: if line_final { 0.0 } else { item.space_width },
        });
    }

    state.y = line_y + height;
    flow.line = new_line(tree, state);
    Ok(())
}

fn page_content_height(env: &LayoutEnv<'_>, state: &PageState) -> f32 {
    use crate::device::Side;
    env.geometry.page_height(state.page)
        - env.geometry.margin(Side::Top)
        - env.geometry.margin(Side::Bottom)
}
