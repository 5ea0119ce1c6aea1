//! Painting one page of the laid-out tree.
//!
//! Walks the box tree and draws, for every fragment on the requested page:
//! background fill, border strips, text runs, and images. Parents paint
//! before their descendants; `position: relative` offsets are applied as a
//! scoped device translation, saved and restored symmetrically around the
//! subtree.

use folio_css::style::values::parse_color;
use folio_css::{BoxId, BoxTree, Color, ElementKind, Length, PositionScheme};

use crate::device::Device;

/// Paint everything that landed on `page`.
pub fn paint_page(tree: &mut BoxTree, device: &mut dyn Device, page: usize) {
    if let Some(root) = tree.root() {
        paint_node(tree, device, root, page);
    }
}

fn paint_node(tree: &mut BoxTree, device: &mut dyn Device, id: BoxId, page: usize) {
    let offset = relative_offset(tree, id);
    if let Some((dx, dy)) = offset {
        device.save();
        device.translate(dx, dy);
    }

    paint_block_fragments(tree, device, id, page);
    paint_inline_fragments(tree, device, id, page);

    let children = tree.node(id).children.clone();
    for child in children {
        paint_node(tree, device, child, page);
    }

    if offset.is_some() {
        device.restore();
    }
}

/// [§ 9.4.3 Relative positioning](https://www.w3.org/TR/CSS2/visuren.html#relative-positioning)
///
/// "If 'right' is 'auto', its used value is minus the value of 'left'";
/// over-constrained pairs resolve in favor of `left` and `top`.
fn relative_offset(tree: &mut BoxTree, id: BoxId) -> Option<(f32, f32)> {
    if tree.node(id).position != PositionScheme::Relative {
        return None;
    }
    let font_size = tree.node(id).font.size;
    let resolve = |tree: &mut BoxTree, prop: &str| {
        tree.resolved_value(id, prop)
            .as_deref()
            .filter(|v| *v != "auto")
            .and_then(folio_css::style::values::parse_length)
            .map(|l| match l {
                Length::Percent(_) => 0.0,
                other => other.resolve_against(font_size, 0.0),
            })
    };
    let dx = match (resolve(tree, "left"), resolve(tree, "right")) {
        (Some(left), _) => left,
        (None, Some(right)) => -right,
        (None, None) => 0.0,
    };
    let dy = match (resolve(tree, "top"), resolve(tree, "bottom")) {
        (Some(top), _) => top,
        (None, Some(bottom)) => -bottom,
        (None, None) => 0.0,
    };
    Some((dx, dy))
}

fn paint_block_fragments(tree: &mut BoxTree, device: &mut dyn Device, id: BoxId, page: usize) {
    let fragments: Vec<_> = tree
        .node(id)
        .block_fragments
        .iter()
        .filter(|f| f.page == page)
        .copied()
        .collect();
    if fragments.is_empty() {
        return;
    }

    let background = tree
        .styled_or_default(id, "background-color")
        .as_deref()
        .and_then(parse_color);
    let is_image = tree.node(id).element_kind() == Some(ElementKind::Img);
    let src = tree.node(id).attr("src").map(ToString::to_string);

    for fragment in fragments {
        if let Some(color) = background {
            device.fill_rect(fragment.x, fragment.y, fragment.width, fragment.height, color);
        }
        paint_borders(tree, device, id, fragment.x, fragment.y, fragment.width, fragment.height);
        if is_image {
            if let Some(ref src) = src {
                device.draw_image(src, fragment.x, fragment.y, fragment.width, fragment.height);
            }
        }
    }
}

fn paint_inline_fragments(tree: &mut BoxTree, device: &mut dyn Device, id: BoxId, page: usize) {
    if tree.node(id).inline_fragments.is_empty() {
        return;
    }
    let node = tree.node(id);
    let is_text = node.is_text();
    let is_image = node.element_kind() == Some(ElementKind::Img);
    let text = node.text.clone();
    let font = node.font.clone();
    let src = node.attr("src").map(ToString::to_string);
    let fragments: Vec<_> = node
        .inline_fragments
        .iter()
        .filter(|f| f.page == page)
        .cloned()
        .collect();
    if fragments.is_empty() {
        return;
    }
    let color = tree.text_color(id);

    for fragment in fragments {
        if is_text {
            let run = &text[fragment.text_range.clone()];
            device.draw_text(&font, fragment.x, fragment.y + fragment.baseline, run, color);
        } else if is_image {
            if let Some(ref src) = src {
                device.draw_image(src, fragment.x, fragment.y, fragment.width, fragment.height);
            }
        }
    }
}

/// Draw each border side that has width and a visible style as a filled
/// strip along the fragment edge.
#[allow(clippy::too_many_arguments)]
fn paint_borders(
    tree: &mut BoxTree,
    device: &mut dyn Device,
    id: BoxId,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) {
    let sides: [(&str, fn(f32, f32, f32, f32, f32) -> (f32, f32, f32, f32)); 4] = [
        ("top", |x, y, w, _h, bw| (x, y, w, bw)),
        ("bottom", |x, y, w, h, bw| (x, y + h - bw, w, bw)),
        ("left", |x, y, _w, h, bw| (x, y, bw, h)),
        ("right", |x, y, w, h, bw| (x + w - bw, y, bw, h)),
    ];
    for (side, rect_for) in sides {
        let border_width = tree.border_width(id, side);
        if border_width <= 0.0 {
            continue;
        }
        let color = tree.border_color(id, side);
        let (bx, by, bw, bh) = rect_for(x, y, width, height, border_width);
        device.fill_rect(bx, by, bw, bh, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_css::{FontMetrics, FontSpec, TextMeasurement, TextMeasurer};

    #[derive(Default)]
    struct CountingDevice {
        rects: Vec<(f32, f32, f32, f32, Color)>,
        texts: Vec<(f32, f32, String)>,
        saves: usize,
        restores: usize,
        translations: Vec<(f32, f32)>,
    }

    impl TextMeasurer for CountingDevice {
        fn measure_text(
            &self,
            _font: &FontSpec,
            text: &str,
            _max_width: Option<f32>,
        ) -> TextMeasurement {
            TextMeasurement {
                consumed: text.len(),
                width: 0.0,
                next_width: 0.0,
            }
        }

        fn font_metrics(&self, font: &FontSpec) -> FontMetrics {
            FontMetrics {
                ascent: font.size * 0.8,
                height: font.size,
                leading: font.size * 0.2,
            }
        }
    }

    impl Device for CountingDevice {
        fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
            self.rects.push((x, y, width, height, color));
        }

        fn draw_line(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: Color) {}

        fn draw_text(&mut self, _font: &FontSpec, x: f32, y: f32, text: &str, _color: Color) {
            self.texts.push((x, y, text.to_string()));
        }

        fn draw_image(&mut self, _: &str, _: f32, _: f32, _: f32, _: f32) {}

        fn save(&mut self) {
            self.saves += 1;
        }

        fn restore(&mut self) {
            self.restores += 1;
        }

        fn translate(&mut self, dx: f32, dy: f32) {
            self.translations.push((dx, dy));
        }
    }

    #[test]
    fn relative_boxes_scope_their_translation() {
        use folio_css::style::Stylesheet;
        use folio_css::tree::{BlockFragment, BoxKind};
        use std::rc::Rc;

        let mut tree = BoxTree::build(&folio_dom::ElementTree::new());
        let div = tree.alloc(BoxKind::Element(ElementKind::Div));
        tree.set_root(div);
        let _ = tree
            .node_mut(div)
            .attrs
            .insert("style".to_string(), "left: 5px; top: 7px".to_string());
        tree.node_mut(div).position = PositionScheme::Relative;
        tree.node_mut(div).block_fragments.push(BlockFragment {
            page: 0,
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        });
        tree.bind_stylesheet(Rc::new(Stylesheet::new()));

        let mut device = CountingDevice::default();
        paint_page(&mut tree, &mut device, 0);

        assert_eq!(device.saves, 1);
        assert_eq!(device.restores, 1);
        assert_eq!(device.translations, vec![(5.0, 7.0)]);
    }
}
