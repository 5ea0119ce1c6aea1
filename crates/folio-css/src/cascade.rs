//! Per-node cascade resolution with lazy caching.
//!
//! [§ 6 Cascading](https://www.w3.org/TR/css-cascade-4/#cascading)
//!
//! "The cascade takes an unordered list of declared values for a given
//! property on a given element, sorts them by their declaration's
//! precedence..."
//!
//! The fold runs once per node, on first style access: every ruleset of the
//! bound stylesheet is matched in document order, and a matching ruleset's
//! declarations overwrite a cached property only when their specificity is
//! greater than or equal to the stored one — document order breaks ties in
//! favor of the later ruleset. The inline `style=""` attribute folds last at
//! [`Specificity::INLINE`], outranking every matched ruleset. Lookups that
//! find nothing are remembered in a negative set.

use folio_common::warning::warn_once;

use crate::device::{FontSpec, FontStyle};
use crate::style::values::{
    AutoLength, Color, Length, expand_box_shorthand, parse_auto_length, parse_color, parse_length,
};
use crate::style::{Specificity, parse_declaration_block};
use crate::tree::{BoxId, BoxTree, ElementKind};

impl BoxTree {
    /// The cascaded value of `property` on `node`, or `None` when unset.
    ///
    /// First access for a node folds the whole stylesheet into the node's
    /// cache; later accesses are hash lookups. Misses are cached too.
    pub fn resolved_value(&mut self, id: BoxId, property: &str) -> Option<String> {
        self.fold_rulesets(id);

        let node = self.node(id);
        if node.style_misses.contains(property) {
            return None;
        }
        if let Some((value, _)) = node.style_cache.get(property) {
            return Some(value.clone());
        }
        let _ = self.node_mut(id).style_misses.insert(property.to_string());
        None
    }

    /// The cascaded value of `property`, falling back to the static
    /// per-tag default table when the author left it unset.
    pub fn styled_or_default(&mut self, id: BoxId, property: &str) -> Option<String> {
        if let Some(value) = self.resolved_value(id, property) {
            return Some(value);
        }
        self.node(id)
            .element_kind()
            .and_then(|kind| tag_default(kind, property))
            .map(ToString::to_string)
    }

    /// The cascaded value of an inherited property: this node first, then
    /// each ancestor, tag defaults consulted at every step.
    pub fn inherited_value(&mut self, id: BoxId, property: &str) -> Option<String> {
        if let Some(value) = self.styled_or_default(id, property) {
            return Some(value);
        }
        let ancestors: Vec<BoxId> = self.ancestors(id).collect();
        for ancestor in ancestors {
            if let Some(value) = self.styled_or_default(ancestor, property) {
                return Some(value);
            }
        }
        None
    }

    fn fold_rulesets(&mut self, id: BoxId) {
        if self.node(id).cascade_done {
            return;
        }
        self.node_mut(id).cascade_done = true;

        if let Some(sheet) = self.stylesheet() {
            for rule in &sheet.rules {
                let Some(specificity) = rule.selector.match_node(self, id) else {
                    continue;
                };
                for decl in &rule.declarations {
                    self.fold_declaration(id, &decl.name, &decl.value, specificity);
                }
            }
        }

        // [§ 6.4 Cascade Sorting Order](https://www.w3.org/TR/css-cascade-4/#cascade-sort)
        //
        // The style attribute wins over any matched ruleset.
        if let Some(inline) = self.node(id).attr("style").map(ToString::to_string) {
            for decl in parse_declaration_block(&inline) {
                self.fold_declaration(id, &decl.name, &decl.value, Specificity::INLINE);
            }
        }
    }

    /// Fold one declaration into the node's cache, expanding aggregate
    /// properties into their per-side longhands.
    fn fold_declaration(&mut self, id: BoxId, name: &str, value: &str, specificity: Specificity) {
        match name {
            "margin" | "padding" | "border-width" | "border-color" => {
                let Some(sides) = expand_box_shorthand(value) else {
                    warn_once("style", &format!("unsupported {name} value '{value}'"));
                    return;
                };
                let (prefix, suffix) = match name {
                    "margin" => ("margin", ""),
                    "padding" => ("padding", ""),
                    "border-width" => ("border", "-width"),
                    _ => ("border", "-color"),
                };
                for (side, side_value) in ["top", "right", "bottom", "left"].iter().zip(sides) {
                    self.store_declaration(
                        id,
                        &format!("{prefix}-{side}{suffix}"),
                        &side_value,
                        specificity,
                    );
                }
            }
            // `border` sets all four sides to the same composite value;
            // per-side composites are split by the border_* accessors.
            "border" => {
                for side in ["top", "right", "bottom", "left"] {
                    self.store_declaration(id, &format!("border-{side}"), value, specificity);
                }
            }
            _ => self.store_declaration(id, name, value, specificity),
        }
    }

    fn store_declaration(&mut self, id: BoxId, name: &str, value: &str, specificity: Specificity) {
        let node = self.node_mut(id);
        match node.style_cache.get(name) {
            Some((_, stored)) if specificity < *stored => {}
            _ => {
                let _ = node
                    .style_cache
                    .insert(name.to_string(), (value.to_string(), specificity));
            }
        }
    }

    // ── Typed accessors used by layout ─────────────────────────────────

    /// A length-valued property (tag defaults included), resolved later by
    /// the caller against font size and percentage base.
    pub fn length_property(&mut self, id: BoxId, property: &str) -> Option<Length> {
        let value = self.styled_or_default(id, property)?;
        let parsed = parse_length(&value);
        if parsed.is_none() {
            warn_once(
                "style",
                &format!("unsupported {property} value '{value}', ignoring"),
            );
        }
        parsed
    }

    /// A margin side: `auto`, a length, or the default 0.
    pub fn margin_value(&mut self, id: BoxId, side: &str) -> AutoLength {
        let Some(value) = self.styled_or_default(id, &format!("margin-{side}")) else {
            return AutoLength::Length(Length::Px(0.0));
        };
        parse_auto_length(&value).unwrap_or_else(|| {
            warn_once(
                "style",
                &format!("unsupported margin-{side} value '{value}', using 0"),
            );
            AutoLength::Length(Length::Px(0.0))
        })
    }

    /// A padding side in unresolved length form, default 0.
    pub fn padding_value(&mut self, id: BoxId, side: &str) -> Length {
        self.length_property(id, &format!("padding-{side}"))
            .unwrap_or(Length::Px(0.0))
    }

    /// The border width of one side in pixels.
    ///
    /// Checks `border-{side}-width` first, then the width component of the
    /// `border-{side}` composite. A border style of `none` or `hidden`
    /// forces zero.
    pub fn border_width(&mut self, id: BoxId, side: &str) -> f32 {
        if matches!(self.border_style(id, side).as_deref(), Some("none" | "hidden")) {
            return 0.0;
        }
        let font_size = self.node(id).font.size;
        if let Some(len) = self.length_property(id, &format!("border-{side}-width")) {
            return len.resolve(font_size, None).unwrap_or(0.0).max(0.0);
        }
        if let Some(composite) = self.resolved_value(id, &format!("border-{side}")) {
            if let Some(len) = composite.split_whitespace().find_map(parse_length) {
                return len.resolve(font_size, None).unwrap_or(0.0).max(0.0);
            }
            // "border: solid" style without width: medium = 3px.
            if composite.split_whitespace().any(|t| t != "none" && t != "hidden") {
                return 3.0;
            }
        }
        0.0
    }

    /// The border style keyword of one side, from `border-{side}-style` or
    /// the `border-{side}` composite.
    pub fn border_style(&mut self, id: BoxId, side: &str) -> Option<String> {
        if let Some(style) = self.resolved_value(id, &format!("border-{side}-style")) {
            return Some(style);
        }
        let composite = self.resolved_value(id, &format!("border-{side}"))?;
        composite
            .split_whitespace()
            .find(|token| {
                matches!(
                    *token,
                    "none" | "hidden" | "solid" | "dotted" | "dashed" | "double" | "groove"
                        | "ridge" | "inset" | "outset"
                )
            })
            .map(ToString::to_string)
    }

    /// The border color of one side, defaulting to the text color.
    pub fn border_color(&mut self, id: BoxId, side: &str) -> Color {
        let explicit = self
            .resolved_value(id, &format!("border-{side}-color"))
            .as_deref()
            .and_then(parse_color);
        if let Some(color) = explicit {
            return color;
        }
        if let Some(composite) = self.resolved_value(id, &format!("border-{side}")) {
            if let Some(color) = composite.split_whitespace().find_map(parse_color) {
                return color;
            }
        }
        self.text_color(id)
    }

    /// The inherited text color, default black.
    pub fn text_color(&mut self, id: BoxId) -> Color {
        self.inherited_value(id, "color")
            .as_deref()
            .and_then(parse_color)
            .unwrap_or(Color::BLACK)
    }

    /// Resolve fonts for every node, top-down: `em` and percentage font
    /// sizes are relative to the parent's resolved size; family, weight,
    /// and style inherit when unset.
    pub fn resolve_fonts(&mut self) {
        let Some(root) = self.root() else { return };
        self.resolve_font_node(root, &FontSpec::default());
    }

    fn resolve_font_node(&mut self, id: BoxId, parent: &FontSpec) {
        let mut font = parent.clone();

        if let Some(value) = self.styled_or_default(id, "font-size") {
            match parse_length(&value) {
                Some(Length::Px(px)) => font.size = px,
                Some(Length::Em(em)) => font.size = parent.size * em,
                Some(Length::Percent(p)) => font.size = parent.size * p / 100.0,
                None => warn_once("style", &format!("unsupported font-size value '{value}'")),
            }
        }
        if let Some(value) = self.styled_or_default(id, "font-weight") {
            match value.as_str() {
                "bold" => font.weight = 700,
                "normal" => font.weight = 400,
                other => match other.parse::<u16>() {
                    Ok(weight) => font.weight = weight,
                    Err(_) => {
                        warn_once("style", &format!("unsupported font-weight value '{other}'"));
                    }
                },
            }
        }
        if let Some(value) = self.styled_or_default(id, "font-style") {
            match value.as_str() {
                "italic" | "oblique" => font.style = FontStyle::Italic,
                "normal" => font.style = FontStyle::Normal,
                other => warn_once("style", &format!("unsupported font-style value '{other}'")),
            }
        }
        if let Some(value) = self.styled_or_default(id, "font-family") {
            font.family = value;
        }

        self.node_mut(id).font = font.clone();
        let children = self.node(id).children.clone();
        for child in children {
            self.resolve_font_node(child, &font);
        }
    }
}

/// The static per-tag default style table.
///
/// These are data, not behavior: the margins, sizes, and weights a bare
/// document gets with no stylesheet at all.
#[must_use]
pub fn tag_default(kind: ElementKind, property: &str) -> Option<&'static str> {
    let value = match (kind, property) {
        (ElementKind::P | ElementKind::Ul | ElementKind::Ol | ElementKind::Pre, "margin-top")
        | (
            ElementKind::P | ElementKind::Ul | ElementKind::Ol | ElementKind::Pre,
            "margin-bottom",
        )
        | (ElementKind::Blockquote, "margin-top" | "margin-bottom") => "1em",
        (ElementKind::Blockquote, "margin-left" | "margin-right") => "40px",
        (ElementKind::Ul | ElementKind::Ol, "padding-left") => "40px",

        (ElementKind::H1, "font-size") => "2em",
        (ElementKind::H1, "margin-top" | "margin-bottom") => "0.67em",
        (ElementKind::H2, "font-size") => "1.5em",
        (ElementKind::H2, "margin-top" | "margin-bottom") => "0.83em",
        (ElementKind::H3, "font-size") => "1.17em",
        (ElementKind::H3, "margin-top" | "margin-bottom") => "1em",
        (ElementKind::H4, "margin-top" | "margin-bottom") => "1.33em",
        (ElementKind::H5, "font-size") => "0.83em",
        (ElementKind::H5, "margin-top" | "margin-bottom") => "1.67em",
        (ElementKind::H6, "font-size") => "0.67em",
        (ElementKind::H6, "margin-top" | "margin-bottom") => "2.33em",
        (
            ElementKind::H1
            | ElementKind::H2
            | ElementKind::H3
            | ElementKind::H4
            | ElementKind::H5
            | ElementKind::H6
            | ElementKind::B
            | ElementKind::Strong
            | ElementKind::Th,
            "font-weight",
        ) => "bold",
        (ElementKind::I | ElementKind::Em, "font-style") => "italic",
        (ElementKind::Pre | ElementKind::Code, "font-family") => "monospace",

        (ElementKind::Th, "text-align") => "center",
        (ElementKind::Td | ElementKind::Th, "padding-top")
        | (ElementKind::Td | ElementKind::Th, "padding-right")
        | (ElementKind::Td | ElementKind::Th, "padding-bottom")
        | (ElementKind::Td | ElementKind::Th, "padding-left") => "1px",

        (ElementKind::Hr, "margin-top" | "margin-bottom") => "8px",
        (ElementKind::Hr, "height") => "2px",
        (ElementKind::Hr, "background-color") => "#000000",

        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::style::{SimpleSelector, Stylesheet};
    use crate::tree::BoxKind;

    fn tree_with_p() -> (BoxTree, BoxId) {
        let mut tree = BoxTree::build(&folio_dom::ElementTree::new());
        let body = tree.alloc(BoxKind::Element(ElementKind::Body));
        tree.set_root(body);
        let p = tree.alloc(BoxKind::Element(ElementKind::P));
        tree.append_child(body, p);
        (tree, p)
    }

    fn sheet(rules: &[(&str, &str)]) -> Rc<Stylesheet> {
        let mut sheet = Stylesheet::new();
        for (selector, block) in rules {
            sheet.push(
                Rc::new(SimpleSelector::parse(selector).unwrap()),
                parse_declaration_block(block),
            );
        }
        Rc::new(sheet)
    }

    #[test]
    fn later_ruleset_wins_specificity_ties() {
        let (mut tree, p) = tree_with_p();
        tree.bind_stylesheet(sheet(&[("p", "color: #111"), ("p", "color: #222")]));
        assert_eq!(tree.resolved_value(p, "color").as_deref(), Some("#222"));
    }

    #[test]
    fn higher_specificity_wins_regardless_of_order() {
        let (mut tree, p) = tree_with_p();
        let _ = tree
            .node_mut(p)
            .classes
            .insert("note".to_string());
        tree.bind_stylesheet(sheet(&[(".note", "color: #111"), ("p", "color: #222")]));
        assert_eq!(tree.resolved_value(p, "color").as_deref(), Some("#111"));
    }

    #[test]
    fn inline_style_outranks_rulesets() {
        let (mut tree, p) = tree_with_p();
        let _ = tree
            .node_mut(p)
            .attrs
            .insert("style".to_string(), "color: #abc".to_string());
        tree.bind_stylesheet(sheet(&[("p", "color: #222")]));
        assert_eq!(tree.resolved_value(p, "color").as_deref(), Some("#abc"));
    }

    #[test]
    fn shorthand_expands_to_sides() {
        let (mut tree, p) = tree_with_p();
        tree.bind_stylesheet(sheet(&[("p", "margin: 1px 2px 3px 4px; padding: 5px")]));
        assert_eq!(tree.resolved_value(p, "margin-top").as_deref(), Some("1px"));
        assert_eq!(tree.resolved_value(p, "margin-right").as_deref(), Some("2px"));
        assert_eq!(
            tree.resolved_value(p, "margin-bottom").as_deref(),
            Some("3px")
        );
        assert_eq!(tree.resolved_value(p, "margin-left").as_deref(), Some("4px"));
        assert_eq!(tree.resolved_value(p, "padding-left").as_deref(), Some("5px"));
    }

    #[test]
    fn border_composite_provides_width_and_color() {
        let (mut tree, p) = tree_with_p();
        tree.bind_stylesheet(sheet(&[("p", "border: 2px solid #ddd")]));
        assert!((tree.border_width(p, "top") - 2.0).abs() < 0.01);
        assert_eq!(tree.border_color(p, "left"), Color::rgb(0xdd, 0xdd, 0xdd));
        assert_eq!(tree.border_style(p, "bottom").as_deref(), Some("solid"));
    }

    #[test]
    fn misses_are_cached() {
        let (mut tree, p) = tree_with_p();
        tree.bind_stylesheet(sheet(&[]));
        assert!(tree.resolved_value(p, "width").is_none());
        assert!(tree.node(p).style_misses.contains("width"));
    }

    #[test]
    fn fonts_resolve_relative_to_parent() {
        let (mut tree, p) = tree_with_p();
        let root = tree.root().unwrap();
        tree.bind_stylesheet(sheet(&[("body", "font-size: 20px"), ("p", "font-size: 1.5em")]));
        tree.resolve_fonts();
        assert!((tree.node(root).font.size - 20.0).abs() < 0.01);
        assert!((tree.node(p).font.size - 30.0).abs() < 0.01);
    }
}
