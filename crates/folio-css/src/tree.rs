//! The box tree: nodes, fragments, and the arena that owns them.
//!
//! [§ 9.2 Controlling box generation](https://www.w3.org/TR/CSS2/visuren.html#box-gen)
//!
//! Built from the external element tree before styling; every later pass
//! (cascade, structure, whitespace, layout) reads and annotates these nodes.
//! All relationships — parent, offset parent, table back-references — are
//! [`BoxId`] indices into one arena, never owning references, so the many
//! back-pointers the layout algorithms need cannot form ownership cycles.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::rc::Rc;

use folio_common::warning::warn_once;
use folio_dom::{ElementTree, NodeId, NodeKind};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::device::FontSpec;
use crate::style::{Specificity, Stylesheet};

/// A type-safe index into a [`BoxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BoxId(pub usize);

/// Block-level and inline element tags the engine knows.
///
/// Unknown tags degrade to [`ElementKind::Div`] (a generic block container)
/// with a logged warning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum ElementKind {
    Html,
    Body,
    Div,
    P,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Blockquote,
    Pre,
    Ul,
    Ol,
    Li,
    Hr,
    Table,
    Thead,
    Tbody,
    Tfoot,
    Tr,
    Td,
    Th,
    Span,
    A,
    B,
    Strong,
    I,
    Em,
    U,
    Code,
    Br,
    Img,
}

impl ElementKind {
    /// Whether this element defaults to block-level display, per the static
    /// per-tag table.
    #[must_use]
    pub const fn default_block(self) -> bool {
        !matches!(
            self,
            ElementKind::Span
                | ElementKind::A
                | ElementKind::B
                | ElementKind::Strong
                | ElementKind::I
                | ElementKind::Em
                | ElementKind::U
                | ElementKind::Code
                | ElementKind::Br
                | ElementKind::Img
        )
    }

    /// Whether this is a table cell (`td`/`th`).
    #[must_use]
    pub const fn is_cell(self) -> bool {
        matches!(self, ElementKind::Td | ElementKind::Th)
    }

    /// Whether this is a table row group (`thead`/`tbody`/`tfoot`).
    #[must_use]
    pub const fn is_row_group(self) -> bool {
        matches!(
            self,
            ElementKind::Thead | ElementKind::Tbody | ElementKind::Tfoot
        )
    }
}

/// What a box-tree node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoxKind {
    /// A box generated by a source element.
    Element(ElementKind),
    /// A run of character data.
    Text,
    /// A synthesized wrapper grouping inline siblings so a block's children
    /// are display-homogeneous.
    Anonymous,
}

/// [§ 9.5 Floats](https://www.w3.org/TR/CSS2/visuren.html#floats)
///
/// "A float is a box that is shifted to the left or right on the current
/// line."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FloatSide {
    /// "The element generates a block box that is floated to the left."
    Left,
    /// "The element generates a block box that is floated to the right."
    Right,
}

/// [§ 9.3.1 Choosing a positioning scheme](https://www.w3.org/TR/CSS2/visuren.html#choose-position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PositionScheme {
    /// "The box is a normal box, laid out according to the normal flow."
    #[default]
    Static,
    /// "The box's position is calculated according to the normal flow.
    /// Then the box is offset relative to its normal position."
    Relative,
    /// "The box's position (and possibly size) is specified with the
    /// 'top', 'right', 'bottom', and 'left' properties."
    Absolute,
    /// "The box's position is calculated according to the 'absolute'
    /// model, but the box is fixed with respect to the page."
    Fixed,
}

impl PositionScheme {
    /// Whether boxes with this scheme establish a containing block for
    /// absolutely positioned descendants.
    #[must_use]
    pub const fn is_positioned(self) -> bool {
        !matches!(self, PositionScheme::Static)
    }

    /// Whether the box is out of the normal flow.
    #[must_use]
    pub const fn is_out_of_flow(self) -> bool {
        matches!(self, PositionScheme::Absolute | PositionScheme::Fixed)
    }
}

/// A table cell's place in its table's grid, assigned during the structure
/// pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellSlot {
    /// Zero-based row index.
    pub row: usize,
    /// Zero-based column index of the first spanned column.
    pub col: usize,
    /// Number of columns spanned (≥ 1).
    pub colspan: usize,
    /// Number of rows spanned (≥ 1).
    pub rowspan: usize,
}

/// Row/column counts for a table subtree. Exactly one node — the table —
/// owns this summary, computed once before layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TableGrid {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

/// One page-scoped border-box rectangle produced by block layout. A block
/// that spans pages owns one fragment per page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlockFragment {
    /// Page index the fragment lies on.
    pub page: usize,
    /// Left edge of the border box.
    pub x: f32,
    /// Top edge of the border box.
    pub y: f32,
    /// Border-box width.
    pub width: f32,
    /// Border-box height (may be zero: an anchor fragment).
    pub height: f32,
}

impl BlockFragment {
    /// Bottom edge of the fragment.
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Right edge of the fragment.
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// One placed piece of inline content: a text span or a replaced box on a
/// line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineFragment {
    /// Page index the fragment lies on.
    pub page: usize,
    /// Left edge.
    pub x: f32,
    /// Top edge of the line area this fragment occupies.
    pub y: f32,
    /// Advance width (trailing space excluded).
    pub width: f32,
    /// Height of the fragment's content.
    pub height: f32,
    /// Baseline offset from `y`.
    pub baseline: f32,
    /// The span of the node's text this fragment covers (empty for
    /// replaced content).
    pub text_range: Range<usize>,
    /// Measured width of the trailing space after this fragment, applied
    /// only when the fragment is not line-final.
    pub space_width: f32,
}

/// A node in the box tree.
///
/// Owns its children (by id, through the arena) and accumulates fragments
/// during layout. A node never holds both non-empty inline and block
/// fragment lists.
#[derive(Debug, Clone)]
pub struct BoxNode {
    /// What this node is.
    pub kind: BoxKind,
    /// Raw attributes copied from the source element.
    pub attrs: HashMap<String, String>,
    /// The element's class names.
    pub classes: HashSet<String>,
    /// Character data (text nodes only; normalized by the whitespace pass).
    pub text: String,
    /// Parent node (back-reference, read-only).
    pub parent: Option<BoxId>,
    /// Ordered children.
    pub children: Vec<BoxId>,

    /// Float side assigned by the structure pass.
    pub float_side: Option<FloatSide>,
    /// Inline-level flag assigned by the structure pass.
    pub inline: bool,
    /// Positioning scheme implied by resolved CSS.
    pub position: PositionScheme,
    /// Grid slot, table cells only.
    pub cell_slot: Option<CellSlot>,
    /// Grid summary, table nodes only.
    pub grid: Option<TableGrid>,
    /// Resolved font for this node's text.
    pub font: FontSpec,

    /// Nearest positioned ancestor, for absolute/fixed descendants.
    pub offset_parent: Option<BoxId>,
    /// Absolutely positioned descendants registered to this node
    /// (a relationship list, not ownership).
    pub abs_descendants: Vec<BoxId>,
    /// Static-flow position recorded for this node when it is absolutely
    /// positioned: `(page, x, y)` where it would have been laid out.
    pub static_position: Option<(usize, f32, f32)>,

    /// Resolved declarations: property → (value, winning specificity).
    pub style_cache: HashMap<String, (String, Specificity)>,
    /// Properties known to be unset, to skip repeat ruleset scans.
    pub style_misses: HashSet<String>,
    /// Whether the ruleset fold has run for this node.
    pub cascade_done: bool,

    /// Block-level fragments, one per page spanned.
    pub block_fragments: Vec<BlockFragment>,
    /// Inline fragments, when laid out as part of an inline run.
    pub inline_fragments: Vec<InlineFragment>,
    /// Content width established during layout; the percentage base for
    /// descendants.
    pub content_width: Option<f32>,
}

impl BoxNode {
    fn new(kind: BoxKind) -> Self {
        BoxNode {
            kind,
            attrs: HashMap::new(),
            classes: HashSet::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            float_side: None,
            inline: false,
            position: PositionScheme::Static,
            cell_slot: None,
            grid: None,
            font: FontSpec::default(),
            offset_parent: None,
            abs_descendants: Vec::new(),
            static_position: None,
            style_cache: HashMap::new(),
            style_misses: HashSet::new(),
            cascade_done: false,
            block_fragments: Vec::new(),
            inline_fragments: Vec::new(),
            content_width: None,
        }
    }

    /// The lowercase tag name, for elements.
    #[must_use]
    pub fn tag_name(&self) -> Option<&str> {
        match &self.kind {
            BoxKind::Element(kind) => Some(kind.as_ref()),
            BoxKind::Text | BoxKind::Anonymous => None,
        }
    }

    /// The element kind, if this node is an element.
    #[must_use]
    pub const fn element_kind(&self) -> Option<ElementKind> {
        match self.kind {
            BoxKind::Element(kind) => Some(kind),
            BoxKind::Text | BoxKind::Anonymous => None,
        }
    }

    /// Whether this is a text node.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self.kind, BoxKind::Text)
    }

    /// Raw attribute lookup.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// The last block fragment, if any.
    #[must_use]
    pub fn last_block_fragment(&self) -> Option<&BlockFragment> {
        self.block_fragments.last()
    }
}

/// Arena of box nodes for one document.
///
/// Created fresh for each render call; nothing persists across renders.
pub struct BoxTree {
    nodes: Vec<BoxNode>,
    root: Option<BoxId>,
    stylesheet: Option<Rc<Stylesheet>>,
}

impl BoxTree {
    /// Build the box tree from an element tree.
    ///
    /// Unknown tags degrade to generic block containers with a logged
    /// warning; `<style>` elements (already consumed by the driver) and
    /// empty non-element roots produce no boxes.
    #[must_use]
    pub fn build(doc: &ElementTree) -> Self {
        let mut tree = BoxTree {
            nodes: Vec::new(),
            root: None,
            stylesheet: None,
        };
        tree.root = doc
            .document_element()
            .and_then(|root| tree.build_node(doc, root));
        tree
    }

    fn build_node(&mut self, doc: &ElementTree, id: NodeId) -> Option<BoxId> {
        let node = doc.get(id)?;
        let box_id = match &node.kind {
            NodeKind::Document => return None,
            NodeKind::Text(text) => {
                let bid = self.alloc(BoxKind::Text);
                self.node_mut(bid).text = text.clone();
                bid
            }
            NodeKind::Element(data) => {
                let tag = data.tag.to_ascii_lowercase();
                if tag == "style" {
                    // Stylesheet payload, collected by the driver before
                    // layout; generates no box.
                    return None;
                }
                let kind = tag.parse::<ElementKind>().unwrap_or_else(|_| {
                    warn_once(
                        "tree",
                        &format!("unknown tag <{tag}>, treating as generic block"),
                    );
                    ElementKind::Div
                });
                let bid = self.alloc(BoxKind::Element(kind));
                {
                    let bx = self.node_mut(bid);
                    bx.attrs = data.attrs.clone();
                    bx.classes = data.classes().iter().map(ToString::to_string).collect();
                }
                bid
            }
        };

        for &child in doc.children(id) {
            if let Some(child_box) = self.build_node(doc, child) {
                self.append_child(box_id, child_box);
            }
        }
        Some(box_id)
    }

    /// Allocate a detached node.
    pub fn alloc(&mut self, kind: BoxKind) -> BoxId {
        let id = BoxId(self.nodes.len());
        self.nodes.push(BoxNode::new(kind));
        id
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: BoxId, child: BoxId) {
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// The root box, if the document produced one.
    #[must_use]
    pub const fn root(&self) -> Option<BoxId> {
        self.root
    }

    /// Set the root box (used by embedders building trees directly).
    pub fn set_root(&mut self, id: BoxId) {
        self.root = Some(id);
    }

    /// Borrow a node.
    ///
    /// # Panics
    /// Panics if `id` is out of bounds; ids are only minted by this arena.
    #[must_use]
    pub fn node(&self, id: BoxId) -> &BoxNode {
        &self.nodes[id.0]
    }

    /// Mutably borrow a node.
    ///
    /// # Panics
    /// Panics if `id` is out of bounds; ids are only minted by this arena.
    pub fn node_mut(&mut self, id: BoxId) -> &mut BoxNode {
        &mut self.nodes[id.0]
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all node ids in allocation order.
    pub fn iter_ids(&self) -> impl Iterator<Item = BoxId> + '_ {
        (0..self.nodes.len()).map(BoxId)
    }

    /// Iterate over the ancestors of a node, nearest first.
    pub fn ancestors(&self, id: BoxId) -> impl Iterator<Item = BoxId> + '_ {
        let mut current = self.node(id).parent;
        std::iter::from_fn(move || {
            let id = current?;
            current = self.node(id).parent;
            Some(id)
        })
    }

    /// The active stylesheet, if one is bound.
    #[must_use]
    pub fn stylesheet(&self) -> Option<Rc<Stylesheet>> {
        self.stylesheet.clone()
    }

    /// Bind (or rebind) the active stylesheet. All per-node style caches —
    /// positive and negative — are invalidated.
    pub fn bind_stylesheet(&mut self, sheet: Rc<Stylesheet>) {
        self.stylesheet = Some(sheet);
        for node in &mut self.nodes {
            node.style_cache.clear();
            node.style_misses.clear();
            node.cascade_done = false;
        }
    }

    /// Clear all layout products (fragments, content widths, static
    /// positions) so the tree can be laid out again, e.g. for the second
    /// pass of width-convergent layout.
    pub fn reset_layout(&mut self) {
        for node in &mut self.nodes {
            node.block_fragments.clear();
            node.inline_fragments.clear();
            node.content_width = None;
            node.static_position = None;
        }
    }

    /// Clear layout products for one subtree only (used when a table cell
    /// is re-laid out at a forced height).
    pub fn reset_subtree_layout(&mut self, id: BoxId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node_mut(current);
            node.block_fragments.clear();
            node.inline_fragments.clear();
            node.content_width = None;
            stack.extend(node.children.iter().copied());
        }
    }

    /// The highest page index any fragment reached, or `None` if nothing
    /// was laid out.
    #[must_use]
    pub fn last_page(&self) -> Option<usize> {
        self.nodes
            .iter()
            .flat_map(|n| {
                n.block_fragments
                    .iter()
                    .map(|f| f.page)
                    .chain(n.inline_fragments.iter().map(|f| f.page))
            })
            .max()
    }

    /// The nearest ancestor (or `id` itself when `include_self`) whose
    /// content width is established and that can serve as a percentage
    /// base: not anonymous and not a table row.
    #[must_use]
    pub fn percentage_base(&self, id: BoxId) -> Option<f32> {
        self.ancestors(id)
            .filter(|&a| {
                let node = self.node(a);
                !matches!(node.kind, BoxKind::Anonymous)
                    && node.element_kind() != Some(ElementKind::Tr)
            })
            .find_map(|a| self.node(a).content_width)
    }
}
