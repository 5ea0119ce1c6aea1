//! Generic element tree consumed by the Folio layout engine.
//!
//! The engine does not parse markup itself: an external XML/XHTML parser
//! produces a tree of elements with tag names, attributes, and ordered
//! children, and hands it over in this form. The tree is deliberately
//! minimal — it carries structure and raw attribute strings, nothing
//! resolved.
//!
//! # Design
//!
//! Arena storage with [`NodeId`] indices for every relationship. Parents
//! never hold owning references to children (or vice versa), so the tree
//! has no reference cycles and any node is reachable in O(1).

use std::collections::HashMap;

/// Map of attribute names to raw attribute values.
pub type AttributeMap = HashMap<String, String>;

/// A type-safe index into an [`ElementTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The document root is always at index 0.
    pub const ROOT: NodeId = NodeId(0);
}

/// What a tree node is: the synthetic document root, a named element, or a
/// run of character data.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The synthetic root that holds the document element.
    Document,
    /// A named element with attributes.
    Element(ElementData),
    /// Character data between elements.
    Text(String),
}

/// Tag name and attributes of an element node.
#[derive(Debug, Clone)]
pub struct ElementData {
    /// The element's tag name, as written in the source (case preserved).
    pub tag: String,
    /// The element's attributes.
    pub attrs: AttributeMap,
}

impl ElementData {
    /// Look up an attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// The space-separated tokens of the `class` attribute, in order.
    #[must_use]
    pub fn classes(&self) -> Vec<&str> {
        self.attrs
            .get("class")
            .map(|list| list.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// A node in the element tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// What this node is.
    pub kind: NodeKind,
    /// Parent node, `None` only for the root.
    pub parent: Option<NodeId>,
    /// Ordered children.
    pub children: Vec<NodeId>,
}

/// Arena-backed element tree.
///
/// All nodes live in one contiguous vector; relationships are indices. A
/// fresh tree contains only the document root.
#[derive(Debug, Clone)]
pub struct ElementTree {
    nodes: Vec<Node>,
}

impl ElementTree {
    /// Create a tree containing only the document root.
    #[must_use]
    pub fn new() -> Self {
        ElementTree {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The document root id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by id.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Number of nodes in the tree (including the root).
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no nodes at all (never true for a tree built
    /// through [`ElementTree::new`]).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a detached node and return its id.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Allocate an element node and attach it under `parent` in one step.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: AttributeMap) -> NodeId {
        let id = self.alloc(NodeKind::Element(ElementData {
            tag: tag.to_string(),
            attrs,
        }));
        self.append_child(parent, id);
        id
    }

    /// Allocate a text node and attach it under `parent` in one step.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.alloc(NodeKind::Text(text.to_string()));
        self.append_child(parent, id);
        id
    }

    /// The parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// The ordered children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Element data if this node is an element.
    #[must_use]
    pub fn as_element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(|n| match &n.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        })
    }

    /// Text content if this node is a text node.
    #[must_use]
    pub fn as_text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.kind {
            NodeKind::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// The document element: the first element child of the root.
    #[must_use]
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(NodeId::ROOT)
            .iter()
            .find(|&&id| self.as_element(id).is_some())
            .copied()
    }

    /// Iterate over all node ids in allocation (document) order.
    pub fn iter_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Iterate over the ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.parent(id);
        std::iter::from_fn(move || {
            let id = current?;
            current = self.parent(id);
            Some(id)
        })
    }
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}
