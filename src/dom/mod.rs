//! Arena document tree.
//!
//! Nodes live in a flat `Vec` and link to each other by [`NodeId`]. The tree
//! walk only needs the minimal interface exposed here (kind, attributes,
//! text, ordered children), so trees can be built by hand in tests or by
//! html5ever through [`parse_html`].

mod tree_sink;

pub use tree_sink::{ArenaSink, parse_html};

use html5ever::{LocalName, QualName, ns};

/// Index of a node in a [`Dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_some(self) -> bool {
        self != Self::NONE
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a node is, as seen by the tree walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind<'a> {
    Document,
    Element(&'a str),
    Text(&'a str),
    /// Comments, doctypes, processing instructions.
    Other,
}

#[derive(Debug)]
pub(crate) enum NodeData {
    Document,
    Element {
        // Boxed so the name keeps a stable address while the arena grows.
        name: Box<QualName>,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Other,
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) data: NodeData,
    pub(crate) parent: NodeId,
    first_child: NodeId,
    last_child: NodeId,
    prev_sibling: NodeId,
    next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// Document tree stored as an arena.
#[derive(Debug)]
pub struct Dom {
    nodes: Vec<Node>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// Create a tree holding only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
        }
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    // --- Read interface ---

    pub fn kind(&self, id: NodeId) -> NodeKind<'_> {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Document) => NodeKind::Document,
            Some(NodeData::Element { name, .. }) => NodeKind::Element(name.local.as_ref()),
            Some(NodeData::Text(text)) => NodeKind::Text(text),
            Some(NodeData::Other) | None => NodeKind::Other,
        }
    }

    /// Local tag name of an element node.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    /// Attribute value by local name (`xlink:href` answers to `href`).
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            dom: self,
            next: self.get(id).map_or(NodeId::NONE, |n| n.first_child),
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Other => {}
            _ => {
                for child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// First element with the given tag, in document order.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.document())
            .find(|&id| self.tag(id) == Some(tag))
    }

    /// True if any strict descendant of `id` satisfies `pred`.
    pub fn any_descendant(&self, id: NodeId, pred: impl Fn(NodeId) -> bool) -> bool {
        self.descendants(id).skip(1).any(pred)
    }

    /// Pre-order iterator over `id` and its descendants.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![id];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            let children: Vec<NodeId> = self.children(next).collect();
            stack.extend(children.into_iter().rev());
            Some(next)
        })
    }

    // --- Construction ---

    pub fn create_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let qual = QualName::new(None, ns!(html), LocalName::from(name));
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.create_qualified(qual, attrs)
    }

    pub(crate) fn create_qualified(&mut self, name: QualName, attrs: Vec<(String, String)>) -> NodeId {
        self.push(NodeData::Element {
            name: Box::new(name),
            attrs,
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    pub(crate) fn create_other(&mut self) -> NodeId {
        self.push(NodeData::Other)
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    /// Append `child` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let last = match self.get(parent) {
            Some(p) => p.last_child,
            None => return,
        };

        if let Some(c) = self.get_mut(child) {
            c.parent = parent;
            c.prev_sibling = last;
            c.next_sibling = NodeId::NONE;
        }
        if last.is_some() {
            if let Some(l) = self.get_mut(last) {
                l.next_sibling = child;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = child;
        }
        if let Some(p) = self.get_mut(parent) {
            p.last_child = child;
        }
    }

    /// Append text, merging with a trailing text child.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last = self.get(parent).map_or(NodeId::NONE, |p| p.last_child);
        if let Some(Node {
            data: NodeData::Text(existing),
            ..
        }) = self.get_mut(last)
        {
            existing.push_str(text);
            return;
        }
        let node = self.create_text(text);
        self.append(parent, node);
    }

    /// Convenience: create an element and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(name, attrs);
        self.append(parent, id);
        id
    }

    /// Insert `node` immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        let (parent, prev) = match self.get(sibling) {
            Some(s) => (s.parent, s.prev_sibling),
            None => return,
        };

        if let Some(n) = self.get_mut(node) {
            n.parent = parent;
            n.prev_sibling = prev;
            n.next_sibling = sibling;
        }
        if let Some(s) = self.get_mut(sibling) {
            s.prev_sibling = node;
        }
        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = node;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = node;
        }
    }

    /// Unlink `id` from its parent and siblings.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = match self.get(id) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }

        if let Some(n) = self.get_mut(id) {
            n.parent = NodeId::NONE;
            n.prev_sibling = NodeId::NONE;
            n.next_sibling = NodeId::NONE;
        }
    }

    pub(crate) fn add_attrs_if_missing(&mut self, id: NodeId, attrs: Vec<(String, String)>) {
        if let Some(Node {
            data: NodeData::Element {
                attrs: existing, ..
            },
            ..
        }) = self.get_mut(id)
        {
            for (key, value) in attrs {
                if !existing.iter().any(|(k, _)| *k == key) {
                    existing.push((key, value));
                }
            }
        }
    }
}

/// Iterator over the children of a node.
pub struct Children<'a> {
    dom: &'a Dom,
    next: NodeId,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next;
        let node = self.dom.get(current)?;
        self.next = node.next_sibling;
        Some(current)
    }
}
