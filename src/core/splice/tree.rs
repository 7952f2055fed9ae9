//! Output tree
//!
//! A small arena-backed DOM-like tree the splicer edits after the external
//! renderer produces it. Nodes are indexed by [`NodeId`]; removal never
//! happens, detached nodes simply become unreachable from the root.

use crate::features::inline::{escape_attr, escape_html};

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One node of the output tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// An element with a tag and attribute list
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    /// Plain text, escaped on serialization
    Text(String),
    /// Pre-rendered HTML, emitted verbatim on serialization
    Raw(String),
}

/// Arena-backed output tree with a fixed root element.
#[derive(Debug)]
pub struct OutputTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl OutputTree {
    /// Create a tree whose root is an element with `tag`.
    pub fn new(tag: &str) -> Self {
        let root = Node {
            kind: NodeKind::Element {
                tag: tag.to_string(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Allocate a detached element node.
    pub fn new_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
        })
    }

    /// Allocate a detached text node.
    pub fn new_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// Allocate a detached raw-HTML node.
    pub fn new_raw(&mut self, html: &str) -> NodeId {
        self.push(NodeKind::Raw(html.to_string()))
    }

    /// Append `child` to `parent`'s child list.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Set (or replace) an attribute on an element node. No-op on text and
    /// raw nodes.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            match attrs.iter_mut().find(|(n, _)| n == name) {
                Some(pair) => pair.1 = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// Replace `old` with `new` in `old`'s parent. The old node detaches.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        let Some(parent) = self.nodes[old.0].parent else {
            return;
        };
        if let Some(slot) = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == old)
        {
            self.nodes[parent.0].children[slot] = new;
            self.nodes[new.0].parent = Some(parent);
            self.nodes[old.0].parent = None;
        }
    }

    /// Replace `old` with a sequence of nodes at the same position.
    pub fn replace_with_sequence(&mut self, old: NodeId, sequence: &[NodeId]) {
        let Some(parent) = self.nodes[old.0].parent else {
            return;
        };
        let Some(slot) = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == old)
        else {
            return;
        };
        self.nodes[parent.0]
            .children
            .splice(slot..slot + 1, sequence.iter().copied());
        for &id in sequence {
            self.nodes[id.0].parent = Some(parent);
        }
        self.nodes[old.0].parent = None;
    }

    /// Merge adjacent text children and drop empty text nodes, everywhere.
    pub fn normalize_text(&mut self) {
        let ids: Vec<NodeId> = self.walk();
        for id in ids {
            let children = self.nodes[id.0].children.clone();
            let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());
            for child in children {
                let is_text = matches!(self.nodes[child.0].kind, NodeKind::Text(_));
                if is_text {
                    let text = match &self.nodes[child.0].kind {
                        NodeKind::Text(t) => t.clone(),
                        _ => unreachable!(),
                    };
                    if text.is_empty() {
                        self.nodes[child.0].parent = None;
                        continue;
                    }
                    if let Some(&last) = merged.last() {
                        if let NodeKind::Text(prev) = &mut self.nodes[last.0].kind {
                            prev.push_str(&text);
                            self.nodes[child.0].parent = None;
                            continue;
                        }
                    }
                }
                merged.push(child);
            }
            self.nodes[id.0].children = merged;
        }
    }

    /// All nodes reachable from the root, parents before children.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            for &child in self.nodes[id.0].children.iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Reachable text nodes, in document order.
    pub fn text_node_ids(&self) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|id| matches!(self.nodes[id.0].kind, NodeKind::Text(_)))
            .collect()
    }

    /// Serialize the reachable tree to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(&escape_html(text)),
            NodeKind::Raw(html) => out.push_str(html),
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
                }
                out.push('>');
                for &child in &self.nodes[id.0].children {
                    self.write_node(child, out);
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_and_serialize() {
        let mut tree = OutputTree::new("div");
        let p = tree.new_element("p");
        let t = tree.new_text("a < b");
        tree.append(tree.root(), p);
        tree.append(p, t);
        assert_eq!(tree.to_html(), "<div><p>a &lt; b</p></div>");
    }

    #[test]
    fn test_raw_nodes_are_verbatim() {
        let mut tree = OutputTree::new("div");
        let r = tree.new_raw("<b>kept</b>");
        tree.append(tree.root(), r);
        assert_eq!(tree.to_html(), "<div><b>kept</b></div>");
    }

    #[test]
    fn test_replace() {
        let mut tree = OutputTree::new("div");
        let old = tree.new_text("old");
        tree.append(tree.root(), old);
        let new = tree.new_raw("<i>new</i>");
        tree.replace(old, new);
        assert_eq!(tree.to_html(), "<div><i>new</i></div>");
    }

    #[test]
    fn test_replace_with_sequence() {
        let mut tree = OutputTree::new("p");
        let old = tree.new_text("x");
        tree.append(tree.root(), old);
        let a = tree.new_text("a");
        let b = tree.new_raw("<hr>");
        let c = tree.new_text("c");
        tree.replace_with_sequence(old, &[a, b, c]);
        assert_eq!(tree.to_html(), "<p>a<hr>c</p>");
    }

    #[test]
    fn test_normalize_text_merges_and_drops() {
        let mut tree = OutputTree::new("p");
        for text in ["a", "", "b", "c"] {
            let t = tree.new_text(text);
            tree.append(tree.root(), t);
        }
        tree.normalize_text();
        assert_eq!(tree.node(tree.root()).children.len(), 1);
        assert_eq!(tree.to_html(), "<p>abc</p>");
    }

    #[test]
    fn test_attrs_escaped() {
        let mut tree = OutputTree::new("div");
        tree.set_attr(tree.root(), "title", "a\"b");
        assert_eq!(tree.to_html(), "<div title=\"a&quot;b\"></div>");
    }
}
