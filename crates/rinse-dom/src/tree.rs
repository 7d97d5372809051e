//! DOM Tree (arena-based allocation)
//!
//! Removal never frees arena slots: a detached node simply loses its links to
//! the rest of the tree. Trees live for a single sanitize call, so the slack
//! is not worth compacting.

use crate::{ElementData, Node, NodeData, NodeId, TextData};

/// Arena-based DOM tree
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a tree whose root is a fragment container
    pub fn new_fragment() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Fragment)],
        }
    }

    /// Create a tree whose root is a document
    pub fn new_document() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
        }
    }

    /// Root node ID
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Number of allocated nodes, including detached ones
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree has no nodes besides the root
    pub fn is_empty(&self) -> bool {
        !self.nodes[0].first_child.is_valid()
    }

    /// Element data for `id`, if it is an element
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(Node::as_element)
    }

    /// Mutable element data for `id`, if it is an element
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id).and_then(Node::as_element_mut)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Allocate a detached node
    pub fn create_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    /// Allocate a detached HTML element
    pub fn create_element(&mut self, local: &str) -> NodeId {
        self.create_node(NodeData::Element(ElementData::new(local)))
    }

    /// Allocate a detached text node
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.create_node(NodeData::Text(TextData {
            content: content.to_string(),
        }))
    }

    /// Allocate a detached comment
    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.create_node(NodeData::Comment(content.to_string()))
    }

    /// Allocate a detached `<!DOCTYPE name>`
    pub fn create_doctype(&mut self, name: &str) -> NodeId {
        self.create_node(NodeData::Doctype {
            name: name.to_string(),
            public_id: String::new(),
            system_id: String::new(),
        })
    }

    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> NodeId {
        self.create_node(NodeData::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent.option())
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.first_child.option())
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.last_child.option())
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next_sibling.option())
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.prev_sibling.option())
    }

    /// Iterate over direct children
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).map_or(NodeId::NONE, |n| n.first_child),
        }
    }

    /// Iterate over all descendants of `scope` in document order
    pub fn descendants(&self, scope: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            scope,
            next: self.get(scope).map_or(NodeId::NONE, |n| n.first_child),
        }
    }

    /// Next node in document order after `id`'s subtree, staying inside `scope`
    pub fn next_skipping_children(&self, id: NodeId, scope: NodeId) -> Option<NodeId> {
        let mut current = id;
        while current != scope {
            if let Some(next) = self.next_sibling(current) {
                return Some(next);
            }
            current = self.parent(current)?;
        }
        None
    }

    /// Next node in document order after `id`, staying inside `scope`
    pub fn next_in_preorder(&self, id: NodeId, scope: NodeId) -> Option<NodeId> {
        self.first_child(id)
            .or_else(|| self.next_skipping_children(id, scope))
    }

    /// Whether `node` is `ancestor` or lies beneath it
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(text) = self.get(id).and_then(Node::as_text) {
            out.push_str(text);
        }
        for (_, node) in self.descendants(id) {
            if let Some(text) = node.as_text() {
                out.push_str(text);
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Append `child` as the last child of `parent`, detaching it first
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, NodeId::NONE);
    }

    /// Insert `child` before `reference` (or at the end when `reference` is NONE)
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        if child == NodeId::ROOT || self.is_inclusive_ancestor(child, parent) {
            return;
        }
        self.detach(child);

        let prev = if reference.is_valid() {
            self.nodes[reference.index()].prev_sibling
        } else {
            self.nodes[parent.index()].last_child
        };

        {
            let node = &mut self.nodes[child.index()];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        if reference.is_valid() {
            self.nodes[reference.index()].prev_sibling = child;
        } else {
            self.nodes[parent.index()].last_child = child;
        }
    }

    /// Unlink `id` (and its subtree) from its parent
    pub fn detach(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        if !parent.is_valid() {
            return;
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = next;
        } else {
            self.nodes[parent.index()].first_child = next;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = prev;
        } else {
            self.nodes[parent.index()].last_child = prev;
        }

        let node = &mut self.nodes[id.index()];
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
    }

    /// Remove `id` from the tree, moving its children into its position.
    ///
    /// Returns the first promoted child, if any.
    pub fn unwrap(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let first = self.first_child(id);
        while let Some(child) = self.first_child(id) {
            self.insert_before(parent, child, id);
        }
        self.detach(id);
        first
    }

    /// Change an element's local name; returns false for non-elements
    pub fn rename(&mut self, id: NodeId, local: &str) -> bool {
        match self.element_mut(id) {
            Some(elem) => {
                elem.local = local.to_string();
                true
            }
            None => false,
        }
    }

    /// Detach every child of `parent`
    pub fn clear_children(&mut self, parent: NodeId) {
        while let Some(child) = self.first_child(parent) {
            self.detach(child);
        }
    }

    /// Deep-copy the children of `source_parent` in `source` to the end of
    /// `parent`'s children
    pub fn append_copies(&mut self, parent: NodeId, source: &DomTree, source_parent: NodeId) {
        let mut stack: Vec<(NodeId, NodeId)> = source
            .children(source_parent)
            .map(|(id, _)| (id, parent))
            .collect();
        stack.reverse();

        while let Some((source_id, target_parent)) = stack.pop() {
            let Some(node) = source.get(source_id) else {
                continue;
            };
            let copy = self.create_node(node.data.clone());
            self.append_child(target_parent, copy);

            let start = stack.len();
            stack.extend(source.children(source_id).map(|(id, _)| (id, copy)));
            stack[start..].reverse();
        }
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new_fragment()
    }
}

/// Iterator over a node's direct children
pub struct Children<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl<'a> Iterator for Children<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.option()?;
        let node = self.tree.get(id)?;
        self.next = node.next_sibling;
        Some((id, node))
    }
}

/// Pre-order iterator over a node's descendants
pub struct Descendants<'a> {
    tree: &'a DomTree,
    scope: NodeId,
    next: NodeId,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.option()?;
        let node = self.tree.get(id)?;
        self.next = self
            .tree
            .next_in_preorder(id, self.scope)
            .unwrap_or(NodeId::NONE);
        Some((id, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tree: &DomTree, parent: NodeId) -> Vec<String> {
        tree.children(parent)
            .map(|(_, n)| match &n.data {
                NodeData::Element(e) => e.local.clone(),
                NodeData::Text(t) => format!("#{}", t.content),
                _ => "?".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_append_and_children() {
        let mut tree = DomTree::new_fragment();
        let div = tree.create_element("div");
        let span = tree.create_element("span");
        let text = tree.create_text("hi");

        tree.append_child(tree.root(), div);
        tree.append_child(div, span);
        tree.append_child(div, text);

        assert_eq!(names(&tree, div), ["span", "#hi"]);
        assert_eq!(tree.parent(span), Some(div));
        assert_eq!(tree.next_sibling(span), Some(text));
        assert_eq!(tree.last_child(div), Some(text));
    }

    #[test]
    fn test_insert_before() {
        let mut tree = DomTree::new_fragment();
        let root = tree.root();
        let a = tree.create_element("a");
        let c = tree.create_element("c");
        let b = tree.create_element("b");
        tree.append_child(root, a);
        tree.append_child(root, c);
        tree.insert_before(root, b, c);

        assert_eq!(names(&tree, root), ["a", "b", "c"]);
        assert_eq!(tree.prev_sibling(c), Some(b));
    }

    #[test]
    fn test_detach_middle_child() {
        let mut tree = DomTree::new_fragment();
        let root = tree.root();
        let ids: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|n| {
                let id = tree.create_element(n);
                tree.append_child(root, id);
                id
            })
            .collect();

        tree.detach(ids[1]);

        assert_eq!(names(&tree, root), ["a", "c"]);
        assert_eq!(tree.parent(ids[1]), None);
        assert_eq!(tree.next_sibling(ids[0]), Some(ids[2]));
        assert_eq!(tree.prev_sibling(ids[2]), Some(ids[0]));
    }

    #[test]
    fn test_unwrap_promotes_children_in_place() {
        let mut tree = DomTree::new_fragment();
        let root = tree.root();
        let before = tree.create_text("x");
        let bad = tree.create_element("bad");
        let after = tree.create_text("z");
        let inner1 = tree.create_text("1");
        let inner2 = tree.create_element("b");
        tree.append_child(root, before);
        tree.append_child(root, bad);
        tree.append_child(root, after);
        tree.append_child(bad, inner1);
        tree.append_child(bad, inner2);

        let first = tree.unwrap(bad);

        assert_eq!(first, Some(inner1));
        assert_eq!(names(&tree, root), ["#x", "#1", "b", "#z"]);
        assert_eq!(tree.parent(bad), None);
        assert!(tree.first_child(bad).is_none());
    }

    #[test]
    fn test_unwrap_empty_element() {
        let mut tree = DomTree::new_fragment();
        let root = tree.root();
        let empty = tree.create_element("i");
        tree.append_child(root, empty);

        assert_eq!(tree.unwrap(empty), None);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_descendants_preorder() {
        let mut tree = DomTree::new_fragment();
        let root = tree.root();
        let div = tree.create_element("div");
        let p = tree.create_element("p");
        let t = tree.create_text("t");
        let span = tree.create_element("span");
        tree.append_child(root, div);
        tree.append_child(div, p);
        tree.append_child(p, t);
        tree.append_child(div, span);

        let order: Vec<_> = tree.descendants(root).map(|(id, _)| id).collect();
        assert_eq!(order, [div, p, t, span]);

        let scoped: Vec<_> = tree.descendants(p).map(|(id, _)| id).collect();
        assert_eq!(scoped, [t]);
    }

    #[test]
    fn test_text_content_and_rename() {
        let mut tree = DomTree::new_fragment();
        let root = tree.root();
        let h = tree.create_element("script");
        let t = tree.create_text("hello!");
        tree.append_child(root, h);
        tree.append_child(h, t);

        assert!(tree.rename(h, "h1"));
        assert!(!tree.rename(t, "h1"));
        assert_eq!(tree.element(h).map(|e| e.local.as_str()), Some("h1"));
        assert_eq!(tree.text_content(root), "hello!");
    }
}
