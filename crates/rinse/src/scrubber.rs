//! Tree scrubbing
//!
//! A [`Scrubber`] inspects one node at a time and returns a
//! [`ScrubDecision`]; [`scrub_tree`] walks the tree in document order and
//! applies the decisions. Unwrapped nodes have their children promoted and
//! visited in turn, so no disallowed element survives at any depth.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rinse_dom::{Attribute, DomTree, ElementData, NodeData, NodeId};

use crate::policy::{AllowlistPolicy, ALWAYS_REMOVED_TAGS};
use crate::uri::is_safe_uri;
use crate::{Result, SanitizeError};

/// Tags the link stripper unwraps
const LINK_TAGS: &[&str] = &["a", "href"];
const LINK_ATTRIBUTE: &str = "href";

/// What to do with one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrubDecision {
    /// Keep the node untouched and visit its children
    KeepNode,
    /// Keep the node, filter its attributes, visit its children
    KeepNodeStripAttributes,
    /// Remove the node; its children take its place and are visited
    RemoveNodeKeepChildren,
    /// Remove the node and everything below it
    RemoveSubtree,
}

/// Mutable view of the node being scrubbed
pub struct ScrubNode<'a> {
    tree: &'a mut DomTree,
    id: NodeId,
}

impl<'a> ScrubNode<'a> {
    pub fn new(tree: &'a mut DomTree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &DomTree {
        self.tree
    }

    pub fn data(&self) -> Option<&NodeData> {
        self.tree.get(self.id).map(|n| &n.data)
    }

    pub fn is_element(&self) -> bool {
        self.tree.get(self.id).is_some_and(|n| n.is_element())
    }

    pub fn is_text(&self) -> bool {
        self.tree.get(self.id).is_some_and(|n| n.is_text())
    }

    pub fn is_comment(&self) -> bool {
        self.tree.get(self.id).is_some_and(|n| n.is_comment())
    }

    /// Local name of an element
    pub fn tag_name(&self) -> Option<&str> {
        self.tree.get(self.id).and_then(|n| n.tag_name())
    }

    /// Rename an element; a no-op returning false for other nodes
    pub fn set_tag_name(&mut self, name: &str) -> bool {
        self.tree.rename(self.id, &name.to_ascii_lowercase())
    }

    /// Content of a text node
    pub fn text(&self) -> Option<&str> {
        self.tree.get(self.id).and_then(|n| n.as_text())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.tree.element(self.id).and_then(|e| e.attr(name))
    }

    pub fn attributes(&self) -> &[Attribute] {
        self.tree
            .element(self.id)
            .map_or(&[][..], |e| e.attrs.as_slice())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) -> bool {
        match self.tree.element_mut(self.id) {
            Some(elem) => {
                elem.set_attr(name, value);
                true
            }
            None => false,
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.tree.element_mut(self.id)?.remove_attr(name)
    }

    /// Keep the attributes `keep` accepts; returns how many were dropped
    pub fn retain_attrs<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&mut Attribute) -> bool,
    {
        let Some(elem) = self.tree.element_mut(self.id) else {
            return 0;
        };
        let before = elem.attrs.len();
        elem.retain_attrs(|attr| {
            let kept = keep(attr);
            if !kept {
                tracing::trace!(attribute = %attr.name, "dropped attribute");
            }
            kept
        });
        before - elem.attrs.len()
    }

    /// Drop every attribute; returns how many were dropped
    pub fn clear_attributes(&mut self) -> usize {
        self.retain_attrs(|_| false)
    }

    pub fn element_mut(&mut self) -> Option<&mut ElementData> {
        self.tree.element_mut(self.id)
    }
}

/// A caller-supplied scrubbing strategy.
///
/// Sees every node below the root (elements, text, comments) and may mutate
/// it through [`ScrubNode`] before deciding.
pub trait CustomScrub: Send + Sync {
    fn scrub(&self, node: &mut ScrubNode<'_>) -> ScrubDecision;

    /// Attribute filtering for [`ScrubDecision::KeepNodeStripAttributes`];
    /// drops everything unless overridden
    fn strip_attributes(&self, node: &mut ScrubNode<'_>) -> usize {
        node.clear_attributes()
    }
}

impl<F> CustomScrub for F
where
    F: Fn(&mut ScrubNode<'_>) -> ScrubDecision + Send + Sync,
{
    fn scrub(&self, node: &mut ScrubNode<'_>) -> ScrubDecision {
        self(node)
    }
}

/// Scrubbing strategy
#[derive(Clone)]
pub enum Scrubber {
    /// Keep allowlisted tags and attributes, unwrap or remove the rest
    Allowlist(Arc<AllowlistPolicy>),
    /// Unwrap every element, keeping only text
    StripTags,
    /// Unwrap links and drop `href` elsewhere; everything else is untouched
    StripLinks,
    Custom(Arc<dyn CustomScrub>),
}

impl fmt::Debug for Scrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowlist(policy) => f.debug_tuple("Allowlist").field(policy).finish(),
            Self::StripTags => f.write_str("StripTags"),
            Self::StripLinks => f.write_str("StripLinks"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Scrubber {
    /// Allowlist scrubber with the default policy
    pub fn allowlist() -> Self {
        Self::Allowlist(Arc::new(AllowlistPolicy::default()))
    }

    pub fn with_policy(policy: AllowlistPolicy) -> Self {
        Self::Allowlist(Arc::new(policy))
    }

    /// Wrap a closure as a custom scrubber
    pub fn custom<F>(scrub: F) -> Self
    where
        F: Fn(&mut ScrubNode<'_>) -> ScrubDecision + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(scrub))
    }

    /// Wrap a [`CustomScrub`] implementation
    pub fn from_custom(scrub: impl CustomScrub + 'static) -> Self {
        Self::Custom(Arc::new(scrub))
    }

    /// Decide the fate of one node; custom scrubbers may mutate it first
    pub fn decide(&self, node: &mut ScrubNode<'_>) -> ScrubDecision {
        match self {
            Self::Allowlist(policy) => decide_allowlist(policy, node),
            Self::StripTags => decide_strip_tags(node),
            Self::StripLinks => decide_strip_links(node),
            Self::Custom(custom) => custom.scrub(node),
        }
    }

    /// Filter attributes of a node kept with
    /// [`ScrubDecision::KeepNodeStripAttributes`]; returns how many went
    pub fn strip_attributes(&self, node: &mut ScrubNode<'_>) -> usize {
        match self {
            Self::Allowlist(policy) => strip_allowlist_attributes(policy, node),
            Self::StripTags => node.clear_attributes(),
            Self::StripLinks => node.retain_attrs(|attr| attr.name != LINK_ATTRIBUTE),
            Self::Custom(custom) => custom.strip_attributes(node),
        }
    }

    /// Whether this strategy keeps comments, doctypes and processing
    /// instructions
    pub fn keeps_markup_declarations(&self) -> bool {
        matches!(self, Self::StripLinks)
    }
}

fn decide_allowlist(policy: &AllowlistPolicy, node: &ScrubNode<'_>) -> ScrubDecision {
    match node.data() {
        Some(NodeData::Text(_)) => ScrubDecision::KeepNode,
        Some(NodeData::Element(elem)) => {
            let tag = elem.local.as_str();
            if ALWAYS_REMOVED_TAGS.contains(&tag) {
                ScrubDecision::RemoveSubtree
            } else if policy.allows_tag(tag) {
                ScrubDecision::KeepNodeStripAttributes
            } else if !elem.is_html() || policy.removes_subtree(tag) {
                // Unwrapped SVG/MathML would move HTML children out of foreign content.
                ScrubDecision::RemoveSubtree
            } else {
                ScrubDecision::RemoveNodeKeepChildren
            }
        }
        Some(NodeData::Document | NodeData::Fragment) => ScrubDecision::KeepNode,
        Some(_) | None => ScrubDecision::RemoveSubtree,
    }
}

fn decide_strip_tags(node: &ScrubNode<'_>) -> ScrubDecision {
    match node.data() {
        Some(NodeData::Text(_) | NodeData::Document | NodeData::Fragment) => {
            ScrubDecision::KeepNode
        }
        Some(NodeData::Element(elem)) if ALWAYS_REMOVED_TAGS.contains(&elem.local.as_str()) => {
            ScrubDecision::RemoveSubtree
        }
        Some(NodeData::Element(_)) => ScrubDecision::RemoveNodeKeepChildren,
        Some(_) | None => ScrubDecision::RemoveSubtree,
    }
}

fn decide_strip_links(node: &ScrubNode<'_>) -> ScrubDecision {
    match node.data() {
        Some(NodeData::Element(elem)) if LINK_TAGS.contains(&elem.local.as_str()) => {
            ScrubDecision::RemoveNodeKeepChildren
        }
        Some(NodeData::Element(elem)) if elem.has_attr(LINK_ATTRIBUTE) => {
            ScrubDecision::KeepNodeStripAttributes
        }
        _ => ScrubDecision::KeepNode,
    }
}

fn strip_allowlist_attributes(policy: &AllowlistPolicy, node: &mut ScrubNode<'_>) -> usize {
    node.retain_attrs(|attr| {
        let name = attr.name.to_ascii_lowercase();
        if !policy.allows_attribute(&name) {
            return false;
        }
        if policy.is_uri_attribute(&name) && !is_safe_uri(&attr.value, policy.uri_schemes()) {
            return false;
        }
        if name == "style" {
            attr.value = policy.css().filter(&attr.value);
            return !attr.value.is_empty();
        }
        true
    })
}

/// Counters for one scrub pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrubStats {
    pub kept: usize,
    pub unwrapped: usize,
    pub removed: usize,
    pub attributes_dropped: usize,
}

/// Apply `scrubber` to every node below `scope`, in document order
pub fn scrub_tree(tree: &mut DomTree, scope: NodeId, scrubber: &Scrubber) -> ScrubStats {
    let mut stats = ScrubStats::default();
    let mut cursor = tree.first_child(scope);

    while let Some(id) = cursor {
        let mut node = ScrubNode::new(tree, id);
        let decision = scrubber.decide(&mut node);
        match decision {
            ScrubDecision::KeepNode => {
                stats.kept += 1;
                cursor = tree.next_in_preorder(id, scope);
            }
            ScrubDecision::KeepNodeStripAttributes => {
                stats.kept += 1;
                stats.attributes_dropped += scrubber.strip_attributes(&mut node);
                cursor = tree.next_in_preorder(id, scope);
            }
            ScrubDecision::RemoveNodeKeepChildren => {
                stats.unwrapped += 1;
                tracing::trace!(node = ?tree.get(id).and_then(|n| n.tag_name()), "unwrapped node");
                let next = tree.next_skipping_children(id, scope);
                cursor = tree.unwrap(id).or(next);
            }
            ScrubDecision::RemoveSubtree => {
                stats.removed += 1;
                tracing::trace!(node = ?tree.get(id).and_then(|n| n.tag_name()), "removed subtree");
                let next = tree.next_skipping_children(id, scope);
                tree.detach(id);
                cursor = next;
            }
        }
    }

    tracing::debug!(
        kept = stats.kept,
        unwrapped = stats.unwrapped,
        removed = stats.removed,
        attributes_dropped = stats.attributes_dropped,
        "scrubbed tree"
    );
    stats
}

/// Named scrubbers selectable from configuration
#[derive(Debug, Clone)]
pub struct ScrubberRegistry {
    scrubbers: BTreeMap<String, Scrubber>,
}

impl ScrubberRegistry {
    /// Registry holding only the built-in strategies
    pub fn new() -> Self {
        let mut scrubbers = BTreeMap::new();
        scrubbers.insert("allowlist".to_string(), Scrubber::allowlist());
        scrubbers.insert("strip_tags".to_string(), Scrubber::StripTags);
        scrubbers.insert("strip_links".to_string(), Scrubber::StripLinks);
        Self { scrubbers }
    }

    /// Register (or replace) a scrubber under `name`
    pub fn register(&mut self, name: &str, scrubber: Scrubber) -> Option<Scrubber> {
        self.scrubbers.insert(name.to_string(), scrubber)
    }

    pub fn with(mut self, name: &str, scrubber: Scrubber) -> Self {
        self.register(name, scrubber);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Scrubber> {
        self.scrubbers.get(name)
    }

    /// Look up `name`, failing with [`SanitizeError::ScrubberNotFound`]
    pub fn resolve(&self, name: &str) -> Result<&Scrubber> {
        self.get(name).ok_or_else(|| {
            tracing::warn!(name, "unknown scrubber requested");
            SanitizeError::ScrubberNotFound(name.to_string())
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scrubbers.keys().map(String::as_str)
    }
}

impl Default for ScrubberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(build: impl FnOnce(&mut DomTree, NodeId)) -> DomTree {
        let mut tree = DomTree::new_fragment();
        let root = tree.root();
        build(&mut tree, root);
        tree
    }

    fn names(tree: &DomTree) -> Vec<String> {
        tree.descendants(tree.root())
            .map(|(_, n)| n.tag_name().unwrap_or("#other").to_string())
            .collect()
    }

    #[test]
    fn test_allowlist_decisions() {
        let mut tree = tree_with(|tree, root| {
            for name in ["p", "script", "bad", "form"] {
                let id = tree.create_element(name);
                tree.append_child(root, id);
            }
            let text = tree.create_text("x");
            let comment = tree.create_comment("c");
            tree.append_child(root, text);
            tree.append_child(root, comment);
        });
        let scrubber = Scrubber::allowlist();
        let ids: Vec<_> = tree.children(tree.root()).map(|(id, _)| id).collect();
        let decisions: Vec<_> = ids
            .into_iter()
            .map(|id| scrubber.decide(&mut ScrubNode::new(&mut tree, id)))
            .collect();
        assert_eq!(
            decisions,
            [
                ScrubDecision::KeepNodeStripAttributes,
                ScrubDecision::RemoveSubtree,
                ScrubDecision::RemoveNodeKeepChildren,
                ScrubDecision::RemoveSubtree,
                ScrubDecision::KeepNode,
                ScrubDecision::RemoveSubtree,
            ]
        );
    }

    #[test]
    fn test_foreign_elements_are_removed_whole() {
        let mut tree = tree_with(|tree, root| {
            let svg = tree.create_node(NodeData::Element(ElementData::with_namespace(
                rinse_dom::Namespace::Svg,
                "svg",
            )));
            let p = tree.create_element("p");
            let text = tree.create_text("x");
            tree.append_child(root, svg);
            tree.append_child(svg, p);
            tree.append_child(p, text);
        });
        let root = tree.root();
        let stats = scrub_tree(&mut tree, root, &Scrubber::allowlist());
        assert!(tree.is_empty());
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.unwrapped, 0);
    }

    #[test]
    fn test_script_is_removed_even_when_allowlisted() {
        let policy = AllowlistPolicy::default().with_tags(["script"]);
        let mut tree = tree_with(|tree, root| {
            let script = tree.create_element("script");
            tree.append_child(root, script);
        });
        let root = tree.root();
        scrub_tree(&mut tree, root, &Scrubber::with_policy(policy));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_unwrapped_children_are_visited() {
        let mut tree = tree_with(|tree, root| {
            let bad = tree.create_element("bad");
            let worse = tree.create_element("worse");
            let b = tree.create_element("b");
            let text = tree.create_text("deep");
            tree.append_child(root, bad);
            tree.append_child(bad, worse);
            tree.append_child(worse, b);
            tree.append_child(b, text);
        });
        let root = tree.root();
        let stats = scrub_tree(&mut tree, root, &Scrubber::allowlist());
        assert_eq!(names(&tree), ["b", "#other"]);
        assert_eq!(stats.unwrapped, 2);
        assert_eq!(stats.kept, 2);
    }

    #[test]
    fn test_allowlist_attribute_filtering() {
        let mut tree = tree_with(|tree, root| {
            let a = tree.create_element("a");
            tree.append_child(root, a);
            let elem = tree.element_mut(a).unwrap();
            elem.set_attr("href", "javascript:alert(1)");
            elem.set_attr("onclick", "x()");
            elem.set_attr("title", "t");
            elem.set_attr("style", "color: red; position: fixed");
        });
        let root = tree.root();
        let stats = scrub_tree(&mut tree, root, &Scrubber::allowlist());
        let (a, _) = tree.children(root).next().unwrap();
        let elem = tree.element(a).unwrap();
        assert_eq!(elem.attr("href"), None);
        assert_eq!(elem.attr("onclick"), None);
        assert_eq!(elem.attr("title"), Some("t"));
        assert_eq!(elem.attr("style"), Some("color: red;"));
        assert_eq!(stats.attributes_dropped, 2);
    }

    #[test]
    fn test_empty_style_is_dropped() {
        let mut tree = tree_with(|tree, root| {
            let span = tree.create_element("span");
            tree.append_child(root, span);
            tree.element_mut(span).unwrap().set_attr("style", "width: expression(1)");
        });
        let root = tree.root();
        scrub_tree(&mut tree, root, &Scrubber::allowlist());
        let (span, _) = tree.children(root).next().unwrap();
        assert!(tree.element(span).unwrap().attrs.is_empty());
    }

    #[test]
    fn test_strip_links_keeps_everything_else() {
        let mut tree = tree_with(|tree, root| {
            let a = tree.create_element("a");
            let b = tree.create_element("b");
            let comment = tree.create_comment("kept");
            tree.append_child(root, a);
            tree.append_child(a, b);
            tree.append_child(root, comment);
            tree.element_mut(b).unwrap().set_attr("href", "x");
            tree.element_mut(b).unwrap().set_attr("class", "y");
        });
        let root = tree.root();
        scrub_tree(&mut tree, root, &Scrubber::StripLinks);
        assert_eq!(names(&tree), ["b", "#other"]);
        let (b, _) = tree.children(root).next().unwrap();
        assert_eq!(tree.element(b).unwrap().attr("href"), None);
        assert_eq!(tree.element(b).unwrap().attr("class"), Some("y"));
    }

    #[test]
    fn test_custom_closure_scrubber() {
        let mut tree = tree_with(|tree, root| {
            let script = tree.create_element("script");
            let text = tree.create_text("hello!");
            tree.append_child(root, script);
            tree.append_child(script, text);
        });
        let scrubber = Scrubber::custom(|node: &mut ScrubNode<'_>| {
            node.set_tag_name("h1");
            ScrubDecision::KeepNode
        });
        let root = tree.root();
        let stats = scrub_tree(&mut tree, root, &scrubber);
        assert_eq!(names(&tree), ["h1", "#other"]);
        assert_eq!(stats.kept, 2);
    }

    #[test]
    fn test_registry_resolution() {
        let registry = ScrubberRegistry::new().with(
            "drop_all",
            Scrubber::custom(|_: &mut ScrubNode<'_>| ScrubDecision::RemoveSubtree),
        );
        assert!(registry.resolve("strip_tags").is_ok());
        assert!(registry.resolve("drop_all").is_ok());
        assert!(matches!(
            registry.resolve("missing"),
            Err(SanitizeError::ScrubberNotFound(name)) if name == "missing"
        ));
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            ["allowlist", "drop_all", "strip_links", "strip_tags"]
        );
    }
}
