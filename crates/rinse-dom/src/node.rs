//! DOM Node
//!
//! Nodes are linked by [`NodeId`] rather than pointers; a detached node keeps
//! its slot in the arena but is unreachable from the root.

use crate::NodeId;

/// DOM Node - Core structure
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node (NONE if root or detached)
    pub parent: NodeId,
    /// First child
    pub first_child: NodeId,
    /// Last child (for O(1) append)
    pub last_child: NodeId,
    /// Previous sibling
    pub prev_sibling: NodeId,
    /// Next sibling
    pub next_sibling: NodeId,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            data,
        }
    }

    /// Check if this is an element
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Check if this is text
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Check if this is a comment
    #[inline]
    pub fn is_comment(&self) -> bool {
        matches!(self.data, NodeData::Comment(_))
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if this is a text node
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(&t.content),
            _ => None,
        }
    }

    /// Local tag name for elements
    #[inline]
    pub fn tag_name(&self) -> Option<&str> {
        self.as_element().map(|e| e.local.as_str())
    }
}

/// Node-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Document root
    Document,
    /// Fragment root (parsed in an element context)
    Fragment,
    /// DOCTYPE
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    /// Element
    Element(ElementData),
    /// Text content
    Text(TextData),
    /// Comment
    Comment(String),
    /// Processing instruction
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

/// Element namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Html,
    Svg,
    MathMl,
    Other(String),
}

impl Namespace {
    pub const HTML_URL: &'static str = "http://www.w3.org/1999/xhtml";
    pub const SVG_URL: &'static str = "http://www.w3.org/2000/svg";
    pub const MATHML_URL: &'static str = "http://www.w3.org/1998/Math/MathML";

    pub fn from_url(url: &str) -> Self {
        match url {
            "" | Self::HTML_URL => Self::Html,
            Self::SVG_URL => Self::Svg,
            Self::MATHML_URL => Self::MathMl,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Element-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Namespace of the element
    pub ns: Namespace,
    /// Local tag name, lowercase for HTML elements
    pub local: String,
    /// Attributes in source order, names unique
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    pub fn new(local: impl Into<String>) -> Self {
        Self::with_namespace(Namespace::Html, local)
    }

    pub fn with_namespace(ns: Namespace, local: impl Into<String>) -> Self {
        Self {
            ns,
            local: local.into(),
            attrs: Vec::new(),
        }
    }

    #[inline]
    pub fn is_html(&self) -> bool {
        self.ns == Namespace::Html
    }

    /// Get an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Check for an attribute
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// Set an attribute, replacing the value in place if it already exists
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attrs.push(Attribute { name, value }),
        }
    }

    /// Remove an attribute, returning its value
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attrs.iter().position(|a| a.name == name)?;
        Some(self.attrs.remove(index).value)
    }

    /// Keep only the attributes the predicate accepts; order is preserved
    pub fn retain_attrs<F>(&mut self, f: F)
    where
        F: FnMut(&mut Attribute) -> bool,
    {
        self.attrs.retain_mut(f);
    }
}

/// Text node data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextData {
    pub content: String,
}

/// Attribute
///
/// `name` is the qualified name as written in markup (`xlink:href`,
/// `xml:lang`), lowercase for HTML elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attr_replaces_in_place() {
        let mut elem = ElementData::new("a");
        elem.set_attr("href", "one");
        elem.set_attr("title", "t");
        elem.set_attr("href", "two");

        assert_eq!(elem.attrs.len(), 2);
        assert_eq!(elem.attrs[0].name, "href");
        assert_eq!(elem.attr("href"), Some("two"));
    }

    #[test]
    fn test_remove_and_retain_attrs() {
        let mut elem = ElementData::new("img");
        elem.set_attr("src", "a.png");
        elem.set_attr("onload", "x()");
        elem.set_attr("alt", "a");

        assert_eq!(elem.remove_attr("onload").as_deref(), Some("x()"));
        assert_eq!(elem.remove_attr("onload"), None);

        elem.retain_attrs(|a| a.name != "src");
        let names: Vec<_> = elem.attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["alt"]);
    }

    #[test]
    fn test_namespace_from_url() {
        assert_eq!(Namespace::from_url(Namespace::HTML_URL), Namespace::Html);
        assert_eq!(Namespace::from_url(Namespace::SVG_URL), Namespace::Svg);
        assert_eq!(Namespace::from_url(""), Namespace::Html);
        assert!(matches!(Namespace::from_url("urn:x"), Namespace::Other(_)));
    }
}
