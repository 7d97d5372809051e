//! rinse HTML
//!
//! HTML5 parsing built on html5ever, converted into the `rinse-dom` arena
//! tree, and serialization back to markup.

mod parser;
pub mod serializer;

use std::fmt;

pub use parser::HtmlParser;
pub use rinse_dom::{DomTree, Node, NodeData, NodeId};
pub use serializer::HtmlSerializer;

/// Parse markup as a body fragment
pub fn parse_fragment(html: &str) -> Fragment {
    HtmlParser::new().parse_fragment(html)
}

/// Parse a complete document
pub fn parse_document(html: &str) -> Document {
    HtmlParser::new().parse_document(html)
}

/// Parsed HTML fragment
#[derive(Debug, Clone)]
pub struct Fragment {
    tree: DomTree,
}

impl Fragment {
    /// Parse markup into a fragment
    pub fn parse(html: &str) -> Self {
        parse_fragment(html)
    }

    pub fn from_tree(tree: DomTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> DomTree {
        self.tree
    }

    /// Serialize back to markup
    pub fn to_html(&self) -> String {
        HtmlSerializer::new().serialize_inner(&self.tree, self.tree.root())
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}

/// Parsed HTML document
#[derive(Debug, Clone)]
pub struct Document {
    tree: DomTree,
}

impl Document {
    /// Parse markup into a document
    pub fn parse(html: &str) -> Self {
        parse_document(html)
    }

    pub fn from_tree(tree: DomTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> DomTree {
        self.tree
    }

    /// Serialize back to markup
    pub fn to_html(&self) -> String {
        HtmlSerializer::new().serialize_inner(&self.tree, self.tree.root())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}
