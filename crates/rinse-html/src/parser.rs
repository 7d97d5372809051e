//! HTML5 Parser implementation
//!
//! Uses html5ever's RcDom and converts it to our arena tree. Parse errors are
//! recovered by the HTML5 algorithm itself; nothing here can fail.

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, ns, parse_document, parse_fragment, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use rinse_dom::{Attribute, DomTree, ElementData, Namespace, NodeData, NodeId, TextData};

use crate::{Document, Fragment};

/// HTML5 parser
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl HtmlParser {
    /// Create a new HTML parser
    pub fn new() -> Self {
        Self
    }

    /// Parse markup as the contents of a `<body>` element
    pub fn parse_fragment(&self, html: &str) -> Fragment {
        tracing::debug!(len = html.len(), "parsing HTML fragment");

        let dom = parse_fragment(
            RcDom::default(),
            ParseOpts::default(),
            QualName::new(None, ns!(html), local_name!("body")),
            Vec::new(),
            false,
        )
        .one(html);

        // The fragment algorithm wraps the parsed nodes in a synthetic <html>.
        let mut tree = DomTree::new_fragment();
        let root = tree.root();
        let context = dom.document.children.borrow().first().cloned();
        if let Some(context) = context {
            for child in context.children.borrow().iter() {
                self.convert_subtree(child, &mut tree, root);
            }
        }

        tracing::debug!(nodes = tree.len(), "parsed HTML fragment");
        Fragment::from_tree(tree)
    }

    /// Parse a complete HTML document
    pub fn parse_document(&self, html: &str) -> Document {
        tracing::debug!(len = html.len(), "parsing HTML document");

        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);

        let mut tree = DomTree::new_document();
        let root = tree.root();
        for child in dom.document.children.borrow().iter() {
            self.convert_subtree(child, &mut tree, root);
        }

        tracing::debug!(nodes = tree.len(), "parsed HTML document");
        Document::from_tree(tree)
    }

    /// Convert an RcDom subtree into our DOM format.
    ///
    /// Iterative so that deeply nested input cannot exhaust the stack.
    fn convert_subtree(&self, handle: &Handle, tree: &mut DomTree, parent: NodeId) {
        let mut stack = vec![(handle.clone(), parent)];

        while let Some((handle, parent)) = stack.pop() {
            let data = match &handle.data {
                RcNodeData::Document => {
                    push_children(&mut stack, &handle, parent);
                    continue;
                }
                RcNodeData::Doctype {
                    name,
                    public_id,
                    system_id,
                } => NodeData::Doctype {
                    name: name.to_string(),
                    public_id: public_id.to_string(),
                    system_id: system_id.to_string(),
                },
                RcNodeData::Text { contents } => NodeData::Text(TextData {
                    content: contents.borrow().to_string(),
                }),
                RcNodeData::Comment { contents } => NodeData::Comment(contents.to_string()),
                RcNodeData::ProcessingInstruction { target, contents } => {
                    NodeData::ProcessingInstruction {
                        target: target.to_string(),
                        data: contents.to_string(),
                    }
                }
                RcNodeData::Element { name, attrs, .. } => {
                    let mut elem = ElementData::with_namespace(
                        Namespace::from_url(&name.ns),
                        name.local.to_string(),
                    );
                    elem.attrs = attrs
                        .borrow()
                        .iter()
                        .map(|attr| {
                            let local: &str = &attr.name.local;
                            let name = match &attr.name.prefix {
                                Some(prefix) => format!("{prefix}:{local}"),
                                None => local.to_string(),
                            };
                            Attribute::new(name, attr.value.to_string())
                        })
                        .collect();
                    NodeData::Element(elem)
                }
            };

            let id = tree.create_node(data);
            tree.append_child(parent, id);

            if let RcNodeData::Element {
                template_contents, ..
            } = &handle.data
            {
                // Template contents live in a separate document fragment;
                // attach them as children so policies see them.
                if let Some(contents) = template_contents.borrow().as_ref() {
                    push_children(&mut stack, contents, id);
                }
            }
            push_children(&mut stack, &handle, id);
        }
    }
}

fn push_children(stack: &mut Vec<(Handle, NodeId)>, handle: &Handle, parent: NodeId) {
    stack.extend(
        handle
            .children
            .borrow()
            .iter()
            .rev()
            .map(|child| (child.clone(), parent)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment_keeps_whitespace_text() {
        let fragment = HtmlParser::new().parse_fragment("<a>x</a>\n<b>y</b>");
        let tree = fragment.tree();
        let kinds: Vec<_> = tree
            .children(tree.root())
            .map(|(_, n)| n.tag_name().unwrap_or("#text").to_string())
            .collect();
        assert_eq!(kinds, ["a", "#text", "b"]);
    }

    #[test]
    fn test_parse_fragment_lowercases_names() {
        let fragment = HtmlParser::new().parse_fragment("<A HREF='x'>y</A>");
        let tree = fragment.tree();
        let (id, _) = tree.children(tree.root()).next().unwrap();
        let elem = tree.element(id).unwrap();
        assert_eq!(elem.local, "a");
        assert_eq!(elem.attr("href"), Some("x"));
    }

    #[test]
    fn test_parse_document_builds_skeleton() {
        let doc = HtmlParser::new().parse_document("<p>Hello</p>");
        let tree = doc.tree();
        let names: Vec<_> = tree
            .descendants(tree.root())
            .filter_map(|(_, n)| n.tag_name().map(str::to_string))
            .collect();
        assert_eq!(names, ["html", "head", "body", "p"]);
    }

    #[test]
    fn test_template_contents_become_children() {
        let fragment = HtmlParser::new().parse_fragment("<template><b>x</b></template>");
        let tree = fragment.tree();
        let names: Vec<_> = tree
            .descendants(tree.root())
            .filter_map(|(_, n)| n.tag_name().map(str::to_string))
            .collect();
        assert_eq!(names, ["template", "b"]);
    }
}
