//! HTML Serialization
//!
//! Serializes tree nodes back to markup:
//! - proper text and attribute escaping
//! - void element handling
//! - raw text elements emitted verbatim when that is safe to re-parse

use rinse_dom::{DomTree, NodeData, NodeId};

/// Void elements (self-closing, no end tag)
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Raw text elements (no escaping for content)
pub const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

/// Elements whose first newline is swallowed by the parser
const NEWLINE_SENSITIVE: &[&str] = &["pre", "textarea", "listing"];

/// HTML serializer
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSerializer;

enum Frame {
    Open(NodeId),
    Close(NodeId),
}

impl HtmlSerializer {
    pub fn new() -> Self {
        Self
    }

    /// Serialize the children of a node (innerHTML)
    pub fn serialize_inner(&self, tree: &DomTree, node_id: NodeId) -> String {
        let mut output = String::new();
        let mut stack: Vec<Frame> = tree
            .children(node_id)
            .map(|(id, _)| Frame::Open(id))
            .collect();
        stack.reverse();
        self.run(tree, stack, &mut output);
        output
    }

    /// Serialize a node including itself (outerHTML)
    pub fn serialize_outer(&self, tree: &DomTree, node_id: NodeId) -> String {
        let mut output = String::new();
        self.run(tree, vec![Frame::Open(node_id)], &mut output);
        output
    }

    fn run(&self, tree: &DomTree, mut stack: Vec<Frame>, output: &mut String) {
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Open(id) => self.open(tree, id, &mut stack, output),
                Frame::Close(id) => {
                    if let Some(elem) = tree.element(id) {
                        output.push_str("</");
                        output.push_str(&elem.local);
                        output.push('>');
                    }
                }
            }
        }
    }

    fn open(&self, tree: &DomTree, node_id: NodeId, stack: &mut Vec<Frame>, output: &mut String) {
        let Some(node) = tree.get(node_id) else {
            return;
        };

        match &node.data {
            NodeData::Document | NodeData::Fragment => {
                push_children(tree, node_id, stack);
            }
            NodeData::Element(elem) => {
                let tag = elem.local.as_str();
                let is_html = elem.is_html();

                output.push('<');
                output.push_str(tag);
                for attr in &elem.attrs {
                    output.push(' ');
                    output.push_str(&attr.name);
                    if !attr.value.is_empty() {
                        output.push_str("=\"");
                        escape_attribute(&attr.value, output);
                        output.push('"');
                    }
                }

                if is_html && VOID_ELEMENTS.contains(&tag) {
                    output.push_str(" />");
                    return;
                }
                output.push('>');

                if is_html && RAW_TEXT_ELEMENTS.contains(&tag) {
                    self.serialize_raw_children(tree, node_id, tag, output);
                    stack.push(Frame::Close(node_id));
                    return;
                }

                if is_html && NEWLINE_SENSITIVE.contains(&tag) {
                    let leading_newline = tree
                        .first_child(node_id)
                        .and_then(|id| tree.get(id))
                        .and_then(|n| n.as_text())
                        .is_some_and(|t| t.starts_with('\n'));
                    if leading_newline {
                        output.push('\n');
                    }
                }

                stack.push(Frame::Close(node_id));
                push_children(tree, node_id, stack);
            }
            NodeData::Text(text) => {
                escape_text(&text.content, output);
            }
            NodeData::Comment(text) => {
                output.push_str("<!--");
                output.push_str(text);
                output.push_str("-->");
            }
            NodeData::Doctype { name, .. } => {
                output.push_str("<!DOCTYPE ");
                output.push_str(name);
                output.push('>');
            }
            NodeData::ProcessingInstruction { target, data } => {
                output.push_str("<?");
                output.push_str(target);
                if !data.is_empty() {
                    output.push(' ');
                    output.push_str(data);
                }
                output.push('>');
            }
        }
    }

    /// Raw text children; escaped instead when they could end the element early
    fn serialize_raw_children(&self, tree: &DomTree, parent_id: NodeId, tag: &str, output: &mut String) {
        let content: String = tree
            .children(parent_id)
            .filter_map(|(_, child)| child.as_text())
            .collect();

        if could_close(&content, tag) {
            escape_text(&content, output);
        } else {
            output.push_str(&content);
        }
    }
}

fn push_children(tree: &DomTree, parent: NodeId, stack: &mut Vec<Frame>) {
    let start = stack.len();
    stack.extend(tree.children(parent).map(|(id, _)| Frame::Open(id)));
    stack[start..].reverse();
}

/// Whether re-tokenizing `content` inside `<tag>` would end the element early
fn could_close(content: &str, tag: &str) -> bool {
    if tag == "plaintext" {
        return false;
    }
    let lower = content.to_ascii_lowercase();
    if tag == "script" {
        return script_could_close(&lower);
    }
    lower
        .match_indices("</")
        .any(|(i, _)| tag_name_at(&lower, i + 2, tag))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptState {
    Data,
    Escaped,
    DoubleEscaped,
}

/// Script text goes through the tokenizer's escape states: `</script>`
/// after `<!--<script>` does not end the element.
fn script_could_close(lower: &str) -> bool {
    let mut state = ScriptState::Data;
    let mut i = 0;
    while let Some(rest) = lower.get(i..).filter(|r| !r.is_empty()) {
        let end_tag = rest.starts_with("</") && tag_name_at(lower, i + 2, "script");
        match state {
            ScriptState::Data if rest.starts_with("<!--") => {
                state = ScriptState::Escaped;
                // The dashes also count towards a closing `-->`.
                i += 2;
                continue;
            }
            ScriptState::Data if end_tag => return true,
            ScriptState::Escaped | ScriptState::DoubleEscaped if rest.starts_with("-->") => {
                state = ScriptState::Data;
                i += 3;
                continue;
            }
            ScriptState::Escaped if end_tag => return true,
            ScriptState::Escaped if rest.starts_with('<') && tag_name_at(lower, i + 1, "script") => {
                state = ScriptState::DoubleEscaped;
                i += "<script".len();
                continue;
            }
            ScriptState::DoubleEscaped if end_tag => {
                state = ScriptState::Escaped;
                i += "</script".len();
                continue;
            }
            _ => {}
        }
        i += rest.chars().next().map_or(1, char::len_utf8);
    }
    // The closing tag would only leave the double-escaped state.
    state == ScriptState::DoubleEscaped
}

/// `name` starts at byte `at` and is followed by a character that ends a tag name
fn tag_name_at(s: &str, at: usize, name: &str) -> bool {
    s.get(at..)
        .and_then(|rest| rest.strip_prefix(name))
        .and_then(|after| after.chars().next())
        .is_some_and(|c| matches!(c, '\t' | '\n' | '\r' | '\x0c' | ' ' | '/' | '>'))
}

/// Escape text content for HTML
pub fn escape_text(text: &str, output: &mut String) {
    for c in text.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            _ => output.push(c),
        }
    }
}

/// Escape attribute value
pub fn escape_attribute(text: &str, output: &mut String) {
    for c in text.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '"' => output.push_str("&quot;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            _ => output.push(c),
        }
    }
}
