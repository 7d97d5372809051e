//! Path expressions
//!
//! A small XPath subset for selecting nodes to remove:
//!
//! - location steps separated by `/` (child) and `//` (any depth)
//! - `.` and `..`, absolute paths starting with `/` or `//`
//! - name tests (`script`, `*`) and kind tests (`node()`, `text()`, `comment()`)
//! - predicates: `[@attr]`, `[@attr='value']`, `[@*]`, `[2]`
//! - unions with `|`
//!
//! Element names match ASCII case-insensitively.

use std::fmt;
use std::str::FromStr;

use crate::{DomTree, Node, NodeId};

/// Malformed path expression
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path expression `{expression}` at offset {position}: {message}")]
pub struct PathError {
    pub expression: String,
    pub position: usize,
    pub message: String,
}

/// Compiled path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    source: String,
    paths: Vec<LocationPath>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LocationPath {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    DescendantOrSelf,
    SelfNode,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    AnyNode,
    AnyElement,
    Text,
    Comment,
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Attribute {
        name: Option<String>,
        value: Option<String>,
    },
    Position(usize),
}

impl PathExpr {
    /// Parse an expression
    pub fn parse(source: &str) -> Result<Self, PathError> {
        Parser::new(source).parse()
    }

    /// Source text of the expression
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Nodes matching this expression, in document order without duplicates
    pub fn select(&self, tree: &DomTree, context: NodeId) -> Vec<NodeId> {
        let mut found: Vec<NodeId> = self
            .paths
            .iter()
            .flat_map(|path| path.evaluate(tree, context))
            .collect();

        let order = document_order(tree);
        found.sort_by_key(|id| order.get(id.index()).copied().unwrap_or(usize::MAX));
        found.dedup();
        tracing::trace!(expression = %self.source, matched = found.len(), "path selected");
        found
    }
}

impl FromStr for PathExpr {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn document_order(tree: &DomTree) -> Vec<usize> {
    let mut order = vec![usize::MAX; tree.len()];
    order[tree.root().index()] = 0;
    for (position, (id, _)) in tree.descendants(tree.root()).enumerate() {
        order[id.index()] = position + 1;
    }
    order
}

impl LocationPath {
    fn evaluate(&self, tree: &DomTree, context: NodeId) -> Vec<NodeId> {
        let start = if self.absolute { tree.root() } else { context };
        let mut current = vec![start];

        for step in &self.steps {
            let mut next = Vec::new();
            for &node in &current {
                let mut matched: Vec<NodeId> = step
                    .axis_nodes(tree, node)
                    .into_iter()
                    .filter(|&id| tree.get(id).is_some_and(|n| step.test.matches(n)))
                    .collect();
                for predicate in &step.predicates {
                    matched = predicate.apply(tree, matched);
                }
                next.extend(matched);
            }
            next.sort_unstable();
            next.dedup();
            current = next;
        }

        current
    }
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::AnyNode,
            predicates: Vec::new(),
        }
    }

    fn with_axis(axis: Axis) -> Self {
        Self {
            axis,
            test: NodeTest::AnyNode,
            predicates: Vec::new(),
        }
    }

    fn axis_nodes(&self, tree: &DomTree, node: NodeId) -> Vec<NodeId> {
        match self.axis {
            Axis::Child => tree.children(node).map(|(id, _)| id).collect(),
            Axis::DescendantOrSelf => std::iter::once(node)
                .chain(tree.descendants(node).map(|(id, _)| id))
                .collect(),
            Axis::SelfNode => vec![node],
            Axis::Parent => tree.parent(node).into_iter().collect(),
        }
    }
}

impl NodeTest {
    fn matches(&self, node: &Node) -> bool {
        match self {
            Self::AnyNode => true,
            Self::AnyElement => node.is_element(),
            Self::Text => node.is_text(),
            Self::Comment => node.is_comment(),
            Self::Name(name) => node
                .tag_name()
                .is_some_and(|tag| tag.eq_ignore_ascii_case(name)),
        }
    }
}

impl Predicate {
    fn apply(&self, tree: &DomTree, nodes: Vec<NodeId>) -> Vec<NodeId> {
        match self {
            Self::Position(n) => nodes.get(n - 1).copied().into_iter().collect(),
            Self::Attribute { name, value } => nodes
                .into_iter()
                .filter(|&id| {
                    tree.element(id).is_some_and(|elem| {
                        elem.attrs.iter().any(|attr| {
                            let name_ok = name
                                .as_deref()
                                .is_none_or(|n| attr.name.eq_ignore_ascii_case(n));
                            name_ok && value.as_deref().is_none_or(|v| attr.value == v)
                        })
                    })
                })
                .collect(),
        }
    }
}

// ============================================================================
// PARSER
// ============================================================================

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<PathExpr, PathError> {
        self.skip_ws();
        if self.at_end() {
            return Err(self.error("empty path expression"));
        }

        let mut paths = vec![self.location_path()?];
        loop {
            self.skip_ws();
            if self.eat(b'|') {
                paths.push(self.location_path()?);
            } else {
                break;
            }
        }

        self.skip_ws();
        if !self.at_end() {
            return Err(self.unexpected());
        }

        Ok(PathExpr {
            source: self.src.to_string(),
            paths,
        })
    }

    fn location_path(&mut self) -> Result<LocationPath, PathError> {
        self.skip_ws();
        let mut steps = Vec::new();
        let absolute = if self.eat_str("//") {
            steps.push(Step::descendant_or_self());
            steps.push(self.step()?);
            true
        } else if self.eat(b'/') {
            self.skip_ws();
            if self.starts_step() {
                steps.push(self.step()?);
            }
            true
        } else {
            steps.push(self.step()?);
            false
        };

        // A bare `/` selects the root and takes no further steps.
        if absolute && steps.is_empty() {
            return Ok(LocationPath { absolute, steps });
        }

        loop {
            self.skip_ws();
            if self.eat_str("//") {
                steps.push(Step::descendant_or_self());
                steps.push(self.step()?);
            } else if self.eat(b'/') {
                steps.push(self.step()?);
            } else {
                break;
            }
        }

        Ok(LocationPath { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(self.peek(), Some(b) if b == b'.' || b == b'*' || is_name_start(b))
    }

    fn step(&mut self) -> Result<Step, PathError> {
        self.skip_ws();
        if self.eat_str("..") {
            return Ok(Step::with_axis(Axis::Parent));
        }
        if self.eat(b'.') {
            return Ok(Step::with_axis(Axis::SelfNode));
        }

        let test = if self.eat(b'*') {
            NodeTest::AnyElement
        } else {
            let start = self.pos;
            let name = self.name()?;
            if self.eat(b'(') {
                self.skip_ws();
                self.expect(b')')?;
                match name {
                    "node" => NodeTest::AnyNode,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => {
                        return Err(self.error_at(start, format!("unknown node test `{name}()`")));
                    }
                }
            } else {
                NodeTest::Name(name.to_ascii_lowercase())
            }
        };

        let mut predicates = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(b'[') {
                predicates.push(self.predicate()?);
            } else {
                break;
            }
        }

        Ok(Step {
            axis: Axis::Child,
            test,
            predicates,
        })
    }

    fn predicate(&mut self) -> Result<Predicate, PathError> {
        self.skip_ws();
        let predicate = if self.eat(b'@') {
            let name = if self.eat(b'*') {
                None
            } else {
                Some(self.name()?.to_ascii_lowercase())
            };
            self.skip_ws();
            let value = if self.eat(b'=') {
                self.skip_ws();
                Some(self.literal()?)
            } else {
                None
            };
            Predicate::Attribute { name, value }
        } else if self.peek().is_some_and(|b| b.is_ascii_digit()) {
            let start = self.pos;
            let n = self.number()?;
            if n == 0 {
                return Err(self.error_at(start, "positions start at 1"));
            }
            Predicate::Position(n)
        } else {
            return Err(self.error("expected `@attribute` or a position in predicate"));
        };

        self.skip_ws();
        self.expect(b']')?;
        Ok(predicate)
    }

    fn name(&mut self) -> Result<&'a str, PathError> {
        let start = self.pos;
        match self.peek() {
            Some(b) if is_name_start(b) => self.pos += 1,
            _ => return Err(self.error("expected a node test")),
        }
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        Ok(&self.src[start..self.pos])
    }

    fn number(&mut self) -> Result<usize, PathError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        self.src[start..self.pos]
            .parse()
            .map_err(|_| self.error_at(start, "position out of range"))
    }

    fn literal(&mut self) -> Result<String, PathError> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error("expected a quoted string")),
        };
        let start = self.pos;
        self.pos += 1;
        let Some(len) = self.bytes[self.pos..].iter().position(|&b| b == quote) else {
            return Err(self.error_at(start, "unterminated string literal"));
        };
        let value = self.src[self.pos..self.pos + len].to_string();
        self.pos += len + 1;
        Ok(value)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.bytes[self.pos..].starts_with(s.as_bytes()) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), PathError> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", byte as char)))
        }
    }

    fn unexpected(&self) -> PathError {
        let found = self.src[self.pos..].chars().next().unwrap_or(' ');
        self.error(format!("unexpected `{found}`"))
    }

    fn error(&self, message: impl Into<String>) -> PathError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> PathError {
        PathError {
            expression: self.src.to_string(),
            position,
            message: message.into(),
        }
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':')
}
