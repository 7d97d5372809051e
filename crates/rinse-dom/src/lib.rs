//! rinse DOM
//!
//! Arena-backed node tree used by the sanitizer. Nodes are addressed by
//! [`NodeId`] and linked through parent/sibling/child indices, so removing or
//! unwrapping a node is a handful of index updates.

mod node;
mod tree;
pub mod path;

pub use node::{Attribute, ElementData, Namespace, Node, NodeData, TextData};
pub use path::{PathError, PathExpr};
pub use tree::{Children, Descendants, DomTree};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID
    pub const ROOT: NodeId = NodeId(0);
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check whether this id points at a node
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn option(self) -> Option<NodeId> {
        self.is_valid().then_some(self)
    }
}
