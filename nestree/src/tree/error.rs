use std::fmt;

use crate::node::NodeId;
use crate::store::StoreError;
use crate::tree::shift::Window;

/// Errors that can occur in a tree operation.
#[derive(Debug)]
pub enum TreeError {
    /// The referenced node does not exist.
    NotFound(NodeId),
    /// The operation's arguments do not describe a valid structural change.
    InvalidStructure(StructureError),
    /// The row store failed, or refused to commit.
    TransactionFailure(StoreError),
}

impl TreeError {
    /// True when the whole operation may be retried as-is.
    ///
    /// Every operation runs in one transaction, so a failed commit leaves
    /// nothing behind to clean up.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionFailure(_))
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "node {id} not found"),
            Self::InvalidStructure(e) => write!(f, "invalid structure: {e}"),
            Self::TransactionFailure(e) => write!(f, "transaction failed: {e}"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::InvalidStructure(e) => Some(e),
            Self::TransactionFailure(e) => Some(e),
        }
    }
}

impl From<StoreError> for TreeError {
    fn from(e: StoreError) -> Self {
        Self::TransactionFailure(e)
    }
}

impl From<StructureError> for TreeError {
    fn from(e: StructureError) -> Self {
        Self::InvalidStructure(e)
    }
}

/// A rejected structural precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    /// `insert_parent_over` was given no children.
    EmptyChildren,
    /// The children are not all at the same depth.
    DepthMismatch {
        node: NodeId,
        expected: i64,
        found: i64,
    },
    /// The children do not all share one immediate parent.
    ParentMismatch(NodeId),
    /// An unlisted sibling lies between two of the children.
    NonAdjacentChildren { before: NodeId, after: NodeId },
    /// A subtree cannot be moved under itself.
    TargetInsideSource { source: NodeId, target: NodeId },
    /// A row partially overlaps the shift window; the tree is corrupt.
    StraddlingWindow { node: NodeId, window: Window },
}

impl fmt::Display for StructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyChildren => write!(f, "no children given"),
            Self::DepthMismatch {
                node,
                expected,
                found,
            } => write!(f, "node {node} is at depth {found}, expected {expected}"),
            Self::ParentMismatch(node) => {
                write!(f, "node {node} does not share a parent with the other children")
            }
            Self::NonAdjacentChildren { before, after } => {
                write!(f, "nodes {before} and {after} are not adjacent siblings")
            }
            Self::TargetInsideSource { source, target } => {
                write!(f, "cannot move {source} under {target}, which is inside it")
            }
            Self::StraddlingWindow { node, window } => {
                write!(f, "node {node} straddles shift window {window}")
            }
        }
    }
}

impl std::error::Error for StructureError {}
