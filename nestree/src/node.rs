//! Node rows and their derived relationships.
//!
//! A node is one row of the nested-set table. Its `left`/`right` bounds
//! encode its position in the tree: ancestry is interval containment.
//!
//! # Invariants
//!
//! - `left < right` for every stored node.
//! - `depth >= 0` and equals the number of strict ancestors.
//! - A leaf has `right == left + 1`.

use std::fmt;

/// Opaque row identifier assigned by the row store.
///
/// Identifiers are never reused within a store and never copied by
/// `copy_subtree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Get the raw identifier value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A single stored row.
///
/// Nodes are immutable values: a `Node` is a snapshot of the row taken at
/// the time it was read. Any shift issued afterwards may have moved the
/// stored row, so a `Node` must not be reused across a shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Identifier owned by the row store.
    pub id: NodeId,
    /// Left bound.
    pub left: i64,
    /// Right bound.
    pub right: i64,
    /// Cached distance from the root.
    pub depth: i64,
    /// Client data, opaque to the tree.
    pub payload: Vec<u8>,
}

impl Node {
    /// `right - left`.
    ///
    /// The gap a subtree occupies in the encoding is `width + 1` units.
    #[must_use]
    pub const fn width(&self) -> i64 {
        self.right - self.left
    }

    /// Number of nodes in this node's subtree, including itself.
    ///
    /// Derived from the size identity `right - left == 2 * size - 1`.
    #[must_use]
    pub const fn size(&self) -> i64 {
        (self.width() + 1) / 2
    }

    /// True for the node at `left == 0`.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.left == 0
    }

    /// True when the node has no children.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.right == self.left + 1
    }

    /// True when the node has at least one child.
    #[must_use]
    pub const fn has_children(&self) -> bool {
        !self.is_leaf()
    }

    /// True when `self` strictly contains `other`.
    #[must_use]
    pub const fn is_ancestor_of(&self, other: &Self) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// True when `other` strictly contains `self`.
    #[must_use]
    pub const fn is_descendant_of(&self, other: &Self) -> bool {
        other.is_ancestor_of(self)
    }

    /// True when `self` is the immediate parent of `other`.
    #[must_use]
    pub const fn is_parent_of(&self, other: &Self) -> bool {
        self.is_ancestor_of(other) && self.depth + 1 == other.depth
    }

    /// True when the two intervals are disjoint.
    #[must_use]
    pub const fn is_unrelated_to(&self, other: &Self) -> bool {
        self.right < other.left || other.right < self.left
    }

    /// True when the two intervals overlap without one containing the other.
    ///
    /// This never holds between two nodes of a consistent tree.
    #[must_use]
    pub const fn partially_overlaps(&self, other: &Self) -> bool {
        let nested = (self.left <= other.left && other.right <= self.right)
            || (other.left <= self.left && self.right <= other.right);
        !nested && !self.is_unrelated_to(other)
    }
}

/// Field values for a row about to be created.
///
/// The store assigns the identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRow {
    /// Left bound.
    pub left: i64,
    /// Right bound.
    pub right: i64,
    /// Depth below the root.
    pub depth: i64,
    /// Client data.
    pub payload: Vec<u8>,
}

impl NewRow {
    /// Attach an identifier, producing the stored node.
    #[must_use]
    pub fn into_node(self, id: NodeId) -> Node {
        Node {
            id,
            left: self.left,
            right: self.right,
            depth: self.depth,
            payload: self.payload,
        }
    }
}

#[cfg(test)]
pub(crate) fn node(id: u64, left: i64, right: i64, depth: i64) -> Node {
    Node {
        id: NodeId(id),
        left,
        right,
        depth,
        payload: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_predicates() {
        let leaf = node(1, 2, 3, 2);
        assert!(leaf.is_leaf());
        assert!(!leaf.has_children());
        assert!(!leaf.is_root());
        assert_eq!(leaf.size(), 1);
    }

    #[test]
    fn test_size_from_width() {
        let root = node(1, 0, 9, 0);
        assert!(root.is_root());
        assert!(root.has_children());
        assert_eq!(root.width(), 9);
        assert_eq!(root.size(), 5);
    }

    #[test]
    fn test_relationships() {
        let root = node(1, 0, 9, 0);
        let child = node(2, 1, 6, 1);
        let grandchild = node(3, 2, 3, 2);
        let sibling = node(4, 7, 8, 1);

        assert!(root.is_ancestor_of(&grandchild));
        assert!(root.is_parent_of(&child));
        assert!(!root.is_parent_of(&grandchild));
        assert!(grandchild.is_descendant_of(&child));
        assert!(child.is_unrelated_to(&sibling));
        assert!(!child.is_ancestor_of(&child));
    }

    #[test]
    fn test_partial_overlap_detection() {
        let a = node(1, 1, 4, 1);
        let b = node(2, 3, 6, 1);
        let c = node(3, 2, 3, 2);
        assert!(a.partially_overlaps(&b));
        assert!(b.partially_overlaps(&a));
        assert!(!a.partially_overlaps(&c));
        assert!(!c.partially_overlaps(&node(4, 5, 6, 1)));
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId(42).to_string(), "#42");
    }
}
