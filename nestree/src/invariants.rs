//! Invariant checking over a full row set.
//!
//! The checker is independent of the tree operations: it looks only at the
//! rows and verifies every structural invariant of the encoding. The
//! simulator runs it after each operation; tests run it after scenarios.

use std::collections::HashSet;
use std::fmt;

use crate::node::Node;

/// Which invariant was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// `left >= right`.
    InvalidBounds,
    /// `depth < 0`.
    NegativeDepth,
    /// Two rows share a `left`.
    DuplicateLeft,
    /// Two rows share a `right`.
    DuplicateRight,
    /// Rows exist but none has `left == 0`.
    MissingRoot,
    /// More than one row has `left == 0`.
    MultipleRoots,
    /// The root is not at depth 0 or does not enclose every row.
    MalformedRoot,
    /// Two intervals overlap without nesting.
    PartialOverlap,
    /// A cached depth differs from the number of ancestors.
    DepthMismatch,
    /// A childless row is wider than one unit.
    LeafWidth,
    /// `right - left != 2 * size - 1`.
    SizeIdentity,
    /// The tree differs from the reference model.
    ModelMismatch,
    /// An operation succeeded or failed against expectation.
    OutcomeMismatch,
}

/// An invariant violation.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Which invariant.
    pub kind: ViolationKind,
    /// Description of the violation.
    pub description: String,
    /// Additional context.
    pub context: String,
    /// Operation index where it was detected.
    pub operation_index: usize,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[op {}] {:?}: {}",
            self.operation_index, self.kind, self.description
        )?;
        if !self.context.is_empty() {
            write!(f, " ({})", self.context)?;
        }
        Ok(())
    }
}

/// Collects invariant violations.
pub struct InvariantChecker {
    violations: Vec<InvariantViolation>,
}

impl Default for InvariantChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantChecker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    /// Get all violations.
    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    /// Check if any violations were detected.
    #[must_use]
    pub const fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn clear(&mut self) {
        self.violations.clear();
    }

    pub fn add_violation(&mut self, violation: InvariantViolation) {
        self.violations.push(violation);
    }

    fn report(
        &mut self,
        kind: ViolationKind,
        description: String,
        node: &Node,
        operation_index: usize,
    ) {
        self.violations.push(InvariantViolation {
            kind,
            description,
            context: format!(
                "node {} [{}, {}] depth {}",
                node.id, node.left, node.right, node.depth
            ),
            operation_index,
        });
    }

    /// Run every check over the complete row set of one tree.
    pub fn check_rows(&mut self, rows: &[Node], operation_index: usize) {
        let mut sorted = rows.to_vec();
        sorted.sort_by_key(|n| (n.left, n.id));

        self.check_bounds(&sorted, operation_index);
        self.check_unique_bounds(&sorted, operation_index);
        self.check_root(&sorted, operation_index);
        self.check_nesting(&sorted, operation_index);
        self.check_sizes(&sorted, operation_index);
    }

    /// `left < right` and `depth >= 0` for every row.
    pub fn check_bounds(&mut self, rows: &[Node], operation_index: usize) {
        for node in rows {
            if node.left >= node.right {
                self.report(
                    ViolationKind::InvalidBounds,
                    "left bound is not below right bound".to_string(),
                    node,
                    operation_index,
                );
            }
            if node.depth < 0 {
                self.report(
                    ViolationKind::NegativeDepth,
                    "depth is negative".to_string(),
                    node,
                    operation_index,
                );
            }
        }
    }

    /// No two rows share a `left` or a `right`.
    pub fn check_unique_bounds(&mut self, rows: &[Node], operation_index: usize) {
        let mut lefts = HashSet::new();
        let mut rights = HashSet::new();
        for node in rows {
            if !lefts.insert(node.left) {
                self.report(
                    ViolationKind::DuplicateLeft,
                    format!("left bound {} is used twice", node.left),
                    node,
                    operation_index,
                );
            }
            if !rights.insert(node.right) {
                self.report(
                    ViolationKind::DuplicateRight,
                    format!("right bound {} is used twice", node.right),
                    node,
                    operation_index,
                );
            }
        }
    }

    /// Exactly one root, at depth 0, enclosing every other row.
    pub fn check_root(&mut self, rows: &[Node], operation_index: usize) {
        let roots: Vec<&Node> = rows.iter().filter(|n| n.left == 0).collect();
        let Some(root) = roots.first() else {
            if let Some(first) = rows.first() {
                self.report(
                    ViolationKind::MissingRoot,
                    "no row has left bound 0".to_string(),
                    first,
                    operation_index,
                );
            }
            return;
        };

        for extra in &roots[1..] {
            self.report(
                ViolationKind::MultipleRoots,
                "a second row has left bound 0".to_string(),
                extra,
                operation_index,
            );
        }
        if root.depth != 0 {
            self.report(
                ViolationKind::MalformedRoot,
                "root is not at depth 0".to_string(),
                root,
                operation_index,
            );
        }
        for node in rows {
            if node.id != root.id && !root.is_ancestor_of(node) {
                self.report(
                    ViolationKind::MalformedRoot,
                    format!("row is not inside root {}", root.id),
                    node,
                    operation_index,
                );
            }
        }
    }

    /// Intervals nest, and cached depths count the enclosing intervals.
    ///
    /// Expects `rows` sorted by `left`.
    pub fn check_nesting(&mut self, rows: &[Node], operation_index: usize) {
        let mut open: Vec<&Node> = Vec::new();
        for node in rows {
            while open.last().is_some_and(|top| top.right < node.left) {
                open.pop();
            }
            if let Some(top) = open.last()
                && node.right > top.right
            {
                self.report(
                    ViolationKind::PartialOverlap,
                    format!("interval overlaps {} [{}, {}]", top.id, top.left, top.right),
                    node,
                    operation_index,
                );
            }
            let ancestors = i64::try_from(open.len()).unwrap_or(i64::MAX);
            if node.depth != ancestors {
                self.report(
                    ViolationKind::DepthMismatch,
                    format!("cached depth differs from {ancestors} enclosing rows"),
                    node,
                    operation_index,
                );
            }
            open.push(node);
        }
    }

    /// Leaf width and the size identity `right - left == 2 * size - 1`.
    ///
    /// Expects `rows` sorted by `left`.
    pub fn check_sizes(&mut self, rows: &[Node], operation_index: usize) {
        let lefts: Vec<i64> = rows.iter().map(|n| n.left).collect();
        for node in rows {
            let start = lefts.partition_point(|&l| l < node.left);
            let end = lefts.partition_point(|&l| l <= node.right);
            let size = i64::try_from(end - start).unwrap_or(i64::MAX);

            if size == 1 && !node.is_leaf() {
                self.report(
                    ViolationKind::LeafWidth,
                    format!("childless row has width {}", node.width()),
                    node,
                    operation_index,
                );
            } else if node.width() != 2 * size - 1 {
                self.report(
                    ViolationKind::SizeIdentity,
                    format!("width {} does not match subtree size {size}", node.width()),
                    node,
                    operation_index,
                );
            }
        }
    }
}

/// Check a row set, returning every violation found.
#[must_use]
pub fn check(rows: &[Node]) -> Vec<InvariantViolation> {
    let mut checker = InvariantChecker::new();
    checker.check_rows(rows, 0);
    checker.violations
}
