//! Field predicates and orderings understood by every row store.
//!
//! A `Filter` is a conjunction of conditions over the three structural
//! columns. An empty filter matches every row.

use std::cmp::Ordering;
use std::fmt;

use crate::node::Node;

/// A structural column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The `left` bound.
    Left,
    /// The `right` bound.
    Right,
    /// The cached depth.
    Depth,
}

impl Field {
    const fn read(self, node: &Node) -> i64 {
        match self {
            Self::Left => node.left,
            Self::Right => node.right,
            Self::Depth => node.depth,
        }
    }

    /// Column name as it appears in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Depth => "depth",
        }
    }
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl Cmp {
    const fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ge => lhs >= rhs,
            Self::Gt => lhs > rhs,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ge => ">=",
            Self::Gt => ">",
        }
    }
}

/// `field cmp value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub field: Field,
    pub cmp: Cmp,
    pub value: i64,
}

impl Condition {
    #[must_use]
    pub const fn matches(&self, node: &Node) -> bool {
        self.cmp.holds(self.field.read(node), self.value)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field.name(), self.cmp.symbol(), self.value)
    }
}

/// A conjunction of conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// A filter matching every row.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Add a condition.
    #[must_use]
    pub fn and(mut self, field: Field, cmp: Cmp, value: i64) -> Self {
        self.conditions.push(Condition { field, cmp, value });
        self
    }

    #[must_use]
    pub fn left(self, cmp: Cmp, value: i64) -> Self {
        self.and(Field::Left, cmp, value)
    }

    #[must_use]
    pub fn right(self, cmp: Cmp, value: i64) -> Self {
        self.and(Field::Right, cmp, value)
    }

    #[must_use]
    pub fn depth(self, cmp: Cmp, value: i64) -> Self {
        self.and(Field::Depth, cmp, value)
    }

    /// Rows whose interval lies within `[left, right]`, bounds inclusive.
    #[must_use]
    pub fn within(left: i64, right: i64) -> Self {
        Self::all().left(Cmp::Ge, left).right(Cmp::Le, right)
    }

    /// Rows whose interval contains `[left, right]`, bounds inclusive.
    #[must_use]
    pub fn containing(left: i64, right: i64) -> Self {
        Self::all().left(Cmp::Le, left).right(Cmp::Ge, right)
    }

    /// The conditions in this filter.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// True when every condition holds for `node`.
    #[must_use]
    pub fn matches(&self, node: &Node) -> bool {
        self.conditions.iter().all(|c| c.matches(node))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "true");
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{condition}")?;
        }
        Ok(())
    }
}

/// Result ordering for `find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Store order (by identifier).
    #[default]
    Unordered,
    /// `left` ascending: pre-order.
    LeftAsc,
    /// `(depth, left)` ascending: level order.
    DepthThenLeft,
}

impl Order {
    /// Sort rows in place.
    pub fn sort(self, rows: &mut [Node]) {
        match self {
            Self::Unordered => rows.sort_by_key(|n| n.id),
            Self::LeftAsc => rows.sort_by_key(|n| n.left),
            Self::DepthThenLeft => rows.sort_by(|a, b| match a.depth.cmp(&b.depth) {
                Ordering::Equal => a.left.cmp(&b.left),
                other => other,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::node;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = Filter::all();
        assert!(filter.matches(&node(1, 0, 1, 0)));
        assert_eq!(filter.to_string(), "true");
    }

    #[test]
    fn test_within_is_inclusive() {
        let filter = Filter::within(1, 6);
        assert!(filter.matches(&node(1, 1, 6, 1)));
        assert!(filter.matches(&node(2, 2, 3, 2)));
        assert!(!filter.matches(&node(3, 0, 9, 0)));
        assert!(!filter.matches(&node(4, 7, 8, 1)));
    }

    #[test]
    fn test_containing_is_inclusive() {
        let filter = Filter::containing(2, 3);
        assert!(filter.matches(&node(1, 0, 9, 0)));
        assert!(filter.matches(&node(2, 2, 3, 2)));
        assert!(!filter.matches(&node(3, 4, 5, 2)));
    }

    #[test]
    fn test_filter_display() {
        let filter = Filter::all().left(Cmp::Gt, 3).depth(Cmp::Eq, 2);
        assert_eq!(filter.to_string(), "left > 3 AND depth = 2");
    }

    #[test]
    fn test_level_order_sort() {
        let mut rows = vec![
            node(1, 2, 3, 2),
            node(2, 0, 9, 0),
            node(3, 7, 8, 1),
            node(4, 1, 6, 1),
        ];
        Order::DepthThenLeft.sort(&mut rows);
        let ids: Vec<u64> = rows.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![2, 4, 3, 1]);
    }
}
