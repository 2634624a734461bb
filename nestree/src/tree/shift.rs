//! The shift primitive.
//!
//! Every structural mutation opens or closes a gap in the encoding. A
//! [`Shift`] describes one such change as a window and a magnitude; applying
//! it relocates every row according to where that row sits relative to the
//! window:
//!
//! | Placement    | Condition on `[l, r]` vs window `[L, R]`   | Effect                                   |
//! |--------------|--------------------------------------------|------------------------------------------|
//! | `Enclosing`  | `l <= L && r >= R`                         | `r += m`                                 |
//! | `Right`      | `l > R`, or `l == R` for a span window     | `l += m; r += m`                         |
//! | `Inside`     | `l > L && r < R`                           | `l += m - 1; r += m - 1; depth += delta` |
//! | `Left`       | `r <= L`                                   | unchanged                                |
//! | `Straddling` | anything else                              | unchanged, corrupt state                 |
//!
//! The shift is issued to the store as one bulk conditional update, so all
//! rows move together inside the caller's transaction.

use std::fmt;

use crate::node::Node;
use crate::store::{Cmp, Filter, Order, Relocation, RowTransaction};
use crate::tree::error::{StructureError, TreeError};

/// The region where space is inserted or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub left: i64,
    pub right: i64,
}

impl Window {
    /// A single position.
    #[must_use]
    pub const fn point(at: i64) -> Self {
        Self {
            left: at,
            right: at,
        }
    }

    /// An interval `[left, right]`.
    #[must_use]
    pub const fn span(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    /// The interval occupied by `node`.
    #[must_use]
    pub const fn of(node: &Node) -> Self {
        Self::span(node.left, node.right)
    }

    /// True when `left == right`.
    #[must_use]
    pub const fn is_point(&self) -> bool {
        self.left == self.right
    }

    /// Where the interval `[left, right]` lies relative to this window.
    #[must_use]
    pub const fn place(&self, left: i64, right: i64) -> Placement {
        if left <= self.left && right >= self.right {
            Placement::Enclosing
        } else if left > self.right || (left == self.right && !self.is_point()) {
            Placement::Right
        } else if left > self.left && right < self.right {
            Placement::Inside
        } else if right <= self.left {
            Placement::Left
        } else {
            Placement::Straddling
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.left, self.right)
    }
}

/// Position of a row relative to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Left,
    Right,
    Inside,
    Enclosing,
    Straddling,
}

/// One gap opened (`magnitude > 0`) or closed (`magnitude < 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub window: Window,
    pub magnitude: i64,
    /// Added to the depth of rows inside the window.
    pub depth_delta: i64,
}

impl Shift {
    #[must_use]
    pub const fn new(window: Window, magnitude: i64) -> Self {
        Self {
            window,
            magnitude,
            depth_delta: 0,
        }
    }

    #[must_use]
    pub const fn with_depth(mut self, depth_delta: i64) -> Self {
        self.depth_delta = depth_delta;
        self
    }

    /// New bounds and depth for a row, or `None` if the row stays put.
    #[must_use]
    pub const fn relocate(&self, left: i64, right: i64, depth: i64) -> Option<Relocation> {
        let m = self.magnitude;
        match self.window.place(left, right) {
            Placement::Enclosing => Some(Relocation {
                left,
                right: right + m,
                depth,
            }),
            Placement::Right => Some(Relocation {
                left: left + m,
                right: right + m,
                depth,
            }),
            Placement::Inside => Some(Relocation {
                left: left + m - 1,
                right: right + m - 1,
                depth: depth + self.depth_delta,
            }),
            Placement::Left | Placement::Straddling => None,
        }
    }

    /// The value `node` has after this shift.
    ///
    /// Operations use this to carry bounds across a shift instead of
    /// re-reading the row.
    #[must_use]
    pub fn apply(&self, node: &Node) -> Node {
        let mut shifted = node.clone();
        if let Some(to) = self.relocate(node.left, node.right, node.depth) {
            shifted.left = to.left;
            shifted.right = to.right;
            shifted.depth = to.depth;
        }
        shifted
    }

    /// Rows that can be relocated by this shift.
    #[must_use]
    pub fn affected(&self) -> Filter {
        Filter::all().right(Cmp::Ge, self.window.left)
    }
}

/// Apply `shift` to every row in the transaction.
///
/// Debug builds first look for a row straddling the window and fail instead
/// of corrupting the tree further.
pub fn shift<T: RowTransaction>(txn: &mut T, shift: &Shift) -> Result<usize, TreeError> {
    let filter = shift.affected();

    if cfg!(debug_assertions) {
        let rows = txn.find(&filter, Order::Unordered)?;
        if let Some(row) = rows
            .iter()
            .find(|n| shift.window.place(n.left, n.right) == Placement::Straddling)
        {
            tracing::error!(
                "Row {} [{}, {}] straddles shift window {}",
                row.id,
                row.left,
                row.right,
                shift.window
            );
            return Err(StructureError::StraddlingWindow {
                node: row.id,
                window: shift.window,
            }
            .into());
        }
    }

    let updated = txn.update(&filter, &|n| shift.relocate(n.left, n.right, n.depth))?;
    tracing::debug!(
        "Shifted {} rows: window {}, magnitude {}, depth delta {}",
        updated,
        shift.window,
        shift.magnitude,
        shift.depth_delta
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NewRow, node};
    use crate::store::{RowReader, RowStore, Table};

    #[test]
    fn test_point_window_placements() {
        let window = Window::point(8);
        assert_eq!(window.place(7, 8), Placement::Enclosing);
        assert_eq!(window.place(0, 9), Placement::Enclosing);
        assert_eq!(window.place(9, 10), Placement::Right);
        assert_eq!(window.place(1, 6), Placement::Left);
        assert_eq!(window.place(2, 3), Placement::Left);
    }

    #[test]
    fn test_span_window_placements() {
        let window = Window::span(0, 5);
        assert_eq!(window.place(0, 7), Placement::Enclosing);
        assert_eq!(window.place(1, 4), Placement::Inside);
        assert_eq!(window.place(2, 3), Placement::Inside);
        assert_eq!(window.place(5, 6), Placement::Right);
        assert_eq!(window.place(9, 10), Placement::Right);
        assert_eq!(Window::span(4, 9).place(1, 4), Placement::Left);
        assert_eq!(window.place(3, 6), Placement::Straddling);
    }

    #[test]
    fn test_relocate_by_placement() {
        let open = Shift::new(Window::span(0, 5), 2).with_depth(1);
        assert_eq!(
            open.relocate(0, 7, 0),
            Some(Relocation {
                left: 0,
                right: 9,
                depth: 0
            })
        );
        assert_eq!(
            open.relocate(1, 4, 1),
            Some(Relocation {
                left: 2,
                right: 5,
                depth: 2
            })
        );
        assert_eq!(
            open.relocate(5, 6, 1),
            Some(Relocation {
                left: 7,
                right: 8,
                depth: 1
            })
        );
        assert_eq!(Shift::new(Window::point(10), 2).relocate(1, 4, 1), None);
    }

    #[test]
    fn test_negative_magnitude_closes_gap() {
        let close = Shift::new(Window::span(1, 6), -6);
        assert_eq!(close.apply(&node(1, 0, 9, 0)), node(1, 0, 3, 0));
        assert_eq!(close.apply(&node(2, 7, 8, 1)), node(2, 1, 2, 1));
    }

    #[test]
    fn test_apply_leaves_unaffected_rows() {
        let open = Shift::new(Window::point(8), 2);
        let row = node(3, 2, 3, 2);
        assert_eq!(open.apply(&row), row);
    }

    #[test]
    fn test_shift_updates_store() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        for (left, right, depth) in [(0, 9, 0), (1, 6, 1), (2, 3, 2), (4, 5, 2), (7, 8, 1)] {
            txn.create(NewRow {
                left,
                right,
                depth,
                payload: Vec::new(),
            })
            .expect("create");
        }

        let updated = shift(&mut txn, &Shift::new(Window::point(8), 2)).expect("shift");
        assert_eq!(updated, 2);

        let rows = txn.find(&Filter::all(), Order::LeftAsc).expect("find");
        let bounds: Vec<_> = rows.iter().map(|n| (n.left, n.right)).collect();
        assert_eq!(bounds, vec![(0, 11), (1, 6), (2, 3), (4, 5), (7, 10)]);
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_shift_rejects_straddling_row() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let bad = txn
            .create(NewRow {
                left: 3,
                right: 6,
                depth: 0,
                payload: Vec::new(),
            })
            .expect("create");

        let err = shift(&mut txn, &Shift::new(Window::span(0, 5), 2)).expect_err("straddle");
        assert!(matches!(
            err,
            TreeError::InvalidStructure(StructureError::StraddlingWindow { node, .. })
                if node == bad.id
        ));
    }
}
