//! In-memory row table.
//!
//! A transaction works on a private copy of the rows. Commit validates the
//! schema constraints on the copy and then swaps it in, so a failed commit
//! or an abort leaves the table exactly as it was.

use std::collections::{BTreeMap, HashSet};

use crate::node::{NewRow, Node, NodeId};
use crate::store::{
    Field, Filter, Order, Relocation, RowReader, RowStore, RowTransaction, StoreError,
};

/// One row-level difference between a transaction and the table it started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange {
    /// A row that did not exist before.
    Insert(Node),
    /// A row whose bounds, depth, or payload changed.
    Update(Node),
    /// A row that no longer exists.
    Delete(NodeId),
}

/// Committed rows, keyed by identifier.
#[derive(Debug, Clone)]
pub struct Table {
    rows: BTreeMap<NodeId, Node>,
    next_id: u64,
}

impl Table {
    /// Create an empty table. Identifiers start at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Build a table from rows that already carry identifiers.
    ///
    /// `next_id` is raised above every identifier present.
    pub(crate) fn from_parts(rows: BTreeMap<NodeId, Node>, next_id: u64) -> Self {
        let floor = rows.keys().next_back().map_or(1, |id| id.0 + 1);
        Self {
            rows,
            next_id: next_id.max(floor),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Identifier the next created row will receive.
    #[must_use]
    pub const fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Iterate over every row in identifier order.
    pub fn rows(&self) -> impl Iterator<Item = &Node> {
        self.rows.values()
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl RowReader for Table {
    fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        Ok(self.rows.get(&id).cloned())
    }

    fn find(&self, filter: &Filter, order: Order) -> Result<Vec<Node>, StoreError> {
        Ok(select(&self.rows, filter, order))
    }
}

impl RowStore for Table {
    type Transaction<'a> = TableTransaction<'a>;

    fn begin(&mut self) -> Result<TableTransaction<'_>, StoreError> {
        Ok(TableTransaction::new(self))
    }
}

/// A transaction against a [`Table`].
#[derive(Debug)]
pub struct TableTransaction<'a> {
    table: &'a mut Table,
    rows: BTreeMap<NodeId, Node>,
    next_id: u64,
}

impl<'a> TableTransaction<'a> {
    pub(crate) fn new(table: &'a mut Table) -> Self {
        let rows = table.rows.clone();
        let next_id = table.next_id;
        Self {
            table,
            rows,
            next_id,
        }
    }

    /// Check the schema constraints on the working copy.
    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        check_constraints(self.rows.values())
    }

    /// Differences between the working copy and the committed table.
    pub(crate) fn changes(&self) -> Vec<RowChange> {
        let mut changes = Vec::new();
        for (id, row) in &self.rows {
            match self.table.rows.get(id) {
                None => changes.push(RowChange::Insert(row.clone())),
                Some(old) if old != row => changes.push(RowChange::Update(row.clone())),
                Some(_) => {}
            }
        }
        for id in self.table.rows.keys() {
            if !self.rows.contains_key(id) {
                changes.push(RowChange::Delete(*id));
            }
        }
        changes
    }

    /// Replace the committed rows with the working copy.
    ///
    /// Callers validate first.
    pub(crate) fn publish(self) {
        self.table.rows = self.rows;
        self.table.next_id = self.next_id;
    }
}

impl RowReader for TableTransaction<'_> {
    fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        Ok(self.rows.get(&id).cloned())
    }

    fn find(&self, filter: &Filter, order: Order) -> Result<Vec<Node>, StoreError> {
        Ok(select(&self.rows, filter, order))
    }
}

impl RowTransaction for TableTransaction<'_> {
    fn create(&mut self, row: NewRow) -> Result<Node, StoreError> {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let node = row.into_node(id);
        self.rows.insert(id, node.clone());
        Ok(node)
    }

    fn delete(&mut self, filter: &Filter) -> Result<usize, StoreError> {
        let before = self.rows.len();
        self.rows.retain(|_, row| !filter.matches(row));
        Ok(before - self.rows.len())
    }

    fn update(
        &mut self,
        filter: &Filter,
        relocate: &dyn Fn(&Node) -> Option<Relocation>,
    ) -> Result<usize, StoreError> {
        let mut updated = 0;
        for row in self.rows.values_mut() {
            if !filter.matches(row) {
                continue;
            }
            if let Some(to) = relocate(row) {
                row.left = to.left;
                row.right = to.right;
                row.depth = to.depth;
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn commit(self) -> Result<(), StoreError> {
        self.validate()?;
        self.publish();
        Ok(())
    }

    fn abort(self) {}
}

fn select(rows: &BTreeMap<NodeId, Node>, filter: &Filter, order: Order) -> Vec<Node> {
    let mut selected: Vec<Node> = rows
        .values()
        .filter(|row| filter.matches(row))
        .cloned()
        .collect();
    order.sort(&mut selected);
    selected
}

/// Enforce `left < right` and uniqueness of `left` and `right`.
pub(crate) fn check_constraints<'r>(
    rows: impl Iterator<Item = &'r Node>,
) -> Result<(), StoreError> {
    let mut lefts = HashSet::new();
    let mut rights = HashSet::new();
    for row in rows {
        if row.left >= row.right {
            return Err(StoreError::InvalidBounds {
                id: row.id,
                left: row.left,
                right: row.right,
            });
        }
        if !lefts.insert(row.left) {
            return Err(StoreError::UniqueViolation {
                field: Field::Left,
                value: row.left,
            });
        }
        if !rights.insert(row.right) {
            return Err(StoreError::UniqueViolation {
                field: Field::Right,
                value: row.right,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Cmp;

    fn row(left: i64, right: i64, depth: i64) -> NewRow {
        NewRow {
            left,
            right,
            depth,
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_commit_publishes_rows() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let root = txn.create(row(0, 1, 0)).expect("create");
        txn.commit().expect("commit");

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(root.id).expect("get"), Some(root));
        assert_eq!(table.next_id(), 2);
    }

    #[test]
    fn test_abort_discards_rows() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        txn.create(row(0, 1, 0)).expect("create");
        txn.abort();

        assert!(table.is_empty());
        assert_eq!(table.next_id(), 1);
    }

    #[test]
    fn test_transaction_reads_own_writes() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let created = txn.create(row(0, 1, 0)).expect("create");
        assert_eq!(txn.get(created.id).expect("get"), Some(created));
        txn.abort();
    }

    #[test]
    fn test_unique_left_enforced_at_commit() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        txn.create(row(0, 3, 0)).expect("create");
        txn.create(row(0, 5, 0)).expect("create");

        let err = txn.commit().expect_err("duplicate left must fail");
        assert!(matches!(
            err,
            StoreError::UniqueViolation {
                field: Field::Left,
                value: 0
            }
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_transient_duplicates_allowed_before_commit() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        txn.create(row(0, 3, 0)).expect("create");
        let second = txn.create(row(1, 3, 1)).expect("create");
        txn.update(&Filter::all().left(Cmp::Eq, 1), &|n| {
            Some(Relocation {
                left: n.left,
                right: 2,
                depth: n.depth,
            })
        })
        .expect("update");
        txn.commit().expect("commit");

        assert_eq!(table.get(second.id).expect("get").map(|n| n.right), Some(2));
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        txn.create(row(4, 4, 0)).expect("create");
        let err = txn.commit().expect_err("left == right must fail");
        assert!(matches!(err, StoreError::InvalidBounds { .. }));
    }

    #[test]
    fn test_delete_by_filter() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        txn.create(row(0, 5, 0)).expect("create");
        txn.create(row(1, 2, 1)).expect("create");
        txn.create(row(3, 4, 1)).expect("create");
        let deleted = txn.delete(&Filter::within(1, 4)).expect("delete");
        assert_eq!(deleted, 2);
        assert_eq!(txn.count(&Filter::all()).expect("count"), 1);
    }

    #[test]
    fn test_update_counts_only_relocated_rows() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        txn.create(row(0, 5, 0)).expect("create");
        txn.create(row(1, 2, 1)).expect("create");
        txn.create(row(3, 4, 1)).expect("create");

        let updated = txn
            .update(&Filter::all(), &|n| {
                (n.depth == 1).then_some(Relocation {
                    left: n.left,
                    right: n.right,
                    depth: 2,
                })
            })
            .expect("update");
        assert_eq!(updated, 2);
    }

    #[test]
    fn test_changes_diff() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let root = txn.create(row(0, 3, 0)).expect("create");
        let child = txn.create(row(1, 2, 1)).expect("create");
        txn.commit().expect("commit");

        let mut txn = table.begin().expect("begin");
        txn.delete(&Filter::all().left(Cmp::Eq, 1)).expect("delete");
        txn.update(&Filter::all(), &|n| {
            Some(Relocation {
                left: n.left,
                right: 1,
                depth: n.depth,
            })
        })
        .expect("update");
        let leaf = txn.create(row(5, 6, 0)).expect("create");

        let changes = txn.changes();
        assert!(changes.contains(&RowChange::Delete(child.id)));
        assert!(changes.contains(&RowChange::Insert(leaf)));
        assert!(changes.iter().any(
            |c| matches!(c, RowChange::Update(n) if n.id == root.id && n.right == 1)
        ));
        txn.abort();
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let first = txn.create(row(0, 1, 0)).expect("create");
        txn.commit().expect("commit");

        let mut txn = table.begin().expect("begin");
        txn.delete(&Filter::all()).expect("delete");
        let second = txn.create(row(0, 1, 0)).expect("create");
        txn.commit().expect("commit");

        assert_ne!(first.id, second.id);
    }
}
