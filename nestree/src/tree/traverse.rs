//! Containment queries.
//!
//! Every query is one predicate scan over the row store. Callers pass a
//! freshly read `Node`; the queries never mutate.

use crate::node::Node;
use crate::store::{Cmp, Filter, Order, RowReader, StoreError};

/// The node with `left == 0`, if the tree is not empty.
pub fn find_root<R: RowReader + ?Sized>(rows: &R) -> Result<Option<Node>, StoreError> {
    Ok(rows
        .find(&Filter::all().left(Cmp::Eq, 0), Order::Unordered)?
        .into_iter()
        .next())
}

/// The ancestor chain of `node`, root first, ending with `node` itself.
pub fn path<R: RowReader + ?Sized>(rows: &R, node: &Node) -> Result<Vec<Node>, StoreError> {
    rows.find(&Filter::containing(node.left, node.right), Order::LeftAsc)
}

/// Ancestors of `node`, root first.
pub fn ancestors<R: RowReader + ?Sized>(rows: &R, node: &Node) -> Result<Vec<Node>, StoreError> {
    rows.find(
        &Filter::all()
            .left(Cmp::Lt, node.left)
            .right(Cmp::Gt, node.right),
        Order::LeftAsc,
    )
}

/// Depth computed from containment. Always equals the cached `node.depth`
/// in a consistent tree.
pub fn depth<R: RowReader + ?Sized>(rows: &R, node: &Node) -> Result<i64, StoreError> {
    let count = rows.count(&Filter::containing(node.left, node.right))?;
    Ok(i64::try_from(count).unwrap_or(i64::MAX) - 1)
}

/// `node` and all its descendants, in no particular order.
pub fn subtree<R: RowReader + ?Sized>(rows: &R, node: &Node) -> Result<Vec<Node>, StoreError> {
    rows.find(&Filter::within(node.left, node.right), Order::Unordered)
}

/// Descendants of `node` in pre-order, excluding `node`.
pub fn descendants<R: RowReader + ?Sized>(rows: &R, node: &Node) -> Result<Vec<Node>, StoreError> {
    rows.find(
        &Filter::all()
            .left(Cmp::Gt, node.left)
            .right(Cmp::Lt, node.right),
        Order::LeftAsc,
    )
}

/// The immediate parent of `node`; `None` for the root.
pub fn parent<R: RowReader + ?Sized>(rows: &R, node: &Node) -> Result<Option<Node>, StoreError> {
    Ok(rows
        .find(
            &Filter::all()
                .left(Cmp::Lt, node.left)
                .right(Cmp::Gt, node.right)
                .depth(Cmp::Eq, node.depth - 1),
            Order::Unordered,
        )?
        .into_iter()
        .next())
}

/// Immediate children of `node`, in sibling order.
pub fn children<R: RowReader + ?Sized>(rows: &R, node: &Node) -> Result<Vec<Node>, StoreError> {
    rows.find(
        &Filter::all()
            .left(Cmp::Gt, node.left)
            .right(Cmp::Lt, node.right)
            .depth(Cmp::Eq, node.depth + 1),
        Order::LeftAsc,
    )
}

/// Other children of `node`'s parent, in sibling order. Empty for the root.
pub fn siblings<R: RowReader + ?Sized>(rows: &R, node: &Node) -> Result<Vec<Node>, StoreError> {
    let Some(parent) = parent(rows, node)? else {
        return Ok(Vec::new());
    };
    let mut siblings = children(rows, &parent)?;
    siblings.retain(|n| n.id != node.id);
    Ok(siblings)
}

/// Depth-first order: the subtree sorted by `left`.
pub fn preorder<R: RowReader + ?Sized>(rows: &R, node: &Node) -> Result<Vec<Node>, StoreError> {
    rows.find(&Filter::within(node.left, node.right), Order::LeftAsc)
}

/// Breadth-first order: the subtree sorted by depth, then `left`.
pub fn level_order<R: RowReader + ?Sized>(rows: &R, node: &Node) -> Result<Vec<Node>, StoreError> {
    rows.find(&Filter::within(node.left, node.right), Order::DepthThenLeft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NewRow, NodeId};
    use crate::store::{RowStore, RowTransaction, Table};

    fn sample() -> Table {
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
        txn.commit().expect("commit");
        table
    }

    fn ids(nodes: &[Node]) -> Vec<u64> {
        nodes.iter().map(|n| n.id.0).collect()
    }

    fn get(table: &Table, id: u64) -> Node {
        table.get(NodeId(id)).expect("get").expect("exists")
    }

    #[test]
    fn test_find_root() {
        let table = sample();
        assert_eq!(find_root(&table).expect("root").map(|n| n.id), Some(NodeId(1)));
        assert_eq!(find_root(&Table::new()).expect("root"), None);
    }

    #[test]
    fn test_path_and_depth() {
        let table = sample();
        let leaf = get(&table, 4);
        assert_eq!(ids(&path(&table, &leaf).expect("path")), vec![1, 2, 4]);
        assert_eq!(ids(&ancestors(&table, &leaf).expect("ancestors")), vec![1, 2]);
        assert_eq!(depth(&table, &leaf).expect("depth"), leaf.depth);
        assert_eq!(depth(&table, &get(&table, 1)).expect("depth"), 0);
    }

    #[test]
    fn test_parent_and_children() {
        let table = sample();
        let root = get(&table, 1);
        let child = get(&table, 2);

        assert_eq!(parent(&table, &root).expect("parent"), None);
        assert_eq!(parent(&table, &get(&table, 3)).expect("parent"), Some(child.clone()));
        assert_eq!(ids(&children(&table, &root).expect("children")), vec![2, 5]);
        assert_eq!(ids(&children(&table, &child).expect("children")), vec![3, 4]);
        assert!(children(&table, &get(&table, 5)).expect("children").is_empty());
    }

    #[test]
    fn test_siblings() {
        let table = sample();
        assert_eq!(ids(&siblings(&table, &get(&table, 3)).expect("siblings")), vec![4]);
        assert_eq!(ids(&siblings(&table, &get(&table, 5)).expect("siblings")), vec![2]);
        assert!(siblings(&table, &get(&table, 1)).expect("siblings").is_empty());
    }

    #[test]
    fn test_subtree_and_descendants() {
        let table = sample();
        let child = get(&table, 2);
        let mut all = ids(&subtree(&table, &child).expect("subtree"));
        all.sort_unstable();
        assert_eq!(all, vec![2, 3, 4]);
        assert_eq!(ids(&descendants(&table, &child).expect("descendants")), vec![3, 4]);
    }

    #[test]
    fn test_orderings() {
        let table = sample();
        let root = get(&table, 1);
        assert_eq!(ids(&preorder(&table, &root).expect("preorder")), vec![1, 2, 3, 4, 5]);
        assert_eq!(ids(&level_order(&table, &root).expect("level")), vec![1, 2, 5, 3, 4]);
    }
}
