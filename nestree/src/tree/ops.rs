//! Structural mutations.
//!
//! Each operation runs inside one caller-owned transaction and is built
//! from [`shift`] plus row creates, deletes, and bulk edits. A `Node` read
//! before a shift is carried across it with [`Shift::apply`] rather than
//! re-read, so every step works from explicit values.

use crate::node::{NewRow, Node, NodeId};
use crate::store::{Filter, Order, Relocation, RowTransaction};
use crate::tree::error::{StructureError, TreeError};
use crate::tree::shift::{Shift, Window, shift};
use crate::tree::traverse;

/// Fetch a node or fail with `NotFound`.
pub fn fetch<T: RowTransaction>(txn: &T, id: NodeId) -> Result<Node, TreeError> {
    txn.get(id)?.ok_or(TreeError::NotFound(id))
}

/// Return the root, creating `[0, 1]` if the tree is empty.
pub fn create_root<T: RowTransaction>(txn: &mut T, payload: Vec<u8>) -> Result<Node, TreeError> {
    if let Some(root) = traverse::find_root(txn)? {
        tracing::debug!("Root {} already exists", root.id);
        return Ok(root);
    }
    let root = txn.create(NewRow {
        left: 0,
        right: 1,
        depth: 0,
        payload,
    })?;
    tracing::debug!("Created root {}", root.id);
    Ok(root)
}

/// Add a leaf as the last child of `parent`.
pub fn append_child<T: RowTransaction>(
    txn: &mut T,
    parent: NodeId,
    payload: Vec<u8>,
) -> Result<Node, TreeError> {
    let parent = fetch(txn, parent)?;
    let at = parent.right;
    shift(txn, &Shift::new(Window::point(at), 2))?;

    let child = txn.create(NewRow {
        left: at,
        right: at + 1,
        depth: parent.depth + 1,
        payload,
    })?;
    tracing::debug!("Appended {} under {}", child.id, parent.id);
    Ok(child)
}

/// Insert a new node as the parent of a run of adjacent siblings.
///
/// The new node takes the children's place under their old parent; the
/// children and their descendants move one level down.
pub fn insert_parent_over<T: RowTransaction>(
    txn: &mut T,
    children: &[NodeId],
    payload: Vec<u8>,
) -> Result<Node, TreeError> {
    let children = validate_siblings(txn, children)?;
    let (Some(first), Some(last)) = (children.first(), children.last()) else {
        return Err(StructureError::EmptyChildren.into());
    };
    let (left, right, depth) = (first.left, last.right, first.depth);

    shift(
        txn,
        &Shift::new(Window::span(left - 1, right + 1), 2).with_depth(1),
    )?;

    let parent = txn.create(NewRow {
        left,
        right: right + 2,
        depth,
        payload,
    })?;
    tracing::debug!(
        "Inserted {} over {} children at depth {}",
        parent.id,
        children.len(),
        depth
    );
    Ok(parent)
}

/// Check that `ids` name adjacent siblings. Returns them ordered by `left`.
fn validate_siblings<T: RowTransaction>(
    txn: &T,
    ids: &[NodeId],
) -> Result<Vec<Node>, TreeError> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Err(StructureError::EmptyChildren.into());
    }

    let mut children = ids
        .into_iter()
        .map(|id| fetch(txn, id))
        .collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(|n| n.left);

    let depth = children[0].depth;
    if let Some(other) = children.iter().find(|n| n.depth != depth) {
        return Err(StructureError::DepthMismatch {
            node: other.id,
            expected: depth,
            found: other.depth,
        }
        .into());
    }

    let parent = traverse::parent(txn, &children[0])?.map(|n| n.id);
    for child in &children[1..] {
        if traverse::parent(txn, child)?.map(|n| n.id) != parent {
            return Err(StructureError::ParentMismatch(child.id).into());
        }
    }

    for pair in children.windows(2) {
        if pair[1].left != pair[0].right + 1 {
            return Err(StructureError::NonAdjacentChildren {
                before: pair[0].id,
                after: pair[1].id,
            }
            .into());
        }
    }

    Ok(children)
}

/// Delete `node` and its descendants and close the gap they leave.
///
/// Returns the number of rows deleted.
pub fn remove<T: RowTransaction>(txn: &mut T, node: NodeId) -> Result<usize, TreeError> {
    let node = fetch(txn, node)?;
    let deleted = txn.delete(&Filter::within(node.left, node.right))?;
    shift(
        txn,
        &Shift::new(Window::of(&node), -(node.width() + 1)),
    )?;
    tracing::debug!("Removed {} ({} rows)", node.id, deleted);
    Ok(deleted)
}

/// Copy the subtree at `source` as the last child of `target`.
///
/// The copy gets fresh identifiers and cloned payloads. `target` may lie
/// inside `source`; the copy is of the subtree as it was before the call.
/// Returns the root of the copy.
pub fn copy_subtree<T: RowTransaction>(
    txn: &mut T,
    source: NodeId,
    target: NodeId,
) -> Result<Node, TreeError> {
    let source = fetch(txn, source)?;
    let target = fetch(txn, target)?;
    let rows = txn.find(&Filter::within(source.left, source.right), Order::LeftAsc)?;

    let gap = source.width() + 1;
    let open = Shift::new(Window::point(target.right), gap);
    shift(txn, &open)?;

    let target = open.apply(&target);
    let bias = target.right - source.right - 1;
    let depth_bias = target.depth - source.depth + 1;

    let mut copy_root = None;
    for row in rows {
        let copy = txn.create(NewRow {
            left: row.left + bias,
            right: row.right + bias,
            depth: row.depth + depth_bias,
            payload: row.payload,
        })?;
        copy_root.get_or_insert(copy);
    }
    let copy_root = copy_root.ok_or(TreeError::NotFound(source.id))?;

    tracing::debug!(
        "Copied {} under {} as {} ({} rows)",
        source.id,
        target.id,
        copy_root.id,
        copy_root.size()
    );
    Ok(copy_root)
}

/// Move the subtree at `source` to be the last child of `target`.
///
/// Identifiers and payloads are preserved. Returns the moved root with its
/// new bounds.
pub fn move_subtree<T: RowTransaction>(
    txn: &mut T,
    source: NodeId,
    target: NodeId,
) -> Result<Node, TreeError> {
    let source = fetch(txn, source)?;
    let target = fetch(txn, target)?;
    if source.id == target.id || target.is_descendant_of(&source) {
        return Err(StructureError::TargetInsideSource {
            source: source.id,
            target: target.id,
        }
        .into());
    }

    // Open the destination gap first; the source may shift with it.
    let gap = source.width() + 1;
    let open = Shift::new(Window::point(target.right), gap);
    shift(txn, &open)?;
    let source = open.apply(&source);
    let target = open.apply(&target);

    let bias = target.right - source.right - 1;
    let depth_bias = target.depth - source.depth + 1;
    txn.update(&Filter::within(source.left, source.right), &|n| {
        Some(Relocation {
            left: n.left + bias,
            right: n.right + bias,
            depth: n.depth + depth_bias,
        })
    })?;

    // Close the hole the subtree left behind.
    let close = Shift::new(Window::of(&source), -gap);
    shift(txn, &close)?;

    let mut moved = source;
    moved.left += bias;
    moved.right += bias;
    moved.depth += depth_bias;
    let moved = close.apply(&moved);

    tracing::debug!(
        "Moved {} under {} to [{}, {}]",
        moved.id,
        target.id,
        moved.left,
        moved.right
    );
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RowReader, RowStore, Table};

    /// root [0,9], child [1,6] with [2,3] and [4,5], sibling [7,8].
    fn sample<T: RowTransaction>(txn: &mut T) -> [NodeId; 5] {
        let root = create_root(txn, b"root".to_vec()).expect("root");
        let child = append_child(txn, root.id, b"child".to_vec()).expect("child");
        let first = append_child(txn, child.id, b"first".to_vec()).expect("first");
        let second = append_child(txn, child.id, b"second".to_vec()).expect("second");
        let sibling = append_child(txn, root.id, b"sibling".to_vec()).expect("sibling");
        [root.id, child.id, first.id, second.id, sibling.id]
    }

    fn bounds<T: RowTransaction>(txn: &T, id: NodeId) -> (i64, i64, i64) {
        let n = fetch(txn, id).expect("fetch");
        (n.left, n.right, n.depth)
    }

    #[test]
    fn test_sample_tree_bounds() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [root, child, first, second, sibling] = sample(&mut txn);

        assert_eq!(bounds(&txn, root), (0, 9, 0));
        assert_eq!(bounds(&txn, child), (1, 6, 1));
        assert_eq!(bounds(&txn, first), (2, 3, 2));
        assert_eq!(bounds(&txn, second), (4, 5, 2));
        assert_eq!(bounds(&txn, sibling), (7, 8, 1));
    }

    #[test]
    fn test_create_root_is_idempotent() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let a = create_root(&mut txn, b"a".to_vec()).expect("root");
        let b = create_root(&mut txn, b"b".to_vec()).expect("root");
        assert_eq!(a, b);
        assert_eq!(txn.count(&Filter::all()).expect("count"), 1);
    }

    #[test]
    fn test_append_child_to_missing_parent() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let err = append_child(&mut txn, NodeId(99), Vec::new()).expect_err("missing");
        assert!(matches!(err, TreeError::NotFound(NodeId(99))));
    }

    #[test]
    fn test_insert_parent_over_first_children() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [root, child, first, second, sibling] = sample(&mut txn);

        let parent = insert_parent_over(&mut txn, &[second, first], b"p".to_vec()).expect("insert");
        assert_eq!((parent.left, parent.right, parent.depth), (2, 7, 2));
        assert_eq!(bounds(&txn, first), (3, 4, 3));
        assert_eq!(bounds(&txn, second), (5, 6, 3));
        assert_eq!(bounds(&txn, child), (1, 8, 1));
        assert_eq!(bounds(&txn, sibling), (9, 10, 1));
        assert_eq!(bounds(&txn, root), (0, 11, 0));
    }

    #[test]
    fn test_insert_parent_over_root() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [root, child, ..] = sample(&mut txn);

        let top = insert_parent_over(&mut txn, &[root], Vec::new()).expect("insert");
        assert_eq!((top.left, top.right, top.depth), (0, 11, 0));
        assert_eq!(bounds(&txn, root), (1, 10, 1));
        assert_eq!(bounds(&txn, child), (2, 7, 2));
    }

    #[test]
    fn test_insert_parent_rejects_invalid_children() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [root, child, first, _, sibling] = sample(&mut txn);

        let err = insert_parent_over(&mut txn, &[], Vec::new()).expect_err("empty");
        assert!(matches!(
            err,
            TreeError::InvalidStructure(StructureError::EmptyChildren)
        ));

        let err = insert_parent_over(&mut txn, &[child, first], Vec::new()).expect_err("depth");
        assert!(matches!(
            err,
            TreeError::InvalidStructure(StructureError::DepthMismatch { .. })
        ));

        let err = insert_parent_over(&mut txn, &[first, sibling], Vec::new()).expect_err("depth");
        assert!(matches!(
            err,
            TreeError::InvalidStructure(StructureError::DepthMismatch { .. })
        ));

        // Cousins at the same depth.
        let cousin = append_child(&mut txn, sibling, Vec::new()).expect("cousin");
        let err = insert_parent_over(&mut txn, &[first, cousin.id], Vec::new()).expect_err("parent");
        assert!(matches!(
            err,
            TreeError::InvalidStructure(StructureError::ParentMismatch(_))
        ));

        let last = append_child(&mut txn, root, Vec::new()).expect("last");
        let err = insert_parent_over(&mut txn, &[child, last.id], Vec::new()).expect_err("gap");
        assert!(matches!(
            err,
            TreeError::InvalidStructure(StructureError::NonAdjacentChildren { .. })
        ));
    }

    #[test]
    fn test_remove_leaf() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [root, child, first, second, sibling] = sample(&mut txn);

        assert_eq!(remove(&mut txn, first).expect("remove"), 1);
        assert_eq!(bounds(&txn, child), (1, 4, 1));
        assert_eq!(bounds(&txn, second), (2, 3, 2));
        assert_eq!(bounds(&txn, sibling), (5, 6, 1));
        assert_eq!(bounds(&txn, root), (0, 7, 0));
    }

    #[test]
    fn test_remove_root_empties_tree() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [root, ..] = sample(&mut txn);

        assert_eq!(remove(&mut txn, root).expect("remove"), 5);
        assert_eq!(txn.count(&Filter::all()).expect("count"), 0);
    }

    #[test]
    fn test_copy_subtree_to_sibling() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [root, child, first, _, sibling] = sample(&mut txn);

        let copy = copy_subtree(&mut txn, child, sibling).expect("copy");
        assert_eq!((copy.left, copy.right, copy.depth), (8, 13, 2));
        assert_eq!(copy.payload, b"child".to_vec());
        assert_ne!(copy.id, child);
        assert_eq!(bounds(&txn, sibling), (7, 14, 1));
        assert_eq!(bounds(&txn, root), (0, 15, 0));
        assert_eq!(bounds(&txn, first), (2, 3, 2));

        let copied = txn
            .find(&Filter::within(copy.left, copy.right), Order::LeftAsc)
            .expect("find");
        let shape: Vec<_> = copied.iter().map(|n| (n.left, n.right, n.depth)).collect();
        assert_eq!(shape, vec![(8, 13, 2), (9, 10, 3), (11, 12, 3)]);
    }

    #[test]
    fn test_copy_subtree_into_own_descendant() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [_, child, first, ..] = sample(&mut txn);

        let copy = copy_subtree(&mut txn, child, first).expect("copy");
        assert_eq!((copy.left, copy.right, copy.depth), (3, 8, 3));
        assert_eq!(bounds(&txn, first), (2, 9, 2));
        assert_eq!(bounds(&txn, child), (1, 12, 1));
        assert_eq!(txn.count(&Filter::all()).expect("count"), 8);
    }

    #[test]
    fn test_move_subtree_under_later_sibling() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [root, child, first, second, sibling] = sample(&mut txn);

        let moved = move_subtree(&mut txn, child, sibling).expect("move");
        assert_eq!(moved.id, child);
        assert_eq!((moved.left, moved.right, moved.depth), (2, 7, 2));
        assert_eq!(bounds(&txn, child), (2, 7, 2));
        assert_eq!(bounds(&txn, root), (0, 9, 0));
        assert_eq!(bounds(&txn, sibling), (1, 8, 1));
        assert_eq!(bounds(&txn, first), (3, 4, 3));
        assert_eq!(bounds(&txn, second), (5, 6, 3));
    }

    #[test]
    fn test_move_subtree_under_earlier_sibling() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [root, child, _, second, sibling] = sample(&mut txn);

        let moved = move_subtree(&mut txn, sibling, child).expect("move");
        assert_eq!((moved.left, moved.right, moved.depth), (6, 7, 2));
        assert_eq!(bounds(&txn, child), (1, 8, 1));
        assert_eq!(bounds(&txn, second), (4, 5, 2));
        assert_eq!(bounds(&txn, root), (0, 9, 0));
    }

    #[test]
    fn test_move_subtree_up_to_ancestor() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [root, child, first, second, sibling] = sample(&mut txn);

        let moved = move_subtree(&mut txn, first, root).expect("move");
        assert_eq!((moved.left, moved.right, moved.depth), (7, 8, 1));
        assert_eq!(bounds(&txn, first), (7, 8, 1));
        assert_eq!(bounds(&txn, child), (1, 4, 1));
        assert_eq!(bounds(&txn, second), (2, 3, 2));
        assert_eq!(bounds(&txn, sibling), (5, 6, 1));
        assert_eq!(bounds(&txn, root), (0, 9, 0));
    }

    #[test]
    fn test_move_subtree_rejects_own_descendant() {
        let mut table = Table::new();
        let mut txn = table.begin().expect("begin");
        let [_, child, first, ..] = sample(&mut txn);

        for target in [child, first] {
            let err = move_subtree(&mut txn, child, target).expect_err("inside");
            assert!(matches!(
                err,
                TreeError::InvalidStructure(StructureError::TargetInsideSource { .. })
            ));
        }
        assert_eq!(bounds(&txn, child), (1, 6, 1));
    }
}
