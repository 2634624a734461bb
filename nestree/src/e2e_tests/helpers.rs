//! Common helpers for end-to-end tests.

use std::path::PathBuf;

use tempfile::TempDir;

use crate::invariants;
use crate::node::NodeId;
use crate::store::{Database, RowStore, Table};
use crate::tree::NestedSet;

/// Ids of the sample tree built by [`sample_tree`].
///
/// ```text
/// root [0, 9]
/// ├── child [1, 6]
/// │   ├── first [2, 3]
/// │   └── second [4, 5]
/// └── sibling [7, 8]
/// ```
pub struct Sample {
    pub root: NodeId,
    pub child: NodeId,
    pub first: NodeId,
    pub second: NodeId,
    pub sibling: NodeId,
}

/// A fresh in-memory tree.
#[must_use]
pub fn new_tree() -> NestedSet<Table> {
    NestedSet::new(Table::new())
}

/// Build the sample tree into an empty `tree`.
pub fn build_sample<S: RowStore>(tree: &mut NestedSet<S>) -> Sample {
    let root = tree.create_root(b"root".to_vec()).expect("root").id;
    let child = tree.append_child(root, b"child".to_vec()).expect("child").id;
    let first = tree.append_child(child, b"first".to_vec()).expect("first").id;
    let second = tree
        .append_child(child, b"second".to_vec())
        .expect("second")
        .id;
    let sibling = tree
        .append_child(root, b"sibling".to_vec())
        .expect("sibling")
        .id;
    Sample {
        root,
        child,
        first,
        second,
        sibling,
    }
}

/// An in-memory tree holding the sample.
#[must_use]
pub fn sample_tree() -> (NestedSet<Table>, Sample) {
    let mut tree = new_tree();
    let sample = build_sample(&mut tree);
    (tree, sample)
}

/// `(left, right, depth)` of a node.
pub fn bounds<S: RowStore>(tree: &NestedSet<S>, id: NodeId) -> (i64, i64, i64) {
    let node = tree.get(id).expect("node exists");
    (node.left, node.right, node.depth)
}

/// Assert every structural invariant holds for the committed rows.
pub fn assert_valid<S: RowStore>(tree: &NestedSet<S>) {
    let rows = tree.nodes().expect("read rows");
    let violations = invariants::check(&rows);
    assert!(
        violations.is_empty(),
        "invariant violations:\n{}",
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// `(payload, depth)` of each node in preorder under `id`.
pub fn shape<S: RowStore>(tree: &NestedSet<S>, id: NodeId) -> Vec<(Vec<u8>, i64)> {
    let base = tree.get(id).expect("node exists").depth;
    tree.preorder(id)
        .expect("preorder")
        .into_iter()
        .map(|node| (node.payload, node.depth - base))
        .collect()
}

/// A temporary directory holding one database log.
pub struct TestDatabase {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TestDatabase {
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("tree.wal");
        Self { _dir: dir, path }
    }

    /// Open (or create) the tree stored at `path`.
    pub fn open(&self) -> NestedSet<Database> {
        let (database, _) = Database::open_or_create(&self.path).expect("open database");
        NestedSet::new(database)
    }
}
