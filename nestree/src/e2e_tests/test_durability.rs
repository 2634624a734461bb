//! Trees stored in a `Database` survive reopening and checkpoints.

use crate::e2e_tests::helpers::*;
use crate::tree::TreeError;

#[test]
fn test_tree_survives_reopen() {
    let db = TestDatabase::new();

    let (before, sample) = {
        let mut tree = db.open();
        let sample = build_sample(&mut tree);
        tree.move_subtree(sample.first, sample.sibling).expect("move");
        (tree.nodes().expect("nodes"), sample)
    };

    let tree = db.open();
    assert_eq!(tree.nodes().expect("nodes"), before);
    assert_eq!(bounds(&tree, sample.first), (6, 7, 2));
    assert_valid(&tree);
}

#[test]
fn test_ids_keep_increasing_after_reopen() {
    let db = TestDatabase::new();
    let sample = build_sample(&mut db.open());

    let mut tree = db.open();
    let leaf = tree.append_child(sample.root, Vec::new()).expect("append");
    assert!(leaf.id > sample.sibling);
    assert_valid(&tree);
}

#[test]
fn test_rejected_operation_is_not_persisted() {
    let db = TestDatabase::new();

    let before = {
        let mut tree = db.open();
        let sample = build_sample(&mut tree);
        let log_len = tree.store().log_len();
        assert!(matches!(
            tree.move_subtree(sample.root, sample.first),
            Err(TreeError::InvalidStructure(_))
        ));
        assert_eq!(tree.store().log_len(), log_len);
        tree.nodes().expect("nodes")
    };

    assert_eq!(db.open().nodes().expect("nodes"), before);
}

#[test]
fn test_checkpoint_then_reopen() {
    let db = TestDatabase::new();

    let before = {
        let mut tree = db.open();
        let sample = build_sample(&mut tree);
        for _ in 0..10 {
            let copy = tree.copy_subtree(sample.child, sample.sibling).expect("copy");
            tree.remove(copy.id).expect("remove");
        }
        let log_len = tree.store().log_len();
        tree.store_mut().checkpoint().expect("checkpoint");
        assert!(tree.store().log_len() < log_len);
        tree.nodes().expect("nodes")
    };

    let mut tree = db.open();
    assert_eq!(tree.nodes().expect("nodes"), before);
    let root = tree.root().expect("root").expect("non-empty");
    tree.append_child(root.id, Vec::new()).expect("append after checkpoint");
    assert_valid(&tree);

    let after = tree.nodes().expect("nodes");
    drop(tree);
    assert_eq!(db.open().nodes().expect("nodes"), after);
}
