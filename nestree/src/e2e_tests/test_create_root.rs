//! `create_root` returns the existing root instead of adding a second one.

use crate::e2e_tests::helpers::*;

#[test]
fn test_create_root_on_empty_tree() {
    let mut tree = new_tree();

    let root = tree.create_root(b"root".to_vec()).expect("root");

    assert_eq!((root.left, root.right, root.depth), (0, 1, 0));
    assert!(root.is_root());
    assert!(root.is_leaf());
    assert_eq!(tree.len().expect("len"), 1);
}

#[test]
fn test_create_root_is_idempotent() {
    let (mut tree, sample) = sample_tree();
    let before = tree.nodes().expect("nodes");

    let root = tree.create_root(b"ignored".to_vec()).expect("root");

    assert_eq!(root.id, sample.root);
    assert_eq!(root.payload, b"root");
    assert_eq!(tree.nodes().expect("nodes"), before);
    assert_valid(&tree);
}
