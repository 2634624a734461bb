//! Removing a subtree closes its gap.

use crate::e2e_tests::helpers::*;
use crate::tree::TreeError;

#[test]
fn test_remove_inner_subtree() {
    let (mut tree, sample) = sample_tree();

    let removed = tree.remove(sample.child).expect("remove");

    assert_eq!(removed, 3);
    assert_eq!(bounds(&tree, sample.root), (0, 3, 0));
    assert_eq!(bounds(&tree, sample.sibling), (1, 2, 1));
    for gone in [sample.child, sample.first, sample.second] {
        assert!(matches!(tree.get(gone), Err(TreeError::NotFound(id)) if id == gone));
    }
    assert_valid(&tree);
}

#[test]
fn test_remove_root_empties_tree() {
    let (mut tree, sample) = sample_tree();

    assert_eq!(tree.remove(sample.root).expect("remove"), 5);
    assert!(tree.is_empty().expect("is_empty"));
    assert!(tree.root().expect("root").is_none());

    let root = tree.create_root(b"again".to_vec()).expect("new root");
    assert_eq!((root.left, root.right, root.depth), (0, 1, 0));
    assert_valid(&tree);
}

#[test]
fn test_remove_missing_node() {
    let (mut tree, sample) = sample_tree();
    tree.remove(sample.first).expect("remove");

    assert!(matches!(
        tree.remove(sample.first),
        Err(TreeError::NotFound(id)) if id == sample.first
    ));
    assert_eq!(tree.len().expect("len"), 4);
    assert_valid(&tree);
}
