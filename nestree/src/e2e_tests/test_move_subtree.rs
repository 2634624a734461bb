//! Moving a subtree keeps its ids, payloads and shape.

use crate::e2e_tests::helpers::*;
use crate::tree::{StructureError, TreeError};

#[test]
fn test_move_under_later_sibling() {
    let (mut tree, sample) = sample_tree();
    let original_shape = shape(&tree, sample.child);

    let moved = tree
        .move_subtree(sample.child, sample.sibling)
        .expect("move");

    assert_eq!(moved.id, sample.child);
    assert_eq!((moved.left, moved.right, moved.depth), (2, 7, 2));
    assert_eq!(bounds(&tree, sample.sibling), (1, 8, 1));
    assert_eq!(bounds(&tree, sample.root), (0, 9, 0));
    assert_eq!(bounds(&tree, sample.first), (3, 4, 3));
    assert_eq!(bounds(&tree, sample.second), (5, 6, 3));
    assert_eq!(shape(&tree, sample.child), original_shape);
    assert_eq!(tree.len().expect("len"), 5);
    assert_valid(&tree);
}

#[test]
fn test_move_leaf_up_to_root() {
    let (mut tree, sample) = sample_tree();

    let moved = tree.move_subtree(sample.first, sample.root).expect("move");

    assert_eq!((moved.left, moved.right, moved.depth), (7, 8, 1));
    assert_eq!(bounds(&tree, sample.child), (1, 4, 1));
    assert_eq!(bounds(&tree, sample.second), (2, 3, 2));
    assert_eq!(bounds(&tree, sample.sibling), (5, 6, 1));
    assert_eq!(bounds(&tree, sample.root), (0, 9, 0));
    let children: Vec<_> = tree
        .children(sample.root)
        .expect("children")
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(children, vec![sample.child, sample.sibling, sample.first]);
    assert_eq!(tree.get(sample.first).expect("moved").payload, b"first");
    assert_valid(&tree);
}

#[test]
fn test_move_into_own_subtree_rejected() {
    let (mut tree, sample) = sample_tree();
    let before = tree.nodes().expect("nodes");

    for target in [sample.child, sample.first] {
        let err = tree
            .move_subtree(sample.child, target)
            .expect_err("move into own subtree");
        assert!(matches!(
            err,
            TreeError::InvalidStructure(StructureError::TargetInsideSource { .. })
        ));
        assert!(!err.is_retryable());
    }
    assert_eq!(tree.nodes().expect("nodes"), before);
}
