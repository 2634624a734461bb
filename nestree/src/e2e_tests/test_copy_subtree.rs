//! Copying a subtree produces an isomorphic subtree with fresh ids.

use std::collections::HashSet;

use crate::e2e_tests::helpers::*;
use crate::node::NodeId;

#[test]
fn test_copy_under_sibling() {
    let (mut tree, sample) = sample_tree();
    let original_shape = shape(&tree, sample.child);

    let copy = tree
        .copy_subtree(sample.child, sample.sibling)
        .expect("copy");

    assert_eq!((copy.left, copy.right, copy.depth), (8, 13, 2));
    assert_eq!(bounds(&tree, sample.sibling), (7, 14, 1));
    assert_eq!(bounds(&tree, sample.root), (0, 15, 0));
    assert_eq!(bounds(&tree, sample.child), (1, 6, 1));
    assert_eq!(shape(&tree, copy.id), original_shape);
    assert_eq!(tree.len().expect("len"), 8);
    assert_valid(&tree);
}

#[test]
fn test_copy_has_disjoint_ids() {
    let (mut tree, sample) = sample_tree();

    let copy = tree.copy_subtree(sample.child, sample.root).expect("copy");

    let ids = |id: NodeId| -> HashSet<NodeId> {
        tree.subtree(id)
            .expect("subtree")
            .into_iter()
            .map(|n| n.id)
            .collect()
    };
    let original = ids(sample.child);
    let copied = ids(copy.id);
    assert_eq!(original.len(), 3);
    assert_eq!(copied.len(), 3);
    assert!(original.is_disjoint(&copied));
    assert_eq!(
        tree.children(sample.root)
            .expect("children")
            .last()
            .map(|n| n.id),
        Some(copy.id)
    );
    assert_valid(&tree);
}

#[test]
fn test_copy_into_own_descendant() {
    let (mut tree, sample) = sample_tree();
    let original_shape = shape(&tree, sample.child);

    let copy = tree.copy_subtree(sample.child, sample.first).expect("copy");

    assert_eq!((copy.left, copy.right, copy.depth), (3, 8, 3));
    assert_eq!(bounds(&tree, sample.first), (2, 9, 2));
    assert_eq!(bounds(&tree, sample.second), (10, 11, 2));
    assert_eq!(bounds(&tree, sample.child), (1, 12, 1));
    assert_eq!(shape(&tree, copy.id), original_shape);
    assert_valid(&tree);
}
