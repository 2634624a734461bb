//! Inserting a parent over a run of siblings.

use crate::e2e_tests::helpers::*;
use crate::tree::{StructureError, TreeError};

#[test]
fn test_insert_parent_over_single_child() {
    let mut tree = new_tree();
    let root = tree.create_root(b"root".to_vec()).expect("root").id;
    let child = tree.append_child(root, b"child".to_vec()).expect("child").id;
    let grandchild = tree.append_child(child, b"gc".to_vec()).expect("gc").id;
    let sibling = tree.append_child(root, b"sibling".to_vec()).expect("sibling").id;
    assert_eq!(bounds(&tree, child), (1, 4, 1));
    assert_eq!(bounds(&tree, root), (0, 7, 0));

    let parent = tree
        .insert_parent_over(&[child], b"parent".to_vec())
        .expect("insert parent");

    assert_eq!((parent.left, parent.right, parent.depth), (1, 6, 1));
    assert_eq!(bounds(&tree, child), (2, 5, 2));
    assert_eq!(bounds(&tree, grandchild), (3, 4, 3));
    assert_eq!(bounds(&tree, sibling), (7, 8, 1));
    assert_eq!(bounds(&tree, root), (0, 9, 0));
    assert_eq!(tree.parent(child).expect("parent").map(|n| n.id), Some(parent.id));
    assert_valid(&tree);
}

#[test]
fn test_insert_parent_over_sibling_run() {
    let (mut tree, sample) = sample_tree();

    let parent = tree
        .insert_parent_over(&[sample.sibling, sample.child], Vec::new())
        .expect("insert parent");

    assert_eq!((parent.left, parent.right, parent.depth), (1, 10, 1));
    assert_eq!(bounds(&tree, sample.root), (0, 11, 0));
    let children: Vec<_> = tree
        .children(parent.id)
        .expect("children")
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(children, vec![sample.child, sample.sibling]);
    assert_eq!(tree.children(sample.root).expect("children").len(), 1);
    assert_valid(&tree);
}

#[test]
fn test_insert_parent_over_root() {
    let (mut tree, sample) = sample_tree();

    let top = tree
        .insert_parent_over(&[sample.root], b"top".to_vec())
        .expect("insert parent");

    assert_eq!((top.left, top.right, top.depth), (0, 11, 0));
    assert_eq!(tree.root().expect("root").map(|n| n.id), Some(top.id));
    assert_eq!(bounds(&tree, sample.root), (1, 10, 1));
    assert_eq!(tree.depth(sample.first).expect("depth"), 3);
    assert_valid(&tree);
}

#[test]
fn test_insert_parent_rejects_bad_children() {
    let (mut tree, sample) = sample_tree();
    let before = tree.nodes().expect("nodes");

    assert!(matches!(
        tree.insert_parent_over(&[], Vec::new()),
        Err(TreeError::InvalidStructure(StructureError::EmptyChildren))
    ));
    assert!(matches!(
        tree.insert_parent_over(&[sample.child, sample.first], Vec::new()),
        Err(TreeError::InvalidStructure(StructureError::DepthMismatch { .. }))
    ));
    assert!(matches!(
        tree.insert_parent_over(&[sample.first, sample.sibling], Vec::new()),
        Err(TreeError::InvalidStructure(StructureError::DepthMismatch { .. }))
    ));

    let third = tree.append_child(sample.child, Vec::new()).expect("third").id;
    let before_gap = tree.nodes().expect("nodes");
    assert!(matches!(
        tree.insert_parent_over(&[sample.first, third], Vec::new()),
        Err(TreeError::InvalidStructure(StructureError::NonAdjacentChildren { .. }))
    ));
    assert_eq!(tree.nodes().expect("nodes"), before_gap);

    tree.remove(third).expect("remove");
    assert_eq!(tree.nodes().expect("nodes"), before);
    assert_valid(&tree);
}
