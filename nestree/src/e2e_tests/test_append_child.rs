//! Appending leaves shifts everything to the right of the insertion point.

use crate::e2e_tests::helpers::*;

#[test]
fn test_append_leaf_under_last_sibling() {
    let (mut tree, sample) = sample_tree();

    let leaf = tree
        .append_child(sample.sibling, b"leaf".to_vec())
        .expect("append");

    assert_eq!((leaf.left, leaf.right, leaf.depth), (8, 9, 2));
    assert_eq!(bounds(&tree, sample.sibling), (7, 10, 1));
    assert_eq!(bounds(&tree, sample.root), (0, 11, 0));
    assert_eq!(bounds(&tree, sample.child), (1, 6, 1));
    assert_valid(&tree);
}

#[test]
fn test_append_leaf_inside_left_subtree() {
    let (mut tree, sample) = sample_tree();

    let leaf = tree
        .append_child(sample.first, b"leaf".to_vec())
        .expect("append");

    assert_eq!((leaf.left, leaf.right, leaf.depth), (3, 4, 3));
    assert_eq!(bounds(&tree, sample.first), (2, 5, 2));
    assert_eq!(bounds(&tree, sample.second), (6, 7, 2));
    assert_eq!(bounds(&tree, sample.child), (1, 8, 1));
    assert_eq!(bounds(&tree, sample.sibling), (9, 10, 1));
    assert_eq!(bounds(&tree, sample.root), (0, 11, 0));
    assert_valid(&tree);
}

#[test]
fn test_appended_children_keep_order() {
    let mut tree = new_tree();
    let root = tree.create_root(Vec::new()).expect("root").id;

    let payloads: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i]).collect();
    for payload in &payloads {
        tree.append_child(root, payload.clone()).expect("append");
    }

    let children: Vec<Vec<u8>> = tree
        .children(root)
        .expect("children")
        .into_iter()
        .map(|node| node.payload)
        .collect();
    assert_eq!(children, payloads);
    assert_eq!(tree.size(root).expect("size"), 6);
    assert_valid(&tree);
}
