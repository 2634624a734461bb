//! Containment queries over the sample tree.

use crate::e2e_tests::helpers::*;
use crate::node::{Node, NodeId};
use crate::tree::TreeError;

fn ids(nodes: Vec<Node>) -> Vec<NodeId> {
    nodes.into_iter().map(|n| n.id).collect()
}

#[test]
fn test_path_and_ancestors() {
    let (tree, s) = sample_tree();

    assert_eq!(ids(tree.path(s.first).expect("path")), vec![s.root, s.child, s.first]);
    assert_eq!(ids(tree.ancestors(s.first).expect("ancestors")), vec![s.root, s.child]);
    assert!(tree.ancestors(s.root).expect("ancestors").is_empty());
    assert_eq!(tree.depth(s.second).expect("depth"), 2);
    assert_eq!(tree.depth(s.root).expect("depth"), 0);
}

#[test]
fn test_family_queries() {
    let (tree, s) = sample_tree();

    assert_eq!(tree.parent(s.first).expect("parent").map(|n| n.id), Some(s.child));
    assert!(tree.parent(s.root).expect("parent").is_none());
    assert_eq!(ids(tree.children(s.root).expect("children")), vec![s.child, s.sibling]);
    assert!(tree.children(s.sibling).expect("children").is_empty());
    assert_eq!(ids(tree.siblings(s.child).expect("siblings")), vec![s.sibling]);
    assert_eq!(ids(tree.siblings(s.second).expect("siblings")), vec![s.first]);
    assert!(tree.siblings(s.root).expect("siblings").is_empty());
}

#[test]
fn test_subtree_orders() {
    let (tree, s) = sample_tree();

    assert_eq!(
        ids(tree.preorder(s.root).expect("preorder")),
        vec![s.root, s.child, s.first, s.second, s.sibling]
    );
    assert_eq!(
        ids(tree.level_order(s.root).expect("level order")),
        vec![s.root, s.child, s.sibling, s.first, s.second]
    );
    assert_eq!(
        ids(tree.descendants(s.child).expect("descendants")),
        vec![s.first, s.second]
    );
    assert_eq!(tree.subtree(s.child).expect("subtree").len(), 3);
    assert_eq!(tree.size(s.child).expect("size"), 3);
    assert_eq!(tree.size(s.root).expect("size"), 5);
}

#[test]
fn test_ancestry_predicates() {
    let (tree, s) = sample_tree();

    assert!(tree.is_ancestor_of(s.root, s.first).expect("ancestor"));
    assert!(tree.is_descendant_of(s.second, s.child).expect("descendant"));
    assert!(!tree.is_descendant_of(s.sibling, s.child).expect("descendant"));
    assert!(!tree.is_ancestor_of(s.child, s.child).expect("ancestor"));
}

#[test]
fn test_queries_on_missing_node() {
    let (mut tree, s) = sample_tree();
    tree.remove(s.second).expect("remove");

    assert!(matches!(tree.children(s.second), Err(TreeError::NotFound(_))));
    assert!(matches!(tree.path(s.second), Err(TreeError::NotFound(_))));
    assert!(matches!(
        tree.is_ancestor_of(s.child, s.second),
        Err(TreeError::NotFound(_))
    ));
}
