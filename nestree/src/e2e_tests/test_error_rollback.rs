//! A failed operation leaves no partial state behind.

use crate::e2e_tests::helpers::*;
use crate::simulation::{FaultConfig, FaultyStore};
use crate::store::{StoreError, Table};
use crate::tree::{NestedSet, TreeError};

fn always_fail() -> FaultConfig {
    FaultConfig {
        commit_failure_rate: 1.0,
    }
}

#[test]
fn test_injected_commit_failure_rolls_back() {
    let store = FaultyStore::new(Table::new(), 7, FaultConfig::no_faults());
    let mut tree = NestedSet::new(store);
    let sample = build_sample(&mut tree);
    let before = tree.nodes().expect("nodes");

    tree.store_mut().set_fault_config(always_fail());
    let results = [
        tree.append_child(sample.first, Vec::new()).map(|_| ()),
        tree.insert_parent_over(&[sample.first, sample.second], Vec::new())
            .map(|_| ()),
        tree.remove(sample.child).map(|_| ()),
        tree.copy_subtree(sample.child, sample.sibling).map(|_| ()),
        tree.move_subtree(sample.sibling, sample.first).map(|_| ()),
    ];

    for result in results {
        let err = result.expect_err("commit refused");
        assert!(matches!(
            err,
            TreeError::TransactionFailure(StoreError::CommitFailed(_))
        ));
        assert!(err.is_retryable());
    }
    assert_eq!(tree.nodes().expect("nodes"), before);
    assert_eq!(tree.store().stats().injected_commit_failures, 5);

    tree.store_mut().set_fault_config(FaultConfig::no_faults());
    tree.move_subtree(sample.sibling, sample.first)
        .expect("retry succeeds");
    assert_eq!(tree.parent(sample.sibling).expect("parent").map(|n| n.id), Some(sample.first));
    assert_valid(&tree);
}

#[test]
fn test_rejected_operation_rolls_back() {
    let (mut tree, sample) = sample_tree();
    let before = tree.nodes().expect("nodes");

    assert!(tree.append_child(crate::node::NodeId(999), Vec::new()).is_err());
    assert!(tree.copy_subtree(sample.child, crate::node::NodeId(999)).is_err());
    assert!(tree
        .insert_parent_over(&[sample.first, sample.sibling], Vec::new())
        .is_err());
    assert!(tree.move_subtree(sample.root, sample.second).is_err());

    assert_eq!(tree.nodes().expect("nodes"), before);
    assert_valid(&tree);
}
