// An ordered tree stored as nested-set rows.
//
// Every node holds an integer interval [left, right]; a node's descendants
// are exactly the rows whose intervals it contains, so subtree and ancestor
// queries are single range scans.
//
// System components:
//  - Row store: in-memory table, or durable table + write-ahead log
//  - Shift primitive: one bulk update that opens or closes a gap
//  - Tree operations built on shifts, each in one transaction
//  - Containment queries
//  - Invariant checker and deterministic simulation

pub mod config;
pub mod invariants;
pub mod node;
pub mod registry;
pub mod simulation;
pub mod store;
pub mod tree;

mod e2e_tests;

pub use node::{NewRow, Node, NodeId};
pub use registry::TreeRegistry;
pub use tree::{NestedSet, StructureError, TreeError};
