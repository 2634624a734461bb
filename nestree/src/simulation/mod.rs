//! Deterministic Simulation Testing (DST) infrastructure.
//!
//! This module provides tools for testing the tree with:
//! - Reproducible random operation generation, including invalid operations
//! - A reference pointer-tree model that predicts every outcome
//! - A row store wrapper that injects commit failures
//! - Invariant checking after each operation
//!
//! Given the same seed, a run issues the same operations and sees the same
//! faults.
//!
//! # Usage
//!
//! ```
//! use nestree::simulation::{FaultConfig, FaultyStore, Simulator, SimulatorConfig};
//! use nestree::store::Table;
//! use nestree::tree::NestedSet;
//!
//! let config = SimulatorConfig::new(12345).with_invalid_rate(0.1);
//! let store = FaultyStore::new(Table::new(), config.seed, FaultConfig::low_faults());
//! let mut tree = NestedSet::new(store);
//!
//! let result = Simulator::new(config).run(&mut tree, 100);
//! assert!(result.passed());
//! ```

mod faulty;
mod generator;
mod reference;
mod simulator;

pub use faulty::{FaultConfig, FaultStats, FaultyStore, FaultyTransaction};
pub use generator::{GeneratorConfig, Operation, OperationGenerator};
pub use reference::{Entry, ReferenceTree, Rejection};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
