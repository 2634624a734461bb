//! Main simulator harness for deterministic simulation testing.
//!
//! Drives a [`NestedSet`] with generated operations and, after each one:
//!
//! 1. compares the operation's outcome with the reference model's verdict
//! 2. checks every structural invariant over the full row set
//! 3. compares the tree with the reference model in pre-order
//! 4. spot-checks the traversal queries on one random node

use crate::invariants::{InvariantChecker, InvariantViolation, ViolationKind};
use crate::node::{Node, NodeId};
use crate::store::{RowStore, StoreError};
use crate::tree::{NestedSet, TreeError};

use super::faulty::FaultConfig;
use super::generator::{GeneratorConfig, Operation, OperationGenerator};
use super::reference::{Entry, ReferenceTree, Rejection};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Fault injection configuration, for callers that wrap their store.
    pub fault_config: FaultConfig,
    /// Operation generation configuration.
    pub generator_config: GeneratorConfig,
}

impl SimulatorConfig {
    /// Create a new simulator config with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            fault_config: FaultConfig::default(),
            generator_config: GeneratorConfig::default(),
        }
    }

    /// Set the fault configuration.
    #[must_use]
    pub const fn with_fault_config(mut self, config: FaultConfig) -> Self {
        self.fault_config = config;
        self
    }

    /// Set the invalid operation rate.
    #[must_use]
    pub const fn with_invalid_rate(mut self, rate: f64) -> Self {
        self.generator_config.invalid_rate = rate;
        self
    }

    /// Set the node count above which the generator prunes.
    #[must_use]
    pub const fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.generator_config.max_nodes = max_nodes;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The seed used for this simulation.
    pub seed: u64,
    /// Number of operations issued.
    pub operations_processed: u64,
    /// Number of operations that succeeded.
    pub successful_operations: u64,
    /// Number of operations rejected as invalid, as expected.
    pub rejected_operations: u64,
    /// Number of operations whose commit was refused by the store.
    pub failed_commits: u64,
    /// Number of nodes in the tree at the end.
    pub final_node_count: usize,
    /// Invariant violations detected.
    pub invariant_violations: Vec<InvariantViolation>,
    /// Whether the simulation ran to the end.
    pub completed_successfully: bool,
    /// Error message if the simulation stopped early.
    pub error: Option<String>,
}

impl SimulationResult {
    /// Check if the simulation passed (no invariant violations).
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.completed_successfully && self.invariant_violations.is_empty()
    }
}

/// The main simulator harness.
pub struct Simulator {
    config: SimulatorConfig,
    generator: OperationGenerator,
    checker: InvariantChecker,
    model: ReferenceTree,
    operations_processed: u64,
    successful_operations: u64,
    rejected_operations: u64,
    failed_commits: u64,
}

impl Simulator {
    /// Create a new simulator with the given configuration.
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let generator = OperationGenerator::with_config(config.seed, config.generator_config.clone());
        Self {
            config,
            generator,
            checker: InvariantChecker::new(),
            model: ReferenceTree::new(),
            operations_processed: 0,
            successful_operations: 0,
            rejected_operations: 0,
            failed_commits: 0,
        }
    }

    /// The reference model as of the last operation.
    #[must_use]
    pub const fn model(&self) -> &ReferenceTree {
        &self.model
    }

    /// Run `steps` operations against `tree`.
    ///
    /// The reference model starts from the tree's current rows, so a run
    /// can continue a tree left behind by an earlier one.
    pub fn run<S: RowStore>(&mut self, tree: &mut NestedSet<S>, steps: usize) -> SimulationResult {
        let start = match tree.nodes() {
            Ok(rows) => rows,
            Err(e) => return self.result(0, Some(format!("failed to read tree: {e}"))),
        };
        self.checker.check_rows(&start, 0);
        self.model = ReferenceTree::from_rows(&start);
        tracing::info!(
            "Starting simulation with seed {} from {} nodes",
            self.config.seed,
            start.len()
        );

        for _ in 0..steps {
            let index = usize::try_from(self.operations_processed).unwrap_or(usize::MAX);
            let operation = self.generator.next_operation(&self.model);
            self.operations_processed += 1;

            if let Err(e) = self.step(tree, &operation, index) {
                let count = tree.len().unwrap_or(0);
                return self.result(count, Some(format!("operation {index} failed: {e}")));
            }
        }

        let count = tree.len().unwrap_or(0);
        tracing::info!(
            "Simulation finished: {} operations, {} succeeded, {} rejected, {} failed commits, {} nodes",
            self.operations_processed,
            self.successful_operations,
            self.rejected_operations,
            self.failed_commits,
            count
        );
        self.result(count, None)
    }

    fn result(&self, final_node_count: usize, error: Option<String>) -> SimulationResult {
        SimulationResult {
            seed: self.config.seed,
            operations_processed: self.operations_processed,
            successful_operations: self.successful_operations,
            rejected_operations: self.rejected_operations,
            failed_commits: self.failed_commits,
            final_node_count,
            invariant_violations: self.checker.violations().to_vec(),
            completed_successfully: error.is_none(),
            error,
        }
    }

    /// Issue one operation and check everything afterwards.
    ///
    /// Returns an error only when the tree can no longer be read.
    fn step<S: RowStore>(
        &mut self,
        tree: &mut NestedSet<S>,
        operation: &Operation,
        index: usize,
    ) -> Result<(), TreeError> {
        let expected = self.model.validate(operation);
        let outcome = execute(tree, operation);

        match (outcome, expected) {
            (Ok(created), Ok(())) => {
                self.successful_operations += 1;
                if self.model.apply(operation, &created).is_err() {
                    self.mismatch(ViolationKind::ModelMismatch, "model could not apply", operation, index);
                }
            }
            (Err(TreeError::TransactionFailure(StoreError::CommitFailed(reason))), _) => {
                tracing::debug!("{} refused at commit: {reason}", operation.name());
                self.failed_commits += 1;
            }
            (Err(e), Err(rejection)) if matches_rejection(&e, rejection) => {
                self.rejected_operations += 1;
            }
            (Ok(_), Err(rejection)) => {
                self.mismatch(
                    ViolationKind::OutcomeMismatch,
                    &format!("succeeded, expected {rejection:?}"),
                    operation,
                    index,
                );
            }
            (Err(e), _) => {
                self.mismatch(
                    ViolationKind::OutcomeMismatch,
                    &format!("failed unexpectedly: {e}"),
                    operation,
                    index,
                );
            }
        }

        let rows = tree.nodes()?;
        self.checker.check_rows(&rows, index);
        self.compare_with_model(&rows, operation, index);
        self.check_queries(tree, index)?;
        Ok(())
    }

    fn mismatch(&mut self, kind: ViolationKind, description: &str, operation: &Operation, index: usize) {
        tracing::error!("Operation {index} {}: {description}", operation.name());
        self.checker.add_violation(InvariantViolation {
            kind,
            description: format!("{} {description}", operation.name()),
            context: format!("{operation:?}"),
            operation_index: index,
        });
    }

    fn compare_with_model(&mut self, rows: &[Node], operation: &Operation, index: usize) {
        let actual: Vec<Entry> = rows
            .iter()
            .map(|n| (n.id, n.depth, n.payload.clone()))
            .collect();
        let expected = self.model.preorder();
        if actual != expected {
            let first = actual
                .iter()
                .zip(&expected)
                .position(|(a, e)| a != e)
                .unwrap_or(actual.len().min(expected.len()));
            self.mismatch(
                ViolationKind::ModelMismatch,
                &format!(
                    "pre-order differs from model at position {first} ({} rows, model has {})",
                    actual.len(),
                    expected.len()
                ),
                operation,
                index,
            );
        }
    }

    /// Compare the queries on one random node with the model.
    fn check_queries<S: RowStore>(&mut self, tree: &NestedSet<S>, index: usize) -> Result<(), TreeError> {
        let ids = self.model.ids();
        if ids.is_empty() {
            return Ok(());
        }
        let id = ids[self.generator.index(ids.len())];

        let mut problems = Vec::new();
        let children: Vec<NodeId> = tree.children(id)?.iter().map(|n| n.id).collect();
        if children != self.model.children(id) {
            problems.push(format!("children {children:?}"));
        }
        let parent = tree.parent(id)?.map(|n| n.id);
        if parent != self.model.parent(id) {
            problems.push(format!("parent {parent:?}"));
        }
        let depth = tree.depth(id)?;
        if depth != self.model.depth(id) {
            problems.push(format!("depth {depth}"));
        }
        let subtree = self.model.subtree(id);
        let preorder: Vec<NodeId> = tree.preorder(id)?.iter().map(|n| n.id).collect();
        if preorder != subtree {
            problems.push(format!("preorder {preorder:?}"));
        }
        let size = tree.size(id)?;
        if usize::try_from(size).ok() != Some(subtree.len()) {
            problems.push(format!("size {size}"));
        }
        let level = tree.level_order(id)?;
        if level.windows(2).any(|w| (w[0].depth, w[0].left) > (w[1].depth, w[1].left))
            || level.len() != subtree.len()
        {
            problems.push("level order".to_string());
        }

        if !problems.is_empty() {
            self.checker.add_violation(InvariantViolation {
                kind: ViolationKind::ModelMismatch,
                description: format!("queries on {id} disagree with model"),
                context: problems.join(", "),
                operation_index: index,
            });
        }
        Ok(())
    }
}

/// Run `operation`, returning the identifiers of any rows it created in
/// pre-order.
fn execute<S: RowStore>(tree: &mut NestedSet<S>, operation: &Operation) -> Result<Vec<NodeId>, TreeError> {
    match operation {
        Operation::CreateRoot { payload } => Ok(vec![tree.create_root(payload.clone())?.id]),
        Operation::AppendChild { parent, payload } => {
            Ok(vec![tree.append_child(*parent, payload.clone())?.id])
        }
        Operation::InsertParentOver { children, payload } => {
            Ok(vec![tree.insert_parent_over(children, payload.clone())?.id])
        }
        Operation::Remove { node } => tree.remove(*node).map(|_| Vec::new()),
        Operation::CopySubtree { source, target } => {
            let copy = tree.copy_subtree(*source, *target)?;
            Ok(tree.preorder(copy.id)?.iter().map(|n| n.id).collect())
        }
        Operation::MoveSubtree { source, target } => {
            tree.move_subtree(*source, *target).map(|_| Vec::new())
        }
    }
}

const fn matches_rejection(error: &TreeError, rejection: Rejection) -> bool {
    matches!(
        (error, rejection),
        (TreeError::NotFound(_), Rejection::NotFound)
            | (TreeError::InvalidStructure(_), Rejection::InvalidStructure)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::FaultyStore;
    use crate::store::Table;

    fn simulate(config: SimulatorConfig, steps: usize) -> SimulationResult {
        let store = FaultyStore::new(Table::new(), config.seed, config.fault_config.clone());
        let mut tree = NestedSet::new(store);
        Simulator::new(config).run(&mut tree, steps)
    }

    #[test]
    fn test_simulator_basic() {
        let result = simulate(SimulatorConfig::new(12345), 100);

        assert!(result.completed_successfully);
        assert_eq!(result.operations_processed, 100);
        assert!(result.successful_operations > 0);
        assert!(result.passed(), "{:?}", result.invariant_violations);
    }

    #[test]
    fn test_simulator_with_invalid_operations() {
        let result = simulate(SimulatorConfig::new(12345).with_invalid_rate(0.5), 200);

        assert!(result.passed(), "{:?}", result.invariant_violations);
        assert!(result.rejected_operations > 0);
    }

    #[test]
    fn test_simulator_deterministic() {
        let a = simulate(SimulatorConfig::new(777), 150);
        let b = simulate(SimulatorConfig::new(777), 150);

        assert_eq!(a.successful_operations, b.successful_operations);
        assert_eq!(a.rejected_operations, b.rejected_operations);
        assert_eq!(a.final_node_count, b.final_node_count);
    }

    #[test]
    fn test_simulator_no_invariant_violations() {
        for seed in [1, 2, 3, 54321] {
            let result = simulate(SimulatorConfig::new(seed).with_max_nodes(60), 300);
            assert!(
                result.passed(),
                "seed {seed}: {:?}",
                result.invariant_violations
            );
        }
    }

    #[test]
    fn test_simulator_with_commit_failures() {
        let config = SimulatorConfig::new(4242).with_fault_config(FaultConfig::high_faults());
        let result = simulate(config, 300);

        assert!(result.passed(), "{:?}", result.invariant_violations);
        assert!(result.failed_commits > 0);
    }

    #[test]
    fn test_simulator_continues_existing_tree() {
        let mut tree = NestedSet::new(Table::new());
        let root = tree.create_root(b"root".to_vec()).expect("root");
        tree.append_child(root.id, b"leaf".to_vec()).expect("leaf");

        let mut simulator = Simulator::new(SimulatorConfig::new(5));
        let result = simulator.run(&mut tree, 50);
        assert!(result.passed(), "{:?}", result.invariant_violations);
        assert_eq!(simulator.model().len(), result.final_node_count);
    }

    #[test]
    #[ignore] // Long running test
    fn test_simulator_stress() {
        let config = SimulatorConfig::new(99999)
            .with_invalid_rate(0.1)
            .with_fault_config(FaultConfig::low_faults());
        let result = simulate(config, 10_000);

        assert!(result.completed_successfully);
        assert!(result.passed(), "{:?}", result.invariant_violations);
    }
}
