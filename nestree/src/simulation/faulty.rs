//! Fault-injecting row store for deterministic testing.
//!
//! Wraps any [`RowStore`] and refuses a seeded random share of commits,
//! the way a real database reports contention or lost connectivity. The
//! inner transaction is aborted, so an injected failure must leave the tree
//! exactly as it was.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::node::{NewRow, Node, NodeId};
use crate::store::{
    Filter, Order, Relocation, RowReader, RowStore, RowTransaction, StoreError,
};

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability that a commit is refused (0.0 - 1.0).
    pub commit_failure_rate: f64,
}

impl FaultConfig {
    /// No faults (for baseline testing).
    #[must_use]
    pub fn no_faults() -> Self {
        Self::default()
    }

    /// Low fault rate (for stress testing).
    #[must_use]
    pub const fn low_faults() -> Self {
        Self {
            commit_failure_rate: 0.01,
        }
    }

    /// High fault rate (for extreme testing).
    #[must_use]
    pub const fn high_faults() -> Self {
        Self {
            commit_failure_rate: 0.2,
        }
    }
}

/// Statistics about injected faults.
#[derive(Debug, Default, Clone)]
pub struct FaultStats {
    /// Number of transactions begun.
    pub transactions: u64,
    /// Number of commits refused.
    pub injected_commit_failures: u64,
}

/// A row store that fails commits at random.
pub struct FaultyStore<S> {
    inner: S,
    config: FaultConfig,
    rng: StdRng,
    stats: FaultStats,
}

impl<S: RowStore> FaultyStore<S> {
    /// Wrap `inner`. The same seed yields the same sequence of faults.
    #[must_use]
    pub fn new(inner: S, seed: u64, config: FaultConfig) -> Self {
        Self {
            inner,
            config,
            rng: StdRng::seed_from_u64(seed),
            stats: FaultStats::default(),
        }
    }

    #[must_use]
    pub const fn stats(&self) -> &FaultStats {
        &self.stats
    }

    pub const fn set_fault_config(&mut self, config: FaultConfig) {
        self.config = config;
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn should_inject_fault(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        self.rng.random::<f64>() < rate
    }
}

impl<S: RowStore> RowReader for FaultyStore<S> {
    fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        self.inner.get(id)
    }

    fn find(&self, filter: &Filter, order: Order) -> Result<Vec<Node>, StoreError> {
        self.inner.find(filter, order)
    }
}

impl<S: RowStore> RowStore for FaultyStore<S> {
    type Transaction<'a>
        = FaultyTransaction<'a, S>
    where
        Self: 'a;

    fn begin(&mut self) -> Result<FaultyTransaction<'_, S>, StoreError> {
        let fail = self.should_inject_fault(self.config.commit_failure_rate);
        self.stats.transactions += 1;
        Ok(FaultyTransaction {
            inner: self.inner.begin()?,
            fail,
            injected: &mut self.stats.injected_commit_failures,
        })
    }
}

/// A transaction whose commit may be refused.
pub struct FaultyTransaction<'a, S: RowStore + 'a> {
    inner: S::Transaction<'a>,
    fail: bool,
    injected: &'a mut u64,
}

impl<'a, S: RowStore + 'a> RowReader for FaultyTransaction<'a, S> {
    fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        self.inner.get(id)
    }

    fn find(&self, filter: &Filter, order: Order) -> Result<Vec<Node>, StoreError> {
        self.inner.find(filter, order)
    }
}

impl<'a, S: RowStore + 'a> RowTransaction for FaultyTransaction<'a, S> {
    fn create(&mut self, row: NewRow) -> Result<Node, StoreError> {
        self.inner.create(row)
    }

    fn delete(&mut self, filter: &Filter) -> Result<usize, StoreError> {
        self.inner.delete(filter)
    }

    fn update(
        &mut self,
        filter: &Filter,
        relocate: &dyn Fn(&Node) -> Option<Relocation>,
    ) -> Result<usize, StoreError> {
        self.inner.update(filter, relocate)
    }

    fn commit(self) -> Result<(), StoreError> {
        if self.fail {
            *self.injected += 1;
            self.inner.abort();
            return Err(StoreError::CommitFailed("injected fault".to_string()));
        }
        self.inner.commit()
    }

    fn abort(self) {
        self.inner.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Table;

    fn leaf() -> NewRow {
        NewRow {
            left: 0,
            right: 1,
            depth: 0,
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_no_faults_commits() {
        let mut store = FaultyStore::new(Table::new(), 1, FaultConfig::no_faults());
        let mut txn = store.begin().expect("begin");
        txn.create(leaf()).expect("create");
        txn.commit().expect("commit");
        assert_eq!(store.count(&Filter::all()).expect("count"), 1);
        assert_eq!(store.stats().injected_commit_failures, 0);
    }

    #[test]
    fn test_injected_failure_discards_changes() {
        let config = FaultConfig {
            commit_failure_rate: 1.0,
        };
        let mut store = FaultyStore::new(Table::new(), 1, config);
        let mut txn = store.begin().expect("begin");
        txn.create(leaf()).expect("create");
        assert!(matches!(txn.commit(), Err(StoreError::CommitFailed(_))));
        assert_eq!(store.count(&Filter::all()).expect("count"), 0);
        assert_eq!(store.stats().injected_commit_failures, 1);
    }

    #[test]
    fn test_faults_deterministic() {
        let run = |seed| {
            let mut store = FaultyStore::new(Table::new(), seed, FaultConfig::high_faults());
            (0..100)
                .map(|_| {
                    let txn = store.begin().expect("begin");
                    txn.commit().is_ok()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
        assert!(run(9).contains(&false));
    }
}
