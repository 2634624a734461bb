//! Operation generator for deterministic simulation testing.
//!
//! Generates random but reproducible sequences of tree operations. Most
//! operations are drawn against nodes the reference model knows to exist;
//! a configurable share is deliberately invalid (missing nodes, moves into
//! the moved subtree, parents over non-siblings).

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::node::NodeId;

use super::reference::ReferenceTree;

/// A tree operation the simulator can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateRoot {
        payload: Vec<u8>,
    },
    AppendChild {
        parent: NodeId,
        payload: Vec<u8>,
    },
    InsertParentOver {
        children: Vec<NodeId>,
        payload: Vec<u8>,
    },
    Remove {
        node: NodeId,
    },
    CopySubtree {
        source: NodeId,
        target: NodeId,
    },
    MoveSubtree {
        source: NodeId,
        target: NodeId,
    },
}

impl Operation {
    /// Short name for logs and statistics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateRoot { .. } => "create_root",
            Self::AppendChild { .. } => "append_child",
            Self::InsertParentOver { .. } => "insert_parent_over",
            Self::Remove { .. } => "remove",
            Self::CopySubtree { .. } => "copy_subtree",
            Self::MoveSubtree { .. } => "move_subtree",
        }
    }
}

/// Configuration for operation generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Probability of generating an operation expected to fail (0.0 - 1.0).
    pub invalid_rate: f64,
    /// Above this many nodes, the generator removes subtrees.
    pub max_nodes: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            invalid_rate: 0.1,
            max_nodes: 200,
        }
    }
}

/// Generator for random `Operation` instances.
pub struct OperationGenerator {
    rng: StdRng,
    config: GeneratorConfig,
    next_payload: u64,
}

impl OperationGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, GeneratorConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: GeneratorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
            next_payload: 0,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Pick a random number in `0..n`.
    pub fn index(&mut self, n: usize) -> usize {
        self.rng.random_range(0..n.max(1))
    }

    fn payload(&mut self) -> Vec<u8> {
        self.next_payload += 1;
        format!("node-{}", self.next_payload).into_bytes()
    }

    /// Generate the next operation against the current model.
    pub fn next_operation(&mut self, model: &ReferenceTree) -> Operation {
        let ids = model.ids();
        if ids.is_empty() {
            return Operation::CreateRoot {
                payload: self.payload(),
            };
        }
        if self.config.invalid_rate > 0.0 && self.rng.random::<f64>() < self.config.invalid_rate {
            return self.invalid_operation(model, &ids);
        }
        if model.len() >= self.config.max_nodes {
            return Operation::Remove {
                node: self.pick(&ids),
            };
        }

        match self.rng.random_range(0..100) {
            0..40 => Operation::AppendChild {
                parent: self.pick(&ids),
                payload: self.payload(),
            },
            40..52 => self.sibling_run(model, &ids),
            52..64 => Operation::Remove {
                node: self.pick_non_root(model, &ids),
            },
            64..76 => {
                let source = self.pick(&ids);
                Operation::CopySubtree {
                    source,
                    target: self.pick(&ids),
                }
            }
            76..95 => self.valid_move(model, &ids),
            _ => Operation::CreateRoot {
                payload: self.payload(),
            },
        }
    }

    fn pick(&mut self, ids: &[NodeId]) -> NodeId {
        ids.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn pick_non_root(&mut self, model: &ReferenceTree, ids: &[NodeId]) -> NodeId {
        let candidates: Vec<NodeId> = ids
            .iter()
            .copied()
            .filter(|&id| Some(id) != model.root())
            .collect();
        if candidates.is_empty() {
            self.pick(ids)
        } else {
            self.pick(&candidates)
        }
    }

    /// A run of adjacent siblings under a random node, or the root alone.
    fn sibling_run(&mut self, model: &ReferenceTree, ids: &[NodeId]) -> Operation {
        let parent = self.pick(ids);
        let siblings = model.children(parent);
        let mut children = if siblings.is_empty() {
            model.root().into_iter().collect()
        } else {
            let start = self.index(siblings.len());
            let end = start + self.index(siblings.len() - start);
            siblings[start..=end].to_vec()
        };
        if self.rng.random::<bool>() {
            children.reverse();
        }
        Operation::InsertParentOver {
            children,
            payload: self.payload(),
        }
    }

    /// A move whose target lies outside the moved subtree.
    fn valid_move(&mut self, model: &ReferenceTree, ids: &[NodeId]) -> Operation {
        let source = self.pick_non_root(model, ids);
        let inside = model.subtree(source);
        let targets: Vec<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| !inside.contains(id))
            .collect();
        let target = if targets.is_empty() {
            source
        } else {
            self.pick(&targets)
        };
        Operation::MoveSubtree { source, target }
    }

    fn invalid_operation(&mut self, model: &ReferenceTree, ids: &[NodeId]) -> Operation {
        let missing = NodeId(u64::MAX - self.rng.random_range(0..1000));
        match self.rng.random_range(0..5) {
            0 => Operation::AppendChild {
                parent: missing,
                payload: self.payload(),
            },
            1 => Operation::Remove { node: missing },
            2 => {
                let source = self.pick(ids);
                let inside = model.subtree(source);
                Operation::MoveSubtree {
                    source,
                    target: self.pick(&inside),
                }
            }
            3 => {
                let a = self.pick(ids);
                let b = self.pick(ids);
                Operation::InsertParentOver {
                    children: vec![a, b],
                    payload: self.payload(),
                }
            }
            _ => Operation::InsertParentOver {
                children: Vec::new(),
                payload: self.payload(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::node;

    fn sample() -> ReferenceTree {
        ReferenceTree::from_rows(&[
            node(1, 0, 9, 0),
            node(2, 1, 6, 1),
            node(3, 2, 3, 2),
            node(4, 4, 5, 2),
            node(5, 7, 8, 1),
        ])
    }

    #[test]
    fn test_empty_model_creates_root() {
        let mut generator = OperationGenerator::new(1);
        let op = generator.next_operation(&ReferenceTree::new());
        assert!(matches!(op, Operation::CreateRoot { .. }));
    }

    #[test]
    fn test_generator_deterministic() {
        let model = sample();
        let mut a = OperationGenerator::new(42);
        let mut b = OperationGenerator::new(42);
        for _ in 0..50 {
            assert_eq!(a.next_operation(&model), b.next_operation(&model));
        }
    }

    #[test]
    fn test_valid_operations_pass_model() {
        let model = sample();
        let config = GeneratorConfig {
            invalid_rate: 0.0,
            ..GeneratorConfig::default()
        };
        let mut generator = OperationGenerator::with_config(7, config);
        for _ in 0..200 {
            let op = generator.next_operation(&model);
            assert_eq!(model.validate(&op), Ok(()), "{op:?}");
        }
    }

    #[test]
    fn test_invalid_operations_generated() {
        let model = sample();
        let config = GeneratorConfig {
            invalid_rate: 1.0,
            ..GeneratorConfig::default()
        };
        let mut generator = OperationGenerator::with_config(7, config);
        let rejected = (0..100)
            .filter(|_| model.validate(&generator.next_operation(&model)).is_err())
            .count();
        assert!(rejected > 50, "only {rejected} rejected");
    }
}
