//! Reference tree model for simulation.
//!
//! A plain parent/children pointer tree. It decides independently whether an
//! operation should succeed and what the tree looks like afterwards, so the
//! simulator can compare it with the nested-set encoding.

use std::collections::BTreeMap;

use crate::node::{Node, NodeId};

use super::generator::Operation;

/// Why the model expects an operation to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotFound,
    InvalidStructure,
}

#[derive(Debug, Clone)]
struct ModelNode {
    payload: Vec<u8>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// One node of the model in pre-order: identifier, depth, payload.
pub type Entry = (NodeId, i64, Vec<u8>);

/// A pointer-based ordered tree.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTree {
    nodes: BTreeMap<NodeId, ModelNode>,
    root: Option<NodeId>,
}

impl ReferenceTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the model from rows in `left` order.
    #[must_use]
    pub fn from_rows(rows: &[Node]) -> Self {
        let mut model = Self::new();
        let mut open: Vec<&Node> = Vec::new();
        for row in rows {
            while open.last().is_some_and(|top| top.right < row.left) {
                open.pop();
            }
            let parent = open.last().map(|top| top.id);
            model.attach(row.id, row.payload.clone(), parent);
            open.push(row);
        }
        model
    }

    fn attach(&mut self, id: NodeId, payload: Vec<u8>, parent: Option<NodeId>) {
        self.nodes.insert(
            id,
            ModelNode {
                payload,
                parent,
                children: Vec::new(),
            },
        );
        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(parent) => parent.children.push(id),
            None => self.root = Some(id),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All identifiers, in identifier order.
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map_or(&[], |n| n.children.as_slice())
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Number of ancestors of `id`.
    #[must_use]
    pub fn depth(&self, id: NodeId) -> i64 {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(p) = current {
            depth += 1;
            current = self.parent(p);
        }
        depth
    }

    /// `id` and its descendants in pre-order.
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(&next) {
                out.push(next);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// The whole tree in pre-order.
    #[must_use]
    pub fn preorder(&self) -> Vec<Entry> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = vec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push((id, depth, node.payload.clone()));
                stack.extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
            }
        }
        out
    }

    fn require(&self, id: NodeId) -> Result<(), Rejection> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(Rejection::NotFound)
        }
    }

    /// Decide whether `operation` should succeed against the current model.
    pub fn validate(&self, operation: &Operation) -> Result<(), Rejection> {
        match operation {
            Operation::CreateRoot { .. } => Ok(()),
            Operation::AppendChild { parent, .. } => self.require(*parent),
            Operation::InsertParentOver { children, .. } => {
                self.sibling_run(children).map(|_| ())
            }
            Operation::Remove { node } => self.require(*node),
            Operation::CopySubtree { source, target } => {
                self.require(*source)?;
                self.require(*target)
            }
            Operation::MoveSubtree { source, target } => {
                self.require(*source)?;
                self.require(*target)?;
                if self.subtree(*source).contains(target) {
                    return Err(Rejection::InvalidStructure);
                }
                Ok(())
            }
        }
    }

    /// Position range of `ids` inside their common parent's child list.
    fn sibling_run(&self, ids: &[NodeId]) -> Result<(Option<NodeId>, usize, usize), Rejection> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let Some(&first) = ids.first() else {
            return Err(Rejection::InvalidStructure);
        };
        for &id in &ids {
            self.require(id)?;
        }

        let parent = self.parent(first);
        if ids.iter().any(|&id| self.parent(id) != parent) {
            return Err(Rejection::InvalidStructure);
        }
        let siblings: &[NodeId] = match parent {
            Some(p) => self.children(p),
            None => std::slice::from_ref(&first),
        };
        let mut positions: Vec<usize> = ids
            .iter()
            .filter_map(|id| siblings.iter().position(|s| s == id))
            .collect();
        positions.sort_unstable();
        let (Some(&start), Some(&end)) = (positions.first(), positions.last()) else {
            return Err(Rejection::InvalidStructure);
        };
        if end - start + 1 != ids.len() {
            return Err(Rejection::InvalidStructure);
        }
        Ok((parent, start, end))
    }

    /// Apply a successful operation.
    ///
    /// `created` lists the identifiers the store assigned to new rows, in
    /// pre-order: the new node for appends and inserts, the whole copy for
    /// copies.
    pub fn apply(&mut self, operation: &Operation, created: &[NodeId]) -> Result<(), Rejection> {
        self.validate(operation)?;
        match operation {
            Operation::CreateRoot { payload } => {
                if self.root.is_none() {
                    let id = *created.first().ok_or(Rejection::NotFound)?;
                    self.attach(id, payload.clone(), None);
                }
            }
            Operation::AppendChild { parent, payload } => {
                let id = *created.first().ok_or(Rejection::NotFound)?;
                self.attach(id, payload.clone(), Some(*parent));
            }
            Operation::InsertParentOver { children, payload } => {
                let id = *created.first().ok_or(Rejection::NotFound)?;
                let (parent, start, end) = self.sibling_run(children)?;
                let run: Vec<NodeId> = match parent.and_then(|p| self.nodes.get_mut(&p)) {
                    Some(p) => p.children.splice(start..=end, [id]).collect(),
                    None => self.root.replace(id).into_iter().collect(),
                };
                for child in &run {
                    if let Some(c) = self.nodes.get_mut(child) {
                        c.parent = Some(id);
                    }
                }
                self.nodes.insert(
                    id,
                    ModelNode {
                        payload: payload.clone(),
                        parent,
                        children: run,
                    },
                );
            }
            Operation::Remove { node } => {
                self.detach(*node);
                for id in self.subtree(*node) {
                    self.nodes.remove(&id);
                }
            }
            Operation::CopySubtree { source, target } => {
                let originals = self.subtree(*source);
                if originals.len() != created.len() {
                    return Err(Rejection::NotFound);
                }
                let mut renamed: BTreeMap<NodeId, NodeId> = BTreeMap::new();
                for (&old, &new) in originals.iter().zip(created) {
                    renamed.insert(old, new);
                }
                for (&old, &new) in originals.iter().zip(created) {
                    let payload = self.nodes.get(&old).map(|n| n.payload.clone()).unwrap_or_default();
                    let parent = if old == *source {
                        Some(*target)
                    } else {
                        self.parent(old).and_then(|p| renamed.get(&p).copied())
                    };
                    self.attach(new, payload, parent);
                }
            }
            Operation::MoveSubtree { source, target } => {
                self.detach(*source);
                if let Some(node) = self.nodes.get_mut(source) {
                    node.parent = Some(*target);
                }
                if let Some(target) = self.nodes.get_mut(target) {
                    target.children.push(*source);
                }
            }
        }
        Ok(())
    }

    /// Unlink `id` from its parent, or from the root slot.
    fn detach(&mut self, id: NodeId) {
        match self.parent(id).and_then(|p| self.nodes.get_mut(&p)) {
            Some(parent) => parent.children.retain(|&c| c != id),
            None => {
                if self.root == Some(id) {
                    self.root = None;
                }
            }
        }
    }
}
