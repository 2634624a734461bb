//! The nested-set tree.
//!
//! [`NestedSet`] wraps a row store and runs every structural operation in
//! exactly one store transaction: the transaction commits when the
//! operation succeeds and is aborted on any error, so a failed operation
//! leaves no trace.
//!
//! Queries read the store's committed state.

mod error;
pub mod ops;
pub mod shift;
pub mod traverse;

pub use error::{StructureError, TreeError};
pub use shift::{Placement, Shift, Window};

use crate::node::{Node, NodeId};
use crate::store::{Filter, Order, RowReader, RowStore, RowTransaction};

/// A tree stored as nested-set rows.
pub struct NestedSet<S> {
    store: S,
}

impl<S: RowStore> NestedSet<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying row store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the underlying row store.
    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Run `operation` in a fresh transaction.
    fn transaction<'s, R>(
        &'s mut self,
        name: &str,
        operation: impl FnOnce(&mut S::Transaction<'s>) -> Result<R, TreeError>,
    ) -> Result<R, TreeError> {
        let mut txn = self.store.begin()?;
        match operation(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!("Aborting {name}: {e}");
                txn.abort();
                Err(e)
            }
        }
    }

    /// Return the root, creating it if the tree is empty.
    pub fn create_root(&mut self, payload: Vec<u8>) -> Result<Node, TreeError> {
        self.transaction("create_root", |txn| ops::create_root(txn, payload))
    }

    /// Add a leaf as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, payload: Vec<u8>) -> Result<Node, TreeError> {
        self.transaction("append_child", |txn| {
            ops::append_child(txn, parent, payload)
        })
    }

    /// Insert a new parent over a run of adjacent siblings.
    pub fn insert_parent_over(
        &mut self,
        children: &[NodeId],
        payload: Vec<u8>,
    ) -> Result<Node, TreeError> {
        self.transaction("insert_parent_over", |txn| {
            ops::insert_parent_over(txn, children, payload)
        })
    }

    /// Remove `node` and its descendants. Returns the number of rows removed.
    pub fn remove(&mut self, node: NodeId) -> Result<usize, TreeError> {
        self.transaction("remove", |txn| ops::remove(txn, node))
    }

    /// Copy the subtree at `source` under `target`. Returns the copy's root.
    pub fn copy_subtree(&mut self, source: NodeId, target: NodeId) -> Result<Node, TreeError> {
        self.transaction("copy_subtree", |txn| {
            ops::copy_subtree(txn, source, target)
        })
    }

    /// Move the subtree at `source` under `target`. Returns the moved root.
    pub fn move_subtree(&mut self, source: NodeId, target: NodeId) -> Result<Node, TreeError> {
        self.transaction("move_subtree", |txn| {
            ops::move_subtree(txn, source, target)
        })
    }

    /// Fetch a node.
    pub fn get(&self, id: NodeId) -> Result<Node, TreeError> {
        self.store.get(id)?.ok_or(TreeError::NotFound(id))
    }

    pub fn root(&self) -> Result<Option<Node>, TreeError> {
        Ok(traverse::find_root(&self.store)?)
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> Result<usize, TreeError> {
        Ok(self.store.count(&Filter::all())?)
    }

    pub fn is_empty(&self) -> Result<bool, TreeError> {
        Ok(self.len()? == 0)
    }

    /// Every node in depth-first order.
    pub fn nodes(&self) -> Result<Vec<Node>, TreeError> {
        Ok(self.store.find(&Filter::all(), Order::LeftAsc)?)
    }

    /// Ancestor chain of `id`, root first, including `id`.
    pub fn path(&self, id: NodeId) -> Result<Vec<Node>, TreeError> {
        let node = self.get(id)?;
        Ok(traverse::path(&self.store, &node)?)
    }

    /// Ancestors of `id`, root first.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<Node>, TreeError> {
        let node = self.get(id)?;
        Ok(traverse::ancestors(&self.store, &node)?)
    }

    /// Depth of `id` computed from containment.
    pub fn depth(&self, id: NodeId) -> Result<i64, TreeError> {
        let node = self.get(id)?;
        Ok(traverse::depth(&self.store, &node)?)
    }

    /// Number of nodes in the subtree at `id`, from its bounds alone.
    pub fn size(&self, id: NodeId) -> Result<i64, TreeError> {
        Ok(self.get(id)?.size())
    }

    pub fn subtree(&self, id: NodeId) -> Result<Vec<Node>, TreeError> {
        let node = self.get(id)?;
        Ok(traverse::subtree(&self.store, &node)?)
    }

    pub fn descendants(&self, id: NodeId) -> Result<Vec<Node>, TreeError> {
        let node = self.get(id)?;
        Ok(traverse::descendants(&self.store, &node)?)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<Node>, TreeError> {
        let node = self.get(id)?;
        Ok(traverse::parent(&self.store, &node)?)
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<Node>, TreeError> {
        let node = self.get(id)?;
        Ok(traverse::children(&self.store, &node)?)
    }

    pub fn siblings(&self, id: NodeId) -> Result<Vec<Node>, TreeError> {
        let node = self.get(id)?;
        Ok(traverse::siblings(&self.store, &node)?)
    }

    /// The subtree at `id` in depth-first order.
    pub fn preorder(&self, id: NodeId) -> Result<Vec<Node>, TreeError> {
        let node = self.get(id)?;
        Ok(traverse::preorder(&self.store, &node)?)
    }

    /// The subtree at `id` in breadth-first order.
    pub fn level_order(&self, id: NodeId) -> Result<Vec<Node>, TreeError> {
        let node = self.get(id)?;
        Ok(traverse::level_order(&self.store, &node)?)
    }

    /// True when `ancestor` strictly contains `descendant`.
    pub fn is_ancestor_of(&self, ancestor: NodeId, descendant: NodeId) -> Result<bool, TreeError> {
        Ok(self.get(ancestor)?.is_ancestor_of(&self.get(descendant)?))
    }

    pub fn is_descendant_of(&self, descendant: NodeId, ancestor: NodeId) -> Result<bool, TreeError> {
        self.is_ancestor_of(ancestor, descendant)
    }
}
