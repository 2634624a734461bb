//! Row store boundary.
//!
//! The tree core never touches storage directly. It talks to a row store
//! through three traits:
//!
//! - [`RowReader`]: fetch by id, fetch by predicate.
//! - [`RowTransaction`]: create, delete by predicate, and the one bulk
//!   conditional update that relocates every matching row as a function of
//!   its own bounds. Changes become visible only on `commit`.
//! - [`RowStore`]: begins transactions.
//!
//! Two stores ship with the crate:
//!
//! - [`Table`]: rows in memory, transactions as private working copies.
//! - [`Database`]: a `Table` whose commits are made durable in a
//!   write-ahead log before they are published.
//!
//! # Schema contract
//!
//! Every store enforces, at commit time, `left < right` for each row and
//! uniqueness of both `left` and `right` across rows. Inside a transaction
//! these may be transiently violated.

mod database;
pub mod filter;
mod recovery;
mod table;
pub mod wal;

use std::fmt;

use crate::node::{NewRow, Node, NodeId};

pub use database::{Database, DatabaseTransaction};
pub use filter::{Cmp, Condition, Field, Filter, Order};
pub use recovery::{RecoveryError, RecoveryResult, recover};
pub use table::{RowChange, Table, TableTransaction};
pub use wal::WalError;

/// New structural values for one row, produced by a bulk update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub left: i64,
    pub right: i64,
    pub depth: i64,
}

/// Read access to rows.
pub trait RowReader {
    /// Fetch a row by identifier.
    fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError>;

    /// Fetch every row matching `filter`, sorted by `order`.
    fn find(&self, filter: &Filter, order: Order) -> Result<Vec<Node>, StoreError>;

    /// Count rows matching `filter`.
    fn count(&self, filter: &Filter) -> Result<usize, StoreError> {
        Ok(self.find(filter, Order::Unordered)?.len())
    }
}

/// A single atomic unit of work against a row store.
///
/// Reads inside a transaction observe its own writes. Dropping a
/// transaction without calling `commit` discards it.
pub trait RowTransaction: RowReader {
    /// Create a row. The store assigns the identifier.
    fn create(&mut self, row: NewRow) -> Result<Node, StoreError>;

    /// Delete every row matching `filter`. Returns the number deleted.
    fn delete(&mut self, filter: &Filter) -> Result<usize, StoreError>;

    /// Bulk conditional update.
    ///
    /// For every row matching `filter`, `relocate` is called with the row's
    /// current values. `Some` replaces the row's bounds and depth, `None`
    /// leaves it unchanged. Returns the number of rows replaced.
    fn update(
        &mut self,
        filter: &Filter,
        relocate: &dyn Fn(&Node) -> Option<Relocation>,
    ) -> Result<usize, StoreError>;

    /// Make every change visible atomically, or none of them.
    fn commit(self) -> Result<(), StoreError>;

    /// Discard every change.
    fn abort(self);
}

/// A store of rows that can begin transactions.
pub trait RowStore: RowReader {
    /// The transaction type of this store.
    type Transaction<'a>: RowTransaction
    where
        Self: 'a;

    /// Begin a transaction.
    ///
    /// Only one transaction can be active at a time; the exclusive borrow
    /// enforces it.
    fn begin(&mut self) -> Result<Self::Transaction<'_>, StoreError>;
}

/// Errors that can occur in a row store.
#[derive(Debug)]
pub enum StoreError {
    /// File I/O error.
    Io(std::io::Error),
    /// Write-ahead log error.
    Wal(WalError),
    /// Crash recovery error.
    Recovery(RecoveryError),
    /// Two rows share a value in a unique column.
    UniqueViolation {
        /// The column.
        field: Field,
        /// The duplicated value.
        value: i64,
    },
    /// A row with `left >= right`.
    InvalidBounds {
        /// The offending row.
        id: NodeId,
        /// Its left bound.
        left: i64,
        /// Its right bound.
        right: i64,
    },
    /// The store refused to commit.
    CommitFailed(String),
    /// A lock guarding the store was poisoned.
    LockPoisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Wal(e) => write!(f, "WAL error: {e}"),
            Self::Recovery(e) => write!(f, "recovery error: {e}"),
            Self::UniqueViolation { field, value } => {
                write!(f, "unique constraint violated: {} = {value}", field.name())
            }
            Self::InvalidBounds { id, left, right } => {
                write!(f, "row {id} has invalid bounds [{left}, {right}]")
            }
            Self::CommitFailed(reason) => write!(f, "commit failed: {reason}"),
            Self::LockPoisoned => write!(f, "store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Wal(e) => Some(e),
            Self::Recovery(e) => Some(e),
            Self::UniqueViolation { .. }
            | Self::InvalidBounds { .. }
            | Self::CommitFailed(_)
            | Self::LockPoisoned => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<WalError> for StoreError {
    fn from(e: WalError) -> Self {
        Self::Wal(e)
    }
}

impl From<RecoveryError> for StoreError {
    fn from(e: RecoveryError) -> Self {
        Self::Recovery(e)
    }
}
