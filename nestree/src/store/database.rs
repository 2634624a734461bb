//! Durable row store.
//!
//! A [`Database`] keeps committed rows in a [`Table`] and makes each commit
//! durable in a write-ahead log file before publishing it:
//!
//! 1. validate the schema constraints on the transaction's working copy
//! 2. append the row diff as one `Begin .. Commit` block and fsync
//! 3. swap the working copy into the table
//!
//! If step 2 fails, the log is truncated back to its previous length and the
//! table is untouched.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::node::{NewRow, Node, NodeId};
use crate::store::recovery::{RecoveryResult, recover};
use crate::store::table::{Table, TableTransaction};
use crate::store::wal::{LogRecord, LogRecordPayload, LogWriter};
use crate::store::{
    Filter, Order, Relocation, RowReader, RowStore, RowTransaction, StoreError,
};

/// A durable row store backed by a single log file.
pub struct Database {
    path: PathBuf,
    table: Table,
    log: LogWriter<File>,
    log_len: u64,
}

impl Database {
    /// Create a new database at the given path.
    ///
    /// The path must not already exist.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create_new(true)
            .open(path)?;
        file.sync_all()?;
        tracing::info!("Created database at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            table: Table::new(),
            log: LogWriter::new(file, 0, 1),
            log_len: 0,
        })
    }

    /// Open an existing database, replaying its log.
    ///
    /// A torn tail left by a crash during an append is cut off.
    pub fn open(path: &Path) -> Result<(Self, RecoveryResult), StoreError> {
        let mut file = OpenOptions::new().read(true).append(true).open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let (table, result) = recover(&bytes)?;
        if result.truncated_bytes > 0 {
            tracing::warn!(
                "Truncating {} trailing bytes from {}",
                result.truncated_bytes,
                path.display()
            );
            file.set_len(result.valid_len)?;
            file.sync_all()?;
        }

        tracing::info!(
            "Opened database at {}: {} rows, {} records scanned, {} transactions replayed, {} discarded",
            path.display(),
            table.len(),
            result.records_scanned,
            result.transactions_replayed,
            result.transactions_discarded
        );

        let database = Self {
            path: path.to_path_buf(),
            table,
            log: LogWriter::new(file, result.next_lsn(), result.next_txn_id),
            log_len: result.valid_len,
        };
        Ok((database, result))
    }

    /// Open an existing database or create a new one if it doesn't exist.
    pub fn open_or_create(path: &Path) -> Result<(Self, Option<RecoveryResult>), StoreError> {
        if path.exists() {
            let (database, result) = Self::open(path)?;
            Ok((database, Some(result)))
        } else {
            Ok((Self::create(path)?, None))
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of committed rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when there are no committed rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Current size of the log file in bytes.
    #[must_use]
    pub const fn log_len(&self) -> u64 {
        self.log_len
    }

    /// Compact the log to a single snapshot of the committed rows.
    ///
    /// The snapshot is written to a sibling file and renamed over the log,
    /// so a crash leaves either the old or the new log in place.
    pub fn checkpoint(&mut self) -> Result<(), StoreError> {
        let tmp_path = self.path.with_extension("checkpoint");
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .truncate(false)
            .open(&tmp_path)?;
        file.set_len(0)?;

        let row_count = self.table.len() as u64;
        let mut bytes = LogRecord::new(
            0,
            0,
            LogRecordPayload::Checkpoint {
                next_id: self.table.next_id(),
                row_count,
            },
        )
        .to_bytes();

        let mut writer = LogWriter::new(Vec::new(), 1, 1);
        writer.append_transaction(
            self.table
                .rows()
                .map(|row| LogRecordPayload::Insert(row.clone())),
        )?;
        bytes.extend_from_slice(writer.get_mut());

        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;

        self.log = LogWriter::new(file, writer.next_lsn(), writer.next_txn_id());
        self.log_len = bytes.len() as u64;
        tracing::info!(
            "Checkpointed {} rows into {} ({} bytes)",
            row_count,
            self.path.display(),
            self.log_len
        );
        Ok(())
    }
}

impl RowReader for Database {
    fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        self.table.get(id)
    }

    fn find(&self, filter: &Filter, order: Order) -> Result<Vec<Node>, StoreError> {
        self.table.find(filter, order)
    }
}

impl RowStore for Database {
    type Transaction<'a> = DatabaseTransaction<'a>;

    fn begin(&mut self) -> Result<DatabaseTransaction<'_>, StoreError> {
        Ok(DatabaseTransaction {
            inner: TableTransaction::new(&mut self.table),
            log: &mut self.log,
            log_len: &mut self.log_len,
        })
    }
}

/// A transaction against a [`Database`].
pub struct DatabaseTransaction<'a> {
    inner: TableTransaction<'a>,
    log: &'a mut LogWriter<File>,
    log_len: &'a mut u64,
}

impl RowReader for DatabaseTransaction<'_> {
    fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        self.inner.get(id)
    }

    fn find(&self, filter: &Filter, order: Order) -> Result<Vec<Node>, StoreError> {
        self.inner.find(filter, order)
    }
}

impl RowTransaction for DatabaseTransaction<'_> {
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
        self.inner.validate()?;

        let changes = self.inner.changes();
        if !changes.is_empty() {
            let (txn_id, next_lsn, block) = self
                .log
                .encode_transaction(changes.into_iter().map(LogRecordPayload::from));
            let written = self
                .log
                .write_block(txn_id, next_lsn, &block)
                .map_err(StoreError::from)
                .and_then(|()| self.log.get_mut().sync_data().map_err(StoreError::from));
            if let Err(e) = written {
                // Drop whatever part of the block reached the file.
                if let Err(truncate_error) = self.log.get_mut().set_len(*self.log_len) {
                    tracing::error!("Failed to truncate WAL after write error: {truncate_error}");
                }
                return Err(e);
            }
            *self.log_len += block.len() as u64;
            tracing::debug!("Committed txn {txn_id} ({} bytes)", block.len());
        }

        self.inner.publish();
        Ok(())
    }

    fn abort(self) {
        self.inner.abort();
    }
}
