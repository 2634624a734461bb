//! Crash recovery for the durable row store.
//!
//! Recovery rebuilds the in-memory table from the log image.
//!
//! # Recovery Process
//!
//! 1. Scan well-formed records; stop at the first torn or corrupt record
//! 2. Group records by transaction
//! 3. Replay transactions that reached their COMMIT record, in commit order
//! 4. Discard transactions without a COMMIT record
//!
//! A transaction is appended as one block, so at most the last transaction
//! in the log can be incomplete.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::node::{Node, NodeId};
use crate::store::table::Table;
use crate::store::wal::{self, LogRecordPayload, Lsn, TxnId};

/// Result of a recovery operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of WAL records scanned.
    pub records_scanned: usize,

    /// Number of committed transactions replayed.
    pub transactions_replayed: usize,

    /// Number of uncommitted transactions discarded.
    pub transactions_discarded: usize,

    /// Number of row operations applied (inserts, updates, deletes).
    pub operations_applied: usize,

    /// Highest LSN seen during recovery.
    pub recovered_lsn: Lsn,

    /// Next transaction ID to assign.
    pub next_txn_id: TxnId,

    /// Length of the well-formed log prefix.
    pub valid_len: u64,

    /// Bytes after the well-formed prefix, dropped by recovery.
    pub truncated_bytes: u64,
}

impl RecoveryResult {
    /// Next LSN to assign.
    #[must_use]
    pub const fn next_lsn(&self) -> Lsn {
        if self.records_scanned == 0 {
            0
        } else {
            self.recovered_lsn + 1
        }
    }
}

/// Operations of a transaction being replayed.
#[derive(Debug, Default)]
struct PendingTransaction {
    operations: Vec<LogRecordPayload>,
}

/// Rebuild a table from a log image.
pub fn recover(bytes: &[u8]) -> Result<(Table, RecoveryResult), RecoveryError> {
    let log = wal::scan(bytes);
    let records_scanned = log.records.len();

    let mut rows: BTreeMap<NodeId, Node> = BTreeMap::new();
    let mut pending: HashMap<TxnId, PendingTransaction> = HashMap::new();
    let mut next_id = 1;
    let mut highest_lsn: Lsn = 0;
    let mut max_txn_id: TxnId = 0;
    let mut transactions_replayed = 0;
    let mut operations_applied = 0;

    for record in log.records {
        highest_lsn = highest_lsn.max(record.lsn);
        max_txn_id = max_txn_id.max(record.txn_id);

        match record.payload {
            LogRecordPayload::Begin => {
                pending.insert(record.txn_id, PendingTransaction::default());
            }
            LogRecordPayload::Insert(_)
            | LogRecordPayload::Update(_)
            | LogRecordPayload::Delete(_) => {
                let txn = pending
                    .get_mut(&record.txn_id)
                    .ok_or(RecoveryError::OrphanRecord(record.txn_id))?;
                txn.operations.push(record.payload);
            }
            LogRecordPayload::Commit => {
                let txn = pending
                    .remove(&record.txn_id)
                    .ok_or(RecoveryError::OrphanRecord(record.txn_id))?;
                for operation in txn.operations {
                    apply(&mut rows, &mut next_id, operation)?;
                    operations_applied += 1;
                }
                transactions_replayed += 1;
            }
            LogRecordPayload::Checkpoint {
                next_id: checkpoint_next_id,
                ..
            } => {
                next_id = next_id.max(checkpoint_next_id);
            }
        }
    }

    let result = RecoveryResult {
        records_scanned,
        transactions_replayed,
        transactions_discarded: pending.len(),
        operations_applied,
        recovered_lsn: highest_lsn,
        next_txn_id: max_txn_id + 1,
        valid_len: log.valid_len,
        truncated_bytes: log.trailing_bytes,
    };

    Ok((Table::from_parts(rows, next_id), result))
}

fn apply(
    rows: &mut BTreeMap<NodeId, Node>,
    next_id: &mut u64,
    operation: LogRecordPayload,
) -> Result<(), RecoveryError> {
    match operation {
        LogRecordPayload::Insert(node) => {
            *next_id = (*next_id).max(node.id.0 + 1);
            if rows.insert(node.id, node).is_some() {
                return Err(RecoveryError::DuplicateRow);
            }
        }
        LogRecordPayload::Update(node) => {
            let row = rows
                .get_mut(&node.id)
                .ok_or(RecoveryError::MissingRow(node.id))?;
            *row = node;
        }
        LogRecordPayload::Delete(id) => {
            rows.remove(&id).ok_or(RecoveryError::MissingRow(id))?;
        }
        LogRecordPayload::Begin
        | LogRecordPayload::Commit
        | LogRecordPayload::Checkpoint { .. } => {}
    }
    Ok(())
}

/// Errors that can occur during recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    /// A row operation or commit without a preceding BEGIN.
    OrphanRecord(TxnId),
    /// An update or delete of a row that does not exist.
    MissingRow(NodeId),
    /// An insert of a row that already exists.
    DuplicateRow,
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrphanRecord(txn_id) => {
                write!(f, "recovery found a record without begin for txn {txn_id}")
            }
            Self::MissingRow(id) => write!(f, "recovery found a change to missing row {id}"),
            Self::DuplicateRow => write!(f, "recovery found a duplicate insert"),
        }
    }
}

impl std::error::Error for RecoveryError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RowReader;
    use crate::store::wal::{LogRecord, LogWriter};

    fn leaf(id: u64, left: i64) -> Node {
        Node {
            id: NodeId(id),
            left,
            right: left + 1,
            depth: 0,
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_recover_empty_log() {
        let (table, result) = recover(&[]).expect("recover");
        assert!(table.is_empty());
        assert_eq!(result.records_scanned, 0);
        assert_eq!(result.next_lsn(), 0);
        assert_eq!(result.next_txn_id, 1);
    }

    #[test]
    fn test_recover_replays_committed_transactions() {
        let mut writer = LogWriter::new(Vec::new(), 0, 1);
        writer
            .append_transaction([LogRecordPayload::Insert(leaf(1, 0))])
            .expect("append");
        let mut moved = leaf(1, 0);
        moved.right = 3;
        writer
            .append_transaction([
                LogRecordPayload::Update(moved.clone()),
                LogRecordPayload::Insert(leaf(2, 1)),
            ])
            .expect("append");

        let (table, result) = recover(writer.get_mut()).expect("recover");
        assert_eq!(result.transactions_replayed, 2);
        assert_eq!(result.operations_applied, 3);
        assert_eq!(result.next_txn_id, 3);
        assert_eq!(result.next_lsn(), 7);
        assert_eq!(table.get(NodeId(1)).expect("get"), Some(moved));
        assert_eq!(table.next_id(), 3);
    }

    #[test]
    fn test_recover_discards_uncommitted_transaction() {
        let mut writer = LogWriter::new(Vec::new(), 0, 1);
        writer
            .append_transaction([LogRecordPayload::Insert(leaf(1, 0))])
            .expect("append");
        let mut bytes = writer.get_mut().clone();
        bytes.extend_from_slice(&LogRecord::new(2, 3, LogRecordPayload::Begin).to_bytes());
        bytes.extend_from_slice(
            &LogRecord::new(2, 4, LogRecordPayload::Delete(NodeId(1))).to_bytes(),
        );

        let (table, result) = recover(&bytes).expect("recover");
        assert_eq!(result.transactions_replayed, 1);
        assert_eq!(result.transactions_discarded, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_recover_reports_torn_tail() {
        let mut writer = LogWriter::new(Vec::new(), 0, 1);
        writer
            .append_transaction([LogRecordPayload::Insert(leaf(1, 0))])
            .expect("append");
        let good_len = writer.get_mut().len() as u64;
        writer
            .append_transaction([LogRecordPayload::Insert(leaf(2, 2))])
            .expect("append");
        let bytes = writer.get_mut().clone();
        let torn = &bytes[..bytes.len() - 2];

        let (table, result) = recover(torn).expect("recover");
        assert_eq!(table.len(), 1);
        assert_eq!(result.transactions_discarded, 1);
        assert!(result.valid_len > good_len);
        assert!(result.truncated_bytes > 0);
    }

    #[test]
    fn test_checkpoint_preserves_next_id() {
        let writer = LogWriter::new(Vec::new(), 1, 1);
        let mut bytes = LogRecord::new(
            0,
            0,
            LogRecordPayload::Checkpoint {
                next_id: 40,
                row_count: 1,
            },
        )
        .to_bytes();
        let (_, _, block) = writer.encode_transaction([LogRecordPayload::Insert(leaf(3, 0))]);
        bytes.extend_from_slice(&block);

        let (table, _) = recover(&bytes).expect("recover");
        assert_eq!(table.next_id(), 40);
    }

    #[test]
    fn test_orphan_record_is_an_error() {
        let bytes = LogRecord::new(9, 0, LogRecordPayload::Commit).to_bytes();
        assert_eq!(
            recover(&bytes).map(|_| ()),
            Err(RecoveryError::OrphanRecord(9))
        );
    }

    #[test]
    fn test_delete_of_missing_row_is_an_error() {
        let mut writer = LogWriter::new(Vec::new(), 0, 1);
        writer
            .append_transaction([LogRecordPayload::Delete(NodeId(5))])
            .expect("append");
        assert_eq!(
            recover(writer.get_mut()).map(|_| ()),
            Err(RecoveryError::MissingRow(NodeId(5)))
        );
    }
}
