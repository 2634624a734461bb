//! Write-Ahead Log (WAL) for the durable row store.
//!
//! The log is an append-only sequence of records. A committed transaction
//! appears as one contiguous block: `Begin`, its row changes, `Commit`.
//! The whole block is written with a single `write_all` and synced before
//! the transaction is published in memory.
//!
//! # Log Record Format
//!
//! ```text
//! +----------+--------------------------------------------------+
//! | 0-3      | record_length (4 bytes, includes header+payload) |
//! | 4        | record_type (1 byte)                             |
//! | 5-12     | transaction_id (8 bytes)                         |
//! | 13-20    | lsn (8 bytes) - Log Sequence Number              |
//! | 21-N     | payload (variable, depends on type)              |
//! | N-N+3    | CRC32 checksum (4 bytes)                         |
//! +----------+--------------------------------------------------+
//! ```
//!
//! Row payloads (`Insert`, `Update`) are:
//!
//! ```text
//! id (8) | left (8) | right (8) | depth (8) | payload_length (4) | payload
//! ```
//!
//! All integers are little-endian.

// record_length fits in u32
#![allow(clippy::cast_possible_truncation)]

use std::fmt;
use std::io::Write;

use crate::node::{Node, NodeId};
use crate::store::table::RowChange;

/// Log record header size (before payload).
/// `record_length` (4) + `record_type` (1) + `txn_id` (8) + lsn (8) = 21 bytes
const RECORD_HEADER_SIZE: usize = 21;

/// CRC32 checksum size at end of record.
const CHECKSUM_SIZE: usize = 4;

/// Fixed part of an encoded row: id, left, right, depth, payload length.
const ROW_FIXED_SIZE: usize = 36;

/// Log Sequence Number - monotonically increasing identifier for log records.
pub type Lsn = u64;

/// Transaction identifier.
pub type TxnId = u64;

/// Log record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Transaction begin marker.
    Begin = 0x01,
    /// Row created.
    Insert = 0x02,
    /// Row replaced (full new image).
    Update = 0x03,
    /// Row deleted.
    Delete = 0x04,
    /// Transaction commit marker.
    Commit = 0x05,
    /// Checkpoint marker, first record of a compacted log.
    Checkpoint = 0x06,
}

impl TryFrom<u8> for LogRecordType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Begin),
            0x02 => Ok(Self::Insert),
            0x03 => Ok(Self::Update),
            0x04 => Ok(Self::Delete),
            0x05 => Ok(Self::Commit),
            0x06 => Ok(Self::Checkpoint),
            _ => Err(value),
        }
    }
}

/// Payload for different log record types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecordPayload {
    /// Begin transaction - no additional data.
    Begin,
    /// A created row.
    Insert(Node),
    /// The new image of a changed row.
    Update(Node),
    /// A deleted row.
    Delete(NodeId),
    /// Commit transaction - no additional data.
    Commit,
    /// Checkpoint marker.
    Checkpoint {
        /// Identifier the next created row will receive.
        next_id: u64,
        /// Number of rows in the snapshot that follows.
        row_count: u64,
    },
}

impl LogRecordPayload {
    /// Get the record type for this payload.
    #[must_use]
    pub const fn record_type(&self) -> LogRecordType {
        match self {
            Self::Begin => LogRecordType::Begin,
            Self::Insert(_) => LogRecordType::Insert,
            Self::Update(_) => LogRecordType::Update,
            Self::Delete(_) => LogRecordType::Delete,
            Self::Commit => LogRecordType::Commit,
            Self::Checkpoint { .. } => LogRecordType::Checkpoint,
        }
    }

    /// Serialize the payload to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Begin | Self::Commit => Vec::new(),
            Self::Insert(node) | Self::Update(node) => encode_row(node),
            Self::Delete(id) => id.0.to_le_bytes().to_vec(),
            Self::Checkpoint { next_id, row_count } => {
                let mut bytes = Vec::with_capacity(16);
                bytes.extend_from_slice(&next_id.to_le_bytes());
                bytes.extend_from_slice(&row_count.to_le_bytes());
                bytes
            }
        }
    }

    /// Deserialize a payload from bytes.
    pub fn from_bytes(record_type: LogRecordType, bytes: &[u8]) -> Result<Self, WalError> {
        match record_type {
            LogRecordType::Begin => Ok(Self::Begin),
            LogRecordType::Commit => Ok(Self::Commit),
            LogRecordType::Insert => Ok(Self::Insert(decode_row(bytes)?)),
            LogRecordType::Update => Ok(Self::Update(decode_row(bytes)?)),
            LogRecordType::Delete => Ok(Self::Delete(NodeId(read_u64(bytes, 0)?))),
            LogRecordType::Checkpoint => Ok(Self::Checkpoint {
                next_id: read_u64(bytes, 0)?,
                row_count: read_u64(bytes, 8)?,
            }),
        }
    }
}

impl From<RowChange> for LogRecordPayload {
    fn from(change: RowChange) -> Self {
        match change {
            RowChange::Insert(node) => Self::Insert(node),
            RowChange::Update(node) => Self::Update(node),
            RowChange::Delete(id) => Self::Delete(id),
        }
    }
}

/// A complete log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Transaction ID that wrote this record.
    pub txn_id: TxnId,
    /// Log Sequence Number (position in the log).
    pub lsn: Lsn,
    /// The record payload.
    pub payload: LogRecordPayload,
}

impl LogRecord {
    /// Create a new log record.
    #[must_use]
    pub const fn new(txn_id: TxnId, lsn: Lsn, payload: LogRecordPayload) -> Self {
        Self {
            txn_id,
            lsn,
            payload,
        }
    }

    /// Serialize this record to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload_bytes = self.payload.to_bytes();
        let total_len = RECORD_HEADER_SIZE + payload_bytes.len() + CHECKSUM_SIZE;

        let mut bytes = Vec::with_capacity(total_len);
        bytes.extend_from_slice(&(total_len as u32).to_le_bytes());
        bytes.push(self.payload.record_type() as u8);
        bytes.extend_from_slice(&self.txn_id.to_le_bytes());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&payload_bytes);

        // CRC32 checksum (4 bytes) - computed over everything before it
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());

        bytes
    }

    /// Deserialize a record from the front of `bytes`.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), WalError> {
        if bytes.len() < RECORD_HEADER_SIZE + CHECKSUM_SIZE {
            return Err(WalError::CorruptRecord);
        }

        let record_len = read_u32(bytes, 0)? as usize;
        if record_len < RECORD_HEADER_SIZE + CHECKSUM_SIZE || record_len > bytes.len() {
            return Err(WalError::CorruptRecord);
        }

        let stored_checksum = read_u32(bytes, record_len - CHECKSUM_SIZE)?;
        let computed_checksum = crc32fast::hash(&bytes[..record_len - CHECKSUM_SIZE]);
        if stored_checksum != computed_checksum {
            return Err(WalError::ChecksumMismatch {
                expected: stored_checksum,
                actual: computed_checksum,
            });
        }

        let record_type = LogRecordType::try_from(bytes[4]).map_err(WalError::InvalidRecordType)?;
        let txn_id = read_u64(bytes, 5)?;
        let lsn = read_u64(bytes, 13)?;
        let payload = LogRecordPayload::from_bytes(
            record_type,
            &bytes[RECORD_HEADER_SIZE..record_len - CHECKSUM_SIZE],
        )?;

        Ok((Self::new(txn_id, lsn, payload), record_len))
    }
}

/// Result of scanning a log image.
#[derive(Debug)]
pub struct LogScan {
    /// Every well-formed record, in log order.
    pub records: Vec<LogRecord>,
    /// Length of the well-formed prefix in bytes.
    pub valid_len: u64,
    /// Bytes after the well-formed prefix (a torn or corrupt tail).
    pub trailing_bytes: u64,
}

/// Parse records from the start of a log image.
///
/// Scanning stops at the first record that does not parse; everything from
/// there on is reported as trailing bytes. A crash during an append leaves
/// exactly such a tail.
#[must_use]
pub fn scan(bytes: &[u8]) -> LogScan {
    let mut records = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        match LogRecord::from_bytes(&bytes[offset..]) {
            Ok((record, consumed)) => {
                records.push(record);
                offset += consumed;
            }
            Err(e) => {
                tracing::warn!("WAL scan stopped at offset {offset}: {e}");
                break;
            }
        }
    }
    LogScan {
        records,
        valid_len: offset as u64,
        trailing_bytes: (bytes.len() - offset) as u64,
    }
}

/// Appends transactions to a log.
pub struct LogWriter<W: Write> {
    out: W,
    next_lsn: Lsn,
    next_txn_id: TxnId,
}

impl<W: Write> LogWriter<W> {
    /// Create a writer continuing after `next_lsn` and `next_txn_id`.
    #[must_use]
    pub const fn new(out: W, next_lsn: Lsn, next_txn_id: TxnId) -> Self {
        Self {
            out,
            next_lsn,
            next_txn_id,
        }
    }

    /// Get the next LSN that will be assigned.
    #[must_use]
    pub const fn next_lsn(&self) -> Lsn {
        self.next_lsn
    }

    /// Get the next transaction ID that will be assigned.
    #[must_use]
    pub const fn next_txn_id(&self) -> TxnId {
        self.next_txn_id
    }

    /// Access the underlying writer.
    pub const fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Encode a committed transaction without writing it.
    ///
    /// Returns the transaction ID and the encoded block. LSNs and the
    /// transaction ID are consumed only by [`Self::write_block`].
    #[must_use]
    pub fn encode_transaction(
        &self,
        payloads: impl IntoIterator<Item = LogRecordPayload>,
    ) -> (TxnId, Lsn, Vec<u8>) {
        let txn_id = self.next_txn_id;
        let mut lsn = self.next_lsn;
        let mut block = LogRecord::new(txn_id, lsn, LogRecordPayload::Begin).to_bytes();
        lsn += 1;
        for payload in payloads {
            block.extend_from_slice(&LogRecord::new(txn_id, lsn, payload).to_bytes());
            lsn += 1;
        }
        block.extend_from_slice(&LogRecord::new(txn_id, lsn, LogRecordPayload::Commit).to_bytes());
        (txn_id, lsn + 1, block)
    }

    /// Write an encoded block and advance the counters.
    pub fn write_block(&mut self, txn_id: TxnId, next_lsn: Lsn, block: &[u8]) -> Result<(), WalError> {
        self.out.write_all(block).map_err(WalError::Io)?;
        self.out.flush().map_err(WalError::Io)?;
        self.next_txn_id = txn_id + 1;
        self.next_lsn = next_lsn;
        Ok(())
    }

    /// Encode and write one committed transaction.
    pub fn append_transaction(
        &mut self,
        payloads: impl IntoIterator<Item = LogRecordPayload>,
    ) -> Result<TxnId, WalError> {
        let (txn_id, next_lsn, block) = self.encode_transaction(payloads);
        self.write_block(txn_id, next_lsn, &block)?;
        Ok(txn_id)
    }
}

/// Encode a row as a WAL payload.
#[must_use]
pub fn encode_row(node: &Node) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ROW_FIXED_SIZE + node.payload.len());
    bytes.extend_from_slice(&node.id.0.to_le_bytes());
    bytes.extend_from_slice(&node.left.to_le_bytes());
    bytes.extend_from_slice(&node.right.to_le_bytes());
    bytes.extend_from_slice(&node.depth.to_le_bytes());
    bytes.extend_from_slice(&(node.payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&node.payload);
    bytes
}

/// Decode a row from a WAL payload.
pub fn decode_row(bytes: &[u8]) -> Result<Node, WalError> {
    let id = NodeId(read_u64(bytes, 0)?);
    let left = read_i64(bytes, 8)?;
    let right = read_i64(bytes, 16)?;
    let depth = read_i64(bytes, 24)?;
    let payload_len = read_u32(bytes, 32)? as usize;
    let payload = bytes
        .get(ROW_FIXED_SIZE..ROW_FIXED_SIZE + payload_len)
        .ok_or(WalError::CorruptRecord)?
        .to_vec();
    Ok(Node {
        id,
        left,
        right,
        depth,
        payload,
    })
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N], WalError> {
    bytes
        .get(offset..offset + N)
        .and_then(|slice| <[u8; N]>::try_from(slice).ok())
        .ok_or(WalError::CorruptRecord)
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, WalError> {
    read_array(bytes, offset).map(u32::from_le_bytes)
}

fn read_u64(bytes: &[u8], offset: usize) -> Result<u64, WalError> {
    read_array(bytes, offset).map(u64::from_le_bytes)
}

fn read_i64(bytes: &[u8], offset: usize) -> Result<i64, WalError> {
    read_array(bytes, offset).map(i64::from_le_bytes)
}

/// Errors that can occur during WAL operations.
#[derive(Debug)]
pub enum WalError {
    /// I/O error.
    Io(std::io::Error),
    /// Record is corrupt or truncated.
    CorruptRecord,
    /// Checksum mismatch.
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },
    /// Invalid record type.
    InvalidRecordType(u8),
}

impl fmt::Display for WalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "WAL I/O error: {e}"),
            Self::CorruptRecord => write!(f, "corrupt WAL record"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(
                    f,
                    "WAL checksum mismatch: expected {expected:#x}, got {actual:#x}"
                )
            }
            Self::InvalidRecordType(t) => write!(f, "invalid WAL record type: {t:#x}"),
        }
    }
}

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}
