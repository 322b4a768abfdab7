use arrow::datatypes::DataType;
use thiserror::Error;

use crate::{desc::TabletId, lob_id::LobId, source::RunId};

/// Error returned by the LOB meta merge-scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Invalid or missing initialization parameters.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// I/O or decode failure from the origin table or a sorted run.
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    /// Load invariant broken; the partition's scan cannot produce a valid result.
    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityError),
}

impl ScanError {
    /// Whether this error reports corrupted load invariants.
    pub fn is_integrity(&self) -> bool {
        matches!(self, ScanError::Integrity(_))
    }
}

impl From<ConflictError> for ScanError {
    fn from(err: ConflictError) -> Self {
        ScanError::Integrity(IntegrityError::Conflict(err))
    }
}

/// Errors detected synchronously while initializing an iterator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("table data descriptor has no datum comparator")]
    MissingComparator,
    #[error("column descriptors were not supplied")]
    MissingColumns,
    #[error("no conflict handler configured")]
    MissingConflictHandler,
    #[error("origin table handle is invalid")]
    InvalidOriginTable,
    #[error("primary-key range start is greater than its end")]
    MalformedRange,
    #[error("layout column `{role}` at index {index} is out of bounds for {columns} columns")]
    LayoutOutOfBounds {
        role: &'static str,
        index: usize,
        columns: usize,
    },
    #[error("layout column `{role}` has type {actual:?}, expected {expected}")]
    LayoutType {
        role: &'static str,
        expected: &'static str,
        actual: DataType,
    },
}

/// Failures reading rows out of a collaborator; propagated verbatim.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode row from {origin}: {reason}")]
    Decode { origin: String, reason: String },
    #[error("sorted run {run} is not ordered by (lob id, sequence)")]
    Unsorted { run: RunId },
}

impl SourceError {
    pub(crate) fn decode(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        SourceError::Decode {
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}

/// Violations of the direct-load LOB invariants. Always fatal to the scan.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("malformed lob id in {context}: {value}")]
    MalformedLobId { context: &'static str, value: String },
    #[error("lob id {lob_id} ended with {observed} of {expected} pieces before lob id {next}")]
    IncompleteAtBoundary {
        lob_id: LobId,
        observed: u32,
        expected: u32,
        next: LobId,
    },
    #[error("lob id {lob_id} ended with {observed} of {expected} pieces at end of data")]
    IncompleteAtEnd {
        lob_id: LobId,
        observed: u32,
        expected: u32,
    },
    #[error("lob id {lob_id} piece {seq} is outside its declared count {expected}")]
    PieceOutOfRange { lob_id: LobId, seq: u32, expected: u32 },
    #[error("lob id {lob_id} declares {first} pieces but a later piece declares {other}")]
    PieceCountMismatch { lob_id: LobId, first: u32, other: u32 },
    #[error("lob id {lob_id} received an extra piece {seq} after completing")]
    ExcessPiece { lob_id: LobId, seq: u32 },
    #[error("lob id {lob_id} declares zero pieces")]
    ZeroPieces { lob_id: LobId },
    #[error("lob id {lob_id} expected piece {expected} next but got piece {actual}")]
    SequenceGap {
        lob_id: LobId,
        expected: u32,
        actual: u32,
    },
    #[error("lob id {lob_id} piece {seq} declares {declared} bytes but carries {actual}")]
    ByteLenMismatch {
        lob_id: LobId,
        seq: u32,
        declared: u64,
        actual: u64,
    },
    #[error("lob id {lob_id} total length overflows u64")]
    ByteLenOverflow { lob_id: LobId },
    #[error("sorted run {run} went backwards: {prev:?} then {next:?}")]
    OutOfOrder {
        run: RunId,
        prev: (LobId, u32),
        next: (LobId, u32),
    },
    #[error("lob id {lob_id} is referenced by the origin table but no pieces were merged")]
    MissingLob { lob_id: LobId },
    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),
}

/// Error raised by a conflict handler that refuses a row notification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConflictError {
    #[error("unexpected {op} notification for tablet {tablet}")]
    UnexpectedRow { tablet: TabletId, op: ConflictOp },
}

/// Notification kinds of [`crate::handler::DmlRowHandler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictOp {
    Insert,
    InsertBatch,
    Delete,
    Update,
    DuplicateInsert,
    OriginUpdate,
}

impl std::fmt::Display for ConflictOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConflictOp::Insert => "insert",
            ConflictOp::InsertBatch => "insert-batch",
            ConflictOp::Delete => "delete",
            ConflictOp::Update => "update",
            ConflictOp::DuplicateInsert => "duplicate-insert",
            ConflictOp::OriginUpdate => "origin-update",
        };
        f.write_str(name)
    }
}
