//! Sorted row sources: persisted runs of LOB meta rows in (lob id, seq) order.
//!
//! A run is read-only and may be shared by several scans; every scan opens
//! its own [`RowCursor`] and owns it exclusively until the scan closes.

mod mem;

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use ulid::{Generator, Ulid};

pub use self::mem::MemSortedRun;
use crate::{datum::DatumRow, error::SourceError, lob_id::LobId};

/// Identifier of one persisted sorted run.
pub type RunId = Ulid;

/// Shared handle to a sorted run, as passed to the merge.
pub type SortedRunHandle = Arc<dyn SortedRowSource>;

/// Thread-safe ULID generator for run identifiers.
///
/// Concurrent upstream writers share one generator per load job so run ids
/// stay unique and time ordered.
pub struct RunIdGenerator {
    inner: Mutex<Generator>,
}

impl RunIdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    /// Produce the next [`RunId`] in a monotonic, time-ordered sequence.
    pub fn generate(&self) -> RunId {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // The monotonic generator only fails once the random part of the
        // current millisecond is exhausted; a fresh id is still unique.
        guard.generate().unwrap_or_else(|_| Ulid::new())
    }
}

impl Default for RunIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunIdGenerator").finish_non_exhaustive()
    }
}

/// What a physical row asks the load to do with its key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RowKind {
    #[default]
    Insert,
    Update,
    Delete,
}

/// Physical row produced by a sorted run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRow {
    pub row: DatumRow,
    pub kind: RowKind,
}

impl LoadRow {
    pub fn insert(row: DatumRow) -> Self {
        Self {
            row,
            kind: RowKind::Insert,
        }
    }

    pub fn with_kind(row: DatumRow, kind: RowKind) -> Self {
        Self { row, kind }
    }
}

/// Read-only handle to one persisted sorted run.
pub trait SortedRowSource: Send + Sync {
    fn run_id(&self) -> RunId;

    /// Smallest and largest lob id stored in the run, `None` when empty.
    fn lob_id_bounds(&self) -> Option<(LobId, LobId)>;

    /// Open an independent forward cursor positioned before the first row.
    fn open_cursor(&self) -> Result<Box<dyn RowCursor>, SourceError>;
}

/// Forward cursor over a sorted run.
pub trait RowCursor: Send {
    /// Next row in (lob id, seq) order, `None` once the run is exhausted.
    fn next_row(&mut self) -> Result<Option<LoadRow>, SourceError>;

    /// Skip ahead so the next row returned has a lob id of at least `target`.
    ///
    /// A cursor that cannot seek may leave its position unchanged; callers
    /// still discard rows below `target` themselves.
    fn seek(&mut self, _target: LobId) -> Result<(), SourceError> {
        Ok(())
    }
}
