use std::sync::Arc;

use arrow::record_batch::RecordBatch;

use super::{LoadRow, RowCursor, RunId, SortedRowSource};
use crate::{
    datum::decode_batch,
    desc::{ColumnDesc, LobMetaLayout},
    error::SourceError,
    lob_id::LobId,
    piece::PieceHeader,
};

/// Immutable sorted run held in memory.
///
/// Keys are decoded once at construction; cursors share the rows through an
/// `Arc` and never copy them.
#[derive(Debug, Clone)]
pub struct MemSortedRun {
    inner: Arc<RunInner>,
}

#[derive(Debug)]
struct RunInner {
    id: RunId,
    rows: Vec<LoadRow>,
    keys: Vec<(LobId, u32)>,
}

impl MemSortedRun {
    /// Build a run from rows already ordered by (lob id, seq).
    ///
    /// # Errors
    /// Returns [`SourceError::Unsorted`] if any row sorts before its
    /// predecessor and [`SourceError::Decode`] if a row has no readable key.
    pub fn new(id: RunId, rows: Vec<LoadRow>, layout: &LobMetaLayout) -> Result<Self, SourceError> {
        let mut keys = Vec::with_capacity(rows.len());
        for load in &rows {
            let header = PieceHeader::decode(&load.row, layout)
                .map_err(|err| SourceError::decode(format!("run {id}"), err.to_string()))?;
            if keys.last().is_some_and(|prev| *prev > header.key()) {
                return Err(SourceError::Unsorted { run: id });
            }
            keys.push(header.key());
        }
        Ok(Self {
            inner: Arc::new(RunInner { id, rows, keys }),
        })
    }

    /// Build a run of insert rows from one Arrow batch.
    pub fn from_batch(
        id: RunId,
        batch: &RecordBatch,
        columns: &[ColumnDesc],
        layout: &LobMetaLayout,
    ) -> Result<Self, SourceError> {
        let rows = decode_batch(batch, columns, &format!("run {id}"))?
            .into_iter()
            .map(LoadRow::insert)
            .collect();
        Self::new(id, rows, layout)
    }

    pub fn len(&self) -> usize {
        self.inner.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.rows.is_empty()
    }
}

impl SortedRowSource for MemSortedRun {
    fn run_id(&self) -> RunId {
        self.inner.id
    }

    fn lob_id_bounds(&self) -> Option<(LobId, LobId)> {
        let first = self.inner.keys.first()?;
        let last = self.inner.keys.last()?;
        Some((first.0, last.0))
    }

    fn open_cursor(&self) -> Result<Box<dyn RowCursor>, SourceError> {
        Ok(Box::new(MemRunCursor {
            inner: Arc::clone(&self.inner),
            pos: 0,
        }))
    }
}

struct MemRunCursor {
    inner: Arc<RunInner>,
    pos: usize,
}

impl RowCursor for MemRunCursor {
    fn next_row(&mut self) -> Result<Option<LoadRow>, SourceError> {
        let row = self.inner.rows.get(self.pos).cloned();
        if row.is_some() {
            self.pos += 1;
        }
        Ok(row)
    }

    fn seek(&mut self, target: LobId) -> Result<(), SourceError> {
        let rest = &self.inner.keys[self.pos..];
        self.pos += rest.partition_point(|(id, _)| *id < target);
        Ok(())
    }
}
