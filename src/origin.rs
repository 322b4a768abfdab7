//! The origin table: the partition's on-disk state before the current load.

use std::{ops::Bound, sync::Arc};

use arrow::record_batch::RecordBatch;

use crate::{
    datum::{decode_batch, DatumRange, DatumRow},
    desc::{ColumnDesc, DatumComparator},
    error::SourceError,
};

/// Range-scannable view of the pre-load table, ordered by primary key.
pub trait OriginTable {
    /// Whether the handle refers to an opened table.
    fn is_valid(&self) -> bool;

    /// Open a forward scan over the rows whose primary key lies in `range`.
    fn scan(&self, range: &DatumRange) -> Result<Box<dyn OriginScanner + '_>, SourceError>;
}

/// Forward cursor produced by [`OriginTable::scan`].
pub trait OriginScanner {
    fn next_row(&mut self) -> Result<Option<DatumRow>, SourceError>;
}

/// Origin table held in memory, sorted by its comparator at construction.
#[derive(Clone, Debug)]
pub struct MemOriginTable {
    rows: Arc<[DatumRow]>,
    comparator: DatumComparator,
    valid: bool,
}

impl MemOriginTable {
    pub fn new(mut rows: Vec<DatumRow>, comparator: DatumComparator) -> Self {
        rows.sort_by(|a, b| comparator.compare(a, b));
        Self {
            rows: rows.into(),
            comparator,
            valid: true,
        }
    }

    /// Table with no rows.
    pub fn empty(comparator: DatumComparator) -> Self {
        Self::new(Vec::new(), comparator)
    }

    /// Handle that was never opened; rejected at iterator initialization.
    pub fn invalid(comparator: DatumComparator) -> Self {
        Self {
            valid: false,
            ..Self::empty(comparator)
        }
    }

    pub fn from_batch(
        batch: &RecordBatch,
        columns: &[ColumnDesc],
        comparator: DatumComparator,
    ) -> Result<Self, SourceError> {
        let rows = decode_batch(batch, columns, "origin table")?;
        Ok(Self::new(rows, comparator))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn lower_index(&self, start: &Bound<DatumRow>) -> usize {
        let cmp = &self.comparator;
        match start {
            Bound::Unbounded => 0,
            Bound::Included(key) => self
                .rows
                .partition_point(|row| cmp.compare(row, key).is_lt()),
            Bound::Excluded(key) => self
                .rows
                .partition_point(|row| cmp.compare(row, key).is_le()),
        }
    }
}

impl OriginTable for MemOriginTable {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn scan(&self, range: &DatumRange) -> Result<Box<dyn OriginScanner + '_>, SourceError> {
        if !self.valid {
            return Err(SourceError::decode(
                "origin table",
                "scan on an unopened table handle",
            ));
        }
        Ok(Box::new(MemOriginScanner {
            table: self,
            range: range.clone(),
            pos: self.lower_index(&range.start),
        }))
    }
}

struct MemOriginScanner<'t> {
    table: &'t MemOriginTable,
    range: DatumRange,
    pos: usize,
}

impl OriginScanner for MemOriginScanner<'_> {
    fn next_row(&mut self) -> Result<Option<DatumRow>, SourceError> {
        let Some(row) = self.table.rows.get(self.pos) else {
            return Ok(None);
        };
        if self.range.is_past_end(row, &self.table.comparator) {
            self.pos = self.table.rows.len();
            return Ok(None);
        }
        self.pos += 1;
        Ok(Some(row.clone()))
    }
}
