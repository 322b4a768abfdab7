//! The LOB meta row iterator: translation, merge and reassembly composed.

use std::fmt;

use crate::{
    datum::DatumRange,
    desc::{ColumnDesc, TableDataDesc, TabletId},
    error::{ConfigError, IntegrityError, ScanError},
    handler::{DmlRowHandler, LobIdConflictHandler},
    lob_id::{LobId, LobIdRangeSet},
    merge::{MergeCore, MergeStats},
    observability::{log_error, log_info, log_warn},
    origin::OriginTable,
    reassemble::{LobMetaRow, ReassembleStats, RowReassembler},
    source::SortedRunHandle,
    translate::{RangeTranslator, TranslateStats},
};

const DEFAULT_ROW_BUFFER_CAPACITY: usize = 8;

/// Configuration of one [`LobMetaRowIter`].
pub struct LobMetaIterParam {
    pub(crate) tablet_id: TabletId,
    pub(crate) table_data_desc: TableDataDesc,
    pub(crate) col_descs: Option<Vec<ColumnDesc>>,
    pub(crate) dml_row_handler: Option<Box<dyn DmlRowHandler>>,
    pub(crate) verify_referenced_ids: bool,
    pub(crate) row_buffer_capacity: usize,
}

impl LobMetaIterParam {
    pub fn new(tablet_id: TabletId) -> Self {
        Self {
            tablet_id,
            table_data_desc: TableDataDesc::default(),
            col_descs: None,
            dml_row_handler: None,
            verify_referenced_ids: false,
            row_buffer_capacity: DEFAULT_ROW_BUFFER_CAPACITY,
        }
    }

    pub fn table_data_desc(self, table_data_desc: TableDataDesc) -> Self {
        Self {
            table_data_desc,
            ..self
        }
    }

    pub fn col_descs(self, col_descs: Vec<ColumnDesc>) -> Self {
        Self {
            col_descs: Some(col_descs),
            ..self
        }
    }

    pub fn dml_row_handler(self, handler: Box<dyn DmlRowHandler>) -> Self {
        Self {
            dml_row_handler: Some(handler),
            ..self
        }
    }

    /// Install the fixed handler that rejects every conflict.
    pub fn lob_id_conflict_handler(self) -> Self {
        self.dml_row_handler(Box::new(LobIdConflictHandler))
    }

    /// Fail when an id referenced by the origin table produced no pieces.
    pub fn verify_referenced_ids(self, verify_referenced_ids: bool) -> Self {
        Self {
            verify_referenced_ids,
            ..self
        }
    }

    /// Initial piece capacity of the per-row buffer.
    pub fn row_buffer_capacity(self, row_buffer_capacity: usize) -> Self {
        Self {
            row_buffer_capacity,
            ..self
        }
    }

    /// Check that every required parameter is present and consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let comparator = self
            .table_data_desc
            .comparator
            .as_ref()
            .ok_or(ConfigError::MissingComparator)?;
        let columns = self.col_descs.as_ref().ok_or(ConfigError::MissingColumns)?;
        if columns.is_empty() {
            return Err(ConfigError::MissingColumns);
        }
        if self.dml_row_handler.is_none() {
            return Err(ConfigError::MissingConflictHandler);
        }
        if comparator.rowkey_len() == 0 {
            return Err(ConfigError::MissingComparator);
        }
        self.table_data_desc.lob_meta.validate(columns)
    }
}

impl fmt::Debug for LobMetaIterParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobMetaIterParam")
            .field("tablet_id", &self.tablet_id)
            .field("table_data_desc", &self.table_data_desc)
            .field("col_descs", &self.col_descs)
            .field("has_dml_row_handler", &self.dml_row_handler.is_some())
            .field("verify_referenced_ids", &self.verify_referenced_ids)
            .field("row_buffer_capacity", &self.row_buffer_capacity)
            .finish()
    }
}

/// Counters for one scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub translate: TranslateStats,
    pub intervals: usize,
    pub merge: MergeStats,
    pub reassemble: ReassembleStats,
}

/// Pull-based iterator producing one logical LOB meta row per lob id.
///
/// Runs on the calling thread only. After any error the scan result for the
/// range is void and the iterator yields nothing further.
pub struct LobMetaRowIter {
    tablet: TabletId,
    handler: Box<dyn DmlRowHandler>,
    merge: MergeCore,
    reassembler: RowReassembler,
    verifier: Option<ReferencedIds>,
    translate_stats: TranslateStats,
    rows_emitted: u64,
    finished: bool,
}

impl LobMetaRowIter {
    /// Validate `param`, translate `range` against `origin` and open the merge
    /// over `sstables`.
    pub fn open(
        param: LobMetaIterParam,
        origin: &dyn OriginTable,
        sstables: Vec<SortedRunHandle>,
        range: DatumRange,
    ) -> Result<Self, ScanError> {
        param.validate()?;
        if !origin.is_valid() {
            return Err(ConfigError::InvalidOriginTable.into());
        }
        let LobMetaIterParam {
            tablet_id,
            table_data_desc,
            dml_row_handler,
            verify_referenced_ids,
            row_buffer_capacity,
            ..
        } = param;
        let (Some(comparator), Some(handler)) = (table_data_desc.comparator, dml_row_handler)
        else {
            return Err(ConfigError::MissingConflictHandler.into());
        };
        if range.is_malformed(&comparator) {
            return Err(ConfigError::MalformedRange.into());
        }

        let translation =
            RangeTranslator::new(table_data_desc.origin_lob_columns).translate(origin, range)?;
        let verifier = verify_referenced_ids
            .then(|| ReferencedIds::new(translation.arena.lob_ranges()));
        let intervals = translation.arena.lob_ranges().len();
        let merge = MergeCore::open(
            tablet_id,
            table_data_desc.lob_meta,
            &sstables,
            translation.arena,
        )?;
        log_info!(
            component = "iter",
            event = "lob_meta_iter_opened",
            tablet = %tablet_id,
            sources = sstables.len(),
            sources_opened = merge.stats().sources_opened,
            intervals,
        );
        Ok(Self {
            tablet: tablet_id,
            handler,
            merge,
            reassembler: RowReassembler::new(
                tablet_id,
                table_data_desc.lob_meta,
                row_buffer_capacity,
            ),
            verifier,
            translate_stats: translation.stats,
            rows_emitted: 0,
            finished: false,
        })
    }

    /// Produce the next logical row.
    ///
    /// `Ok(None)` is end of data. The row borrows the iterator and is only
    /// valid until the next call; clone its rows to keep them longer.
    pub fn next_row(&mut self) -> Result<Option<LobMetaRow<'_>>, ScanError> {
        if self.finished {
            return Ok(None);
        }
        let next = self
            .reassembler
            .next_row(&mut self.merge, self.handler.as_mut());
        let checked = match next {
            Ok(Some(row)) => match self.verifier.as_mut().map(|v| v.observe(row.lob_id())) {
                Some(Err(err)) => Err(err),
                _ => Ok(Some(row)),
            },
            Ok(None) => match self.verifier.as_mut().map(ReferencedIds::finish) {
                Some(Err(err)) => Err(err),
                _ => Ok(None),
            },
            Err(err) => Err(err),
        };
        match checked {
            Ok(Some(row)) => {
                self.rows_emitted += 1;
                Ok(Some(row))
            }
            Ok(None) => {
                self.finished = true;
                log_info!(
                    component = "iter",
                    event = "lob_meta_iter_finished",
                    tablet = %self.tablet,
                    rows = self.rows_emitted,
                    pieces = self.merge.stats().pieces_merged,
                );
                Ok(None)
            }
            Err(err) => {
                self.finished = true;
                log_error!(
                    component = "iter",
                    event = "lob_meta_iter_failed",
                    tablet = %self.tablet,
                    error = %err,
                );
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            translate: self.translate_stats,
            intervals: self.merge.ranges().lob_ranges().len(),
            merge: self.merge.stats(),
            reassemble: self.reassembler.stats(),
        }
    }

    /// Lob-id ranges the scan covers.
    pub fn lob_ranges(&self) -> &LobIdRangeSet {
        self.merge.ranges().lob_ranges()
    }

    /// Release cursors and buffers. Dropping the iterator does the same.
    pub fn close(self) {
        if let Some(lob_id) = self.reassembler.in_progress() {
            log_warn!(
                component = "iter",
                event = "lob_meta_iter_abandoned",
                tablet = %self.tablet,
                lob_id = %lob_id,
            );
        }
    }
}

/// Walks the referenced ids in step with the merge output.
#[derive(Debug)]
struct ReferencedIds {
    ranges: LobIdRangeSet,
    next: Option<LobId>,
}

impl ReferencedIds {
    fn new(ranges: &LobIdRangeSet) -> Self {
        Self {
            next: ranges.get(0).map(|r| r.start),
            ranges: ranges.clone(),
        }
    }

    fn observe(&mut self, lob_id: LobId) -> Result<(), ScanError> {
        if let Some(next) = self.next {
            if next < lob_id {
                return Err(IntegrityError::MissingLob { lob_id: next }.into());
            }
            if next == lob_id {
                self.next = self.after(lob_id);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ScanError> {
        match self.next.take() {
            Some(lob_id) => Err(IntegrityError::MissingLob { lob_id }.into()),
            None => Ok(()),
        }
    }

    fn after(&self, lob_id: LobId) -> Option<LobId> {
        let succ = lob_id.succ()?;
        let idx = self.ranges.position_at_or_after(succ)?;
        let interval = self.ranges.get(idx)?;
        Some(interval.start.max(succ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::{DatumComparator, LobMetaLayout};

    fn param() -> LobMetaIterParam {
        LobMetaIterParam::new(TabletId::new(1))
            .table_data_desc(TableDataDesc::new(DatumComparator::new(1)))
            .col_descs(LobMetaLayout::default_columns())
            .lob_id_conflict_handler()
    }

    #[test]
    fn complete_param_validates() {
        assert_eq!(param().validate(), Ok(()));
    }

    #[test]
    fn missing_parts_are_config_errors() {
        let p = LobMetaIterParam::new(TabletId::new(1))
            .col_descs(LobMetaLayout::default_columns())
            .lob_id_conflict_handler();
        assert_eq!(p.validate(), Err(ConfigError::MissingComparator));

        let p = LobMetaIterParam::new(TabletId::new(1))
            .table_data_desc(TableDataDesc::new(DatumComparator::new(1)))
            .lob_id_conflict_handler();
        assert_eq!(p.validate(), Err(ConfigError::MissingColumns));

        let p = LobMetaIterParam::new(TabletId::new(1))
            .table_data_desc(TableDataDesc::new(DatumComparator::new(1)))
            .col_descs(LobMetaLayout::default_columns());
        assert_eq!(p.validate(), Err(ConfigError::MissingConflictHandler));

        let p = param().col_descs(Vec::new());
        assert_eq!(p.validate(), Err(ConfigError::MissingColumns));
    }

    #[test]
    fn referenced_ids_walk_every_interval() {
        let ranges: LobIdRangeSet = [1, 2, 3, 7, 9].into_iter().map(LobId::new).collect();
        let mut ids = ReferencedIds::new(&ranges);
        for id in [1, 2, 3, 7] {
            ids.observe(LobId::new(id)).unwrap();
        }
        let err = ids.finish().unwrap_err();
        assert!(matches!(
            err,
            ScanError::Integrity(IntegrityError::MissingLob { lob_id }) if lob_id == LobId::new(9)
        ));
    }

    #[test]
    fn referenced_id_gap_is_reported_on_the_next_row() {
        let ranges: LobIdRangeSet = [4, 5, 6].into_iter().map(LobId::new).collect();
        let mut ids = ReferencedIds::new(&ranges);
        ids.observe(LobId::new(4)).unwrap();
        let err = ids.observe(LobId::new(6)).unwrap_err();
        assert!(matches!(
            err,
            ScanError::Integrity(IntegrityError::MissingLob { lob_id }) if lob_id == LobId::new(5)
        ));
    }
}
