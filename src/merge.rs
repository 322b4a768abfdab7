//! K-way merge of sorted runs restricted to the translated lob-id ranges.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use crate::{
    arena::RangeArena,
    desc::{LobMetaLayout, TabletId},
    error::{ConflictError, ConflictOp, IntegrityError, ScanError},
    handler::DmlRowHandler,
    lob_id::LobId,
    observability::{log_debug, log_error},
    piece::PieceRow,
    source::{LoadRow, RowCursor, RunId, SortedRunHandle},
};

/// Producer of physical pieces in (lob id, seq) order.
pub trait PieceStream {
    /// Next piece, or `None` once every source is exhausted or past the
    /// last range.
    fn next_piece(
        &mut self,
        handler: &mut dyn DmlRowHandler,
    ) -> Result<Option<PieceRow>, ScanError>;
}

/// Counters gathered by the merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub sources_opened: u64,
    pub sources_skipped: u64,
    pub pieces_merged: u64,
    pub pieces_skipped: u64,
    pub range_switches: u64,
}

struct SourceCursor {
    run: RunId,
    cursor: Box<dyn RowCursor>,
    last_key: Option<(LobId, u32)>,
}

/// Merges the cursors of several sorted runs in lob-id order.
///
/// The merge owns the [`RangeArena`] for the whole scan. A source whose
/// current row lies past the active interval stays in the heap untouched; it
/// is picked up again once the merge switches to the interval holding that
/// row, so such a source is parked without extra bookkeeping.
pub struct MergeCore {
    tablet: TabletId,
    layout: LobMetaLayout,
    ranges: RangeArena,
    range_idx: usize,
    sources: Vec<SourceCursor>,
    peeked: BinaryHeap<Reverse<HeapEntry>>,
    stats: MergeStats,
}

impl MergeCore {
    /// Open cursors on every run that can hold ids inside `ranges`.
    ///
    /// Runs whose lob-id bounds miss every interval are skipped without
    /// opening a cursor.
    pub fn open(
        tablet: TabletId,
        layout: LobMetaLayout,
        runs: &[SortedRunHandle],
        ranges: RangeArena,
    ) -> Result<Self, ScanError> {
        let mut merge = Self {
            tablet,
            layout,
            ranges,
            range_idx: 0,
            sources: Vec::with_capacity(runs.len()),
            peeked: BinaryHeap::with_capacity(runs.len()),
            stats: MergeStats::default(),
        };
        if merge.ranges.lob_ranges().is_empty() {
            return Ok(merge);
        }
        for run in runs {
            let Some((min, max)) = run.lob_id_bounds() else {
                merge.stats.sources_skipped += 1;
                continue;
            };
            let Some(first) = merge.ranges.lob_ranges().first_overlapping(min, max) else {
                log_debug!(
                    component = "merge",
                    event = "source_skipped",
                    run = %run.run_id(),
                    min = %min,
                    max = %max,
                );
                merge.stats.sources_skipped += 1;
                continue;
            };
            let target = first.start.max(min);
            let mut cursor = run.open_cursor()?;
            cursor.seek(target)?;
            merge.sources.push(SourceCursor {
                run: run.run_id(),
                cursor,
                last_key: None,
            });
            merge.stats.sources_opened += 1;
            merge.advance(merge.sources.len() - 1)?;
        }
        Ok(merge)
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    pub fn ranges(&self) -> &RangeArena {
        &self.ranges
    }

    // Pull the next row of `idx` into the heap, checking run order.
    fn advance(&mut self, idx: usize) -> Result<(), ScanError> {
        let source = &mut self.sources[idx];
        let Some(load) = source.cursor.next_row()? else {
            return Ok(());
        };
        let piece = PieceRow::decode(load, source.run, &self.layout)?;
        let key = piece.header.key();
        if let Some(prev) = source.last_key {
            if key < prev {
                log_error!(
                    component = "merge",
                    event = "source_out_of_order",
                    run = %source.run,
                    prev = ?prev,
                    next = ?key,
                );
                return Err(IntegrityError::OutOfOrder {
                    run: source.run,
                    prev,
                    next: key,
                }
                .into());
            }
        }
        source.last_key = Some(key);
        self.peeked.push(Reverse(HeapEntry {
            key,
            source_idx: idx,
            piece,
        }));
        Ok(())
    }

    fn finish(&mut self) {
        self.range_idx = self.ranges.lob_ranges().len();
        self.peeked.clear();
        self.sources.clear();
    }

    // Every source holding `first`'s key yields one row; the handler picks
    // the survivor.
    fn resolve_duplicates(
        &mut self,
        first: HeapEntry,
        handler: &mut dyn DmlRowHandler,
    ) -> Result<PieceRow, ScanError> {
        let key = first.key;
        let mut pieces = vec![first.piece];
        while self
            .peeked
            .peek()
            .is_some_and(|Reverse(entry)| entry.key == key)
        {
            let Some(Reverse(entry)) = self.peeked.pop() else {
                break;
            };
            self.advance(entry.source_idx)?;
            pieces.push(entry.piece);
        }
        let rows: Vec<LoadRow> = pieces.iter().map(PieceRow::to_load_row).collect();
        let survivor = handler.handle_update_rows(self.tablet, &rows)?;
        pieces.into_iter().nth(survivor).ok_or_else(|| {
            ScanError::from(ConflictError::UnexpectedRow {
                tablet: self.tablet,
                op: ConflictOp::DuplicateInsert,
            })
        })
    }
}

impl PieceStream for MergeCore {
    fn next_piece(
        &mut self,
        handler: &mut dyn DmlRowHandler,
    ) -> Result<Option<PieceRow>, ScanError> {
        loop {
            let Some(interval) = self.ranges.lob_ranges().get(self.range_idx).copied() else {
                self.finish();
                return Ok(None);
            };
            let Some(Reverse(entry)) = self.peeked.pop() else {
                return Ok(None);
            };
            let lob_id = entry.key.0;
            if lob_id < interval.start {
                self.stats.pieces_skipped += 1;
                self.sources[entry.source_idx].cursor.seek(interval.start)?;
                self.advance(entry.source_idx)?;
                continue;
            }
            if lob_id > interval.end {
                // The smallest pending row is past this interval, so every
                // source is; jump to the interval that can hold it.
                let Some(next_idx) = self.ranges.lob_ranges().position_at_or_after(lob_id) else {
                    self.finish();
                    return Ok(None);
                };
                log_debug!(
                    component = "merge",
                    event = "range_switch",
                    from = self.range_idx,
                    to = next_idx,
                    lob_id = %lob_id,
                );
                self.stats.range_switches += 1;
                self.range_idx = next_idx;
                self.peeked.push(Reverse(entry));
                continue;
            }
            self.advance(entry.source_idx)?;
            self.stats.pieces_merged += 1;
            let duplicate = self
                .peeked
                .peek()
                .is_some_and(|Reverse(next)| next.key == entry.key);
            if duplicate {
                return self.resolve_duplicates(entry, handler).map(Some);
            }
            return Ok(Some(entry.piece));
        }
    }
}

struct HeapEntry {
    key: (LobId, u32),
    source_idx: usize,
    piece: PieceRow,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Ties on the physical key fall back to source order so output is
        // deterministic; duplicates are resolved before they are emitted.
        self.key
            .cmp(&other.key)
            .then(self.source_idx.cmp(&other.source_idx))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}
