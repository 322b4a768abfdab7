//! Common test utilities for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use lob_meta_scan::{
    datum_row, DatumComparator, DatumRange, DatumRow, LoadRow, LobLocator, LobMetaIterParam,
    LobMetaLayout, LobMetaRowIter, MemOriginTable, MemSortedRun, RunIdGenerator, ScanError,
    SortedRunHandle, TableDataDesc, TabletId,
};

pub const TABLET: TabletId = TabletId::new(7);

fn run_ids() -> &'static RunIdGenerator {
    static RUN_IDS: OnceLock<RunIdGenerator> = OnceLock::new();
    RUN_IDS.get_or_init(RunIdGenerator::new)
}

/// One physical piece row in the default layout.
pub fn piece(lob_id: u64, seq: u64, piece_count: u64, data: &[u8]) -> LoadRow {
    LoadRow::insert(datum_row![
        lob_id,
        seq,
        piece_count,
        data.len() as u64,
        Bytes::copy_from_slice(data)
    ])
}

/// Split `data` into pieces of at most `piece_size` bytes.
pub fn split_lob(lob_id: u64, data: &[u8], piece_size: usize) -> Vec<LoadRow> {
    let chunks: Vec<&[u8]> = if data.is_empty() {
        vec![data]
    } else {
        data.chunks(piece_size).collect()
    };
    let count = chunks.len() as u64;
    chunks
        .into_iter()
        .enumerate()
        .map(|(seq, chunk)| piece(lob_id, seq as u64, count, chunk))
        .collect()
}

/// A sorted run over `rows`, sorted by physical key first.
pub fn run(mut rows: Vec<LoadRow>) -> SortedRunHandle {
    rows.sort_by_key(|row| {
        (
            row.row[0].as_i128().unwrap_or_default(),
            row.row[1].as_i128().unwrap_or_default(),
        )
    });
    Arc::new(MemSortedRun::new(run_ids().generate(), rows, &LobMetaLayout::default()).unwrap())
}

/// Origin table of `(pk, lob_id)` rows; a negative lob id stores no reference.
pub fn origin(refs: &[(i64, i64)]) -> MemOriginTable {
    let rows: Vec<DatumRow> = refs
        .iter()
        .map(|&(pk, lob_id)| {
            if lob_id < 0 {
                datum_row![pk, LobLocator::Inrow(Bytes::from_static(b"inline"))]
            } else {
                datum_row![pk, LobLocator::outrow(lob_id)]
            }
        })
        .collect();
    MemOriginTable::new(rows, DatumComparator::new(1))
}

pub fn param() -> LobMetaIterParam {
    LobMetaIterParam::new(TABLET)
        .table_data_desc(TableDataDesc::new(DatumComparator::new(1)))
        .col_descs(LobMetaLayout::default_columns())
        .lob_id_conflict_handler()
}

/// Drain the iterator into `(lob_id, payload)` pairs.
pub fn drain(iter: &mut LobMetaRowIter) -> Result<Vec<(u64, Bytes)>, ScanError> {
    let mut out = Vec::new();
    while let Some(row) = iter.next_row()? {
        out.push((row.lob_id().get(), row.data()));
    }
    Ok(out)
}

/// Open a scan over the whole origin and drain it.
pub fn scan_all(
    origin: &MemOriginTable,
    runs: Vec<SortedRunHandle>,
) -> Result<Vec<(u64, Bytes)>, ScanError> {
    let mut iter = LobMetaRowIter::open(param(), origin, runs, DatumRange::all())?;
    drain(&mut iter)
}
