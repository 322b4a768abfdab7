//! Merge-scan over LOB meta tablets.
//!
//! A scan takes a primary-key range of the origin table, translates it into
//! the set of out-of-row lob ids the rows reference, merges the LOB meta
//! sorted runs restricted to those ids and stitches the pieces of each id
//! back into one logical row.
//!
//! ```ignore
//! let param = LobMetaIterParam::new(TabletId::new(7))
//!     .table_data_desc(TableDataDesc::new(DatumComparator::new(1)))
//!     .col_descs(LobMetaLayout::default_columns())
//!     .lob_id_conflict_handler();
//! let mut iter = LobMetaRowIter::open(param, &origin, runs, DatumRange::all())?;
//! while let Some(row) = iter.next_row()? {
//!     consume(row.lob_id(), row.data());
//! }
//! ```

mod observability;

/// Allocation scopes of a scan.
pub mod arena;

/// Cell values, rows and primary-key ranges.
pub mod datum;

/// Table, column and tablet descriptors.
pub mod desc;

/// Error types surfaced by the scan.
pub mod error;

/// Conflict handling for rows the merge cannot place.
pub mod handler;

/// The composed row iterator.
pub mod iter;

/// Lob ids and their range sets.
pub mod lob_id;

/// K-way merge of sorted runs.
pub mod merge;

/// Origin table access.
pub mod origin;

/// Decoded LOB meta pieces.
pub mod piece;

/// Piece to logical row reassembly.
pub mod reassemble;

/// Sorted run sources and cursors.
pub mod source;

/// Primary-key range translation.
pub mod translate;

pub use crate::{
    datum::{Datum, DatumRange, DatumRow, LobLocator},
    desc::{ColumnDesc, DatumComparator, LobMetaLayout, SortOrder, TableDataDesc, TabletId},
    error::{ConfigError, ConflictError, ConflictOp, IntegrityError, ScanError, SourceError},
    handler::{DmlRowHandler, LobIdConflictHandler},
    iter::{LobMetaIterParam, LobMetaRowIter, ScanStats},
    lob_id::{LobId, LobIdInterval, LobIdRangeSet},
    origin::{MemOriginTable, OriginScanner, OriginTable},
    reassemble::LobMetaRow,
    source::{
        LoadRow, MemSortedRun, RowCursor, RowKind, RunId, RunIdGenerator, SortedRowSource,
        SortedRunHandle,
    },
};
