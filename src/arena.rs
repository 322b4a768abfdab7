//! The two allocation scopes of a scan.
//!
//! [`RangeArena`] lives as long as the scan: it holds the primary-key range
//! the caller asked for and the lob-id ranges translated from it. It is built
//! once by the translator and then moved into the merge, so nothing can
//! release it while the merge still reads range boundaries.
//!
//! [`RowArena`] is recycled on every call: it holds the pieces of the logical
//! row being assembled, and rows handed to the caller borrow from it until
//! the next call resets it.

use crate::{datum::DatumRange, lob_id::LobIdRangeSet, piece::PieceRow};

/// Scan-lifetime storage for range boundaries.
#[derive(Clone, Debug)]
pub struct RangeArena {
    pk_range: DatumRange,
    lob_ranges: LobIdRangeSet,
}

impl RangeArena {
    pub fn new(pk_range: DatumRange, lob_ranges: LobIdRangeSet) -> Self {
        Self {
            pk_range,
            lob_ranges,
        }
    }

    /// Primary-key range the lob ranges were translated from.
    pub fn pk_range(&self) -> &DatumRange {
        &self.pk_range
    }

    pub fn lob_ranges(&self) -> &LobIdRangeSet {
        &self.lob_ranges
    }
}

/// Per-call storage for the logical row under assembly.
#[derive(Debug, Default)]
pub struct RowArena {
    pieces: Vec<PieceRow>,
    resets: u64,
}

impl RowArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pieces: Vec::with_capacity(capacity),
            resets: 0,
        }
    }

    /// Drop the current contents, keeping the allocation for the next row.
    pub fn reset(&mut self) {
        self.pieces.clear();
        self.resets += 1;
    }

    pub fn push(&mut self, piece: PieceRow) {
        self.pieces.push(piece);
    }

    pub fn pieces(&self) -> &[PieceRow] {
        &self.pieces
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// How many times the arena has been recycled.
    pub fn resets(&self) -> u64 {
        self.resets
    }
}
