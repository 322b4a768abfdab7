//! Groups consecutive pieces of one lob id into a logical row.
//!
//! Pieces arrive in (lob id, seq) order. The reassembler moves through
//! three states: idle, accumulating the pieces of one id, and ready once the
//! declared piece count is reached. A new id showing up while the current
//! one is still short is a partially written value and fails the scan.

use bytes::{Bytes, BytesMut};

use crate::{
    arena::RowArena,
    datum::DatumRow,
    desc::{LobMetaLayout, TabletId},
    error::{IntegrityError, ScanError},
    handler::DmlRowHandler,
    lob_id::LobId,
    merge::PieceStream,
    observability::log_error,
    piece::PieceRow,
    source::RowKind,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AssemblyState {
    Idle,
    Accumulating {
        lob_id: LobId,
        expected: u32,
        observed: u32,
        byte_len: u64,
    },
    Ready,
}

/// Counters gathered by the reassembler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReassembleStats {
    pub pieces: u64,
    pub rows: u64,
    pub deletes_accepted: u64,
}

/// A complete logical LOB meta row, borrowed until the next call.
#[derive(Clone, Copy, Debug)]
pub struct LobMetaRow<'a> {
    lob_id: LobId,
    byte_len: u64,
    layout: &'a LobMetaLayout,
    pieces: &'a [PieceRow],
}

impl<'a> LobMetaRow<'a> {
    pub fn lob_id(&self) -> LobId {
        self.lob_id
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Pieces in sequence order.
    pub fn pieces(&self) -> &'a [PieceRow] {
        self.pieces
    }

    /// Physical rows in sequence order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &'a DatumRow> + 'a {
        self.pieces.iter().map(|piece| &piece.row)
    }

    /// Total payload length. Every piece's declared length matched its
    /// payload when it was accepted.
    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// Concatenated payload. Allocates; the row itself only borrows.
    pub fn data(&self) -> Bytes {
        if let [only] = self.pieces {
            return only.data(self.layout);
        }
        let payloads: Vec<Bytes> = self
            .pieces
            .iter()
            .map(|piece| piece.data(self.layout))
            .collect();
        let mut buf = BytesMut::with_capacity(payloads.iter().map(Bytes::len).sum());
        for payload in &payloads {
            buf.extend_from_slice(payload);
        }
        buf.freeze()
    }
}

/// Turns a piece stream into logical rows, one per lob id.
pub struct RowReassembler {
    tablet: TabletId,
    layout: LobMetaLayout,
    arena: RowArena,
    state: AssemblyState,
    last_completed: Option<LobId>,
    stats: ReassembleStats,
}

impl RowReassembler {
    pub fn new(tablet: TabletId, layout: LobMetaLayout, capacity: usize) -> Self {
        Self {
            tablet,
            layout,
            arena: RowArena::with_capacity(capacity),
            state: AssemblyState::Idle,
            last_completed: None,
            stats: ReassembleStats::default(),
        }
    }

    pub fn stats(&self) -> ReassembleStats {
        self.stats
    }

    /// Lob id whose pieces are buffered but not yet complete.
    pub fn in_progress(&self) -> Option<LobId> {
        match self.state {
            AssemblyState::Accumulating { lob_id, .. } => Some(lob_id),
            _ => None,
        }
    }

    /// Pull pieces until one lob id is complete.
    ///
    /// Returns `Ok(None)` at end of data. The returned row borrows the
    /// reassembler's buffer and is recycled on the next call.
    pub fn next_row<S>(
        &mut self,
        stream: &mut S,
        handler: &mut dyn DmlRowHandler,
    ) -> Result<Option<LobMetaRow<'_>>, ScanError>
    where
        S: PieceStream + ?Sized,
    {
        if self.state == AssemblyState::Ready {
            self.arena.reset();
            self.state = AssemblyState::Idle;
        }
        loop {
            let Some(piece) = stream.next_piece(handler)? else {
                if let AssemblyState::Accumulating {
                    lob_id,
                    expected,
                    observed,
                    ..
                } = self.state
                {
                    return Err(self.violation(IntegrityError::IncompleteAtEnd {
                        lob_id,
                        observed,
                        expected,
                    }));
                }
                return Ok(None);
            };
            match piece.kind {
                RowKind::Insert => {}
                RowKind::Update => handler.handle_update_row(self.tablet, &piece.to_load_row())?,
                RowKind::Delete => {
                    handler.handle_delete_row(self.tablet, &piece.to_load_row())?;
                    self.stats.deletes_accepted += 1;
                    continue;
                }
            }
            if let Some((lob_id, byte_len)) = self.accept(piece)? {
                self.state = AssemblyState::Ready;
                self.stats.rows += 1;
                return Ok(Some(self.current_row(lob_id, byte_len)));
            }
        }
    }

    // Buffer one piece; returns the lob id and its total length once the
    // value is complete.
    fn accept(&mut self, piece: PieceRow) -> Result<Option<(LobId, u64)>, ScanError> {
        let header = piece.header;
        if header.piece_count == 0 {
            return Err(self.violation(IntegrityError::ZeroPieces {
                lob_id: header.lob_id,
            }));
        }
        if header.seq >= header.piece_count {
            return Err(self.violation(IntegrityError::PieceOutOfRange {
                lob_id: header.lob_id,
                seq: header.seq,
                expected: header.piece_count,
            }));
        }
        let actual = piece.data(&self.layout).len() as u64;
        if header.byte_len != actual {
            return Err(self.violation(IntegrityError::ByteLenMismatch {
                lob_id: header.lob_id,
                seq: header.seq,
                declared: header.byte_len,
                actual,
            }));
        }
        let (observed, byte_len) = match self.state {
            AssemblyState::Idle | AssemblyState::Ready => {
                if self.last_completed == Some(header.lob_id) {
                    return Err(self.violation(IntegrityError::ExcessPiece {
                        lob_id: header.lob_id,
                        seq: header.seq,
                    }));
                }
                (0, 0)
            }
            AssemblyState::Accumulating {
                lob_id,
                expected,
                observed,
                byte_len,
            } => {
                if lob_id != header.lob_id {
                    return Err(self.violation(IntegrityError::IncompleteAtBoundary {
                        lob_id,
                        observed,
                        expected,
                        next: header.lob_id,
                    }));
                }
                if expected != header.piece_count {
                    return Err(self.violation(IntegrityError::PieceCountMismatch {
                        lob_id,
                        first: expected,
                        other: header.piece_count,
                    }));
                }
                (observed, byte_len)
            }
        };
        if header.seq != observed {
            return Err(self.violation(IntegrityError::SequenceGap {
                lob_id: header.lob_id,
                expected: observed,
                actual: header.seq,
            }));
        }
        let Some(byte_len) = byte_len.checked_add(actual) else {
            return Err(self.violation(IntegrityError::ByteLenOverflow {
                lob_id: header.lob_id,
            }));
        };
        let observed = observed + 1;
        self.arena.push(piece);
        self.stats.pieces += 1;
        if observed == header.piece_count {
            self.last_completed = Some(header.lob_id);
            return Ok(Some((header.lob_id, byte_len)));
        }
        self.state = AssemblyState::Accumulating {
            lob_id: header.lob_id,
            expected: header.piece_count,
            observed,
            byte_len,
        };
        Ok(None)
    }

    fn current_row(&self, lob_id: LobId, byte_len: u64) -> LobMetaRow<'_> {
        LobMetaRow {
            lob_id,
            byte_len,
            layout: &self.layout,
            pieces: self.arena.pieces(),
        }
    }

    fn violation(&self, err: IntegrityError) -> ScanError {
        log_error!(
            component = "reassemble",
            event = "integrity_violation",
            tablet = %self.tablet,
            error = %err,
        );
        err.into()
    }
}
