//! Self-describing LOB meta piece rows.

use bytes::Bytes;

use crate::{
    datum::{Datum, DatumRow},
    desc::LobMetaLayout,
    error::{ScanError, SourceError},
    lob_id::LobId,
    source::{LoadRow, RowKind, RunId},
};

/// Fields every piece row carries about the value it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PieceHeader {
    pub lob_id: LobId,
    /// Position of this piece inside the value, starting at zero.
    pub seq: u32,
    /// Number of pieces the whole value was split into.
    pub piece_count: u32,
    pub byte_len: u64,
}

impl PieceHeader {
    /// Read the header fields out of `row` at the positions `layout` names.
    ///
    /// A bad lob id is an integrity violation; any other unreadable field is
    /// a decode failure of the run that produced the row.
    pub fn decode(row: &DatumRow, layout: &LobMetaLayout) -> Result<Self, ScanError> {
        let lob_id = LobId::from_datum(field(row, layout.lob_id, "lob_id")?, "piece row")?;
        Ok(Self {
            lob_id,
            seq: int_field(row, layout.seq, "seq")?,
            piece_count: int_field(row, layout.piece_count, "piece_count")?,
            byte_len: int_field(row, layout.byte_len, "byte_len")?,
        })
    }

    /// Physical sort key of the piece.
    pub fn key(&self) -> (LobId, u32) {
        (self.lob_id, self.seq)
    }
}

/// One physical piece together with the run it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PieceRow {
    pub header: PieceHeader,
    pub row: DatumRow,
    pub kind: RowKind,
    pub run: RunId,
}

impl PieceRow {
    pub fn decode(load: LoadRow, run: RunId, layout: &LobMetaLayout) -> Result<Self, ScanError> {
        let header = PieceHeader::decode(&load.row, layout)?;
        Ok(Self {
            header,
            row: load.row,
            kind: load.kind,
            run,
        })
    }

    /// Piece payload, empty when the data column is null.
    pub fn data(&self, layout: &LobMetaLayout) -> Bytes {
        self.row
            .get(layout.data)
            .and_then(Datum::as_bytes)
            .cloned()
            .unwrap_or_default()
    }

    pub fn to_load_row(&self) -> LoadRow {
        LoadRow::with_kind(self.row.clone(), self.kind)
    }
}

fn field<'r>(row: &'r DatumRow, idx: usize, name: &str) -> Result<&'r Datum, SourceError> {
    row.get(idx).ok_or_else(|| {
        SourceError::decode(
            "piece row",
            format!("missing `{name}` at column {idx} of {}", row.len()),
        )
    })
}

fn int_field<T: TryFrom<i128>>(row: &DatumRow, idx: usize, name: &str) -> Result<T, ScanError> {
    let datum = field(row, idx, name)?;
    let value = datum
        .as_i128()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| {
            SourceError::decode("piece row", format!("`{name}` is not a valid count: {datum}"))
        })?;
    Ok(value)
}
