//! Typed tuple rows shared by every scan interface.
//!
//! A [`DatumRow`] is immutable once a source hands it out. Clones share the
//! underlying buffer, so a consumer that needs a row past the current
//! iteration step keeps a clone instead of deep-copying the values.

mod decode;
mod range;

use std::{fmt, ops::Index, sync::Arc};

use bytes::Bytes;

pub use self::{decode::decode_batch, range::DatumRange};

/// Reference from a user-table cell to a large-object value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LobLocator {
    /// Value stored out of row in the LOB meta table, addressed by id.
    ///
    /// The id stays signed here because the locator is decoded straight from
    /// disk; [`crate::lob_id::LobId`] validates it before use.
    Outrow { lob_id: i64, byte_len: u64 },
    /// Small value stored inline in the owning row. Carries no id.
    Inrow(Bytes),
}

impl LobLocator {
    /// Out-of-row locator for `lob_id` with unknown length.
    pub fn outrow(lob_id: i64) -> Self {
        LobLocator::Outrow {
            lob_id,
            byte_len: 0,
        }
    }
}

/// A single typed column value.
///
/// Values of different variants order by variant, matching the layout of
/// this enum; `Null` sorts first.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Utf8(Arc<str>),
    Binary(Bytes),
    Lob(LobLocator),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Integer view used for id, sequence and count columns.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Datum::Int(v) => Some(i128::from(*v)),
            Datum::UInt(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Datum::Binary(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => f.write_str("NULL"),
            Datum::Bool(v) => write!(f, "{v}"),
            Datum::Int(v) => write!(f, "{v}"),
            Datum::UInt(v) => write!(f, "{v}"),
            Datum::Utf8(v) => write!(f, "{v:?}"),
            Datum::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Datum::Lob(LobLocator::Outrow { lob_id, .. }) => write!(f, "lob#{lob_id}"),
            Datum::Lob(LobLocator::Inrow(v)) => write!(f, "lob<inline {} bytes>", v.len()),
        }
    }
}

impl From<i64> for Datum {
    fn from(value: i64) -> Self {
        Datum::Int(value)
    }
}

impl From<u64> for Datum {
    fn from(value: u64) -> Self {
        Datum::UInt(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Utf8(Arc::from(value))
    }
}

impl From<Bytes> for Datum {
    fn from(value: Bytes) -> Self {
        Datum::Binary(value)
    }
}

impl From<LobLocator> for Datum {
    fn from(value: LobLocator) -> Self {
        Datum::Lob(value)
    }
}

/// Fixed-arity, immutable tuple of datums.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatumRow(Arc<[Datum]>);

impl DatumRow {
    pub fn new(datums: Vec<Datum>) -> Self {
        Self(datums.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Datum> {
        self.0.get(idx)
    }

    pub fn as_slice(&self) -> &[Datum] {
        &self.0
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Datum> {
        self.0.iter()
    }
}

impl Index<usize> for DatumRow {
    type Output = Datum;

    fn index(&self, idx: usize) -> &Datum {
        &self.0[idx]
    }
}

impl FromIterator<Datum> for DatumRow {
    fn from_iter<T: IntoIterator<Item = Datum>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Debug for DatumRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Build a [`DatumRow`] from values convertible into [`Datum`].
#[macro_export]
macro_rules! datum_row {
    ($($value:expr),* $(,)?) => {
        $crate::datum::DatumRow::new(vec![$($crate::datum::Datum::from($value)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datum_order_follows_variant_then_value() {
        assert!(Datum::Null < Datum::Bool(false));
        assert!(Datum::Int(-5) < Datum::Int(3));
        assert!(Datum::Int(i64::MAX) < Datum::UInt(0));
        assert!(Datum::from("a") < Datum::from("b"));
        assert!(
            Datum::Lob(LobLocator::outrow(1)) < Datum::Lob(LobLocator::Inrow(Bytes::new()))
        );
    }

    #[test]
    fn rows_share_storage_on_clone() {
        let row = datum_row![1_i64, "x"];
        let copy = row.clone();
        assert_eq!(row, copy);
        assert!(std::ptr::eq(row.as_slice(), copy.as_slice()));
        assert_eq!(copy[1], Datum::from("x"));
    }

    #[test]
    fn integer_view_spans_signed_and_unsigned() {
        assert_eq!(Datum::Int(-1).as_i128(), Some(-1));
        assert_eq!(Datum::UInt(u64::MAX).as_i128(), Some(i128::from(u64::MAX)));
        assert_eq!(Datum::from("1").as_i128(), None);
    }
}
