//! Row-shape and ordering descriptors shared by every source in one merge.

use std::{cmp::Ordering, fmt};

use arrow::datatypes::DataType;

use crate::{datum::DatumRow, error::ConfigError};

/// Identifier of the tablet (partition) a load worker is scanning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TabletId(u64);

impl TabletId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TabletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of one row-key column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Compares rows by their row-key prefix.
///
/// Only the first `rowkey_len` columns participate. When one side is shorter
/// (a prefix bound), comparison stops at the shorter length, so a prefix
/// compares equal to every row that starts with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatumComparator {
    rowkey_len: usize,
    orders: Vec<SortOrder>,
}

impl DatumComparator {
    /// Ascending comparator over the first `rowkey_len` columns.
    pub fn new(rowkey_len: usize) -> Self {
        Self {
            rowkey_len,
            orders: Vec::new(),
        }
    }

    /// Comparator with an explicit direction per row-key column.
    pub fn with_orders(orders: Vec<SortOrder>) -> Self {
        Self {
            rowkey_len: orders.len(),
            orders,
        }
    }

    pub fn rowkey_len(&self) -> usize {
        self.rowkey_len
    }

    pub fn compare(&self, lhs: &DatumRow, rhs: &DatumRow) -> Ordering {
        let len = self.rowkey_len.min(lhs.len()).min(rhs.len());
        for idx in 0..len {
            let ord = lhs[idx].cmp(&rhs[idx]);
            let ord = match self.orders.get(idx).copied().unwrap_or_default() {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Descriptor of one column of a LOB meta row.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDesc {
    pub name: String,
    pub data_type: DataType,
    /// Whether cells of this column are LOB locators rather than plain values.
    pub is_lob: bool,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_lob: false,
        }
    }

    pub fn lob(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            is_lob: true,
            ..Self::new(name, data_type)
        }
    }
}

/// Positions of the self-describing fields inside a LOB meta piece row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LobMetaLayout {
    pub lob_id: usize,
    pub seq: usize,
    pub piece_count: usize,
    pub byte_len: usize,
    pub data: usize,
}

impl Default for LobMetaLayout {
    fn default() -> Self {
        Self {
            lob_id: 0,
            seq: 1,
            piece_count: 2,
            byte_len: 3,
            data: 4,
        }
    }
}

impl LobMetaLayout {
    /// Column descriptors matching the default layout.
    pub fn default_columns() -> Vec<ColumnDesc> {
        vec![
            ColumnDesc::new("lob_id", DataType::UInt64),
            ColumnDesc::new("seq_id", DataType::UInt32),
            ColumnDesc::new("piece_count", DataType::UInt32),
            ColumnDesc::new("byte_len", DataType::UInt64),
            ColumnDesc::new("lob_data", DataType::LargeBinary),
        ]
    }

    pub(crate) fn validate(&self, columns: &[ColumnDesc]) -> Result<(), ConfigError> {
        let roles: [(&'static str, usize, fn(&DataType) -> bool, &'static str); 5] = [
            ("lob_id", self.lob_id, is_integer, "integer"),
            ("seq", self.seq, is_integer, "integer"),
            ("piece_count", self.piece_count, is_integer, "integer"),
            ("byte_len", self.byte_len, is_integer, "integer"),
            ("data", self.data, is_binary, "binary"),
        ];
        for (role, index, accepts, expected) in roles {
            let column = columns.get(index).ok_or(ConfigError::LayoutOutOfBounds {
                role,
                index,
                columns: columns.len(),
            })?;
            if !accepts(&column.data_type) {
                return Err(ConfigError::LayoutType {
                    role,
                    expected,
                    actual: column.data_type.clone(),
                });
            }
        }
        Ok(())
    }
}

fn is_integer(data_type: &DataType) -> bool {
    data_type.is_integer()
}

fn is_binary(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Binary | DataType::LargeBinary | DataType::FixedSizeBinary(_)
    )
}

/// Row shape and ordering rules shared by every source of one merge.
#[derive(Clone, Debug, Default)]
pub struct TableDataDesc {
    /// Primary-key ordering of the origin table.
    pub comparator: Option<DatumComparator>,
    /// Layout of the LOB meta piece rows carried by sorted runs.
    pub lob_meta: LobMetaLayout,
    /// Origin-table columns holding LOB references. Empty means every
    /// column is inspected for LOB locators.
    pub origin_lob_columns: Vec<usize>,
}

impl TableDataDesc {
    pub fn new(comparator: DatumComparator) -> Self {
        Self {
            comparator: Some(comparator),
            ..Self::default()
        }
    }

    pub fn origin_lob_columns(self, origin_lob_columns: Vec<usize>) -> Self {
        Self {
            origin_lob_columns,
            ..self
        }
    }

    pub fn lob_meta(self, lob_meta: LobMetaLayout) -> Self {
        Self { lob_meta, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum_row;

    #[test]
    fn comparator_honours_direction_and_prefix() {
        let cmp = DatumComparator::with_orders(vec![SortOrder::Asc, SortOrder::Desc]);
        assert_eq!(
            cmp.compare(&datum_row![1_i64, 5_i64], &datum_row![1_i64, 7_i64]),
            Ordering::Greater
        );
        assert_eq!(
            cmp.compare(&datum_row![1_i64], &datum_row![1_i64, 7_i64]),
            Ordering::Equal
        );
        assert_eq!(
            cmp.compare(&datum_row![0_i64, 9_i64], &datum_row![1_i64]),
            Ordering::Less
        );
    }

    #[test]
    fn comparator_ignores_non_key_columns() {
        let cmp = DatumComparator::new(1);
        assert_eq!(
            cmp.compare(&datum_row![3_i64, "a"], &datum_row![3_i64, "z"]),
            Ordering::Equal
        );
    }

    #[test]
    fn layout_validation_rejects_bad_columns() {
        let layout = LobMetaLayout::default();
        assert!(layout.validate(&LobMetaLayout::default_columns()).is_ok());

        let short = &LobMetaLayout::default_columns()[..3];
        assert_eq!(
            layout.validate(short),
            Err(ConfigError::LayoutOutOfBounds {
                role: "byte_len",
                index: 3,
                columns: 3,
            })
        );

        let mut columns = LobMetaLayout::default_columns();
        columns[4] = ColumnDesc::new("lob_data", DataType::Utf8);
        assert!(matches!(
            layout.validate(&columns),
            Err(ConfigError::LayoutType { role: "data", .. })
        ));
    }
}
