//! Decoding Arrow record batches into [`DatumRow`]s.

use arrow::{
    array::{Array, ArrayRef, AsArray},
    datatypes::{
        ArrowPrimitiveType, DataType, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
        UInt32Type, UInt64Type, UInt8Type,
    },
    record_batch::RecordBatch,
};
use bytes::Bytes;

use super::{Datum, DatumRow, LobLocator};
use crate::{desc::ColumnDesc, error::SourceError};

/// Decode every row of `batch` following `columns`.
///
/// `origin` names the batch in decode errors. The batch must carry exactly
/// one array per descriptor, each with the descriptor's data type.
pub fn decode_batch(
    batch: &RecordBatch,
    columns: &[ColumnDesc],
    origin: &str,
) -> Result<Vec<DatumRow>, SourceError> {
    if batch.num_columns() != columns.len() {
        return Err(SourceError::decode(
            origin,
            format!(
                "batch has {} columns, descriptors declare {}",
                batch.num_columns(),
                columns.len()
            ),
        ));
    }
    let mut rows: Vec<Vec<Datum>> = (0..batch.num_rows())
        .map(|_| Vec::with_capacity(columns.len()))
        .collect();
    for (array, column) in batch.columns().iter().zip(columns) {
        if array.data_type() != &column.data_type {
            return Err(SourceError::decode(
                origin,
                format!(
                    "column `{}` is {:?}, expected {:?}",
                    column.name,
                    array.data_type(),
                    column.data_type
                ),
            ));
        }
        if column.is_lob {
            decode_lob_column(array, column, origin, &mut rows)?;
        } else {
            decode_plain_column(array, column, origin, &mut rows)?;
        }
    }
    Ok(rows.into_iter().map(DatumRow::new).collect())
}

fn decode_plain_column(
    array: &ArrayRef,
    column: &ColumnDesc,
    origin: &str,
    rows: &mut [Vec<Datum>],
) -> Result<(), SourceError> {
    match array.data_type() {
        DataType::Boolean => {
            let values = array.as_boolean();
            push_cells(array, rows, |idx| Datum::Bool(values.value(idx)));
        }
        DataType::Int8 => push_signed::<Int8Type>(array, rows),
        DataType::Int16 => push_signed::<Int16Type>(array, rows),
        DataType::Int32 => push_signed::<Int32Type>(array, rows),
        DataType::Int64 => push_signed::<Int64Type>(array, rows),
        DataType::UInt8 => push_unsigned::<UInt8Type>(array, rows),
        DataType::UInt16 => push_unsigned::<UInt16Type>(array, rows),
        DataType::UInt32 => push_unsigned::<UInt32Type>(array, rows),
        DataType::UInt64 => push_unsigned::<UInt64Type>(array, rows),
        DataType::Utf8 => {
            let values = array.as_string::<i32>();
            push_cells(array, rows, |idx| Datum::from(values.value(idx)));
        }
        DataType::LargeUtf8 => {
            let values = array.as_string::<i64>();
            push_cells(array, rows, |idx| Datum::from(values.value(idx)));
        }
        DataType::Binary => {
            let values = array.as_binary::<i32>();
            push_cells(array, rows, |idx| {
                Datum::Binary(Bytes::copy_from_slice(values.value(idx)))
            });
        }
        DataType::LargeBinary => {
            let values = array.as_binary::<i64>();
            push_cells(array, rows, |idx| {
                Datum::Binary(Bytes::copy_from_slice(values.value(idx)))
            });
        }
        other => {
            return Err(SourceError::decode(
                origin,
                format!("column `{}` has unsupported type {other:?}", column.name),
            ))
        }
    }
    Ok(())
}

// Int64 cells are out-of-row ids; binary cells are inline values.
fn decode_lob_column(
    array: &ArrayRef,
    column: &ColumnDesc,
    origin: &str,
    rows: &mut [Vec<Datum>],
) -> Result<(), SourceError> {
    match array.data_type() {
        DataType::Int64 => {
            let values = array.as_primitive::<Int64Type>();
            push_cells(array, rows, |idx| {
                Datum::Lob(LobLocator::outrow(values.value(idx)))
            });
        }
        DataType::Binary => {
            let values = array.as_binary::<i32>();
            push_cells(array, rows, |idx| {
                Datum::Lob(LobLocator::Inrow(Bytes::copy_from_slice(values.value(idx))))
            });
        }
        DataType::LargeBinary => {
            let values = array.as_binary::<i64>();
            push_cells(array, rows, |idx| {
                Datum::Lob(LobLocator::Inrow(Bytes::copy_from_slice(values.value(idx))))
            });
        }
        other => {
            return Err(SourceError::decode(
                origin,
                format!("lob column `{}` cannot be {other:?}", column.name),
            ))
        }
    }
    Ok(())
}

fn push_signed<T>(array: &ArrayRef, rows: &mut [Vec<Datum>])
where
    T: ArrowPrimitiveType,
    T::Native: Into<i64>,
{
    let values = array.as_primitive::<T>();
    push_cells(array, rows, |idx| Datum::Int(values.value(idx).into()));
}

fn push_unsigned<T>(array: &ArrayRef, rows: &mut [Vec<Datum>])
where
    T: ArrowPrimitiveType,
    T::Native: Into<u64>,
{
    let values = array.as_primitive::<T>();
    push_cells(array, rows, |idx| Datum::UInt(values.value(idx).into()));
}

fn push_cells(array: &ArrayRef, rows: &mut [Vec<Datum>], value: impl Fn(usize) -> Datum) {
    for (idx, row) in rows.iter_mut().enumerate() {
        if array.is_null(idx) {
            row.push(Datum::Null);
        } else {
            row.push(value(idx));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{Int64Array, LargeBinaryArray, StringArray, UInt32Array},
        datatypes::{Field, Schema},
    };

    use super::*;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("pk", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("doc", DataType::Int64, true),
            Field::new("n", DataType::UInt32, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some("a"), None])) as ArrayRef,
                Arc::new(Int64Array::from(vec![Some(42), None])) as ArrayRef,
                Arc::new(UInt32Array::from(vec![7, 8])) as ArrayRef,
            ],
        )
        .unwrap()
    }

    fn columns() -> Vec<ColumnDesc> {
        vec![
            ColumnDesc::new("pk", DataType::Int64),
            ColumnDesc::new("name", DataType::Utf8),
            ColumnDesc::lob("doc", DataType::Int64),
            ColumnDesc::new("n", DataType::UInt32),
        ]
    }

    #[test]
    fn decodes_plain_and_lob_columns() {
        let rows = decode_batch(&batch(), &columns(), "origin").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Datum::Int(1));
        assert_eq!(rows[0][1], Datum::from("a"));
        assert_eq!(rows[0][2], Datum::Lob(LobLocator::outrow(42)));
        assert_eq!(rows[0][3], Datum::UInt(7));
        assert_eq!(rows[1][1], Datum::Null);
        assert_eq!(rows[1][2], Datum::Null);
    }

    #[test]
    fn type_mismatch_is_a_decode_error() {
        let mut cols = columns();
        cols[1] = ColumnDesc::new("name", DataType::LargeUtf8);
        let err = decode_batch(&batch(), &cols, "origin").unwrap_err();
        assert!(matches!(err, SourceError::Decode { ref origin, .. } if origin == "origin"));
    }

    #[test]
    fn arity_mismatch_is_a_decode_error() {
        let err = decode_batch(&batch(), &columns()[..2], "run").unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }));
    }

    #[test]
    fn inline_lob_cells_keep_their_bytes() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "doc",
            DataType::LargeBinary,
            false,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(LargeBinaryArray::from_vec(vec![&b"hi"[..]])) as ArrayRef],
        )
        .unwrap();
        let rows = decode_batch(&batch, &[ColumnDesc::lob("doc", DataType::LargeBinary)], "t")
            .unwrap();
        assert_eq!(
            rows[0][0],
            Datum::Lob(LobLocator::Inrow(Bytes::from_static(b"hi")))
        );
    }
}
