//! Table ↔ Arrow `RecordBatch`.
//!
//! Loads go through the same scalar transforms as the columnar encoder so a
//! value rejected by one path is rejected by the other. Results accept the
//! Arrow types the server emits, with dictionary strings resolved to plain
//! strings.

use super::encode::{encode_int, encode_real, encode_str};
use super::table::{Batch, Table};
use super::value::Value;
use crate::error::{MapdError, MapdResult};
use crate::types::{ColumnDesc, ColumnType, DatumType};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Decimal128Array, Float32Array,
    Float64Array, Int8Array, Int16Array, Int32Array, Int64Array, StringArray, Time32SecondArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Field, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, Schema, Time32MillisecondType, Time32SecondType,
    Time64MicrosecondType, Time64NanosecondType, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type,
    UInt16Type, UInt32Type,
};
use arrow::record_batch::RecordBatch;
use rust_decimal::Decimal;
use std::sync::Arc;

const SECONDS_PER_DAY: i64 = 86_400;

/// Arrow schema for a row descriptor.
pub fn arrow_schema(schema: &[ColumnDesc]) -> MapdResult<Schema> {
    let fields = schema
        .iter()
        .map(|d| Ok(Field::new(&d.name, d.col_type.to_arrow()?, d.col_type.nullable)))
        .collect::<MapdResult<Vec<_>>>()?;
    Ok(Schema::new(fields))
}

/// Convert a table to a record batch laid out by `schema`.
pub fn table_to_record_batch(table: &Table, schema: &[ColumnDesc]) -> MapdResult<RecordBatch> {
    let batch = Batch::Columns(table.clone());
    let columns = batch.aligned(schema)?;
    build_record_batch(&columns, schema)
}

/// Build a record batch from schema-aligned columns.
pub(crate) fn build_record_batch(
    columns: &[Vec<&Value>],
    schema: &[ColumnDesc],
) -> MapdResult<RecordBatch> {
    let arrays = columns
        .iter()
        .zip(schema)
        .map(|(values, desc)| build_array(values, &desc.col_type))
        .collect::<MapdResult<Vec<_>>>()?;
    Ok(RecordBatch::try_new(Arc::new(arrow_schema(schema)?), arrays)?)
}

fn ints(values: &[&Value], ty: &ColumnType) -> MapdResult<Vec<Option<i64>>> {
    values
        .iter()
        .map(|v| if v.is_null() { Ok(None) } else { encode_int(v, ty).map(Some) })
        .collect()
}

fn reals(values: &[&Value], ty: &ColumnType) -> MapdResult<Vec<Option<f64>>> {
    values
        .iter()
        .map(|v| if v.is_null() { Ok(None) } else { encode_real(v, ty).map(Some) })
        .collect()
}

fn build_array(values: &[&Value], ty: &ColumnType) -> MapdResult<ArrayRef> {
    if ty.is_array {
        return Err(MapdError::UnsupportedType(format!(
            "{}[] columns cannot be loaded through Arrow",
            ty.datum
        )));
    }
    // integer widths were range-checked by encode_int
    let array: ArrayRef = match ty.datum {
        DatumType::Bool => Arc::new(BooleanArray::from(
            ints(values, ty)?.into_iter().map(|v| v.map(|i| i != 0)).collect::<Vec<_>>(),
        )),
        DatumType::TinyInt => Arc::new(Int8Array::from(
            ints(values, ty)?.into_iter().map(|v| v.map(|i| i as i8)).collect::<Vec<_>>(),
        )),
        DatumType::SmallInt => Arc::new(Int16Array::from(
            ints(values, ty)?.into_iter().map(|v| v.map(|i| i as i16)).collect::<Vec<_>>(),
        )),
        DatumType::Int => Arc::new(Int32Array::from(
            ints(values, ty)?.into_iter().map(|v| v.map(|i| i as i32)).collect::<Vec<_>>(),
        )),
        DatumType::BigInt => Arc::new(Int64Array::from(ints(values, ty)?)),
        DatumType::Float => Arc::new(Float32Array::from(
            reals(values, ty)?.into_iter().map(|v| v.map(|f| f as f32)).collect::<Vec<_>>(),
        )),
        DatumType::Double => Arc::new(Float64Array::from(reals(values, ty)?)),
        DatumType::Decimal => {
            let DataType::Decimal128(precision, scale) = ty.to_arrow()? else {
                return Err(MapdError::UnsupportedType(ty.datum.to_string()));
            };
            Arc::new(
                Decimal128Array::from(
                    ints(values, ty)?.into_iter().map(|v| v.map(i128::from)).collect::<Vec<_>>(),
                )
                .with_precision_and_scale(precision, scale)?,
            )
        }
        DatumType::Time => Arc::new(Time32SecondArray::from(
            ints(values, ty)?.into_iter().map(|v| v.map(|s| s as i32)).collect::<Vec<_>>(),
        )),
        DatumType::Date => Arc::new(Date32Array::from(
            ints(values, ty)?
                .into_iter()
                .map(|v| v.map(|s| s.div_euclid(SECONDS_PER_DAY) as i32))
                .collect::<Vec<_>>(),
        )),
        DatumType::Timestamp => {
            let ticks = ints(values, ty)?;
            match crate::types::column::time_unit(ty.precision) {
                TimeUnit::Second => Arc::new(TimestampSecondArray::from(ticks)),
                TimeUnit::Millisecond => Arc::new(TimestampMillisecondArray::from(ticks)),
                TimeUnit::Microsecond => Arc::new(TimestampMicrosecondArray::from(ticks)),
                TimeUnit::Nanosecond => Arc::new(TimestampNanosecondArray::from(ticks)),
            }
        }
        DatumType::Str
        | DatumType::Point
        | DatumType::LineString
        | DatumType::Polygon
        | DatumType::MultiPolygon => Arc::new(StringArray::from(
            values
                .iter()
                .map(|v| if v.is_null() { Ok(None) } else { encode_str(v, ty).map(Some) })
                .collect::<MapdResult<Vec<_>>>()?,
        )),
    };
    Ok(array)
}

/// Convert a record batch from a result stream to a table.
pub fn record_batch_to_table(batch: &RecordBatch) -> MapdResult<Table> {
    let schema = batch.schema();
    let names = schema.fields().iter().map(|f| f.name().clone()).collect();
    let columns = batch
        .columns()
        .iter()
        .zip(schema.fields())
        .map(|(array, field)| {
            array_values(array).map_err(|e| match e {
                MapdError::UnsupportedType(m) => {
                    MapdError::UnsupportedType(format!("column '{}': {m}", field.name()))
                }
                other => other,
            })
        })
        .collect::<MapdResult<Vec<_>>>()?;
    Table::new(names, columns)
}

macro_rules! collect_values {
    ($array:expr, |$v:ident| $convert:expr) => {{
        let array = $array;
        (0..array.len())
            .map(|i| {
                if array.is_null(i) {
                    Ok(Value::Null)
                } else {
                    let $v = array.value(i);
                    $convert
                }
            })
            .collect::<MapdResult<Vec<Value>>>()
    }};
}

macro_rules! collect_temporal {
    ($array:expr, $method:ident, $variant:ident) => {{
        let array = $array;
        (0..array.len())
            .map(|i| {
                if array.is_null(i) {
                    Ok(Value::Null)
                } else {
                    array.$method(i).map(Value::$variant).ok_or_else(|| {
                        MapdError::Value(format!("{:?} out of range at row {i}", array.data_type()))
                    })
                }
            })
            .collect::<MapdResult<Vec<Value>>>()
    }};
}

fn array_values(array: &ArrayRef) -> MapdResult<Vec<Value>> {
    match array.data_type() {
        DataType::Boolean => collect_values!(array.as_boolean(), |v| Ok(Value::Bool(v))),
        DataType::Int8 => collect_values!(array.as_primitive::<Int8Type>(), |v| Ok(Value::from(v))),
        DataType::Int16 => collect_values!(array.as_primitive::<Int16Type>(), |v| Ok(Value::from(v))),
        DataType::Int32 => collect_values!(array.as_primitive::<Int32Type>(), |v| Ok(Value::from(v))),
        DataType::Int64 => collect_values!(array.as_primitive::<Int64Type>(), |v| Ok(Value::Int(v))),
        DataType::UInt8 => {
            collect_values!(array.as_primitive::<UInt8Type>(), |v| Ok(Value::Int(v as i64)))
        }
        DataType::UInt16 => {
            collect_values!(array.as_primitive::<UInt16Type>(), |v| Ok(Value::Int(v as i64)))
        }
        DataType::UInt32 => {
            collect_values!(array.as_primitive::<UInt32Type>(), |v| Ok(Value::Int(v as i64)))
        }
        DataType::Float32 => {
            collect_values!(array.as_primitive::<Float32Type>(), |v| Ok(Value::Float(v as f64)))
        }
        DataType::Float64 => {
            collect_values!(array.as_primitive::<Float64Type>(), |v| Ok(Value::Float(v)))
        }
        DataType::Utf8 => collect_values!(array.as_string::<i32>(), |v| Ok(Value::from(v))),
        DataType::LargeUtf8 => collect_values!(array.as_string::<i64>(), |v| Ok(Value::from(v))),
        DataType::Dictionary(_, value_type)
            if matches!(value_type.as_ref(), DataType::Utf8 | DataType::LargeUtf8) =>
        {
            let resolved = cast(array, &DataType::Utf8)?;
            array_values(&resolved)
        }
        DataType::Decimal128(_, scale) => {
            let scale = u32::try_from(*scale)
                .map_err(|_| MapdError::UnsupportedType(format!("negative decimal scale {scale}")))?;
            collect_values!(array.as_primitive::<arrow::datatypes::Decimal128Type>(), |v| {
                Decimal::try_from_i128_with_scale(v, scale)
                    .map(Value::Decimal)
                    .map_err(|e| MapdError::Value(e.to_string()))
            })
        }
        DataType::Date32 => collect_temporal!(array.as_primitive::<Date32Type>(), value_as_date, Date),
        DataType::Date64 => collect_temporal!(array.as_primitive::<Date64Type>(), value_as_date, Date),
        DataType::Time32(TimeUnit::Second) => {
            collect_temporal!(array.as_primitive::<Time32SecondType>(), value_as_time, Time)
        }
        DataType::Time32(TimeUnit::Millisecond) => {
            collect_temporal!(array.as_primitive::<Time32MillisecondType>(), value_as_time, Time)
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            collect_temporal!(array.as_primitive::<Time64MicrosecondType>(), value_as_time, Time)
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            collect_temporal!(array.as_primitive::<Time64NanosecondType>(), value_as_time, Time)
        }
        DataType::Timestamp(TimeUnit::Second, _) => {
            collect_temporal!(array.as_primitive::<TimestampSecondType>(), value_as_datetime, Timestamp)
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => collect_temporal!(
            array.as_primitive::<TimestampMillisecondType>(),
            value_as_datetime,
            Timestamp
        ),
        DataType::Timestamp(TimeUnit::Microsecond, _) => collect_temporal!(
            array.as_primitive::<TimestampMicrosecondType>(),
            value_as_datetime,
            Timestamp
        ),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => collect_temporal!(
            array.as_primitive::<TimestampNanosecondType>(),
            value_as_datetime,
            Timestamp
        ),
        other => Err(MapdError::UnsupportedType(format!("arrow type {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{DictionaryArray, Int32Array};
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn desc(name: &str, ty: ColumnType) -> ColumnDesc {
        ColumnDesc::new(name, ty)
    }

    #[test]
    fn load_and_result_conversions_agree() {
        let d = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        let ts = d.and_hms_milli_opt(5, 6, 7, 890).unwrap();
        let table = Table::builder()
            .column("flag", vec![Value::Bool(true), Value::Null])
            .column("n", vec![Value::Int(7), Value::Int(-3)])
            .column("price", vec![Value::Decimal(Decimal::from_str("1.25").unwrap()), Value::Null])
            .column("day", vec![Value::Date(d), Value::Null])
            .column("at", vec![Value::Timestamp(ts), Value::Null])
            .column("name", vec![Value::from("a"), Value::Null])
            .build()
            .unwrap();
        let schema = vec![
            desc("flag", ColumnType::new(DatumType::Bool)),
            desc("n", ColumnType::new(DatumType::SmallInt)),
            desc("price", ColumnType::decimal(10, 2)),
            desc("day", ColumnType::new(DatumType::Date)),
            desc("at", ColumnType::timestamp(3)),
            desc("name", ColumnType::new(DatumType::Str)),
        ];
        let batch = table_to_record_batch(&table, &schema).unwrap();
        assert_eq!(batch.column(1).data_type(), &DataType::Int16);
        let back = record_batch_to_table(&batch).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn dictionary_strings_resolve() {
        let dict: DictionaryArray<Int32Type> = vec![Some("a"), None, Some("a"), Some("b")]
            .into_iter()
            .collect();
        let schema = Arc::new(Schema::new(vec![Field::new(
            "s",
            dict.data_type().clone(),
            true,
        )]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(dict)]).unwrap();
        let table = record_batch_to_table(&batch).unwrap();
        assert_eq!(
            table.column("s").unwrap(),
            &[Value::from("a"), Value::Null, Value::from("a"), Value::from("b")]
        );
    }

    #[test]
    fn arrays_are_rejected_for_arrow_loads() {
        let table = Table::builder().column("xs", vec![vec![1i64]]).build().unwrap();
        let schema = vec![desc("xs", ColumnType::new(DatumType::Int).array())];
        assert!(matches!(
            table_to_record_batch(&table, &schema),
            Err(MapdError::UnsupportedType(_))
        ));
    }

    #[test]
    fn oversized_decimal_is_rejected_not_truncated() {
        let table = Table::builder()
            .column("amount", vec![Value::Decimal(Decimal::new(125, 2))])
            .build()
            .unwrap();
        let schema = vec![desc("amount", ColumnType::decimal(300, 2))];
        assert!(matches!(arrow_schema(&schema), Err(MapdError::UnsupportedType(_))));
        assert!(matches!(
            table_to_record_batch(&table, &schema),
            Err(MapdError::UnsupportedType(_))
        ));
    }

    #[test]
    fn int32_results_become_ints() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, true)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![Some(1), None]))])
                .unwrap();
        let table = record_batch_to_table(&batch).unwrap();
        assert_eq!(table.rows(), vec![vec![Value::Int(1)], vec![Value::Null]]);
    }
}
