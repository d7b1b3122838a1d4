//! Batch → wire encoding.
//!
//! Every format goes through the same per-column encoder: nulls are detected
//! once, replaced by the type's sentinel and recorded in the null mask, and
//! each non-null value passes through its type transform. Row-wise and text
//! payloads are produced from the encoded columns; Arrow payloads go through
//! [`super::arrow`].

use super::arrow::build_record_batch;
use super::geometry::Geometry;
use super::numeric::{decimal_to_f64, encode_decimal};
use super::table::Batch;
use super::temporal::{
    date_to_seconds, parse_date, parse_time, parse_timestamp, time_to_seconds, timestamp_to_ticks,
};
use super::value::Value;
use super::wire::{
    DatumVal, StringRow, StringValue, WireColumn, WireData, WireDatum, WireRow,
};
use crate::error::{MapdError, MapdResult};
use crate::stream::write_stream;
use crate::types::{ColumnDesc, ColumnType, DatumType, NullSentinel, SlotKind};
use chrono::NaiveTime;

/// Target representation for a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `load_table_binary_columnar`
    Columnar,
    /// `load_table_binary`
    Rows,
    /// `load_table` (text)
    Text,
    /// `load_table_binary_arrow`
    Arrow,
}

/// Encoded batch, one variant per [`WireFormat`].
#[derive(Debug, Clone, PartialEq)]
pub enum WirePayload {
    Columnar(Vec<WireColumn>),
    Rows(Vec<WireRow>),
    Text(Vec<StringRow>),
    Arrow(Vec<u8>),
}

/// Encode `batch` against `schema` in the requested format.
pub fn encode(batch: &Batch, schema: &[ColumnDesc], format: WireFormat) -> MapdResult<WirePayload> {
    match format {
        WireFormat::Columnar => encode_columns(batch, schema).map(WirePayload::Columnar),
        WireFormat::Rows => encode_rows(batch, schema).map(WirePayload::Rows),
        WireFormat::Text => encode_text(batch, schema).map(WirePayload::Text),
        WireFormat::Arrow => {
            let columns = batch.aligned(schema)?;
            let record_batch = build_record_batch(&columns, schema)?;
            write_stream(&record_batch).map(WirePayload::Arrow)
        }
    }
}

/// Columnar encoding: one [`WireColumn`] per schema column.
pub fn encode_columns(batch: &Batch, schema: &[ColumnDesc]) -> MapdResult<Vec<WireColumn>> {
    let columns = batch.aligned(schema)?;
    columns
        .iter()
        .zip(schema)
        .map(|(values, desc)| encode_column(values, &desc.col_type))
        .collect()
}

/// Columnar encoding split into chunks of roughly `chunk_size_bytes` each.
///
/// Rows are never split and order is preserved; a row larger than the budget
/// gets a chunk of its own. `0` disables chunking.
pub fn encode_columns_chunked(
    batch: &Batch,
    schema: &[ColumnDesc],
    chunk_size_bytes: usize,
) -> MapdResult<Vec<Vec<WireColumn>>> {
    let columns = batch.aligned(schema)?;
    let rows = batch.num_rows();
    let ranges = if chunk_size_bytes == 0 || rows == 0 {
        vec![0..rows]
    } else {
        chunk_ranges(&columns, rows, chunk_size_bytes)
    };
    ranges
        .into_iter()
        .map(|range| {
            columns
                .iter()
                .zip(schema)
                .map(|(values, desc)| encode_column(&values[range.clone()], &desc.col_type))
                .collect()
        })
        .collect()
}

fn chunk_ranges(columns: &[Vec<&Value>], rows: usize, budget: usize) -> Vec<std::ops::Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut used = 0;
    for row in 0..rows {
        let size: usize = columns.iter().map(|c| c[row].estimated_size() + 1).sum();
        if row > start && used + size > budget {
            ranges.push(start..row);
            start = row;
            used = 0;
        }
        used += size;
    }
    ranges.push(start..rows);
    ranges
}

/// Row-wise binary encoding.
pub fn encode_rows(batch: &Batch, schema: &[ColumnDesc]) -> MapdResult<Vec<WireRow>> {
    let columns = encode_columns(batch, schema)?;
    let rows = batch.num_rows();
    Ok((0..rows)
        .map(|r| WireRow {
            cols: columns.iter().map(|c| datum_at(c, r)).collect(),
        })
        .collect())
}

fn datum_at(column: &WireColumn, row: usize) -> WireDatum {
    let val = match &column.data {
        WireData::Int(v) => DatumVal::Int(v[row]),
        WireData::Real(v) => DatumVal::Real(v[row]),
        WireData::Str(v) => DatumVal::Str(v[row].clone()),
        WireData::Array(v) => {
            let inner = &v[row];
            DatumVal::Array((0..inner.len()).map(|i| datum_at(inner, i)).collect())
        }
    };
    WireDatum {
        val,
        is_null: column.nulls[row],
    }
}

/// Text encoding for the plain `load_table` call. Values are validated
/// against the schema first so bad input fails here, not on the server.
pub fn encode_text(batch: &Batch, schema: &[ColumnDesc]) -> MapdResult<Vec<StringRow>> {
    encode_columns(batch, schema)?;
    let columns = batch.aligned(schema)?;
    let rows = batch.num_rows();
    Ok((0..rows)
        .map(|r| StringRow {
            cols: columns
                .iter()
                .map(|c| {
                    let v = c[r];
                    if v.is_null() {
                        StringValue {
                            str_val: String::new(),
                            is_null: true,
                        }
                    } else {
                        StringValue {
                            str_val: v.to_string(),
                            is_null: false,
                        }
                    }
                })
                .collect(),
        })
        .collect())
}

/// Encode one column's values against its type.
pub fn encode_column(values: &[&Value], ty: &ColumnType) -> MapdResult<WireColumn> {
    if ty.is_array {
        return encode_array_column(values, ty);
    }
    let nulls: Vec<bool> = values.iter().map(|v| v.is_null()).collect();
    let data = match ty.slot() {
        SlotKind::Int => {
            let sentinel = int_sentinel(ty);
            WireData::Int(
                values
                    .iter()
                    .zip(&nulls)
                    .map(|(v, &null)| if null { Ok(sentinel) } else { encode_int(v, ty) })
                    .collect::<MapdResult<_>>()?,
            )
        }
        SlotKind::Real => {
            let sentinel = real_sentinel(ty);
            WireData::Real(
                values
                    .iter()
                    .zip(&nulls)
                    .map(|(v, &null)| if null { Ok(sentinel) } else { encode_real(v, ty) })
                    .collect::<MapdResult<_>>()?,
            )
        }
        SlotKind::Str => WireData::Str(
            values
                .iter()
                .zip(&nulls)
                .map(|(v, &null)| if null { Ok(String::new()) } else { encode_str(v, ty) })
                .collect::<MapdResult<_>>()?,
        ),
    };
    Ok(WireColumn { data, nulls })
}

/// Arrays: one inner column per row. A null row carries a one-element
/// sentinel column; an empty array is a zero-length column with a `false`
/// mask entry.
fn encode_array_column(values: &[&Value], ty: &ColumnType) -> MapdResult<WireColumn> {
    let element = ty.element();
    let mut rows = Vec::with_capacity(values.len());
    let mut nulls = Vec::with_capacity(values.len());
    for v in values {
        match v {
            Value::Array(items) => {
                let refs: Vec<&Value> = items.iter().collect();
                rows.push(encode_column(&refs, &element)?);
                nulls.push(false);
            }
            v if v.is_null() => {
                rows.push(encode_column(&[&Value::Null], &element)?);
                nulls.push(true);
            }
            other => {
                return Err(MapdError::SchemaMismatch(format!(
                    "{} value in array column of {}",
                    other.kind(),
                    ty.datum
                )));
            }
        }
    }
    Ok(WireColumn {
        data: WireData::Array(rows),
        nulls,
    })
}

fn int_sentinel(ty: &ColumnType) -> i64 {
    match ty.null_sentinel() {
        NullSentinel::Int(v) => v,
        _ => i64::MIN,
    }
}

fn real_sentinel(ty: &ColumnType) -> f64 {
    match ty.null_sentinel() {
        NullSentinel::Real(v) => v,
        _ => 0.0,
    }
}

fn mismatch(value: &Value, ty: &ColumnType) -> MapdError {
    MapdError::SchemaMismatch(format!("{} value in {} column", value.kind(), ty.datum))
}

/// Non-null value → int slot.
pub(crate) fn encode_int(value: &Value, ty: &ColumnType) -> MapdResult<i64> {
    match ty.datum {
        DatumType::Bool => match value {
            Value::Bool(b) => Ok(*b as i64),
            Value::Int(i @ (0 | 1)) => Ok(*i),
            other => Err(mismatch(other, ty)),
        },
        DatumType::TinyInt | DatumType::SmallInt | DatumType::Int | DatumType::BigInt => {
            let i = match value {
                Value::Int(i) => *i,
                other => return Err(mismatch(other, ty)),
            };
            match ty.datum.integer_range() {
                Some((lo, hi)) if i < lo || i > hi => {
                    Err(MapdError::Value(format!("{i} out of range for {}", ty.datum)))
                }
                _ => Ok(i),
            }
        }
        DatumType::Decimal => encode_decimal(value, ty.precision, ty.scale),
        DatumType::Time => match value {
            Value::Time(t) => Ok(time_to_seconds(*t)),
            Value::Timestamp(ts) => Ok(time_to_seconds(ts.time())),
            Value::Str(s) => parse_time(s).map(time_to_seconds),
            Value::Int(i) if (0..86_400).contains(i) => Ok(*i),
            Value::Int(i) => Err(MapdError::Value(format!("{i} is not a time of day in seconds"))),
            other => Err(mismatch(other, ty)),
        },
        DatumType::Date => match value {
            Value::Date(d) => Ok(date_to_seconds(*d)),
            Value::Timestamp(ts) => Ok(date_to_seconds(ts.date())),
            Value::Str(s) => parse_date(s).map(date_to_seconds),
            other => Err(mismatch(other, ty)),
        },
        DatumType::Timestamp => match value {
            Value::Timestamp(ts) => timestamp_to_ticks(*ts, ty.precision),
            Value::Date(d) => timestamp_to_ticks(d.and_time(NaiveTime::MIN), ty.precision),
            Value::Str(s) => timestamp_to_ticks(parse_timestamp(s)?, ty.precision),
            // already ticks since the epoch
            Value::Int(i) => Ok(*i),
            other => Err(mismatch(other, ty)),
        },
        _ => Err(mismatch(value, ty)),
    }
}

/// Non-null value → real slot.
pub(crate) fn encode_real(value: &Value, ty: &ColumnType) -> MapdResult<f64> {
    let f = match value {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        Value::Decimal(d) => decimal_to_f64(d)?,
        other => return Err(mismatch(other, ty)),
    };
    if ty.datum == DatumType::Float && f.is_finite() && f.abs() > f32::MAX as f64 {
        return Err(MapdError::Value(format!("{f} out of range for FLOAT")));
    }
    Ok(f)
}

/// Non-null value → string slot (geometry as WKT).
pub(crate) fn encode_str(value: &Value, ty: &ColumnType) -> MapdResult<String> {
    match (ty.datum, value) {
        (DatumType::Str, Value::Str(s)) => Ok(s.clone()),
        (d, Value::Geometry(g)) if d.is_geo() => {
            if g.type_name() != crate::types::display_name_for(d) {
                return Err(MapdError::SchemaMismatch(format!(
                    "{} value in {d} column",
                    g.type_name()
                )));
            }
            g.check_finite()?;
            Ok(g.to_wkt())
        }
        // pre-formatted WKT
        (d, Value::Str(s)) if d.is_geo() => {
            Geometry::from_wkt(s)?;
            Ok(s.clone())
        }
        (_, other) => Err(mismatch(other, ty)),
    }
}
