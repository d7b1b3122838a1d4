//! Column type inference from in-process values.
//!
//! Kept apart from encode/decode: the codec only ever sees an explicit
//! `ColumnType`.

use super::table::Table;
use super::value::Value;
use crate::error::{MapdError, MapdResult};
use crate::types::{ColumnDesc, ColumnType, DatumType, Encoding};
use chrono::Timelike;

/// Geometry columns are created with this coordinate precision.
const GEO_PRECISION: i32 = 23;
const DICT_BITS: i32 = 32;

/// Infer a column type from its values.
///
/// The first non-null value picks the kind; integer and float columns widen
/// across all values (INT → BIGINT, INT + FLOAT → DOUBLE, INT + DECIMAL →
/// DECIMAL). All-null columns can't be typed.
pub fn infer_column_type(values: &[Value]) -> MapdResult<ColumnType> {
    let first = values
        .iter()
        .find(|v| !v.is_null())
        .ok_or_else(|| MapdError::SchemaMismatch("cannot infer the type of an all-null column".into()))?;

    let ty = match first {
        Value::Array(_) => {
            let elements: Vec<Value> = values
                .iter()
                .filter_map(|v| match v {
                    Value::Array(items) => Some(items.iter().cloned()),
                    _ => None,
                })
                .flatten()
                .collect();
            return infer_column_type(&elements).map(ColumnType::array);
        }
        Value::Bool(_) => ColumnType::new(DatumType::Bool),
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => infer_numeric(values)?,
        Value::Str(_) => ColumnType::new(DatumType::Str).with_encoding(Encoding::Dict, DICT_BITS),
        Value::Date(_) => ColumnType::new(DatumType::Date),
        Value::Time(_) => ColumnType::new(DatumType::Time),
        Value::Timestamp(_) => ColumnType::timestamp(timestamp_precision(values)),
        Value::Geometry(g) => {
            let datum = DatumType::from_name(g.type_name())?;
            ColumnType {
                precision: GEO_PRECISION,
                ..ColumnType::new(datum)
            }
        }
        Value::Null => return Err(MapdError::SchemaMismatch("null sample".into())),
    };
    Ok(ty)
}

fn infer_numeric(values: &[Value]) -> MapdResult<ColumnType> {
    let mut max_int = 0u64;
    let mut has_float = false;
    let mut decimal_scale: Option<u32> = None;
    for v in values.iter().filter(|v| !v.is_null()) {
        match v {
            Value::Int(i) => max_int = max_int.max(i.unsigned_abs()),
            Value::Float(_) => has_float = true,
            Value::Decimal(d) => decimal_scale = Some(decimal_scale.unwrap_or(0).max(d.scale())),
            other => {
                return Err(MapdError::SchemaMismatch(format!(
                    "{} value in a numeric column",
                    other.kind()
                )));
            }
        }
    }
    Ok(match (has_float, decimal_scale) {
        (true, _) => ColumnType::new(DatumType::Double),
        (false, Some(scale)) => ColumnType::decimal(18, scale as i32),
        (false, None) if max_int > i32::MAX as u64 => ColumnType::new(DatumType::BigInt),
        (false, None) => ColumnType::new(DatumType::Int),
    })
}

/// Finest of 0/3/6/9 that keeps every value's fractional seconds.
fn timestamp_precision(values: &[Value]) -> i32 {
    values
        .iter()
        .filter_map(|v| match v {
            Value::Timestamp(ts) => Some(ts.nanosecond() % 1_000_000_000),
            _ => None,
        })
        .map(|nanos| match nanos {
            0 => 0,
            n if n % 1_000_000 == 0 => 3,
            n if n % 1_000 == 0 => 6,
            _ => 9,
        })
        .max()
        .unwrap_or(0)
}

/// Infer a row descriptor for `create_table` from a table's contents.
pub fn build_row_desc(table: &Table) -> MapdResult<Vec<ColumnDesc>> {
    table
        .names()
        .iter()
        .zip(table.columns())
        .map(|(name, values)| {
            infer_column_type(values)
                .map(|ty| ColumnDesc::new(name.clone(), ty))
                .map_err(|e| match e {
                    MapdError::SchemaMismatch(m) => {
                        MapdError::SchemaMismatch(format!("column '{name}': {m}"))
                    }
                    other => other,
                })
        })
        .collect()
}
