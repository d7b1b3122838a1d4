//! Wire → `Table` decoding.
//!
//! Nullness comes from the null mask only. Slot contents at masked positions
//! are never inspected, so sentinel choices on the server side can't leak
//! into values.

use super::arrow::record_batch_to_table;
use super::encode::WirePayload;
use super::geometry::Geometry;
use super::numeric::{decode_decimal, decode_decimal_real};
use super::table::Table;
use super::temporal::{
    parse_date, parse_time, parse_timestamp, seconds_to_date, seconds_to_time, ticks_to_timestamp,
};
use super::value::Value;
use super::wire::{DatumVal, StringRow, WireColumn, WireData, WireDatum, WireRow, validate_columns};
use crate::error::{MapdError, MapdResult};
use crate::stream::read_stream;
use crate::types::{ColumnDesc, ColumnType, DatumType};
use arrow::buffer::Buffer;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Decode any payload produced by [`super::encode`].
pub fn decode(payload: &WirePayload, schema: &[ColumnDesc]) -> MapdResult<Table> {
    match payload {
        WirePayload::Columnar(columns) => decode_columns(columns, schema),
        WirePayload::Rows(rows) => decode_rows(rows, schema),
        WirePayload::Text(rows) => decode_text(rows, schema),
        WirePayload::Arrow(bytes) => decode_arrow(bytes, schema),
    }
}

/// Arrow stream → table. Geometry travels as WKT strings and is parsed back
/// for the schema's geo columns.
fn decode_arrow(bytes: &[u8], schema: &[ColumnDesc]) -> MapdResult<Table> {
    let (_, batches) = read_stream(&Buffer::from_vec(bytes.to_vec()))?;
    let names: Vec<String> = schema.iter().map(|d| d.name.clone()).collect();
    let mut columns: Vec<Vec<Value>> = schema.iter().map(|_| Vec::new()).collect();
    for batch in &batches {
        let (part_names, part) = record_batch_to_table(batch)?.into_columns();
        if part_names != names {
            return Err(MapdError::SchemaMismatch(format!(
                "arrow columns {part_names:?} do not match {names:?}"
            )));
        }
        for ((out, values), desc) in columns.iter_mut().zip(part).zip(schema) {
            if !desc.col_type.datum.is_geo() {
                out.extend(values);
                continue;
            }
            for value in values {
                out.push(match value {
                    Value::Str(wkt) => Geometry::from_wkt(&wkt)
                        .map(Value::Geometry)
                        .map_err(|e| annotate(e, &desc.name))?,
                    other => other,
                });
            }
        }
    }
    Table::new(names, columns)
}

/// Columnar wire result → table.
pub fn decode_columns(columns: &[WireColumn], schema: &[ColumnDesc]) -> MapdResult<Table> {
    if columns.len() != schema.len() {
        return Err(MapdError::SchemaMismatch(format!(
            "{} wire columns for {} schema columns",
            columns.len(),
            schema.len()
        )));
    }
    validate_columns(columns)?;
    let values = columns
        .iter()
        .zip(schema)
        .map(|(col, desc)| {
            decode_column(col, &desc.col_type).map_err(|e| annotate(e, &desc.name))
        })
        .collect::<MapdResult<Vec<_>>>()?;
    Table::new(schema.iter().map(|d| d.name.clone()).collect(), values)
}

fn annotate(err: MapdError, column: &str) -> MapdError {
    match err {
        MapdError::SchemaMismatch(m) => MapdError::SchemaMismatch(format!("column '{column}': {m}")),
        MapdError::Value(m) => MapdError::Value(format!("column '{column}': {m}")),
        other => other,
    }
}

/// Decode one wire column against its type.
pub fn decode_column(column: &WireColumn, ty: &ColumnType) -> MapdResult<Vec<Value>> {
    column.validate()?;
    let nulls = &column.nulls;
    match (&column.data, ty.is_array) {
        (WireData::Array(rows), true) => {
            let element = ty.element();
            rows.iter()
                .zip(nulls)
                .map(|(inner, &null)| {
                    if null {
                        Ok(Value::Null)
                    } else {
                        decode_column(inner, &element).map(Value::Array)
                    }
                })
                .collect()
        }
        (WireData::Int(raw), false) => raw
            .iter()
            .zip(nulls)
            .map(|(&v, &null)| if null { Ok(Value::Null) } else { decode_int(v, ty) })
            .collect(),
        (WireData::Real(raw), false) => raw
            .iter()
            .zip(nulls)
            .map(|(&v, &null)| if null { Ok(Value::Null) } else { decode_real(v, ty) })
            .collect(),
        (WireData::Str(raw), false) => raw
            .iter()
            .zip(nulls)
            .map(|(v, &null)| if null { Ok(Value::Null) } else { decode_str(v, ty) })
            .collect(),
        (data, _) => Err(MapdError::SchemaMismatch(format!(
            "{} column arrived as {}",
            describe(ty),
            slot_name(data)
        ))),
    }
}

fn describe(ty: &ColumnType) -> String {
    if ty.is_array {
        format!("{}[]", ty.datum)
    } else {
        ty.datum.to_string()
    }
}

fn slot_name(data: &WireData) -> &'static str {
    match data {
        WireData::Int(_) => "int_col",
        WireData::Real(_) => "real_col",
        WireData::Str(_) => "str_col",
        WireData::Array(_) => "arr_col",
    }
}

/// Int slot → value.
pub(crate) fn decode_int(raw: i64, ty: &ColumnType) -> MapdResult<Value> {
    match ty.datum {
        DatumType::Bool => Ok(Value::Bool(raw != 0)),
        DatumType::TinyInt | DatumType::SmallInt | DatumType::Int | DatumType::BigInt => {
            Ok(Value::Int(raw))
        }
        DatumType::Decimal => decode_decimal(raw, ty.scale).map(Value::Decimal),
        DatumType::Time => seconds_to_time(raw).map(Value::Time),
        DatumType::Date => seconds_to_date(raw).map(Value::Date),
        DatumType::Timestamp => ticks_to_timestamp(raw, ty.precision).map(Value::Timestamp),
        other => Err(MapdError::SchemaMismatch(format!("{other} column arrived as int_col"))),
    }
}

/// Real slot → value. Query results send DECIMAL here too.
pub(crate) fn decode_real(raw: f64, ty: &ColumnType) -> MapdResult<Value> {
    match ty.datum {
        DatumType::Float | DatumType::Double => Ok(Value::Float(raw)),
        DatumType::Decimal => decode_decimal_real(raw, ty.scale).map(Value::Decimal),
        other => Err(MapdError::SchemaMismatch(format!("{other} column arrived as real_col"))),
    }
}

/// String slot → value.
pub(crate) fn decode_str(raw: &str, ty: &ColumnType) -> MapdResult<Value> {
    match ty.datum {
        DatumType::Str => Ok(Value::Str(raw.to_string())),
        d if d.is_geo() => Geometry::from_wkt(raw).map(Value::Geometry),
        other => Err(MapdError::SchemaMismatch(format!("{other} column arrived as str_col"))),
    }
}

/// Row-wise wire result → table.
pub fn decode_rows(rows: &[WireRow], schema: &[ColumnDesc]) -> MapdResult<Table> {
    let mut columns: Vec<Vec<Value>> = schema.iter().map(|_| Vec::with_capacity(rows.len())).collect();
    for (r, row) in rows.iter().enumerate() {
        if row.cols.len() != schema.len() {
            return Err(MapdError::SchemaMismatch(format!(
                "row {r} has {} values but the schema has {} columns",
                row.cols.len(),
                schema.len()
            )));
        }
        for ((datum, desc), out) in row.cols.iter().zip(schema).zip(columns.iter_mut()) {
            out.push(decode_datum(datum, &desc.col_type).map_err(|e| annotate(e, &desc.name))?);
        }
    }
    Table::new(schema.iter().map(|d| d.name.clone()).collect(), columns)
}

fn decode_datum(datum: &WireDatum, ty: &ColumnType) -> MapdResult<Value> {
    if datum.is_null {
        return Ok(Value::Null);
    }
    match (&datum.val, ty.is_array) {
        (DatumVal::Array(items), true) => {
            let element = ty.element();
            items
                .iter()
                .map(|d| decode_datum(d, &element))
                .collect::<MapdResult<Vec<_>>>()
                .map(Value::Array)
        }
        (DatumVal::Int(v), false) => decode_int(*v, ty),
        (DatumVal::Real(v), false) => decode_real(*v, ty),
        (DatumVal::Str(v), false) => decode_str(v, ty),
        _ => Err(MapdError::SchemaMismatch(format!(
            "unexpected datum for {} column",
            describe(ty)
        ))),
    }
}

/// Text rows → table, parsing each cell against its column type.
pub fn decode_text(rows: &[StringRow], schema: &[ColumnDesc]) -> MapdResult<Table> {
    let mut columns: Vec<Vec<Value>> = schema.iter().map(|_| Vec::with_capacity(rows.len())).collect();
    for (r, row) in rows.iter().enumerate() {
        if row.cols.len() != schema.len() {
            return Err(MapdError::SchemaMismatch(format!(
                "row {r} has {} values but the schema has {} columns",
                row.cols.len(),
                schema.len()
            )));
        }
        for ((cell, desc), out) in row.cols.iter().zip(schema).zip(columns.iter_mut()) {
            let value = if cell.is_null {
                Value::Null
            } else {
                parse_text(&cell.str_val, &desc.col_type).map_err(|e| annotate(e, &desc.name))?
            };
            out.push(value);
        }
    }
    Table::new(schema.iter().map(|d| d.name.clone()).collect(), columns)
}

/// Parse the text form written by `Value`'s `Display`.
pub(crate) fn parse_text(text: &str, ty: &ColumnType) -> MapdResult<Value> {
    if ty.is_array {
        let inner = text
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| MapdError::Value(format!("'{text}' is not an array literal")))?;
        if inner.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        let element = ty.element();
        return split_array_items(inner)?
            .into_iter()
            .map(|item| match item {
                ArrayItem::Bare("NULL") => Ok(Value::Null),
                ArrayItem::Bare(raw) => parse_text(raw, &element),
                ArrayItem::Quoted(raw) => parse_text(&raw, &element),
            })
            .collect::<MapdResult<Vec<_>>>()
            .map(Value::Array);
    }
    let bad = |what: &str| MapdError::Value(format!("cannot parse '{text}' as {what}"));
    match ty.datum {
        DatumType::Bool => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "0" => Ok(Value::Bool(false)),
            _ => Err(bad("BOOL")),
        },
        DatumType::TinyInt | DatumType::SmallInt | DatumType::Int | DatumType::BigInt => {
            text.trim().parse::<i64>().map(Value::Int).map_err(|_| bad("an integer"))
        }
        DatumType::Float | DatumType::Double => {
            text.trim().parse::<f64>().map(Value::Float).map_err(|_| bad("a float"))
        }
        DatumType::Decimal => Decimal::from_str(text.trim())
            .map(Value::Decimal)
            .map_err(|_| bad("a decimal")),
        DatumType::Str => Ok(Value::Str(text.to_string())),
        DatumType::Time => parse_time(text).map(Value::Time),
        DatumType::Date => parse_date(text).map(Value::Date),
        DatumType::Timestamp => parse_timestamp(text).map(Value::Timestamp),
        _ => Geometry::from_wkt(text).map(Value::Geometry),
    }
}

enum ArrayItem<'a> {
    Bare(&'a str),
    Quoted(String),
}

/// Split the body of `{...}` on top-level commas. Quoted items keep their
/// exact contents; a bare `NULL` is the only null marker.
fn split_array_items(inner: &str) -> MapdResult<Vec<ArrayItem<'_>>> {
    let bad = |why: &str| MapdError::Value(format!("malformed array literal '{{{inner}}}': {why}"));
    let mut items = Vec::new();
    let mut rest = inner;
    loop {
        let trimmed = rest.trim_start();
        if let Some(body) = trimmed.strip_prefix('"') {
            let mut value = String::new();
            let mut chars = body.char_indices();
            let end = loop {
                match chars.next() {
                    Some((_, '\\')) => match chars.next() {
                        Some((_, ch)) => value.push(ch),
                        None => return Err(bad("dangling escape")),
                    },
                    Some((i, '"')) => break i + 1,
                    Some((_, ch)) => value.push(ch),
                    None => return Err(bad("unterminated quote")),
                }
            };
            items.push(ArrayItem::Quoted(value));
            rest = body[end..].trim_start();
            match rest.strip_prefix(',') {
                Some(next) => rest = next,
                None if rest.is_empty() => break,
                None => return Err(bad("text after a quoted element")),
            }
        } else {
            match trimmed.split_once(',') {
                Some((item, next)) => {
                    items.push(ArrayItem::Bare(item.trim()));
                    rest = next;
                }
                None => {
                    items.push(ArrayItem::Bare(trimmed.trim()));
                    break;
                }
            }
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::encode::{WireFormat, encode, encode_column, encode_columns};
    use crate::marshal::table::Batch;
    use chrono::{NaiveDate, NaiveTime};

    fn schema() -> Vec<ColumnDesc> {
        vec![
            ColumnDesc::new("a", ColumnType::new(DatumType::Int)),
            ColumnDesc::new("b", ColumnType::new(DatumType::Str)),
        ]
    }

    fn scenario_rows() -> Vec<Vec<Value>> {
        vec![
            vec![Value::Int(1), Value::from("x")],
            vec![Value::Null, Value::from("y")],
        ]
    }

    #[test]
    fn columnar_round_trip() {
        let batch = Batch::Rows(scenario_rows());
        let cols = encode_columns(&batch, &schema()).unwrap();
        let table = decode_columns(&cols, &schema()).unwrap();
        assert_eq!(table.rows(), scenario_rows());
        assert_eq!(table.names(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn every_wire_format_round_trips() {
        let batch = Batch::Rows(scenario_rows());
        for format in [WireFormat::Columnar, WireFormat::Rows, WireFormat::Text, WireFormat::Arrow] {
            let payload = encode(&batch, &schema(), format).unwrap();
            let table = decode(&payload, &schema()).unwrap();
            assert_eq!(table.rows(), scenario_rows(), "{format:?}");
        }
    }

    #[test]
    fn nullness_comes_from_mask_only() {
        // sentinel value without a mask bit stays a value
        let col = WireColumn {
            data: WireData::Int(vec![i32::MIN as i64, 5]),
            nulls: vec![false, true],
        };
        let values = decode_column(&col, &ColumnType::new(DatumType::Int)).unwrap();
        assert_eq!(values, vec![Value::Int(i32::MIN as i64), Value::Null]);
    }

    #[test]
    fn slot_mismatch_is_schema_error() {
        let col = WireColumn {
            data: WireData::Str(vec!["1".into()]),
            nulls: vec![false],
        };
        assert!(matches!(
            decode_column(&col, &ColumnType::new(DatumType::Int)),
            Err(MapdError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn temporal_and_decimal_inverse() {
        let time = ColumnType::new(DatumType::Time);
        let col = WireColumn {
            data: WireData::Int(vec![43200]),
            nulls: vec![false],
        };
        assert_eq!(
            decode_column(&col, &time).unwrap(),
            vec![Value::Time(NaiveTime::from_hms_opt(12, 0, 0).unwrap())]
        );

        let date = ColumnType::new(DatumType::Date);
        let d = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        let encoded = encode_column(&[&Value::Date(d)], &date).unwrap();
        assert_eq!(decode_column(&encoded, &date).unwrap(), vec![Value::Date(d)]);

        let dec = ColumnType::decimal(10, 2);
        let real = WireColumn {
            data: WireData::Real(vec![3.14159]),
            nulls: vec![false],
        };
        assert_eq!(
            decode_column(&real, &dec).unwrap(),
            vec![Value::Decimal(Decimal::from_str("3.14").unwrap())]
        );
    }

    #[test]
    fn arrays_keep_empty_and_null_apart() {
        let ty = ColumnType::new(DatumType::Double).array();
        let values = vec![
            Value::from(vec![Some(1.5), None]),
            Value::Array(vec![]),
            Value::Null,
        ];
        let refs: Vec<&Value> = values.iter().collect();
        let col = encode_column(&refs, &ty).unwrap();
        assert_eq!(decode_column(&col, &ty).unwrap(), values);
    }

    #[test]
    fn text_arrays_parse() {
        let ty = ColumnType::new(DatumType::Int).array();
        assert_eq!(
            parse_text("{1,NULL,3}", &ty).unwrap(),
            Value::Array(vec![Value::Int(1), Value::Null, Value::Int(3)])
        );
        assert_eq!(parse_text("{}", &ty).unwrap(), Value::Array(vec![]));
        assert!(parse_text("1,2", &ty).is_err());
    }

    #[test]
    fn text_string_arrays_survive_commas_and_null_words() {
        let ty = ColumnType::new(DatumType::Str).array();
        let original = Value::Array(vec![
            Value::from("a,b"),
            Value::from("NULL"),
            Value::from(" c"),
            Value::Null,
            Value::from(r#"q"uo\te"#),
            Value::from(""),
        ]);
        assert_eq!(parse_text(&original.to_string(), &ty).unwrap(), original);

        let schema = vec![ColumnDesc::new("tags", ty.clone())];
        let batch = Batch::Rows(vec![vec![original.clone()]]);
        let payload = encode(&batch, &schema, WireFormat::Text).unwrap();
        assert_eq!(decode(&payload, &schema).unwrap().rows(), vec![vec![original]]);

        assert!(parse_text(r#"{"open}"#, &ty).is_err());
        assert!(parse_text(r#"{"a"b}"#, &ty).is_err());
    }

    #[test]
    fn arrow_payload_restores_geometry() {
        let schema = vec![
            ColumnDesc::new("id", ColumnType::new(DatumType::Int)),
            ColumnDesc::new("area", ColumnType::new(DatumType::Polygon)),
        ];
        let square = Geometry::Polygon(vec![vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]]);
        let rows = vec![
            vec![Value::Int(1), Value::Geometry(square)],
            vec![Value::Int(2), Value::Null],
        ];
        let payload = encode(&Batch::Rows(rows.clone()), &schema, WireFormat::Arrow).unwrap();
        assert_eq!(decode(&payload, &schema).unwrap().rows(), rows);
    }

    #[test]
    fn text_geometry_arrays_keep_inner_commas() {
        let ty = ColumnType::new(DatumType::LineString).array();
        let line = Geometry::from_wkt("LINESTRING (0 0, 1 1, 2 0)").unwrap();
        let original = Value::Array(vec![Value::Geometry(line), Value::Null]);
        assert_eq!(parse_text(&original.to_string(), &ty).unwrap(), original);
    }

    #[test]
    fn column_count_mismatch() {
        let cols = encode_columns(&Batch::Rows(scenario_rows()), &schema()).unwrap();
        assert!(decode_columns(&cols[..1], &schema()).is_err());
    }
}
