//! Conversions between Rust types and `Value` / `ColumnType`.

use crate::error::{MapdError, MapdResult};
use crate::marshal::{Geometry, Value};
use crate::types::{ColumnDesc, ColumnType, DatumType, Encoding};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// Rust value → `Value`
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl<T: Into<Value>> IntoValue for T {
    fn into_value(self) -> Value {
        self.into()
    }
}

/// `Value` → Rust value
pub trait FromValue: Sized {
    fn from_value(value: Value) -> MapdResult<Self>;
}

/// Rust type → column type, for `create_table` schemas
pub trait IntoColumnType {
    fn column_type() -> ColumnType;
}

/// Struct → row for a load
pub trait IntoRow {
    /// Target table, when the type names one.
    fn table_name() -> Option<&'static str> {
        None
    }

    fn row_desc() -> Vec<ColumnDesc>;

    /// Values in `row_desc()` order.
    fn into_row(self) -> Vec<Value>;
}

/// Result row → struct
pub trait FromRow: Sized {
    fn from_row(names: &[String], row: Vec<Value>) -> MapdResult<Self>;
}

/// Take the value of column `name` out of a row. Used by derived `FromRow`.
pub fn take_column<T: FromValue>(names: &[String], row: &mut [Value], name: &str) -> MapdResult<T> {
    let idx = names
        .iter()
        .position(|n| n == name)
        .ok_or_else(|| MapdError::SchemaMismatch(format!("result has no column '{name}'")))?;
    let value = row
        .get_mut(idx)
        .map(std::mem::take)
        .ok_or_else(|| MapdError::SchemaMismatch(format!("row is missing column '{name}'")))?;
    T::from_value(value).map_err(|e| match e {
        MapdError::Value(m) => MapdError::Value(format!("column '{name}': {m}")),
        other => other,
    })
}

fn unexpected(value: &Value, wanted: &str) -> MapdError {
    if value.is_null() {
        MapdError::Value(format!("unexpected NULL for {wanted}"))
    } else {
        MapdError::Value(format!("cannot convert {} value to {wanted}", value.kind()))
    }
}

// ════════════════════════════════════════════
// FromValue
// ════════════════════════════════════════════

macro_rules! from_value_int {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> MapdResult<Self> {
                    match value {
                        Value::Int(i) => <$t>::try_from(i).map_err(|_| {
                            MapdError::Value(format!("{i} out of range for {}", stringify!($t)))
                        }),
                        other => Err(unexpected(&other, stringify!($t))),
                    }
                }
            }
        )*
    };
}

from_value_int!(i8, i16, i32, i64);

impl FromValue for bool {
    fn from_value(value: Value) -> MapdResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(i) => Ok(i != 0),
            other => Err(unexpected(&other, "bool")),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> MapdResult<Self> {
        match value {
            Value::Float(f) if !f.is_nan() => Ok(f),
            Value::Int(i) => Ok(i as f64),
            Value::Decimal(d) => crate::marshal::numeric::decimal_to_f64(&d),
            other => Err(unexpected(&other, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> MapdResult<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for Decimal {
    fn from_value(value: Value) -> MapdResult<Self> {
        match value {
            Value::Decimal(d) => Ok(d),
            Value::Int(i) => Ok(Decimal::from(i)),
            other => Err(unexpected(&other, "Decimal")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> MapdResult<Self> {
        match value {
            Value::Str(s) => Ok(s),
            Value::Geometry(g) => Ok(g.to_wkt()),
            other => Err(unexpected(&other, "String")),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> MapdResult<Self> {
        match value {
            Value::Date(d) => Ok(d),
            Value::Timestamp(ts) => Ok(ts.date()),
            other => Err(unexpected(&other, "NaiveDate")),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value) -> MapdResult<Self> {
        match value {
            Value::Time(t) => Ok(t),
            other => Err(unexpected(&other, "NaiveTime")),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> MapdResult<Self> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            other => Err(unexpected(&other, "NaiveDateTime")),
        }
    }
}

impl FromValue for Geometry {
    fn from_value(value: Value) -> MapdResult<Self> {
        match value {
            Value::Geometry(g) => Ok(g),
            Value::Str(s) => Geometry::from_wkt(&s),
            other => Err(unexpected(&other, "Geometry")),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> MapdResult<Self> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> MapdResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> MapdResult<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(unexpected(&other, "Vec")),
        }
    }
}

// ════════════════════════════════════════════
// IntoColumnType
// ════════════════════════════════════════════

macro_rules! column_type {
    ($($t:ty => $datum:expr),* $(,)?) => {
        $(
            impl IntoColumnType for $t {
                fn column_type() -> ColumnType {
                    ColumnType::new($datum).not_null()
                }
            }
        )*
    };
}

column_type!(
    bool => DatumType::Bool,
    i8 => DatumType::TinyInt,
    i16 => DatumType::SmallInt,
    i32 => DatumType::Int,
    i64 => DatumType::BigInt,
    f32 => DatumType::Float,
    f64 => DatumType::Double,
    NaiveDate => DatumType::Date,
    NaiveTime => DatumType::Time,
);

impl IntoColumnType for String {
    fn column_type() -> ColumnType {
        ColumnType::new(DatumType::Str)
            .with_encoding(Encoding::Dict, 32)
            .not_null()
    }
}

impl IntoColumnType for NaiveDateTime {
    fn column_type() -> ColumnType {
        ColumnType::timestamp(6).not_null()
    }
}

impl IntoColumnType for Decimal {
    fn column_type() -> ColumnType {
        ColumnType::decimal(18, 6).not_null()
    }
}

impl<T: IntoColumnType> IntoColumnType for Option<T> {
    fn column_type() -> ColumnType {
        ColumnType {
            nullable: true,
            ..T::column_type()
        }
    }
}

impl<T: IntoColumnType> IntoColumnType for Vec<T> {
    fn column_type() -> ColumnType {
        T::column_type().array()
    }
}
