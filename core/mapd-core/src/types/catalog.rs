//! Type catalog: closed set of server column types and their wire slots.
//!
//! Pure lookup tables. Everything that needs to know how a logical type
//! travels over the wire (which slot, which null stand-in) asks here.

use crate::error::{MapdError, MapdResult};
use serde::{Deserialize, Serialize};

/// Logical column type as reported by the server.
///
/// Discriminants follow the server's `TDatumType` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatumType {
    SmallInt = 0,
    Int = 1,
    BigInt = 2,
    Float = 3,
    Decimal = 4,
    Double = 5,
    Str = 6,
    Time = 7,
    Timestamp = 8,
    Date = 9,
    Bool = 10,
    Point = 13,
    LineString = 14,
    Polygon = 15,
    MultiPolygon = 16,
    TinyInt = 17,
}

/// Physical value container used to carry a logical type on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    /// `int_col` / `int_val` (i64)
    Int,
    /// `real_col` / `real_val` (f64)
    Real,
    /// `str_col` / `str_val`
    Str,
}

/// Value that stands in for null inside a slot that cannot represent it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NullSentinel {
    Int(i64),
    Real(f64),
    Str(&'static str),
}

impl NullSentinel {
    /// Slot this sentinel lives in.
    pub fn slot(&self) -> SlotKind {
        match self {
            NullSentinel::Int(_) => SlotKind::Int,
            NullSentinel::Real(_) => SlotKind::Real,
            NullSentinel::Str(_) => SlotKind::Str,
        }
    }
}

impl DatumType {
    /// Every member of the closed set, in wire-code order.
    pub const ALL: [DatumType; 16] = [
        DatumType::SmallInt,
        DatumType::Int,
        DatumType::BigInt,
        DatumType::Float,
        DatumType::Decimal,
        DatumType::Double,
        DatumType::Str,
        DatumType::Time,
        DatumType::Timestamp,
        DatumType::Date,
        DatumType::Bool,
        DatumType::Point,
        DatumType::LineString,
        DatumType::Polygon,
        DatumType::MultiPolygon,
        DatumType::TinyInt,
    ];

    /// Wire code (`TDatumType` value).
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Resolve a wire code. Interval, GEOMETRY and GEOGRAPHY codes are outside
    /// the supported set.
    pub fn from_code(code: i32) -> MapdResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.code() == code)
            .ok_or_else(|| MapdError::UnsupportedType(format!("type code {code}")))
    }

    /// Resolve a type name as printed by the server or written in DDL.
    pub fn from_name(name: &str) -> MapdResult<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let t = match upper.as_str() {
            "BOOL" | "BOOLEAN" => DatumType::Bool,
            "TINYINT" => DatumType::TinyInt,
            "SMALLINT" => DatumType::SmallInt,
            "INT" | "INTEGER" => DatumType::Int,
            "BIGINT" => DatumType::BigInt,
            "FLOAT" => DatumType::Float,
            "DOUBLE" => DatumType::Double,
            "DECIMAL" => DatumType::Decimal,
            "STR" | "TEXT" | "VARCHAR" => DatumType::Str,
            "TIME" => DatumType::Time,
            "TIMESTAMP" => DatumType::Timestamp,
            "DATE" => DatumType::Date,
            "POINT" => DatumType::Point,
            "LINESTRING" => DatumType::LineString,
            "POLYGON" => DatumType::Polygon,
            "MULTIPOLYGON" => DatumType::MultiPolygon,
            _ => return Err(MapdError::UnsupportedType(name.to_string())),
        };
        Ok(t)
    }

    pub fn is_geo(self) -> bool {
        matches!(
            self,
            DatumType::Point | DatumType::LineString | DatumType::Polygon | DatumType::MultiPolygon
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, DatumType::Time | DatumType::Timestamp | DatumType::Date)
    }

    /// Inclusive value range for fixed-width integer types.
    pub fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            DatumType::TinyInt => Some((i8::MIN as i64, i8::MAX as i64)),
            DatumType::SmallInt => Some((i16::MIN as i64, i16::MAX as i64)),
            DatumType::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            DatumType::BigInt => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatumType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(display_name_for(*self))
    }
}

/// Wire slot carrying values of `t`.
pub fn slot_for(t: DatumType) -> SlotKind {
    match t {
        DatumType::Bool
        | DatumType::TinyInt
        | DatumType::SmallInt
        | DatumType::Int
        | DatumType::BigInt
        | DatumType::Decimal
        | DatumType::Time
        | DatumType::Timestamp
        | DatumType::Date => SlotKind::Int,
        DatumType::Float | DatumType::Double => SlotKind::Real,
        DatumType::Str
        | DatumType::Point
        | DatumType::LineString
        | DatumType::Polygon
        | DatumType::MultiPolygon => SlotKind::Str,
    }
}

/// Canonical null stand-in for `t`.
pub fn null_sentinel_for(t: DatumType) -> NullSentinel {
    match t {
        DatumType::Bool | DatumType::TinyInt => NullSentinel::Int(i8::MIN as i64),
        DatumType::SmallInt => NullSentinel::Int(i16::MIN as i64),
        DatumType::Int => NullSentinel::Int(i32::MIN as i64),
        DatumType::BigInt
        | DatumType::Decimal
        | DatumType::Time
        | DatumType::Timestamp
        | DatumType::Date => NullSentinel::Int(i64::MIN),
        DatumType::Float => NullSentinel::Real(f32::MIN_POSITIVE as f64),
        DatumType::Double => NullSentinel::Real(f64::MIN_POSITIVE),
        DatumType::Str
        | DatumType::Point
        | DatumType::LineString
        | DatumType::Polygon
        | DatumType::MultiPolygon => NullSentinel::Str(""),
    }
}

/// Server-facing type name.
pub fn display_name_for(t: DatumType) -> &'static str {
    match t {
        DatumType::Bool => "BOOL",
        DatumType::TinyInt => "TINYINT",
        DatumType::SmallInt => "SMALLINT",
        DatumType::Int => "INT",
        DatumType::BigInt => "BIGINT",
        DatumType::Float => "FLOAT",
        DatumType::Double => "DOUBLE",
        DatumType::Decimal => "DECIMAL",
        DatumType::Str => "STR",
        DatumType::Time => "TIME",
        DatumType::Timestamp => "TIMESTAMP",
        DatumType::Date => "DATE",
        DatumType::Point => "POINT",
        DatumType::LineString => "LINESTRING",
        DatumType::Polygon => "POLYGON",
        DatumType::MultiPolygon => "MULTIPOLYGON",
    }
}
