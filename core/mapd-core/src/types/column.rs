//! Column descriptors: a `DatumType` plus the per-column attributes the
//! server reports in `get_table_details` (nullability, array flag,
//! precision/scale, encoding).

use super::catalog::{DatumType, NullSentinel, SlotKind, null_sentinel_for, slot_for};
use crate::error::{MapdError, MapdResult};
use arrow::datatypes::{DataType, Field, TimeUnit};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Widest precision an Arrow `Decimal128` holds.
const DECIMAL128_MAX_PRECISION: u8 = 38;

/// Column storage encoding (`TEncodingType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    None = 0,
    Fixed = 1,
    RunLength = 2,
    Diff = 3,
    Dict = 4,
    Sparse = 5,
    GeoInt = 6,
    DateInDays = 7,
}

/// Full logical type of one column. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    pub datum: DatumType,
    pub nullable: bool,
    pub is_array: bool,
    /// DECIMAL precision, TIMESTAMP precision (0/3/6/9), geo precision
    pub precision: i32,
    /// DECIMAL scale
    pub scale: i32,
    pub encoding: Encoding,
    pub comp_param: i32,
}

impl ColumnType {
    /// Nullable scalar column of the given type.
    pub fn new(datum: DatumType) -> Self {
        Self {
            datum,
            nullable: true,
            is_array: false,
            precision: 0,
            scale: 0,
            encoding: Encoding::None,
            comp_param: 0,
        }
    }

    pub fn decimal(precision: i32, scale: i32) -> Self {
        Self {
            precision,
            scale,
            ..Self::new(DatumType::Decimal)
        }
    }

    pub fn timestamp(precision: i32) -> Self {
        Self {
            precision,
            ..Self::new(DatumType::Timestamp)
        }
    }

    /// Make this an array-of-`datum` column.
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding, comp_param: i32) -> Self {
        self.encoding = encoding;
        self.comp_param = comp_param;
        self
    }

    /// Same type with the array flag cleared (type of one array element).
    pub fn element(&self) -> Self {
        Self {
            is_array: false,
            ..*self
        }
    }

    pub fn slot(&self) -> SlotKind {
        slot_for(self.datum)
    }

    pub fn null_sentinel(&self) -> NullSentinel {
        null_sentinel_for(self.datum)
    }

    /// Arrow type used when moving this column through an Arrow stream.
    /// DECIMAL attributes outside what `Decimal128` can hold are an error.
    pub fn to_arrow(&self) -> MapdResult<DataType> {
        let scalar = match self.datum {
            DatumType::Bool => DataType::Boolean,
            DatumType::TinyInt => DataType::Int8,
            DatumType::SmallInt => DataType::Int16,
            DatumType::Int => DataType::Int32,
            DatumType::BigInt => DataType::Int64,
            DatumType::Float => DataType::Float32,
            DatumType::Double => DataType::Float64,
            DatumType::Decimal => {
                let precision = if self.precision > 0 { self.precision } else { 18 };
                let out_of_range = || {
                    MapdError::UnsupportedType(format!(
                        "DECIMAL({precision}, {}) does not fit Arrow Decimal128",
                        self.scale
                    ))
                };
                let p = u8::try_from(precision)
                    .ok()
                    .filter(|p| *p <= DECIMAL128_MAX_PRECISION)
                    .ok_or_else(out_of_range)?;
                let s = i8::try_from(self.scale)
                    .ok()
                    .filter(|s| (0..=p as i8).contains(s))
                    .ok_or_else(out_of_range)?;
                DataType::Decimal128(p, s)
            }
            DatumType::Time => DataType::Time32(TimeUnit::Second),
            DatumType::Date => DataType::Date32,
            DatumType::Timestamp => DataType::Timestamp(time_unit(self.precision), None),
            DatumType::Str
            | DatumType::Point
            | DatumType::LineString
            | DatumType::Polygon
            | DatumType::MultiPolygon => DataType::Utf8,
        };
        Ok(if self.is_array {
            DataType::List(Arc::new(Field::new("item", scalar, true)))
        } else {
            scalar
        })
    }
}

/// Arrow time unit for a TIMESTAMP precision.
pub(crate) fn time_unit(precision: i32) -> TimeUnit {
    match precision {
        3 => TimeUnit::Millisecond,
        6 => TimeUnit::Microsecond,
        9 => TimeUnit::Nanosecond,
        _ => TimeUnit::Second,
    }
}

/// One named column of a row descriptor (`TColumnType`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDesc {
    pub name: String,
    pub col_type: ColumnType,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            col_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_precision_selects_unit() -> MapdResult<()> {
        assert_eq!(
            ColumnType::timestamp(9).to_arrow()?,
            DataType::Timestamp(TimeUnit::Nanosecond, None)
        );
        assert_eq!(
            ColumnType::timestamp(0).to_arrow()?,
            DataType::Timestamp(TimeUnit::Second, None)
        );
        Ok(())
    }

    #[test]
    fn decimal_defaults_precision() -> MapdResult<()> {
        assert_eq!(ColumnType::decimal(0, 2).to_arrow()?, DataType::Decimal128(18, 2));
        assert_eq!(ColumnType::decimal(38, 38).to_arrow()?, DataType::Decimal128(38, 38));
        Ok(())
    }

    #[test]
    fn decimal_attributes_out_of_arrow_range() {
        // 300 would wrap to 44 and -129 to 127 under a plain cast
        for (precision, scale) in [(300, 2), (39, 0), (18, -129), (18, 200), (10, 11), (10, -1)] {
            let err = ColumnType::decimal(precision, scale).to_arrow().unwrap_err();
            assert!(matches!(err, MapdError::UnsupportedType(_)), "({precision}, {scale})");
        }
    }

    #[test]
    fn array_wraps_element() {
        let t = ColumnType::new(DatumType::Int).array();
        assert!(matches!(t.to_arrow(), Ok(DataType::List(_))));
        assert!(!t.element().is_array);
        assert_eq!(t.slot(), SlotKind::Int);
    }
}
