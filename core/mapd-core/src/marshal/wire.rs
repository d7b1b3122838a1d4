//! Wire representations exchanged with the server.
//!
//! `WireColumn` mirrors `TColumn` (columnar), `WireRow`/`WireDatum` mirror
//! `TRow`/`TDatum` (row-wise binary) and `StringRow` mirrors `TStringRow`
//! (plain text loads).

use crate::error::{MapdError, MapdResult};
use crate::types::SlotKind;
use serde::{Deserialize, Serialize};

/// Values of one column, in exactly one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireData {
    Int(Vec<i64>),
    Real(Vec<f64>),
    Str(Vec<String>),
    /// One inner column per row
    Array(Vec<WireColumn>),
}

impl WireData {
    pub fn len(&self) -> usize {
        match self {
            WireData::Int(v) => v.len(),
            WireData::Real(v) => v.len(),
            WireData::Str(v) => v.len(),
            WireData::Array(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scalar slot, `None` for nested array data.
    pub fn slot(&self) -> Option<SlotKind> {
        match self {
            WireData::Int(_) => Some(SlotKind::Int),
            WireData::Real(_) => Some(SlotKind::Real),
            WireData::Str(_) => Some(SlotKind::Str),
            WireData::Array(_) => None,
        }
    }
}

/// Columnar wire column: values plus a null mask of the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireColumn {
    pub data: WireData,
    pub nulls: Vec<bool>,
}

impl WireColumn {
    pub fn len(&self) -> usize {
        self.nulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nulls.is_empty()
    }

    /// Check `nulls.len() == data.len()`, recursing into array rows.
    pub fn validate(&self) -> MapdResult<()> {
        if self.nulls.len() != self.data.len() {
            return Err(MapdError::SchemaMismatch(format!(
                "null mask has {} entries but column has {} values",
                self.nulls.len(),
                self.data.len()
            )));
        }
        if let WireData::Array(rows) = &self.data {
            for inner in rows {
                inner.validate()?;
            }
        }
        Ok(())
    }
}

/// Validate every column and return the shared row count.
pub fn validate_columns(columns: &[WireColumn]) -> MapdResult<usize> {
    let mut row_count = None;
    for (i, col) in columns.iter().enumerate() {
        col.validate()?;
        match row_count {
            None => row_count = Some(col.len()),
            Some(n) if n != col.len() => {
                return Err(MapdError::SchemaMismatch(format!(
                    "column {i} has {} rows, expected {n}",
                    col.len()
                )));
            }
            Some(_) => {}
        }
    }
    Ok(row_count.unwrap_or(0))
}

/// Row-wise scalar (`TDatumVal`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatumVal {
    Int(i64),
    Real(f64),
    Str(String),
    Array(Vec<WireDatum>),
}

/// Row-wise cell (`TDatum`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDatum {
    pub val: DatumVal,
    pub is_null: bool,
}

/// Row-wise record (`TRow`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRow {
    pub cols: Vec<WireDatum>,
}

/// Text cell (`TStringValue`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringValue {
    pub str_val: String,
    pub is_null: bool,
}

/// Text record (`TStringRow`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringRow {
    pub cols: Vec<StringValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_detects_mask_mismatch() {
        let col = WireColumn {
            data: WireData::Int(vec![1, 2]),
            nulls: vec![false],
        };
        assert!(matches!(col.validate(), Err(MapdError::SchemaMismatch(_))));
    }

    #[test]
    fn validate_columns_requires_equal_rows() {
        let a = WireColumn {
            data: WireData::Int(vec![1, 2]),
            nulls: vec![false, false],
        };
        let b = WireColumn {
            data: WireData::Str(vec!["x".into()]),
            nulls: vec![false],
        };
        assert_eq!(validate_columns(std::slice::from_ref(&a)).unwrap(), 2);
        assert!(validate_columns(&[a, b]).is_err());
        assert_eq!(validate_columns(&[]).unwrap(), 0);
    }
}
