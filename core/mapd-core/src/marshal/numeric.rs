//! Fixed-point DECIMAL conversions.
//!
//! The server stores DECIMAL(p, s) as a 64-bit integer equal to
//! `round(value × 10^s)`. Rounding is half away from zero and happens once,
//! so decode → encode cycles are stable.

use super::value::Value;
use crate::error::{MapdError, MapdResult};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

const MAX_SCALE: i32 = 28;

fn check_scale(scale: i32) -> MapdResult<u32> {
    if (0..=MAX_SCALE).contains(&scale) {
        Ok(scale as u32)
    } else {
        Err(MapdError::Value(format!("decimal scale {scale} out of range 0..={MAX_SCALE}")))
    }
}

/// Native value → decimal, before scaling.
pub fn to_decimal(value: &Value) -> MapdResult<Decimal> {
    match value {
        Value::Decimal(d) => Ok(*d),
        Value::Int(i) => Ok(Decimal::from(*i)),
        Value::Float(f) => Decimal::from_f64(*f)
            .ok_or_else(|| MapdError::Value(format!("{f} cannot be represented as a decimal"))),
        Value::Str(s) => Decimal::from_str(s.trim())
            .map_err(|e| MapdError::Value(format!("cannot parse '{s}' as a decimal: {e}"))),
        other => Err(MapdError::SchemaMismatch(format!(
            "{} value in DECIMAL column",
            other.kind()
        ))),
    }
}

/// Scale `value` to the server's fixed-point integer for DECIMAL(precision, scale).
pub fn encode_decimal(value: &Value, precision: i32, scale: i32) -> MapdResult<i64> {
    let scale_u = check_scale(scale)?;
    let mut rounded = to_decimal(value)?
        .round_dp_with_strategy(scale_u, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale_u);
    if rounded.scale() != scale_u {
        return Err(MapdError::Value(format!(
            "{rounded} cannot be scaled to {scale} decimal places"
        )));
    }
    let mantissa = rounded.mantissa();
    if precision > 0 && mantissa.unsigned_abs() >= 10u128.pow(precision.min(38) as u32) {
        return Err(MapdError::Value(format!(
            "{rounded} overflows DECIMAL({precision}, {scale})"
        )));
    }
    i64::try_from(mantissa)
        .map_err(|_| MapdError::Value(format!("{rounded} does not fit a 64-bit DECIMAL")))
}

/// Fixed-point integer from the int slot → decimal.
pub fn decode_decimal(raw: i64, scale: i32) -> MapdResult<Decimal> {
    let scale_u = check_scale(scale)?;
    Decimal::try_new(raw, scale_u).map_err(|e| MapdError::Value(e.to_string()))
}

/// Query results carry DECIMAL in the real slot; round back to the column scale.
pub fn decode_decimal_real(raw: f64, scale: i32) -> MapdResult<Decimal> {
    let scale_u = check_scale(scale)?;
    Decimal::from_f64(raw)
        .map(|d| d.round_dp_with_strategy(scale_u, RoundingStrategy::MidpointAwayFromZero))
        .ok_or_else(|| MapdError::Value(format!("{raw} cannot be represented as a decimal")))
}

pub fn decimal_to_f64(d: &Decimal) -> MapdResult<f64> {
    d.to_f64()
        .ok_or_else(|| MapdError::Value(format!("{d} cannot be represented as a double")))
}
