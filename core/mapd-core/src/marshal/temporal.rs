//! Temporal conversions between chrono values and the server's integer
//! encodings.
//!
//! - TIME: seconds since midnight
//! - DATE: seconds since the UNIX epoch (whole days × 86400)
//! - TIMESTAMP(p): ticks since the UNIX epoch, `p` ∈ {0, 3, 6, 9}
//!
//! chrono keeps nanoseconds, so precision 9 never degrades; sub-tick digits
//! at coarser precisions are floored.

use crate::error::{MapdError, MapdResult};
use chrono::{Datelike, DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const SECONDS_PER_DAY: i64 = 86_400;
/// `NaiveDate::from_num_days_from_ce` value of 1970-01-01.
const EPOCH_DAYS_FROM_CE: i64 = 719_163;

pub fn time_to_seconds(t: NaiveTime) -> i64 {
    3600 * t.hour() as i64 + 60 * t.minute() as i64 + t.second() as i64
}

pub fn seconds_to_time(seconds: i64) -> MapdResult<NaiveTime> {
    u32::try_from(seconds)
        .ok()
        .and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, 0))
        .ok_or_else(|| MapdError::Value(format!("{seconds} is not a time of day in seconds")))
}

pub fn date_to_seconds(d: NaiveDate) -> i64 {
    (d.num_days_from_ce() as i64 - EPOCH_DAYS_FROM_CE) * SECONDS_PER_DAY
}

pub fn seconds_to_date(seconds: i64) -> MapdResult<NaiveDate> {
    let days = seconds.div_euclid(SECONDS_PER_DAY) + EPOCH_DAYS_FROM_CE;
    i32::try_from(days)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| MapdError::Value(format!("{seconds} seconds is outside the date range")))
}

/// Ticks per second for a TIMESTAMP precision.
pub fn ticks_per_second(precision: i32) -> MapdResult<i64> {
    match precision {
        0 => Ok(1),
        3 => Ok(1_000),
        6 => Ok(1_000_000),
        9 => Ok(1_000_000_000),
        p => Err(MapdError::Value(format!("unsupported timestamp precision {p}"))),
    }
}

pub fn timestamp_to_ticks(ts: NaiveDateTime, precision: i32) -> MapdResult<i64> {
    let per_second = ticks_per_second(precision)?;
    let utc = ts.and_utc();
    let nanos_per_tick = 1_000_000_000 / per_second;
    let frac = utc.timestamp_subsec_nanos() as i64 / nanos_per_tick;
    utc.timestamp()
        .checked_mul(per_second)
        .and_then(|t| t.checked_add(frac))
        .ok_or_else(|| {
            MapdError::Value(format!(
                "timestamp {ts} does not fit in 64-bit ticks at precision {precision}"
            ))
        })
}

pub fn ticks_to_timestamp(ticks: i64, precision: i32) -> MapdResult<NaiveDateTime> {
    let per_second = ticks_per_second(precision)?;
    let secs = ticks.div_euclid(per_second);
    let nanos = ticks.rem_euclid(per_second) * (1_000_000_000 / per_second);
    DateTime::from_timestamp(secs, nanos as u32)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| MapdError::Value(format!("{ticks} ticks is outside the timestamp range")))
}

pub fn parse_date(s: &str) -> MapdResult<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .map_err(|_| MapdError::Value(format!("cannot parse '{s}' as a date")))
}

pub fn parse_time(s: &str) -> MapdResult<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S%.f"))
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| MapdError::Value(format!("cannot parse '{s}' as a time")))
}

pub fn parse_timestamp(s: &str) -> MapdResult<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| parse_date(s).map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| MapdError::Value(format!("cannot parse '{s}' as a timestamp")))
}
