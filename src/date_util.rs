use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};

use crate::error::{Error, Result};

/// Seconds in one bucketing day.
pub const DAY_SECS: i64 = 86_400;

/// Midnight of `date` in the given offset, or `None` when the UTC instant
/// falls outside chrono's representable range.
pub fn midnight(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let local = date.and_time(NaiveTime::MIN);
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
    let utc = local.checked_sub_signed(shift)?;
    Some(DateTime::from_naive_utc_and_offset(utc, offset))
}

/// Convert epoch seconds to a timestamp in the given offset.
/// Returns `None` for values chrono cannot represent.
pub fn from_epoch(secs: i64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp(secs, 0).map(|utc| utc.with_timezone(&offset))
}

/// Calendar date key (`YYYY-MM-DD`) of a timestamp.
pub fn day_key(ts: DateTime<FixedOffset>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Parse a UTC offset such as `+03:00`, `-0500`, `+5`, `Z` or `UTC`.
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| Error::Config("zero offset".into()));
    }

    let invalid = || Error::Config(format!("invalid UTC offset: {s}"));
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
        _ => {
            let split = digits.len() - 2;
            (
                digits[..split].parse::<i32>().map_err(|_| invalid())?,
                digits[split..].parse::<i32>().map_err(|_| invalid())?,
            )
        }
    };
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Round half away from zero to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
