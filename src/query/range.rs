use chrono::{DateTime, Duration, FixedOffset, NaiveDate};

use crate::date_util::{midnight, DAY_SECS};

/// Longest range, in day buckets, a dashboard request may cover.
pub const MAX_RANGE_DAYS: i64 = 732;

/// A symbolic dashboard range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeToken {
    Today,
    Yesterday,
    /// Rolling window of N days ending now (not calendar-aligned).
    Rolling(u32),
    Custom,
}

impl RangeToken {
    /// Parse a range token.
    ///
    /// Supported tokens: `today`, `yesterday`, `7d`, `30d`, `custom`.
    /// Anything else, including a missing token, means `today`.
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some("yesterday") => RangeToken::Yesterday,
            Some("7d") => RangeToken::Rolling(7),
            Some("30d") => RangeToken::Rolling(30),
            Some("custom") => RangeToken::Custom,
            _ => RangeToken::Today,
        }
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeRange {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self { start, end }
    }

    /// Calendar day `[midnight, midnight + 1 day)` of `date`. `None` at the
    /// edges of chrono's calendar.
    pub fn day(date: NaiveDate, offset: FixedOffset) -> Option<Self> {
        let start = midnight(date, offset)?;
        let end = start.checked_add_signed(Duration::days(1))?;
        Some(Self::new(start, end))
    }

    /// Signed length of the range. Negative for inverted custom ranges.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Number of day buckets covering the range, `ceil(duration / 1 day)`.
    /// Zero when the range is empty or inverted.
    pub fn day_count(&self) -> i64 {
        let secs = self.duration().num_seconds();
        if secs <= 0 {
            return 0;
        }
        (secs + DAY_SECS - 1) / DAY_SECS
    }

    /// Whether the range spans more than [`MAX_RANGE_DAYS`] buckets.
    pub fn exceeds_max_span(&self) -> bool {
        self.day_count() > MAX_RANGE_DAYS
    }

    /// Epoch seconds of the inclusive lower bound.
    pub fn from_epoch(&self) -> i64 {
        self.start.timestamp()
    }

    /// Epoch seconds of the last second inside the range. The CRM's `to`
    /// filter is inclusive, so the exclusive end is shifted back by one.
    pub fn to_epoch_inclusive(&self) -> i64 {
        self.end.timestamp() - 1
    }
}

/// Resolve a range token plus optional custom bounds against `now`.
///
/// `now` carries the bucketing offset; calendar-based tokens use its local
/// date. A `custom` range with a missing or unparseable bound resolves to
/// `today`, as does one whose date chrono cannot place in `offset`. Inverted
/// custom bounds are returned as given; oversized spans are left for the
/// caller to reject (see [`TimeRange::exceeds_max_span`]).
pub fn resolve(
    token: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<FixedOffset>,
) -> TimeRange {
    let offset = *now.offset();
    let today = now.date_naive();
    // `now` comes from a wall clock, so its own day is always representable.
    let day = |date: NaiveDate| {
        TimeRange::day(date, offset).unwrap_or_else(|| TimeRange::new(now, now))
    };

    match RangeToken::parse(token) {
        RangeToken::Today => day(today),
        RangeToken::Yesterday => day(today.pred_opt().unwrap_or(today)),
        RangeToken::Rolling(n) => TimeRange::new(now - Duration::days(i64::from(n)), now),
        RangeToken::Custom => {
            let start = from.and_then(|s| parse_boundary(s, offset));
            let end = to.and_then(|s| parse_boundary(s, offset));
            match (start, end) {
                (Some(start), Some(end)) => TimeRange::new(start, end),
                _ => {
                    log::debug!(
                        "custom range missing a bound (from={from:?}, to={to:?}), using today"
                    );
                    day(today)
                }
            }
        }
    }
}

/// Parse `YYYY-MM-DD` (midnight in `offset`) or an RFC 3339 timestamp.
fn parse_boundary(s: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return midnight(date, offset);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&offset))
}
