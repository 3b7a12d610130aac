//! Timestamp parsing and timezone resolution for raw records.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::MalformedEventError;
use crate::events::local_midnight;

const LOCAL_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
];

/// A timestamp as written by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawTime {
    /// Carries its own offset.
    Instant(DateTime<Utc>),
    /// Wall-clock time in the record's timezone.
    Local(NaiveDateTime),
    /// Date only (all-day).
    Date(NaiveDate),
}

impl RawTime {
    pub(crate) fn parse(value: &str, field: &'static str) -> Result<Self, MalformedEventError> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(RawTime::Instant(dt.with_timezone(&Utc)));
        }
        for fmt in LOCAL_FORMATS {
            if let Ok(local) = NaiveDateTime::parse_from_str(value, fmt) {
                return Ok(RawTime::Local(local));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Ok(RawTime::Date(date));
        }
        Err(MalformedEventError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
    }

    /// Resolve to an instant; dates resolve to local midnight.
    pub(crate) fn to_utc(self, tz: Tz) -> Result<DateTime<Utc>, MalformedEventError> {
        match self {
            RawTime::Instant(dt) => Ok(dt),
            RawTime::Local(local) => resolve_local(tz, local),
            RawTime::Date(date) => Ok(local_midnight(tz, date)),
        }
    }

    /// Calendar date in `tz`.
    pub(crate) fn local_date(self, tz: Tz) -> NaiveDate {
        match self {
            RawTime::Instant(dt) => dt.with_timezone(&tz).date_naive(),
            RawTime::Local(local) => local.date(),
            RawTime::Date(date) => date,
        }
    }

    /// Wall-clock reading in `tz`.
    pub(crate) fn local(self, tz: Tz) -> NaiveDateTime {
        match self {
            RawTime::Instant(dt) => dt.with_timezone(&tz).naive_local(),
            RawTime::Local(local) => local,
            RawTime::Date(date) => date.and_time(chrono::NaiveTime::default()),
        }
    }
}

/// Strict resolution: ambiguous times take the earlier instant, times in a
/// DST gap are malformed.
pub(crate) fn resolve_local(tz: Tz, local: NaiveDateTime) -> Result<DateTime<Utc>, MalformedEventError> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(MalformedEventError::NonexistentLocalTime(local.to_string())),
    }
}

/// Lenient resolution for generated recurrence instances: a wall-clock time
/// that falls in a DST gap moves forward past the gap.
pub(crate) fn resolve_local_lenient(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    let mut candidate = local;
    for _ in 0..8 {
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt.with_timezone(&Utc);
        }
        candidate += Duration::minutes(30);
    }
    Utc.from_utc_datetime(&local)
}
