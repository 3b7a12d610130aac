//! Bucketing periods.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::events::{local_midnight, AnalysisWindow};

/// Bucket size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Local calendar day.
    #[default]
    Day,
    /// Local calendar week starting on Monday.
    Week,
    /// Fixed-length window anchored at the analysis window start.
    Custom { minutes: u32 },
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => f.write_str("day"),
            Granularity::Week => f.write_str("week"),
            Granularity::Custom { minutes } => write!(f, "{minutes}m"),
        }
    }
}

/// A half-open bucket `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn length_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

fn calendar_periods(window: &AnalysisWindow, tz: Tz, first: NaiveDate, step_days: i64) -> Vec<Period> {
    let mut periods = Vec::new();
    let mut date = first;
    loop {
        let start = local_midnight(tz, date);
        if start >= window.end {
            break;
        }
        let next = date + Duration::days(step_days);
        let end = local_midnight(tz, next);
        let clipped = Period {
            start: start.max(window.start),
            end: end.min(window.end),
        };
        if clipped.start < clipped.end {
            periods.push(clipped);
        }
        date = next;
    }
    periods
}

impl Granularity {
    /// Consecutive periods tiling `window`, in order. The first and last
    /// periods are clipped to the window.
    pub fn periods(&self, window: &AnalysisWindow, tz: Tz) -> Vec<Period> {
        let first_day = window.start.with_timezone(&tz).date_naive();
        match *self {
            Granularity::Day => calendar_periods(window, tz, first_day, 1),
            Granularity::Week => {
                let monday =
                    first_day - Duration::days(i64::from(first_day.weekday().num_days_from_monday()));
                calendar_periods(window, tz, monday, 7)
            }
            Granularity::Custom { minutes } => {
                let step = Duration::minutes(i64::from(minutes.max(1)));
                let mut periods = Vec::new();
                let mut start = window.start;
                while start < window.end {
                    let end = (start + step).min(window.end);
                    periods.push(Period { start, end });
                    start = end;
                }
                periods
            }
        }
    }
}
