//! Recurrence rule parsing and expansion.
//!
//! Supports the RFC 5545 subset calendar providers emit for ordinary
//! repeating meetings: `FREQ` (daily/weekly/monthly/yearly), `INTERVAL`,
//! `COUNT`, `UNTIL` and weekly `BYDAY`. Instances keep their local
//! wall-clock time, so a 09:00 standup stays at 09:00 across DST changes.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;
use std::str::FromStr;

use super::timestamp::{resolve_local_lenient, RawTime};
use crate::error::MalformedEventError;

/// Upper bound on instances generated per series.
pub const MAX_OCCURRENCES: usize = 5_000;

/// Upper bound on candidate steps, including skipped ones (e.g. Feb 30).
const MAX_STEPS: usize = 50_000;

/// Local start times produced by [`RecurrenceRule::expand`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub starts: Vec<NaiveDateTime>,
    /// More instances fell in range than [`MAX_OCCURRENCES`] allows.
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// End bound of a series, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    Date(NaiveDate),
    Local(NaiveDateTime),
    Instant(DateTime<Utc>),
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<Until>,
    pub by_day: Vec<Weekday>,
}

fn parse_weekday(code: &str) -> Option<Weekday> {
    match code {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_until(value: &str) -> Option<Until> {
    if let Some(stripped) = value.strip_suffix('Z') {
        let local = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").ok()?;
        return Some(Until::Instant(local.and_utc()));
    }
    if let Ok(local) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        return Some(Until::Local(local));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
        return Some(Until::Date(date));
    }
    match RawTime::parse(value, "until").ok()? {
        RawTime::Instant(dt) => Some(Until::Instant(dt)),
        RawTime::Local(local) => Some(Until::Local(local)),
        RawTime::Date(date) => Some(Until::Date(date)),
    }
}

impl FromStr for RecurrenceRule {
    type Err = MalformedEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |msg: String| MalformedEventError::InvalidRecurrence(msg);
        let body = s.trim();
        let body = body.strip_prefix("RRULE:").unwrap_or(body);

        let mut frequency = None;
        let mut interval = 1u32;
        let mut count = None;
        let mut until = None;
        let mut by_day = Vec::new();

        for part in body.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected KEY=VALUE, got '{part}'")))?;
            let value = value.trim();
            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => {
                    frequency = Some(match value.to_ascii_uppercase().as_str() {
                        "DAILY" => Frequency::Daily,
                        "WEEKLY" => Frequency::Weekly,
                        "MONTHLY" => Frequency::Monthly,
                        "YEARLY" => Frequency::Yearly,
                        other => return Err(invalid(format!("unsupported FREQ '{other}'"))),
                    })
                }
                "INTERVAL" => {
                    interval = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| invalid(format!("bad INTERVAL '{value}'")))?;
                }
                "COUNT" => {
                    count = Some(
                        value
                            .parse::<u32>()
                            .map_err(|_| invalid(format!("bad COUNT '{value}'")))?,
                    );
                }
                "UNTIL" => {
                    until = Some(parse_until(value).ok_or_else(|| invalid(format!("bad UNTIL '{value}'")))?);
                }
                "BYDAY" => {
                    for code in value.split(',') {
                        let code = code.trim().to_ascii_uppercase();
                        let day = parse_weekday(&code)
                            .ok_or_else(|| invalid(format!("unsupported BYDAY '{code}'")))?;
                        if !by_day.contains(&day) {
                            by_day.push(day);
                        }
                    }
                }
                // Week start only shifts BYDAY weeks for intervals > 1; ignored.
                "WKST" => {}
                other => return Err(invalid(format!("unsupported rule part '{other}'"))),
            }
        }

        let frequency = frequency.ok_or_else(|| invalid("missing FREQ".to_string()))?;
        if count.is_some() && until.is_some() {
            return Err(invalid("COUNT and UNTIL are mutually exclusive".to_string()));
        }
        if !by_day.is_empty() && frequency != Frequency::Weekly {
            return Err(invalid("BYDAY is only supported with FREQ=WEEKLY".to_string()));
        }
        by_day.sort_by_key(|d| d.num_days_from_monday());

        Ok(Self {
            frequency,
            interval,
            count,
            until,
            by_day,
        })
    }
}

impl RecurrenceRule {
    fn within_until(&self, local: NaiveDateTime, tz: Tz) -> bool {
        match self.until {
            None => true,
            Some(Until::Date(date)) => local.date() <= date,
            Some(Until::Local(limit)) => local <= limit,
            Some(Until::Instant(limit)) => resolve_local_lenient(tz, local) <= limit,
        }
    }

    /// Candidate start for step `k` (before BYDAY fan-out). `None` when the
    /// calendar has no such date, e.g. the 31st of a 30-day month.
    fn step(&self, first: NaiveDateTime, k: u32) -> Option<NaiveDateTime> {
        let n = k.checked_mul(self.interval)?;
        match self.frequency {
            Frequency::Daily => first.checked_add_signed(Duration::days(i64::from(n))),
            Frequency::Weekly => first.checked_add_signed(Duration::weeks(i64::from(n))),
            Frequency::Monthly => {
                let shifted = first.date().with_day(1)?.checked_add_months(Months::new(n))?;
                let date = shifted.with_day(first.day())?;
                Some(date.and_time(first.time()))
            }
            Frequency::Yearly => {
                let year = first.year().checked_add(i32::try_from(n).ok()?)?;
                let date = NaiveDate::from_ymd_opt(year, first.month(), first.day())?;
                Some(date.and_time(first.time()))
            }
        }
    }

    /// Local start times of every instance starting in `[from, horizon)`.
    ///
    /// `COUNT` is honoured from the series start, so instances before `from`
    /// still consume the count. At most [`MAX_OCCURRENCES`] are returned.
    pub fn expand(
        &self,
        first: NaiveDateTime,
        tz: Tz,
        from: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> Expansion {
        let mut out = Expansion::default();
        let mut emitted: u32 = 0;

        for k in 0..MAX_STEPS as u32 {
            let Some(base) = self.step(first, k) else {
                if self.frequency == Frequency::Daily || self.frequency == Frequency::Weekly {
                    return out;
                }
                continue;
            };

            let candidates: Vec<NaiveDateTime> = if self.by_day.is_empty() {
                vec![base]
            } else {
                let monday = base.date() - Duration::days(i64::from(base.weekday().num_days_from_monday()));
                self.by_day
                    .iter()
                    .map(|d| (monday + Duration::days(i64::from(d.num_days_from_monday()))).and_time(first.time()))
                    .filter(|c| *c >= first)
                    .collect()
            };

            for candidate in candidates {
                if self.count.is_some_and(|c| emitted >= c) || !self.within_until(candidate, tz) {
                    return out;
                }
                let start = resolve_local_lenient(tz, candidate);
                if start >= horizon {
                    return out;
                }
                emitted += 1;
                if start >= from {
                    if out.starts.len() >= MAX_OCCURRENCES {
                        out.truncated = true;
                        return out;
                    }
                    out.starts.push(candidate);
                }
            }
        }
        // Step budget ran out while the series was still inside the range.
        out.truncated = true;
        out
    }
}
