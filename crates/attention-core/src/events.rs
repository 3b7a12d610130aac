//! Event records flowing through the pipeline.
//!
//! [`RawEvent`] is the untrusted provider shape; [`CalendarEvent`] is the
//! canonical, immutable record the normalizer emits.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, CoreError};

/// An exception to one occurrence of a recurring series.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecurrenceException {
    /// Local date of the generated occurrence this exception replaces.
    pub original_date: NaiveDate,
    /// Drop the occurrence entirely.
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// A calendar record as delivered by the fetch collaborator.
///
/// Timestamps are kept as strings here; the normalizer owns parsing and
/// timezone resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    /// IANA timezone for naive timestamps and all-day dates.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attendee_count: Option<i64>,
    /// RFC 5545 RRULE, with or without the `RRULE:` prefix.
    #[serde(default)]
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub recurrence_exceptions: Vec<RecurrenceException>,
    #[serde(default)]
    pub all_day: bool,
    /// Provider status; `cancelled` drops the record.
    #[serde(default)]
    pub status: Option<String>,
    /// Series this record overrides one occurrence of.
    #[serde(default)]
    pub recurring_event_id: Option<String>,
    /// Local date of the overridden occurrence.
    #[serde(default)]
    pub original_date: Option<NaiveDate>,
}

impl RawEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("cancelled"))
    }
}

/// A normalized calendar event. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    /// Stable id, unique per source event and occurrence.
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub attendee_count: u32,
    /// Series id for expanded recurrence instances.
    pub source_recurrence_id: Option<String>,
    pub all_day: bool,
    /// IANA timezone the instants were resolved in.
    pub timezone: String,
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Check if this event overlaps with a time range
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }

    /// Title and description joined for keyword matching.
    pub fn search_text(&self) -> String {
        match &self.description {
            Some(desc) if !desc.is_empty() => format!("{} {}", self.title, desc).to_lowercase(),
            _ => self.title.to_lowercase(),
        }
    }
}

/// Half-open time range `[start, end)` an analysis run covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AnalysisWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ConfigError> {
        if end <= start {
            return Err(ConfigError::invalid(
                "window",
                format!("end ({end}) must be after start ({start})"),
            ));
        }
        Ok(Self { start, end })
    }

    /// Window from local midnight of `from` to local midnight of `to`
    /// (exclusive) in `tz`.
    pub fn from_dates(tz: Tz, from: NaiveDate, to: NaiveDate) -> Result<Self, ConfigError> {
        Self::new(local_midnight(tz, from), local_midnight(tz, to))
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// First instant of `date` in `tz`.
///
/// Zones that skip midnight on a DST change start the day at the first
/// valid local time instead.
pub fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let mut local = date.and_time(NaiveTime::default());
    for _ in 0..4 {
        if let Some(dt) = tz.from_local_datetime(&local).earliest() {
            return dt.with_timezone(&Utc);
        }
        local += Duration::minutes(30);
    }
    // No real zone has a gap this long; fall back to the UTC reading.
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// One self-reported well-being observation (energy, productivity, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WellbeingSignal {
    pub date: NaiveDate,
    #[serde(alias = "metric_name")]
    pub metric: String,
    pub value: f64,
}

/// Read a JSON document of raw events or well-being signals.
///
/// # Errors
///
/// [`CoreError::Io`] when the file cannot be read, [`CoreError::Json`] when
/// it does not parse into `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn raw_event_accepts_sparse_json() {
        let raw: RawEvent = serde_json::from_str(
            r#"{"title": "Gym session", "start": "2024-01-01T07:00", "end": "2024-01-01T08:00"}"#,
        )
        .unwrap();
        assert_eq!(raw.title, "Gym session");
        assert!(raw.id.is_none());
        assert!(!raw.all_day);
        assert!(raw.recurrence_exceptions.is_empty());
    }

    #[test]
    fn cancelled_status_is_case_insensitive() {
        let raw = RawEvent {
            status: Some("CANCELLED".into()),
            ..RawEvent::default()
        };
        assert!(raw.is_cancelled());
    }

    #[test]
    fn wellbeing_signal_accepts_metric_name_alias() {
        let signal: WellbeingSignal =
            serde_json::from_str(r#"{"date": "2024-01-02", "metric_name": "energy", "value": 7}"#)
                .unwrap();
        assert_eq!(signal.metric, "energy");
        assert_eq!(signal.value, 7.0);
    }

    #[test]
    fn window_rejects_inverted_range() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(AnalysisWindow::new(start, end).is_err());
    }

    #[test]
    fn window_from_dates_uses_local_midnight() {
        let window = AnalysisWindow::from_dates(
            chrono_tz::America::New_York,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        )
        .unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap());
        assert_eq!(window.end - window.start, Duration::hours(24));
    }

    #[test]
    fn search_text_is_lowercased() {
        let event = CalendarEvent {
            id: "e1".into(),
            start: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            title: "Team SYNC".into(),
            description: Some("Quarterly Review".into()),
            attendee_count: 4,
            source_recurrence_id: None,
            all_day: false,
            timezone: "UTC".into(),
        };
        assert_eq!(event.search_text(), "team sync quarterly review");
        assert_eq!(event.duration(), Duration::hours(1));
    }

    #[test]
    fn read_json_separates_io_and_parse_failures() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            read_json::<Vec<RawEvent>>(&missing).unwrap_err(),
            CoreError::Io(_)
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "[{\"title\": ").unwrap();
        assert!(matches!(
            read_json::<Vec<RawEvent>>(&broken).unwrap_err(),
            CoreError::Json(_)
        ));

        let signals = dir.path().join("signals.json");
        std::fs::write(&signals, r#"[{"date": "2024-01-02", "metric": "mood", "value": 3}]"#).unwrap();
        let parsed: Vec<WellbeingSignal> = read_json(&signals).unwrap();
        assert_eq!(parsed[0].metric, "mood");
    }
}
