//! Raw record → [`CalendarEvent`] normalization.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use super::recurrence::{RecurrenceRule, MAX_OCCURRENCES};
use super::timestamp::{resolve_local_lenient, RawTime};
use crate::diagnostics::{DroppedEvent, NormalizationStats};
use crate::error::MalformedEventError;
use crate::events::{local_midnight, AnalysisWindow, CalendarEvent, RawEvent, RecurrenceException};

/// Resolved start/end of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    all_day: bool,
}

/// A recurring master record, resolved once per expansion.
struct Series<'a> {
    raw: &'a RawEvent,
    id: &'a str,
    tz: Tz,
    attendees: u32,
    all_day: bool,
    duration: Duration,
    /// Local days an all-day instance spans.
    day_span: i64,
    inline: HashMap<NaiveDate, &'a RecurrenceException>,
}

/// Replacement values for one generated occurrence.
struct Override<'a> {
    start: Option<&'a str>,
    end: Option<&'a str>,
}

fn resolve_span(start: RawTime, end: RawTime, all_day: bool, tz: Tz) -> Result<Span, MalformedEventError> {
    let all_day = all_day || matches!((start, end), (RawTime::Date(_), RawTime::Date(_)));
    if all_day {
        let first = start.local_date(tz);
        let mut last = end.local_date(tz);
        if last < first {
            return Err(MalformedEventError::EndBeforeStart {
                start: first.to_string(),
                end: last.to_string(),
            });
        }
        // Inclusive single-day form; providers normally send an exclusive end.
        if last == first {
            last = first + Duration::days(1);
        }
        return Ok(Span {
            start: local_midnight(tz, first),
            end: local_midnight(tz, last),
            all_day: true,
        });
    }

    let start = start.to_utc(tz)?;
    let end = end.to_utc(tz)?;
    if end <= start {
        return Err(MalformedEventError::EndBeforeStart {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }
    Ok(Span {
        start,
        end,
        all_day: false,
    })
}

fn content_key(raw: &RawEvent) -> String {
    format!(
        "{}|{}|{}",
        raw.start.as_deref().unwrap_or_default().trim(),
        raw.end.as_deref().unwrap_or_default().trim(),
        raw.title.trim()
    )
}

/// Deterministic id for records the provider sent without one.
fn content_id(raw: &RawEvent) -> String {
    let digest = Sha256::digest(content_key(raw).as_bytes());
    format!("evt-{}", &hex::encode(digest)[..16])
}

fn occurrence_id(series_id: &str, original_start: DateTime<Utc>) -> String {
    format!("{series_id}_{}", original_start.format("%Y%m%dT%H%M%SZ"))
}

/// Turns untrusted provider records into canonical events.
///
/// Bad records are dropped and reported in [`NormalizationStats`]; they
/// never abort the batch.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    default_tz: Tz,
}

impl EventNormalizer {
    /// `default_tz` applies to records that do not declare a timezone.
    pub fn new(default_tz: Tz) -> Self {
        Self { default_tz }
    }

    fn record_tz(&self, raw: &RawEvent) -> Result<Tz, MalformedEventError> {
        match raw.timezone.as_deref().map(str::trim) {
            None | Some("") => Ok(self.default_tz),
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| MalformedEventError::UnknownTimezone(name.to_string())),
        }
    }

    fn record_span(&self, raw: &RawEvent, tz: Tz) -> Result<Span, MalformedEventError> {
        let start = raw.start.as_deref().ok_or(MalformedEventError::MissingStart)?;
        let end = raw.end.as_deref().ok_or(MalformedEventError::MissingEnd)?;
        resolve_span(
            RawTime::parse(start, "start")?,
            RawTime::parse(end, "end")?,
            raw.all_day,
            tz,
        )
    }

    fn attendees(raw: &RawEvent) -> Result<u32, MalformedEventError> {
        match raw.attendee_count {
            None => Ok(0),
            Some(n) if n < 0 => Err(MalformedEventError::NegativeAttendeeCount(n)),
            Some(n) => Ok(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }

    fn build(
        raw: &RawEvent,
        id: String,
        span: Span,
        tz: Tz,
        series: Option<&str>,
        attendee_count: u32,
    ) -> CalendarEvent {
        CalendarEvent {
            id,
            start: span.start,
            end: span.end,
            title: raw.title.trim().to_string(),
            description: raw.description.clone().filter(|d| !d.trim().is_empty()),
            attendee_count,
            source_recurrence_id: series.map(str::to_string),
            all_day: span.all_day,
            timezone: tz.name().to_string(),
        }
    }

    /// A non-recurring record, or a standalone override of one occurrence.
    fn normalize_single(
        &self,
        raw: &RawEvent,
        id: String,
        series: Option<&str>,
    ) -> Result<CalendarEvent, MalformedEventError> {
        let tz = self.record_tz(raw)?;
        let attendees = Self::attendees(raw)?;
        let span = self.record_span(raw, tz)?;
        Ok(Self::build(raw, id, span, tz, series, attendees))
    }

    fn expand_series(
        &self,
        raw: &RawEvent,
        series_id: &str,
        rule_text: &str,
        overrides: &HashMap<(String, NaiveDate), &RawEvent>,
        consumed: &mut HashSet<(String, NaiveDate)>,
        window: &AnalysisWindow,
        stats: &mut NormalizationStats,
    ) -> Result<Vec<CalendarEvent>, MalformedEventError> {
        let tz = self.record_tz(raw)?;
        let rule: RecurrenceRule = rule_text.parse()?;
        let first = self.record_span(raw, tz)?;
        let start_raw = RawTime::parse(raw.start.as_deref().unwrap_or_default(), "start")?;
        let first_local = if first.all_day {
            start_raw.local_date(tz).and_time(chrono::NaiveTime::default())
        } else {
            start_raw.local(tz)
        };
        let series = Series {
            raw,
            id: series_id,
            tz,
            attendees: Self::attendees(raw)?,
            all_day: first.all_day,
            duration: first.end - first.start,
            day_span: (first.end.with_timezone(&tz).date_naive()
                - first.start.with_timezone(&tz).date_naive())
            .num_days(),
            inline: raw
                .recurrence_exceptions
                .iter()
                .map(|e| (e.original_date, e))
                .collect(),
        };

        let expansion = rule.expand(first_local, tz, window.start - series.duration, window.end);
        if expansion.truncated {
            stats.truncated_series += 1;
            tracing::warn!(
                series = %series_id,
                cap = MAX_OCCURRENCES,
                "recurring series truncated"
            );
        }

        let mut out = Vec::new();
        let mut generated = HashSet::new();
        for local in expansion.starts {
            generated.insert(local.date());
            out.extend(self.occurrence(&series, local, overrides, consumed, window, stats));
        }

        // An inline exception can move an occurrence generated outside the
        // expansion range into the window.
        let mut moved: Vec<&RecurrenceException> = series
            .inline
            .values()
            .filter(|e| !e.cancelled && (e.start.is_some() || e.end.is_some()))
            .filter(|e| !generated.contains(&e.original_date))
            .copied()
            .collect();
        moved.sort_by_key(|e| e.original_date);
        for exc in moved {
            let date = exc.original_date;
            let day = rule.expand(
                first_local,
                tz,
                local_midnight(tz, date),
                local_midnight(tz, date + Duration::days(1)),
            );
            if let Some(local) = day.starts.into_iter().find(|l| l.date() == date) {
                out.extend(self.occurrence(&series, local, overrides, consumed, window, stats));
            }
        }
        Ok(out)
    }

    /// One generated occurrence after standalone and inline exceptions.
    fn occurrence(
        &self,
        series: &Series<'_>,
        local: NaiveDateTime,
        overrides: &HashMap<(String, NaiveDate), &RawEvent>,
        consumed: &mut HashSet<(String, NaiveDate)>,
        window: &AnalysisWindow,
        stats: &mut NormalizationStats,
    ) -> Option<CalendarEvent> {
        let tz = series.tz;
        let date = local.date();
        let original = if series.all_day {
            Span {
                start: local_midnight(tz, date),
                end: local_midnight(tz, date + Duration::days(series.day_span.max(1))),
                all_day: true,
            }
        } else {
            let start = resolve_local_lenient(tz, local);
            Span {
                start,
                end: start + series.duration,
                all_day: false,
            }
        };
        let id = occurrence_id(series.id, original.start);

        let key = (series.id.to_string(), date);
        if let Some(standalone) = overrides.get(&key) {
            consumed.insert(key);
            if standalone.is_cancelled() {
                stats.cancelled += 1;
                return None;
            }
            return match self.normalize_single(standalone, id.clone(), Some(series.id)) {
                Ok(event) if event.overlaps(window.start, window.end) => {
                    stats.occurrences_expanded += 1;
                    Some(event)
                }
                Ok(_) => {
                    stats.out_of_window += 1;
                    None
                }
                Err(reason) => {
                    stats.record_malformed(id, reason);
                    None
                }
            };
        }

        let exception = series.inline.get(&date).copied();
        let span = match exception {
            Some(exc) if exc.cancelled => {
                stats.cancelled += 1;
                return None;
            }
            Some(exc) => {
                let replacement = Override {
                    start: exc.start.as_deref(),
                    end: exc.end.as_deref(),
                };
                match Self::apply_override(&replacement, original, series.duration, tz) {
                    Ok(span) => span,
                    Err(reason) => {
                        stats.record_malformed(id, reason);
                        return None;
                    }
                }
            }
            None => original,
        };

        if !(span.start < window.end && span.end > window.start) {
            stats.out_of_window += 1;
            return None;
        }
        let mut event = Self::build(series.raw, id, span, tz, Some(series.id), series.attendees);
        if let Some(title) = exception.and_then(|e| e.title.as_deref()) {
            event.title = title.trim().to_string();
        }
        stats.occurrences_expanded += 1;
        Some(event)
    }

    fn apply_override(
        replacement: &Override<'_>,
        original: Span,
        duration: Duration,
        tz: Tz,
    ) -> Result<Span, MalformedEventError> {
        if replacement.start.is_none() && replacement.end.is_none() {
            return Ok(original);
        }
        let start = match replacement.start {
            Some(s) => RawTime::parse(s, "start")?,
            None => RawTime::Instant(original.start),
        };
        let end = match replacement.end {
            Some(e) => RawTime::parse(e, "end")?,
            None if original.all_day => RawTime::Instant(original.end),
            None => RawTime::Instant(start.to_utc(tz)? + duration),
        };
        resolve_span(start, end, original.all_day, tz)
    }

    /// Normalize a batch of raw records for `window`.
    ///
    /// Output is deduplicated, recurrence-expanded, clipped to events that
    /// intersect the window, and sorted by start, end, then id.
    pub fn normalize(
        &self,
        raw: &[RawEvent],
        window: &AnalysisWindow,
    ) -> (Vec<CalendarEvent>, NormalizationStats) {
        let mut stats = NormalizationStats {
            raw_records: raw.len(),
            ..NormalizationStats::default()
        };

        // First record seen wins.
        let mut seen = HashSet::new();
        let mut unique: Vec<&RawEvent> = Vec::with_capacity(raw.len());
        for record in raw {
            let key = match record.id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => format!("id:{id}"),
                _ => format!("content:{}", content_key(record)),
            };
            if seen.insert(key) {
                unique.push(record);
            } else {
                stats.duplicates += 1;
            }
        }

        let mut overrides: HashMap<(String, NaiveDate), &RawEvent> = HashMap::new();
        let mut regular = Vec::with_capacity(unique.len());
        for record in unique {
            match (&record.recurring_event_id, record.original_date) {
                (Some(series), Some(date)) => {
                    overrides.entry((series.clone(), date)).or_insert(record);
                }
                _ => regular.push(record),
            }
        }

        let mut consumed = HashSet::new();
        let mut events = Vec::new();
        for record in &regular {
            let id = record
                .id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| content_id(record));

            if record.is_cancelled() {
                stats.cancelled += 1;
                continue;
            }

            match record.recurrence_rule.as_deref().map(str::trim) {
                Some(rule) if !rule.is_empty() => {
                    match self.expand_series(
                        record,
                        &id,
                        rule,
                        &overrides,
                        &mut consumed,
                        window,
                        &mut stats,
                    ) {
                        Ok(instances) => events.extend(instances),
                        Err(reason) => stats.record_malformed(id, reason),
                    }
                }
                _ => match self.normalize_single(record, id.clone(), None) {
                    Ok(event) if event.overlaps(window.start, window.end) => events.push(event),
                    Ok(_) => stats.out_of_window += 1,
                    Err(reason) => stats.record_malformed(id, reason),
                },
            }
        }

        // Overrides whose occurrence was never generated stand on their own.
        let mut orphans: Vec<_> = overrides
            .iter()
            .filter(|(key, _)| !consumed.contains(*key))
            .collect();
        orphans.sort_by(|a, b| a.0.cmp(b.0));
        for ((series, _), record) in orphans {
            if record.is_cancelled() {
                stats.cancelled += 1;
                continue;
            }
            let id = record
                .id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| content_id(record));
            match self.normalize_single(record, id.clone(), Some(series)) {
                Ok(event) if event.overlaps(window.start, window.end) => events.push(event),
                Ok(_) => stats.out_of_window += 1,
                Err(reason) => stats.record_malformed(id, reason),
            }
        }

        events.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(a.end.cmp(&b.end))
                .then_with(|| a.id.cmp(&b.id))
        });
        let before = events.len();
        let mut ids = HashSet::new();
        events.retain(|e| ids.insert(e.id.clone()));
        stats.duplicates += before - events.len();

        stats.normalized = events.len();
        tracing::debug!(
            raw = stats.raw_records,
            normalized = stats.normalized,
            malformed = stats.malformed.len(),
            duplicates = stats.duplicates,
            cancelled = stats.cancelled,
            "normalized calendar events"
        );
        (events, stats)
    }
}

impl NormalizationStats {
    fn record_malformed(&mut self, id: String, reason: MalformedEventError) {
        tracing::warn!(event_id = %id, %reason, "dropping malformed event");
        self.malformed.push(DroppedEvent {
            id,
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> AnalysisWindow {
        AnalysisWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn timed(id: Option<&str>, title: &str, start: &str, end: &str) -> RawEvent {
        RawEvent {
            id: id.map(str::to_string),
            title: title.into(),
            start: Some(start.into()),
            end: Some(end.into()),
            ..RawEvent::default()
        }
    }

    fn normalizer() -> EventNormalizer {
        EventNormalizer::new(chrono_tz::UTC)
    }

    #[test]
    fn duplicate_ids_collapse_to_first() {
        let raw = vec![
            timed(Some("a"), "Standup", "2024-01-02T09:00", "2024-01-02T09:15"),
            timed(Some("a"), "Standup (copy)", "2024-01-02T09:00", "2024-01-02T09:15"),
        ];
        let (events, stats) = normalizer().normalize(&raw, &window());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Standup");
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn duplicates_without_id_use_content() {
        let raw = vec![
            timed(None, "Lunch", "2024-01-02T12:00", "2024-01-02T13:00"),
            timed(None, "Lunch", "2024-01-02T12:00", "2024-01-02T13:00"),
            timed(None, "Lunch", "2024-01-03T12:00", "2024-01-03T13:00"),
        ];
        let (events, stats) = normalizer().normalize(&raw, &window());
        assert_eq!(events.len(), 2);
        assert_eq!(stats.duplicates, 1);
        assert!(events[0].id.starts_with("evt-"));
        assert_ne!(events[0].id, events[1].id);
    }

    #[test]
    fn end_before_start_is_dropped_and_counted() {
        let raw = vec![timed(Some("bad"), "Oops", "2024-01-02T10:00", "2024-01-02T09:00")];
        let (events, stats) = normalizer().normalize(&raw, &window());
        assert!(events.is_empty());
        assert_eq!(stats.malformed.len(), 1);
        assert_eq!(stats.malformed[0].id, "bad");
    }

    #[test]
    fn missing_end_is_malformed() {
        let raw = vec![RawEvent {
            id: Some("x".into()),
            start: Some("2024-01-02T10:00".into()),
            ..RawEvent::default()
        }];
        let (_, stats) = normalizer().normalize(&raw, &window());
        assert_eq!(stats.malformed[0].reason, "event has no end time");
    }

    #[test]
    fn all_day_spans_local_midnights() {
        let raw = vec![RawEvent {
            id: Some("trip".into()),
            title: "Vacation".into(),
            start: Some("2024-01-03".into()),
            end: Some("2024-01-05".into()),
            timezone: Some("America/New_York".into()),
            all_day: true,
            ..RawEvent::default()
        }];
        let (events, _) = normalizer().normalize(&raw, &window());
        assert_eq!(events[0].start, Utc.with_ymd_and_hms(2024, 1, 3, 5, 0, 0).unwrap());
        assert_eq!(events[0].end, Utc.with_ymd_and_hms(2024, 1, 5, 5, 0, 0).unwrap());
        assert!(events[0].all_day);
        assert_eq!(events[0].timezone, "America/New_York");
    }

    #[test]
    fn unknown_timezone_is_malformed() {
        let mut raw = timed(Some("tz"), "Call", "2024-01-02T10:00", "2024-01-02T11:00");
        raw.timezone = Some("Atlantis/Capital".into());
        let (events, stats) = normalizer().normalize(&[raw], &window());
        assert!(events.is_empty());
        assert_eq!(stats.malformed.len(), 1);
    }

    #[test]
    fn recurring_series_expands_inside_window() {
        let mut raw = timed(Some("standup"), "Standup", "2023-12-25T09:00", "2023-12-25T09:15");
        raw.recurrence_rule = Some("RRULE:FREQ=DAILY".into());
        let (events, stats) = normalizer().normalize(&[raw], &window());
        assert_eq!(events.len(), 14);
        assert_eq!(stats.occurrences_expanded, 14);
        assert_eq!(events[0].id, "standup_20240101T090000Z");
        assert_eq!(events[0].source_recurrence_id.as_deref(), Some("standup"));
    }

    #[test]
    fn inline_exception_can_move_an_occurrence_into_the_window() {
        // The Jan 16 instance lies past the window end; its exception moves
        // it back to Jan 14.
        let mut raw = timed(Some("review"), "Review", "2024-01-09T15:00", "2024-01-09T16:00");
        raw.recurrence_rule = Some("FREQ=WEEKLY;COUNT=2".into());
        raw.recurrence_exceptions = vec![RecurrenceException {
            original_date: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            start: Some("2024-01-14T10:00".into()),
            end: Some("2024-01-14T11:00".into()),
            ..RecurrenceException::default()
        }];
        let (events, stats) = normalizer().normalize(&[raw], &window());
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].start, Utc.with_ymd_and_hms(2024, 1, 14, 10, 0, 0).unwrap());
        assert_eq!(events[1].id, "review_20240116T150000Z");
        assert_eq!(stats.occurrences_expanded, 2);
    }

    #[test]
    fn exception_for_a_date_the_rule_never_produces_is_ignored() {
        let mut raw = timed(Some("review"), "Review", "2024-01-09T15:00", "2024-01-09T16:00");
        raw.recurrence_rule = Some("FREQ=WEEKLY;COUNT=1".into());
        raw.recurrence_exceptions = vec![RecurrenceException {
            original_date: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            start: Some("2024-01-14T10:00".into()),
            end: Some("2024-01-14T11:00".into()),
            ..RecurrenceException::default()
        }];
        let (events, _) = normalizer().normalize(&[raw], &window());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn runaway_series_is_counted_as_truncated() {
        let mut raw = timed(Some("tick"), "Tick", "1990-01-01T09:00", "1990-01-01T09:05");
        raw.recurrence_rule = Some("FREQ=DAILY".into());
        let long = AnalysisWindow::new(
            Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let (events, stats) = normalizer().normalize(&[raw], &long);
        assert_eq!(stats.truncated_series, 1);
        assert_eq!(events.len(), MAX_OCCURRENCES);
    }

    #[test]
    fn inline_exceptions_cancel_and_move_occurrences() {
        let mut raw = timed(Some("s"), "Sync", "2024-01-01T09:00", "2024-01-01T10:00");
        raw.recurrence_rule = Some("FREQ=DAILY;COUNT=3".into());
        raw.recurrence_exceptions = vec![
            RecurrenceException {
                original_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                cancelled: true,
                ..RecurrenceException::default()
            },
            RecurrenceException {
                original_date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                start: Some("2024-01-03T14:00".into()),
                title: Some("Sync (moved)".into()),
                ..RecurrenceException::default()
            },
        ];
        let (events, stats) = normalizer().normalize(&[raw], &window());
        assert_eq!(events.len(), 2);
        assert_eq!(stats.cancelled, 1);
        let moved = &events[1];
        assert_eq!(moved.start, Utc.with_ymd_and_hms(2024, 1, 3, 14, 0, 0).unwrap());
        assert_eq!(moved.end, Utc.with_ymd_and_hms(2024, 1, 3, 15, 0, 0).unwrap());
        assert_eq!(moved.title, "Sync (moved)");
        // Id stays tied to the original slot.
        assert_eq!(moved.id, "s_20240103T090000Z");
    }

    #[test]
    fn standalone_override_replaces_occurrence() {
        let mut series = timed(Some("gym"), "Gym", "2024-01-01T07:00", "2024-01-01T08:00");
        series.recurrence_rule = Some("FREQ=DAILY;COUNT=2".into());
        let mut moved = timed(Some("gym-override"), "Gym (late)", "2024-01-02T18:00", "2024-01-02T19:00");
        moved.recurring_event_id = Some("gym".into());
        moved.original_date = NaiveDate::from_ymd_opt(2024, 1, 2);

        let (events, _) = normalizer().normalize(&[series, moved], &window());
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].title, "Gym (late)");
        assert_eq!(events[1].start, Utc.with_ymd_and_hms(2024, 1, 2, 18, 0, 0).unwrap());
        assert_eq!(events[1].id, "gym_20240102T070000Z");
    }

    #[test]
    fn cancelled_records_are_tallied_not_malformed() {
        let mut raw = timed(Some("c"), "Dropped", "2024-01-02T10:00", "2024-01-02T11:00");
        raw.status = Some("cancelled".into());
        let (events, stats) = normalizer().normalize(&[raw], &window());
        assert!(events.is_empty());
        assert_eq!(stats.cancelled, 1);
        assert!(stats.malformed.is_empty());
    }

    #[test]
    fn output_is_sorted_by_start() {
        let raw = vec![
            timed(Some("late"), "B", "2024-01-03T10:00", "2024-01-03T11:00"),
            timed(Some("early"), "A", "2024-01-02T10:00", "2024-01-02T11:00"),
        ];
        let (events, _) = normalizer().normalize(&raw, &window());
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn events_outside_window_are_skipped() {
        let raw = vec![timed(Some("old"), "Old", "2023-06-01T10:00", "2023-06-01T11:00")];
        let (events, stats) = normalizer().normalize(&raw, &window());
        assert!(events.is_empty());
        assert_eq!(stats.out_of_window, 1);
    }
}
