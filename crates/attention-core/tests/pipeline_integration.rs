//! End-to-end runs over a synthetic four-week calendar.

use attention_core::{
    ActionKind, AnalysisWindow, Config, Direction, Domain, InsightKind, Pipeline, RawEvent, TimeSlot,
    WellbeingSignal,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::json;

const DAYS: i64 = 28;

fn day(d: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(d)
}

fn gym_minutes(d: i64) -> i64 {
    30 + 15 * (d % 4)
}

/// Daily gym of varying length, a recurring workday, and some noise.
fn raw_events() -> Vec<RawEvent> {
    let mut records = vec![json!({
        "id": "workday",
        "title": "Project meeting",
        "start": "2024-01-01T09:00",
        "end": "2024-01-01T18:00",
        "attendee_count": 8,
        "recurrence_rule": "RRULE:FREQ=DAILY;COUNT=28"
    })];
    for d in 0..DAYS {
        let start = day(d).and_hms_opt(7, 0, 0).unwrap();
        let end = start + Duration::minutes(gym_minutes(d));
        records.push(json!({
            "id": format!("gym-{d}"),
            "title": "Gym session",
            "start": start.format("%Y-%m-%dT%H:%M").to_string(),
            "end": end.format("%Y-%m-%dT%H:%M").to_string(),
            "attendee_count": 0
        }));
    }
    records.extend([
        // duplicate of the first gym record
        json!({"id": "gym-0", "title": "Gym (again)", "start": "2024-01-01T07:00", "end": "2024-01-01T07:30"}),
        // end before start
        json!({"id": "broken", "title": "Oops", "start": "2024-01-05T12:00", "end": "2024-01-05T11:00"}),
        json!({"id": "gone", "title": "Dinner", "start": "2024-01-06T19:00", "end": "2024-01-06T21:00", "status": "cancelled"}),
        json!({"id": "trip", "title": "Vacation", "start": "2024-01-20", "end": "2024-01-21", "all_day": true}),
    ]);
    serde_json::from_value(serde_json::Value::Array(records)).unwrap()
}

/// Energy tracks the day's gym time exactly.
fn energy() -> Vec<WellbeingSignal> {
    let records: Vec<_> = (0..DAYS)
        .map(|d| {
            json!({
                "date": day(d).to_string(),
                "metric_name": "energy",
                "value": 3.0 + gym_minutes(d) as f64 / 15.0
            })
        })
        .collect();
    serde_json::from_value(serde_json::Value::Array(records)).unwrap()
}

fn window() -> AnalysisWindow {
    AnalysisWindow::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 29, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

#[test]
fn full_run_finds_gym_energy_link() {
    let pipeline = Pipeline::new(Config::default()).unwrap();
    let run = pipeline.run(&raw_events(), &energy(), window());

    let norm = &run.diagnostics.normalization;
    assert_eq!(norm.occurrences_expanded, 28);
    assert_eq!(norm.duplicates, 1);
    assert_eq!(norm.cancelled, 1);
    assert_eq!(norm.malformed.len(), 1);
    assert_eq!(norm.malformed[0].id, "broken");
    assert_eq!(run.events.len(), 28 + 28 + 1);
    assert_eq!(run.diagnostics.aggregation.all_day_excluded, 1);

    let pattern = run
        .patterns
        .iter()
        .find(|p| p.id == "allocation:Health~wellbeing:energy@lag0")
        .expect("gym/energy pattern");
    assert_eq!(pattern.direction, Direction::Positive);
    assert_eq!(pattern.support, 28);
    assert!(pattern.confidence.coefficient > 0.99);

    let rec = run
        .recommendations
        .iter()
        .find(|r| r.domain == Domain::new("Health") && r.kind == ActionKind::Increase)
        .expect("health recommendation");
    assert!(rec.rationale.contains(&pattern.id));
    let impact = rec.estimated_impact;
    let suggested = impact.suggested_share_pct.expect("increase suggests a share");
    assert!(suggested > impact.current_share_pct);
    assert!(run
        .recommendations
        .iter()
        .all(|r| !r.rationale.is_empty()));
}

#[test]
fn narrow_portfolio_yields_insights_and_add_domain() {
    let pipeline = Pipeline::new(Config::default()).unwrap();
    let run = pipeline.run(&raw_events(), &energy(), window());

    let ids: Vec<&str> = run.insights.iter().map(|i| i.id.as_str()).collect();
    assert!(ids.contains(&"peak_hour:Work"));
    assert!(ids.contains(&"balance:Work/Rest"));
    assert!(ids.contains(&"streak:Work"));
    assert!(ids.contains(&"missing:Rest"));
    let diversity = run
        .insights
        .iter()
        .find(|i| i.id == "diversity")
        .expect("low diversity insight");
    assert!(matches!(
        diversity.kind,
        InsightKind::LowDiversity { active_domains: 2, .. }
    ));

    let add = run
        .recommendations
        .iter()
        .find(|r| r.kind == ActionKind::AddDomain)
        .expect("add-domain recommendation");
    assert!(add.rationale.iter().any(|id| id.starts_with("missing:")));
    assert!(add.rationale.contains(&"diversity".to_string()));
    assert!(run
        .recommendations
        .iter()
        .any(|r| r.kind == ActionKind::Rebalance && r.id == "rebalance:Work~Rest"));
}

fn late_minutes(d: i64) -> i64 {
    60 * (d % 4)
}

/// A fixed morning of work plus a variable stretch from 16:00; energy
/// the next day drops by an hour per late hour.
fn late_work_events() -> Vec<RawEvent> {
    let mut records = Vec::new();
    for d in 0..DAYS {
        let morning = day(d).and_hms_opt(9, 0, 0).unwrap();
        records.push(json!({
            "id": format!("am-{d}"),
            "title": "Project meeting",
            "start": morning.format("%Y-%m-%dT%H:%M").to_string(),
            "end": (morning + Duration::hours(3)).format("%Y-%m-%dT%H:%M").to_string(),
            "attendee_count": 8
        }));
        if late_minutes(d) > 0 {
            let late = day(d).and_hms_opt(16, 0, 0).unwrap();
            records.push(json!({
                "id": format!("pm-{d}"),
                "title": "Project meeting",
                "start": late.format("%Y-%m-%dT%H:%M").to_string(),
                "end": (late + Duration::minutes(late_minutes(d))).format("%Y-%m-%dT%H:%M").to_string(),
                "attendee_count": 8
            }));
        }
    }
    serde_json::from_value(serde_json::Value::Array(records)).unwrap()
}

fn next_day_energy() -> Vec<WellbeingSignal> {
    let records: Vec<_> = (1..DAYS)
        .map(|d| {
            json!({
                "date": day(d).to_string(),
                "metric_name": "energy",
                "value": 8.0 - late_minutes(d - 1) as f64 / 60.0
            })
        })
        .collect();
    serde_json::from_value(serde_json::Value::Array(records)).unwrap()
}

#[test]
fn late_work_is_found_and_rescheduled() {
    let mut config = Config::default();
    config.patterns.time_slots = vec![
        TimeSlot::new("morning", 0, 12),
        TimeSlot::new("afternoon", 12, 16),
        TimeSlot::new("late", 16, 24),
    ];
    let pipeline = Pipeline::new(config).unwrap();
    let run = pipeline.run(&late_work_events(), &next_day_energy(), window());

    let pattern = run
        .patterns
        .iter()
        .find(|p| p.id == "slot:Work@late~wellbeing:energy@lag-1")
        .expect("late work pattern");
    assert_eq!(pattern.direction, Direction::Negative);
    assert!(pattern.confidence.coefficient < -0.99);
    // Constant morning hours carry no signal.
    assert!(run.patterns.iter().all(|p| !p.id.starts_with("slot:Work@morning")));

    let rec = run
        .recommendations
        .iter()
        .find(|r| r.kind == ActionKind::Reschedule)
        .expect("reschedule recommendation");
    assert_eq!(rec.id, "reschedule:Work@late");
    assert!(rec.rationale.contains(&pattern.id));
    assert!(rec.action.contains("16:00-24:00"));
}

#[test]
fn allocation_is_conserved_per_period() {
    let pipeline = Pipeline::new(Config::default()).unwrap();
    let run = pipeline.run(&raw_events(), &energy(), window());

    assert_eq!(run.allocation.coverage.len(), 28);
    for cov in &run.allocation.coverage {
        let total: i64 = run
            .allocation
            .buckets
            .iter()
            .filter(|b| b.period == cov.period)
            .map(|b| b.total_duration.0)
            .sum();
        assert_eq!(total, cov.scheduled.0);
        assert!(total <= cov.period.length_ms());
    }

    let work = run.summary.share(&Domain::new("Work"));
    let health = run.summary.share(&Domain::new("Health"));
    assert!((work + health - 1.0).abs() < 1e-9);
    assert!(health < 0.10);
}

#[test]
fn identical_input_gives_identical_output() {
    let pipeline = Pipeline::new(Config::default()).unwrap();
    let first = pipeline.run(&raw_events(), &energy(), window());
    let second = pipeline.run(&raw_events(), &energy(), window());

    assert_eq!(
        serde_json::to_string(&first.allocation.buckets).unwrap(),
        serde_json::to_string(&second.allocation.buckets).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.patterns).unwrap(),
        serde_json::to_string(&second.patterns).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.recommendations).unwrap(),
        serde_json::to_string(&second.recommendations).unwrap()
    );
}

#[test]
fn independent_runs_share_one_pipeline() {
    let pipeline = std::sync::Arc::new(Pipeline::new(Config::default()).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = pipeline.clone();
            std::thread::spawn(move || pipeline.run(&raw_events(), &energy(), window()).patterns)
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn too_little_wellbeing_data_is_a_warning_not_a_pattern() {
    let pipeline = Pipeline::new(Config::default()).unwrap();
    let sparse: Vec<WellbeingSignal> = energy().into_iter().take(3).collect();
    let run = pipeline.run(&raw_events(), &sparse, window());

    assert!(run.patterns.iter().all(|p| !p.target().is_wellbeing()));
    let warning = run
        .diagnostics
        .detection
        .insufficient_data
        .iter()
        .find(|w| w.variables.iter().any(|v| v.is_wellbeing()) && w.lag == 0)
        .expect("warning for the energy series");
    assert_eq!(warning.support, 3);
    assert_eq!(warning.required, 10);
}
