//! Config files on disk driving a pipeline.

use attention_core::aggregate::{Granularity, OverlapPolicy};
use attention_core::{AnalysisWindow, Config, ConfigError, Domain, Pipeline, RawEvent};
use chrono::{TimeZone, Utc};
use indoc::indoc;
use tempfile::TempDir;

#[test]
fn save_then_load_preserves_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.timezone = "America/New_York".into();
    config.aggregation.granularity = Granularity::Week;
    config.aggregation.overlap_policy = OverlapPolicy::PriorityDomainWins;
    config.patterns.min_support = 6;
    config
        .recommendations
        .domain_importance
        .insert("Health".into(), 2.0);
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.timezone, "America/New_York");
    assert_eq!(loaded.aggregation.granularity, Granularity::Week);
    assert_eq!(loaded.aggregation.overlap_policy, OverlapPolicy::PriorityDomainWins);
    assert_eq!(loaded.patterns.min_support, 6);
    assert_eq!(loaded.get("recommendations.domain_importance.Health").as_deref(), Some("2.0"));
}

#[test]
fn partial_file_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        indoc! {r#"
            timezone = "Europe/Berlin"

            [aggregation]
            granularity = "week"
        "#},
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.timezone, "Europe/Berlin");
    assert_eq!(config.aggregation.granularity, Granularity::Week);
    assert_eq!(config.aggregation.overlap_policy, OverlapPolicy::EqualSplit);
    assert_eq!(config.patterns.lags, vec![0, -1]);
}

#[test]
fn keyword_for_unknown_domain_is_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        indoc! {r#"
            [classification.keywords]
            Wealth = ["stocks", "broker"]
        "#},
    )
    .unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownDomain { ref domain, .. } if domain == "Wealth"));
}

#[test]
fn missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::LoadFailed { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn custom_taxonomy_drives_classification() {
    let config = Config::from_toml_str(indoc! {r#"
        [taxonomy]
        domains = ["Craft", "Family"]

        [classification]
        all_day_domain = "Family"
        attendee_rules = []

        [classification.keywords]
        Craft = ["pottery", "woodwork"]
        Family = ["kids", "grandma"]

        [insights]
        peak_hour_domains = ["Craft"]
        balance_rules = []
        min_active_domains = 2
    "#})
    .unwrap();
    let pipeline = Pipeline::new(config).unwrap();

    let raw: Vec<RawEvent> = serde_json::from_str(indoc! {r#"
        [
          {"id": "a", "title": "Pottery class", "start": "2024-01-02T18:00", "end": "2024-01-02T20:00"},
          {"id": "b", "title": "Visit grandma", "start": "2024-01-03T10:00", "end": "2024-01-03T12:00"}
        ]
    "#})
    .unwrap();
    let window = AnalysisWindow::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
    )
    .unwrap();
    let run = pipeline.run(&raw, &[], window);

    let domains: Vec<_> = run.events.iter().map(|e| e.primary_domain.clone()).collect();
    assert_eq!(domains, vec![Domain::new("Craft"), Domain::new("Family")]);
    assert!((run.summary.share(&Domain::new("Craft")) - 0.5).abs() < 1e-9);
    assert!(run.insights.iter().any(|i| i.id == "peak_hour:Craft"));
}

#[test]
fn insight_domains_must_exist_in_the_taxonomy() {
    let err = Config::from_toml_str(indoc! {r#"
        [insights]
        peak_hour_domains = ["Gardening"]
    "#})
    .and_then(|config| config.validate())
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownDomain { .. }));
    assert!(err.to_string().contains("insights.peak_hour_domains"));
}
