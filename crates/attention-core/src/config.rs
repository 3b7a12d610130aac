//! TOML-based analytics configuration.
//!
//! Holds everything the pipeline reads at run time:
//! - Domain taxonomy (ordered; order is tie-break priority)
//! - Per-domain keyword lists and classification weights
//! - Bucket granularity and overlap policy
//! - Correlation lags, significance and support thresholds
//! - Time-of-day slots and structural insight rules
//! - Domain-importance weights for recommendation ranking
//!
//! Configuration is stored at `~/.config/attention-portfolio/config.toml`.
//! It is validated once, before any data is touched, and then shared
//! read-only by every stage of a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::aggregate::{Granularity, OverlapPolicy, TimeSlot};
use crate::domain::Taxonomy;
use crate::error::ConfigError;
use crate::patterns::CorrelationMethod;

/// Taxonomy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    /// Domain labels in priority order. `Unclassified` is implicit.
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,
}

/// One attendee-count heuristic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendeeRuleConfig {
    /// Inclusive lower bound on attendees (besides the owner).
    #[serde(default)]
    pub min_attendees: Option<u32>,
    /// Inclusive upper bound on attendees.
    #[serde(default)]
    pub max_attendees: Option<u32>,
    /// Domains biased when the count falls in range.
    pub domains: Vec<String>,
}

/// Classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Score added per matched keyword.
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    /// Score added by a heuristic (attendees, all-day) rule.
    #[serde(default = "default_heuristic_weight")]
    pub heuristic_weight: f64,
    /// A runner-up within this margin of the primary score marks the
    /// classification as ambiguous.
    #[serde(default = "default_ambiguity_margin")]
    pub ambiguity_margin: f64,
    /// Bias all-day records toward `all_day_domain`.
    #[serde(default = "default_true")]
    pub all_day_bias: bool,
    /// Domain biased by all-day records.
    #[serde(default = "default_all_day_domain")]
    pub all_day_domain: String,
    /// Domain label -> case-insensitive substrings.
    #[serde(default = "default_keywords")]
    pub keywords: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_attendee_rules")]
    pub attendee_rules: Vec<AttendeeRuleConfig>,
}

/// Aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
    /// Count all-day records as scheduled time.
    #[serde(default)]
    pub include_all_day_events: bool,
}

/// Pattern detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    #[serde(default)]
    pub method: CorrelationMethod,
    /// Maximum p-value for a finding to count.
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,
    /// Minimum number of paired observations.
    #[serde(default = "default_min_support")]
    pub min_support: usize,
    /// Minimum |coefficient| on top of the p-value test.
    #[serde(default = "default_min_abs_correlation")]
    pub min_abs_correlation: f64,
    /// Treat periods without any scheduled event as zero allocation instead
    /// of excluding them.
    #[serde(default)]
    pub zero_fill: bool,
    /// Correlate domain allocations against each other.
    #[serde(default = "default_true")]
    pub cross_domain: bool,
    #[serde(default)]
    pub include_unclassified: bool,
    #[serde(default = "default_true")]
    pub detect_non_monotonic: bool,
    /// Source offsets in periods: `-1` pairs the source one period before
    /// the target.
    #[serde(default = "default_lags")]
    pub lags: Vec<i32>,
    /// An opposite-sign lag variant is kept next to the strongest one only
    /// when its |coefficient| is within this distance.
    #[serde(default = "default_contradiction_margin")]
    pub contradiction_margin: f64,
    /// Local hour ranges mined per domain against well-being. Empty
    /// disables time-of-day series.
    #[serde(default = "default_time_slots")]
    pub time_slots: Vec<TimeSlot>,
}

/// A domain that should stay in proportion to another one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceRuleConfig {
    pub domain: String,
    pub counterweight: String,
    /// Largest acceptable `domain / counterweight` time ratio.
    pub max_ratio: f64,
}

/// Structural insight configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    /// Domains whose busiest local hour is reported.
    #[serde(default = "default_peak_hour_domains")]
    pub peak_hour_domains: Vec<String>,
    #[serde(default = "default_balance_rules")]
    pub balance_rules: Vec<BalanceRuleConfig>,
    /// Hours per period that keep a streak going.
    #[serde(default = "default_streak_min_hours")]
    pub streak_min_hours: f64,
    /// Shortest streak worth reporting.
    #[serde(default = "default_streak_min_periods")]
    pub streak_min_periods: usize,
    /// Fewer active domains than this is reported as low diversity. 0
    /// disables the check.
    #[serde(default = "default_min_active_domains")]
    pub min_active_domains: usize,
}

/// Recommendation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Importance for domains missing from `domain_importance`.
    #[serde(default = "default_importance")]
    pub default_importance: f64,
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
    #[serde(default)]
    pub domain_importance: BTreeMap<String, f64>,
}

/// Analytics configuration.
///
/// Serialized to/from TOML at `~/.config/attention-portfolio/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// IANA timezone for period boundaries and naive timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub insights: InsightConfig,
    #[serde(default)]
    pub recommendations: RecommendationConfig,
}

// Default functions
fn default_timezone() -> String {
    "UTC".into()
}
fn default_domains() -> Vec<String> {
    ["Work", "Health", "Social", "Learning", "Rest", "Admin"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_keyword_weight() -> f64 {
    1.0
}
fn default_heuristic_weight() -> f64 {
    0.25
}
fn default_ambiguity_margin() -> f64 {
    0.1
}
fn default_all_day_domain() -> String {
    "Rest".into()
}
fn default_keywords() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 6] = [
        (
            "Work",
            &[
                "meeting", "standup", "stand-up", "sync", "review", "project", "client",
                "deadline", "sprint", "planning", "presentation", "interview", "deep work",
                "focus", "code", "design", "draft", "develop",
            ],
        ),
        (
            "Health",
            &[
                "gym", "workout", "exercise", "running", "jog", "yoga", "pilates", "swim",
                "bike", "hike", "walk", "doctor", "dentist", "therapy", "fitness", "massage",
                "stretch", "physio", "wellness",
            ],
        ),
        (
            "Social",
            &[
                "dinner", "lunch", "coffee", "party", "birthday", "friend", "family",
                "date night", "drinks", "hangout", "catch up", "reunion", "wedding",
                "celebration",
            ],
        ),
        (
            "Learning",
            &[
                "learn", "study", "course", "class", "lecture", "training", "webinar",
                "seminar", "tutorial", "lesson", "reading", "conference", "research",
                "practice",
            ],
        ),
        (
            "Rest",
            &[
                "rest", "nap", "sleep", "meditat", "relax", "vacation", "holiday", "day off",
                "pto", "downtime", "unwind", "recharge", "self-care",
            ],
        ),
        (
            "Admin",
            &[
                "admin", "email", "inbox", "invoice", "expense", "taxes", "bank", "bill",
                "paperwork", "errand", "groceries", "renew", "insurance", "laundry",
            ],
        ),
    ];
    table
        .iter()
        .map(|(domain, words)| {
            (
                domain.to_string(),
                words.iter().map(|w| w.to_string()).collect(),
            )
        })
        .collect()
}
fn default_attendee_rules() -> Vec<AttendeeRuleConfig> {
    vec![
        AttendeeRuleConfig {
            min_attendees: None,
            max_attendees: Some(0),
            domains: vec!["Admin".into(), "Rest".into()],
        },
        AttendeeRuleConfig {
            min_attendees: Some(5),
            max_attendees: None,
            domains: vec!["Work".into(), "Social".into()],
        },
    ]
}
fn default_significance_level() -> f64 {
    0.05
}
fn default_min_support() -> usize {
    10
}
fn default_min_abs_correlation() -> f64 {
    0.3
}
fn default_lags() -> Vec<i32> {
    vec![0, -1]
}
fn default_contradiction_margin() -> f64 {
    0.1
}
fn default_time_slots() -> Vec<TimeSlot> {
    vec![
        TimeSlot::new("morning", 0, 12),
        TimeSlot::new("afternoon", 12, 17),
        TimeSlot::new("evening", 17, 24),
    ]
}
fn default_peak_hour_domains() -> Vec<String> {
    vec!["Work".into()]
}
fn default_balance_rules() -> Vec<BalanceRuleConfig> {
    vec![BalanceRuleConfig {
        domain: "Work".into(),
        counterweight: "Rest".into(),
        max_ratio: 3.0,
    }]
}
fn default_streak_min_hours() -> f64 {
    2.0
}
fn default_streak_min_periods() -> usize {
    3
}
fn default_min_active_domains() -> usize {
    3
}
fn default_true() -> bool {
    true
}
fn default_importance() -> f64 {
    1.0
}
fn default_max_recommendations() -> usize {
    10
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            domains: default_domains(),
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            keyword_weight: default_keyword_weight(),
            heuristic_weight: default_heuristic_weight(),
            ambiguity_margin: default_ambiguity_margin(),
            all_day_bias: true,
            all_day_domain: default_all_day_domain(),
            keywords: default_keywords(),
            attendee_rules: default_attendee_rules(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            overlap_policy: OverlapPolicy::default(),
            include_all_day_events: false,
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            method: CorrelationMethod::default(),
            significance_level: default_significance_level(),
            min_support: default_min_support(),
            min_abs_correlation: default_min_abs_correlation(),
            zero_fill: false,
            cross_domain: true,
            include_unclassified: false,
            detect_non_monotonic: true,
            lags: default_lags(),
            contradiction_margin: default_contradiction_margin(),
            time_slots: default_time_slots(),
        }
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            peak_hour_domains: default_peak_hour_domains(),
            balance_rules: default_balance_rules(),
            streak_min_hours: default_streak_min_hours(),
            streak_min_periods: default_streak_min_periods(),
            min_active_domains: default_min_active_domains(),
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_importance: default_importance(),
            max_recommendations: default_max_recommendations(),
            domain_importance: BTreeMap::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            taxonomy: TaxonomyConfig::default(),
            classification: ClassificationConfig::default(),
            aggregation: AggregationConfig::default(),
            patterns: PatternConfig::default(),
            insights: InsightConfig::default(),
            recommendations: RecommendationConfig::default(),
        }
    }
}

fn check_weight(key: &str, value: f64, allow_zero: bool) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 || (!allow_zero && value == 0.0) {
        let bound = if allow_zero { ">= 0" } else { "> 0" };
        return Err(ConfigError::invalid(key, format!("must be finite and {bound}, got {value}")));
    }
    Ok(())
}

fn check_domain(taxonomy: &Taxonomy, key: &str, label: &str) -> Result<(), ConfigError> {
    match taxonomy.resolve(label) {
        Some(domain) if !domain.is_unclassified() => Ok(()),
        _ => Err(ConfigError::UnknownDomain {
            key: key.to_string(),
            domain: label.to_string(),
        }),
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Default config location, `~/.config/attention-portfolio[-dev]/config.toml`.
    ///
    /// Set ATTENTION_ENV=dev to use the development directory.
    pub fn default_path() -> PathBuf {
        let base_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));

        let env = std::env::var("ATTENTION_ENV").unwrap_or_else(|_| "production".to_string());
        let dir = if env == "dev" {
            base_dir.join("attention-portfolio-dev")
        } else {
            base_dir.join("attention-portfolio")
        };
        dir.join("config.toml")
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Load from a file and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if any value
    /// fails validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg = Self::from_toml_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from the default location, or return the defaults when no file
    /// exists there yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Persist to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Parsed analysis timezone.
    pub fn tz(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::invalid("timezone", format!("unknown timezone '{}'", self.timezone)))
    }

    /// Build the taxonomy described by `taxonomy.domains`.
    pub fn taxonomy(&self) -> Result<Taxonomy, ConfigError> {
        Taxonomy::new(&self.taxonomy.domains)
    }

    /// Check every value. Called before any data is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        let taxonomy = self.taxonomy()?;

        let cls = &self.classification;
        check_weight("classification.keyword_weight", cls.keyword_weight, false)?;
        check_weight("classification.heuristic_weight", cls.heuristic_weight, true)?;
        if !(0.0..=1.0).contains(&cls.ambiguity_margin) {
            return Err(ConfigError::invalid(
                "classification.ambiguity_margin",
                "must be within [0, 1]",
            ));
        }
        for (label, words) in &cls.keywords {
            let key = format!("classification.keywords.{label}");
            check_domain(&taxonomy, &key, label)?;
            if words.iter().any(|w| w.trim().is_empty()) {
                return Err(ConfigError::invalid(key, "keywords must not be empty"));
            }
        }
        for (idx, rule) in cls.attendee_rules.iter().enumerate() {
            let key = format!("classification.attendee_rules[{idx}]");
            if rule.min_attendees.is_none() && rule.max_attendees.is_none() {
                return Err(ConfigError::invalid(key, "needs min_attendees or max_attendees"));
            }
            if let (Some(min), Some(max)) = (rule.min_attendees, rule.max_attendees) {
                if min > max {
                    return Err(ConfigError::invalid(key, format!("min {min} exceeds max {max}")));
                }
            }
            if rule.domains.is_empty() {
                return Err(ConfigError::invalid(key, "needs at least one domain"));
            }
            for domain in &rule.domains {
                check_domain(&taxonomy, &key, domain)?;
            }
        }
        if cls.all_day_bias {
            check_domain(&taxonomy, "classification.all_day_domain", &cls.all_day_domain)?;
        }

        if let Granularity::Custom { minutes } = self.aggregation.granularity {
            if minutes == 0 {
                return Err(ConfigError::invalid(
                    "aggregation.granularity",
                    "custom period length must be positive",
                ));
            }
        }

        let pat = &self.patterns;
        if pat.lags.is_empty() {
            return Err(ConfigError::MissingKey("patterns.lags".into()));
        }
        let mut lags = pat.lags.clone();
        lags.sort_unstable();
        lags.dedup();
        if lags.len() != pat.lags.len() {
            return Err(ConfigError::invalid("patterns.lags", "lags must be unique"));
        }
        if !(pat.significance_level > 0.0 && pat.significance_level < 1.0) {
            return Err(ConfigError::invalid(
                "patterns.significance_level",
                format!("must be within (0, 1), got {}", pat.significance_level),
            ));
        }
        if pat.min_support < 3 {
            return Err(ConfigError::invalid(
                "patterns.min_support",
                "at least 3 paired observations are needed for a significance test",
            ));
        }
        if !(0.0..1.0).contains(&pat.min_abs_correlation) {
            return Err(ConfigError::invalid(
                "patterns.min_abs_correlation",
                "must be within [0, 1)",
            ));
        }

        if !(0.0..=1.0).contains(&pat.contradiction_margin) {
            return Err(ConfigError::invalid(
                "patterns.contradiction_margin",
                "must be within [0, 1]",
            ));
        }
        let mut slot_names = std::collections::BTreeSet::new();
        for (idx, slot) in pat.time_slots.iter().enumerate() {
            let key = format!("patterns.time_slots[{idx}]");
            if slot.start_hour >= slot.end_hour || slot.end_hour > 24 {
                return Err(ConfigError::invalid(
                    key,
                    format!("needs 0 <= start_hour < end_hour <= 24, got {}..{}", slot.start_hour, slot.end_hour),
                ));
            }
            if slot.name.trim().is_empty() || !slot_names.insert(slot.name.as_str()) {
                return Err(ConfigError::invalid(key, format!("slot name '{}' must be non-empty and unique", slot.name)));
            }
        }

        let ins = &self.insights;
        for label in &ins.peak_hour_domains {
            check_domain(&taxonomy, "insights.peak_hour_domains", label)?;
        }
        for (idx, rule) in ins.balance_rules.iter().enumerate() {
            let key = format!("insights.balance_rules[{idx}]");
            check_domain(&taxonomy, &key, &rule.domain)?;
            check_domain(&taxonomy, &key, &rule.counterweight)?;
            if rule.domain.trim().eq_ignore_ascii_case(rule.counterweight.trim()) {
                return Err(ConfigError::invalid(key, "domain and counterweight must differ"));
            }
            check_weight(&format!("{key}.max_ratio"), rule.max_ratio, false)?;
        }
        check_weight("insights.streak_min_hours", ins.streak_min_hours, false)?;
        if ins.streak_min_periods < 2 {
            return Err(ConfigError::invalid("insights.streak_min_periods", "must be at least 2"));
        }
        let domain_count = taxonomy.classifiable().count();
        if ins.min_active_domains > domain_count {
            return Err(ConfigError::invalid(
                "insights.min_active_domains",
                format!("taxonomy has only {domain_count} domains"),
            ));
        }

        let rec = &self.recommendations;
        check_weight("recommendations.default_importance", rec.default_importance, true)?;
        if rec.max_recommendations == 0 {
            return Err(ConfigError::invalid(
                "recommendations.max_recommendations",
                "must be at least 1",
            ));
        }
        for (label, weight) in &rec.domain_importance {
            let key = format!("recommendations.domain_importance.{label}");
            check_domain(&taxonomy, &key, label)?;
            check_weight(&key, *weight, true)?;
        }

        Ok(())
    }
}
