//! Classification rules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::Config;
use crate::domain::{Domain, Taxonomy};
use crate::error::ConfigError;
use crate::events::CalendarEvent;

/// One source of domain evidence. All variants are evaluated the same way:
/// each adds weight to zero or more domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationRule {
    /// Case-insensitive substring match on title and description.
    /// Every matched keyword adds `weight`.
    Keyword {
        domain: Domain,
        keywords: Vec<String>,
        weight: f64,
    },
    /// Attendee-count band; adds `weight` to each listed domain.
    Attendees {
        min: Option<u32>,
        max: Option<u32>,
        domains: Vec<Domain>,
        weight: f64,
    },
    /// Bias for all-day records.
    AllDay { domain: Domain, weight: f64 },
}

impl ClassificationRule {
    /// Add this rule's evidence for `event` to `scores`.
    ///
    /// `text` is the event's lowercased search text, computed once per event.
    pub fn apply(&self, event: &CalendarEvent, text: &str, scores: &mut BTreeMap<Domain, f64>) {
        match self {
            ClassificationRule::Keyword {
                domain,
                keywords,
                weight,
            } => {
                let hits = keywords.iter().filter(|k| text.contains(k.as_str())).count();
                if hits > 0 {
                    *scores.entry(domain.clone()).or_default() += weight * hits as f64;
                }
            }
            ClassificationRule::Attendees {
                min,
                max,
                domains,
                weight,
            } => {
                let n = event.attendee_count;
                if min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m) {
                    for domain in domains {
                        *scores.entry(domain.clone()).or_default() += weight;
                    }
                }
            }
            ClassificationRule::AllDay { domain, weight } => {
                if event.all_day {
                    *scores.entry(domain.clone()).or_default() += weight;
                }
            }
        }
    }

    /// Rule set described by `config`, in evaluation order: keywords, then
    /// attendee heuristics, then the all-day bias.
    pub fn from_config(config: &Config, taxonomy: &Taxonomy) -> Result<Vec<Self>, ConfigError> {
        let cls = &config.classification;
        let resolve = |key: String, label: &str| {
            taxonomy
                .resolve(label)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownDomain {
                    key,
                    domain: label.to_string(),
                })
        };

        let mut rules = Vec::new();
        for (label, words) in &cls.keywords {
            let domain = resolve(format!("classification.keywords.{label}"), label)?;
            let mut keywords: Vec<String> = words.iter().map(|w| w.trim().to_lowercase()).collect();
            keywords.sort();
            keywords.dedup();
            rules.push(ClassificationRule::Keyword {
                domain,
                keywords,
                weight: cls.keyword_weight,
            });
        }

        for (i, rule) in cls.attendee_rules.iter().enumerate() {
            let domains = rule
                .domains
                .iter()
                .map(|label| resolve(format!("classification.attendee_rules[{i}]"), label))
                .collect::<Result<Vec<_>, _>>()?;
            rules.push(ClassificationRule::Attendees {
                min: rule.min_attendees,
                max: rule.max_attendees,
                domains,
                weight: cls.heuristic_weight,
            });
        }

        if cls.all_day_bias {
            rules.push(ClassificationRule::AllDay {
                domain: resolve("classification.all_day_domain".into(), &cls.all_day_domain)?,
                weight: cls.heuristic_weight,
            });
        }
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(title: &str, attendees: u32) -> CalendarEvent {
        CalendarEvent {
            id: "e".into(),
            start: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            title: title.into(),
            description: None,
            attendee_count: attendees,
            source_recurrence_id: None,
            all_day: false,
            timezone: "UTC".into(),
        }
    }

    #[test]
    fn each_keyword_hit_adds_weight() {
        let rule = ClassificationRule::Keyword {
            domain: Domain::new("Health"),
            keywords: vec!["gym".into(), "workout".into()],
            weight: 1.0,
        };
        let e = event("Gym workout", 0);
        let mut scores = BTreeMap::new();
        rule.apply(&e, &e.search_text(), &mut scores);
        assert_eq!(scores[&Domain::new("Health")], 2.0);
    }

    #[test]
    fn attendee_band_is_inclusive() {
        let rule = ClassificationRule::Attendees {
            min: Some(5),
            max: None,
            domains: vec![Domain::new("Work"), Domain::new("Social")],
            weight: 0.25,
        };
        let mut scores = BTreeMap::new();
        let e = event("All hands", 5);
        rule.apply(&e, &e.search_text(), &mut scores);
        assert_eq!(scores.len(), 2);

        let mut none = BTreeMap::new();
        let e = event("1:1", 4);
        rule.apply(&e, &e.search_text(), &mut none);
        assert!(none.is_empty());
    }

    #[test]
    fn all_day_rule_ignores_timed_events() {
        let rule = ClassificationRule::AllDay {
            domain: Domain::new("Rest"),
            weight: 0.25,
        };
        let mut scores = BTreeMap::new();
        let e = event("Vacation", 0);
        rule.apply(&e, &e.search_text(), &mut scores);
        assert!(scores.is_empty());
    }

    #[test]
    fn rules_from_default_config() {
        let config = Config::default();
        let taxonomy = config.taxonomy().unwrap();
        let rules = ClassificationRule::from_config(&config, &taxonomy).unwrap();
        let keyword_rules = rules
            .iter()
            .filter(|r| matches!(r, ClassificationRule::Keyword { .. }))
            .count();
        assert_eq!(keyword_rules, 6);
        assert!(matches!(rules.last(), Some(ClassificationRule::AllDay { .. })));
    }

    #[test]
    fn all_day_bias_can_be_switched_off_from_toml() {
        let config = Config::from_toml_str(indoc::indoc! {r#"
            [classification]
            all_day_bias = false
            all_day_domain = "NotADomain"
        "#})
        .unwrap();
        config.validate().unwrap();
        let taxonomy = config.taxonomy().unwrap();
        let rules = ClassificationRule::from_config(&config, &taxonomy).unwrap();
        assert!(!rules
            .iter()
            .any(|r| matches!(r, ClassificationRule::AllDay { .. })));
    }

    #[test]
    fn rule_serializes_with_kind_tag() {
        let rule = ClassificationRule::AllDay {
            domain: Domain::new("Rest"),
            weight: 0.5,
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["kind"], "all_day");
        assert_eq!(json["domain"], "Rest");
    }
}
