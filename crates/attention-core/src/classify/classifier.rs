use std::collections::BTreeMap;

use super::rule::ClassificationRule;
use super::ClassifiedEvent;
use crate::config::Config;
use crate::diagnostics::ClassificationStats;
use crate::domain::{Domain, Taxonomy};
use crate::error::ConfigError;
use crate::events::CalendarEvent;

/// Rule-based domain classifier. Pure: the same event always yields the
/// same scores.
#[derive(Debug, Clone)]
pub struct Classifier {
    taxonomy: Taxonomy,
    rules: Vec<ClassificationRule>,
    ambiguity_margin: f64,
}

impl Classifier {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let taxonomy = config.taxonomy()?;
        let rules = ClassificationRule::from_config(config, &taxonomy)?;
        Ok(Self::with_rules(
            taxonomy,
            rules,
            config.classification.ambiguity_margin,
        ))
    }

    pub fn with_rules(taxonomy: Taxonomy, rules: Vec<ClassificationRule>, ambiguity_margin: f64) -> Self {
        Self {
            taxonomy,
            rules,
            ambiguity_margin,
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn classify(&self, event: &CalendarEvent) -> ClassifiedEvent {
        let text = event.search_text();
        let mut raw: BTreeMap<Domain, f64> = BTreeMap::new();
        for rule in &self.rules {
            rule.apply(event, &text, &mut raw);
        }
        raw.retain(|_, score| *score > 0.0);

        let max = raw.values().copied().fold(0.0_f64, f64::max);
        if max <= 0.0 {
            let unclassified = Domain::unclassified();
            return ClassifiedEvent {
                event: event.clone(),
                domain_scores: BTreeMap::from([(unclassified.clone(), 1.0)]),
                primary_domain: unclassified,
                ambiguous: false,
            };
        }

        let scores: BTreeMap<Domain, f64> = raw
            .into_iter()
            .map(|(domain, score)| (domain, score / max))
            .collect();

        let mut ranked: Vec<(&Domain, f64)> = scores.iter().map(|(d, s)| (d, *s)).collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| self.taxonomy.compare(a.0, b.0))
        });
        let primary = ranked[0].0.clone();
        let ambiguous = ranked
            .get(1)
            .is_some_and(|(_, runner_up)| ranked[0].1 - runner_up <= self.ambiguity_margin);

        ClassifiedEvent {
            event: event.clone(),
            domain_scores: scores,
            primary_domain: primary,
            ambiguous,
        }
    }

    /// Classify a whole batch and tally the outcome.
    pub fn classify_all(&self, events: &[CalendarEvent]) -> (Vec<ClassifiedEvent>, ClassificationStats) {
        let mut stats = ClassificationStats::default();
        let classified: Vec<ClassifiedEvent> = events
            .iter()
            .map(|event| {
                let c = self.classify(event);
                stats.classified += 1;
                if c.ambiguous {
                    stats.ambiguous += 1;
                }
                if c.primary_domain.is_unclassified() {
                    stats.unclassified += 1;
                }
                *stats.by_domain.entry(c.primary_domain.clone()).or_default() += 1;
                c
            })
            .collect();

        tracing::debug!(
            classified = stats.classified,
            ambiguous = stats.ambiguous,
            unclassified = stats.unclassified,
            "classified events"
        );
        (classified, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(title: &str, attendees: u32) -> CalendarEvent {
        CalendarEvent {
            id: title.to_lowercase().replace(' ', "-"),
            start: Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
            title: title.into(),
            description: None,
            attendee_count: attendees,
            source_recurrence_id: None,
            all_day: false,
            timezone: "UTC".into(),
        }
    }

    fn gym_only_config() -> Config {
        let mut config = Config::default();
        config.classification.keywords =
            BTreeMap::from([("Health".to_string(), vec!["gym".to_string(), "workout".to_string()])]);
        config
    }

    #[test]
    fn gym_session_is_health() {
        let classifier = Classifier::new(&gym_only_config()).unwrap();
        let result = classifier.classify(&event("Gym session", 0));
        assert_eq!(result.primary_domain, Domain::new("Health"));
        assert_eq!(result.score(&Domain::new("Health")), 1.0);
        assert!(!result.ambiguous);
    }

    #[test]
    fn no_signal_is_unclassified() {
        let mut config = gym_only_config();
        config.classification.attendee_rules.clear();
        let classifier = Classifier::new(&config).unwrap();
        let result = classifier.classify(&event("Something", 2));
        assert!(result.primary_domain.is_unclassified());
        assert_eq!(result.score(&Domain::unclassified()), 1.0);
    }

    #[test]
    fn scores_are_normalized_to_max() {
        let classifier = Classifier::new(&Config::default()).unwrap();
        let result = classifier.classify(&event("Project review meeting", 8));
        assert_eq!(result.primary_domain, Domain::new("Work"));
        assert_eq!(result.score(&Domain::new("Work")), 1.0);
        assert!(result.domain_scores.values().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn ties_follow_taxonomy_priority() {
        let classifier = Classifier::new(&Config::default()).unwrap();
        // "lunch" → Social, "study" → Learning, one hit each
        let result = classifier.classify(&event("Study lunch", 2));
        assert_eq!(result.primary_domain, Domain::new("Social"));
        assert!(result.ambiguous);
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = Classifier::new(&Config::default()).unwrap();
        let e = event("Coffee with client", 1);
        assert_eq!(classifier.classify(&e), classifier.classify(&e));
    }

    #[test]
    fn batch_stats_are_tallied() {
        let mut config = gym_only_config();
        config.classification.attendee_rules.clear();
        let classifier = Classifier::new(&config).unwrap();
        let events = vec![event("Gym", 0), event("Mystery", 0)];
        let (classified, stats) = classifier.classify_all(&events);
        assert_eq!(classified.len(), 2);
        assert_eq!(stats.classified, 2);
        assert_eq!(stats.unclassified, 1);
        assert_eq!(stats.by_domain[&Domain::new("Health")], 1);
    }
}
