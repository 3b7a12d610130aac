//! Domain Classifier: assigns each event to life domains with a confidence.

mod classifier;
mod rule;

pub use classifier::Classifier;
pub use rule::ClassificationRule;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::Domain;
use crate::events::CalendarEvent;

/// An event with its domain evidence.
///
/// Scores are in `[0, 1]`; the primary domain always holds the maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub event: CalendarEvent,
    pub domain_scores: BTreeMap<Domain, f64>,
    pub primary_domain: Domain,
    /// Runner-up scored within the ambiguity margin of the primary.
    pub ambiguous: bool,
}

impl ClassifiedEvent {
    /// Score for `domain`, 0 when it received no evidence.
    pub fn score(&self, domain: &Domain) -> f64 {
        self.domain_scores.get(domain).copied().unwrap_or(0.0)
    }
}
