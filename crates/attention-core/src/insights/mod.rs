//! Structural insights: facts about the shape of an allocation that need no
//! well-being data.
//!
//! Peak hours, domain ratios, streaks and portfolio diversity are read
//! straight off the aggregated time. Like patterns, each [`Insight`] carries
//! a stable id, the number of periods behind it and a strength in `[0, 1]`,
//! so recommendations can cite and weigh it.

mod analyzer;

pub use analyzer::InsightAnalyzer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Domain;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightKind {
    /// Local clock hour holding most of a domain's time.
    PeakHour {
        hour: u32,
        /// Configured time slot containing the hour.
        slot: Option<String>,
    },
    /// A domain outgrows its counterweight.
    BalanceRatio {
        counterweight: Domain,
        /// `None` when the counterweight got no time at all.
        ratio: Option<f64>,
        max_ratio: f64,
    },
    /// Consecutive periods, up to the latest, with substantial time.
    Streak { periods: usize },
    /// Too few domains received any time.
    LowDiversity { active_domains: usize, total_domains: usize },
    /// A domain received no time in the window.
    MissingDomain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Derived from kind and domain; stable across runs.
    pub id: String,
    pub kind: InsightKind,
    /// Domain the insight is about; `None` for portfolio-wide ones.
    pub domain: Option<Domain>,
    pub description: String,
    /// Periods the insight rests on.
    pub support: usize,
    /// How pronounced the finding is, in `[0, 1]`.
    pub strength: f64,
    /// End of the latest period that contributed.
    pub last_observed: Option<DateTime<Utc>>,
}
