//! Recommendation Generator: patterns → ranked, explainable suggestions.
//!
//! Recommendations are rebuilt from scratch on every run. Each one cites the
//! ids of the patterns and structural insights behind it.

mod generator;

pub use generator::RecommendationGenerator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Domain;

/// What the recommendation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Increase,
    Maintain,
    Optimize,
    Decrease,
    Review,
    FindBalance,
    Rebalance,
    /// Keep a time-of-day slot or peak hour for the domain.
    Protect,
    /// Move the domain's time out of a slot.
    Reschedule,
    /// Start giving time to a domain that got none.
    AddDomain,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Increase => "increase",
            ActionKind::Maintain => "maintain",
            ActionKind::Optimize => "optimize",
            ActionKind::Decrease => "decrease",
            ActionKind::Review => "review",
            ActionKind::FindBalance => "find_balance",
            ActionKind::Rebalance => "rebalance",
            ActionKind::Protect => "protect",
            ActionKind::Reschedule => "reschedule",
            ActionKind::AddDomain => "add_domain",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    High,
    Medium,
    Low,
}

/// Expected effect, in share of scheduled time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatedImpact {
    pub level: ImpactLevel,
    /// Current share of scheduled time, percent
    pub current_share_pct: f64,
    /// Suggested share, percent, when the action implies one
    pub suggested_share_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    /// Domain the action is about.
    pub domain: Domain,
    pub kind: ActionKind,
    /// Human-readable suggestion.
    pub action: String,
    /// Ids of supporting patterns, then insights; never empty.
    pub rationale: Vec<String>,
    pub priority_score: f64,
    pub estimated_impact: EstimatedImpact,
    /// Most recent period end among the supporting evidence.
    pub last_evidence: Option<DateTime<Utc>>,
}
