//! Pattern Detector: mines allocation series, optionally joined with
//! well-being signals, for statistically significant relationships.
//!
//! Findings are correlational only. Every [`Pattern`] states its method,
//! coefficient, p-value and the number of paired periods behind it.

mod detector;
mod series;
pub mod stats;

pub use detector::PatternDetector;
pub use stats::{CorrelationTest, Pearson, Spearman, TestOutcome};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::aggregate::TimeSlot;
use crate::domain::Domain;

/// Monotonic correlation test used for candidate pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

impl CorrelationMethod {
    pub fn test(self) -> Box<dyn CorrelationTest> {
        match self {
            CorrelationMethod::Pearson => Box::new(Pearson),
            CorrelationMethod::Spearman => Box::new(Spearman),
        }
    }
}

/// Statistic a pattern's confidence comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    Pearson,
    Spearman,
    /// One-way ANOVA over low/mid/high tertiles; coefficient is eta.
    TertileAnova,
}

/// A series that can take part in a pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Variable {
    /// Hours attributed to a domain per period.
    Allocation { domain: Domain },
    /// Hours attributed to a domain within a time-of-day slot per period.
    Slot { domain: Domain, slot: TimeSlot },
    /// Mean self-reported value per period.
    Wellbeing { metric: String },
}

impl Variable {
    pub fn domain(&self) -> Option<&Domain> {
        match self {
            Variable::Allocation { domain } | Variable::Slot { domain, .. } => Some(domain),
            Variable::Wellbeing { .. } => None,
        }
    }

    pub fn is_wellbeing(&self) -> bool {
        matches!(self, Variable::Wellbeing { .. })
    }

    /// Short form for prose.
    pub fn label(&self) -> String {
        match self {
            Variable::Allocation { domain } => format!("time on {domain}"),
            Variable::Slot { domain, slot } => format!("time on {domain} in the {slot}"),
            Variable::Wellbeing { metric } => metric.clone(),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Allocation { domain } => write!(f, "allocation:{domain}"),
            Variable::Slot { domain, slot } => write!(f, "slot:{domain}@{}", slot.name),
            Variable::Wellbeing { metric } => write!(f, "wellbeing:{metric}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Positive,
    Negative,
    NonMonotonic,
}

impl Direction {
    /// Positive and negative contradict each other; a non-monotonic finding
    /// contradicts neither.
    pub fn contradicts(self, other: Direction) -> bool {
        matches!(
            (self, other),
            (Direction::Positive, Direction::Negative) | (Direction::Negative, Direction::Positive)
        )
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Positive => "positive",
            Direction::Negative => "negative",
            Direction::NonMonotonic => "non_monotonic",
        })
    }
}

/// Statistical backing of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    /// r, rho or eta depending on `method`
    pub coefficient: f64,
    pub p_value: f64,
    pub method: TestMethod,
}

/// A relationship that passed support, significance and strength checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Derived from variables and lag; stable across runs.
    pub id: String,
    pub description: String,
    /// Paired periods the test ran on.
    pub support: usize,
    pub confidence: Confidence,
    /// `[source, target]`; the source is always an allocation or slot series.
    pub variables: [Variable; 2],
    /// Source period offset relative to the target period.
    pub lag: i32,
    pub direction: Direction,
    /// End of the latest paired period.
    pub last_observed: Option<DateTime<Utc>>,
}

impl Pattern {
    pub fn source(&self) -> &Variable {
        &self.variables[0]
    }

    pub fn target(&self) -> &Variable {
        &self.variables[1]
    }

    pub fn strength(&self) -> f64 {
        self.confidence.coefficient.abs()
    }

    pub(crate) fn make_id(source: &Variable, target: &Variable, lag: i32) -> String {
        format!("{source}~{target}@lag{lag}")
    }
}
