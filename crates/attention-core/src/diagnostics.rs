//! Per-run diagnostics.
//!
//! Every stage reports what it dropped, skipped or flagged here instead of
//! failing the run. A [`RunDiagnostics`] travels with every analysis result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::Period;
use crate::domain::Domain;
use crate::error::CoreError;
use crate::patterns::{Direction, Variable};

/// A raw record the normalizer refused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DroppedEvent {
    /// Source id, or the content-derived id for records without one
    pub id: String,
    /// Human-readable cause
    pub reason: String,
}

/// Event Normalizer tallies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizationStats {
    /// Records received
    pub raw_records: usize,
    /// Events emitted
    pub normalized: usize,
    /// Records collapsed into an earlier one
    pub duplicates: usize,
    /// Cancelled records and cancelled occurrences
    pub cancelled: usize,
    /// Events that do not intersect the analysis window
    pub out_of_window: usize,
    /// Instances generated from recurring series
    pub occurrences_expanded: usize,
    /// Series cut off at the per-series occurrence cap
    #[serde(default)]
    pub truncated_series: usize,
    /// Malformed records, dropped
    pub malformed: Vec<DroppedEvent>,
}

/// Domain Classifier tallies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationStats {
    pub classified: usize,
    /// Events whose runner-up domain scored within the ambiguity margin
    pub ambiguous: usize,
    pub unclassified: usize,
    /// Events per primary domain
    pub by_domain: BTreeMap<Domain, usize>,
}

/// Allocation Aggregator tallies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregationStats {
    pub periods: usize,
    /// Periods with no event at all
    pub periods_without_data: Vec<Period>,
    /// All-day events left out of allocation
    pub all_day_excluded: usize,
}

/// Why a candidate relationship could not be tested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientReason {
    /// Fewer paired observations than `min_support`
    BelowMinSupport,
    /// One side never varies
    ConstantSeries,
}

/// A non-finding: the data could not support a test for this pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsufficientDataWarning {
    pub variables: Vec<Variable>,
    pub lag: i32,
    /// Paired observations available
    pub support: usize,
    /// Observations required
    pub required: usize,
    pub reason: InsufficientReason,
}

/// Pattern Detector tallies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectionStats {
    /// Candidate (pair, lag) combinations examined
    pub candidates: usize,
    /// Candidates tested but not significant or too weak
    pub rejected: usize,
    /// Lag variants removed in favour of a stronger one
    pub deduplicated: usize,
    pub insufficient_data: Vec<InsufficientDataWarning>,
}

/// Patterns withheld from recommendations because they contradict each other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuppressionRecord {
    pub variables: Vec<Variable>,
    pub pattern_ids: Vec<String>,
    pub directions: Vec<Direction>,
}

/// Recommendation Generator tallies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationStats {
    pub suppressed: Vec<SuppressionRecord>,
    /// Patterns ignored for having support below the minimum
    pub below_support: usize,
    /// Patterns that mapped to no action
    pub no_action: usize,
    /// Negative well-being findings dropped because the same domain also
    /// has a positive one
    pub conflicting: usize,
    /// Recommendations cut by `max_recommendations`
    pub truncated: usize,
}

/// Everything a run had to say about its input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunDiagnostics {
    pub normalization: NormalizationStats,
    pub classification: ClassificationStats,
    pub aggregation: AggregationStats,
    pub detection: DetectionStats,
    pub recommendation: RecommendationStats,
}

/// Headline counts of a [`RunDiagnostics`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticsSummary {
    pub dropped: usize,
    pub duplicates: usize,
    pub cancelled: usize,
    pub ambiguous: usize,
    pub unclassified: usize,
    pub periods_without_data: usize,
    pub insufficient_data: usize,
    pub suppressed: usize,
}

impl RunDiagnostics {
    pub fn summary(&self) -> DiagnosticsSummary {
        DiagnosticsSummary {
            dropped: self.normalization.malformed.len(),
            duplicates: self.normalization.duplicates,
            cancelled: self.normalization.cancelled,
            ambiguous: self.classification.ambiguous,
            unclassified: self.classification.unclassified,
            periods_without_data: self.aggregation.periods_without_data.len(),
            insufficient_data: self.detection.insufficient_data.len(),
            suppressed: self
                .recommendation
                .suppressed
                .iter()
                .map(|s| s.pattern_ids.len())
                .sum(),
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_each_stage() {
        let diagnostics = RunDiagnostics {
            normalization: NormalizationStats {
                duplicates: 2,
                cancelled: 1,
                malformed: vec![DroppedEvent {
                    id: "e1".into(),
                    reason: "event has no end time".into(),
                }],
                ..NormalizationStats::default()
            },
            classification: ClassificationStats {
                ambiguous: 3,
                unclassified: 4,
                ..ClassificationStats::default()
            },
            recommendation: RecommendationStats {
                suppressed: vec![SuppressionRecord {
                    variables: vec![],
                    pattern_ids: vec!["a".into(), "b".into()],
                    directions: vec![Direction::Positive, Direction::Negative],
                }],
                ..RecommendationStats::default()
            },
            ..RunDiagnostics::default()
        };

        let summary = diagnostics.summary();
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.ambiguous, 3);
        assert_eq!(summary.unclassified, 4);
        assert_eq!(summary.suppressed, 2);
    }

    #[test]
    fn insufficient_reason_serializes_snake_case() {
        let json = serde_json::to_string(&InsufficientReason::BelowMinSupport).unwrap();
        assert_eq!(json, "\"below_min_support\"");
    }

    #[test]
    fn diagnostics_to_json() {
        let json = RunDiagnostics::default().to_json().unwrap();
        assert!(json.contains("\"normalization\""));
        assert!(json.contains("\"malformed\": []"));
    }
}
