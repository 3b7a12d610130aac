//! End-to-end analysis run.
//!
//! Data flows strictly forward: normalize → classify → aggregate → detect
//! and analyze → recommend. A [`Pipeline`] is built once from a validated [`Config`] and can
//! be shared across threads; each [`Pipeline::run`] is an independent,
//! synchronous batch.

use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregator, Allocation, AllocationSummary};
use crate::classify::{ClassifiedEvent, Classifier};
use crate::config::Config;
use crate::diagnostics::RunDiagnostics;
use crate::error::ConfigError;
use crate::events::{AnalysisWindow, RawEvent, WellbeingSignal};
use crate::insights::{Insight, InsightAnalyzer};
use crate::normalize::EventNormalizer;
use crate::patterns::{Pattern, PatternDetector};
use crate::recommend::{Recommendation, RecommendationGenerator};

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub window: AnalysisWindow,
    pub events: Vec<ClassifiedEvent>,
    pub allocation: Allocation,
    pub summary: AllocationSummary,
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
    pub diagnostics: RunDiagnostics,
}

/// Result of normalize + classify only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRun {
    pub window: AnalysisWindow,
    pub events: Vec<ClassifiedEvent>,
    pub diagnostics: RunDiagnostics,
}

/// The configured five-stage pipeline.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    normalizer: EventNormalizer,
    classifier: Classifier,
    aggregator: Aggregator,
    detector: PatternDetector,
    insights: InsightAnalyzer,
    generator: RecommendationGenerator,
}

impl Pipeline {
    /// Validate `config` and build every stage.
    ///
    /// # Errors
    ///
    /// Any configuration problem, before a single record is read.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            normalizer: EventNormalizer::new(config.tz()?),
            classifier: Classifier::new(&config)?,
            aggregator: Aggregator::new(&config)?,
            detector: PatternDetector::new(&config)?,
            insights: InsightAnalyzer::new(&config)?,
            generator: RecommendationGenerator::new(&config)?,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Normalize and classify without aggregating.
    pub fn classify(&self, raw: &[RawEvent], window: AnalysisWindow) -> ClassificationRun {
        let mut diagnostics = RunDiagnostics::default();
        let (events, normalization) = self.normalizer.normalize(raw, &window);
        diagnostics.normalization = normalization;
        let (events, classification) = self.classifier.classify_all(&events);
        diagnostics.classification = classification;
        ClassificationRun {
            window,
            events,
            diagnostics,
        }
    }

    /// Run all five stages. Never fails: bad records and thin data end up
    /// in the diagnostics.
    pub fn run(&self, raw: &[RawEvent], wellbeing: &[WellbeingSignal], window: AnalysisWindow) -> AnalysisRun {
        let _span = tracing::info_span!(
            "analysis_run",
            start = %window.start,
            end = %window.end,
            raw = raw.len(),
        )
        .entered();

        let ClassificationRun {
            events,
            mut diagnostics,
            ..
        } = self.classify(raw, window);

        let (allocation, aggregation) = self.aggregator.aggregate(&events, &window);
        diagnostics.aggregation = aggregation;
        let summary = allocation.summary();

        let (patterns, detection) = self.detector.detect(&allocation, wellbeing);
        diagnostics.detection = detection;

        let insights = self.insights.analyze(&allocation);

        let (recommendations, recommendation) = self.generator.generate(&patterns, &insights, &summary);
        diagnostics.recommendation = recommendation;

        let headline = diagnostics.summary();
        tracing::info!(
            events = events.len(),
            patterns = patterns.len(),
            insights = insights.len(),
            recommendations = recommendations.len(),
            dropped = headline.dropped,
            suppressed = headline.suppressed,
            "analysis run complete"
        );

        AnalysisRun {
            window,
            events,
            allocation,
            summary,
            patterns,
            insights,
            recommendations,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn pipeline_is_shareable() {
        assert_send_sync::<Pipeline>();
    }

    #[test]
    fn invalid_config_fails_before_processing() {
        let mut config = Config::default();
        config.patterns.lags.clear();
        let err = Pipeline::new(config).unwrap_err();
        assert_eq!(err, ConfigError::MissingKey("patterns.lags".into()));
    }

    #[test]
    fn empty_input_yields_empty_but_complete_run() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        let window = AnalysisWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let run = pipeline.run(&[], &[], window);
        assert!(run.events.is_empty());
        assert_eq!(run.allocation.coverage.len(), 7);
        assert_eq!(run.diagnostics.aggregation.periods_without_data.len(), 7);
        assert!(run.patterns.is_empty());
        assert!(run.insights.is_empty());
        assert!(run.recommendations.is_empty());
    }
}
