//! # Attention Portfolio Core Library
//!
//! This library turns calendar history into time-allocation insight. It
//! follows a CLI-first philosophy: every operation is available through the
//! standalone `attention-cli` binary, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Normalizer**: raw provider records → deduplicated, recurrence-expanded,
//!   timezone-correct events
//! - **Classifier**: rule-based life-domain scoring with a confidence per domain
//! - **Aggregator**: per-period, per-domain allocation without double counting
//! - **Pattern Detector**: lagged correlations against well-being signals and
//!   between domains, including time-of-day slots
//! - **Insights**: peak hours, domain ratios, streaks and portfolio diversity
//! - **Recommendations**: ranked, explainable suggestions citing their patterns and insights
//!
//! ## Key Components
//!
//! - [`Pipeline`]: The five stages wired together
//! - [`Config`]: Analytics configuration management
//! - [`RunDiagnostics`]: What each run dropped, skipped or suppressed

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod events;
pub mod insights;
pub mod normalize;
pub mod patterns;
pub mod pipeline;
pub mod recommend;

pub use aggregate::{
    Allocation, AllocationBucket, AllocationSummary, DurationMs, Granularity, HourlyProfile, OverlapPolicy, Period,
    TimeSlot,
};
pub use classify::{ClassificationRule, ClassifiedEvent, Classifier};
pub use config::Config;
pub use diagnostics::{DiagnosticsSummary, InsufficientDataWarning, RunDiagnostics};
pub use domain::{Domain, Taxonomy};
pub use error::{ConfigError, CoreError, MalformedEventError, Result};
pub use events::{AnalysisWindow, CalendarEvent, RawEvent, WellbeingSignal};
pub use insights::{Insight, InsightAnalyzer, InsightKind};
pub use patterns::{CorrelationMethod, CorrelationTest, Direction, Pattern, Variable};
pub use pipeline::{AnalysisRun, ClassificationRun, Pipeline};
pub use recommend::{ActionKind, Recommendation};
