use chrono_tz::Tz;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::series::{allocation_series, pair, slot_series, wellbeing_series, Paired, Series};
use super::stats::{tertile_anova, CorrelationTest};
use super::{Confidence, CorrelationMethod, Direction, Pattern, TestMethod, Variable};
use crate::aggregate::{Allocation, Period};
use crate::config::{Config, PatternConfig};
use crate::diagnostics::{DetectionStats, InsufficientDataWarning, InsufficientReason};
use crate::domain::Taxonomy;
use crate::error::ConfigError;
use crate::events::WellbeingSignal;

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

fn lag_phrase(lag: i32) -> String {
    match lag {
        0 => "in the same period".to_string(),
        -1 => "in the previous period".to_string(),
        1 => "in the following period".to_string(),
        l if l < 0 => format!("{} periods earlier", -l),
        l => format!("{l} periods later"),
    }
}

fn describe(source: &Variable, target: &Variable, lag: i32, direction: Direction, peaks: bool) -> String {
    let when = lag_phrase(lag);
    match (direction, target) {
        (Direction::Positive, Variable::Wellbeing { metric }) => {
            format!("More {} {when} goes with higher {metric}", source.label())
        }
        (Direction::Negative, Variable::Wellbeing { metric }) => {
            format!("More {} {when} goes with lower {metric}", source.label())
        }
        (Direction::Positive, Variable::Allocation { .. } | Variable::Slot { .. }) => {
            format!("More {} {when} goes with more {}", source.label(), target.label())
        }
        (Direction::Negative, Variable::Allocation { .. } | Variable::Slot { .. }) => {
            format!("More {} {when} goes with less {}", source.label(), target.label())
        }
        (Direction::NonMonotonic, _) => {
            let shape = if peaks { "peaks" } else { "dips" };
            format!(
                "{} {shape} at a moderate amount of {} {when}",
                capitalize(&target.label()),
                source.label()
            )
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Mines allocation series for significant relationships.
pub struct PatternDetector {
    taxonomy: Taxonomy,
    tz: Tz,
    settings: PatternConfig,
    test: Box<dyn CorrelationTest>,
}

impl std::fmt::Debug for PatternDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternDetector")
            .field("method", &self.test.method())
            .field("settings", &self.settings)
            .finish()
    }
}

impl PatternDetector {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            taxonomy: config.taxonomy()?,
            tz: config.tz()?,
            settings: config.patterns.clone(),
            test: config.patterns.method.test(),
        })
    }

    /// Swap the monotonic test, e.g. for a stricter implementation.
    pub fn with_test(mut self, test: Box<dyn CorrelationTest>) -> Self {
        self.test = test;
        self
    }

    pub fn method(&self) -> CorrelationMethod {
        self.settings.method
    }

    /// Allocation series against well-being, then time-of-day slot series
    /// against well-being, then allocation series against each other.
    fn candidates(&self, allocation: &Allocation, wellbeing: &[Series]) -> Vec<(Series, Series)> {
        let zero_fill = self.settings.zero_fill;
        let domains: Vec<_> = self
            .taxonomy
            .domains()
            .iter()
            .filter(|d| self.settings.include_unclassified || !d.is_unclassified())
            .collect();
        let sources: Vec<Series> = domains
            .iter()
            .map(|d| allocation_series(allocation, d, zero_fill))
            .collect();

        let mut out = Vec::new();
        for source in &sources {
            for target in wellbeing {
                out.push((source.clone(), target.clone()));
            }
        }
        if !wellbeing.is_empty() {
            for (domain, whole) in domains.iter().zip(&sources) {
                for slot in &self.settings.time_slots {
                    let part = slot_series(allocation, domain, slot, zero_fill);
                    // All of the domain's time falls in this slot.
                    if part.values == whole.values {
                        continue;
                    }
                    for target in wellbeing {
                        out.push((part.clone(), target.clone()));
                    }
                }
            }
        }
        if self.settings.cross_domain {
            for (i, source) in sources.iter().enumerate() {
                for target in &sources[i + 1..] {
                    out.push((source.clone(), target.clone()));
                }
            }
        }
        out
    }

    /// Test one pair at one lag.
    fn evaluate(
        &self,
        source: &Series,
        target: &Series,
        lag: i32,
        periods: &[Period],
        stats: &mut DetectionStats,
    ) -> Option<Pattern> {
        stats.candidates += 1;
        let paired: Paired = pair(source, target, lag);
        let variables = vec![source.variable.clone(), target.variable.clone()];
        let warn = |reason| InsufficientDataWarning {
            variables: variables.clone(),
            lag,
            support: paired.support(),
            required: self.settings.min_support,
            reason,
        };

        if paired.support() < self.settings.min_support {
            stats.insufficient_data.push(warn(InsufficientReason::BelowMinSupport));
            return None;
        }
        if is_constant(&paired.source) || is_constant(&paired.target) {
            stats.insufficient_data.push(warn(InsufficientReason::ConstantSeries));
            return None;
        }

        let alpha = self.settings.significance_level;
        let min_strength = self.settings.min_abs_correlation;

        let found = match self.test.test(&paired.source, &paired.target) {
            Some(outcome) if outcome.p_value <= alpha && outcome.coefficient.abs() >= min_strength => {
                let direction = if outcome.coefficient > 0.0 {
                    Direction::Positive
                } else {
                    Direction::Negative
                };
                Some((
                    direction,
                    Confidence {
                        coefficient: outcome.coefficient,
                        p_value: outcome.p_value,
                        method: self.test.method(),
                    },
                    false,
                ))
            }
            _ if self.settings.detect_non_monotonic => tertile_anova(&paired.source, &paired.target)
                .filter(|c| c.middle_is_extreme() && c.p_value <= alpha && c.eta >= min_strength)
                .map(|c| {
                    (
                        Direction::NonMonotonic,
                        Confidence {
                            coefficient: c.eta,
                            p_value: c.p_value,
                            method: TestMethod::TertileAnova,
                        },
                        c.peaks_in_middle(),
                    )
                }),
            _ => None,
        };

        let Some((direction, confidence, peaks)) = found else {
            stats.rejected += 1;
            return None;
        };
        let (s, t) = (&source.variable, &target.variable);
        Some(Pattern {
            id: Pattern::make_id(s, t, lag),
            description: describe(s, t, lag, direction, peaks),
            support: paired.support(),
            confidence,
            variables: [s.clone(), t.clone()],
            lag,
            direction,
            last_observed: paired.last_index.and_then(|i| periods.get(i)).map(|p| p.end),
        })
    }

    /// Detect patterns in `allocation`, joined with `wellbeing` by date.
    ///
    /// Lag variants of one variable pair collapse to the strongest; see
    /// [`collapse_lags`].
    pub fn detect(&self, allocation: &Allocation, wellbeing: &[WellbeingSignal]) -> (Vec<Pattern>, DetectionStats) {
        let mut stats = DetectionStats::default();
        let periods: Vec<Period> = allocation.periods().copied().collect();
        let wellbeing = wellbeing_series(&periods, wellbeing, self.tz);

        let mut by_pair: BTreeMap<(Variable, Variable), Vec<Pattern>> = BTreeMap::new();
        for (source, target) in self.candidates(allocation, &wellbeing) {
            for &lag in &self.settings.lags {
                if let Some(pattern) = self.evaluate(&source, &target, lag, &periods, &mut stats) {
                    by_pair
                        .entry((source.variable.clone(), target.variable.clone()))
                        .or_default()
                        .push(pattern);
                }
            }
        }

        let mut patterns: Vec<Pattern> = by_pair
            .into_values()
            .flat_map(|variants| collapse_lags(variants, self.settings.contradiction_margin, &mut stats))
            .collect();
        patterns.sort_by(|a, b| {
            b.strength()
                .total_cmp(&a.strength())
                .then_with(|| a.id.cmp(&b.id))
        });

        tracing::info!(
            candidates = stats.candidates,
            patterns = patterns.len(),
            rejected = stats.rejected,
            deduplicated = stats.deduplicated,
            insufficient = stats.insufficient_data.len(),
            "pattern detection finished"
        );
        (patterns, stats)
    }
}

/// Strength, then p-value, then the lag closest to zero.
fn compare_strength(a: &Pattern, b: &Pattern) -> Ordering {
    a.strength()
        .total_cmp(&b.strength())
        .then_with(|| b.confidence.p_value.total_cmp(&a.confidence.p_value))
        .then_with(|| b.lag.abs().cmp(&a.lag.abs()))
        .then_with(|| b.lag.cmp(&a.lag))
}

/// Reduce the lag variants of one variable pair to the strongest one.
///
/// An opposite-sign variant stays next to it only when its strength is
/// within `margin`; the recommendation stage then sees the contradiction
/// and withholds both. Everything else counts as deduplicated.
fn collapse_lags(mut variants: Vec<Pattern>, margin: f64, stats: &mut DetectionStats) -> Vec<Pattern> {
    variants.sort_by(|a, b| compare_strength(b, a));
    let mut variants = variants.into_iter();
    let Some(best) = variants.next() else {
        return Vec::new();
    };
    let mut kept = vec![best];
    for other in variants {
        let rival = kept.len() == 1
            && kept[0].direction.contradicts(other.direction)
            && kept[0].strength() - other.strength() <= margin;
        if rival {
            kept.push(other);
        } else {
            stats.deduplicated += 1;
        }
    }
    kept
}
