use std::collections::{BTreeMap, BTreeSet};

use super::{ActionKind, EstimatedImpact, ImpactLevel, Recommendation};
use crate::aggregate::{AllocationSummary, TimeSlot};
use crate::config::Config;
use crate::diagnostics::{RecommendationStats, SuppressionRecord};
use crate::domain::{Domain, Taxonomy};
use crate::error::ConfigError;
use crate::insights::{Insight, InsightKind};
use crate::patterns::{Direction, Pattern, Variable};

/// Evidence backing one recommendation.
struct Group<'a> {
    kind: GroupKind,
    domain: Domain,
    patterns: Vec<&'a Pattern>,
    insights: Vec<&'a Insight>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKind {
    /// Source domain vs well-being metrics.
    Wellbeing(Direction),
    FindBalance,
    /// Source domain crowds out the target domain.
    Rebalance { target: Domain },
    /// Time-of-day slot of the domain vs well-being metrics.
    Slot { slot: TimeSlot, direction: Direction },
    PeakHour { hour: u32 },
    AddDomain,
}

#[derive(Default)]
struct Evidence<'a> {
    patterns: Vec<&'a Pattern>,
    insights: Vec<&'a Insight>,
}

fn join_labels<'a>(labels: impl Iterator<Item = &'a str>) -> String {
    let labels: BTreeSet<&str> = labels.collect();
    labels.into_iter().collect::<Vec<_>>().join(", ")
}

fn metrics_of(patterns: &[&Pattern]) -> String {
    join_labels(patterns.iter().filter_map(|p| match p.target() {
        Variable::Wellbeing { metric } => Some(metric.as_str()),
        Variable::Allocation { .. } | Variable::Slot { .. } => None,
    }))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Turns patterns and insights into ranked recommendations.
#[derive(Debug, Clone)]
pub struct RecommendationGenerator {
    taxonomy: Taxonomy,
    min_support: usize,
    max_recommendations: usize,
    default_importance: f64,
    importance: BTreeMap<Domain, f64>,
}

impl RecommendationGenerator {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let taxonomy = config.taxonomy()?;
        let mut importance = BTreeMap::new();
        for (label, weight) in &config.recommendations.domain_importance {
            let domain = taxonomy
                .resolve(label)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownDomain {
                    key: format!("recommendations.domain_importance.{label}"),
                    domain: label.clone(),
                })?;
            importance.insert(domain, *weight);
        }
        Ok(Self {
            taxonomy,
            min_support: config.patterns.min_support,
            max_recommendations: config.recommendations.max_recommendations,
            default_importance: config.recommendations.default_importance,
            importance,
        })
    }

    pub fn importance(&self, domain: &Domain) -> f64 {
        self.importance
            .get(domain)
            .copied()
            .unwrap_or(self.default_importance)
    }

    /// Drop every signed pattern on a variable pair that has both a positive
    /// and a negative finding.
    fn suppress_contradictions<'a>(
        &self,
        patterns: Vec<&'a Pattern>,
        stats: &mut RecommendationStats,
    ) -> Vec<&'a Pattern> {
        let mut by_pair: BTreeMap<(&Variable, &Variable), Vec<&Pattern>> = BTreeMap::new();
        for &p in &patterns {
            by_pair.entry((p.source(), p.target())).or_default().push(p);
        }

        let mut suppressed: BTreeSet<&str> = BTreeSet::new();
        for ((source, target), group) in &by_pair {
            let contradicted = group
                .iter()
                .any(|a| group.iter().any(|b| a.direction.contradicts(b.direction)));
            if !contradicted {
                continue;
            }
            let signed: Vec<&&Pattern> = group
                .iter()
                .filter(|p| p.direction != Direction::NonMonotonic)
                .collect();
            tracing::info!(
                source = %source,
                target = %target,
                patterns = signed.len(),
                "suppressing contradictory patterns"
            );
            suppressed.extend(signed.iter().map(|p| p.id.as_str()));
            stats.suppressed.push(SuppressionRecord {
                variables: vec![(*source).clone(), (*target).clone()],
                pattern_ids: signed.iter().map(|p| p.id.clone()).collect(),
                directions: signed.iter().map(|p| p.direction).collect(),
            });
        }

        patterns
            .into_iter()
            .filter(|p| !suppressed.contains(p.id.as_str()))
            .collect()
    }

    fn pattern_kind(p: &Pattern) -> Option<GroupKind> {
        let kind = match (p.source(), p.direction, p.target()) {
            (_, Direction::NonMonotonic, _) => GroupKind::FindBalance,
            (Variable::Slot { slot, .. }, direction, _) => GroupKind::Slot {
                slot: slot.clone(),
                direction,
            },
            (_, direction, Variable::Wellbeing { .. }) => GroupKind::Wellbeing(direction),
            (
                _,
                Direction::Negative,
                Variable::Allocation { domain: target } | Variable::Slot { domain: target, .. },
            ) => GroupKind::Rebalance {
                target: target.clone(),
            },
            (_, Direction::Positive, _) => return None,
        };
        Some(kind)
    }

    /// The one missing domain worth adding: highest importance, then
    /// taxonomy order.
    fn pick_missing<'a>(&self, missing: &[(&'a Insight, Domain)]) -> Option<(&'a Insight, Domain)> {
        missing
            .iter()
            .min_by(|(_, a), (_, b)| {
                self.importance(b)
                    .total_cmp(&self.importance(a))
                    .then_with(|| self.taxonomy.compare(a, b))
            })
            .cloned()
    }

    fn group<'a>(
        &self,
        patterns: &[&'a Pattern],
        insights: &[&'a Insight],
        stats: &mut RecommendationStats,
    ) -> Vec<Group<'a>> {
        let mut groups: BTreeMap<(Domain, GroupKind), Evidence<'a>> = BTreeMap::new();
        for &p in patterns {
            let (Some(domain), Some(kind)) = (p.source().domain(), Self::pattern_kind(p)) else {
                stats.no_action += 1;
                continue;
            };
            groups.entry((domain.clone(), kind)).or_default().patterns.push(p);
        }

        let mut missing = Vec::new();
        let mut diversity = None;
        for &insight in insights {
            let kind = match (&insight.kind, &insight.domain) {
                (InsightKind::PeakHour { hour, .. }, Some(domain)) => {
                    Some((domain.clone(), GroupKind::PeakHour { hour: *hour }))
                }
                (InsightKind::BalanceRatio { counterweight, .. }, Some(domain)) => Some((
                    domain.clone(),
                    GroupKind::Rebalance {
                        target: counterweight.clone(),
                    },
                )),
                (InsightKind::MissingDomain, Some(domain)) => {
                    missing.push((insight, domain.clone()));
                    None
                }
                (InsightKind::LowDiversity { .. }, _) => {
                    diversity = Some(insight);
                    None
                }
                _ => {
                    stats.no_action += 1;
                    None
                }
            };
            if let Some(key) = kind {
                groups.entry(key).or_default().insights.push(insight);
            }
        }

        match self.pick_missing(&missing) {
            Some((insight, domain)) => {
                stats.no_action += missing.len() - 1;
                let evidence = groups.entry((domain, GroupKind::AddDomain)).or_default();
                evidence.insights.push(insight);
                evidence.insights.extend(diversity);
            }
            None => stats.no_action += usize::from(diversity.is_some()),
        }

        // A domain that helps one metric and hurts another keeps only its
        // positive recommendation.
        let helpful: BTreeSet<Domain> = groups
            .keys()
            .filter(|(_, kind)| *kind == GroupKind::Wellbeing(Direction::Positive))
            .map(|(domain, _)| domain.clone())
            .collect();

        groups
            .into_iter()
            .filter_map(|((domain, kind), evidence)| {
                if kind == GroupKind::Wellbeing(Direction::Negative) && helpful.contains(&domain) {
                    stats.conflicting += evidence.patterns.len();
                    return None;
                }
                Some(Group {
                    kind,
                    domain,
                    patterns: evidence.patterns,
                    insights: evidence.insights,
                })
            })
            .collect()
    }

    /// Action for a group, or `None` when the evidence calls for nothing.
    fn action(&self, group: &Group<'_>, summary: &AllocationSummary) -> Option<(ActionKind, String, EstimatedImpact)> {
        let domain = &group.domain;
        let current = summary.share(domain) * 100.0;
        let metrics = metrics_of(&group.patterns);
        let impact = |level, suggested: Option<f64>| EstimatedImpact {
            level,
            current_share_pct: round1(current),
            suggested_share_pct: suggested.map(round1),
        };

        let out = match &group.kind {
            GroupKind::Wellbeing(Direction::Positive) if current < 10.0 => {
                let suggested = (current * 1.5).min(current + 15.0).max(current + 1.0);
                let level = if current < 5.0 {
                    ImpactLevel::High
                } else {
                    ImpactLevel::Medium
                };
                (
                    ActionKind::Increase,
                    format!(
                        "Increase time on {domain} from {current:.1}% to about {suggested:.1}% of scheduled time; it goes with higher {metrics}"
                    ),
                    impact(level, Some(suggested)),
                )
            }
            GroupKind::Wellbeing(Direction::Positive) if current < 25.0 => (
                ActionKind::Maintain,
                format!("Keep time on {domain} near {current:.1}%; it goes with higher {metrics}"),
                impact(ImpactLevel::Medium, Some(current)),
            ),
            GroupKind::Wellbeing(Direction::Positive) => (
                ActionKind::Optimize,
                format!(
                    "{domain} already takes {current:.1}% of scheduled time; focus on the quality of that time for {metrics}"
                ),
                impact(ImpactLevel::Low, Some(current)),
            ),
            GroupKind::Wellbeing(Direction::Negative) if current > 20.0 => {
                let suggested = (current * 0.7).max(current - 15.0);
                let level = if current > 30.0 {
                    ImpactLevel::High
                } else {
                    ImpactLevel::Medium
                };
                (
                    ActionKind::Decrease,
                    format!(
                        "Reduce time on {domain} from {current:.1}% to about {suggested:.1}% of scheduled time; it goes with lower {metrics}"
                    ),
                    impact(level, Some(suggested)),
                )
            }
            GroupKind::Wellbeing(Direction::Negative) if current > 5.0 => (
                ActionKind::Review,
                format!("Review time on {domain} ({current:.1}% of scheduled time); it may weigh on {metrics}"),
                impact(ImpactLevel::Medium, Some(current * 0.9)),
            ),
            GroupKind::Wellbeing(_) => return None,
            GroupKind::FindBalance => {
                let targets = join_labels(group.patterns.iter().map(|p| match p.target() {
                    Variable::Wellbeing { metric } => metric.as_str(),
                    Variable::Allocation { domain } | Variable::Slot { domain, .. } => domain.as_str(),
                }));
                (
                    ActionKind::FindBalance,
                    format!("Look for a middle ground on time on {domain}; {targets} respond non-linearly to it"),
                    impact(ImpactLevel::Medium, None),
                )
            }
            GroupKind::Rebalance { target } => {
                let level = if current > 30.0 {
                    ImpactLevel::High
                } else {
                    ImpactLevel::Medium
                };
                let action = if group.patterns.is_empty() {
                    format!("Schedule more {target} alongside {domain}; {domain} has outgrown it")
                } else {
                    format!("Protect time for {target} in periods when {domain} grows; the two trade off against each other")
                };
                (ActionKind::Rebalance, action, impact(level, None))
            }
            GroupKind::Slot {
                slot,
                direction: Direction::Positive,
            } => (
                ActionKind::Protect,
                format!("Protect time on {domain} in the {slot}; it goes with higher {metrics}"),
                impact(ImpactLevel::Medium, None),
            ),
            GroupKind::Slot { slot, .. } => (
                ActionKind::Reschedule,
                format!("Move time on {domain} out of the {slot}; it goes with lower {metrics}"),
                impact(ImpactLevel::Medium, None),
            ),
            GroupKind::PeakHour { hour } => (
                ActionKind::Protect,
                format!(
                    "Protect {hour:02}:00-{:02}:00 for your most important {domain} work; it is when {domain} time peaks",
                    hour + 1
                ),
                impact(ImpactLevel::Low, None),
            ),
            GroupKind::AddDomain => {
                let narrow = group.insights.iter().find_map(|i| match i.kind {
                    InsightKind::LowDiversity {
                        active_domains,
                        total_domains,
                    } => Some((active_domains, total_domains)),
                    _ => None,
                });
                match narrow {
                    Some((active, total)) => (
                        ActionKind::AddDomain,
                        format!(
                            "Add at least one {domain} activity to your schedule; only {active} of {total} domains get any time"
                        ),
                        impact(ImpactLevel::Medium, None),
                    ),
                    None => (
                        ActionKind::AddDomain,
                        format!("Add at least one {domain} activity to your schedule"),
                        impact(ImpactLevel::Low, None),
                    ),
                }
            }
        };
        Some(out)
    }

    fn id_for(kind: ActionKind, group: &Group<'_>) -> String {
        let domain = &group.domain;
        match &group.kind {
            GroupKind::Rebalance { target } => format!("{kind}:{domain}~{target}"),
            GroupKind::Slot { slot, .. } => format!("{kind}:{domain}@{}", slot.name),
            GroupKind::PeakHour { hour } => format!("{kind}:{domain}@{hour:02}h"),
            _ => format!("{kind}:{domain}"),
        }
    }

    /// Build the ranked recommendation list.
    ///
    /// Patterns and insights below `min_support` are ignored; contradicting
    /// patterns are withheld.
    pub fn generate(
        &self,
        patterns: &[Pattern],
        insights: &[Insight],
        summary: &AllocationSummary,
    ) -> (Vec<Recommendation>, RecommendationStats) {
        let mut stats = RecommendationStats::default();

        let supported: Vec<&Pattern> = patterns
            .iter()
            .filter(|p| {
                let ok = p.support >= self.min_support;
                if !ok {
                    stats.below_support += 1;
                }
                ok
            })
            .collect();
        let kept = self.suppress_contradictions(supported, &mut stats);
        let insights: Vec<&Insight> = insights
            .iter()
            .filter(|i| {
                let ok = i.support >= self.min_support;
                if !ok {
                    stats.below_support += 1;
                }
                ok
            })
            .collect();

        let mut recommendations = Vec::new();
        for group in self.group(&kept, &insights, &mut stats) {
            let Some((kind, action, estimated_impact)) = self.action(&group, summary) else {
                stats.no_action += group.patterns.len() + group.insights.len();
                continue;
            };
            let weighted_domain = match &group.kind {
                GroupKind::Rebalance { target } => target,
                _ => &group.domain,
            };
            let importance = self.importance(weighted_domain);
            let priority_score = group
                .patterns
                .iter()
                .map(|p| p.strength() * p.support as f64)
                .chain(group.insights.iter().map(|i| i.strength * i.support as f64))
                .sum::<f64>()
                * importance;
            let rationale = group
                .patterns
                .iter()
                .map(|p| p.id.clone())
                .chain(group.insights.iter().map(|i| i.id.clone()))
                .collect();
            let last_evidence = group
                .patterns
                .iter()
                .filter_map(|p| p.last_observed)
                .chain(group.insights.iter().filter_map(|i| i.last_observed))
                .max();
            recommendations.push(Recommendation {
                id: Self::id_for(kind, &group),
                domain: group.domain.clone(),
                kind,
                action,
                rationale,
                priority_score,
                estimated_impact,
                last_evidence,
            });
        }

        recommendations.sort_by(|a, b| {
            b.priority_score
                .total_cmp(&a.priority_score)
                .then_with(|| b.last_evidence.cmp(&a.last_evidence))
                .then_with(|| self.taxonomy.compare(&a.domain, &b.domain))
                .then_with(|| a.id.cmp(&b.id))
        });
        if recommendations.len() > self.max_recommendations {
            stats.truncated = recommendations.len() - self.max_recommendations;
            recommendations.truncate(self.max_recommendations);
        }

        tracing::info!(
            recommendations = recommendations.len(),
            suppressed = stats.suppressed.len(),
            "generated recommendations"
        );
        (recommendations, stats)
    }
}
