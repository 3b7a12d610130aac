use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{Insight, InsightKind};
use crate::aggregate::{Allocation, DurationMs, TimeSlot};
use crate::config::Config;
use crate::domain::{Domain, Taxonomy};
use crate::error::ConfigError;

/// Weight of a missing-domain insight; absence has no degree.
const MISSING_DOMAIN_STRENGTH: f64 = 0.5;

#[derive(Debug, Clone)]
struct BalanceRule {
    domain: Domain,
    counterweight: Domain,
    max_ratio: f64,
}

fn resolve(taxonomy: &Taxonomy, key: &str, label: &str) -> Result<Domain, ConfigError> {
    taxonomy
        .resolve(label)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownDomain {
            key: key.to_string(),
            domain: label.to_string(),
        })
}

/// Reads structural insights off an [`Allocation`].
#[derive(Debug, Clone)]
pub struct InsightAnalyzer {
    taxonomy: Taxonomy,
    peak_domains: Vec<Domain>,
    balance: Vec<BalanceRule>,
    slots: Vec<TimeSlot>,
    streak_min_ms: i64,
    streak_min_periods: usize,
    min_active_domains: usize,
}

impl InsightAnalyzer {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let taxonomy = config.taxonomy()?;
        let settings = &config.insights;
        let peak_domains: Vec<Domain> = settings
            .peak_hour_domains
            .iter()
            .map(|label| resolve(&taxonomy, "insights.peak_hour_domains", label))
            .collect::<Result<_, _>>()?;
        let balance: Vec<BalanceRule> = settings
            .balance_rules
            .iter()
            .map(|rule| {
                Ok(BalanceRule {
                    domain: resolve(&taxonomy, "insights.balance_rules", &rule.domain)?,
                    counterweight: resolve(&taxonomy, "insights.balance_rules", &rule.counterweight)?,
                    max_ratio: rule.max_ratio,
                })
            })
            .collect::<Result<_, ConfigError>>()?;
        Ok(Self {
            peak_domains,
            balance,
            slots: config.patterns.time_slots.clone(),
            streak_min_ms: (settings.streak_min_hours * 3_600_000.0).round() as i64,
            streak_min_periods: settings.streak_min_periods,
            min_active_domains: settings.min_active_domains,
            taxonomy,
        })
    }

    /// Every insight the allocation supports, in a fixed order: peak hours,
    /// balance ratios, streaks, then diversity and missing domains.
    ///
    /// An allocation without a single scheduled period yields nothing.
    pub fn analyze(&self, allocation: &Allocation) -> Vec<Insight> {
        let active: Vec<_> = allocation.coverage.iter().filter(|c| c.has_data).collect();
        let Some(latest) = active.last().map(|c| c.period.end) else {
            return Vec::new();
        };
        let support = active.len();
        let totals = allocation.summary().per_domain;
        let total_of = |d: &Domain| totals.get(d).map_or(0, |t| t.0);

        let mut out = Vec::new();
        for domain in &self.peak_domains {
            out.extend(self.peak_hour(allocation, domain));
        }
        for rule in &self.balance {
            out.extend(Self::balance_ratio(
                rule,
                total_of(&rule.domain),
                total_of(&rule.counterweight),
                support,
                latest,
            ));
        }
        for domain in self.taxonomy.classifiable() {
            out.extend(self.streak(allocation, domain));
        }
        out.extend(self.diversity(&totals, support, latest));

        tracing::debug!(insights = out.len(), periods = support, "structural insights");
        out
    }

    fn peak_hour(&self, allocation: &Allocation, domain: &Domain) -> Option<Insight> {
        let mut by_hour = [0i64; 24];
        let mut periods = 0;
        let mut last = None;
        for row in allocation.domain_hourly(domain) {
            let mut any = false;
            for (sum, d) in by_hour.iter_mut().zip(&row.by_hour) {
                *sum += d.0;
                any |= d.0 > 0;
            }
            if any {
                periods += 1;
                last = Some(row.period.end);
            }
        }
        let total: i64 = by_hour.iter().sum();
        if total == 0 {
            return None;
        }
        // Earliest hour wins a tie.
        let (hour, peak) = by_hour
            .iter()
            .enumerate()
            .fold((0, 0), |best, (h, &ms)| if ms > best.1 { (h, ms) } else { best });
        let share = peak as f64 / total as f64;
        Some(Insight {
            id: format!("peak_hour:{domain}"),
            kind: InsightKind::PeakHour {
                hour: hour as u32,
                slot: self.slots.iter().find(|s| s.contains(hour)).map(|s| s.name.clone()),
            },
            domain: Some(domain.clone()),
            description: format!(
                "Time on {domain} peaks at {hour:02}:00-{:02}:00, which holds {:.0}% of it",
                hour + 1,
                share * 100.0
            ),
            support: periods,
            strength: share,
            last_observed: last,
        })
    }

    fn balance_ratio(
        rule: &BalanceRule,
        ms: i64,
        counter_ms: i64,
        support: usize,
        latest: DateTime<Utc>,
    ) -> Option<Insight> {
        if ms == 0 {
            return None;
        }
        let ratio = (counter_ms > 0).then(|| ms as f64 / counter_ms as f64);
        let strength = match ratio {
            Some(r) if r > rule.max_ratio => 1.0 - rule.max_ratio / r,
            Some(_) => return None,
            None => 1.0,
        };
        let (d, c) = (&rule.domain, &rule.counterweight);
        let description = match ratio {
            Some(r) => format!("{d} takes {r:.1}x the time of {c}, above the {:.1}x limit", rule.max_ratio),
            None => format!("{d} has scheduled time but {c} has none"),
        };
        Some(Insight {
            id: format!("balance:{d}/{c}"),
            kind: InsightKind::BalanceRatio {
                counterweight: c.clone(),
                ratio,
                max_ratio: rule.max_ratio,
            },
            domain: Some(d.clone()),
            description,
            support,
            strength,
            last_observed: Some(latest),
        })
    }

    fn streak(&self, allocation: &Allocation, domain: &Domain) -> Option<Insight> {
        let buckets: Vec<_> = allocation.domain_buckets(domain).collect();
        let run = buckets
            .iter()
            .rev()
            .take_while(|b| b.total_duration.0 >= self.streak_min_ms)
            .count();
        if run < self.streak_min_periods {
            return None;
        }
        Some(Insight {
            id: format!("streak:{domain}"),
            kind: InsightKind::Streak { periods: run },
            domain: Some(domain.clone()),
            description: format!(
                "{run} consecutive periods with at least {} on {domain}, up to the latest one",
                DurationMs(self.streak_min_ms)
            ),
            support: run,
            strength: run as f64 / buckets.len() as f64,
            last_observed: buckets.last().map(|b| b.period.end),
        })
    }

    fn diversity(&self, totals: &BTreeMap<Domain, DurationMs>, support: usize, latest: DateTime<Utc>) -> Vec<Insight> {
        let domains: Vec<&Domain> = self.taxonomy.classifiable().collect();
        let missing: Vec<&Domain> = domains
            .iter()
            .copied()
            .filter(|d| totals.get(*d).map_or(true, |t| t.0 == 0))
            .collect();
        let active = domains.len() - missing.len();

        let mut out = Vec::new();
        if active < self.min_active_domains {
            out.push(Insight {
                id: "diversity".into(),
                kind: InsightKind::LowDiversity {
                    active_domains: active,
                    total_domains: domains.len(),
                },
                domain: None,
                description: format!("Only {active} of {} domains received any time", domains.len()),
                support,
                strength: 1.0 - active as f64 / self.min_active_domains as f64,
                last_observed: Some(latest),
            });
        }
        for domain in missing {
            out.push(Insight {
                id: format!("missing:{domain}"),
                kind: InsightKind::MissingDomain,
                domain: Some(domain.clone()),
                description: format!("No time on {domain} in the window"),
                support,
                strength: MISSING_DOMAIN_STRENGTH,
                last_observed: Some(latest),
            });
        }
        out
    }
}
