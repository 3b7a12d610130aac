//! Allocation Aggregator: classified events → per-period, per-domain time.
//!
//! Overlapping events never double-count: every elementary interval of a
//! period is apportioned among the events active in it according to the
//! configured [`OverlapPolicy`].

mod aggregator;
mod period;

pub use aggregator::Aggregator;
pub use period::{Granularity, Period};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;

use crate::domain::Domain;

/// How concurrent events share an interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Equal shares for every active event.
    #[default]
    EqualSplit,
    /// Shares proportional to each event's full duration.
    TimeWeighted,
    /// Highest-priority domain takes the whole interval.
    PriorityDomainWins,
}

/// Duration in whole milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationMs(pub i64);

impl DurationMs {
    pub fn as_minutes(self) -> f64 {
        self.0 as f64 / 60_000.0
    }

    pub fn as_hours(self) -> f64 {
        self.0 as f64 / 3_600_000.0
    }
}

impl Add for DurationMs {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        DurationMs(self.0 + rhs.0)
    }
}

impl fmt::Display for DurationMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.0 / 60_000;
        write!(f, "{}h{:02}m", minutes / 60, minutes % 60)
    }
}

/// Time attributed to one domain in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationBucket {
    pub period: Period,
    pub domain: Domain,
    pub total_duration: DurationMs,
    /// Events of this domain intersecting the period
    pub event_count: usize,
    /// Fraction of the period's scheduled time; 0 when nothing is scheduled
    pub share: f64,
}

/// Scheduled vs idle time for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCoverage {
    pub period: Period,
    pub scheduled: DurationMs,
    pub idle: DurationMs,
    pub event_count: usize,
    /// At least one event intersects the period.
    pub has_data: bool,
}

/// A named range of local clock hours, `[start_hour, end_hour)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimeSlot {
    pub fn new(name: impl Into<String>, start_hour: u32, end_hour: u32) -> Self {
        Self {
            name: name.into(),
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: usize) -> bool {
        (self.start_hour as usize..self.end_hour as usize).contains(&hour)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:02}:00-{:02}:00)", self.name, self.start_hour, self.end_hour)
    }
}

/// Time one domain received in each local clock hour of one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyProfile {
    pub period: Period,
    pub domain: Domain,
    pub by_hour: [DurationMs; 24],
}

impl HourlyProfile {
    /// Total time inside `slot`.
    pub fn within(&self, slot: &TimeSlot) -> DurationMs {
        DurationMs(
            self.by_hour
                .iter()
                .enumerate()
                .filter(|(hour, _)| slot.contains(*hour))
                .map(|(_, d)| d.0)
                .sum(),
        )
    }
}

/// Aggregator output: buckets ordered by period then taxonomy order, plus
/// per-period coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub granularity: Granularity,
    pub buckets: Vec<AllocationBucket>,
    pub coverage: Vec<PeriodCoverage>,
    /// Hour-of-day breakdown; only non-empty (period, domain) rows.
    #[serde(default)]
    pub hourly: Vec<HourlyProfile>,
}

/// Share of all scheduled time in the window, per domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub total_scheduled: DurationMs,
    pub per_domain: BTreeMap<Domain, DurationMs>,
    pub shares: BTreeMap<Domain, f64>,
}

impl AllocationSummary {
    pub fn share(&self, domain: &Domain) -> f64 {
        self.shares.get(domain).copied().unwrap_or(0.0)
    }
}

impl Allocation {
    pub fn periods(&self) -> impl Iterator<Item = &Period> {
        self.coverage.iter().map(|c| &c.period)
    }

    /// Hourly rows of a single domain, in period order.
    pub fn domain_hourly<'a>(&'a self, domain: &'a Domain) -> impl Iterator<Item = &'a HourlyProfile> {
        self.hourly.iter().filter(move |h| &h.domain == domain)
    }

    /// Buckets of a single domain, in period order.
    pub fn domain_buckets<'a>(&'a self, domain: &'a Domain) -> impl Iterator<Item = &'a AllocationBucket> {
        self.buckets.iter().filter(move |b| &b.domain == domain)
    }

    pub fn summary(&self) -> AllocationSummary {
        let mut per_domain: BTreeMap<Domain, DurationMs> = BTreeMap::new();
        for bucket in &self.buckets {
            let entry = per_domain.entry(bucket.domain.clone()).or_default();
            *entry = *entry + bucket.total_duration;
        }
        let total = per_domain.values().fold(DurationMs(0), |acc, d| acc + *d);
        let shares = per_domain
            .iter()
            .map(|(domain, d)| {
                let share = if total.0 > 0 {
                    d.0 as f64 / total.0 as f64
                } else {
                    0.0
                };
                (domain.clone(), share)
            })
            .collect();
        AllocationSummary {
            total_scheduled: total,
            per_domain,
            shares,
        }
    }
}
