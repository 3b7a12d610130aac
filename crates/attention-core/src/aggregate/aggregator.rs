use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

use super::period::{Granularity, Period};
use super::{Allocation, AllocationBucket, DurationMs, HourlyProfile, OverlapPolicy, PeriodCoverage};
use crate::classify::ClassifiedEvent;
use crate::config::Config;
use crate::diagnostics::AggregationStats;
use crate::domain::{Domain, Taxonomy};
use crate::error::ConfigError;
use crate::events::AnalysisWindow;

/// An event's span clipped to one period, in ms from the period start.
struct Clip<'a> {
    /// Position in the input; breaks priority ties.
    order: usize,
    domain: &'a Domain,
    start: i64,
    end: i64,
    /// Unclipped duration, the `time_weighted` weight.
    weight: i64,
}

/// What one period received.
#[derive(Default)]
struct PeriodTally {
    time: BTreeMap<Domain, i64>,
    hourly: BTreeMap<Domain, [i64; 24]>,
    counts: BTreeMap<Domain, usize>,
    /// Events touching the period
    events: usize,
}

impl PeriodTally {
    fn credit(&mut self, domain: &Domain, hour: usize, ms: i64) {
        *self.time.entry(domain.clone()).or_default() += ms;
        self.hourly.entry(domain.clone()).or_insert([0; 24])[hour] += ms;
    }
}

fn offset_ms(period: &Period, instant: DateTime<Utc>) -> i64 {
    (instant - period.start)
        .num_milliseconds()
        .clamp(0, period.length_ms())
}

/// Split `len` ms between `weights`. Shares are floored; leftover
/// milliseconds go one each to the earliest entries.
pub(crate) fn apportion(len: i64, weights: &[i64]) -> Vec<i64> {
    if weights.is_empty() {
        return Vec::new();
    }
    let total: i128 = weights.iter().map(|w| i128::from(*w)).sum();
    if total <= 0 {
        return apportion(len, &vec![1; weights.len()]);
    }
    let mut shares: Vec<i64> = weights
        .iter()
        .map(|w| (i128::from(len) * i128::from(*w) / total) as i64)
        .collect();
    let mut remainder = len - shares.iter().sum::<i64>();
    for share in shares.iter_mut() {
        if remainder == 0 {
            break;
        }
        *share += 1;
        remainder -= 1;
    }
    shares
}

/// Rolls classified events into per-period, per-domain allocation.
#[derive(Debug, Clone)]
pub struct Aggregator {
    taxonomy: Taxonomy,
    tz: Tz,
    granularity: Granularity,
    policy: OverlapPolicy,
    include_all_day: bool,
}

impl Aggregator {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            taxonomy: config.taxonomy()?,
            tz: config.tz()?,
            granularity: config.aggregation.granularity,
            policy: config.aggregation.overlap_policy,
            include_all_day: config.aggregation.include_all_day_events,
        })
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Offsets of the local hour boundaries strictly inside `(from, to)`.
    fn hour_marks(&self, period: &Period, from: i64, to: i64) -> Vec<i64> {
        let mut marks = Vec::new();
        let mut cur = from;
        while cur < to {
            let local = (period.start + Duration::milliseconds(cur)).with_timezone(&self.tz);
            let into_hour = i64::from(local.minute()) * 60_000
                + i64::from(local.second()) * 1_000
                + i64::from(local.nanosecond() / 1_000_000).min(999);
            cur += 3_600_000 - into_hour;
            if cur < to {
                marks.push(cur);
            }
        }
        marks
    }

    fn local_hour(&self, period: &Period, offset: i64) -> usize {
        (period.start + Duration::milliseconds(offset))
            .with_timezone(&self.tz)
            .hour() as usize
    }

    /// Allocate one period. Every elementary segment lies inside a single
    /// local clock hour, so the hourly profile sums to the domain totals.
    fn allocate_period(&self, period: &Period, events: &[&ClassifiedEvent]) -> PeriodTally {
        let clips: Vec<Clip<'_>> = events
            .iter()
            .enumerate()
            .filter(|(_, c)| c.event.overlaps(period.start, period.end))
            .map(|(order, c)| Clip {
                order,
                domain: &c.primary_domain,
                start: offset_ms(period, c.event.start),
                end: offset_ms(period, c.event.end),
                weight: c.event.duration().num_milliseconds(),
            })
            .filter(|clip| clip.end > clip.start)
            .collect();

        let mut tally = PeriodTally {
            events: clips.len(),
            ..PeriodTally::default()
        };
        for clip in &clips {
            *tally.counts.entry(clip.domain.clone()).or_default() += 1;
        }

        let mut bounds: Vec<i64> = clips.iter().flat_map(|c| [c.start, c.end]).collect();
        let span = bounds.iter().min().copied().zip(bounds.iter().max().copied());
        if let Some((lo, hi)) = span {
            bounds.extend(self.hour_marks(period, lo, hi));
        }
        bounds.sort_unstable();
        bounds.dedup();

        for segment in bounds.windows(2) {
            let (from, to) = (segment[0], segment[1]);
            let active: Vec<&Clip<'_>> = clips
                .iter()
                .filter(|c| c.start <= from && c.end >= to)
                .collect();
            if active.is_empty() {
                continue;
            }
            let len = to - from;
            let hour = self.local_hour(period, from);
            match self.policy {
                OverlapPolicy::EqualSplit | OverlapPolicy::TimeWeighted => {
                    let weights: Vec<i64> = active
                        .iter()
                        .map(|c| match self.policy {
                            OverlapPolicy::TimeWeighted => c.weight,
                            _ => 1,
                        })
                        .collect();
                    for (clip, share) in active.iter().zip(apportion(len, &weights)) {
                        tally.credit(clip.domain, hour, share);
                    }
                }
                OverlapPolicy::PriorityDomainWins => {
                    let winner = active
                        .iter()
                        .min_by(|a, b| {
                            self.taxonomy
                                .compare(a.domain, b.domain)
                                .then(a.order.cmp(&b.order))
                        })
                        .map(|c| c.domain);
                    if let Some(domain) = winner {
                        tally.credit(domain, hour, len);
                    }
                }
            }
        }
        tally
    }

    /// Aggregate `events` over `window`.
    ///
    /// Every period gets one bucket per taxonomy domain, zero or not, in
    /// taxonomy order.
    pub fn aggregate(&self, events: &[ClassifiedEvent], window: &AnalysisWindow) -> (Allocation, AggregationStats) {
        let mut stats = AggregationStats::default();
        let included: Vec<&ClassifiedEvent> = events
            .iter()
            .filter(|c| {
                if c.event.all_day && !self.include_all_day {
                    stats.all_day_excluded += 1;
                    false
                } else {
                    true
                }
            })
            .collect();

        let periods = self.granularity.periods(window, self.tz);
        let mut buckets = Vec::with_capacity(periods.len() * self.taxonomy.len());
        let mut coverage = Vec::with_capacity(periods.len());
        let mut hourly = Vec::new();

        for period in &periods {
            let tally = self.allocate_period(period, &included);
            let event_count = tally.events;
            let scheduled: i64 = tally.time.values().sum();
            for domain in self.taxonomy.domains() {
                let total = tally.time.get(domain).copied().unwrap_or(0);
                if let Some(by_hour) = tally.hourly.get(domain) {
                    hourly.push(HourlyProfile {
                        period: *period,
                        domain: domain.clone(),
                        by_hour: by_hour.map(DurationMs),
                    });
                }
                buckets.push(AllocationBucket {
                    period: *period,
                    domain: domain.clone(),
                    total_duration: DurationMs(total),
                    event_count: tally.counts.get(domain).copied().unwrap_or(0),
                    share: if scheduled > 0 {
                        total as f64 / scheduled as f64
                    } else {
                        0.0
                    },
                });
            }
            let cov = PeriodCoverage {
                period: *period,
                scheduled: DurationMs(scheduled),
                idle: DurationMs(period.length_ms() - scheduled),
                event_count,
                has_data: event_count > 0,
            };
            if !cov.has_data {
                stats.periods_without_data.push(*period);
            }
            coverage.push(cov);
        }
        stats.periods = periods.len();

        tracing::debug!(
            periods = stats.periods,
            buckets = buckets.len(),
            without_data = stats.periods_without_data.len(),
            granularity = %self.granularity,
            "aggregated allocation"
        );
        (
            Allocation {
                granularity: self.granularity,
                buckets,
                coverage,
                hourly,
            },
            stats,
        )
    }
}
