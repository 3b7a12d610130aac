//! Per-period series and lagged pairing.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

use super::Variable;
use crate::aggregate::{Allocation, DurationMs, Period, TimeSlot};
use crate::domain::Domain;
use crate::events::{local_midnight, WellbeingSignal};

/// One value per period; `None` marks a missing period.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Series {
    pub variable: Variable,
    pub values: Vec<Option<f64>>,
}

/// Domain hours per period. Periods without any event are missing unless
/// `zero_fill` is set.
pub(crate) fn allocation_series(allocation: &Allocation, domain: &Domain, zero_fill: bool) -> Series {
    let values = allocation
        .domain_buckets(domain)
        .zip(&allocation.coverage)
        .map(|(bucket, coverage)| {
            if coverage.has_data || zero_fill {
                Some(bucket.total_duration.as_hours())
            } else {
                None
            }
        })
        .collect();
    Series {
        variable: Variable::Allocation {
            domain: domain.clone(),
        },
        values,
    }
}

/// Domain hours inside `slot` per period. Missing periods follow the same
/// rule as [`allocation_series`].
pub(crate) fn slot_series(allocation: &Allocation, domain: &Domain, slot: &TimeSlot, zero_fill: bool) -> Series {
    let by_period: BTreeMap<DateTime<Utc>, DurationMs> = allocation
        .domain_hourly(domain)
        .map(|row| (row.period.start, row.within(slot)))
        .collect();
    let values = allocation
        .coverage
        .iter()
        .map(|coverage| {
            (coverage.has_data || zero_fill)
                .then(|| by_period.get(&coverage.period.start).map_or(0.0, |d| d.as_hours()))
        })
        .collect();
    Series {
        variable: Variable::Slot {
            domain: domain.clone(),
            slot: slot.clone(),
        },
        values,
    }
}

/// One series per metric, in metric order. A signal dated `d` falls into the
/// period holding local midnight of `d`; several signals in one period are
/// averaged.
pub(crate) fn wellbeing_series(periods: &[Period], signals: &[WellbeingSignal], tz: Tz) -> Vec<Series> {
    let mut sums: BTreeMap<&str, Vec<(f64, usize)>> = BTreeMap::new();
    for signal in signals {
        if !signal.value.is_finite() {
            continue;
        }
        let instant = local_midnight(tz, signal.date);
        let idx = periods.partition_point(|p| p.end <= instant);
        if idx >= periods.len() || !periods[idx].contains(instant) {
            continue;
        }
        let slots = sums
            .entry(signal.metric.as_str())
            .or_insert_with(|| vec![(0.0, 0); periods.len()]);
        slots[idx].0 += signal.value;
        slots[idx].1 += 1;
    }

    sums.into_iter()
        .map(|(metric, slots)| Series {
            variable: Variable::Wellbeing {
                metric: metric.to_string(),
            },
            values: slots
                .into_iter()
                .map(|(sum, n)| (n > 0).then(|| sum / n as f64))
                .collect(),
        })
        .collect()
}

/// Observations where both sides are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Paired {
    pub source: Vec<f64>,
    pub target: Vec<f64>,
    /// Latest period index touched by a pair.
    pub last_index: Option<usize>,
}

impl Paired {
    pub fn support(&self) -> usize {
        self.source.len()
    }
}

/// Pair `source[t + lag]` with `target[t]` for every `t` where both exist.
pub(crate) fn pair(source: &Series, target: &Series, lag: i32) -> Paired {
    let mut paired = Paired::default();
    let n = target.values.len().min(source.values.len());
    for t in 0..n {
        let Some(s) = t.checked_add_signed(lag as isize) else {
            continue;
        };
        if s >= n {
            continue;
        }
        if let (Some(x), Some(y)) = (source.values[s], target.values[t]) {
            paired.source.push(x);
            paired.target.push(y);
            paired.last_index = Some(t.max(s));
        }
    }
    paired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AllocationBucket, Granularity, HourlyProfile, PeriodCoverage};
    use chrono::{NaiveDate, TimeZone};

    fn series(values: &[Option<f64>]) -> Series {
        Series {
            variable: Variable::Wellbeing { metric: "m".into() },
            values: values.to_vec(),
        }
    }

    fn days(n: u32) -> Vec<Period> {
        (1..=n)
            .map(|d| Period {
                start: Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 1, d + 1, 0, 0, 0).unwrap(),
            })
            .collect()
    }

    /// Three days of Work; day 2 has nothing on the calendar.
    fn gappy_allocation() -> Allocation {
        let periods = days(3);
        let hours = [3.0, 0.0, 5.0];
        let work = Domain::new("Work");
        let mut allocation = Allocation {
            granularity: Granularity::Day,
            buckets: Vec::new(),
            coverage: Vec::new(),
            hourly: Vec::new(),
        };
        for (period, h) in periods.iter().zip(hours) {
            let ms = (h * 3_600_000.0) as i64;
            allocation.buckets.push(AllocationBucket {
                period: *period,
                domain: work.clone(),
                total_duration: DurationMs(ms),
                event_count: usize::from(ms > 0),
                share: if ms > 0 { 1.0 } else { 0.0 },
            });
            allocation.coverage.push(PeriodCoverage {
                period: *period,
                scheduled: DurationMs(ms),
                idle: DurationMs(period.length_ms() - ms),
                event_count: usize::from(ms > 0),
                has_data: ms > 0,
            });
            if ms > 0 {
                let mut by_hour = [DurationMs(0); 24];
                by_hour[20] = DurationMs(ms / 3);
                by_hour[9] = DurationMs(ms - ms / 3);
                allocation.hourly.push(HourlyProfile {
                    period: *period,
                    domain: work.clone(),
                    by_hour,
                });
            }
        }
        allocation
    }

    #[test]
    fn empty_periods_are_missing_unless_zero_filled() {
        let allocation = gappy_allocation();
        let work = Domain::new("Work");

        let sparse = allocation_series(&allocation, &work, false);
        assert_eq!(sparse.values, vec![Some(3.0), None, Some(5.0)]);

        let filled = allocation_series(&allocation, &work, true);
        assert_eq!(filled.values, vec![Some(3.0), Some(0.0), Some(5.0)]);

        let evening = TimeSlot::new("evening", 17, 24);
        let slot = slot_series(&allocation, &work, &evening, false);
        assert_eq!(slot.values, vec![Some(1.0), None, Some(5.0 / 3.0)]);
        let slot = slot_series(&allocation, &work, &evening, true);
        assert_eq!(slot.values[1], Some(0.0));
        assert_eq!(slot.variable.to_string(), "slot:Work@evening");
    }

    #[test]
    fn lag_zero_skips_missing() {
        let a = series(&[Some(1.0), None, Some(3.0)]);
        let b = series(&[Some(10.0), Some(20.0), Some(30.0)]);
        let p = pair(&a, &b, 0);
        assert_eq!(p.source, vec![1.0, 3.0]);
        assert_eq!(p.target, vec![10.0, 30.0]);
        assert_eq!(p.last_index, Some(2));
    }

    #[test]
    fn negative_lag_uses_earlier_source() {
        let a = series(&[Some(1.0), Some(2.0), Some(3.0)]);
        let b = series(&[Some(10.0), Some(20.0), Some(30.0)]);
        let p = pair(&a, &b, -1);
        assert_eq!(p.source, vec![1.0, 2.0]);
        assert_eq!(p.target, vec![20.0, 30.0]);
    }

    #[test]
    fn wellbeing_averages_within_period() {
        let periods = days(3);
        let date = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let signals = vec![
            WellbeingSignal { date: date(1), metric: "energy".into(), value: 6.0 },
            WellbeingSignal { date: date(1), metric: "energy".into(), value: 8.0 },
            WellbeingSignal { date: date(3), metric: "energy".into(), value: 5.0 },
            WellbeingSignal { date: date(9), metric: "energy".into(), value: 1.0 },
            WellbeingSignal { date: date(2), metric: "focus".into(), value: 4.0 },
        ];
        let all = wellbeing_series(&periods, &signals, chrono_tz::UTC);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].values, vec![Some(7.0), None, Some(5.0)]);
        assert_eq!(all[1].variable, Variable::Wellbeing { metric: "focus".into() });
    }
}
