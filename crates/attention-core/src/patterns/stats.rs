//! Correlation tests and the distribution functions behind their p-values.

use std::f64::consts::PI;

use super::TestMethod;

/// Coefficient and two-sided p-value of a test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub coefficient: f64,
    pub p_value: f64,
}

/// Two aligned series in, coefficient + p-value out.
///
/// Returns `None` when the test is undefined for the input (fewer than three
/// pairs, or a constant series).
pub trait CorrelationTest: Send + Sync {
    fn method(&self) -> TestMethod;
    fn test(&self, x: &[f64], y: &[f64]) -> Option<TestOutcome>;
}

/// Pearson product-moment correlation with a t-test on r.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pearson;

/// Spearman rank correlation (average ranks for ties) with a t-test on rho.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spearman;

impl CorrelationTest for Pearson {
    fn method(&self) -> TestMethod {
        TestMethod::Pearson
    }

    fn test(&self, x: &[f64], y: &[f64]) -> Option<TestOutcome> {
        let r = pearson(x, y)?;
        Some(TestOutcome {
            coefficient: r,
            p_value: correlation_p_value(r, x.len()),
        })
    }
}

impl CorrelationTest for Spearman {
    fn method(&self) -> TestMethod {
        TestMethod::Spearman
    }

    fn test(&self, x: &[f64], y: &[f64]) -> Option<TestOutcome> {
        let rho = pearson(&ranks(x), &ranks(y))?;
        Some(TestOutcome {
            coefficient: rho,
            p_value: correlation_p_value(rho, x.len()),
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pearson's r. `None` for mismatched lengths, fewer than 3 pairs, or zero
/// variance on either side.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 3 {
        return None;
    }
    let (mx, my) = (mean(x), mean(y));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// 1-based ranks; tied values share their average rank.
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
    let mut out = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            out[idx] = rank;
        }
        i = j + 1;
    }
    out
}

/// Two-sided p-value for a correlation coefficient over `n` pairs.
pub fn correlation_p_value(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    let df = (n - 2) as f64;
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    student_t_two_sided(r * (df / denom).sqrt(), df)
}

/// P(|T| >= |t|) for Student's t with `df` degrees of freedom.
pub fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    regularized_incomplete_beta(df / (df + t * t), df / 2.0, 0.5).clamp(0.0, 1.0)
}

/// P(F >= f) for the F distribution with (`d1`, `d2`) degrees of freedom.
pub fn f_upper_tail(f: f64, d1: f64, d2: f64) -> f64 {
    if !f.is_finite() {
        return 0.0;
    }
    if f <= 0.0 {
        return 1.0;
    }
    regularized_incomplete_beta(d2 / (d2 + d1 * f), d2 / 2.0, d1 / 2.0).clamp(0.0, 1.0)
}

/// Lanczos approximation (g = 7, n = 9).
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        return PI.ln() - (PI * x).sin().ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + G + 0.5;
    let series = COEF
        .iter()
        .enumerate()
        .skip(1)
        .fold(COEF[0], |acc, (i, c)| acc + c / (x + i as f64));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// Continued fraction for the incomplete beta function (modified Lentz).
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 3e-14;
    const TINY: f64 = 1e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };
    let (qab, qap, qam) = (a + b, a + 1.0, a - 1.0);
    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;
    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Regularized incomplete beta function I_x(a, b).
pub fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Result of the low/mid/high tertile contrast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TertileContrast {
    /// Correlation ratio, sqrt(SS_between / SS_total).
    pub eta: f64,
    pub p_value: f64,
    /// Mean of `y` in the low, middle and high `x` tertiles.
    pub means: [f64; 3],
}

impl TertileContrast {
    /// Middle tertile is above or below both outer ones.
    pub fn middle_is_extreme(&self) -> bool {
        let [low, mid, high] = self.means;
        (mid > low && mid > high) || (mid < low && mid < high)
    }

    pub fn peaks_in_middle(&self) -> bool {
        let [low, mid, high] = self.means;
        mid > low && mid > high
    }
}

/// One-way ANOVA of `y` over tertiles of `x`.
///
/// `None` below six pairs or when `y` never varies.
pub fn tertile_anova(x: &[f64], y: &[f64]) -> Option<TertileContrast> {
    let n = x.len();
    if n != y.len() || n < 6 {
        return None;
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]).then(a.cmp(&b)));

    let base = n / 3;
    let extra = n % 3;
    let mut groups: [Vec<f64>; 3] = Default::default();
    let mut cursor = 0;
    for (g, group) in groups.iter_mut().enumerate() {
        let size = base + usize::from(g < extra);
        group.extend(order[cursor..cursor + size].iter().map(|&i| y[i]));
        cursor += size;
    }

    let grand = mean(y);
    let ss_total: f64 = y.iter().map(|v| (v - grand).powi(2)).sum();
    if ss_total <= f64::EPSILON {
        return None;
    }
    let means = [mean(&groups[0]), mean(&groups[1]), mean(&groups[2])];
    let ss_between: f64 = groups
        .iter()
        .zip(means)
        .map(|(g, m)| g.len() as f64 * (m - grand).powi(2))
        .sum();
    let ss_within = (ss_total - ss_between).max(0.0);

    let (d1, d2) = (2.0, (n - 3) as f64);
    let p_value = if ss_within <= f64::EPSILON {
        0.0
    } else {
        f_upper_tail((ss_between / d1) / (ss_within / d2), d1, d2)
    };
    Some(TertileContrast {
        eta: (ss_between / ss_total).sqrt().clamp(0.0, 1.0),
        p_value,
        means,
    })
}
