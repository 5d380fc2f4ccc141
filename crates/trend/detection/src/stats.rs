//! Numerical kit shared by the detectors, the pattern identifier and the
//! forecaster.
//!
//! Dispersion measures use the population convention (divide by `n`); the
//! significance tests use sample variances (divide by `n - 1`).

use std::f64::consts::PI;

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Magnitudes below this are treated as zero when dividing.
pub const EPSILON: f64 = 1e-10;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance.
pub fn variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64)
}

/// `std / |mean|`. Undefined unless the mean stands clear of zero by more
/// than one standard deviation; closer to zero the ratio only measures how
/// near the mean happens to fall.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?.abs();
    let std = std_dev(values)?;
    if m < EPSILON || m <= std {
        return None;
    }
    Some(std / m)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

// ── Regression ──────────────────────────────────────────────────────

/// Ordinary least-squares fit of `y = intercept + slope * x`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Standard deviation of the residuals (population convention).
    pub residual_std: f64,
    pub n: usize,
}

impl LinearFit {
    /// `None` when fewer than two points are given, the lengths differ or all
    /// `x` coincide.
    pub fn fit(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len();
        if n < 2 || n != y.len() {
            return None;
        }
        let x_mean = mean(x)?;
        let y_mean = mean(y)?;
        let sxx: f64 = x.iter().map(|xi| (xi - x_mean).powi(2)).sum();
        if sxx < EPSILON {
            return None;
        }
        let sxy: f64 = x
            .iter()
            .zip(y)
            .map(|(xi, yi)| (xi - x_mean) * (yi - y_mean))
            .sum();
        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        let ss_res: f64 = x
            .iter()
            .zip(y)
            .map(|(xi, yi)| (yi - (intercept + slope * xi)).powi(2))
            .sum();
        let ss_tot: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
        // A flat series is fitted exactly by a flat line.
        let r_squared = if ss_tot < EPSILON {
            1.0
        } else {
            (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
        };

        Some(Self {
            slope,
            intercept,
            r_squared,
            residual_std: (ss_res / n as f64).sqrt(),
            n,
        })
    }

    /// Fit against the positions `0, 1, 2, ...`.
    pub fn fit_indexed(y: &[f64]) -> Option<Self> {
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
        Self::fit(&x, y)
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

// ── Significance tests ──────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TTest {
    pub statistic: f64,
    pub degrees_of_freedom: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

/// Welch's unequal-variance two-sample t-test of `after` against `before`.
///
/// The statistic is positive when `after` has the larger mean. Samples with
/// zero variance on both sides give `p = 0` for distinct means and `p = 1`
/// for equal ones.
pub fn welch_t_test(before: &[f64], after: &[f64]) -> Option<TTest> {
    let (n1, n2) = (before.len() as f64, after.len() as f64);
    let (m1, m2) = (mean(before)?, mean(after)?);
    let (v1, v2) = (sample_variance(before)?, sample_variance(after)?);
    let (a, b) = (v1 / n1, v2 / n2);
    let se2 = a + b;

    if se2 < EPSILON {
        let p_value = if (m2 - m1).abs() < EPSILON { 1.0 } else { 0.0 };
        return Some(TTest {
            statistic: if p_value == 0.0 {
                (m2 - m1).signum() * f64::INFINITY
            } else {
                0.0
            },
            degrees_of_freedom: n1 + n2 - 2.0,
            p_value,
        });
    }

    let statistic = (m2 - m1) / se2.sqrt();
    let df = se2.powi(2) / (a.powi(2) / (n1 - 1.0) + b.powi(2) / (n2 - 1.0));
    let p_value = 2.0 * t_survival(statistic.abs(), df)?;
    Some(TTest {
        statistic,
        degrees_of_freedom: df,
        p_value: p_value.clamp(0.0, 1.0),
    })
}

/// One-sample t-test of the mean of `values` against zero.
///
/// Returns the two-sided test; `upper_tail_p` gives the one-sided p-value for
/// "mean > 0".
pub fn one_sample_t_test(values: &[f64]) -> Option<TTest> {
    let n = values.len() as f64;
    let m = mean(values)?;
    let v = sample_variance(values)?;
    let df = n - 1.0;
    if v < EPSILON {
        let p_value = if m.abs() < EPSILON { 1.0 } else { 0.0 };
        return Some(TTest {
            statistic: if p_value == 0.0 { m.signum() * f64::INFINITY } else { 0.0 },
            degrees_of_freedom: df,
            p_value,
        });
    }
    let statistic = m / (v / n).sqrt();
    let p_value = 2.0 * t_survival(statistic.abs(), df)?;
    Some(TTest {
        statistic,
        degrees_of_freedom: df,
        p_value: p_value.clamp(0.0, 1.0),
    })
}

impl TTest {
    pub fn upper_tail_p(&self) -> f64 {
        if self.statistic.is_infinite() {
            return if self.statistic > 0.0 { 0.0 } else { 1.0 };
        }
        t_survival(self.statistic, self.degrees_of_freedom)
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }
}

/// `P(T > t)` for Student's t with `df` degrees of freedom.
fn t_survival(t: f64, df: f64) -> Option<f64> {
    if t.is_infinite() {
        return Some(if t > 0.0 { 0.0 } else { 1.0 });
    }
    if !t.is_finite() || !(df > 0.0) {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some(1.0 - dist.cdf(t))
}

// ── Spectral and self-similarity ────────────────────────────────────

/// Full autocorrelation of the mean-centered series for lags `0..n`,
/// normalized by the lag-0 value.
///
/// Empty for series without variance.
pub fn autocorrelation(values: &[f64]) -> Vec<f64> {
    let Some(m) = mean(values) else {
        return Vec::new();
    };
    let centered: Vec<f64> = values.iter().map(|v| v - m).collect();
    let n = centered.len();
    let lag0: f64 = centered.iter().map(|v| v * v).sum();
    if lag0 < EPSILON {
        return Vec::new();
    }
    (0..n)
        .map(|lag| {
            centered[..n - lag]
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / lag0
        })
        .collect()
}

/// Magnitudes of the discrete Fourier transform for the non-negative
/// frequencies `k = 0..=n/2`.
pub fn dft_magnitudes(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    (0..=n / 2)
        .map(|k| {
            let (mut re, mut im) = (0.0, 0.0);
            for (j, v) in values.iter().enumerate() {
                let angle = -2.0 * PI * (k * j % n) as f64 / n as f64;
                re += v * angle.cos();
                im += v * angle.sin();
            }
            re.hypot(im)
        })
        .collect()
}

/// Indices of local maxima with height at least `min_height`, keeping only the
/// highest of any peaks closer than `min_distance`.
///
/// Endpoints are never peaks. A flat top counts once, at its middle. Returned
/// indices are ascending.
pub fn find_peaks(values: &[f64], min_height: f64, min_distance: usize) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead + 1 < n && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                let right = ahead - 1;
                peaks.push((i + right) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks.retain(|&p| values[p] >= min_height);

    if min_distance > 1 && peaks.len() > 1 {
        let mut order: Vec<usize> = (0..peaks.len()).collect();
        order.sort_by(|&a, &b| values[peaks[b]].total_cmp(&values[peaks[a]]).then(a.cmp(&b)));
        let mut keep = vec![true; peaks.len()];
        for &current in &order {
            if !keep[current] {
                continue;
            }
            for (other, flag) in keep.iter_mut().enumerate() {
                if other != current && peaks[other].abs_diff(peaks[current]) < min_distance {
                    *flag = false;
                }
            }
        }
        peaks = peaks
            .into_iter()
            .zip(keep)
            .filter_map(|(p, k)| k.then_some(p))
            .collect();
    }
    peaks
}

// ── Differences and rolling measures ────────────────────────────────

pub fn second_differences(values: &[f64]) -> Vec<f64> {
    values
        .windows(3)
        .map(|w| w[2] - 2.0 * w[1] + w[0])
        .collect()
}

/// Coefficient of variation over each full window. Windows where it is
/// undefined are skipped.
pub fn rolling_coefficient_of_variation(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || window > values.len() {
        return Vec::new();
    }
    values
        .windows(window)
        .filter_map(coefficient_of_variation)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn moments_use_population_convention() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), Some(5.0));
        assert_eq!(variance(&v), Some(4.0));
        assert_eq!(std_dev(&v), Some(2.0));
        assert_eq!(coefficient_of_variation(&v), Some(0.4));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn cv_undefined_for_zero_mean() {
        assert_eq!(coefficient_of_variation(&[-1.0, 1.0]), None);
        // Mean 0.5, std 2.5: dispersion swamps the level.
        assert_eq!(coefficient_of_variation(&[-2.0, 3.0]), None);
        assert_eq!(coefficient_of_variation(&[-9.0, -11.0]), Some(0.1));
    }

    #[test]
    fn median_of_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn exact_line_has_unit_r_squared() {
        let y: Vec<f64> = (0..20).map(|i| 3.0 + 0.5 * i as f64).collect();
        let fit = LinearFit::fit_indexed(&y).unwrap();
        assert!(close(fit.slope, 0.5, 1e-12));
        assert!(close(fit.intercept, 3.0, 1e-12));
        assert!(close(fit.r_squared, 1.0, 1e-12));
        assert!(fit.residual_std < 1e-9);
        assert!(close(fit.predict(40.0), 23.0, 1e-9));
    }

    #[test]
    fn degenerate_x_has_no_fit() {
        assert!(LinearFit::fit(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(LinearFit::fit(&[1.0], &[1.0]).is_none());
    }

    #[test]
    fn welch_detects_shift() {
        let before = [10.0, 10.5, 9.5, 10.2, 9.8, 10.1];
        let after = [15.0, 15.3, 14.8, 15.1, 14.9, 15.2];
        let test = welch_t_test(&before, &after).unwrap();
        assert!(test.statistic > 0.0);
        assert!(test.p_value < 1e-6);
    }

    #[test]
    fn welch_same_sample_is_insignificant() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let test = welch_t_test(&a, &a).unwrap();
        assert!(close(test.statistic, 0.0, 1e-12));
        assert!(close(test.p_value, 1.0, 1e-9));
    }

    #[test]
    fn welch_constant_samples() {
        let t = welch_t_test(&[1.0, 1.0, 1.0], &[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(t.p_value, 0.0);
        let t = welch_t_test(&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(t.p_value, 1.0);
    }

    #[test]
    fn one_sample_upper_tail() {
        let positive = [1.0, 1.2, 0.9, 1.1, 1.3, 0.8];
        let test = one_sample_t_test(&positive).unwrap();
        assert!(test.upper_tail_p() < 0.001);
        let negative: Vec<f64> = positive.iter().map(|v| -v).collect();
        let test = one_sample_t_test(&negative).unwrap();
        assert!(test.upper_tail_p() > 0.999);
    }

    #[test]
    fn autocorrelation_of_periodic_signal() {
        let v: Vec<f64> = (0..120)
            .map(|t| (2.0 * PI * t as f64 / 12.0).sin())
            .collect();
        let acf = autocorrelation(&v);
        assert_eq!(acf.len(), 120);
        assert!(close(acf[0], 1.0, 1e-12));
        assert!(acf[12] > 0.8);
        assert!(acf[6] < -0.8);
        assert!(autocorrelation(&[5.0; 10]).is_empty());
    }

    #[test]
    fn dft_finds_exact_bin() {
        let n = 64;
        let v: Vec<f64> = (0..n)
            .map(|t| (2.0 * PI * 4.0 * t as f64 / n as f64).cos())
            .collect();
        let mags = dft_magnitudes(&v);
        assert_eq!(mags.len(), n / 2 + 1);
        assert!(close(mags[4], n as f64 / 2.0, 1e-6));
        assert!(mags[3] < 1e-6 && mags[5] < 1e-6);
    }

    #[test]
    fn peaks_respect_height_and_distance() {
        let v = [0.0, 1.0, 0.0, 0.8, 0.0, 0.2, 0.0, 0.9, 0.0];
        assert_eq!(find_peaks(&v, 0.5, 1), vec![1, 3, 7]);
        // 1 and 3 are closer than 3 lags: the higher survives.
        assert_eq!(find_peaks(&v, 0.5, 3), vec![1, 7]);
    }

    #[test]
    fn plateau_peak_reported_once_at_middle() {
        let v = [0.0, 1.0, 1.0, 1.0, 0.0];
        assert_eq!(find_peaks(&v, 0.0, 1), vec![2]);
        // Rising edge into the end is not a peak.
        assert!(find_peaks(&[0.0, 1.0, 2.0], 0.0, 1).is_empty());
    }

    #[test]
    fn second_differences_of_quadratic_are_constant() {
        let v: Vec<f64> = (0..6).map(|i| (i * i) as f64).collect();
        assert_eq!(second_differences(&v), vec![2.0; 4]);
    }

    #[test]
    fn rolling_cv_window_count() {
        let v = [10.0, 12.0, 8.0, 10.0, 11.0, 9.0];
        assert_eq!(rolling_coefficient_of_variation(&v, 3).len(), 4);
        assert!(rolling_coefficient_of_variation(&v, 10).is_empty());
    }
}
