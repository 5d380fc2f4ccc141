//! Deterministic synthetic series for unit tests.

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::series::TimeSeries;

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

/// Standard normal sample (Box–Muller).
pub fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Daily series `shape(t) + N(0, sigma)` for `t = 0..n`.
pub fn daily(seed: u64, n: usize, sigma: f64, shape: impl Fn(f64) -> f64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let values: Vec<f64> = (0..n)
        .map(|t| shape(t as f64) + sigma * gaussian(&mut rng))
        .collect();
    TimeSeries::from_daily_values("X", epoch(), values)
}

pub fn white_noise(seed: u64, n: usize) -> TimeSeries {
    daily(seed, n, 5.0, |_| 100.0)
}
