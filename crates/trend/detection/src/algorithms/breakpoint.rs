use serde_json::json;
use trend_types::{DetectedTrend, TrendDirection, TrendImpact, TrendStrength};

use super::{accept, candidate, AlgorithmKind, TrendAlgorithm};
use crate::config::{DetectionConfig, MultipleTesting};
use crate::error::DetectionResult;
use crate::series::TimeSeries;
use crate::stats::{self, EPSILON};

/// Largest significant shift in mean between adjacent windows.
///
/// Every index `i` in `w..=n-w` is tested by comparing `[i-w, i)` with
/// `[i, i+w)`, so the reported index is the first observation of the new
/// regime.
#[derive(Clone, Copy, Debug, Default)]
pub struct BreakpointTrend;

#[derive(Clone, Copy, Debug)]
struct Shift {
    index: usize,
    delta: f64,
    p_value: f64,
}

impl TrendAlgorithm for BreakpointTrend {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Breakpoint
    }

    fn detect(
        &self,
        series: &TimeSeries,
        config: &DetectionConfig,
    ) -> DetectionResult<Vec<DetectedTrend>> {
        let params = &config.breakpoint;
        let n = series.len();
        if n < params.min_points {
            return Ok(vec![]);
        }
        let window = params.max_window.min(n / 3);
        if window < 2 {
            return Ok(vec![]);
        }
        let values = series.values();
        let (Some(mean), Some(std)) = (stats::mean(values), stats::std_dev(values)) else {
            return Ok(vec![]);
        };

        let positions = n - 2 * window + 1;
        let mut best: Option<Shift> = None;
        for index in window..=n - window {
            let before = &values[index - window..index];
            let after = &values[index..index + window];
            let Some(test) = stats::welch_t_test(before, after) else {
                continue;
            };
            let p_value = match params.correction {
                MultipleTesting::None => test.p_value,
                MultipleTesting::Bonferroni => (test.p_value * positions as f64).min(1.0),
            };
            let delta = stats::mean(after).unwrap_or_default() - stats::mean(before).unwrap_or_default();
            if p_value >= params.significance || delta.abs() <= params.min_shift_std * std {
                continue;
            }
            // Strictly larger only, so the earliest index wins ties.
            if best.map_or(true, |b| delta.abs() > b.delta.abs()) {
                best = Some(Shift { index, delta, p_value });
            }
        }
        let Some(shift) = best else {
            return Ok(vec![]);
        };

        let relative_change = if mean.abs() > EPSILON {
            shift.delta.abs() / mean.abs()
        } else if std > EPSILON {
            shift.delta.abs() / std
        } else {
            0.0
        };
        let (strength, impact) = if relative_change > 0.5 {
            (TrendStrength::VeryStrong, TrendImpact::Critical)
        } else if relative_change > 0.3 {
            (TrendStrength::Strong, TrendImpact::High)
        } else if relative_change > 0.15 {
            (TrendStrength::Moderate, TrendImpact::Medium)
        } else {
            (TrendStrength::Weak, TrendImpact::Low)
        };
        let direction = if shift.delta > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };

        let Some(mut trend) = candidate(
            self.kind(),
            format!("Structural break ({direction}) in {}", series.category()),
            series,
            direction,
        ) else {
            return Ok(vec![]);
        };
        trend.start_date = series.timestamps()[shift.index];
        trend.supporting_point_count = n - shift.index;
        let trend = trend
            .with_classification(strength, impact)
            .with_confidence(1.0 - shift.p_value)
            .with_indicators(["breakpoint_index", "mean_change", "p_value"])
            .with_correlation("mean_shift", relative_change.min(1.0) * shift.delta.signum())
            .with_metadata("breakpoint_index", json!(shift.index))
            .with_metadata("mean_change", json!(shift.delta))
            .with_metadata("relative_change", json!(relative_change))
            .with_metadata("p_value", json!(shift.p_value))
            .with_metadata("window", json!(window));

        Ok(accept(self.kind(), trend, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn step(t: f64) -> f64 {
        if t < 30.0 {
            100.0
        } else {
            120.0
        }
    }

    #[test]
    fn recovers_step_location() {
        let series = testing::daily(13, 60, 5.0, step);
        let trends = BreakpointTrend.detect(&series, &DetectionConfig::default()).unwrap();
        assert_eq!(trends.len(), 1);
        let t = &trends[0];
        let index = t.metadata["breakpoint_index"].as_u64().unwrap() as i64;
        assert!((index - 30).abs() <= 2, "index {index}");
        assert_eq!(t.direction, TrendDirection::Increasing);
        assert_eq!(t.start_date, series.timestamps()[index as usize]);
        assert!(t.confidence > 0.99);
    }

    #[test]
    fn downward_step_is_decreasing() {
        let series = testing::daily(17, 45, 1.0, |t| if t < 20.0 { 50.0 } else { 20.0 });
        let trends = BreakpointTrend.detect(&series, &DetectionConfig::default()).unwrap();
        let t = &trends[0];
        assert_eq!(t.direction, TrendDirection::Decreasing);
        // |Δ| = 30 against a mean of ~33.
        assert_eq!(t.strength, TrendStrength::VeryStrong);
        assert_eq!(t.impact, TrendImpact::Critical);
    }

    #[test]
    fn white_noise_has_no_break() {
        let series = testing::white_noise(19, 200);
        assert!(BreakpointTrend.detect(&series, &DetectionConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn needs_fifteen_points() {
        let series = testing::daily(1, 14, 0.0, step);
        assert!(BreakpointTrend.detect(&series, &DetectionConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn noise_free_step_reports_exact_index() {
        let series = testing::daily(1, 30, 0.0, |t| if t < 15.0 { 10.0 } else { 20.0 });
        let trends = BreakpointTrend.detect(&series, &DetectionConfig::default()).unwrap();
        assert_eq!(trends[0].metadata["breakpoint_index"], json!(15));
    }
}
