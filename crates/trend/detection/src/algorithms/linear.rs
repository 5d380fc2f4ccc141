use serde_json::json;
use trend_types::{DetectedTrend, TrendDirection, TrendImpact, TrendStrength};

use super::{accept, candidate, AlgorithmKind, TrendAlgorithm};
use crate::config::DetectionConfig;
use crate::error::{DetectionError, DetectionResult};
use crate::series::TimeSeries;
use crate::stats::{self, LinearFit, EPSILON};

/// Ordinary least-squares drift of value against elapsed days.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearTrend;

impl TrendAlgorithm for LinearTrend {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Linear
    }

    fn detect(
        &self,
        series: &TimeSeries,
        config: &DetectionConfig,
    ) -> DetectionResult<Vec<DetectedTrend>> {
        let params = &config.linear;
        if series.len() < params.min_points {
            return Ok(vec![]);
        }

        let values = series.values();
        let fit = LinearFit::fit(&series.elapsed_days(), values).ok_or_else(|| {
            DetectionError::algorithm(self.kind(), "all observations share one timestamp")
        })?;
        let mean = stats::mean(values).unwrap_or_default();

        let direction = if fit.slope.abs() < params.stable_slope {
            TrendDirection::Stable
        } else if fit.slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };
        let strength = if fit.slope.abs() > params.strong_slope {
            TrendStrength::Strong
        } else {
            TrendStrength::Moderate
        };

        let relative_change = if mean.abs() < EPSILON {
            0.0
        } else {
            (fit.slope * values.len() as f64).abs() / mean.abs()
        };
        let impact = if relative_change > 0.5 {
            TrendImpact::High
        } else if relative_change > 0.2 {
            TrendImpact::Medium
        } else {
            TrendImpact::Low
        };

        let confidence = fit
            .r_squared
            .clamp(params.min_confidence, params.max_confidence);
        let (value_min, value_max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });

        let Some(trend) = candidate(
            self.kind(),
            format!("Linear {direction} trend in {}", series.category()),
            series,
            direction,
        ) else {
            return Ok(vec![]);
        };
        let trend = trend
            .with_classification(strength, impact)
            .with_confidence(confidence)
            .with_indicators(["slope", "r_squared", "relative_change"])
            .with_correlation("time", fit.slope.signum() * fit.r_squared.sqrt())
            .with_metadata("slope", json!(fit.slope))
            .with_metadata("intercept", json!(fit.intercept))
            .with_metadata("r_squared", json!(fit.r_squared))
            .with_metadata("value_min", json!(value_min))
            .with_metadata("value_max", json!(value_max))
            .with_metadata("relative_change", json!(relative_change));

        Ok(accept(self.kind(), trend, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn recovers_increasing_slope() {
        let series = testing::daily(7, 50, 1.0, |t| 10.0 + 2.0 * t);
        let trends = LinearTrend.detect(&series, &DetectionConfig::default()).unwrap();
        assert_eq!(trends.len(), 1);
        let t = &trends[0];
        assert_eq!(t.direction, TrendDirection::Increasing);
        assert_eq!(t.strength, TrendStrength::Strong);
        assert_eq!(t.impact, TrendImpact::High);
        assert!(t.confidence >= 0.6 && t.confidence <= 0.95);
        assert!((t.metadata["slope"].as_f64().unwrap() - 2.0).abs() < 0.1);
        assert_eq!(t.supporting_point_count, 50);
    }

    #[test]
    fn recovers_decreasing_slope() {
        let series = testing::daily(11, 60, 1.0, |t| 500.0 - 1.5 * t);
        let trends = LinearTrend.detect(&series, &DetectionConfig::default()).unwrap();
        assert_eq!(trends[0].direction, TrendDirection::Decreasing);
        assert!(trends[0].correlation_factors["time"] < -0.9);
    }

    #[test]
    fn too_few_points_is_empty() {
        let series = testing::daily(1, 4, 0.0, |t| t);
        assert!(LinearTrend.detect(&series, &DetectionConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn white_noise_is_rejected() {
        let series = testing::white_noise(3, 200);
        assert!(LinearTrend.detect(&series, &DetectionConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn coincident_timestamps_fail() {
        let ts = testing::epoch();
        let series = TimeSeries::new("X", (0..6).map(|i| (ts, i as f64)).collect());
        let err = LinearTrend.detect(&series, &DetectionConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            DetectionError::AlgorithmFailure { algorithm: AlgorithmKind::Linear, .. }
        ));
    }
}
