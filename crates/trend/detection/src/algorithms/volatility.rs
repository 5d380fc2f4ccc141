use serde_json::json;
use trend_types::{DetectedTrend, TrendDirection, TrendImpact, TrendStrength};

use super::{accept, candidate, AlgorithmKind, TrendAlgorithm};
use crate::config::DetectionConfig;
use crate::error::{DetectionError, DetectionResult};
use crate::series::TimeSeries;
use crate::stats::{self, LinearFit};

/// Level and drift of the rolling coefficient of variation.
#[derive(Clone, Copy, Debug, Default)]
pub struct VolatilityTrend;

impl TrendAlgorithm for VolatilityTrend {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Volatility
    }

    fn detect(
        &self,
        series: &TimeSeries,
        config: &DetectionConfig,
    ) -> DetectionResult<Vec<DetectedTrend>> {
        let params = &config.volatility;
        let n = series.len();
        if n < params.min_points {
            return Ok(vec![]);
        }
        let window = params.max_window.min(n / 2);
        let volatility = stats::rolling_coefficient_of_variation(series.values(), window);
        // Most windows must have a defined level for the drift to mean anything.
        let windows = n + 1 - window;
        if volatility.len() < 2 || volatility.len() * 2 < windows {
            return Ok(vec![]);
        }
        let fit = LinearFit::fit_indexed(&volatility).ok_or_else(|| {
            DetectionError::algorithm(self.kind(), "volatility series could not be fitted")
        })?;
        let level = stats::mean(&volatility).unwrap_or_default();

        let (strength, impact) = if level > params.critical_level {
            (TrendStrength::VeryStrong, TrendImpact::Critical)
        } else if level > params.high_level {
            (TrendStrength::Strong, TrendImpact::High)
        } else if level > config.volatility_threshold {
            (TrendStrength::Moderate, TrendImpact::Medium)
        } else {
            (TrendStrength::Weak, TrendImpact::Low)
        };
        let direction = if fit.slope > 0.0 {
            TrendDirection::Volatile
        } else {
            TrendDirection::Stable
        };
        let confidence = (fit.r_squared + level).min(params.max_confidence);
        let label = if fit.slope > 0.0 { "increasing" } else { "decreasing" };

        let Some(trend) = candidate(
            self.kind(),
            format!("Volatility {label} in {}", series.category()),
            series,
            direction,
        ) else {
            return Ok(vec![]);
        };
        let trend = trend
            .with_classification(strength, impact)
            .with_confidence(confidence)
            .with_indicators(["mean_volatility", "volatility_slope"])
            .with_correlation("volatility_trend", fit.slope.signum() * fit.r_squared.sqrt())
            .with_metadata("mean_volatility", json!(level))
            .with_metadata("volatility_slope", json!(fit.slope))
            .with_metadata("volatility_r_squared", json!(fit.r_squared))
            .with_metadata("window", json!(window));

        Ok(accept(self.kind(), trend, config))
    }
}
