use serde_json::json;
use trend_types::{DetectedTrend, TrendDirection, TrendImpact, TrendStrength};

use super::{accept, candidate, AlgorithmKind, TrendAlgorithm};
use crate::config::DetectionConfig;
use crate::error::DetectionResult;
use crate::series::TimeSeries;
use crate::stats;

/// First significant autocorrelation peak beyond lag 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct CyclicalTrend;

/// Lag and height of the first autocorrelation peak at or above `min_height`.
pub(crate) fn first_cycle(values: &[f64], min_height: f64, min_distance: usize) -> Option<(usize, f64)> {
    let acf = stats::autocorrelation(values);
    stats::find_peaks(&acf, min_height, min_distance)
        .into_iter()
        .next()
        .map(|lag| (lag, acf[lag]))
}

impl TrendAlgorithm for CyclicalTrend {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Cyclical
    }

    fn detect(
        &self,
        series: &TimeSeries,
        config: &DetectionConfig,
    ) -> DetectionResult<Vec<DetectedTrend>> {
        let params = &config.cyclical;
        if series.len() < params.min_points {
            return Ok(vec![]);
        }
        let Some((lag, height)) = first_cycle(
            series.values(),
            params.min_peak_height,
            params.min_peak_distance,
        ) else {
            return Ok(vec![]);
        };

        let (strength, impact) = if height > config.correlation_threshold {
            (TrendStrength::Strong, TrendImpact::High)
        } else if height > params.moderate_height {
            (TrendStrength::Moderate, TrendImpact::Medium)
        } else {
            (TrendStrength::Weak, TrendImpact::Low)
        };

        let Some(trend) = candidate(
            self.kind(),
            format!("Cyclical pattern ({lag} step cycle) in {}", series.category()),
            series,
            TrendDirection::Cyclical,
        ) else {
            return Ok(vec![]);
        };
        let cycle_days = series.median_interval_days().map(|d| d * lag as f64);
        let trend = trend
            .with_classification(strength, impact)
            .with_confidence(height)
            .with_indicators(["cycle_length", "cycle_strength"])
            .with_correlation("autocorrelation", height)
            .with_metadata("cycle_length", json!(lag))
            .with_metadata("cycle_length_days", json!(cycle_days))
            .with_metadata("cycle_strength", json!(height));

        Ok(accept(self.kind(), trend, config))
    }
}
