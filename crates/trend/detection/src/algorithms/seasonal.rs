use serde_json::json;
use trend_types::{DetectedTrend, TrendDirection, TrendImpact, TrendStrength};

use super::{accept, candidate, AlgorithmKind, TrendAlgorithm};
use crate::config::DetectionConfig;
use crate::error::{DetectionError, DetectionResult};
use crate::series::TimeSeries;
use crate::stats::{self, EPSILON};

/// Dominant spectral period of the series.
///
/// The period is the DFT bin of the largest peak converted to days through
/// the median sampling interval.
#[derive(Clone, Copy, Debug, Default)]
pub struct SeasonalTrend;

impl TrendAlgorithm for SeasonalTrend {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Seasonal
    }

    fn detect(
        &self,
        series: &TimeSeries,
        config: &DetectionConfig,
    ) -> DetectionResult<Vec<DetectedTrend>> {
        let params = &config.seasonal;
        let n = series.len();
        if n < params.min_points {
            return Ok(vec![]);
        }
        let values = series.values();
        let (Some(mean), Some(std)) = (stats::mean(values), stats::std_dev(values)) else {
            return Ok(vec![]);
        };
        if std < EPSILON {
            return Ok(vec![]);
        }
        let interval = series.median_interval_days().ok_or_else(|| {
            DetectionError::algorithm(self.kind(), "no positive sampling interval")
        })?;

        let centered: Vec<f64> = values.iter().map(|v| v - mean).collect();
        let mut magnitudes = stats::dft_magnitudes(&centered);
        if let Some(dc) = magnitudes.first_mut() {
            *dc = 0.0;
        }
        let max_magnitude = magnitudes.iter().copied().fold(0.0, f64::max);
        if max_magnitude < EPSILON {
            return Ok(vec![]);
        }

        let peaks = stats::find_peaks(&magnitudes, params.peak_fraction * max_magnitude, 1);
        let Some(bin) = peaks
            .into_iter()
            .max_by(|a, b| magnitudes[*a].total_cmp(&magnitudes[*b]).then(b.cmp(a)))
        else {
            return Ok(vec![]);
        };
        let period_days = n as f64 / bin as f64 * interval;
        if period_days < params.min_period_days || period_days > params.max_period_days {
            tracing::debug!(
                category = %series.category(),
                period_days,
                "dominant period outside the accepted band"
            );
            return Ok(vec![]);
        }

        let Some(amplitude) = stats::coefficient_of_variation(values) else {
            return Ok(vec![]);
        };
        let (strength, impact) = if amplitude > 0.3 {
            (TrendStrength::Strong, TrendImpact::High)
        } else if amplitude > 0.15 {
            (TrendStrength::Moderate, TrendImpact::Medium)
        } else {
            (TrendStrength::Weak, TrendImpact::Low)
        };
        let confidence = (2.0 * amplitude).min(params.max_confidence);

        let Some(trend) = candidate(
            self.kind(),
            format!("Seasonal pattern ({period_days:.1} day period) in {}", series.category()),
            series,
            TrendDirection::Seasonal,
        ) else {
            return Ok(vec![]);
        };
        let trend = trend
            .with_classification(strength, impact)
            .with_confidence(confidence)
            .with_indicators(["period_days", "seasonal_amplitude"])
            .with_correlation("seasonality", amplitude.min(1.0))
            .with_metadata("period_days", json!(period_days))
            .with_metadata("frequency_bin", json!(bin))
            .with_metadata("seasonal_amplitude", json!(amplitude))
            .with_metadata("spectral_magnitude", json!(magnitudes[bin]));

        Ok(accept(self.kind(), trend, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use std::f64::consts::PI;

    fn period_of(trend: &DetectedTrend) -> f64 {
        trend.metadata["period_days"].as_f64().unwrap()
    }

    #[test]
    fn recovers_monthly_period() {
        let series = testing::daily(5, 360, 2.0, |t| 100.0 + 50.0 * (2.0 * PI * t / 30.0).sin());
        let trends = SeasonalTrend.detect(&series, &DetectionConfig::default()).unwrap();
        assert_eq!(trends.len(), 1);
        let t = &trends[0];
        assert_eq!(t.direction, TrendDirection::Seasonal);
        assert!((period_of(t) - 30.0).abs() <= 3.0);
        assert_eq!(t.strength, TrendStrength::Strong);
        assert!(t.confidence >= 0.6 && t.confidence <= 0.9);
    }

    #[test]
    fn recovers_fortnightly_period() {
        let series = testing::daily(9, 140, 1.0, |t| 80.0 + 40.0 * (2.0 * PI * t / 14.0).sin());
        let trends = SeasonalTrend.detect(&series, &DetectionConfig::default()).unwrap();
        assert!((period_of(&trends[0]) - 14.0).abs() <= 1.4);
    }

    #[test]
    fn period_below_band_is_rejected() {
        // A four-day cycle is outside the [7, 365] day band.
        let series = testing::daily(2, 120, 0.5, |t| 100.0 + 50.0 * (2.0 * PI * t / 4.0).sin());
        assert!(SeasonalTrend.detect(&series, &DetectionConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn small_amplitude_is_rejected() {
        let series = testing::white_noise(4, 200);
        assert!(SeasonalTrend.detect(&series, &DetectionConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn confidence_floor_requires_a_large_relative_amplitude() {
        // Confidence is 2 * std / |mean|, and a sine of amplitude A has
        // std A / sqrt(2), so the 0.6 floor needs A / mean above ~0.43.
        let weak = testing::daily(6, 360, 1.0, |t| 100.0 + 20.0 * (2.0 * PI * t / 30.0).sin());
        assert!(SeasonalTrend.detect(&weak, &DetectionConfig::default()).unwrap().is_empty());

        let strong = testing::daily(6, 360, 1.0, |t| 100.0 + 50.0 * (2.0 * PI * t / 30.0).sin());
        let trends = SeasonalTrend.detect(&strong, &DetectionConfig::default()).unwrap();
        assert_eq!(trends.len(), 1);
        let amplitude = trends[0].metadata["seasonal_amplitude"].as_f64().unwrap();
        assert!((amplitude - 0.5 / 2f64.sqrt()).abs() < 0.01, "{amplitude}");
    }

    #[test]
    fn cycle_around_zero_has_no_amplitude() {
        let series = testing::daily(8, 360, 1.0, |t| 50.0 * (2.0 * PI * t / 30.0).sin());
        assert!(SeasonalTrend.detect(&series, &DetectionConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn needs_thirty_points() {
        let series = testing::daily(1, 29, 0.0, |t| 100.0 + 50.0 * (2.0 * PI * t / 7.0).sin());
        assert!(SeasonalTrend.detect(&series, &DetectionConfig::default()).unwrap().is_empty());
    }
}
