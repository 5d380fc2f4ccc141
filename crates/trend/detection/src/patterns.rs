//! Secondary patterns inside a trend's supporting window.

use serde_json::json;
use trend_types::{DetectedTrend, PatternType, TrendDirection, TrendPattern, TrendStrength};

use crate::algorithms::first_cycle;
use crate::config::DetectionConfig;
use crate::series::TimeSeries;
use crate::stats;

/// Runs the acceleration, stabilization and recurrence checks.
#[derive(Clone, Copy, Debug, Default)]
pub struct PatternIdentifier;

impl PatternIdentifier {
    /// Patterns found in `series` from the trend's start date onwards.
    ///
    /// Every returned pattern lies within that window and meets the confidence
    /// threshold.
    pub fn identify(
        &self,
        trend: &DetectedTrend,
        series: &TimeSeries,
        config: &DetectionConfig,
    ) -> Vec<TrendPattern> {
        let window = series.since(trend.start_date);
        if window.len() < 2 {
            return vec![];
        }

        let mut patterns = Vec::new();
        if trend.direction == TrendDirection::Increasing {
            patterns.extend(acceleration(&window, config));
        }
        if trend.strength == TrendStrength::Weak {
            patterns.extend(stabilization(&window, config));
        }
        patterns.extend(recurrence(&window, config));

        patterns.retain(|p| p.confidence >= config.confidence_threshold);
        if !patterns.is_empty() {
            tracing::debug!(
                category = %trend.category,
                trend_id = %trend.id,
                count = patterns.len(),
                "patterns identified"
            );
        }
        patterns
    }
}

/// Mean second difference above a fraction of the value spread.
fn acceleration(window: &TimeSeries, config: &DetectionConfig) -> Option<TrendPattern> {
    let values = window.values();
    let diffs = stats::second_differences(values);
    let mean_diff = stats::mean(&diffs)?;
    let std = stats::std_dev(values)?;
    if mean_diff <= config.patterns.acceleration_factor * std {
        return None;
    }
    let confidence = stats::one_sample_t_test(&diffs)
        .map(|t| 1.0 - t.upper_tail_p())
        .unwrap_or(0.0);
    Some(
        TrendPattern::new(
            PatternType::Acceleration,
            window.first_timestamp()?,
            window.last_timestamp()?,
            if std > 0.0 { mean_diff / std } else { 0.0 },
            confidence,
        )
        .with_parameter("mean_second_difference", json!(mean_diff)),
    )
}

/// Low coefficient of variation over the trailing points.
fn stabilization(window: &TimeSeries, config: &DetectionConfig) -> Option<TrendPattern> {
    let params = &config.patterns;
    if window.len() < params.stabilization_tail {
        return None;
    }
    let tail = window.tail(params.stabilization_tail);
    let cv = stats::coefficient_of_variation(tail.values())?;
    if cv >= params.stabilization_cv {
        return None;
    }
    let confidence = 1.0 - cv / params.stabilization_cv;
    Some(
        TrendPattern::new(
            PatternType::Stabilization,
            tail.first_timestamp()?,
            tail.last_timestamp()?,
            1.0 - cv,
            confidence,
        )
        .with_parameter("coefficient_of_variation", json!(cv)),
    )
}

/// Autocorrelation peak, as in the cyclical detector, with a higher floor.
fn recurrence(window: &TimeSeries, config: &DetectionConfig) -> Option<TrendPattern> {
    let params = &config.patterns;
    if window.len() < params.recurrence_min_points {
        return None;
    }
    let (lag, height) = first_cycle(
        window.values(),
        params.recurrence_min_peak,
        config.cyclical.min_peak_distance,
    )?;
    Some(
        TrendPattern::new(
            PatternType::Recurrence,
            window.first_timestamp()?,
            window.last_timestamp()?,
            height,
            height,
        )
        .with_parameter("lag", json!(lag)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, epoch};
    use std::f64::consts::PI;
    use trend_types::{TrendImpact, TrendType};

    fn trend_over(series: &TimeSeries, direction: TrendDirection, strength: TrendStrength) -> DetectedTrend {
        DetectedTrend::new(
            "t",
            "X",
            TrendType::Market,
            direction,
            series.first_timestamp().unwrap(),
            series.len(),
        )
        .with_classification(strength, TrendImpact::Low)
    }

    #[test]
    fn accelerating_growth() {
        let series = TimeSeries::from_daily_values(
            "X",
            epoch(),
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 4.0, 16.0],
        );
        let trend = trend_over(&series, TrendDirection::Increasing, TrendStrength::Strong);
        let patterns = PatternIdentifier.identify(&trend, &series, &DetectionConfig::default());
        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.pattern_type, PatternType::Acceleration);
        assert!(p.confidence >= 0.6);
        assert_eq!(p.start_date, epoch());
        assert!((p.duration_days - 9.0).abs() < 1e-9);
    }

    #[test]
    fn acceleration_only_checked_when_increasing() {
        let series = TimeSeries::from_daily_values(
            "X",
            epoch(),
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 4.0, 16.0],
        );
        let trend = trend_over(&series, TrendDirection::Volatile, TrendStrength::Strong);
        assert!(PatternIdentifier.identify(&trend, &series, &DetectionConfig::default()).is_empty());
    }

    #[test]
    fn stabilizing_tail_on_weak_trend() {
        let mut values: Vec<f64> = (0..10).map(|i| 50.0 + 10.0 * i as f64).collect();
        values.extend([100.0, 100.5, 99.5, 100.2, 99.8, 100.1, 99.9, 100.0, 100.3, 99.7]);
        let series = TimeSeries::from_daily_values("X", epoch(), values);
        let trend = trend_over(&series, TrendDirection::Stable, TrendStrength::Weak);
        let patterns = PatternIdentifier.identify(&trend, &series, &DetectionConfig::default());
        let p = patterns
            .iter()
            .find(|p| p.pattern_type == PatternType::Stabilization)
            .unwrap();
        assert_eq!(p.start_date, epoch() + chrono::Duration::days(10));
        assert!(p.confidence > 0.9);
    }

    #[test]
    fn recurrence_on_periodic_window() {
        let series = testing::daily(31, 80, 1.0, |t| 50.0 + 10.0 * (2.0 * PI * t / 10.0).sin());
        let trend = trend_over(&series, TrendDirection::Cyclical, TrendStrength::Strong);
        let patterns = PatternIdentifier.identify(&trend, &series, &DetectionConfig::default());
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pattern_type, PatternType::Recurrence);
        let lag = patterns[0].parameters["lag"].as_u64().unwrap();
        assert!((9..=11).contains(&lag));
    }

    #[test]
    fn patterns_stay_inside_trend_window() {
        let series = testing::daily(31, 80, 1.0, |t| 50.0 + 10.0 * (2.0 * PI * t / 10.0).sin());
        let mut trend = trend_over(&series, TrendDirection::Cyclical, TrendStrength::Strong);
        trend.start_date = epoch() + chrono::Duration::days(30);
        for p in PatternIdentifier.identify(&trend, &series, &DetectionConfig::default()) {
            assert!(p.start_date >= trend.start_date);
            assert!(p.end_date <= series.last_timestamp().unwrap());
        }
    }
}
