//! Linear extrapolation of a trend's supporting series.

use chrono::{Duration, Utc};
use trend_types::{DetectedTrend, ForecastId, TrendForecast};

use crate::config::DetectionConfig;
use crate::series::TimeSeries;
use crate::stats::LinearFit;

/// Methodology label recorded on every forecast.
pub const LINEAR_METHODOLOGY: &str = "linear_regression";

/// Two-sided 95% normal quantile used for the confidence band.
const BAND_Z: f64 = 1.96;

const MIN_FORECAST_POINTS: usize = 3;

/// Refits OLS on the trend window and projects `forecast_horizon` steps of
/// the median sampling interval past the last observation.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearForecaster;

impl LinearForecaster {
    /// `None` when the window is too short to fit or the fit's R² is below the
    /// confidence threshold.
    pub fn forecast(
        &self,
        trend: &DetectedTrend,
        series: &TimeSeries,
        config: &DetectionConfig,
    ) -> Option<TrendForecast> {
        let window = series.since(trend.start_date);
        if window.len() < MIN_FORECAST_POINTS {
            return None;
        }
        let x = window.elapsed_days();
        let fit = LinearFit::fit(&x, window.values())?;
        if fit.r_squared < config.confidence_threshold {
            tracing::debug!(
                trend_id = %trend.id,
                r_squared = fit.r_squared,
                "forecast fit below confidence threshold"
            );
            return None;
        }

        let step_days = window.median_interval_days()?;
        let last_x = *x.last()?;
        let last_ts = window.last_timestamp()?;
        let step = Duration::milliseconds((step_days * 86_400_000.0).round() as i64);
        let half_band = BAND_Z * fit.residual_std;

        let horizon = config.forecast_horizon;
        let mut forecast_dates = Vec::with_capacity(horizon);
        let mut predicted_values = Vec::with_capacity(horizon);
        let mut confidence_intervals = Vec::with_capacity(horizon);
        for k in 1..=horizon {
            let predicted = fit.predict(last_x + k as f64 * step_days);
            forecast_dates.push(last_ts + step * k as i32);
            predicted_values.push(predicted);
            confidence_intervals.push((predicted - half_band, predicted + half_band));
        }

        Some(TrendForecast {
            id: ForecastId::new(),
            trend_id: trend.id.clone(),
            horizon,
            forecast_dates,
            predicted_values,
            confidence_intervals,
            accuracy: fit.r_squared,
            methodology: LINEAR_METHODOLOGY.to_string(),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, epoch};
    use trend_types::{TrendDirection, TrendType};

    fn trend_over(series: &TimeSeries) -> DetectedTrend {
        DetectedTrend::new(
            "t",
            "X",
            TrendType::Market,
            TrendDirection::Increasing,
            series.first_timestamp().unwrap(),
            series.len(),
        )
    }

    #[test]
    fn noiseless_line_has_exact_fit_and_zero_band() {
        let series = TimeSeries::from_daily_values("X", epoch(), (0..40).map(|t| 5.0 + 3.0 * t as f64));
        let trend = trend_over(&series);
        let f = LinearForecaster
            .forecast(&trend, &series, &DetectionConfig::default())
            .unwrap();
        assert_eq!(f.horizon, 30);
        assert_eq!(f.predicted_values.len(), 30);
        assert_eq!(f.confidence_intervals.len(), 30);
        assert!((f.accuracy - 1.0).abs() < 1e-9);
        for (low, high) in &f.confidence_intervals {
            assert!((high - low).abs() < 1e-6);
        }
        assert!((f.predicted_values[0] - (5.0 + 3.0 * 40.0)).abs() < 1e-6);
        assert_eq!(f.forecast_dates[0], epoch() + Duration::days(40));
        assert_eq!(f.trend_id, trend.id);
        assert_eq!(f.methodology, LINEAR_METHODOLOGY);
    }

    #[test]
    fn band_is_symmetric_and_widens_with_noise() {
        let series = testing::daily(41, 90, 5.0, |t| 100.0 + 0.5 * t);
        let f = LinearForecaster
            .forecast(&trend_over(&series), &series, &DetectionConfig::default())
            .unwrap();
        for (value, (low, high)) in f.predicted_values.iter().zip(&f.confidence_intervals) {
            assert!((value - low - (high - value)).abs() < 1e-9);
            assert!(high - low > 10.0);
        }
    }

    #[test]
    fn poor_fit_yields_no_forecast() {
        let series = testing::white_noise(43, 100);
        assert!(LinearForecaster
            .forecast(&trend_over(&series), &series, &DetectionConfig::default())
            .is_none());
    }

    #[test]
    fn custom_horizon() {
        let series = TimeSeries::from_daily_values("X", epoch(), (0..10).map(|t| t as f64));
        let config = DetectionConfig {
            forecast_horizon: 7,
            ..DetectionConfig::default()
        };
        let f = LinearForecaster.forecast(&trend_over(&series), &series, &config).unwrap();
        assert_eq!(f.horizon, 7);
        assert_eq!(f.forecast_dates.len(), 7);
    }
}
