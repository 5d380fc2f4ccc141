//! Detection parameters.
//!
//! The top-level fields are the engine's public tuning surface. The nested
//! parameter groups hold the per-algorithm heuristics (period band, window
//! caps, peak heights, band boundaries) as named values so each deployment can
//! tune and test them independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trend_types::TrendImpact;

use crate::error::{DetectionError, DetectionResult};

/// Minimum points before any detection runs for a category.
pub const DEFAULT_MIN_DATA_POINTS: usize = 10;

/// Default analysis window for scheduled runs, in days.
pub const DEFAULT_TREND_WINDOW_DAYS: i64 = 30;

/// Candidates below this confidence are discarded.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Number of projected steps per forecast.
pub const DEFAULT_FORECAST_HORIZON: usize = 30;

/// Multiple-comparison handling for the breakpoint scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleTesting {
    /// Raw per-position p-value.
    None,
    /// p-value multiplied by the number of tested positions, capped at 1.
    Bonferroni,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    pub min_points: usize,
    /// `|slope|` below this (value units per day) is a stable trend.
    pub stable_slope: f64,
    /// `|slope|` above this is a strong trend.
    pub strong_slope: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            min_points: 5,
            stable_slope: 0.1,
            strong_slope: 1.0,
            min_confidence: 0.1,
            max_confidence: 0.95,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalParams {
    pub min_points: usize,
    /// Plausible business-cycle band, in days.
    pub min_period_days: f64,
    pub max_period_days: f64,
    /// Spectral peaks below this fraction of the largest magnitude are ignored.
    pub peak_fraction: f64,
    pub max_confidence: f64,
}

impl Default for SeasonalParams {
    fn default() -> Self {
        Self {
            min_points: 30,
            min_period_days: 7.0,
            max_period_days: 365.0,
            peak_fraction: 0.1,
            max_confidence: 0.9,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CyclicalParams {
    pub min_points: usize,
    pub min_peak_height: f64,
    /// Minimum separation between autocorrelation peaks, in lags.
    pub min_peak_distance: usize,
    /// Peak height above which a cycle is moderate. The strong boundary is
    /// `DetectionConfig::correlation_threshold`.
    pub moderate_height: f64,
}

impl Default for CyclicalParams {
    fn default() -> Self {
        Self {
            min_points: 20,
            min_peak_height: 0.3,
            min_peak_distance: 5,
            moderate_height: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakpointParams {
    pub min_points: usize,
    /// Window is `min(max_window, n / 3)`.
    pub max_window: usize,
    pub significance: f64,
    /// Required mean shift, in standard deviations of the whole series.
    pub min_shift_std: f64,
    pub correction: MultipleTesting,
}

impl Default for BreakpointParams {
    fn default() -> Self {
        Self {
            min_points: 15,
            max_window: 10,
            significance: 0.05,
            min_shift_std: 0.5,
            correction: MultipleTesting::Bonferroni,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityParams {
    pub min_points: usize,
    /// Window is `min(max_window, n / 2)`.
    pub max_window: usize,
    /// Mean volatility above this is high impact.
    pub high_level: f64,
    /// Mean volatility above this is critical impact.
    pub critical_level: f64,
    pub max_confidence: f64,
}

impl Default for VolatilityParams {
    fn default() -> Self {
        Self {
            min_points: 10,
            max_window: 10,
            high_level: 0.3,
            critical_level: 0.4,
            max_confidence: 0.9,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternParams {
    /// Mean second difference must exceed this multiple of the value std.
    pub acceleration_factor: f64,
    /// Coefficient of variation below which the tail counts as stabilized.
    pub stabilization_cv: f64,
    pub stabilization_tail: usize,
    pub recurrence_min_points: usize,
    pub recurrence_min_peak: f64,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            acceleration_factor: 0.1,
            stabilization_cv: 0.05,
            stabilization_tail: 10,
            recurrence_min_points: 20,
            recurrence_min_peak: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertParams {
    pub critical_expiry_days: i64,
    pub strong_expiry_days: i64,
}

impl Default for AlertParams {
    fn default() -> Self {
        Self {
            critical_expiry_days: 7,
            strong_expiry_days: 14,
        }
    }
}

/// Complete parameter set for one detection pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub min_data_points: usize,
    pub trend_window_days: i64,
    /// Lower boundary of the moderate volatility band.
    pub volatility_threshold: f64,
    /// Autocorrelation height above which a cycle is strong.
    pub correlation_threshold: f64,
    pub confidence_threshold: f64,
    pub forecast_horizon: usize,
    /// Ranking threshold recorded on alerts of each severity.
    pub alert_thresholds: BTreeMap<TrendImpact, f64>,
    /// Start dates closer than this are merged by the consolidator.
    pub consolidation_window_days: i64,
    pub linear: LinearParams,
    pub seasonal: SeasonalParams,
    pub cyclical: CyclicalParams,
    pub breakpoint: BreakpointParams,
    pub volatility: VolatilityParams,
    pub patterns: PatternParams,
    pub alerts: AlertParams,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_data_points: DEFAULT_MIN_DATA_POINTS,
            trend_window_days: DEFAULT_TREND_WINDOW_DAYS,
            volatility_threshold: 0.2,
            correlation_threshold: 0.7,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            forecast_horizon: DEFAULT_FORECAST_HORIZON,
            alert_thresholds: default_alert_thresholds(),
            consolidation_window_days: 7,
            linear: LinearParams::default(),
            seasonal: SeasonalParams::default(),
            cyclical: CyclicalParams::default(),
            breakpoint: BreakpointParams::default(),
            volatility: VolatilityParams::default(),
            patterns: PatternParams::default(),
            alerts: AlertParams::default(),
        }
    }
}

fn default_alert_thresholds() -> BTreeMap<TrendImpact, f64> {
    BTreeMap::from([
        (TrendImpact::Low, 0.3),
        (TrendImpact::Medium, 0.5),
        (TrendImpact::High, 0.7),
        (TrendImpact::Critical, 0.9),
    ])
}

impl DetectionConfig {
    /// Threshold recorded for an alert of the given severity.
    pub fn alert_threshold(&self, severity: TrendImpact) -> f64 {
        self.alert_thresholds
            .get(&severity)
            .copied()
            .or_else(|| default_alert_thresholds().get(&severity).copied())
            .unwrap_or(0.0)
    }

    pub fn validate(&self) -> DetectionResult<()> {
        let unit = [
            ("confidence_threshold", self.confidence_threshold),
            ("correlation_threshold", self.correlation_threshold),
            ("breakpoint.significance", self.breakpoint.significance),
            ("cyclical.min_peak_height", self.cyclical.min_peak_height),
            ("seasonal.peak_fraction", self.seasonal.peak_fraction),
            ("patterns.recurrence_min_peak", self.patterns.recurrence_min_peak),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(DetectionError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.forecast_horizon == 0 {
            return Err(DetectionError::InvalidConfig(
                "forecast_horizon must be positive".into(),
            ));
        }
        if self.trend_window_days <= 0 {
            return Err(DetectionError::InvalidConfig(
                "trend_window_days must be positive".into(),
            ));
        }
        if self.seasonal.min_period_days > self.seasonal.max_period_days {
            return Err(DetectionError::InvalidConfig(format!(
                "seasonal period band is inverted: [{}, {}]",
                self.seasonal.min_period_days, self.seasonal.max_period_days
            )));
        }
        if self.breakpoint.max_window < 2 || self.volatility.max_window < 2 {
            return Err(DetectionError::InvalidConfig(
                "window caps must be at least 2".into(),
            ));
        }
        Ok(())
    }
}
