//! Read-side views: per-trend detail, global aggregate and counters.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use trend_types::{DetectedTrend, TrendAlert, TrendDirection, TrendImpact, TrendType};

/// Answer of `get_trend_summary`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum TrendSummary {
    Trend(TrendDetail),
    Global(GlobalSummary),
}

/// One trend together with counts of what is attached to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendDetail {
    pub trend: DetectedTrend,
    pub pattern_count: usize,
    pub forecast_count: usize,
    pub alert_count: usize,
    pub active_alerts: Vec<TrendAlert>,
}

impl TrendDetail {
    pub fn new(trend: DetectedTrend, now: DateTime<Utc>) -> Self {
        let active_alerts = trend.active_alerts(now).cloned().collect();
        Self {
            pattern_count: trend.patterns.len(),
            forecast_count: trend.forecasts.len(),
            alert_count: trend.alerts.len(),
            active_alerts,
            trend,
        }
    }
}

/// Aggregate over every cached trend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub total_trends: usize,
    pub by_type: BTreeMap<TrendType, usize>,
    pub by_impact: BTreeMap<TrendImpact, usize>,
    pub by_direction: BTreeMap<TrendDirection, usize>,
    pub active_alerts: usize,
    /// Forecasts created during the 24 hours before the summary.
    pub recent_forecasts: usize,
    pub categories: Vec<String>,
}

impl GlobalSummary {
    pub fn from_trends<'a, I>(trends: I, categories: Vec<String>, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a DetectedTrend>,
    {
        let recent_cutoff = now - Duration::hours(24);
        let mut summary = Self {
            categories,
            ..Self::default()
        };
        for trend in trends {
            summary.total_trends += 1;
            *summary.by_type.entry(trend.trend_type).or_default() += 1;
            *summary.by_impact.entry(trend.impact).or_default() += 1;
            *summary.by_direction.entry(trend.direction).or_default() += 1;
            summary.active_alerts += trend.active_alerts(now).count();
            summary.recent_forecasts += trend
                .forecasts
                .iter()
                .filter(|f| f.created_at >= recent_cutoff)
                .count();
        }
        summary
    }
}

/// Engine counters since start-up.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatistics {
    pub total_data_points: u64,
    pub trends_detected: u64,
    pub patterns_identified: u64,
    pub alerts_generated: u64,
    pub forecasts_created: u64,
    /// Mean wall time of a detection run over one category.
    pub avg_processing_time_ms: f64,
    pub detection_runs: u64,
    pub algorithm_failures: u64,
    pub persistence_failures: u64,
    pub debounced_triggers: u64,
    pub categories_tracked: usize,
}
