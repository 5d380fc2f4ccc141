//! The central detection artifact and the records attached to it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::{
    AlertType, PatternType, TrendDirection, TrendImpact, TrendStrength, TrendType,
};
use crate::ids::{AlertId, ForecastId, PatternId, TrendId};
use crate::point::Metadata;

/// A statistically supported characteristic of one category's series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedTrend {
    pub id: TrendId,
    pub name: String,
    /// Category whose series produced this trend.
    pub category: String,
    pub trend_type: TrendType,
    pub direction: TrendDirection,
    pub strength: TrendStrength,
    pub impact: TrendImpact,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
    pub start_date: DateTime<Utc>,
    pub detection_date: DateTime<Utc>,
    pub supporting_point_count: usize,
    #[serde(default)]
    pub key_indicators: Vec<String>,
    #[serde(default)]
    pub correlation_factors: BTreeMap<String, f64>,
    #[serde(default)]
    pub patterns: Vec<TrendPattern>,
    #[serde(default)]
    pub forecasts: Vec<TrendForecast>,
    #[serde(default)]
    pub alerts: Vec<TrendAlert>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DetectedTrend {
    /// Create a trend with weak/low classification and zero confidence;
    /// detectors fill in the rest.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        trend_type: TrendType,
        direction: TrendDirection,
        start_date: DateTime<Utc>,
        supporting_point_count: usize,
    ) -> Self {
        Self {
            id: TrendId::new(),
            name: name.into(),
            category: category.into(),
            trend_type,
            direction,
            strength: TrendStrength::Weak,
            impact: TrendImpact::Low,
            confidence: 0.0,
            start_date,
            detection_date: Utc::now(),
            supporting_point_count,
            key_indicators: Vec::new(),
            correlation_factors: BTreeMap::new(),
            patterns: Vec::new(),
            forecasts: Vec::new(),
            alerts: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_classification(mut self, strength: TrendStrength, impact: TrendImpact) -> Self {
        self.strength = strength;
        self.impact = impact;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_indicators<I, S>(mut self, indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_indicators = indicators.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_correlation(mut self, factor: impl Into<String>, value: f64) -> Self {
        self.correlation_factors.insert(factor.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Alerts that have not yet expired at `now`.
    pub fn active_alerts(&self, now: DateTime<Utc>) -> impl Iterator<Item = &TrendAlert> {
        self.alerts.iter().filter(move |a| a.is_active(now))
    }
}

/// Secondary sub-pattern detected within a trend's supporting window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendPattern {
    pub id: PatternId,
    pub pattern_type: PatternType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_days: f64,
    pub strength: f64,
    pub confidence: f64,
    #[serde(default)]
    pub parameters: Metadata,
}

impl TrendPattern {
    pub fn new(
        pattern_type: PatternType,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        strength: f64,
        confidence: f64,
    ) -> Self {
        let duration_days = (end_date - start_date).num_seconds() as f64 / 86_400.0;
        Self {
            id: PatternId::new(),
            pattern_type,
            start_date,
            end_date,
            duration_days,
            strength,
            confidence: confidence.clamp(0.0, 1.0),
            parameters: Metadata::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// Extrapolated future values of a trend with a confidence band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendForecast {
    pub id: ForecastId,
    pub trend_id: TrendId,
    /// Number of projected future steps.
    pub horizon: usize,
    pub forecast_dates: Vec<DateTime<Utc>>,
    pub predicted_values: Vec<f64>,
    /// `(low, high)` bounds, one per predicted value.
    pub confidence_intervals: Vec<(f64, f64)>,
    /// Goodness of fit of the model used for projection.
    pub accuracy: f64,
    pub methodology: String,
    pub created_at: DateTime<Utc>,
}

/// Advisory, time-boxed notification derived from a trend.
///
/// Expired alerts are inert; removing them is left to the caller's store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendAlert {
    pub id: AlertId,
    pub trend_id: TrendId,
    pub alert_type: AlertType,
    pub severity: TrendImpact,
    /// Configured ranking threshold for `severity`.
    pub severity_threshold: f64,
    pub message: String,
    pub recommendations: Vec<String>,
    pub triggered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TrendAlert {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_trend() -> DetectedTrend {
        DetectedTrend::new(
            "Linear increasing trend",
            "X",
            TrendType::Market,
            TrendDirection::Increasing,
            Utc::now() - Duration::days(30),
            30,
        )
    }

    #[test]
    fn new_trend_starts_unclassified() {
        let t = sample_trend();
        assert_eq!(t.strength, TrendStrength::Weak);
        assert_eq!(t.impact, TrendImpact::Low);
        assert_eq!(t.confidence, 0.0);
        assert!(t.patterns.is_empty());
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(sample_trend().with_confidence(1.7).confidence, 1.0);
        assert_eq!(sample_trend().with_confidence(-0.2).confidence, 0.0);
    }

    #[test]
    fn builder_helpers_fill_fields() {
        let t = sample_trend()
            .with_classification(TrendStrength::Strong, TrendImpact::High)
            .with_indicators(["slope", "r_squared"])
            .with_correlation("time", 0.9)
            .with_metadata("slope", serde_json::json!(0.5));
        assert_eq!(t.strength, TrendStrength::Strong);
        assert_eq!(t.key_indicators, vec!["slope", "r_squared"]);
        assert_eq!(t.correlation_factors["time"], 0.9);
        assert_eq!(t.metadata["slope"], serde_json::json!(0.5));
    }

    #[test]
    fn pattern_duration_in_days() {
        let start = Utc::now();
        let p = TrendPattern::new(
            PatternType::Recurrence,
            start,
            start + Duration::hours(36),
            0.6,
            0.7,
        );
        assert!((p.duration_days - 1.5).abs() < 1e-9);
    }

    #[test]
    fn alert_activity_window() {
        let now = Utc::now();
        let alert = TrendAlert {
            id: AlertId::new(),
            trend_id: TrendId::new(),
            alert_type: AlertType::StrongTrend,
            severity: TrendImpact::High,
            severity_threshold: 0.7,
            message: "strong trend".into(),
            recommendations: vec![],
            triggered_at: now,
            expires_at: now + Duration::days(14),
        };
        assert!(alert.is_active(now));
        assert!(!alert.is_active(now + Duration::days(15)));

        let mut trend = sample_trend();
        trend.alerts.push(alert);
        assert_eq!(trend.active_alerts(now).count(), 1);
        assert_eq!(trend.active_alerts(now + Duration::days(20)).count(), 0);
    }

    #[test]
    fn trend_serde_roundtrip_preserves_labels() {
        let t = sample_trend().with_classification(TrendStrength::VeryStrong, TrendImpact::Critical);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"very_strong\""));
        let back: DetectedTrend = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, t.id);
        assert_eq!(back.impact, TrendImpact::Critical);
    }
}
