//! Threshold rules that turn trends into time-boxed alerts.

use chrono::{Duration, Utc};
use trend_types::{AlertId, AlertType, DetectedTrend, TrendAlert, TrendImpact};

use crate::config::DetectionConfig;

const CRITICAL_RECOMMENDATIONS: &[&str] = &[
    "Escalate to the owning team for immediate review",
    "Assess exposure of dependent plans and commitments",
    "Prepare a contingency response",
];

const STRONG_RECOMMENDATIONS: &[&str] = &[
    "Monitor the trend closely over the coming weeks",
    "Review planning assumptions that depend on this metric",
];

/// Applies the critical-impact and strong-trend rules. The rules are
/// independent: one trend may yield both alerts.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlertGenerator;

impl AlertGenerator {
    pub fn generate(&self, trend: &DetectedTrend, config: &DetectionConfig) -> Vec<TrendAlert> {
        let now = Utc::now();
        let mut alerts = Vec::new();

        if trend.impact == TrendImpact::Critical {
            alerts.push(TrendAlert {
                id: AlertId::new(),
                trend_id: trend.id.clone(),
                alert_type: AlertType::CriticalImpact,
                severity: TrendImpact::Critical,
                severity_threshold: config.alert_threshold(TrendImpact::Critical),
                message: format!(
                    "Critical impact trend detected: {} ({} {}, confidence {:.2})",
                    trend.name, trend.strength, trend.direction, trend.confidence
                ),
                recommendations: to_owned(CRITICAL_RECOMMENDATIONS),
                triggered_at: now,
                expires_at: now + Duration::days(config.alerts.critical_expiry_days),
            });
        }

        if trend.strength.is_strong() {
            alerts.push(TrendAlert {
                id: AlertId::new(),
                trend_id: trend.id.clone(),
                alert_type: AlertType::StrongTrend,
                severity: trend.impact,
                severity_threshold: config.alert_threshold(trend.impact),
                message: format!(
                    "Strong {} trend detected: {} ({} impact)",
                    trend.direction, trend.name, trend.impact
                ),
                recommendations: to_owned(STRONG_RECOMMENDATIONS),
                triggered_at: now,
                expires_at: now + Duration::days(config.alerts.strong_expiry_days),
            });
        }

        if !alerts.is_empty() {
            tracing::info!(
                category = %trend.category,
                trend_id = %trend.id,
                count = alerts.len(),
                "alerts generated"
            );
        }
        alerts
    }
}

fn to_owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}
