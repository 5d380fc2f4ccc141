//! Merging of candidate trends that describe the same phenomenon.
//!
//! Candidates are grouped by `(category, type, direction)` when their start
//! dates lie within the consolidation window of the group's earliest member.
//! A group of one passes through untouched; larger groups collapse into a new
//! trend.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use serde_json::json;
use trend_types::{DetectedTrend, Metadata, TrendId};

use crate::algorithms::ALGORITHMS_KEY;

/// Metadata key listing the ids of merged candidates.
pub const SOURCE_IDS_KEY: &str = "source_trend_ids";
/// Metadata key holding the number of merged candidates.
pub const MERGED_COUNT_KEY: &str = "merged_count";

#[derive(Clone, Debug)]
pub struct TrendConsolidator {
    window: Duration,
}

impl TrendConsolidator {
    pub fn new(window_days: i64) -> Self {
        Self {
            window: Duration::days(window_days),
        }
    }

    pub fn consolidate(&self, candidates: Vec<DetectedTrend>) -> Vec<DetectedTrend> {
        let mut sorted = candidates;
        sorted.sort_by_key(|t| t.start_date);

        let mut groups: Vec<Vec<DetectedTrend>> = Vec::new();
        for trend in sorted {
            let slot = groups.iter_mut().find(|group| {
                let head = &group[0];
                head.category == trend.category
                    && head.trend_type == trend.trend_type
                    && head.direction == trend.direction
                    && trend.start_date - head.start_date < self.window
            });
            match slot {
                Some(group) => group.push(trend),
                None => groups.push(vec![trend]),
            }
        }

        groups.into_iter().filter_map(merge_group).collect()
    }
}

impl Default for TrendConsolidator {
    fn default() -> Self {
        Self::new(7)
    }
}

/// Collapse one group. A single member is returned as is.
pub fn merge_group(mut group: Vec<DetectedTrend>) -> Option<DetectedTrend> {
    if group.len() <= 1 {
        return group.pop();
    }
    let count = group.len() as f64;

    let lead = group
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))?
        .clone();

    let confidence = group.iter().map(|t| t.confidence).sum::<f64>() / count;
    let supporting_point_count = group.iter().map(|t| t.supporting_point_count).sum();
    let strength = group.iter().map(|t| t.strength).max()?;
    let impact = group.iter().map(|t| t.impact).max()?;
    let start_date = group.iter().map(|t| t.start_date).min()?;
    let detection_date = group.iter().map(|t| t.detection_date).max()?;

    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for trend in &group {
        for (factor, value) in &trend.correlation_factors {
            let entry = sums.entry(factor.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    let correlation_factors = sums
        .into_iter()
        .map(|(factor, (sum, n))| (factor, sum / n as f64))
        .collect();

    let mut indicators: Vec<String> = Vec::new();
    for indicator in group.iter().flat_map(|t| &t.key_indicators) {
        if !indicators.contains(indicator) {
            indicators.push(indicator.clone());
        }
    }

    let algorithms: BTreeSet<String> = group
        .iter()
        .filter_map(|t| t.metadata.get(ALGORITHMS_KEY))
        .filter_map(|v| v.as_array())
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    let source_ids: Vec<&str> = group.iter().map(|t| t.id.as_str()).collect();

    let mut metadata: Metadata = lead.metadata.clone();
    metadata.insert(ALGORITHMS_KEY.into(), json!(algorithms));
    metadata.insert(SOURCE_IDS_KEY.into(), json!(source_ids));
    metadata.insert(MERGED_COUNT_KEY.into(), json!(group.len()));

    let merged = DetectedTrend {
        id: TrendId::new(),
        name: lead.name,
        category: lead.category,
        trend_type: lead.trend_type,
        direction: lead.direction,
        strength,
        impact,
        confidence,
        start_date,
        detection_date,
        supporting_point_count,
        key_indicators: indicators,
        correlation_factors,
        patterns: Vec::new(),
        forecasts: Vec::new(),
        alerts: Vec::new(),
        metadata,
    };
    tracing::debug!(
        category = %merged.category,
        direction = %merged.direction,
        merged = group.len(),
        "merged candidate trends"
    );
    Some(merged)
}
