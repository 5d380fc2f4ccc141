//! One detection pass over one category's series.
//!
//! ```text
//!   series ─► 5 algorithms ─► consolidate ─► per trend: patterns ─► forecast ─► alerts
//! ```

use trend_types::{DetectedTrend, TrendType};

use crate::alerts::AlertGenerator;
use crate::algorithms::{default_algorithms, TrendAlgorithm};
use crate::config::DetectionConfig;
use crate::consolidation::TrendConsolidator;
use crate::error::{DetectionError, DetectionResult};
use crate::forecast::LinearForecaster;
use crate::patterns::PatternIdentifier;
use crate::series::TimeSeries;

/// Result of a pass: the enriched trends plus the algorithm failures that
/// were tolerated along the way.
#[derive(Clone, Debug, Default)]
pub struct PipelineOutcome {
    pub trends: Vec<DetectedTrend>,
    /// Candidates produced by the algorithms before consolidation.
    pub candidate_count: usize,
    pub failures: Vec<DetectionError>,
}

impl PipelineOutcome {
    pub fn pattern_count(&self) -> usize {
        self.trends.iter().map(|t| t.patterns.len()).sum()
    }

    pub fn forecast_count(&self) -> usize {
        self.trends.iter().map(|t| t.forecasts.len()).sum()
    }

    pub fn alert_count(&self) -> usize {
        self.trends.iter().map(|t| t.alerts.len()).sum()
    }
}

pub struct DetectionPipeline {
    config: DetectionConfig,
    algorithms: Vec<Box<dyn TrendAlgorithm>>,
    consolidator: TrendConsolidator,
    patterns: PatternIdentifier,
    forecaster: LinearForecaster,
    alerts: AlertGenerator,
}

impl DetectionPipeline {
    /// Pipeline with all five algorithms.
    pub fn new(config: DetectionConfig) -> DetectionResult<Self> {
        Self::with_algorithms(config, default_algorithms())
    }

    /// Pipeline with a custom algorithm list, run in the given order.
    pub fn with_algorithms(
        config: DetectionConfig,
        algorithms: Vec<Box<dyn TrendAlgorithm>>,
    ) -> DetectionResult<Self> {
        config.validate()?;
        Ok(Self {
            consolidator: TrendConsolidator::new(config.consolidation_window_days),
            config,
            algorithms,
            patterns: PatternIdentifier,
            forecaster: LinearForecaster,
            alerts: AlertGenerator,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn algorithm_count(&self) -> usize {
        self.algorithms.len()
    }

    /// Run every stage over `series`.
    ///
    /// `trend_type` replaces the per-algorithm default type on every
    /// candidate before consolidation. A series shorter than
    /// `min_data_points` gives an empty outcome. A failing algorithm is
    /// logged and recorded, and the remaining ones still run.
    pub fn run(
        &self,
        series: &TimeSeries,
        trend_type: Option<TrendType>,
    ) -> DetectionResult<PipelineOutcome> {
        series.ensure_finite()?;
        let mut outcome = PipelineOutcome::default();
        if series.len() < self.config.min_data_points {
            tracing::debug!(
                category = %series.category(),
                points = series.len(),
                required = self.config.min_data_points,
                "not enough points for detection"
            );
            return Ok(outcome);
        }

        let mut candidates = Vec::new();
        for algorithm in &self.algorithms {
            match algorithm.detect(series, &self.config) {
                Ok(found) => {
                    tracing::debug!(
                        algorithm = %algorithm.kind(),
                        category = %series.category(),
                        candidates = found.len(),
                        "algorithm finished"
                    );
                    candidates.extend(found);
                }
                Err(e) => {
                    tracing::warn!(
                        algorithm = %algorithm.kind(),
                        category = %series.category(),
                        error = %e,
                        "algorithm failed, continuing with the others"
                    );
                    outcome.failures.push(e);
                }
            }
        }
        if let Some(trend_type) = trend_type {
            for candidate in &mut candidates {
                candidate.trend_type = trend_type;
            }
        }
        outcome.candidate_count = candidates.len();

        let mut trends = self.consolidator.consolidate(candidates);
        trends.retain(|t| t.confidence >= self.config.confidence_threshold);
        for trend in &mut trends {
            trend.patterns = self.patterns.identify(trend, series, &self.config);
            trend.forecasts = self
                .forecaster
                .forecast(trend, series, &self.config)
                .into_iter()
                .collect();
            trend.alerts = self.alerts.generate(trend, &self.config);
        }
        outcome.trends = trends;
        Ok(outcome)
    }
}
