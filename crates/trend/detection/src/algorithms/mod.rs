//! The five detection strategies.
//!
//! Each strategy is a pure function of a series and the detection parameters.
//! Too little data yields an empty list; candidates below the confidence
//! threshold are dropped before they leave the strategy.

mod breakpoint;
mod cyclical;
mod linear;
mod seasonal;
mod volatility;

use std::fmt;

use serde::{Deserialize, Serialize};
use trend_types::{DetectedTrend, TrendType};

use crate::config::DetectionConfig;
use crate::error::DetectionResult;
use crate::series::TimeSeries;

pub(crate) use cyclical::first_cycle;

pub use breakpoint::BreakpointTrend;
pub use cyclical::CyclicalTrend;
pub use linear::LinearTrend;
pub use seasonal::SeasonalTrend;
pub use volatility::VolatilityTrend;

/// Metadata key listing the strategies that produced a trend.
pub const ALGORITHMS_KEY: &str = "algorithms";

// ── Trait ────────────────────────────────────────────────────────────────

/// One detection strategy.
pub trait TrendAlgorithm: Send + Sync {
    fn kind(&self) -> AlgorithmKind;

    /// Candidate trends found in `series`. Every returned trend has a
    /// confidence of at least `config.confidence_threshold`.
    fn detect(
        &self,
        series: &TimeSeries,
        config: &DetectionConfig,
    ) -> DetectionResult<Vec<DetectedTrend>>;
}

/// The closed set of strategies, in their fixed execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Linear,
    Seasonal,
    Cyclical,
    Breakpoint,
    Volatility,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 5] = [
        Self::Linear,
        Self::Seasonal,
        Self::Cyclical,
        Self::Breakpoint,
        Self::Volatility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Seasonal => "seasonal",
            Self::Cyclical => "cyclical",
            Self::Breakpoint => "breakpoint",
            Self::Volatility => "volatility",
        }
    }

    /// Type stamped on trends when the category has no configured type.
    pub fn default_trend_type(&self) -> TrendType {
        match self {
            Self::Linear => TrendType::Market,
            Self::Seasonal => TrendType::Business,
            Self::Cyclical => TrendType::Financial,
            Self::Breakpoint => TrendType::Strategic,
            Self::Volatility => TrendType::Financial,
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All five strategies in execution order.
pub fn default_algorithms() -> Vec<Box<dyn TrendAlgorithm>> {
    vec![
        Box::new(LinearTrend),
        Box::new(SeasonalTrend),
        Box::new(CyclicalTrend),
        Box::new(BreakpointTrend),
        Box::new(VolatilityTrend),
    ]
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Skeleton trend for `kind` over the whole series.
fn candidate(
    kind: AlgorithmKind,
    name: String,
    series: &TimeSeries,
    direction: trend_types::TrendDirection,
) -> Option<DetectedTrend> {
    let start = series.first_timestamp()?;
    Some(
        DetectedTrend::new(
            name,
            series.category(),
            kind.default_trend_type(),
            direction,
            start,
            series.len(),
        )
        .with_metadata(ALGORITHMS_KEY, serde_json::json!([kind.as_str()])),
    )
}

/// Apply the confidence floor to a finished candidate.
fn accept(
    kind: AlgorithmKind,
    trend: DetectedTrend,
    config: &DetectionConfig,
) -> Vec<DetectedTrend> {
    if trend.confidence < config.confidence_threshold {
        tracing::debug!(
            algorithm = %kind,
            category = %trend.category,
            confidence = trend.confidence,
            threshold = config.confidence_threshold,
            "candidate below confidence threshold"
        );
        return vec![];
    }
    tracing::debug!(
        algorithm = %kind,
        category = %trend.category,
        direction = %trend.direction,
        confidence = trend.confidence,
        "candidate accepted"
    );
    vec![trend]
}
