//! # trend-detection
//!
//! The numerical layer of the trend engine: five detection strategies, the
//! consolidator that merges their candidates, and the enrichment stages that
//! attach patterns, forecasts and alerts.
//!
//! ```text
//!   TimeSeries
//!       │
//!       ├─► LinearTrend      (OLS drift)
//!       ├─► SeasonalTrend    (DFT dominant period)
//!       ├─► CyclicalTrend    (autocorrelation peak)
//!       ├─► BreakpointTrend  (Welch t-test over adjacent windows)
//!       └─► VolatilityTrend  (rolling coefficient of variation)
//!               │
//!               ▼
//!       TrendConsolidator ─► PatternIdentifier ─► LinearForecaster ─► AlertGenerator
//! ```
//!
//! Nothing in this crate performs I/O or holds shared state; every stage is a
//! function of its inputs and a [`DetectionConfig`].

#![deny(unsafe_code)]

pub mod alerts;
pub mod algorithms;
pub mod config;
pub mod consolidation;
pub mod error;
pub mod forecast;
pub mod patterns;
pub mod pipeline;
pub mod series;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use alerts::AlertGenerator;
pub use algorithms::{
    default_algorithms, AlgorithmKind, BreakpointTrend, CyclicalTrend, LinearTrend, SeasonalTrend,
    TrendAlgorithm, VolatilityTrend,
};
pub use config::{
    AlertParams, BreakpointParams, CyclicalParams, DetectionConfig, LinearParams,
    MultipleTesting, PatternParams, SeasonalParams, VolatilityParams,
};
pub use consolidation::TrendConsolidator;
pub use error::{DetectionError, DetectionResult};
pub use forecast::LinearForecaster;
pub use patterns::PatternIdentifier;
pub use pipeline::{DetectionPipeline, PipelineOutcome};
pub use series::TimeSeries;
