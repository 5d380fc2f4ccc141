//! # trend-types
//!
//! Data model shared by the trend-detection engine.
//!
//! ```text
//!   DataPoint (per category, time ordered)
//!       │
//!       ▼  five detection algorithms + consolidation
//!   DetectedTrend ──┬── TrendPattern   (acceleration / stabilization / recurrence)
//!                   ├── TrendForecast  (linear projection with confidence band)
//!                   └── TrendAlert     (time-boxed, advisory)
//! ```
//!
//! A `DetectedTrend` is a point-in-time snapshot: it is created by a detection
//! run, enriched with patterns, forecasts and alerts during that same run, and
//! never mutated afterwards. A later run produces a new trend with a new id.

#![deny(unsafe_code)]

pub mod classification;
pub mod error;
pub mod ids;
pub mod point;
pub mod trend;

pub use classification::{
    AlertType, PatternType, TrendDirection, TrendImpact, TrendStrength, TrendType,
};
pub use error::TypesError;
pub use ids::{AlertId, ForecastId, PatternId, TrendId};
pub use point::{DataPoint, Metadata};
pub use trend::{DetectedTrend, TrendAlert, TrendForecast, TrendPattern};
