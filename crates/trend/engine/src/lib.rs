//! # trend-engine
//!
//! Stateful side of the trend detector: buffers observations per category,
//! runs [`trend_detection`] passes over them, caches and persists the
//! results, and schedules background work.
//!
//! ```text
//!   add_data_point ─► PointStore ─┐
//!                                 ├─► DetectionPipeline ─► ResultCache
//!   detect_trends ────────────────┘          │
//!                                            ▼
//!                       PersistenceWriter ─► TrendStore (memory | JSON lines)
//! ```
//!
//! [`DetectionEngine`] is synchronous and usable on its own.
//! [`TrendService`] wraps it for a tokio host: a bounded worker pool,
//! debounced ingestion triggers, an hourly sweep and cache eviction.

#![deny(unsafe_code)]

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod points;
pub mod service;
pub mod store;
pub mod summary;
pub mod writer;

pub use cache::ResultCache;
pub use config::{EngineConfig, LoggingConfig, SchedulerConfig, StorageBackend, StorageConfig};
pub use engine::DetectionEngine;
pub use error::{EngineError, EngineResult};
pub use points::PointStore;
pub use service::TrendService;
pub use store::{open_store, EntityKind, InMemoryStore, JsonLinesStore, StoredEntity, TrendStore};
pub use summary::{GlobalSummary, SystemStatistics, TrendDetail, TrendSummary};
pub use writer::PersistenceWriter;
