//! The detection engine: owns the point buffer, the result cache and the
//! persistence writer, and runs detection passes on demand.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use trend_detection::DetectionPipeline;
use trend_types::{DataPoint, DetectedTrend, Metadata, TrendId};

use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::points::PointStore;
use crate::store::{EntityKind, StoredEntity, TrendStore};
use crate::summary::{GlobalSummary, SystemStatistics, TrendDetail, TrendSummary};
use crate::writer::PersistenceWriter;

#[derive(Default)]
struct Counters {
    points: AtomicU64,
    trends: AtomicU64,
    patterns: AtomicU64,
    alerts: AtomicU64,
    forecasts: AtomicU64,
    runs: AtomicU64,
    processing_micros: AtomicU64,
    algorithm_failures: AtomicU64,
    submit_failures: AtomicU64,
    debounced_triggers: AtomicU64,
}

/// Owns all engine state. Share it behind an `Arc`; every method takes
/// `&self`.
///
/// Ingestion and detection are rejected with [`EngineError::ShutDown`] once
/// [`shutdown`](Self::shutdown) has run. Read-side queries keep working.
pub struct DetectionEngine {
    config: EngineConfig,
    pipeline: DetectionPipeline,
    points: PointStore,
    cache: ResultCache,
    store: Arc<dyn TrendStore>,
    writer: PersistenceWriter,
    counters: Counters,
    shut_down: AtomicBool,
}

impl DetectionEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn TrendStore>) -> EngineResult<Self> {
        config.validate()?;
        let pipeline = DetectionPipeline::new(config.detection.clone())?;
        let writer = PersistenceWriter::spawn(Arc::clone(&store))?;

        tracing::info!(
            algorithms = pipeline.algorithm_count(),
            min_data_points = config.detection.min_data_points,
            confidence_threshold = config.detection.confidence_threshold,
            "detection engine created"
        );

        Ok(Self {
            points: PointStore::new(config.storage.max_points_per_category),
            cache: ResultCache::new(),
            pipeline,
            store,
            writer,
            counters: Counters::default(),
            shut_down: AtomicBool::new(false),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Ingestion ───────────────────────────────────────────────────────

    /// Buffer one observation and queue it for persistence.
    ///
    /// Returns the category's buffered point count after insertion.
    pub fn add_data_point(
        &self,
        timestamp: DateTime<Utc>,
        value: f64,
        source: &str,
        category: &str,
        metadata: Option<Metadata>,
    ) -> EngineResult<usize> {
        self.ensure_running()?;
        if !value.is_finite() {
            return Err(EngineError::Validation(format!(
                "value {value} is not finite"
            )));
        }
        if source.trim().is_empty() {
            return Err(EngineError::Validation("source must not be empty".into()));
        }
        let category = validate_category(category)?;

        let point = DataPoint::new(timestamp, value, source, category)
            .with_metadata(metadata.unwrap_or_default());
        let count = self.points.insert(point.clone())?;
        self.counters.points.fetch_add(1, Ordering::Relaxed);
        self.persist(vec![StoredEntity::Point(point)]);

        tracing::trace!(category = %category, count, "data point added");
        Ok(count)
    }

    /// Like [`add_data_point`](Self::add_data_point) with an RFC 3339
    /// timestamp.
    pub fn add_raw_data_point(
        &self,
        timestamp: &str,
        value: f64,
        source: &str,
        category: &str,
        metadata: Option<Metadata>,
    ) -> EngineResult<usize> {
        let parsed = DateTime::parse_from_rfc3339(timestamp.trim())
            .map_err(|e| {
                EngineError::Validation(format!("malformed timestamp {timestamp:?}: {e}"))
            })?
            .with_timezone(&Utc);
        self.add_data_point(parsed, value, source, category, metadata)
    }

    /// Reload points recorded during the last `window_days` days from the
    /// store into the buffer. Returns how many were restored.
    pub fn restore_points(&self, window_days: i64) -> EngineResult<usize> {
        self.ensure_running()?;
        if window_days <= 0 {
            return Err(EngineError::InvalidWindow { days: window_days });
        }
        let since = window_start(window_days).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let loaded = self.store.load_recent(EntityKind::Point, since)?;
        let restored = self.points.extend(loaded.into_iter().filter_map(|e| match e {
            StoredEntity::Point(p) => Some(p),
            _ => None,
        }))?;
        tracing::info!(restored, window_days, "restored points from store");
        Ok(restored)
    }

    // ── Detection ───────────────────────────────────────────────────────

    /// Run detection over one category, or over every known category when
    /// `category` is `None`. `window_days` keeps only points observed within
    /// that many days before now; a window reaching past the earliest
    /// representable time keeps every point.
    ///
    /// Too little data gives an empty list, never an error. Persisting the
    /// results is best-effort and does not affect the returned trends.
    pub fn detect_trends(
        &self,
        category: Option<&str>,
        window_days: Option<i64>,
    ) -> EngineResult<Vec<DetectedTrend>> {
        self.ensure_running()?;
        let since = match window_days {
            Some(days) if days <= 0 => return Err(EngineError::InvalidWindow { days }),
            Some(days) => window_start(days),
            None => None,
        };
        let categories = match category {
            Some(c) => vec![validate_category(c)?.to_string()],
            None => self.points.categories()?,
        };

        let mut trends = Vec::new();
        for category in &categories {
            trends.extend(self.detect_category(category, since)?);
        }
        Ok(trends)
    }

    fn detect_category(
        &self,
        category: &str,
        since: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<DetectedTrend>> {
        let started = Instant::now();
        let Some(series) = self.points.series(category, since)? else {
            tracing::debug!(category = %category, "no points for category");
            return Ok(Vec::new());
        };

        let outcome = self
            .pipeline
            .run(&series, self.config.category_type(category))?;
        let elapsed = started.elapsed();

        let c = &self.counters;
        c.runs.fetch_add(1, Ordering::Relaxed);
        c.processing_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        c.algorithm_failures
            .fetch_add(outcome.failures.len() as u64, Ordering::Relaxed);
        c.trends
            .fetch_add(outcome.trends.len() as u64, Ordering::Relaxed);
        c.patterns
            .fetch_add(outcome.pattern_count() as u64, Ordering::Relaxed);
        c.forecasts
            .fetch_add(outcome.forecast_count() as u64, Ordering::Relaxed);
        c.alerts
            .fetch_add(outcome.alert_count() as u64, Ordering::Relaxed);

        self.cache.record_run(category, &outcome.trends, Utc::now())?;
        self.persist(
            outcome
                .trends
                .iter()
                .flat_map(StoredEntity::from_trend)
                .collect(),
        );

        tracing::info!(
            category = %category,
            points = series.len(),
            candidates = outcome.candidate_count,
            trends = outcome.trends.len(),
            failures = outcome.failures.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "detection run finished"
        );
        Ok(outcome.trends)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Detail of one cached trend, or the aggregate over all cached trends.
    pub fn get_trend_summary(&self, trend_id: Option<&TrendId>) -> EngineResult<TrendSummary> {
        let now = Utc::now();
        match trend_id {
            Some(id) => {
                let trend = self
                    .cache
                    .get(id)?
                    .ok_or_else(|| EngineError::TrendNotFound(id.clone()))?;
                Ok(TrendSummary::Trend(TrendDetail::new(trend, now)))
            }
            None => {
                let trends = self.cache.all()?;
                Ok(TrendSummary::Global(GlobalSummary::from_trends(
                    &trends,
                    self.points.categories()?,
                    now,
                )))
            }
        }
    }

    pub fn get_system_statistics(&self) -> SystemStatistics {
        let c = &self.counters;
        let runs = c.runs.load(Ordering::Relaxed);
        let avg_processing_time_ms = if runs == 0 {
            0.0
        } else {
            c.processing_micros.load(Ordering::Relaxed) as f64 / runs as f64 / 1000.0
        };
        SystemStatistics {
            total_data_points: c.points.load(Ordering::Relaxed),
            trends_detected: c.trends.load(Ordering::Relaxed),
            patterns_identified: c.patterns.load(Ordering::Relaxed),
            alerts_generated: c.alerts.load(Ordering::Relaxed),
            forecasts_created: c.forecasts.load(Ordering::Relaxed),
            avg_processing_time_ms,
            detection_runs: runs,
            algorithm_failures: c.algorithm_failures.load(Ordering::Relaxed),
            persistence_failures: c.submit_failures.load(Ordering::Relaxed)
                + self.writer.failures(),
            debounced_triggers: c.debounced_triggers.load(Ordering::Relaxed),
            categories_tracked: self.points.categories().map_or(0, |c| c.len()),
        }
    }

    /// Known categories, sorted.
    pub fn categories(&self) -> EngineResult<Vec<String>> {
        self.points.categories()
    }

    /// Buffered point count of `category`.
    pub fn point_count(&self, category: &str) -> EngineResult<usize> {
        self.points.count(category)
    }

    /// Trends of the most recent run over `category`.
    pub fn latest_trends(&self, category: &str) -> EngineResult<Vec<DetectedTrend>> {
        self.cache.latest(category)
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Drop cached trends older than `cache_ttl_secs`.
    pub fn evict_expired(&self) -> EngineResult<usize> {
        let cutoff = i64::try_from(self.config.scheduler.cache_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl));
        let Some(cutoff) = cutoff else {
            return Ok(0);
        };
        let evicted = self.cache.evict_before(cutoff)?;
        if evicted > 0 {
            tracing::debug!(evicted, "evicted expired trends from cache");
        }
        Ok(evicted)
    }

    /// Block until queued records reach the store.
    pub fn flush(&self) -> EngineResult<()> {
        self.writer.flush()
    }

    /// Drain pending writes and stop the writer thread. Idempotent.
    pub fn shutdown(&self) -> EngineResult<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.writer.shutdown()?;
        tracing::info!(
            written = self.writer.written(),
            failed = self.writer.failures(),
            "detection engine shut down"
        );
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub(crate) fn record_debounced_trigger(&self) {
        self.counters
            .debounced_triggers
            .fetch_add(1, Ordering::Relaxed);
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }
        Ok(())
    }

    fn persist(&self, entities: Vec<StoredEntity>) {
        if let Err(e) = self.writer.submit(entities) {
            self.counters.submit_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "could not queue records for persistence");
        }
    }
}

/// `days` days before now, or `None` when that lies outside chrono's range.
fn window_start(days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|window| Utc::now().checked_sub_signed(window))
}

fn validate_category(category: &str) -> EngineResult<&str> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidCategory(
            "category must not be empty".into(),
        ));
    }
    Ok(trimmed)
}
