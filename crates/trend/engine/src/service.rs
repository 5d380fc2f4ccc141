//! Background scheduling around a [`DetectionEngine`].
//!
//! ```text
//!   add_data_point ──(count > min_data_points, debounced)──┐
//!   sweep loop (every sweep_interval_secs) ────────────────┼─► worker pool ─► detect_trends(category, trend_window_days)
//!   submit_detection ──────────────────────────────────────┘   (max_workers, blocking threads)
//!   eviction loop (every eviction_interval_secs) ─► evict_expired
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use trend_types::Metadata;

use crate::engine::DetectionEngine;
use crate::error::{EngineError, EngineResult};

/// Runs detection on a bounded pool of blocking threads. Every run looks
/// back `detection.trend_window_days` from now.
#[derive(Clone)]
struct Dispatcher {
    engine: Arc<DetectionEngine>,
    workers: Arc<Semaphore>,
    runtime: Handle,
}

impl Dispatcher {
    fn submit(&self, category: String) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let workers = Arc::clone(&self.workers);
        self.runtime.spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };
            let target = category.clone();
            let window = engine.config().detection.trend_window_days;
            let result = tokio::task::spawn_blocking(move || {
                engine.detect_trends(Some(&target), Some(window))
            })
            .await;
            match result {
                Ok(Ok(trends)) => {
                    tracing::debug!(
                        category = %category,
                        trends = trends.len(),
                        "background detection finished"
                    );
                }
                Ok(Err(EngineError::ShutDown)) => {
                    tracing::debug!(category = %category, "engine shut down before detection ran");
                }
                Ok(Err(e)) => {
                    tracing::error!(category = %category, error = %e, "background detection failed");
                }
                Err(e) => {
                    tracing::error!(category = %category, error = %e, "detection task aborted");
                }
            }
        })
    }

    fn sweep(&self) -> EngineResult<Vec<JoinHandle<()>>> {
        let categories = self.engine.categories()?;
        tracing::info!(categories = categories.len(), "starting detection sweep");
        Ok(categories.into_iter().map(|c| self.submit(c)).collect())
    }
}

/// Background service: debounced real-time triggers, the periodic sweep and
/// cache eviction.
///
/// Must be started from within a tokio runtime; its methods may then be
/// called from any thread.
pub struct TrendService {
    dispatcher: Dispatcher,
    debounce: Duration,
    last_trigger: Mutex<HashMap<String, Instant>>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
    loops: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl TrendService {
    /// Spawn the sweep and eviction loops.
    pub fn start(engine: Arc<DetectionEngine>) -> Self {
        let scheduler = engine.config().scheduler.clone();
        let dispatcher = Dispatcher {
            workers: Arc::new(Semaphore::new(scheduler.max_workers)),
            runtime: Handle::current(),
            engine,
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Spawn sweep loop
        let sweep_dispatcher = dispatcher.clone();
        let mut sweep_shutdown = shutdown_rx.clone();
        let sweep_period = Duration::from_secs(scheduler.sweep_interval_secs);
        let sweep_handle = tokio::spawn(async move {
            let mut ticker = interval(sweep_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = sweep_shutdown.changed() => break,
                }
                if *sweep_shutdown.borrow() {
                    break;
                }
                match sweep_dispatcher.sweep() {
                    Ok(runs) => {
                        for run in runs {
                            let _ = run.await;
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "detection sweep failed"),
                }
            }
            tracing::debug!("sweep loop stopped");
        });

        // Spawn eviction loop
        let eviction_engine = Arc::clone(&dispatcher.engine);
        let mut eviction_shutdown = shutdown_rx;
        let eviction_period = Duration::from_secs(scheduler.eviction_interval_secs);
        let eviction_handle = tokio::spawn(async move {
            let mut ticker = interval(eviction_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = eviction_shutdown.changed() => break,
                }
                if *eviction_shutdown.borrow() {
                    break;
                }
                if let Err(e) = eviction_engine.evict_expired() {
                    tracing::error!(error = %e, "cache eviction failed");
                }
            }
            tracing::debug!("eviction loop stopped");
        });

        tracing::info!(
            max_workers = scheduler.max_workers,
            sweep_interval_secs = scheduler.sweep_interval_secs,
            eviction_interval_secs = scheduler.eviction_interval_secs,
            trigger_debounce_ms = scheduler.trigger_debounce_ms,
            "trend service started"
        );

        Self {
            dispatcher,
            debounce: Duration::from_millis(scheduler.trigger_debounce_ms),
            last_trigger: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(Vec::new()),
            loops: Mutex::new(vec![sweep_handle, eviction_handle]),
            shutdown_tx,
        }
    }

    pub fn engine(&self) -> &Arc<DetectionEngine> {
        &self.dispatcher.engine
    }

    /// Ingest a point and, once the category holds more than
    /// `min_data_points` points, queue a detection run for it unless one was
    /// queued within the debounce window.
    pub fn add_data_point(
        &self,
        timestamp: DateTime<Utc>,
        value: f64,
        source: &str,
        category: &str,
        metadata: Option<Metadata>,
    ) -> EngineResult<usize> {
        let engine = &self.dispatcher.engine;
        let count = engine.add_data_point(timestamp, value, source, category, metadata)?;
        if count > engine.config().detection.min_data_points {
            self.trigger(category.trim())?;
        }
        Ok(count)
    }

    /// Queue a detection run for `category` without debouncing.
    pub fn submit_detection(&self, category: &str) -> EngineResult<()> {
        let run = self.dispatcher.submit(category.trim().to_string());
        self.track(run)
    }

    /// Queue a run for every known category. Returns how many were queued.
    pub fn run_sweep(&self) -> EngineResult<usize> {
        let runs = self.dispatcher.sweep()?;
        let queued = runs.len();
        for run in runs {
            self.track(run)?;
        }
        Ok(queued)
    }

    /// Wait for every run queued so far to finish.
    pub async fn wait_idle(&self) -> EngineResult<()> {
        let runs = std::mem::take(
            &mut *self
                .in_flight
                .lock()
                .map_err(|_| EngineError::LockPoisoned)?,
        );
        for run in runs {
            let _ = run.await;
        }
        Ok(())
    }

    /// Stop both loops, let queued runs finish, then shut the engine down.
    pub async fn shutdown(&self) -> EngineResult<()> {
        let _ = self.shutdown_tx.send(true);
        let loops = std::mem::take(
            &mut *self.loops.lock().map_err(|_| EngineError::LockPoisoned)?,
        );
        for handle in loops {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "background loop ended abnormally");
            }
        }
        self.wait_idle().await?;
        self.dispatcher.workers.close();
        // Joins the writer thread.
        let engine = Arc::clone(&self.dispatcher.engine);
        tokio::task::spawn_blocking(move || engine.shutdown())
            .await
            .map_err(|e| EngineError::Persistence(format!("engine shutdown task failed: {e}")))??;
        tracing::info!("trend service stopped");
        Ok(())
    }

    fn trigger(&self, category: &str) -> EngineResult<()> {
        if !self.debounce.is_zero() {
            let mut last = self
                .last_trigger
                .lock()
                .map_err(|_| EngineError::LockPoisoned)?;
            let now = Instant::now();
            if let Some(previous) = last.get(category) {
                if now.duration_since(*previous) < self.debounce {
                    self.dispatcher.engine.record_debounced_trigger();
                    tracing::trace!(category = %category, "detection trigger debounced");
                    return Ok(());
                }
            }
            last.insert(category.to_string(), now);
        }
        let run = self.dispatcher.submit(category.to_string());
        self.track(run)
    }

    fn track(&self, run: JoinHandle<()>) -> EngineResult<()> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| EngineError::LockPoisoned)?;
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(run);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::InMemoryStore;
    use chrono::Duration as ChronoDuration;

    fn service(debounce_ms: u64) -> TrendService {
        let mut config = EngineConfig::default();
        config.scheduler.trigger_debounce_ms = debounce_ms;
        let engine = DetectionEngine::new(config, Arc::new(InMemoryStore::new())).unwrap();
        TrendService::start(Arc::new(engine))
    }

    fn ingest(service: &TrendService, category: &str, count: i64) {
        let start = Utc::now() - ChronoDuration::days(count);
        for day in 0..count {
            service
                .add_data_point(
                    start + ChronoDuration::days(day),
                    50.0 + 3.0 * day as f64,
                    "sensor",
                    category,
                    None,
                )
                .unwrap();
        }
    }

    #[tokio::test]
    async fn every_point_past_threshold_triggers_without_debounce() {
        let service = service(0);
        ingest(&service, "X", 12);
        service.wait_idle().await.unwrap();

        let stats = service.engine().get_system_statistics();
        assert_eq!(stats.detection_runs, 2);
        assert_eq!(stats.debounced_triggers, 0);
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn debounce_coalesces_bursts() {
        let service = service(60_000);
        ingest(&service, "X", 15);
        service.wait_idle().await.unwrap();

        let stats = service.engine().get_system_statistics();
        assert_eq!(stats.detection_runs, 1);
        assert_eq!(stats.debounced_triggers, 4);
        assert!(!service.engine().latest_trends("X").unwrap().is_empty());
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn sweep_covers_every_category() {
        let service = service(0);
        for category in ["A", "B"] {
            let engine = service.engine();
            for day in 0..5 {
                engine
                    .add_data_point(Utc::now(), day as f64, "sensor", category, None)
                    .unwrap();
            }
        }
        assert_eq!(service.run_sweep().unwrap(), 2);
        service.wait_idle().await.unwrap();
        assert_eq!(service.engine().get_system_statistics().detection_runs, 2);
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn explicit_submission_runs_detection() {
        let service = service(0);
        let engine = service.engine();
        let start = Utc::now() - ChronoDuration::days(30);
        for day in 0..30 {
            engine
                .add_data_point(start + ChronoDuration::days(day), day as f64 * 4.0, "s", "X", None)
                .unwrap();
        }
        service.submit_detection("X").unwrap();
        service.wait_idle().await.unwrap();
        assert_eq!(engine.get_system_statistics().detection_runs, 1);
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn background_runs_ignore_points_outside_the_window() {
        let mut config = EngineConfig::default();
        config.scheduler.trigger_debounce_ms = 0;
        config.detection.trend_window_days = 5;
        let engine = DetectionEngine::new(config, Arc::new(InMemoryStore::new())).unwrap();
        let service = TrendService::start(Arc::new(engine));
        let engine = service.engine();
        let start = Utc::now() - ChronoDuration::days(40);
        for day in 0..40 {
            engine
                .add_data_point(start + ChronoDuration::days(day), day as f64 * 4.0, "s", "X", None)
                .unwrap();
        }

        service.submit_detection("X").unwrap();
        service.wait_idle().await.unwrap();
        assert_eq!(engine.get_system_statistics().detection_runs, 1);
        // Five days of points are below min_data_points.
        assert!(engine.latest_trends("X").unwrap().is_empty());

        assert!(!engine.detect_trends(Some("X"), None).unwrap().is_empty());
        service.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_drains_writes_from_a_worker_thread() {
        let store = Arc::new(InMemoryStore::new());
        let engine = DetectionEngine::new(EngineConfig::default(), store.clone()).unwrap();
        let service = TrendService::start(Arc::new(engine));
        for day in 0..5 {
            service
                .add_data_point(Utc::now(), day as f64, "sensor", "X", None)
                .unwrap();
        }
        service.shutdown().await.unwrap();
        assert!(service.engine().is_shut_down());
        assert_eq!(store.count(crate::store::EntityKind::Point).unwrap(), 5);
    }

    #[tokio::test]
    async fn shutdown_stops_ingestion() {
        let service = service(0);
        service.shutdown().await.unwrap();
        assert!(service.engine().is_shut_down());
        assert!(matches!(
            service.add_data_point(Utc::now(), 1.0, "sensor", "X", None),
            Err(EngineError::ShutDown)
        ));
    }
}
