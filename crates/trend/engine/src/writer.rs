//! Dedicated persistence thread.
//!
//! Detection workers hand records to the writer and move on; only the
//! writer thread ever blocks on the store. A failed save is logged and
//! counted, never reported back to the submitter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use crate::error::{EngineError, EngineResult};
use crate::store::{StoredEntity, TrendStore};

enum Command {
    Save(Vec<StoredEntity>),
    Flush(mpsc::Sender<()>),
}

#[derive(Default)]
struct WriterCounters {
    written: AtomicU64,
    failed: AtomicU64,
}

pub struct PersistenceWriter {
    sender: Mutex<Option<mpsc::Sender<Command>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<WriterCounters>,
}

impl PersistenceWriter {
    /// Spawn the writer thread over `store`.
    pub fn spawn(store: Arc<dyn TrendStore>) -> EngineResult<Self> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let counters = Arc::new(WriterCounters::default());
        let thread_counters = Arc::clone(&counters);

        let handle = std::thread::Builder::new()
            .name("trend-writer".into())
            .spawn(move || {
                for command in receiver {
                    match command {
                        Command::Save(entities) => {
                            for entity in &entities {
                                match store.save(entity) {
                                    Ok(()) => {
                                        thread_counters.written.fetch_add(1, Ordering::Relaxed);
                                    }
                                    Err(e) => {
                                        thread_counters.failed.fetch_add(1, Ordering::Relaxed);
                                        tracing::warn!(
                                            kind = %entity.kind(),
                                            error = %e,
                                            "failed to persist record"
                                        );
                                    }
                                }
                            }
                        }
                        Command::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                tracing::debug!("persistence writer stopped");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
            counters,
        })
    }

    /// Queue records for saving.
    pub fn submit(&self, entities: Vec<StoredEntity>) -> EngineResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        self.send(Command::Save(entities))
    }

    /// Block until everything submitted before this call has been handled.
    pub fn flush(&self) -> EngineResult<()> {
        let (ack, done) = mpsc::channel();
        self.send(Command::Flush(ack))?;
        done.recv().map_err(|_| EngineError::ShutDown)
    }

    /// Drain the queue and join the thread. Later submissions fail with
    /// [`EngineError::ShutDown`]. Calling it twice is harmless.
    pub fn shutdown(&self) -> EngineResult<()> {
        let sender = self
            .sender
            .lock()
            .map_err(|_| EngineError::LockPoisoned)?
            .take();
        drop(sender);

        let handle = self
            .handle
            .lock()
            .map_err(|_| EngineError::LockPoisoned)?
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| EngineError::Persistence("writer thread panicked".into()))?;
        }
        Ok(())
    }

    /// Records saved successfully.
    pub fn written(&self) -> u64 {
        self.counters.written.load(Ordering::Relaxed)
    }

    /// Records the store rejected.
    pub fn failures(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    fn send(&self, command: Command) -> EngineResult<()> {
        let guard = self.sender.lock().map_err(|_| EngineError::LockPoisoned)?;
        let sender = guard.as_ref().ok_or(EngineError::ShutDown)?;
        sender.send(command).map_err(|_| EngineError::ShutDown)
    }
}

impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "persistence writer did not stop cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EntityKind, InMemoryStore};
    use chrono::{DateTime, Duration, Utc};
    use trend_types::DataPoint;

    struct RejectingStore;

    impl TrendStore for RejectingStore {
        fn save(&self, _entity: &StoredEntity) -> EngineResult<()> {
            Err(EngineError::Persistence("disk full".into()))
        }

        fn load_recent(
            &self,
            _kind: EntityKind,
            _since: DateTime<Utc>,
        ) -> EngineResult<Vec<StoredEntity>> {
            Ok(Vec::new())
        }
    }

    fn point(value: f64) -> StoredEntity {
        StoredEntity::Point(DataPoint::new(Utc::now(), value, "sensor", "X"))
    }

    #[test]
    fn flush_waits_for_queued_records() {
        let store = Arc::new(InMemoryStore::new());
        let writer = PersistenceWriter::spawn(store.clone()).unwrap();
        writer.submit(vec![point(1.0), point(2.0)]).unwrap();
        writer.submit(vec![point(3.0)]).unwrap();
        writer.flush().unwrap();

        assert_eq!(store.count(EntityKind::Point).unwrap(), 3);
        assert_eq!(writer.written(), 3);
        assert_eq!(writer.failures(), 0);
    }

    #[test]
    fn store_failures_are_counted_not_returned() {
        let writer = PersistenceWriter::spawn(Arc::new(RejectingStore)).unwrap();
        writer.submit(vec![point(1.0), point(2.0)]).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.failures(), 2);
        assert_eq!(writer.written(), 0);
    }

    #[test]
    fn shutdown_drains_then_rejects() {
        let store = Arc::new(InMemoryStore::new());
        let writer = PersistenceWriter::spawn(store.clone()).unwrap();
        writer.submit(vec![point(1.0)]).unwrap();
        writer.shutdown().unwrap();

        let recent = store
            .load_recent(EntityKind::Point, Utc::now() - Duration::minutes(1))
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert!(matches!(
            writer.submit(vec![point(2.0)]),
            Err(EngineError::ShutDown)
        ));
        assert!(writer.shutdown().is_ok());
    }
}
