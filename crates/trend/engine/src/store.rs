//! Persistence collaborator: where points and detection artifacts end up.
//!
//! The engine only needs two operations, `save` and `load_recent`. Two
//! implementations ship with the crate: an in-process store for tests and
//! development, and an append-only JSON lines file.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trend_types::{DataPoint, DetectedTrend, TrendAlert, TrendForecast, TrendId, TrendPattern};

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{EngineError, EngineResult};

/// Kind of persisted record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Point,
    Trend,
    Pattern,
    Forecast,
    Alert,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Point => "point",
            Self::Trend => "trend",
            Self::Pattern => "pattern",
            Self::Forecast => "forecast",
            Self::Alert => "alert",
        };
        f.write_str(s)
    }
}

/// One persisted record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum StoredEntity {
    Point(DataPoint),
    Trend(DetectedTrend),
    Pattern {
        trend_id: TrendId,
        pattern: TrendPattern,
    },
    Forecast(TrendForecast),
    Alert(TrendAlert),
}

impl StoredEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Point(_) => EntityKind::Point,
            Self::Trend(_) => EntityKind::Trend,
            Self::Pattern { .. } => EntityKind::Pattern,
            Self::Forecast(_) => EntityKind::Forecast,
            Self::Alert(_) => EntityKind::Alert,
        }
    }

    /// Instant used by `load_recent`: observation time for points, creation
    /// time for everything else.
    pub fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            Self::Point(p) => p.timestamp,
            Self::Trend(t) => t.detection_date,
            Self::Pattern { pattern, .. } => pattern.end_date,
            Self::Forecast(f) => f.created_at,
            Self::Alert(a) => a.triggered_at,
        }
    }

    /// The trend and every artifact attached to it, trend first.
    pub fn from_trend(trend: &DetectedTrend) -> Vec<StoredEntity> {
        let mut out = Vec::with_capacity(1 + trend.patterns.len() + trend.forecasts.len() + trend.alerts.len());
        out.push(Self::Trend(trend.clone()));
        out.extend(trend.patterns.iter().map(|p| Self::Pattern {
            trend_id: trend.id.clone(),
            pattern: p.clone(),
        }));
        out.extend(trend.forecasts.iter().cloned().map(Self::Forecast));
        out.extend(trend.alerts.iter().cloned().map(Self::Alert));
        out
    }
}

/// Durable storage consumed by the engine.
pub trait TrendStore: Send + Sync {
    fn save(&self, entity: &StoredEntity) -> EngineResult<()>;

    /// Records of `kind` recorded at or after `since`, oldest first.
    fn load_recent(&self, kind: EntityKind, since: DateTime<Utc>)
        -> EngineResult<Vec<StoredEntity>>;
}

/// Build the store selected by `config`.
pub fn open_store(config: &StorageConfig) -> Arc<dyn TrendStore> {
    match &config.backend {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::JsonLines { path } => Arc::new(JsonLinesStore::new(path)),
    }
}

fn recent(
    entities: impl Iterator<Item = StoredEntity>,
    kind: EntityKind,
    since: DateTime<Utc>,
) -> Vec<StoredEntity> {
    let mut out: Vec<StoredEntity> = entities
        .filter(|e| e.kind() == kind && e.recorded_at() >= since)
        .collect();
    out.sort_by_key(StoredEntity::recorded_at);
    out
}

// ── In-memory ───────────────────────────────────────────────────────────

/// In-process store (for testing and development).
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<Vec<StoredEntity>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records of `kind`.
    pub fn count(&self, kind: EntityKind) -> EngineResult<usize> {
        let data = self.data.lock().map_err(|_| EngineError::LockPoisoned)?;
        Ok(data.iter().filter(|e| e.kind() == kind).count())
    }
}

impl TrendStore for InMemoryStore {
    fn save(&self, entity: &StoredEntity) -> EngineResult<()> {
        let mut data = self.data.lock().map_err(|_| EngineError::LockPoisoned)?;
        data.push(entity.clone());
        Ok(())
    }

    fn load_recent(
        &self,
        kind: EntityKind,
        since: DateTime<Utc>,
    ) -> EngineResult<Vec<StoredEntity>> {
        let data = self.data.lock().map_err(|_| EngineError::LockPoisoned)?;
        Ok(recent(data.iter().cloned(), kind, since))
    }
}

// ── JSON lines ──────────────────────────────────────────────────────────

/// Append-only JSON lines file, one record per line.
///
/// Unreadable lines (for instance a line cut short by a crash) are skipped
/// with a warning when loading.
pub struct JsonLinesStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrendStore for JsonLinesStore {
    fn save(&self, entity: &StoredEntity) -> EngineResult<()> {
        let mut line = serde_json::to_string(entity)?;
        line.push('\n');

        let _guard = self.write_lock.lock().map_err(|_| EngineError::LockPoisoned)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn load_recent(
        &self,
        kind: EntityKind,
        since: DateTime<Utc>,
    ) -> EngineResult<Vec<StoredEntity>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let _guard = self.write_lock.lock().map_err(|_| EngineError::LockPoisoned)?;
        let reader = BufReader::new(std::fs::File::open(&self.path)?);

        let mut entities = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredEntity>(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = number + 1,
                    error = %e,
                    "skipping unreadable record"
                ),
            }
        }
        Ok(recent(entities.into_iter(), kind, since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use trend_types::{TrendDirection, TrendType};

    fn point(days_ago: i64, value: f64) -> StoredEntity {
        StoredEntity::Point(DataPoint::new(
            Utc::now() - Duration::days(days_ago),
            value,
            "sensor",
            "X",
        ))
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("trend_store_{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn memory_filters_by_kind_and_window() {
        let store = InMemoryStore::new();
        store.save(&point(10, 1.0)).unwrap();
        store.save(&point(2, 2.0)).unwrap();
        store.save(&point(1, 3.0)).unwrap();

        let recent = store
            .load_recent(EntityKind::Point, Utc::now() - Duration::days(5))
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert!(store
            .load_recent(EntityKind::Trend, Utc::now() - Duration::days(30))
            .unwrap()
            .is_empty());
        assert_eq!(store.count(EntityKind::Point).unwrap(), 3);
    }

    #[test]
    fn trend_expands_into_artifacts() {
        let trend = DetectedTrend::new(
            "t",
            "X",
            TrendType::Market,
            TrendDirection::Increasing,
            Utc::now(),
            10,
        );
        let entities = StoredEntity::from_trend(&trend);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind(), EntityKind::Trend);
    }

    #[test]
    fn json_lines_save_and_load_roundtrip() {
        let path = temp_path("entities.jsonl");
        let store = JsonLinesStore::new(&path);
        store.save(&point(3, 1.5)).unwrap();
        store.save(&point(1, 2.5)).unwrap();

        let loaded = store
            .load_recent(EntityKind::Point, Utc::now() - Duration::days(7))
            .unwrap();
        assert_eq!(loaded.len(), 2);
        match &loaded[0] {
            StoredEntity::Point(p) => assert_eq!(p.value, 1.5),
            other => panic!("unexpected entity {other:?}"),
        }

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn json_lines_skips_truncated_line() {
        let path = temp_path("entities.jsonl");
        let store = JsonLinesStore::new(&path);
        store.save(&point(1, 4.0)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"{\"kind\":\"point\",\"ent").unwrap();
        }
        let loaded = store
            .load_recent(EntityKind::Point, Utc::now() - Duration::days(7))
            .unwrap();
        assert_eq!(loaded.len(), 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn json_lines_missing_file_is_empty() {
        let store = JsonLinesStore::new(temp_path("absent.jsonl"));
        assert!(store
            .load_recent(EntityKind::Point, Utc::now() - Duration::days(7))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn entity_serializes_with_kind_tag() {
        let json = serde_json::to_string(&point(0, 1.0)).unwrap();
        assert!(json.starts_with("{\"kind\":\"point\""));
    }
}
