//! Cache of detection results, evicted by age.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use trend_types::{DetectedTrend, TrendId};

use crate::error::{EngineError, EngineResult};

struct CachedTrend {
    trend: DetectedTrend,
    cached_at: DateTime<Utc>,
}

#[derive(Default)]
struct CacheState {
    trends: HashMap<TrendId, CachedTrend>,
    /// Ids produced by the most recent run of each category, in output order.
    latest: HashMap<String, Vec<TrendId>>,
}

/// Trends from recent detection runs.
///
/// Every run adds its trends; older runs stay reachable by id until the
/// eviction sweep drops them.
#[derive(Default)]
pub struct ResultCache {
    state: RwLock<CacheState>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the output of one run over `category`. An empty run clears
    /// the category's latest list.
    pub fn record_run(
        &self,
        category: &str,
        trends: &[DetectedTrend],
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut state = self.state.write().map_err(|_| EngineError::LockPoisoned)?;
        let ids = trends.iter().map(|t| t.id.clone()).collect();
        state.latest.insert(category.to_string(), ids);
        for trend in trends {
            state.trends.insert(
                trend.id.clone(),
                CachedTrend {
                    trend: trend.clone(),
                    cached_at: now,
                },
            );
        }
        Ok(())
    }

    pub fn get(&self, id: &TrendId) -> EngineResult<Option<DetectedTrend>> {
        let state = self.state.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(state.trends.get(id).map(|c| c.trend.clone()))
    }

    /// Trends of the most recent run over `category` that are still cached.
    pub fn latest(&self, category: &str) -> EngineResult<Vec<DetectedTrend>> {
        let state = self.state.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(state
            .latest
            .get(category)
            .into_iter()
            .flatten()
            .filter_map(|id| state.trends.get(id))
            .map(|c| c.trend.clone())
            .collect())
    }

    /// Every cached trend, oldest detection first.
    pub fn all(&self) -> EngineResult<Vec<DetectedTrend>> {
        let state = self.state.read().map_err(|_| EngineError::LockPoisoned)?;
        let mut trends: Vec<DetectedTrend> =
            state.trends.values().map(|c| c.trend.clone()).collect();
        trends.sort_by_key(|t| t.detection_date);
        Ok(trends)
    }

    pub fn len(&self) -> EngineResult<usize> {
        let state = self.state.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(state.trends.len())
    }

    pub fn is_empty(&self) -> EngineResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop entries cached before `cutoff`. Returns how many were dropped.
    pub fn evict_before(&self, cutoff: DateTime<Utc>) -> EngineResult<usize> {
        let mut state = self.state.write().map_err(|_| EngineError::LockPoisoned)?;
        let before = state.trends.len();
        state.trends.retain(|_, c| c.cached_at >= cutoff);
        let evicted = before - state.trends.len();

        let CacheState { trends, latest } = &mut *state;
        for ids in latest.values_mut() {
            ids.retain(|id| trends.contains_key(id));
        }
        latest.retain(|_, ids| !ids.is_empty());
        Ok(evicted)
    }
}
