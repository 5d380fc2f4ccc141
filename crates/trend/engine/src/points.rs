//! Bounded in-memory buffer of observations, keyed by category.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use trend_detection::TimeSeries;
use trend_types::DataPoint;

use crate::error::{EngineError, EngineResult};

/// Points per category, kept in timestamp order.
///
/// Each category holds at most `max_per_category` points; inserting beyond
/// that drops the earliest observation.
pub struct PointStore {
    max_per_category: usize,
    categories: RwLock<HashMap<String, VecDeque<DataPoint>>>,
}

impl PointStore {
    pub fn new(max_per_category: usize) -> Self {
        Self {
            max_per_category: max_per_category.max(1),
            categories: RwLock::new(HashMap::new()),
        }
    }

    /// Insert `point` and return the category's point count afterwards.
    pub fn insert(&self, point: DataPoint) -> EngineResult<usize> {
        let mut categories = self
            .categories
            .write()
            .map_err(|_| EngineError::LockPoisoned)?;
        let buffer = categories.entry(point.category.clone()).or_default();

        // Stable for equal timestamps: later arrivals go after earlier ones.
        let at = buffer.partition_point(|p| p.timestamp <= point.timestamp);
        buffer.insert(at, point);
        while buffer.len() > self.max_per_category {
            buffer.pop_front();
        }
        Ok(buffer.len())
    }

    /// Insert many points, returning how many were accepted.
    pub fn extend<I>(&self, points: I) -> EngineResult<usize>
    where
        I: IntoIterator<Item = DataPoint>,
    {
        let mut inserted = 0;
        for point in points {
            self.insert(point)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Time-ordered series of `category`, restricted to points at or after
    /// `since` when given. `None` when the category has never been seen.
    pub fn series(
        &self,
        category: &str,
        since: Option<DateTime<Utc>>,
    ) -> EngineResult<Option<TimeSeries>> {
        let categories = self
            .categories
            .read()
            .map_err(|_| EngineError::LockPoisoned)?;
        let Some(buffer) = categories.get(category) else {
            return Ok(None);
        };
        let skip = since.map_or(0, |start| buffer.partition_point(|p| p.timestamp < start));
        Ok(Some(TimeSeries::from_points(
            category,
            buffer.iter().skip(skip),
        )))
    }

    pub fn count(&self, category: &str) -> EngineResult<usize> {
        let categories = self
            .categories
            .read()
            .map_err(|_| EngineError::LockPoisoned)?;
        Ok(categories.get(category).map_or(0, VecDeque::len))
    }

    /// Known categories, sorted.
    pub fn categories(&self) -> EngineResult<Vec<String>> {
        let categories = self
            .categories
            .read()
            .map_err(|_| EngineError::LockPoisoned)?;
        let mut names: Vec<String> = categories.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
