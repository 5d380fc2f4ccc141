//! Time-ordered series for one category.

use chrono::{DateTime, Duration, Utc};
use trend_types::DataPoint;

use crate::error::{DetectionError, DetectionResult};
use crate::stats;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Values of one category, sorted by timestamp.
///
/// Construction always sorts (stably), so callers may hand over points in
/// insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    category: String,
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(category: impl Into<String>, mut observations: Vec<(DateTime<Utc>, f64)>) -> Self {
        observations.sort_by_key(|(ts, _)| *ts);
        let (timestamps, values) = observations.into_iter().unzip();
        Self {
            category: category.into(),
            timestamps,
            values,
        }
    }

    pub fn from_points<'a, I>(category: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = &'a DataPoint>,
    {
        let observations = points
            .into_iter()
            .map(|p| (p.timestamp, p.value))
            .collect();
        Self::new(category, observations)
    }

    /// One value per day starting at `start`.
    pub fn from_daily_values<I>(category: impl Into<String>, start: DateTime<Utc>, values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let observations = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::days(i as i64), v))
            .collect();
        Self::new(category, observations)
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Elapsed time of every observation since the first one, in days.
    pub fn elapsed_days(&self) -> Vec<f64> {
        let Some(origin) = self.first_timestamp() else {
            return Vec::new();
        };
        self.timestamps
            .iter()
            .map(|ts| (*ts - origin).num_milliseconds() as f64 / (SECONDS_PER_DAY * 1000.0))
            .collect()
    }

    /// Median spacing between consecutive distinct observations, in days.
    pub fn median_interval_days(&self) -> Option<f64> {
        let gaps: Vec<f64> = self
            .timestamps
            .windows(2)
            .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / (SECONDS_PER_DAY * 1000.0))
            .filter(|gap| *gap > 0.0)
            .collect();
        stats::median(&gaps)
    }

    /// The observations at or after `start`.
    pub fn since(&self, start: DateTime<Utc>) -> TimeSeries {
        let from = self.timestamps.partition_point(|ts| *ts < start);
        Self {
            category: self.category.clone(),
            timestamps: self.timestamps[from..].to_vec(),
            values: self.values[from..].to_vec(),
        }
    }

    /// The trailing `count` observations.
    pub fn tail(&self, count: usize) -> TimeSeries {
        let from = self.len().saturating_sub(count);
        Self {
            category: self.category.clone(),
            timestamps: self.timestamps[from..].to_vec(),
            values: self.values[from..].to_vec(),
        }
    }

    pub fn ensure_finite(&self) -> DetectionResult<()> {
        match self.values.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(DetectionError::NonFiniteInput { index }),
            None => Ok(()),
        }
    }
}
