use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form key/value annotations carried by points and detection artifacts.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A single timestamped observation.
///
/// Immutable once created. The `category` partitions all downstream analysis;
/// points of one category are always analysed in timestamp order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub source: String,
    pub category: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DataPoint {
    pub fn new(
        timestamp: DateTime<Utc>,
        value: f64,
        source: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            value,
            source: source.into(),
            category: category.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}
