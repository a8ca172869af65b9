//! Dashboard-facing queries composed from [`ClusterStore`] reads.
//!
//! Derived metrics (availability, occupancy) are left to the caller; the only
//! computation done here is the per-record offset from "now" used as the x
//! axis of history charts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::store::ClusterStore;
use crate::types::{ClusterId, Measurement};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Column names [`History`] reserves for itself.
const RESERVED_COLUMNS: [&str; 2] = ["count", "time_shift"];

/// A measurement paired with its age.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedMeasurement {
    /// Hours between `recorded_at` and the query's `now`.
    pub hours_ago: f64,
    /// The stored measurement.
    #[serde(flatten)]
    pub measurement: Measurement,
}

/// Result of [`QueryService::range`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeResult {
    /// Start of the window (inclusive).
    pub from: DateTime<Utc>,
    /// End of the window and reference point for `hours_ago`.
    pub now: DateTime<Utc>,
    /// Measurements in the window, oldest first.
    pub points: Vec<TimedMeasurement>,
}

/// Column-oriented history, one entry per record in every column.
///
/// Serializes flat, e.g.
/// `{"count": 2, "time_shift": [1.5, 0.5], "num_nodes_total": [120, 118]}`.
/// Payload keys named `count` or `time_shift` are not exported as columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct History {
    /// Number of records.
    pub count: usize,
    /// Hours ago of each record, oldest first.
    pub time_shift: Vec<f64>,
    /// Payload values per top-level key; `null` where a record lacks the key.
    #[serde(flatten)]
    pub columns: BTreeMap<String, Vec<Value>>,
}

impl History {
    /// Pivots a range result into columns.
    #[must_use]
    pub fn from_range(range: &RangeResult) -> Self {
        let count = range.points.len();
        let mut columns: BTreeMap<String, Vec<Value>> = BTreeMap::new();

        for (row, point) in range.points.iter().enumerate() {
            for (key, value) in &point.measurement.payload {
                if RESERVED_COLUMNS.contains(&key.as_str()) {
                    continue;
                }
                let column = columns
                    .entry(key.clone())
                    .or_insert_with(|| vec![Value::Null; count]);
                column[row] = value.clone();
            }
        }

        Self {
            count,
            time_shift: range.points.iter().map(|p| p.hours_ago).collect(),
            columns,
        }
    }

    /// Returns one column, if any record carried that key.
    #[must_use]
    pub fn column(&self, key: &str) -> Option<&[Value]> {
        self.columns.get(key).map(Vec::as_slice)
    }
}

/// Read-side facade used by the serving layer.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: ClusterStore,
    clock: Arc<dyn Clock>,
}

impl QueryService {
    /// Creates a service sharing the store's clock.
    #[must_use]
    pub fn new(store: ClusterStore) -> Self {
        let clock = store.clock();
        Self { store, clock }
    }

    /// Creates a service with its own clock.
    #[must_use]
    pub fn with_clock(store: ClusterStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &ClusterStore {
        &self.store
    }

    /// Latest measurement for a cluster and label.
    ///
    /// # Errors
    ///
    /// Propagates [`ClusterStore::latest`] errors.
    pub fn snapshot(&self, cluster_id: &str, label: &str) -> Result<Measurement> {
        self.store.latest(cluster_id, label)
    }

    /// Up to `n` latest measurements, most recent first.
    ///
    /// # Errors
    ///
    /// Propagates [`ClusterStore::latest_n`] errors.
    pub fn recent(&self, cluster_id: &str, label: &str, n: usize) -> Result<Vec<Measurement>> {
        self.store.latest_n(cluster_id, label, n)
    }

    /// Measurements of the last `lookback_minutes`, oldest first, each with
    /// its age in hours.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the lookback does not fit the time
    /// range, and propagates [`ClusterStore::window`] errors.
    pub fn range(&self, cluster_id: &str, label: &str, lookback_minutes: u64) -> Result<RangeResult> {
        let now = self.clock.now();
        let from = i64::try_from(lookback_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .ok_or_else(|| {
                Error::invalid_input(format!("lookback of {lookback_minutes} minutes is out of range"))
            })?;

        let points = self
            .store
            .window(cluster_id, label, from, now)?
            .into_iter()
            .map(|measurement| TimedMeasurement {
                hours_ago: hours_between(measurement.recorded_at, now),
                measurement,
            })
            .collect();

        Ok(RangeResult { from, now, points })
    }

    /// Column-oriented variant of [`Self::range`], the shape history charts
    /// plot directly.
    ///
    /// # Errors
    ///
    /// Same as [`Self::range`].
    pub fn history(&self, cluster_id: &str, label: &str, lookback_minutes: u64) -> Result<History> {
        let range = self.range(cluster_id, label, lookback_minutes)?;
        Ok(History::from_range(&range))
    }

    /// Clusters with at least one measurement.
    ///
    /// # Errors
    ///
    /// Propagates [`ClusterStore::clusters`] errors.
    pub fn clusters(&self) -> Result<Vec<ClusterId>> {
        self.store.clusters()
    }
}

/// Fractional hours from `then` to `now`.
fn hours_between(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - then).num_milliseconds() as f64 / MILLIS_PER_HOUR
}
