//! Core types shared by the transform, store and query layers.
//!
//! - [`ClusterId`]: a validated cluster namespace name
//! - [`SequenceId`]: the per-cluster insertion counter
//! - [`Measurement`]: one stored, immutable record
//! - [`Histogram`]: the 10-band job-size histogram

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Schema-less measurement payload.
pub type Payload = Map<String, Value>;

/// A validated cluster identifier.
///
/// Cluster ids must:
/// - Be non-empty and at most 64 bytes long
/// - Start with an ASCII letter or digit
/// - Contain only ASCII letters, digits, `-`, `_` and `.`
///
/// The durable backend names one file per cluster after this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClusterId(String);

impl ClusterId {
    /// Maximum allowed length for a cluster id.
    pub const MAX_LENGTH: usize = 64;

    /// Creates a new validated cluster id.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the id is invalid.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::invalid_input("cluster id cannot be empty"));
        }

        if id.len() > Self::MAX_LENGTH {
            return Err(Error::invalid_input(format!(
                "cluster id exceeds maximum length of {} characters",
                Self::MAX_LENGTH
            )));
        }

        if !id.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return Err(Error::invalid_input(
                "cluster id must start with a letter or digit",
            ));
        }

        if let Some(c) = id
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.'))
        {
            return Err(Error::invalid_input(format!(
                "invalid character '{c}' in cluster id"
            )));
        }

        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClusterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClusterId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ClusterId> for String {
    fn from(id: ClusterId) -> Self {
        id.0
    }
}

/// Maximum allowed length for a measurement label.
pub const MAX_LABEL_LENGTH: usize = 256;

/// Checks that a label is usable. Labels are not registered; any non-empty
/// string up to [`MAX_LABEL_LENGTH`] bytes is accepted.
///
/// The label is the series key inside a cluster and is repeated in every
/// stored record. An empty label cannot be named by a query, and the length
/// cap keeps one runaway producer from bloating every line of the log.
///
/// # Errors
///
/// Returns `Error::InvalidInput` for empty or oversize labels.
pub fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(Error::invalid_input("label cannot be empty"));
    }
    if label.len() > MAX_LABEL_LENGTH {
        return Err(Error::invalid_input(format!(
            "label exceeds maximum length of {MAX_LABEL_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Store-assigned position of a measurement within its cluster log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(pub u64);

impl SequenceId {
    /// The id given to the first measurement of a namespace.
    pub const FIRST: Self = Self(1);

    /// Returns the id that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single stored measurement.
///
/// Immutable once appended; `(cluster_id, sequence_id)` identifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Namespace the measurement belongs to.
    pub cluster_id: ClusterId,
    /// Measurement kind, e.g. `slurm-info`.
    pub label: String,
    /// Normalized payload.
    pub payload: Payload,
    /// Server time at which the measurement was appended.
    pub recorded_at: DateTime<Utc>,
    /// Per-cluster insertion counter.
    pub sequence_id: SequenceId,
}

impl Measurement {
    /// Sort key used by every query: time first, insertion order on ties.
    #[must_use]
    pub fn order_key(&self) -> (DateTime<Utc>, SequenceId) {
        (self.recorded_at, self.sequence_id)
    }
}

/// Number of job-size bands.
pub const HISTOGRAM_BANDS: usize = 10;

/// Job counts per node-count band. See [`crate::bucket`] for the bands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Histogram([u64; HISTOGRAM_BANDS]);

impl Histogram {
    /// Human-readable band names, index-aligned with the counters.
    pub const BAND_LABELS: [&'static str; HISTOGRAM_BANDS] = [
        "1", "2", "3-4", "5-8", "9-16", "17-32", "33-64", "65-128", "129-256", ">256",
    ];

    /// Creates an all-zero histogram.
    #[must_use]
    pub const fn new() -> Self {
        Self([0; HISTOGRAM_BANDS])
    }

    /// Adds `count` jobs to band `index`, saturating at `u64::MAX`.
    ///
    /// `index` comes from [`crate::bucket::bucket`] and is always in range.
    pub fn add(&mut self, index: usize, count: u64) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = slot.saturating_add(count);
        }
    }

    /// Returns the counters.
    #[must_use]
    pub const fn counts(&self) -> &[u64; HISTOGRAM_BANDS] {
        &self.0
    }

    /// Total number of jobs across all bands.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, c| acc.saturating_add(*c))
    }
}

impl From<Histogram> for Value {
    fn from(histogram: Histogram) -> Self {
        Self::Array(histogram.0.iter().map(|c| Self::from(*c)).collect())
    }
}
