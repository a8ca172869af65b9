//! Measurement ingestion and per-cluster time-series log.
//!
//! `vcm-metrics` collects periodic measurements from independently operated
//! compute clusters (node occupancy, Slurm queue snapshots, filesystem
//! response probes) and keeps them as one append-only, label-tagged log per
//! cluster.
//!
//! # Features
//!
//! - **Schema-less payloads**: any JSON object under any label
//! - **Slurm histograms**: `slurm-info` job lists are bucketed by node count
//!   before storage, with pending array jobs expanded per element
//! - **Lazy namespaces**: a cluster's log is created on its first write,
//!   exactly once under concurrent writers
//! - **Three query shapes**: latest, latest N, time window
//! - **Durable backend**: one JSON-lines file per cluster, replayed on open
//!
//! # Example
//!
//! ```rust
//! use vcm_metrics::{ClusterStore, QueryService};
//! use serde_json::json;
//!
//! let store = ClusterStore::in_memory();
//!
//! let payload = json!({
//!     "num_nodes_total": 64,
//!     "pending_jobs": [{"job_id": "4242_[1-8]", "requested_nodes": 2}],
//! });
//! let payload = payload.as_object().cloned().unwrap_or_default();
//! store.append("eiger", "slurm-info", &payload).unwrap();
//!
//! let queries = QueryService::new(store);
//! let latest = queries.snapshot("eiger", "slurm-info").unwrap();
//! assert_eq!(latest.payload["pending_histogram"][1], json!(8));
//! ```

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/vcm-metrics/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod array_job;
pub mod backend;
pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod query;
pub mod store;
pub mod transform;
pub mod types;

// Re-export main types at crate root
pub use array_job::expand;
pub use backend::{DirectoryBackend, MemoryBackend, NamespaceWriter, StorageBackend};
pub use bucket::bucket;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BackendKind, QueryConfig, StoreConfig};
pub use error::{Error, ErrorKind, Result};
pub use query::{History, QueryService, RangeResult, TimedMeasurement};
pub use store::ClusterStore;
pub use transform::{SLURM_INFO_LABEL, normalize};
pub use types::{ClusterId, Histogram, Measurement, Payload, SequenceId};
