//! Per-cluster append-only measurement store.
//!
//! [`ClusterStore`] keeps a registry mapping each cluster id to its
//! namespace. A namespace is created on the first append for that cluster,
//! exactly once even when several writers race, and is never removed.
//! Within a namespace records are indexed per label and ordered by
//! `(recorded_at, sequence_id)`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::backend::{DirectoryBackend, MemoryBackend, NamespaceWriter, StorageBackend};
use crate::clock::{Clock, SystemClock};
use crate::config::{BackendKind, StoreConfig};
use crate::error::{Error, Result};
use crate::transform::normalize;
use crate::types::{ClusterId, Measurement, Payload, SequenceId, validate_label};

/// Mutable part of a namespace, guarded by one lock so that sequence
/// assignment, the durable write and indexing happen as one step.
struct NamespaceState {
    /// Records per label, sorted by [`Measurement::order_key`].
    series: HashMap<String, Vec<Measurement>>,
    next_sequence: SequenceId,
    len: usize,
    writer: Box<dyn NamespaceWriter>,
}

impl NamespaceState {
    fn insert(&mut self, measurement: Measurement) {
        let series = self.series.entry(measurement.label.clone()).or_default();
        let key = measurement.order_key();
        let pos = series.partition_point(|m| m.order_key() <= key);
        series.insert(pos, measurement);
        self.len += 1;
    }
}

/// The log of one cluster.
struct Namespace {
    cluster_id: ClusterId,
    state: RwLock<NamespaceState>,
}

impl Namespace {
    fn new(cluster_id: ClusterId, writer: Box<dyn NamespaceWriter>) -> Self {
        Self {
            cluster_id,
            state: RwLock::new(NamespaceState {
                series: HashMap::new(),
                next_sequence: SequenceId::FIRST,
                len: 0,
                writer,
            }),
        }
    }

    fn restore(
        cluster_id: ClusterId,
        measurements: Vec<Measurement>,
        writer: Box<dyn NamespaceWriter>,
    ) -> Self {
        let namespace = Self::new(cluster_id, writer);
        {
            let mut state = namespace.state.write();
            for measurement in measurements {
                if measurement.sequence_id >= state.next_sequence {
                    state.next_sequence = measurement.sequence_id.next();
                }
                state.insert(measurement);
            }
        }
        namespace
    }

    #[allow(clippy::significant_drop_tightening)] // Lock held across write and index
    fn append(
        &self,
        label: &str,
        payload: Payload,
        clock: &dyn Clock,
        closed: &AtomicBool,
    ) -> Result<Measurement> {
        let mut state = self.state.write();
        // close() flushes under this lock, so nothing may land after it
        if closed.load(Ordering::Acquire) {
            return Err(Error::unavailable("store is closed"));
        }

        // consumed before writing so a half-failed write is never reused
        let sequence_id = state.next_sequence;
        state.next_sequence = sequence_id.next();

        let measurement = Measurement {
            cluster_id: self.cluster_id.clone(),
            label: label.to_string(),
            payload,
            recorded_at: clock.now(),
            sequence_id,
        };

        state.writer.write(&measurement)?;
        state.insert(measurement.clone());

        debug!(
            cluster = %self.cluster_id,
            label,
            sequence_id = %sequence_id,
            records = state.len,
            "appended measurement"
        );

        Ok(measurement)
    }

    fn len(&self) -> usize {
        self.state.read().len
    }

    fn is_active(&self) -> bool {
        self.len() > 0
    }
}

/// Thread-safe, per-cluster measurement log.
///
/// Cloning is cheap; clones share the same namespaces and backend.
#[derive(Clone)]
pub struct ClusterStore {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    namespaces: Arc<RwLock<HashMap<ClusterId, Arc<Namespace>>>>,
    closed: Arc<AtomicBool>,
}

impl ClusterStore {
    /// Opens a store as described by `config`, replaying any existing logs.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an invalid config and
    /// `Error::StoreUnavailable` if the medium cannot be opened or replayed.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn StorageBackend> = match config.backend {
            BackendKind::Memory => Arc::new(MemoryBackend),
            BackendKind::Directory => {
                Arc::new(DirectoryBackend::new(&config.data_dir, config.fsync)?)
            }
        };
        Self::with_backend(backend, Arc::new(SystemClock))
    }

    /// Creates an empty in-memory store on the system clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::empty(Arc::new(MemoryBackend), Arc::new(SystemClock))
    }

    /// Creates a store over `backend`, replaying what it already holds.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if recovery fails.
    pub fn with_backend(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Result<Self> {
        let recovered = backend.recover()?;

        let mut namespaces = HashMap::with_capacity(recovered.len());
        let mut records = 0usize;
        for ns in recovered {
            records += ns.measurements.len();
            let namespace = Namespace::restore(ns.cluster_id.clone(), ns.measurements, ns.writer);
            namespaces.insert(ns.cluster_id, Arc::new(namespace));
        }

        info!(
            backend = backend.name(),
            clusters = namespaces.len(),
            records,
            "opened cluster store"
        );

        Ok(Self {
            backend,
            clock,
            namespaces: Arc::new(RwLock::new(namespaces)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn empty(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            namespaces: Arc::new(RwLock::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the clock used for `recorded_at` stamps.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Normalizes `payload` and appends it to the log of `cluster_id`.
    ///
    /// Creates the cluster namespace on first use. Returns the stored
    /// measurement, whose `sequence_id` is the assigned id.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidInput` for a bad cluster id or label
    /// - `Error::MalformedPayload` if the label's transform rejects the payload
    /// - `Error::StoreUnavailable` if the medium fails or the store is closed;
    ///   safe to retry
    pub fn append(&self, cluster_id: &str, label: &str, payload: &Payload) -> Result<Measurement> {
        self.ensure_open()?;
        let cluster = ClusterId::new(cluster_id)?;
        validate_label(label)?;

        let payload = normalize(label, payload)?;
        let namespace = self.namespace_or_create(&cluster)?;
        namespace.append(label, payload, self.clock.as_ref(), &self.closed)
    }

    /// Returns the most recent measurement for `label`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the cluster has never been written or
    /// has no measurement with that label.
    pub fn latest(&self, cluster_id: &str, label: &str) -> Result<Measurement> {
        let namespace = self.active_namespace(cluster_id)?;
        let state = namespace.state.read();
        state
            .series
            .get(label)
            .and_then(|series| series.last())
            .cloned()
            .ok_or_else(|| missing_label(&namespace.cluster_id, label))
    }

    /// Returns up to `n` measurements for `label`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `n` is zero and `Error::NotFound`
    /// under the same conditions as [`Self::latest`].
    pub fn latest_n(&self, cluster_id: &str, label: &str, n: usize) -> Result<Vec<Measurement>> {
        if n == 0 {
            return Err(Error::invalid_input("n must be at least 1"));
        }

        let namespace = self.active_namespace(cluster_id)?;
        let state = namespace.state.read();
        let series = state
            .series
            .get(label)
            .filter(|series| !series.is_empty())
            .ok_or_else(|| missing_label(&namespace.cluster_id, label))?;

        Ok(series.iter().rev().take(n).cloned().collect())
    }

    /// Returns every measurement for `label` recorded in `[from, to]`,
    /// oldest first.
    ///
    /// An existing cluster with nothing in the window (or no such label)
    /// yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `from > to` and `Error::NotFound` if
    /// the cluster has never been written.
    pub fn window(
        &self,
        cluster_id: &str,
        label: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Measurement>> {
        if from > to {
            return Err(Error::invalid_input(format!(
                "invalid time window: from={from} is after to={to}"
            )));
        }

        let namespace = self.active_namespace(cluster_id)?;
        let state = namespace.state.read();
        let Some(series) = state.series.get(label) else {
            return Ok(Vec::new());
        };

        let start = series.partition_point(|m| m.recorded_at < from);
        let end = series.partition_point(|m| m.recorded_at <= to);
        Ok(series.get(start..end).map(<[Measurement]>::to_vec).unwrap_or_default())
    }

    /// Returns every cluster with at least one measurement, sorted.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the store is closed.
    pub fn clusters(&self) -> Result<Vec<ClusterId>> {
        self.ensure_open()?;
        let mut clusters: Vec<ClusterId> = self
            .namespaces
            .read()
            .values()
            .filter(|ns| ns.is_active())
            .map(|ns| ns.cluster_id.clone())
            .collect();
        clusters.sort();
        Ok(clusters)
    }

    /// Returns the labels recorded for a cluster, sorted.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the cluster has never been written.
    pub fn labels(&self, cluster_id: &str) -> Result<Vec<String>> {
        let namespace = self.active_namespace(cluster_id)?;
        let mut labels: Vec<String> = namespace.state.read().series.keys().cloned().collect();
        labels.sort();
        Ok(labels)
    }

    /// Returns the number of measurements stored for a cluster.
    ///
    /// Returns 0 if the cluster doesn't exist or the id is invalid.
    #[must_use]
    pub fn record_count(&self, cluster_id: &str) -> usize {
        ClusterId::new(cluster_id)
            .ok()
            .and_then(|cluster| self.namespaces.read().get(&cluster).map(|ns| ns.len()))
            .unwrap_or(0)
    }

    /// Returns the number of namespaces in the registry.
    #[must_use]
    pub fn namespace_count(&self) -> usize {
        self.namespaces.read().len()
    }

    /// Returns true once [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Flushes every namespace and stops accepting calls.
    ///
    /// Subsequent operations fail with `Error::StoreUnavailable`. Closing an
    /// already closed store does nothing.
    ///
    /// # Errors
    ///
    /// Returns the first flush failure; the store is closed regardless.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let namespaces: Vec<Arc<Namespace>> = self.namespaces.read().values().cloned().collect();
        let mut first_error = None;
        for namespace in &namespaces {
            if let Err(e) = namespace.state.write().writer.flush() {
                first_error.get_or_insert(e);
            }
        }

        info!(clusters = namespaces.len(), "closed cluster store");
        first_error.map_or(Ok(()), Err)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::unavailable("store is closed"));
        }
        Ok(())
    }

    /// Returns the namespace for `cluster`, creating it under the registry
    /// write lock if no writer got there first.
    fn namespace_or_create(&self, cluster: &ClusterId) -> Result<Arc<Namespace>> {
        if let Some(namespace) = self.namespaces.read().get(cluster) {
            return Ok(Arc::clone(namespace));
        }

        let mut namespaces = self.namespaces.write();
        if let Some(namespace) = namespaces.get(cluster) {
            return Ok(Arc::clone(namespace));
        }

        let writer = self.backend.create_namespace(cluster)?;
        let namespace = Arc::new(Namespace::new(cluster.clone(), writer));
        namespaces.insert(cluster.clone(), Arc::clone(&namespace));

        debug!(
            cluster = %cluster,
            backend = self.backend.name(),
            "created cluster namespace"
        );
        Ok(namespace)
    }

    /// Looks up a namespace that holds at least one measurement.
    ///
    /// An id that could never have been written is reported as NotFound.
    fn active_namespace(&self, cluster_id: &str) -> Result<Arc<Namespace>> {
        self.ensure_open()?;
        let Ok(cluster) = ClusterId::new(cluster_id) else {
            return Err(Error::not_found(format!("cluster '{cluster_id}'")));
        };
        self.namespaces
            .read()
            .get(&cluster)
            .filter(|ns| ns.is_active())
            .cloned()
            .ok_or_else(|| Error::not_found(format!("cluster '{cluster}'")))
    }
}

fn missing_label(cluster: &ClusterId, label: &str) -> Error {
    Error::not_found(format!("label '{label}' in cluster '{cluster}'"))
}

impl fmt::Debug for ClusterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterStore")
            .field("backend", &self.backend)
            .field("clock", &self.clock)
            .field("namespaces", &self.namespace_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Default for ClusterStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
