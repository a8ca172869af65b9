//! Durable backends for the per-cluster measurement logs.
//!
//! This module provides:
//! - [`StorageBackend`] - creates and recovers per-cluster namespaces
//! - [`NamespaceWriter`] - appends records to one namespace
//! - [`MemoryBackend`] - keeps nothing outside the process
//! - [`DirectoryBackend`] - one JSON-lines file per cluster
//!
//! Every cluster uses the same record layout:
//!
//! ```text
//! {"sequence_id":7,"label":"slurm-info","payload":{...},"recorded_at":"2026-10-18T09:30:00Z"}
//! ```

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{ClusterId, Measurement, Payload, SequenceId};

/// File extension of a cluster log.
pub const LOG_EXTENSION: &str = "jsonl";

/// Appends records to one cluster namespace.
pub trait NamespaceWriter: Send + Sync {
    /// Durably appends one measurement.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the medium rejects the write.
    fn write(&mut self, measurement: &Measurement) -> Result<()>;

    /// Flushes anything still buffered.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if flushing fails.
    fn flush(&mut self) -> Result<()>;
}

/// A namespace found on the medium when the store opens.
pub struct RecoveredNamespace {
    /// Cluster the namespace belongs to.
    pub cluster_id: ClusterId,
    /// Every record read back, in file order.
    pub measurements: Vec<Measurement>,
    /// Writer positioned after the last good record.
    pub writer: Box<dyn NamespaceWriter>,
}

impl fmt::Debug for RecoveredNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveredNamespace")
            .field("cluster_id", &self.cluster_id)
            .field("measurements", &self.measurements.len())
            .finish_non_exhaustive()
    }
}

/// Trait for measurement storage media.
///
/// Implementors only persist; ordering, indexing and the creation lock live
/// in [`crate::ClusterStore`].
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Short name for log output.
    fn name(&self) -> &'static str;

    /// Creates the namespace for `cluster` and returns its writer.
    ///
    /// Must be idempotent: creating a namespace that already exists on the
    /// medium opens it for appending without losing records.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the medium is unreachable.
    fn create_namespace(&self, cluster: &ClusterId) -> Result<Box<dyn NamespaceWriter>>;

    /// Reads back every namespace already on the medium.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the medium is unreachable or a
    /// log is corrupt.
    fn recover(&self) -> Result<Vec<RecoveredNamespace>>;
}

/// Backend that keeps nothing outside the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

#[derive(Debug)]
struct DiscardWriter;

impl NamespaceWriter for DiscardWriter {
    fn write(&mut self, _measurement: &Measurement) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_namespace(&self, _cluster: &ClusterId) -> Result<Box<dyn NamespaceWriter>> {
        Ok(Box::new(DiscardWriter))
    }

    fn recover(&self) -> Result<Vec<RecoveredNamespace>> {
        Ok(Vec::new())
    }
}

/// On-disk record, borrowed for writing.
#[derive(Serialize)]
struct RecordRef<'a> {
    sequence_id: SequenceId,
    label: &'a str,
    payload: &'a Payload,
    recorded_at: DateTime<Utc>,
}

/// On-disk record, owned for reading.
#[derive(Deserialize)]
struct Record {
    sequence_id: SequenceId,
    label: String,
    payload: Payload,
    recorded_at: DateTime<Utc>,
}

impl Record {
    fn into_measurement(self, cluster_id: &ClusterId) -> Measurement {
        Measurement {
            cluster_id: cluster_id.clone(),
            label: self.label,
            payload: self.payload,
            recorded_at: self.recorded_at,
            sequence_id: self.sequence_id,
        }
    }
}

/// Backend storing one `<cluster>.jsonl` file per cluster under a directory.
#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    base_dir: PathBuf,
    fsync: bool,
}

impl DirectoryBackend {
    /// Creates the backend, creating `base_dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the directory cannot be created.
    pub fn new(base_dir: impl Into<PathBuf>, fsync: bool) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|e| {
            Error::unavailable(format!(
                "cannot create data directory '{}': {e}",
                base_dir.display()
            ))
        })?;
        Ok(Self { base_dir, fsync })
    }

    /// Returns the data directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the log file for `cluster`.
    #[must_use]
    pub fn log_path(&self, cluster: &ClusterId) -> PathBuf {
        self.base_dir
            .join(format!("{}.{LOG_EXTENSION}", cluster.as_str()))
    }

    fn open_append(&self, path: &Path) -> Result<JsonLinesWriter> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let committed_len = file.metadata()?.len();
        Ok(JsonLinesWriter {
            file,
            fsync: self.fsync,
            committed_len,
        })
    }

    /// Reads one log, truncating a torn final line left by a crash.
    fn read_log(&self, cluster: &ClusterId, path: &Path) -> Result<RecoveredNamespace> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::unavailable(format!("cannot read '{}': {e}", path.display()))
        })?;

        let chunks: Vec<&str> = content.split_inclusive('\n').collect();
        let mut measurements = Vec::new();
        let mut valid_len = 0usize;
        let mut torn_tail = false;

        for (index, chunk) in chunks.iter().enumerate() {
            let line = chunk.trim_end();
            if !line.is_empty() {
                match serde_json::from_str::<Record>(line) {
                    Ok(record) => measurements.push(record.into_measurement(cluster)),
                    Err(e) if index + 1 == chunks.len() => {
                        warn!(
                            cluster = %cluster,
                            path = %path.display(),
                            error = %e,
                            "dropping torn record at end of log"
                        );
                        torn_tail = true;
                        break;
                    }
                    Err(e) => {
                        return Err(Error::unavailable(format!(
                            "corrupt record at {}:{}: {e}",
                            path.display(),
                            index + 1
                        )));
                    }
                }
            }
            valid_len += chunk.len();
        }

        if torn_tail {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len as u64)?;
        }

        let mut writer = self.open_append(path)?;
        if valid_len > 0 && !content[..valid_len].ends_with('\n') {
            // last record lost its newline; terminate it before appending
            writer.file.write_all(b"\n")?;
            writer.committed_len += 1;
        }

        Ok(RecoveredNamespace {
            cluster_id: cluster.clone(),
            measurements,
            writer: Box::new(writer),
        })
    }
}

impl StorageBackend for DirectoryBackend {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn create_namespace(&self, cluster: &ClusterId) -> Result<Box<dyn NamespaceWriter>> {
        let path = self.log_path(cluster);
        let writer = self.open_append(&path)?;
        debug!(cluster = %cluster, path = %path.display(), "opened cluster log");
        Ok(Box::new(writer))
    }

    fn recover(&self) -> Result<Vec<RecoveredNamespace>> {
        let entries = fs::read_dir(&self.base_dir).map_err(|e| {
            Error::unavailable(format!(
                "cannot list data directory '{}': {e}",
                self.base_dir.display()
            ))
        })?;

        let mut logs: Vec<(ClusterId, PathBuf)> = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != LOG_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match ClusterId::new(stem) {
                Ok(cluster) => logs.push((cluster, path)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping foreign log file"),
            }
        }
        logs.sort();

        logs.iter()
            .map(|(cluster, path)| self.read_log(cluster, path))
            .collect()
    }
}

/// Appends JSON lines to an open cluster log.
///
/// `committed_len` is the end of the last complete record. A log has a single
/// writer, so any bytes past it are the remains of a failed write.
#[derive(Debug)]
struct JsonLinesWriter {
    file: File,
    fsync: bool,
    committed_len: u64,
}

impl JsonLinesWriter {
    /// Truncates the log back to the last complete record.
    fn discard_uncommitted(&mut self) -> Result<()> {
        let len = self.file.metadata()?.len();
        if len > self.committed_len {
            warn!(
                discarded = len - self.committed_len,
                "dropping partial record left by a failed write"
            );
            self.file.set_len(self.committed_len)?;
        }
        Ok(())
    }

    fn append_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.write_all(line)?;
        if self.fsync {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

impl NamespaceWriter for JsonLinesWriter {
    fn write(&mut self, measurement: &Measurement) -> Result<()> {
        let record = RecordRef {
            sequence_id: measurement.sequence_id,
            label: &measurement.label,
            payload: &measurement.payload,
            recorded_at: measurement.recorded_at,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        self.discard_uncommitted()?;
        if let Err(e) = self.append_line(&line) {
            // the next write retries the truncation if this one fails
            if let Err(rollback) = self.file.set_len(self.committed_len) {
                warn!(error = %rollback, "cannot roll back partial record");
            }
            return Err(e.into());
        }
        self.committed_len += line.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}
