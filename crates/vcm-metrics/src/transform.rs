//! Label-aware payload normalization applied before persistence.
//!
//! Only `slurm-info` payloads are rewritten: their raw `running_jobs` and
//! `pending_jobs` lists become `running_histogram` and `pending_histogram`.
//! Every other label is stored as received.

use serde_json::Value;
use tracing::debug;

use crate::array_job::expand;
use crate::bucket::bucket;
use crate::error::{Error, Result};
use crate::types::{Histogram, Payload};

/// Label of the Slurm queue snapshot.
pub const SLURM_INFO_LABEL: &str = "slurm-info";
/// Raw list of running jobs in a `slurm-info` payload.
pub const RUNNING_JOBS_FIELD: &str = "running_jobs";
/// Raw list of pending jobs in a `slurm-info` payload.
pub const PENDING_JOBS_FIELD: &str = "pending_jobs";
/// Histogram replacing [`RUNNING_JOBS_FIELD`].
pub const RUNNING_HISTOGRAM_FIELD: &str = "running_histogram";
/// Histogram replacing [`PENDING_JOBS_FIELD`].
pub const PENDING_HISTOGRAM_FIELD: &str = "pending_histogram";

const JOB_ID_KEYS: [&str; 2] = ["job_id", "slurm_job_id"];
const NODE_COUNT_KEYS: [&str; 2] = ["requested_nodes", "num_nodes"];

/// One job entry of a `slurm-info` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmJobRecord {
    /// Scheduler job id, possibly carrying an array range. `None` if the
    /// producer did not send one.
    pub job_id: Option<String>,
    /// Number of nodes the job asked for. Always positive.
    pub requested_nodes: i64,
}

impl SlurmJobRecord {
    /// Reads a job entry, validating only the fields the histograms use.
    fn from_value(field: &str, index: usize, value: &Value) -> Result<Self> {
        let Value::Object(entry) = value else {
            return Err(Error::malformed(format!(
                "{field}[{index}] must be an object"
            )));
        };

        let nodes = NODE_COUNT_KEYS
            .iter()
            .find_map(|key| entry.get(*key))
            .ok_or_else(|| {
                Error::malformed(format!("{field}[{index}] has no requested_nodes"))
            })?;
        let requested_nodes = nodes.as_i64().filter(|n| *n > 0).ok_or_else(|| {
            Error::malformed(format!(
                "{field}[{index}].requested_nodes must be a positive integer, got {nodes}"
            ))
        })?;

        let job_id = match JOB_ID_KEYS.iter().find_map(|key| entry.get(*key)) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(n)) if n.is_u64() || n.is_i64() => Some(n.to_string()),
            Some(other) => {
                return Err(Error::malformed(format!(
                    "{field}[{index}].job_id must be a string or integer, got {other}"
                )));
            }
        };

        Ok(Self {
            job_id,
            requested_nodes,
        })
    }

    /// How many queued work items this entry stands for.
    fn array_size(&self) -> u64 {
        self.job_id.as_deref().map_or(1, expand)
    }
}

/// How each job entry is weighted in its histogram.
#[derive(Debug, Clone, Copy)]
enum JobWeight {
    /// One per entry. Running jobs already arrive one entry per task.
    Single,
    /// One per array element. Pending arrays arrive as one grouped entry.
    ArrayExpanded,
}

/// Builds the histogram for one job list. An absent or `null` field is an
/// empty list.
fn histogram_of(payload: &Payload, field: &str, weight: JobWeight) -> Result<Histogram> {
    let mut histogram = Histogram::new();

    let jobs = match payload.get(field) {
        None | Some(Value::Null) => return Ok(histogram),
        Some(Value::Array(jobs)) => jobs,
        Some(_) => return Err(Error::malformed(format!("{field} must be an array"))),
    };

    for (index, value) in jobs.iter().enumerate() {
        let job = SlurmJobRecord::from_value(field, index, value)?;
        let count = match weight {
            JobWeight::Single => 1,
            JobWeight::ArrayExpanded => job.array_size(),
        };
        histogram.add(bucket(job.requested_nodes)?, count);
    }

    Ok(histogram)
}

/// Normalizes `payload` for storage under `label`.
///
/// The input is never modified; a new payload is returned.
///
/// # Errors
///
/// Returns `Error::MalformedPayload` if a `slurm-info` job list is not an
/// array of objects each carrying a positive node count.
pub fn normalize(label: &str, payload: &Payload) -> Result<Payload> {
    if label != SLURM_INFO_LABEL {
        return Ok(payload.clone());
    }

    let running = histogram_of(payload, RUNNING_JOBS_FIELD, JobWeight::Single)?;
    let pending = histogram_of(payload, PENDING_JOBS_FIELD, JobWeight::ArrayExpanded)?;

    debug!(
        running_jobs = running.total(),
        pending_jobs = pending.total(),
        "bucketed slurm job lists"
    );

    let mut normalized: Payload = payload
        .iter()
        .filter(|(key, _)| key.as_str() != RUNNING_JOBS_FIELD && key.as_str() != PENDING_JOBS_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    normalized.insert(RUNNING_HISTOGRAM_FIELD.to_string(), running.into());
    normalized.insert(PENDING_HISTOGRAM_FIELD.to_string(), pending.into());

    Ok(normalized)
}
