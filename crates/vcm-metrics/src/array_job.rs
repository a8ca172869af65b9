//! Array-job expansion for pending Slurm jobs.
//!
//! Slurm reports a pending array job as a single entry whose id carries the
//! index range, e.g. `4242_[5-9]`. [`expand`] turns that into the number of
//! queued tasks it stands for.
//!
//! This is a text heuristic, not a job-id parser. Known limitations:
//! - any bracketed `[a-b]` pair is taken as an array range, even if the id
//!   uses brackets for something else
//! - only the first bracketed range counts; comma lists (`[1-3,7]`) and
//!   throttles (`[0-15%4]`) do not match and count as one job

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches a bracketed decimal range such as `[5-9]`.
static ARRAY_RANGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)-(\d+)\]").unwrap_or_else(|_| unreachable!()));

/// Returns how many jobs `job_id` represents. Always at least 1.
#[must_use]
pub fn expand(job_id: &str) -> u64 {
    let Some(caps) = ARRAY_RANGE_REGEX.captures(job_id) else {
        return 1;
    };

    let lower = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok());
    let upper = caps.get(2).and_then(|m| m.as_str().parse::<u64>().ok());

    match (lower, upper) {
        (Some(lower), Some(upper)) if lower <= upper => (upper - lower).saturating_add(1),
        _ => 1,
    }
}
