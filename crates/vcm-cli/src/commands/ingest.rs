//! Ingest command implementation.
//!
//! Reads one JSON object and appends it to a cluster's log.

use std::fs;
use std::io::{Read, Write};

use serde_json::Value;
use tracing::debug;
use vcm_metrics::{ClusterStore, Payload};

use crate::cli::IngestArgs;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the ingest command.
pub struct IngestCommand<'a> {
    store: &'a ClusterStore,
}

impl<'a> IngestCommand<'a> {
    /// Creates a new ingest command handler.
    #[must_use]
    pub const fn new(store: &'a ClusterStore) -> Self {
        Self { store }
    }

    /// Appends the payload from `args.file`, or from `input` when no file is
    /// given, and prints the stored measurement.
    ///
    /// # Errors
    ///
    /// Returns `CliError::InvalidArgument` if the payload is not a JSON
    /// object, and store errors unchanged.
    pub fn execute<W: Write, R: Read>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &IngestArgs,
        mut input: R,
    ) -> Result<(), CliError> {
        let raw = match &args.file {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                CliError::InvalidArgument(format!("cannot read '{}': {e}", path.display()))
            })?,
            None => {
                let mut buf = String::new();
                input.read_to_string(&mut buf)?;
                buf
            }
        };

        let payload = parse_payload(&raw)?;
        let stored = self.store.append(&args.cluster, &args.label, &payload)?;
        debug!(
            cluster = %stored.cluster_id,
            label = %stored.label,
            sequence_id = %stored.sequence_id,
            "ingested measurement"
        );

        format.write(out, &stored)?;
        Ok(())
    }
}

fn parse_payload(raw: &str) -> Result<Payload, CliError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CliError::InvalidArgument(format!("payload is not valid JSON: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CliError::InvalidArgument(format!(
            "payload must be a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
