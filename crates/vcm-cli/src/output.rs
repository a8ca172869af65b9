//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use vcm_metrics::{ClusterId, Histogram, History, Measurement, RangeResult};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

impl TableDisplay for Measurement {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{} / {}", self.cluster_id, self.label)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Sequence:     {}", self.sequence_id)?;
        writeln!(writer, "Recorded at:  {}", timestamp(self.recorded_at))?;
        writeln!(writer)?;

        let mut histograms = Vec::new();
        for (key, value) in &self.payload {
            match as_histogram(value) {
                Some(histogram) if key.ends_with("_histogram") => histograms.push((key, histogram)),
                _ => writeln!(writer, "{:<28}  {}", key, truncate(&compact(value), 48))?,
            }
        }

        for (key, histogram) in histograms {
            writeln!(writer)?;
            write_histogram(writer, key, &histogram)?;
        }
        Ok(())
    }
}

/// Most recent measurements of one series.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RecentMeasurements(pub Vec<Measurement>);

impl TableDisplay for RecentMeasurements {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.0.is_empty() {
            writeln!(writer, "No measurements")?;
            return Ok(());
        }

        writeln!(writer, "{:>8}  {:<20}  {}", "SEQ", "RECORDED AT", "PAYLOAD")?;
        writeln!(writer, "{}", "─".repeat(96))?;
        for m in &self.0 {
            writeln!(
                writer,
                "{:>8}  {:<20}  {}",
                m.sequence_id.0,
                timestamp(m.recorded_at),
                truncate(&compact_payload(m), 64)
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} measurement(s)", self.0.len())?;
        Ok(())
    }
}

impl TableDisplay for RangeResult {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "From: {}", timestamp(self.from))?;
        writeln!(writer, "To:   {}", timestamp(self.now))?;
        writeln!(writer, "══════════════════════════════════════════════════")?;

        if self.points.is_empty() {
            writeln!(writer, "No data")?;
            return Ok(());
        }

        writeln!(writer, "{:>8}  {:>9}  {}", "SEQ", "HOURS AGO", "PAYLOAD")?;
        writeln!(writer, "{}", "─".repeat(96))?;
        for point in &self.points {
            writeln!(
                writer,
                "{:>8}  {:>9.2}  {}",
                point.measurement.sequence_id.0,
                point.hours_ago,
                truncate(&compact_payload(&point.measurement), 75)
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} point(s)", self.points.len())?;
        Ok(())
    }
}

impl TableDisplay for History {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.count == 0 {
            writeln!(writer, "No data")?;
            return Ok(());
        }

        // histogram columns don't fit a row; the JSON output carries them
        let scalar: Vec<(&String, &Vec<Value>)> = self
            .columns
            .iter()
            .filter(|(_, values)| values.iter().all(|v| !v.is_array() && !v.is_object()))
            .collect();

        write!(writer, "{:>9}", "HOURS AGO")?;
        for (key, _) in &scalar {
            write!(writer, "  {:>20}", truncate(key, 20))?;
        }
        writeln!(writer)?;
        writeln!(writer, "{}", "─".repeat(9 + 22 * scalar.len()))?;

        for row in 0..self.count {
            let shift = self.time_shift.get(row).copied().unwrap_or_default();
            write!(writer, "{shift:>9.2}")?;
            for (_, values) in &scalar {
                let cell = values.get(row).map(compact).unwrap_or_default();
                write!(writer, "  {:>20}", truncate(&cell, 20))?;
            }
            writeln!(writer)?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} record(s)", self.count)?;
        Ok(())
    }
}

/// Clusters with data.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterList {
    /// Cluster ids, sorted.
    pub clusters: Vec<ClusterId>,
}

impl TableDisplay for ClusterList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.clusters.is_empty() {
            writeln!(writer, "No clusters")?;
            return Ok(());
        }
        for cluster in &self.clusters {
            writeln!(writer, "{cluster}")?;
        }
        writeln!(writer)?;
        writeln!(writer, "Total: {} cluster(s)", self.clusters.len())?;
        Ok(())
    }
}

/// Labels recorded for one cluster.
#[derive(Debug, Clone, Serialize)]
pub struct LabelList {
    /// Cluster id.
    pub cluster: String,
    /// Labels, sorted.
    pub labels: Vec<String>,
}

impl TableDisplay for LabelList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Labels of {}", self.cluster)?;
        writeln!(writer, "══════════════════════════════════")?;
        for label in &self.labels {
            writeln!(writer, "  {label}")?;
        }
        writeln!(writer)?;
        writeln!(writer, "Total: {} label(s)", self.labels.len())?;
        Ok(())
    }
}

fn write_histogram<W: Write>(writer: &mut W, key: &str, histogram: &Histogram) -> Result<(), CliError> {
    writeln!(writer, "{key} ({} jobs)", histogram.total())?;
    for (band, count) in Histogram::BAND_LABELS.iter().zip(histogram.counts()) {
        writeln!(writer, "  {band:>7} nodes  {count:>8}")?;
    }
    Ok(())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn as_histogram(value: &Value) -> Option<Histogram> {
    serde_json::from_value(value.clone()).ok()
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compact_payload(m: &Measurement) -> String {
    Value::Object(m.payload.clone()).to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    } else {
        s.chars().take(max_len).collect()
    }
}
