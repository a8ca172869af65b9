//! Query command implementation.
//!
//! Handles the latest, recent, range and history reads.

use std::io::Write;

use vcm_metrics::{QueryConfig, QueryService};

use crate::cli::SeriesArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, RecentMeasurements};

/// Which read to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// The single latest measurement.
    Latest,
    /// Up to `n` latest measurements.
    Recent {
        /// Explicit count, or the configured default.
        n: Option<usize>,
    },
    /// Measurements of a lookback window with their age.
    Range {
        /// Explicit lookback, or the configured default.
        minutes: Option<u64>,
    },
    /// Lookback window pivoted into columns.
    History {
        /// Explicit lookback, or the configured default.
        minutes: Option<u64>,
    },
}

/// Handler for series reads.
pub struct QueryCommand<'a> {
    queries: &'a QueryService,
    defaults: &'a QueryConfig,
}

impl<'a> QueryCommand<'a> {
    /// Creates a new query command handler.
    #[must_use]
    pub const fn new(queries: &'a QueryService, defaults: &'a QueryConfig) -> Self {
        Self { queries, defaults }
    }

    /// Executes one read against `series`.
    ///
    /// # Errors
    ///
    /// Returns store errors unchanged.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        series: &SeriesArgs,
        kind: QueryKind,
    ) -> Result<(), CliError> {
        let (cluster, label) = (series.cluster.as_str(), series.label.as_str());

        match kind {
            QueryKind::Latest => {
                let latest = self.queries.snapshot(cluster, label)?;
                format.write(out, &latest)?;
            }
            QueryKind::Recent { n } => {
                let n = n.unwrap_or(self.defaults.default_recent);
                let recent = self.queries.recent(cluster, label, n)?;
                format.write(out, &RecentMeasurements(recent))?;
            }
            QueryKind::Range { minutes } => {
                let minutes = minutes.unwrap_or(self.defaults.default_lookback_minutes);
                let range = self.queries.range(cluster, label, minutes)?;
                format.write(out, &range)?;
            }
            QueryKind::History { minutes } => {
                let minutes = minutes.unwrap_or(self.defaults.default_lookback_minutes);
                let history = self.queries.history(cluster, label, minutes)?;
                format.write(out, &history)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use serde_json::{Value, json};
    use vcm_metrics::ClusterStore;

    fn series(label: &str) -> SeriesArgs {
        SeriesArgs {
            cluster: "bristen".into(),
            label: label.into(),
        }
    }

    fn seeded(records: usize) -> QueryService {
        let store = ClusterStore::in_memory();
        for i in 1..=records {
            let payload = json!({"real_time": i});
            store
                .append("bristen", "home-response", payload.as_object().unwrap())
                .unwrap();
        }
        QueryService::new(store)
    }

    fn run_json(queries: &QueryService, defaults: &QueryConfig, kind: QueryKind) -> Value {
        let mut out = Vec::new();
        QueryCommand::new(queries, defaults)
            .execute(&mut out, &OutputFormat::new(Format::Json), &series("home-response"), kind)
            .unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn latest_prints_last_record() {
        let queries = seeded(3);
        let value = run_json(&queries, &QueryConfig::default(), QueryKind::Latest);
        assert_eq!(value["payload"]["real_time"], json!(3));
    }

    #[test]
    fn recent_uses_configured_default() {
        let queries = seeded(5);
        let defaults = QueryConfig {
            default_recent: 2,
            ..QueryConfig::default()
        };

        let value = run_json(&queries, &defaults, QueryKind::Recent { n: None });
        assert_eq!(value.as_array().map(Vec::len), Some(2));

        let value = run_json(&queries, &defaults, QueryKind::Recent { n: Some(4) });
        assert_eq!(value.as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn range_and_history_cover_fresh_records() {
        let queries = seeded(2);
        let defaults = QueryConfig::default();

        let range = run_json(&queries, &defaults, QueryKind::Range { minutes: None });
        assert_eq!(range["points"].as_array().map(Vec::len), Some(2));

        let history = run_json(&queries, &defaults, QueryKind::History { minutes: Some(5) });
        assert_eq!(history["count"], json!(2));
        assert_eq!(history["real_time"], json!([1, 2]));
    }

    #[test]
    fn unknown_label_is_not_found() {
        let queries = seeded(1);
        let err = QueryCommand::new(&queries, &QueryConfig::default())
            .execute(
                &mut Vec::new(),
                &OutputFormat::default(),
                &series("slurm-info"),
                QueryKind::Latest,
            )
            .unwrap_err();
        assert_eq!(err.code(), 3);
    }
}
