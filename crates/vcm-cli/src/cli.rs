//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use vcm_metrics::{BackendKind, StoreConfig};

use crate::error::CliError;

/// vcmon - per-cluster measurement log.
#[derive(Parser, Debug, Clone)]
#[command(name = "vcmon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Store configuration file (TOML).
    #[arg(short, long, env = "VCMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory; overrides the config file and selects the directory
    /// backend.
    #[arg(short, long, env = "VCMON_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolves the store configuration from `--config` and `--data-dir`.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` if the file cannot be loaded or the result
    /// does not validate.
    pub fn store_config(&self) -> Result<StoreConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::from_file(path).map_err(|e| CliError::Config(e.to_string()))?,
            None => StoreConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.backend = BackendKind::Directory;
            config.data_dir.clone_from(dir);
        }

        config
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(config)
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Append one measurement.
    ///
    /// The payload is a JSON object read from `--file`, or from stdin when
    /// no file is given. `slurm-info` payloads are turned into histograms
    /// before storage.
    Ingest(IngestArgs),

    /// Show the latest measurement for a label.
    Latest(SeriesArgs),

    /// Show the most recent measurements for a label.
    Recent {
        /// Cluster and label.
        #[command(flatten)]
        series: SeriesArgs,

        /// Number of measurements [default: query.default_recent].
        #[arg(short)]
        n: Option<usize>,
    },

    /// Show measurements of the last minutes with their age.
    Range {
        /// Cluster and label.
        #[command(flatten)]
        series: SeriesArgs,

        /// Lookback in minutes [default: query.default_lookback_minutes].
        #[arg(short, long)]
        minutes: Option<u64>,
    },

    /// Show the last minutes as per-key columns.
    History {
        /// Cluster and label.
        #[command(flatten)]
        series: SeriesArgs,

        /// Lookback in minutes [default: query.default_lookback_minutes].
        #[arg(short, long)]
        minutes: Option<u64>,
    },

    /// List clusters with at least one measurement.
    Clusters,

    /// List the labels recorded for a cluster.
    Labels {
        /// Cluster id.
        cluster: String,
    },
}

/// Cluster and label of one series.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SeriesArgs {
    /// Cluster id.
    pub cluster: String,

    /// Measurement label, e.g. `slurm-info`.
    pub label: String,
}

/// Arguments for the ingest command.
#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Cluster id.
    pub cluster: String,

    /// Measurement label.
    pub label: String,

    /// Read the payload from this file instead of stdin.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}
