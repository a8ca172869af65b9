//! # vcm-cli
//!
//! Operator command-line interface for the vcmon measurement store.
//!
//! Provides commands for:
//! - Ingesting measurements (Slurm snapshots, node status, filesystem probes)
//! - Reading the latest or most recent measurements of a series
//! - Range and history queries over a lookback window
//! - Listing clusters and labels
//!
//! The CLI opens the store in-process from a [`vcm_metrics::StoreConfig`]
//! built from `--config` and `--data-dir`, runs one command and closes it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, IngestArgs, SeriesArgs};
pub use error::CliError;
pub use output::OutputFormat;
