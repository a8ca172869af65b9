//! CLI command implementations.
//!
//! Each submodule implements a group of CLI commands:
//! - [`ingest`] - Appending measurements
//! - [`query`] - Latest, recent, range and history reads
//! - [`catalog`] - Listing clusters and labels

pub mod catalog;
pub mod ingest;
pub mod query;

pub use catalog::CatalogCommand;
pub use ingest::IngestCommand;
pub use query::{QueryCommand, QueryKind};
