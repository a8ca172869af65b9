//! Catalog command implementation.
//!
//! Lists clusters and the labels recorded for them.

use std::io::Write;

use vcm_metrics::QueryService;

use crate::error::CliError;
use crate::output::{ClusterList, LabelList, OutputFormat};

/// Handler for the clusters and labels commands.
pub struct CatalogCommand<'a> {
    queries: &'a QueryService,
}

impl<'a> CatalogCommand<'a> {
    /// Creates a new catalog command handler.
    #[must_use]
    pub const fn new(queries: &'a QueryService) -> Self {
        Self { queries }
    }

    /// Prints every cluster with at least one measurement.
    ///
    /// # Errors
    ///
    /// Returns store errors unchanged.
    pub fn clusters<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let list = ClusterList {
            clusters: self.queries.clusters()?,
        };
        format.write(out, &list)
    }

    /// Prints the labels recorded for `cluster`.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Store` with a not-found error for an unwritten
    /// cluster.
    pub fn labels<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        cluster: &str,
    ) -> Result<(), CliError> {
        let list = LabelList {
            cluster: cluster.to_string(),
            labels: self.queries.store().labels(cluster)?,
        };
        format.write(out, &list)
    }
}
