//! Store configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! backend = "directory"
//! data_dir = "/var/lib/vcmon"
//! fsync = true
//!
//! [query]
//! default_recent = 10
//! default_lookback_minutes = 1440
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where measurements are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process memory only. Lost on exit.
    Memory,
    /// One JSON-lines file per cluster under `data_dir`.
    #[default]
    Directory,
}

/// Defaults applied by callers that do not pass an explicit `n` or lookback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    /// Record count for "recent" queries.
    pub default_recent: usize,
    /// Lookback for range and history queries, in minutes.
    pub default_lookback_minutes: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_recent: 10,
            default_lookback_minutes: 24 * 60,
        }
    }
}

/// Configuration for [`crate::ClusterStore::open`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Storage backend.
    pub backend: BackendKind,
    /// Directory holding the per-cluster logs.
    pub data_dir: PathBuf,
    /// Whether every appended line is synced to disk before `append` returns.
    pub fsync: bool,
    /// Query defaults.
    pub query: QueryConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Directory,
            data_dir: PathBuf::from("vcmon-data"),
            fsync: false,
            query: QueryConfig::default(),
        }
    }
}

impl StoreConfig {
    /// An in-memory configuration, mostly for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Default::default()
        }
    }

    /// A directory-backed configuration rooted at `data_dir`.
    #[must_use]
    pub fn directory(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Directory,
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Sets whether appends are synced to disk.
    #[must_use]
    pub const fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the file cannot be read, parsed or
    /// validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::invalid_input(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::invalid_input(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Directory && self.data_dir.as_os_str().is_empty() {
            return Err(Error::invalid_input(
                "data_dir cannot be empty for the directory backend",
            ));
        }

        if self.query.default_recent == 0 {
            return Err(Error::invalid_input(
                "query.default_recent must be greater than 0",
            ));
        }

        if self.query.default_lookback_minutes == 0 {
            return Err(Error::invalid_input(
                "query.default_lookback_minutes must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = StoreConfig::from_toml("").expect("empty config is valid");
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.backend, BackendKind::Directory);
        assert_eq!(config.query.default_recent, 10);
        assert_eq!(config.query.default_lookback_minutes, 1440);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            backend = "directory"
            data_dir = "/var/lib/vcmon"
            fsync = true

            [query]
            default_recent = 25
            default_lookback_minutes = 60
        "#;

        let config = StoreConfig::from_toml(toml).expect("should parse full config");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/vcmon"));
        assert!(config.fsync);
        assert_eq!(config.query.default_recent, 25);
        assert_eq!(config.query.default_lookback_minutes, 60);
    }

    #[test]
    fn test_parse_memory_backend() {
        let config = StoreConfig::from_toml("backend = \"memory\"").expect("parse");
        assert_eq!(config.backend, BackendKind::Memory);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = StoreConfig::from_toml("backend = \"postgres\"");
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn test_zero_defaults_rejected() {
        let result = StoreConfig::from_toml("[query]\ndefault_recent = 0");
        assert!(result.is_err());

        let result = StoreConfig::from_toml("[query]\ndefault_lookback_minutes = 0");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_data_dir_rejected() {
        let result = StoreConfig::from_toml("data_dir = \"\"");
        assert!(result.is_err());

        let result = StoreConfig::from_toml("backend = \"memory\"\ndata_dir = \"\"");
        assert!(result.is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "fsync = true").expect("write");

        let config = StoreConfig::from_file(file.path()).expect("load");
        assert!(config.fsync);
    }

    #[test]
    fn test_missing_file() {
        let result = StoreConfig::from_file("/nonexistent/vcmon.toml");
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
    }
}
