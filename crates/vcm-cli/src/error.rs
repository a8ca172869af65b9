//! CLI error types.

use std::fmt;
use std::process::ExitCode;

use vcm_metrics::ErrorKind;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Invalid configuration.
    Config(String),
    /// Store operation failed.
    Store(vcm_metrics::Error),
    /// Output formatting error.
    Format(String),
    /// Invalid argument.
    InvalidArgument(String),
    /// IO error.
    Io(std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Numeric exit status: `2` for bad input, `3` when the requested data
    /// does not exist, `1` otherwise.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::InvalidArgument(_) => 2,
            Self::Store(e) => match e.kind() {
                ErrorKind::InvalidInput | ErrorKind::MalformedPayload => 2,
                ErrorKind::NotFound => 3,
                ErrorKind::StoreUnavailable => 1,
            },
            Self::Format(_) | Self::Io(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Store(e) => write!(f, "{e}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<vcm_metrics::Error> for CliError {
    fn from(err: vcm_metrics::Error) -> Self {
        Self::Store(err)
    }
}
