//! Error types for the vcm-metrics crate.

use thiserror::Error;

/// Errors that can occur while ingesting or querying measurements.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument is outside its domain (node count, cluster id, `n`, range).
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Why the input was rejected.
        reason: String,
    },

    /// A payload does not satisfy the shape its label's transform requires.
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// Which field was malformed and how.
        reason: String,
    },

    /// The durable medium could not be reached or written.
    #[error("store unavailable: {reason}")]
    StoreUnavailable {
        /// The underlying failure.
        reason: String,
    },

    /// No such cluster, label, or record.
    #[error("not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },
}

/// Discriminant of [`Error`], for callers that map failures to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::InvalidInput`].
    InvalidInput,
    /// See [`Error::MalformedPayload`].
    MalformedPayload,
    /// See [`Error::StoreUnavailable`].
    StoreUnavailable,
    /// See [`Error::NotFound`].
    NotFound,
}

impl Error {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::NotFound { .. } => ErrorKind::NotFound,
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Only medium failures are transient. Appends are safe to retry because a
    /// duplicate measurement is harmless.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// HTTP status the serving layer should answer with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } | Self::MalformedPayload { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::StoreUnavailable { .. } => 500,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::unavailable(format!("I/O error: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::unavailable(format!("serialization error: {err}"))
    }
}

/// Result type for vcm-metrics operations.
pub type Result<T> = std::result::Result<T, Error>;
