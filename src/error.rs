//! Central error types for the APIService operator
//!
//! Uses `thiserror` for ergonomic, type-safe error handling with
//! automatic `Display` and `Error` trait implementations.

use std::fmt;

use thiserror::Error;

/// Central error type for the APIService operator
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error from kube-rs
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Registration manifest could not be parsed
    #[error("Manifest error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Registration manifest could not be read
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Resource not found in the cluster
    #[error("Resource not found: {kind}/{name}")]
    NotFound { kind: String, name: String },

    /// One or more registrations are applied but not being served.
    /// The message is already formatted for the status condition.
    #[error("{0}")]
    Unavailable(String),

    /// Several independent failures collected during one sync cycle
    #[error("{0}")]
    Aggregate(AggregateError),

    /// Errors observed while the process was shutting down
    #[error("{0}")]
    ShuttingDown(String),
}

/// Result type alias for operator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Check if this error type should trigger a fast retry
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(_) | Error::Unavailable(_) => true,
            Error::Aggregate(agg) => agg.errors().iter().any(Error::is_retriable),
            _ => false,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "kube",
            Error::SerializationError(_) | Error::YamlError(_) => "serialization",
            Error::IoError(_) => "io",
            Error::ConfigError(_) => "config",
            Error::NotFound { .. } => "not_found",
            Error::Unavailable(_) => "unavailable",
            Error::Aggregate(_) => "aggregate",
            Error::ShuttingDown(_) => "shutdown",
        }
    }

    /// True when the Kubernetes API answered 404
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(e)) => e.code == 404,
            Error::NotFound { .. } => true,
            _ => false,
        }
    }
}

/// A list of errors collected while reconciling a batch of objects.
///
/// Displays like the Kubernetes aggregate: a single error prints as itself,
/// several print as `[a, b, c]`.
#[derive(Debug)]
pub struct AggregateError(Vec<Error>);

impl AggregateError {
    pub fn errors(&self) -> &[Error] {
        &self.0
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [only] = self.0.as_slice() {
            return write!(f, "{}", only);
        }
        write!(f, "[")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", err)?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for AggregateError {}

/// Fold collected errors into one. No errors means success.
pub fn aggregate(errors: Vec<Error>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Aggregate(AggregateError(errors)))
    }
}
