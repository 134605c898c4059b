use std::sync::Arc;

use thiserror::Error;

/// Represents a result type for operations in the Optimizely SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing errors surfaced by the SDK facade.
///
/// Normal negative outcomes of a decision (audience mismatch, experiment not running, etc.) are
/// never reported as an `Error`. See [`NoAssignment`](crate::NoAssignment) for those.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The requested experiment key is not in the datafile.
    #[error("experiment {0:?} is not in the datafile")]
    UnknownExperiment(String),

    /// The requested event key is not in the datafile.
    #[error("event {0:?} is not in the datafile")]
    UnknownEventType(String),

    /// The datafile is not valid JSON or does not have the expected shape.
    #[error("error parsing datafile")]
    // serde_json::Error is not clonable, so we're wrapping it in an Arc.
    DatafileParseError(#[source] Arc<serde_json::Error>),

    /// The datafile version is not supported by this SDK.
    #[error("unsupported datafile version {0:?}, try upgrading the SDK")]
    UnsupportedDatafileVersion(String),

    /// The client configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::DatafileParseError(Arc::new(value))
    }
}
