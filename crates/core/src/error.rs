//! Mapper error model.

use thiserror::Error;

/// Result type used across the mapper and its backends.
pub type MapperResult<T> = Result<T, MapperError>;

/// Mapper-level error.
///
/// A query that matches nothing is not an error: single-document reads return
/// `None` and multi-document reads return an empty sequence. Writes the backend
/// reports as a result (unacknowledged, zero matched) are returned as that
/// result, not translated into an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapperError {
    /// The mapper or client was used in an invalid configuration
    /// (no entity prototype, authentication without a username, unknown driver).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backend is unreachable or not available in this build.
    #[error("connection error: {0}")]
    Connection(String),

    /// An identifier string could not be converted to a native id.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Update/remove was called without a filter on an entity that has no identifier.
    #[error("entity has no identifier and no explicit filter was given")]
    MissingIdentifier,

    /// An entity could not be converted to or from a document.
    #[error("hydration failed: {0}")]
    Hydration(String),

    /// The backend rejected the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// The call's deadline elapsed before the backend was reached.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The call was cancelled by its caller.
    #[error("operation cancelled")]
    Cancelled,
}

impl MapperError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn hydration(msg: impl Into<String>) -> Self {
        Self::Hydration(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<bson::ser::Error> for MapperError {
    fn from(value: bson::ser::Error) -> Self {
        Self::Hydration(format!("extract: {value}"))
    }
}

impl From<bson::de::Error> for MapperError {
    fn from(value: bson::de::Error) -> Self {
        Self::Hydration(format!("hydrate: {value}"))
    }
}
