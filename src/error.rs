//! Error types for the namespace limiter

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid namespace regex {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unexpected admission object: expected v1/Namespace, got {0}")]
    UnexpectedKind(String),

    #[error("Failed to list namespaces: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the decision could not be computed because the namespace
    /// population was unavailable.
    ///
    /// Indeterminate errors are resolved by the webhook's failure policy.
    /// Every other error is a wiring or configuration fault.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Error::Store(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
