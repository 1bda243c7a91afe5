//! Rebound error types

use crate::system::SpringId;
use thiserror::Error;

/// Errors surfaced by the spring engine
///
/// Every variant is a contract violation reported synchronously to the
/// caller. The engine does no I/O, so nothing here is retryable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReboundError {
    /// A required argument was missing or unusable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The spring id does not reference a registered spring
    #[error("Spring {0} does not reference a registered spring")]
    NotFound(SpringId),

    /// A spring preset file could not be parsed
    #[error("Invalid spring preset: {0}")]
    Preset(String),
}

impl From<toml::de::Error> for ReboundError {
    fn from(err: toml::de::Error) -> Self {
        ReboundError::Preset(err.to_string())
    }
}

/// Result type for rebound operations
pub type Result<T> = std::result::Result<T, ReboundError>;
