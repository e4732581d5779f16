//! Error types for the relay.

use std::time::Duration;

use thiserror::Error;

/// Failure while handing a command to the broker.
///
/// These never reach the HTTP caller; the pipeline logs and drops them.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Command could not be encoded for the wire
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Broker did not answer before the deadline
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),
}

/// Malformed URL-encoded form body.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormError {
    /// `%` not followed by two hex digits
    #[error("invalid percent escape at byte {0}")]
    InvalidEscape(usize),

    /// `;` is not accepted as a pair separator
    #[error("invalid semicolon separator in form data")]
    Semicolon,
}
