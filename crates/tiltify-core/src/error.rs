//! Error types for the Tiltify bridge
//!
//! This module defines all error types used throughout the crate.
//!
//! The variants group into three families that the engine treats differently:
//!
//! - **Configuration** ([`Error::Config`]): surfaced at `connect()` time, never retried.
//! - **Upstream** ([`Error::Upstream`], [`Error::Authentication`],
//!   [`Error::RateLimited`], [`Error::Timeout`]): abort the current tick, retried
//!   on the next one.
//! - **Storage** ([`Error::StateStore`], [`Error::NotFound`]): `NotFound` on a state
//!   path is the "not initialized yet" signal; anything else aborts the tick.

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the Tiltify bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-success status or malformed payload from the donation source
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Authentication errors (rejected credential)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// An upstream call did not finish within the configured timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// State path or remote resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// The event sink rejected an event
    #[error("Event sink error: {0}")]
    EventSink(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create an event sink error
    pub fn event_sink(msg: impl Into<String>) -> Self {
        Self::EventSink(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// `true` if this is a [`Error::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// `true` for every error the donation source can produce for a single call
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::Authentication(_) | Self::RateLimited(_) | Self::Timeout(_)
        )
    }

    /// `true` if this is a [`Error::Config`]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
