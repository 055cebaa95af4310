//! Error types for pattern lookup and the generation service.

use thiserror::Error;

/// Pattern lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("unknown pattern: {0}")]
    Unknown(String),
}

/// Failures while calling the generation service.
///
/// The orchestrator never propagates these; it renders them into the
/// pattern's result as `"Error: {self}"`.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// The request never produced a response (DNS, connect, timeout...).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body was not the expected JSON shape.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// No credentials were configured.
    #[error("{0} is not set")]
    MissingApiKey(&'static str),

    /// Anything else a custom generator wants to report.
    #[error("{0}")]
    Other(String),
}

impl GenerateError {
    /// Whether the failure came from the remote side rather than the transport.
    pub fn is_api_error(&self) -> bool {
        matches!(self, GenerateError::Api { .. })
    }
}
