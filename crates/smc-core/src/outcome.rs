//! Result of a single upstream call

use serde_json::Value;
use thiserror::Error;

/// Outcome of one logical upstream operation: the decoded payload or a
/// classified failure. Request clients return this and never panic or raise.
pub type RequestOutcome = std::result::Result<Value, UpstreamError>;

/// Message reported for an HTTP 401
pub const AUTHENTICATION_FAILED: &str = "Authentication failed. Invalid API key.";

/// Classified upstream failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Upstream rejected the credential (HTTP 401). Terminal.
    #[error("{}", AUTHENTICATION_FAILED)]
    Unauthorized,

    /// Any other HTTP error response. Terminal.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Timeout, refused connection or other transport fault, reported after
    /// the retry budget was spent
    #[error("{0}")]
    Transport(String),

    /// The session's HTTP client was already released
    #[error("Client session is closed")]
    Closed,
}

impl UpstreamError {
    /// HTTP status for the failure; 0 when no response was received
    pub fn status_code(&self) -> u16 {
        match self {
            UpstreamError::Unauthorized => 401,
            UpstreamError::Http { status, .. } => *status,
            UpstreamError::Transport(_) | UpstreamError::Closed => 0,
        }
    }

    /// Whether another attempt could change the result
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transport(_))
    }
}
