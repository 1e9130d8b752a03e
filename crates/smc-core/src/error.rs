//! Error types for the bridge

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, SmcError>;

/// Bridge error types
#[derive(Debug, Error)]
pub enum SmcError {
    /// A tool argument was missing or malformed
    #[error("{0}")]
    InvalidArgument(String),

    /// Startup configuration was rejected
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream payload did not have the expected shape
    #[error("Invalid upstream payload: {0}")]
    InvalidPayload(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O failure on the local side (stdio, log file)
    #[error("IO error: {0}")]
    Io(String),
}

impl SmcError {
    /// Category name reported to callers as `error_type`
    pub fn kind(&self) -> &'static str {
        match self {
            SmcError::InvalidArgument(_) => "InvalidArgument",
            SmcError::Config(_) => "ConfigError",
            SmcError::InvalidPayload(_) => "InvalidPayload",
            SmcError::Serialization(_) => "SerializationError",
            SmcError::Io(_) => "IoError",
        }
    }
}

impl From<serde_json::Error> for SmcError {
    fn from(err: serde_json::Error) -> Self {
        SmcError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SmcError {
    fn from(err: std::io::Error) -> Self {
        SmcError::Io(err.to_string())
    }
}

/// JSON-RPC error codes used on the MCP channel
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}
