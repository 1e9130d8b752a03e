//! # smc-core
//!
//! Core types for the Minecraft server MCP bridge.
//!
//! This crate provides the types shared by the request client and the server:
//! - Credentials and their redacted/hashed forms
//! - Upstream request outcomes and failure classification
//! - Upstream record schemas with stable defaults
//! - Tool result envelopes
//! - Configuration validation and ISO-8601 time bounds

pub mod config;
pub mod credential;
pub mod error;
pub mod outcome;
pub mod output;
pub mod records;
pub mod time;

pub use config::{BridgeConfig, DEFAULT_TIMEOUT_SECS, normalize_base_url, timeout_from_secs};
pub use credential::{Credential, CredentialKey};
pub use error::{Result, SmcError, error_codes};
pub use outcome::{AUTHENTICATION_FAILED, RequestOutcome, UpstreamError};
pub use output::{NOT_CONNECTED, ToolFailure, ToolOutput};
pub use records::{
    CommandInfo, CommandResult, ErrorEntry, LogEntry, PlayerInfo, PluginInfo, RawCommandResult,
    ServerStatus, WarningEntry,
};
pub use time::TimeBound;
