//! Tool result envelopes
//!
//! Each tool returns one of these types. All list and count fields are always
//! serialized, so a failed call has the same key set as a successful one plus
//! `error` (and `error_type` for unexpected internal failures).

use crate::error::SmcError;
use crate::outcome::UpstreamError;
use crate::records::{
    CommandInfo, CommandResult, ErrorEntry, LogEntry, PlayerInfo, PluginInfo, WarningEntry,
};
use serde::Serialize;

/// Message for tools invoked with a credential that has no session
pub const NOT_CONNECTED: &str = "Not connected with this API key. Use 'connect' tool first.";

/// Failure part of a tool result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ToolFailure {
    /// Expected failure: validation, missing session, upstream answer
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_type: None,
        }
    }

    /// Unexpected failure caught at the adapter boundary
    pub fn unexpected(err: &SmcError) -> Self {
        Self {
            error: format!("Unexpected error: {}", err),
            error_type: Some(err.kind().to_string()),
        }
    }

    pub fn not_connected() -> Self {
        Self::new(NOT_CONNECTED)
    }
}

impl From<UpstreamError> for ToolFailure {
    fn from(err: UpstreamError) -> Self {
        Self::new(err.to_string())
    }
}

/// Common behaviour of tool results
pub trait ToolOutput: Serialize + Send + 'static {
    /// Schema-complete result carrying only a failure
    fn from_failure(failure: ToolFailure) -> Self;

    fn failure(&self) -> Option<&ToolFailure>;
}

macro_rules! tool_output {
    ($ty:ty) => {
        impl ToolOutput for $ty {
            fn from_failure(failure: ToolFailure) -> Self {
                Self {
                    failure: Some(failure),
                    ..Default::default()
                }
            }

            fn failure(&self) -> Option<&ToolFailure> {
                self.failure.as_ref()
            }
        }
    };
}

/// Summary of the server returned by `connect`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerSummary {
    pub server_version: String,
    pub minecraft_version: String,
    pub online: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct ConnectOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerSummary>,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(ConnectOutput);

#[derive(Debug, Default, Serialize)]
pub struct DisconnectOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_connections: Option<usize>,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(DisconnectOutput);

/// One live session as reported by `list_servers`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub api_key: String,
    pub url: String,
    pub connected_at: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ListServersOutput {
    pub servers: Vec<SessionInfo>,
    pub count: usize,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(ListServersOutput);

#[derive(Debug, Default, Serialize)]
pub struct StatusOutput {
    pub connected: bool,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minecraft_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_version: Option<String>,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(StatusOutput);

#[derive(Debug, Default, Serialize)]
pub struct PluginsOutput {
    pub plugins: Vec<PluginInfo>,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(PluginsOutput);

#[derive(Debug, Default, Serialize)]
pub struct SendCommandOutput {
    pub results: Vec<CommandResult>,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(SendCommandOutput);

#[derive(Debug, Default, Serialize)]
pub struct LogsOutput {
    pub logs: Vec<LogEntry>,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(LogsOutput);

#[derive(Debug, Default, Serialize)]
pub struct PlayersOutput {
    pub count: usize,
    pub players: Vec<PlayerInfo>,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(PlayersOutput);

#[derive(Debug, Default, Serialize)]
pub struct ErrorsOutput {
    pub errors: Vec<ErrorEntry>,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(ErrorsOutput);

#[derive(Debug, Default, Serialize)]
pub struct WarningsOutput {
    pub warnings: Vec<WarningEntry>,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(WarningsOutput);

#[derive(Debug, Default, Serialize)]
pub struct CommandsOutput {
    pub commands: Vec<CommandInfo>,
    pub count: usize,
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(CommandsOutput);

/// Result of an unknown tool name
#[derive(Debug, Default, Serialize)]
pub struct UnknownToolOutput {
    #[serde(flatten)]
    pub failure: Option<ToolFailure>,
}
tool_output!(UnknownToolOutput);
