//! Records reported by the upstream plugin API
//!
//! Every field has a default so a record missing keys still serializes with
//! the full key set.

use serde::{Deserialize, Serialize};

fn unknown() -> String {
    "Unknown".to_string()
}

fn info_level() -> String {
    "INFO".to_string()
}

fn yes() -> bool {
    true
}

/// `GET /api/status` payload. The plugin emits snake_case keys, older builds
/// camelCase; both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(
        default = "unknown",
        rename(serialize = "server_version", deserialize = "serverVersion"),
        alias = "server_version"
    )]
    pub server_version: String,

    #[serde(
        default = "unknown",
        rename(serialize = "minecraft_version", deserialize = "minecraftVersion"),
        alias = "minecraft_version"
    )]
    pub minecraft_version: String,

    #[serde(
        default = "unknown",
        rename(serialize = "plugin_version", deserialize = "pluginVersion"),
        alias = "plugin_version"
    )]
    pub plugin_version: String,

    /// `None` when the payload has no `online` key; callers pick the default
    #[serde(default)]
    pub online: Option<bool>,
}

/// Entry of `GET /api/plugins`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    #[serde(default = "unknown")]
    pub name: String,
    #[serde(default = "unknown")]
    pub version: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub authors: Vec<String>,
}

/// Entry of `GET /api/players`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    #[serde(default = "unknown")]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub ping: i64,
}

/// Entry of `GET /api/logs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "info_level")]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub logger: String,
}

/// Entry of `GET /api/logs/errors`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub plugin: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stacktrace: Option<String>,
}

/// Entry of `GET /api/logs/warnings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub plugin: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Entry of `GET /api/commands`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInfo {
    #[serde(default = "unknown")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub usage: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub permission: String,
    #[serde(default = "unknown")]
    pub plugin: String,
}

/// Entry of the `results` array of `POST /api/command`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawCommandResult {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub output: String,
    #[serde(default = "yes")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of one command as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub command: String,
    pub output: String,
    pub success: bool,
    pub error: Option<String>,
}

impl CommandResult {
    /// Upstream answer for `sent`; a response without results counts as success
    pub fn from_raw(sent: &str, raw: Option<RawCommandResult>) -> Self {
        match raw {
            Some(raw) => Self {
                command: raw.command.unwrap_or_else(|| sent.to_string()),
                output: raw.output,
                success: raw.success,
                error: raw.error,
            },
            None => Self {
                command: sent.to_string(),
                output: String::new(),
                success: true,
                error: None,
            },
        }
    }

    /// The command never produced an upstream answer
    pub fn failed(sent: &str, error: impl Into<String>) -> Self {
        Self {
            command: sent.to_string(),
            output: String::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}
