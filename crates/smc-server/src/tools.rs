//! MCP tool catalog and dispatch

use crate::adapters;
use crate::mcp::{RequestId, Response};
use crate::registry::ConnectionRegistry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use smc_core::output::{
    CommandsOutput, ConnectOutput, DisconnectOutput, ErrorsOutput, LogsOutput, PlayersOutput,
    PluginsOutput, SendCommandOutput, StatusOutput, UnknownToolOutput, WarningsOutput,
};
use smc_core::{Credential, DEFAULT_TIMEOUT_SECS, SmcError, ToolFailure, ToolOutput};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tool definition for MCP tools/list
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn api_key_schema() -> Value {
    json!({
        "type": "string",
        "description": "API key of the server plugin, as used with 'connect'"
    })
}

fn limit_schema(default: u32) -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "description": format!("Maximum number of entries to return (plugin default {})", default)
    })
}

fn credential_only(name: &str, description: &str) -> ToolDef {
    ToolDef {
        name: name.into(),
        description: description.into(),
        input_schema: json!({
            "type": "object",
            "properties": { "api_key": api_key_schema() },
            "required": ["api_key"]
        }),
    }
}

/// Get list of available tools
pub fn list_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "connect".into(),
            description: "Connect to a Minecraft server plugin API. Must be called before the other tools. Example: {\"url\": \"http://localhost:8080\", \"api_key\": \"your-key\"}".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Base URL of the plugin API, e.g. http://localhost:8080"
                    },
                    "api_key": api_key_schema(),
                    "timeout": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Request timeout in seconds",
                        "default": DEFAULT_TIMEOUT_SECS
                    }
                },
                "required": ["url", "api_key"]
            }),
        },
        credential_only(
            "disconnect",
            "Disconnect the server connected with this API key",
        ),
        ToolDef {
            name: "list_servers".into(),
            description: "List all connected servers with redacted API keys".into(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        credential_only(
            "status",
            "Get server status: online state, server, Minecraft and plugin versions",
        ),
        credential_only("plugins", "List installed plugins with version and enabled state"),
        ToolDef {
            name: "send_command".into(),
            description: "Execute console commands in order. Example: {\"api_key\": \"your-key\", \"commands\": [\"time set day\", \"say hello\"]}".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "api_key": api_key_schema(),
                    "commands": {
                        "oneOf": [
                            { "type": "string" },
                            { "type": "array", "items": { "type": "string" } }
                        ],
                        "description": "Command or list of commands, without the leading slash"
                    }
                },
                "required": ["api_key", "commands"]
            }),
        },
        ToolDef {
            name: "get_logs".into(),
            description: "Get recent server log entries, optionally within a time range".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "api_key": api_key_schema(),
                    "limit": limit_schema(100),
                    "start_time": {
                        "type": "string",
                        "description": "ISO-8601 lower bound, e.g. 2024-01-15T10:00:00Z"
                    },
                    "end_time": {
                        "type": "string",
                        "description": "ISO-8601 upper bound"
                    }
                },
                "required": ["api_key"]
            }),
        },
        credential_only("player_list", "List online players with UUID and ping"),
        filtered_logs_tool("get_errors", "Get recent error log entries, optionally for one plugin"),
        filtered_logs_tool(
            "get_warnings",
            "Get recent warning log entries, optionally for one plugin",
        ),
        credential_only(
            "get_commands",
            "List registered commands with usage, aliases and owning plugin",
        ),
    ]
}

fn filtered_logs_tool(name: &str, description: &str) -> ToolDef {
    ToolDef {
        name: name.into(),
        description: description.into(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "api_key": api_key_schema(),
                "plugin": {
                    "type": "string",
                    "description": "Only entries reported by this plugin"
                },
                "limit": limit_schema(50)
            },
            "required": ["api_key"]
        }),
    }
}

const MISSING_API_KEY: &str = "Missing required parameter: api_key";
const MISSING_URL_AND_KEY: &str = "Missing required parameters: url and api_key";
const MISSING_COMMANDS: &str = "Missing required parameter: commands";

#[derive(Deserialize)]
struct CredentialArgs {
    #[serde(default, alias = "credential")]
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ConnectArgs {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "credential")]
    api_key: Option<String>,
    #[serde(default)]
    timeout: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandsArg {
    One(String),
    Many(Vec<String>),
}

impl CommandsArg {
    /// An empty string means no commands at all
    fn into_vec(self) -> Vec<String> {
        match self {
            CommandsArg::One(command) if command.is_empty() => Vec::new(),
            CommandsArg::One(command) => vec![command],
            CommandsArg::Many(commands) => commands,
        }
    }
}

#[derive(Deserialize)]
struct SendCommandArgs {
    #[serde(default, alias = "credential")]
    api_key: Option<String>,
    #[serde(default)]
    commands: Option<CommandsArg>,
}

#[derive(Deserialize)]
struct LogsArgs {
    #[serde(default, alias = "credential")]
    api_key: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
}

#[derive(Deserialize)]
struct FilteredLogsArgs {
    #[serde(default, alias = "credential")]
    api_key: Option<String>,
    #[serde(default)]
    plugin: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

fn parse_args<A: DeserializeOwned>(tool: &str, arguments: Value) -> Result<A, ToolFailure> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolFailure::new(format!("Invalid arguments for {}: {}", tool, e)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The credential exactly as given; blank values count as missing
fn present_credential(api_key: Option<String>) -> Option<Credential> {
    api_key
        .map(Credential::new)
        .filter(|credential| !credential.is_blank())
}

fn require_credential(api_key: Option<String>) -> Result<Credential, ToolFailure> {
    present_credential(api_key).ok_or_else(|| ToolFailure::new(MISSING_API_KEY))
}

fn positive_limit(limit: Option<i64>) -> Result<Option<u32>, ToolFailure> {
    match limit {
        None => Ok(None),
        Some(n) if n > 0 => Ok(Some(u32::try_from(n).unwrap_or(u32::MAX))),
        Some(_) => Err(ToolFailure::new("limit must be a positive integer")),
    }
}

fn positive_timeout(timeout: Option<i64>) -> Result<Duration, ToolFailure> {
    match timeout {
        None => Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        Some(secs) if secs > 0 => Ok(Duration::from_secs(secs.unsigned_abs())),
        Some(_) => Err(ToolFailure::new("timeout must be a positive integer")),
    }
}

fn render<T: ToolOutput>(result: Result<T, ToolFailure>) -> Value {
    let output = result.unwrap_or_else(T::from_failure);
    serde_json::to_value(&output).unwrap_or_else(|e| {
        let failure = ToolFailure::unexpected(&SmcError::from(e));
        json!({ "error": failure.error, "error_type": failure.error_type })
    })
}

async fn dispatch(name: &str, arguments: Value, registry: &ConnectionRegistry) -> Value {
    match name {
        "connect" => render(connect(arguments, registry).await),
        "disconnect" => render(disconnect(arguments, registry).await),
        "list_servers" => render(Ok(adapters::list_servers(registry))),
        "status" => render(status(arguments, registry).await),
        "plugins" => render(plugins(arguments, registry).await),
        "send_command" => render(send_command(arguments, registry).await),
        "get_logs" => render(get_logs(arguments, registry).await),
        "player_list" => render(player_list(arguments, registry).await),
        "get_errors" => render(get_errors(arguments, registry).await),
        "get_warnings" => render(get_warnings(arguments, registry).await),
        "get_commands" => render(get_commands(arguments, registry).await),
        _ => render::<UnknownToolOutput>(Err(ToolFailure::new(format!("Unknown tool: {}", name)))),
    }
}

async fn connect(arguments: Value, registry: &ConnectionRegistry) -> Result<ConnectOutput, ToolFailure> {
    let args: ConnectArgs = parse_args("connect", arguments)?;
    let (Some(url), Some(credential)) = (non_blank(args.url), present_credential(args.api_key))
    else {
        return Err(ToolFailure::new(MISSING_URL_AND_KEY));
    };
    let timeout = positive_timeout(args.timeout)?;
    Ok(adapters::connect(registry, &url, &credential, timeout).await)
}

async fn disconnect(
    arguments: Value,
    registry: &ConnectionRegistry,
) -> Result<DisconnectOutput, ToolFailure> {
    let args: CredentialArgs = parse_args("disconnect", arguments)?;
    let credential = require_credential(args.api_key)?;
    Ok(adapters::disconnect(registry, &credential).await)
}

async fn status(arguments: Value, registry: &ConnectionRegistry) -> Result<StatusOutput, ToolFailure> {
    let args: CredentialArgs = parse_args("status", arguments)?;
    let credential = require_credential(args.api_key)?;
    Ok(adapters::status(registry, &credential).await)
}

async fn plugins(arguments: Value, registry: &ConnectionRegistry) -> Result<PluginsOutput, ToolFailure> {
    let args: CredentialArgs = parse_args("plugins", arguments)?;
    let credential = require_credential(args.api_key)?;
    Ok(adapters::plugins(registry, &credential).await)
}

async fn send_command(
    arguments: Value,
    registry: &ConnectionRegistry,
) -> Result<SendCommandOutput, ToolFailure> {
    let args: SendCommandArgs = parse_args("send_command", arguments)?;
    let credential = require_credential(args.api_key)?;
    let commands = args
        .commands
        .map(CommandsArg::into_vec)
        .filter(|commands| !commands.is_empty())
        .ok_or_else(|| ToolFailure::new(MISSING_COMMANDS))?;
    Ok(adapters::send_command(registry, &credential, commands).await)
}

async fn get_logs(arguments: Value, registry: &ConnectionRegistry) -> Result<LogsOutput, ToolFailure> {
    let args: LogsArgs = parse_args("get_logs", arguments)?;
    let credential = require_credential(args.api_key)?;
    let limit = positive_limit(args.limit)?;
    Ok(adapters::get_logs(
        registry,
        &credential,
        limit,
        args.start_time.as_deref(),
        args.end_time.as_deref(),
    )
    .await)
}

async fn player_list(
    arguments: Value,
    registry: &ConnectionRegistry,
) -> Result<PlayersOutput, ToolFailure> {
    let args: CredentialArgs = parse_args("player_list", arguments)?;
    let credential = require_credential(args.api_key)?;
    Ok(adapters::player_list(registry, &credential).await)
}

async fn get_errors(
    arguments: Value,
    registry: &ConnectionRegistry,
) -> Result<ErrorsOutput, ToolFailure> {
    let args: FilteredLogsArgs = parse_args("get_errors", arguments)?;
    let credential = require_credential(args.api_key)?;
    let limit = positive_limit(args.limit)?;
    let plugin = non_blank(args.plugin);
    Ok(adapters::get_errors(registry, &credential, plugin.as_deref(), limit).await)
}

async fn get_warnings(
    arguments: Value,
    registry: &ConnectionRegistry,
) -> Result<WarningsOutput, ToolFailure> {
    let args: FilteredLogsArgs = parse_args("get_warnings", arguments)?;
    let credential = require_credential(args.api_key)?;
    let limit = positive_limit(args.limit)?;
    let plugin = non_blank(args.plugin);
    Ok(adapters::get_warnings(registry, &credential, plugin.as_deref(), limit).await)
}

async fn get_commands(
    arguments: Value,
    registry: &ConnectionRegistry,
) -> Result<CommandsOutput, ToolFailure> {
    let args: CredentialArgs = parse_args("get_commands", arguments)?;
    let credential = require_credential(args.api_key)?;
    Ok(adapters::get_commands(registry, &credential).await)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

/// Run `future` on its own task; a panic becomes an `error_type: "Panic"`
/// result
async fn contained<F>(tool: &str, future: F) -> Value
where
    F: Future<Output = Value> + Send + 'static,
{
    match tokio::spawn(future).await {
        Ok(value) => value,
        Err(e) => {
            let reason = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            error!(tool = tool, "Tool execution failed: {}", reason);
            json!({
                "error": format!("Tool execution failed: {}", reason),
                "error_type": "Panic"
            })
        }
    }
}

/// Run a tool and return its JSON result. Never fails: bad arguments,
/// unknown tools and panics inside the tool all produce an `error` object.
pub async fn call_tool(name: &str, arguments: Value, registry: &Arc<ConnectionRegistry>) -> Value {
    let arguments = match arguments {
        Value::Object(_) => arguments,
        Value::Null => json!({}),
        other => {
            warn!(tool = name, "Tool arguments are not an object, ignoring: {}", other);
            json!({})
        }
    };

    debug!(tool = name, "Calling tool");
    let tool = name.to_string();
    let registry = registry.clone();
    let result = contained(name, async move { dispatch(&tool, arguments, &registry).await }).await;

    match result.get("error").and_then(Value::as_str) {
        Some(err) => warn!(tool = name, "Tool returned error: {}", err),
        None => info!(tool = name, "Tool completed"),
    }
    result
}

/// Handle an MCP `tools/call`
pub async fn handle_tool_call(
    name: &str,
    arguments: Value,
    id: Option<RequestId>,
    registry: &Arc<ConnectionRegistry>,
) -> Response {
    let result = call_tool(name, arguments, registry).await;
    let is_error = result.get("error").is_some();
    let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());

    Response::success(
        id,
        json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error
        }),
    )
}
