//! Tool adapters
//!
//! One function per capability. Each resolves the credential to a session,
//! performs a single client operation and reshapes the payload into the tool's
//! output envelope. Adapters never fail: every problem becomes a
//! schema-complete result with an `error`.

use crate::registry::{ConnectionRegistry, RegistryError, Session};
use serde::de::DeserializeOwned;
use serde_json::Value;
use smc_client::{LogLevel, LogQuery};
use smc_core::output::{
    CommandsOutput, ConnectOutput, DisconnectOutput, ErrorsOutput, ListServersOutput, LogsOutput,
    PlayersOutput, PluginsOutput, SendCommandOutput, StatusOutput, WarningsOutput,
};
use smc_core::{
    CommandResult, Credential, RawCommandResult, ServerStatus, SmcError, TimeBound, ToolFailure,
    ToolOutput,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Message for a batch containing a blank command
pub const BLANK_COMMAND: &str = "Command cannot be empty or contain only whitespace";

/// Message when the status check fails for a live session
pub const PLUGIN_UNREACHABLE: &str = "Unable to connect to Minecraft plugin API";

async fn with_session<T, F, Fut>(
    registry: &ConnectionRegistry,
    credential: &Credential,
    tool: &str,
    op: F,
) -> T
where
    T: ToolOutput,
    F: FnOnce(Arc<Session>) -> Fut,
    Fut: Future<Output = Result<T, ToolFailure>>,
{
    let Some(session) = registry.lookup(credential) else {
        debug!(tool, key = %credential.fingerprint(), "No session for credential");
        return T::from_failure(ToolFailure::not_connected());
    };

    match op(session).await {
        Ok(output) => output,
        Err(failure) => {
            if failure.error_type.is_some() {
                error!("Error in {}: {}", tool, failure.error);
            }
            T::from_failure(failure)
        }
    }
}

fn unexpected(err: SmcError) -> ToolFailure {
    ToolFailure::unexpected(&err)
}

/// Decode the array stored under `field`. A missing or null field is an
/// empty list.
fn decode_list<T: DeserializeOwned>(payload: &Value, field: &str) -> Result<Vec<T>, ToolFailure> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => serde_json::from_value(items.clone()).map_err(|e| {
            unexpected(SmcError::InvalidPayload(format!("'{}': {}", field, e)))
        }),
    }
}

pub async fn connect(
    registry: &ConnectionRegistry,
    url: &str,
    credential: &Credential,
    timeout: Duration,
) -> ConnectOutput {
    match registry.connect(url, credential, timeout).await {
        Ok(connected) => ConnectOutput {
            success: true,
            api_key: Some(connected.session.api_key().to_string()),
            url: Some(connected.session.base_url().to_string()),
            server_info: Some(connected.server_info),
            failure: None,
        },
        Err(err @ RegistryError::AlreadyConnected) => ConnectOutput {
            api_key: Some(credential.redacted()),
            ..ConnectOutput::from_failure(ToolFailure::new(err.to_string()))
        },
        Err(err) => {
            error!("Failed to connect to {}: {}", url, err);
            ConnectOutput {
                url: Some(url.to_string()),
                ..ConnectOutput::from_failure(ToolFailure::new(err.to_string()))
            }
        }
    }
}

pub async fn disconnect(registry: &ConnectionRegistry, credential: &Credential) -> DisconnectOutput {
    match registry.disconnect(credential).await {
        Ok(disconnected) => DisconnectOutput {
            success: true,
            api_key: Some(disconnected.api_key),
            url: Some(disconnected.url),
            remaining_connections: Some(disconnected.remaining_connections),
            failure: None,
        },
        Err(err) => DisconnectOutput::from_failure(ToolFailure::new(err.to_string())),
    }
}

pub fn list_servers(registry: &ConnectionRegistry) -> ListServersOutput {
    let servers = registry.list();
    ListServersOutput {
        count: servers.len(),
        servers,
        failure: None,
    }
}

pub async fn status(registry: &ConnectionRegistry, credential: &Credential) -> StatusOutput {
    with_session(registry, credential, "status", |session| async move {
        let client = session.client();
        if !client.check_connection().await {
            return Err(ToolFailure::new(PLUGIN_UNREACHABLE));
        }

        let payload = client.get_status().await?;
        let status: ServerStatus = serde_json::from_value(payload)
            .map_err(|e| unexpected(SmcError::InvalidPayload(e.to_string())))?;

        Ok(StatusOutput {
            connected: true,
            online: status.online.unwrap_or(true),
            server_version: Some(status.server_version),
            minecraft_version: Some(status.minecraft_version),
            plugin_version: Some(status.plugin_version),
            failure: None,
        })
    })
    .await
}

pub async fn plugins(registry: &ConnectionRegistry, credential: &Credential) -> PluginsOutput {
    with_session(registry, credential, "plugins", |session| async move {
        let payload = session.client().get_plugins().await?;
        Ok(PluginsOutput {
            plugins: decode_list(&payload, "plugins")?,
            failure: None,
        })
    })
    .await
}

/// Run a batch of commands in order. The whole batch is validated before the
/// first command is sent; one failing command does not stop the rest.
pub async fn send_command(
    registry: &ConnectionRegistry,
    credential: &Credential,
    commands: Vec<String>,
) -> SendCommandOutput {
    with_session(registry, credential, "send_command", move |session| async move {
        if commands.iter().any(|command| command.trim().is_empty()) {
            return Err(ToolFailure::new(BLANK_COMMAND));
        }

        let mut results = Vec::with_capacity(commands.len());
        for command in &commands {
            let result = match session.client().execute_command(command.trim()).await {
                Ok(payload) => command_result(command, &payload),
                Err(err) => CommandResult::failed(command, err.to_string()),
            };
            results.push(result);
        }

        Ok(SendCommandOutput {
            results,
            failure: None,
        })
    })
    .await
}

fn command_result(command: &str, payload: &Value) -> CommandResult {
    let first = payload
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first());

    match first.map(|raw| serde_json::from_value::<RawCommandResult>(raw.clone())) {
        None => CommandResult::from_raw(command, None),
        Some(Ok(raw)) => CommandResult::from_raw(command, Some(raw)),
        Some(Err(e)) => {
            let err = SmcError::InvalidPayload(e.to_string());
            error!("Error in send_command: {}", err);
            CommandResult::failed(command, err.to_string())
        }
    }
}

fn parse_bound(name: &str, raw: Option<&str>) -> Result<Option<TimeBound>, ToolFailure> {
    match raw.filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => TimeBound::parse(value)
            .map(Some)
            .map_err(|reason| ToolFailure::new(format!("Invalid {} format: {}", name, reason))),
    }
}

pub async fn get_logs(
    registry: &ConnectionRegistry,
    credential: &Credential,
    limit: Option<u32>,
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> LogsOutput {
    with_session(registry, credential, "get_logs", |session| async move {
        let query = LogQuery {
            limit,
            start_time: parse_bound("start_time", start_time)?,
            end_time: parse_bound("end_time", end_time)?,
        };

        let payload = session.client().get_logs(&query).await?;
        Ok(LogsOutput {
            logs: decode_list(&payload, "logs")?,
            failure: None,
        })
    })
    .await
}

pub async fn player_list(registry: &ConnectionRegistry, credential: &Credential) -> PlayersOutput {
    with_session(registry, credential, "player_list", |session| async move {
        let payload = session.client().get_players().await?;
        let players: Vec<_> = decode_list(&payload, "players")?;
        Ok(PlayersOutput {
            count: players.len(),
            players,
            failure: None,
        })
    })
    .await
}

pub async fn get_errors(
    registry: &ConnectionRegistry,
    credential: &Credential,
    plugin: Option<&str>,
    limit: Option<u32>,
) -> ErrorsOutput {
    with_session(registry, credential, "get_errors", |session| async move {
        let payload = session
            .client()
            .get_filtered_logs(LogLevel::Errors, plugin, limit)
            .await?;
        Ok(ErrorsOutput {
            errors: decode_list(&payload, "errors")?,
            failure: None,
        })
    })
    .await
}

pub async fn get_warnings(
    registry: &ConnectionRegistry,
    credential: &Credential,
    plugin: Option<&str>,
    limit: Option<u32>,
) -> WarningsOutput {
    with_session(registry, credential, "get_warnings", |session| async move {
        let payload = session
            .client()
            .get_filtered_logs(LogLevel::Warnings, plugin, limit)
            .await?;
        Ok(WarningsOutput {
            warnings: decode_list(&payload, "warnings")?,
            failure: None,
        })
    })
    .await
}

pub async fn get_commands(registry: &ConnectionRegistry, credential: &Credential) -> CommandsOutput {
    with_session(registry, credential, "get_commands", |session| async move {
        let payload = session.client().get_commands().await?;
        let commands: Vec<_> = decode_list(&payload, "commands")?;
        Ok(CommandsOutput {
            count: commands.len(),
            commands,
            failure: None,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use smc_client::testing::{StubReply, StubServer};
    use smc_core::NOT_CONNECTED;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn to_json<T: serde::Serialize>(output: &T) -> Value {
        serde_json::to_value(output).unwrap()
    }

    async fn plugin_server<F>(handler: F) -> StubServer
    where
        F: Fn(&smc_client::testing::RecordedRequest) -> StubReply + Send + Sync + 'static,
    {
        StubServer::plugin(
            json!({
                "serverVersion": "1.2",
                "minecraftVersion": "1.20",
                "pluginVersion": "0.3.0",
                "online": true
            }),
            handler,
        )
        .await
        .unwrap()
    }

    async fn connected(server: &StubServer, key: &str) -> (ConnectionRegistry, Credential) {
        let registry = ConnectionRegistry::new();
        let credential = Credential::new(key);
        let out = connect(&registry, &server.url(), &credential, TIMEOUT).await;
        assert!(out.success, "{:?}", out.failure);
        (registry, credential)
    }

    #[tokio::test]
    async fn test_connect_reports_redacted_key_and_summary() {
        let server = plugin_server(|_| StubReply::Json(404, json!({}))).await;
        let registry = ConnectionRegistry::new();

        let out = connect(
            &registry,
            &server.url(),
            &Credential::new("abcd1234efgh"),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(
            to_json(&out),
            json!({
                "success": true,
                "api_key": "abcd1234...",
                "url": server.url(),
                "server_info": {
                    "server_version": "1.2",
                    "minecraft_version": "1.20",
                    "online": true
                }
            })
        );
    }

    #[tokio::test]
    async fn test_connect_twice_reports_collision() {
        let server = plugin_server(|_| StubReply::Json(404, json!({}))).await;
        let (registry, credential) = connected(&server, "abcd1234efgh").await;

        let out = connect(&registry, &server.url(), &credential, TIMEOUT).await;
        let value = to_json(&out);

        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Already connected with this API key");
        assert_eq!(value["api_key"], "abcd1234...");
        assert_eq!(list_servers(&registry).count, 1);
    }

    #[tokio::test]
    async fn test_connect_failure_echoes_url() {
        let registry = ConnectionRegistry::new();
        let out = connect(&registry, "ftp://h", &Credential::new("k"), TIMEOUT).await;
        let value = to_json(&out);

        assert_eq!(value["success"], false);
        assert_eq!(value["url"], "ftp://h");
        assert_eq!(
            value["error"],
            "plugin_api_url must start with http:// or https://"
        );
    }

    #[tokio::test]
    async fn test_unknown_credential_keeps_schema() {
        let registry = ConnectionRegistry::new();
        let credential = Credential::new("nobody");

        let players = to_json(&player_list(&registry, &credential).await);
        assert_eq!(players["error"], NOT_CONNECTED);
        assert_eq!(players["players"], json!([]));
        assert_eq!(players["count"], 0);

        let commands = to_json(&get_commands(&registry, &credential).await);
        assert_eq!(commands["commands"], json!([]));
        assert_eq!(commands["count"], 0);

        let status = to_json(&status(&registry, &credential).await);
        assert_eq!(status["connected"], false);
        assert_eq!(status["online"], false);
        assert_eq!(status["error"], NOT_CONNECTED);

        let logs = to_json(&get_logs(&registry, &credential, None, None, None).await);
        assert_eq!(logs["logs"], json!([]));
        assert!(logs.get("error_type").is_none());
    }

    #[tokio::test]
    async fn test_disconnect_then_list() {
        let server = plugin_server(|_| StubReply::Json(404, json!({}))).await;
        let (registry, credential) = connected(&server, "first-key").await;
        let other = Credential::new("second-key");
        assert!(connect(&registry, &server.url(), &other, TIMEOUT).await.success);

        let out = to_json(&disconnect(&registry, &credential).await);
        assert_eq!(out["success"], true);
        assert_eq!(out["remaining_connections"], 1);
        assert_eq!(out["url"], server.url());

        let listed = list_servers(&registry);
        assert_eq!(listed.count, 1);
        assert_eq!(listed.servers[0].api_key, "second-k...");

        let again = to_json(&disconnect(&registry, &credential).await);
        assert_eq!(again["success"], false);
        assert_eq!(again["error"], "Not connected with this API key");
    }

    #[tokio::test]
    async fn test_status_fills_defaults() {
        let server = StubServer::plugin(json!({"serverVersion": "Paper"}), |_| {
            StubReply::Json(404, json!({}))
        })
        .await
        .unwrap();
        let (registry, credential) = connected(&server, "status-key").await;

        let out = to_json(&status(&registry, &credential).await);
        assert_eq!(
            out,
            json!({
                "connected": true,
                "online": true,
                "server_version": "Paper",
                "minecraft_version": "Unknown",
                "plugin_version": "Unknown"
            })
        );
    }

    #[tokio::test]
    async fn test_blank_command_sends_nothing() {
        let server = plugin_server(|_| StubReply::Json(200, json!({"results": []}))).await;
        let (registry, credential) = connected(&server, "cmd-key").await;

        let out = send_command(
            &registry,
            &credential,
            vec!["".to_string(), "look".to_string()],
        )
        .await;
        let value = to_json(&out);

        assert_eq!(value["error"], BLANK_COMMAND);
        assert_eq!(value["results"], json!([]));
        assert_eq!(server.count_path("/api/command"), 0);
    }

    #[tokio::test]
    async fn test_send_command_batch_continues_after_failure() {
        let server = plugin_server(|req| {
            let command = req
                .json_body()
                .and_then(|body| body["commands"].as_str().map(str::to_string))
                .unwrap_or_default();
            if command == "bad" {
                StubReply::Json(400, json!({"error": "Unknown command"}))
            } else {
                StubReply::Json(
                    200,
                    json!({"results": [{"command": command, "output": "ok", "success": true}]}),
                )
            }
        })
        .await;
        let (registry, credential) = connected(&server, "batch-key").await;

        let out = send_command(
            &registry,
            &credential,
            vec![" list ".to_string(), "bad".to_string(), "time set day".to_string()],
        )
        .await;

        assert!(out.failure.is_none());
        assert_eq!(out.results.len(), 3);
        assert_eq!(out.results[0].command, "list");
        assert!(out.results[0].success);
        assert_eq!(out.results[1].command, "bad");
        assert!(!out.results[1].success);
        assert_eq!(out.results[1].error.as_deref(), Some("Unknown command"));
        assert!(out.results[2].success);
        assert_eq!(server.count_path("/api/command"), 3);
    }

    #[tokio::test]
    async fn test_logs_fill_missing_logger() {
        let server = plugin_server(|req| match req.path() {
            "/api/logs" => StubReply::Json(
                200,
                json!({"logs": [{"timestamp": "t", "level": "WARN", "message": "m"}]}),
            ),
            _ => StubReply::Json(404, json!({})),
        })
        .await;
        let (registry, credential) = connected(&server, "logs-key").await;

        let out = to_json(&get_logs(&registry, &credential, Some(5), None, None).await);
        assert_eq!(
            out["logs"],
            json!([{"timestamp": "t", "level": "WARN", "message": "m", "logger": ""}])
        );
        let request = server
            .requests()
            .into_iter()
            .find(|r| r.path() == "/api/logs")
            .unwrap();
        assert_eq!(request.query(), Some("limit=5"));
    }

    #[tokio::test]
    async fn test_logs_reject_bad_start_time() {
        let server = plugin_server(|_| StubReply::Json(200, json!({"logs": []}))).await;
        let (registry, credential) = connected(&server, "time-key").await;

        let out = get_logs(&registry, &credential, None, Some("yesterday"), None).await;
        let failure = out.failure.unwrap();

        assert!(failure.error.starts_with("Invalid start_time format: "));
        assert!(failure.error_type.is_none());
        assert_eq!(server.count_path("/api/logs"), 0);
    }

    #[tokio::test]
    async fn test_players_counted() {
        let server = plugin_server(|req| match req.path() {
            "/api/players" => StubReply::Json(
                200,
                json!({"players": [{"name": "Steve", "uuid": "u-1", "ping": 12}, {"name": "Alex"}]}),
            ),
            _ => StubReply::Json(404, json!({})),
        })
        .await;
        let (registry, credential) = connected(&server, "players-key").await;

        let out = player_list(&registry, &credential).await;
        assert_eq!(out.count, 2);
        assert_eq!(out.players[1].uuid, "");
        assert_eq!(out.players[1].ping, 0);
    }

    #[tokio::test]
    async fn test_errors_and_warnings_forward_filters() {
        let server = plugin_server(|req| match req.path() {
            "/api/logs/errors" => StubReply::Json(
                200,
                json!({"errors": [{"timestamp": "t", "message": "boom", "plugin": "WorldEdit"}]}),
            ),
            "/api/logs/warnings" => StubReply::Json(200, json!({"warnings": null})),
            _ => StubReply::Json(404, json!({})),
        })
        .await;
        let (registry, credential) = connected(&server, "filter-key").await;

        let errors = get_errors(&registry, &credential, Some("WorldEdit"), Some(3)).await;
        assert_eq!(errors.errors.len(), 1);
        assert_eq!(errors.errors[0].stacktrace, None);

        let warnings = get_warnings(&registry, &credential, None, None).await;
        assert!(warnings.failure.is_none());
        assert!(warnings.warnings.is_empty());

        let queries: Vec<_> = server
            .requests()
            .into_iter()
            .filter(|r| r.path() == "/api/logs/errors")
            .map(|r| r.query().map(str::to_string))
            .collect();
        assert_eq!(queries, vec![Some("plugin=WorldEdit&limit=3".to_string())]);
    }

    #[tokio::test]
    async fn test_upstream_error_becomes_failure() {
        let server = plugin_server(|req| match req.path() {
            "/api/plugins" => StubReply::Json(401, json!({"error": "nope"})),
            "/api/commands" => StubReply::Json(503, json!({"error": "Server busy"})),
            _ => StubReply::Json(404, json!({})),
        })
        .await;
        let (registry, credential) = connected(&server, "err-key").await;

        let plugins = to_json(&plugins(&registry, &credential).await);
        assert_eq!(plugins["error"], smc_core::AUTHENTICATION_FAILED);
        assert_eq!(plugins["plugins"], json!([]));

        let commands = to_json(&get_commands(&registry, &credential).await);
        assert_eq!(commands["error"], "Server busy");
        assert_eq!(commands["count"], 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_unexpected() {
        let server = plugin_server(|req| match req.path() {
            "/api/plugins" => StubReply::Json(200, json!({"plugins": "not-a-list"})),
            _ => StubReply::Json(404, json!({})),
        })
        .await;
        let (registry, credential) = connected(&server, "bad-key").await;

        let out = plugins(&registry, &credential).await;
        let failure = out.failure.unwrap();
        assert!(failure.error.starts_with("Unexpected error: "));
        assert_eq!(failure.error_type.as_deref(), Some("InvalidPayload"));
    }
}
