//! stdio transport for MCP JSON-RPC
//!
//! One JSON message per line. Each request is handled on its own task, so a
//! slow upstream call never blocks other requests; replies are written as they
//! complete and may therefore arrive out of order.

use crate::SmcServer;
use crate::mcp::{InitializeParams, InitializeResult, Request, RequestId, Response};
use crate::tools::{handle_tool_call, list_tools};
use serde_json::{Value, json};
use smc_core::{Result, SmcError, error_codes};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

type SharedWriter<W> = Arc<Mutex<W>>;

/// Run the MCP server on stdio
pub async fn run(server: SmcServer) -> Result<()> {
    info!("Minecraft MCP server starting on stdio");
    serve(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve requests read from `reader` until EOF, writing replies to `writer`.
/// On EOF all in-flight requests are awaited and every session is closed.
pub async fn serve<R, W>(server: SmcServer, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer: SharedWriter<W> = Arc::new(Mutex::new(writer));
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut in_flight = JoinSet::new();

    let outcome = loop {
        line.clear();
        let bytes_read = match reader.read_line(&mut line).await {
            Ok(n) => n,
            Err(e) => break Err(SmcError::Io(format!("Failed to read stdin: {}", e))),
        };

        if bytes_read == 0 {
            info!("Client disconnected (EOF)");
            break Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!("Received: {}", trimmed);

        let request = match parse_request(trimmed) {
            Ok(request) => request,
            Err(response) => {
                write_response(&writer, &response).await;
                continue;
            }
        };

        if request.is_notification() {
            debug!(method = %request.method, "Notification received");
            continue;
        }

        let server = server.clone();
        let writer = writer.clone();
        in_flight.spawn(async move {
            let response = handle_request(&request, &server).await;
            write_response(&writer, &response).await;
        });
    };

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!("Request task failed: {}", e);
        }
    }

    server.shutdown().await;
    outcome
}

fn parse_request(line: &str) -> std::result::Result<Request, Response> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        warn!("Failed to parse request: {}", e);
        Response::error(None, error_codes::PARSE_ERROR, format!("Parse error: {}", e))
    })?;

    let id = value
        .get("id")
        .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
    serde_json::from_value(value).map_err(|e| {
        warn!("Invalid request: {}", e);
        Response::error(id, error_codes::INVALID_REQUEST, format!("Invalid request: {}", e))
    })
}

async fn write_response<W>(writer: &SharedWriter<W>, response: &Response)
where
    W: AsyncWrite + Unpin,
{
    let json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            return;
        }
    };

    debug!("Sending: {}", json);

    let mut out = writer.lock().await;
    let written = async {
        out.write_all(json.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await
    }
    .await;
    if let Err(e) = written {
        error!("Failed to write response: {}", e);
    }
}

async fn handle_request(request: &Request, server: &SmcServer) -> Response {
    let id = request.id.clone();
    match request.method.as_str() {
        "initialize" => handle_initialize(request, server),
        "ping" => Response::success(id, json!({})),
        "tools/list" => Response::success(id, json!({ "tools": list_tools() })),
        "tools/call" => handle_tools_call(request, server).await,
        _ => Response::error(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        ),
    }
}

fn handle_initialize(request: &Request, server: &SmcServer) -> Response {
    let params: InitializeParams =
        serde_json::from_value(request.params.clone()).unwrap_or_default();
    if let Some(client) = &params.client_info {
        info!(client = %client.name, version = %client.version, "Client initialized");
    }

    let result = InitializeResult::new(server.info().clone());
    match serde_json::to_value(result) {
        Ok(value) => Response::success(request.id.clone(), value),
        Err(e) => Response::error(
            request.id.clone(),
            error_codes::INTERNAL_ERROR,
            format!("Failed to encode initialize result: {}", e),
        ),
    }
}

async fn handle_tools_call(request: &Request, server: &SmcServer) -> Response {
    #[derive(serde::Deserialize)]
    struct ToolCallParams {
        name: String,
        #[serde(default)]
        arguments: Value,
    }

    let params: ToolCallParams = match serde_json::from_value(request.params.clone()) {
        Ok(p) => p,
        Err(e) => {
            return Response::error(
                request.id.clone(),
                error_codes::INVALID_PARAMS,
                format!("Invalid tool call params: {}", e),
            );
        }
    };

    handle_tool_call(
        &params.name,
        params.arguments,
        request.id.clone(),
        server.registry(),
    )
    .await
}
