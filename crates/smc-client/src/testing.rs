//! Scripted HTTP/1.1 stub of the plugin API for tests
//!
//! The stub answers every request through a handler closure and records what
//! it received, so tests can assert on paths, headers, bodies and attempt
//! counts.

use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the stub answers one request
#[derive(Debug, Clone)]
pub enum StubReply {
    Json(u16, Value),
    Text(u16, String),
    /// Never answer; the client times out
    Hang,
}

/// A request as seen by the stub
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// Header lookup, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

type Handler = dyn Fn(&RecordedRequest) -> StubReply + Send + Sync;

/// Running stub server bound to an ephemeral localhost port
pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start<F>(handler: F) -> std::io::Result<Self>
    where
        F: Fn(&RecordedRequest) -> StubReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = requests.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_connection(stream, handler.clone(), recorded.clone()));
            }
        });

        Ok(Self {
            addr,
            requests,
            task,
        })
    }

    /// Healthy plugin answering `/api/status` with `status` and every other
    /// path through `handler`
    pub async fn plugin<F>(status: Value, handler: F) -> std::io::Result<Self>
    where
        F: Fn(&RecordedRequest) -> StubReply + Send + Sync + 'static,
    {
        Self::start(move |request| {
            if request.path() == "/api/status" {
                StubReply::Json(200, status.clone())
            } else {
                handler(request)
            }
        })
        .await
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count_path(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.path() == path)
            .count()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// URL of a localhost port with nothing listening on it
pub async fn refused_url() -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

async fn serve_connection(
    stream: TcpStream,
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let mut reader = BufReader::new(stream);

    // Keep-alive: serve requests until the client hangs up
    while let Some(request) = read_request(&mut reader).await {
        requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let (status, content_type, body) = match handler(&request) {
            StubReply::Json(status, value) => (status, "application/json", value.to_string()),
            StubReply::Text(status, text) => (status, "text/plain", text),
            StubReply::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                return;
            }
        };

        let response = format!(
            "HTTP/1.1 {} {}\r\ncontent-type: {}\r\ncontent-length: {}\r\n\r\n{}",
            status,
            reason_phrase(status),
            content_type,
            body.len(),
            body
        );
        let stream = reader.get_mut();
        if stream.write_all(response.as_bytes()).await.is_err() || stream.flush().await.is_err() {
            return;
        }
    }
}

async fn read_request(reader: &mut BufReader<TcpStream>) -> Option<RecordedRequest> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }

    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.ok()?;

    Some(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
