//! HTTP client for the Minecraft server plugin API
//!
//! [`PluginApiClient`] owns one authenticated HTTP session bound to one base
//! URL. Every operation returns a [`RequestOutcome`]; transport faults are
//! retried a bounded number of times, HTTP error responses are not.

#[cfg(any(test, feature = "test-support"))]
pub mod testing;


use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use smc_core::{Credential, RequestOutcome, SmcError, TimeBound, UpstreamError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// Header carrying the shared secret (`X-API-Key` on the wire)
pub const API_KEY_HEADER: &str = "x-api-key";

/// Retries after the first attempt for transport failures
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Severity filter for `GET /api/logs/{level}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Errors,
    Warnings,
}

impl LogLevel {
    pub fn path_segment(self) -> &'static str {
        match self {
            LogLevel::Errors => "errors",
            LogLevel::Warnings => "warnings",
        }
    }
}

/// Filters for `GET /api/logs`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub limit: Option<u32>,
    pub start_time: Option<TimeBound>,
    pub end_time: Option<TimeBound>,
}

impl LogQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(start) = &self.start_time {
            params.push(("start_time", start.to_iso_string()));
        }
        if let Some(end) = &self.end_time {
            params.push(("end_time", end.to_iso_string()));
        }
        params
    }
}

/// Client for one plugin API endpoint
pub struct PluginApiClient {
    base_url: String,
    timeout: Duration,
    /// `None` once closed
    http: RwLock<Option<Client>>,
}

impl PluginApiClient {
    /// Build a client. `base_url` is expected to be normalized already; a
    /// trailing slash is stripped regardless.
    pub fn new(
        base_url: &str,
        credential: &Credential,
        timeout: Duration,
    ) -> smc_core::Result<Self> {
        let mut key = HeaderValue::from_str(credential.expose())
            .map_err(|_| SmcError::InvalidArgument("API key is not a valid header value".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SmcError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            http: RwLock::new(Some(http)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Release the HTTP session. Calling it again is a no-op.
    pub async fn close(&self) {
        if self.http.write().await.take().is_some() {
            debug!(base_url = %self.base_url, "HTTP session closed");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.http.read().await.is_none()
    }

    /// Reachability check: `true` only for a 200 from the status endpoint.
    pub async fn check_connection(&self) -> bool {
        let Some(http) = self.http.read().await.clone() else {
            return false;
        };

        let url = format!("{}/api/status", self.base_url);
        match http.get(&url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                error!(%url, "Connection check failed: {}", e);
                false
            }
        }
    }

    /// Perform one logical request with up to `max_retries` extra attempts on
    /// transport failures. Attempts follow each other without delay.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        max_retries: u32,
    ) -> RequestOutcome {
        let Some(http) = self.http.read().await.clone() else {
            return Err(UpstreamError::Closed);
        };

        let url = format!("{}{}", self.base_url, path);
        let attempts = max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            let mut builder = http.request(method.clone(), &url);
            if !query.is_empty() {
                builder = builder.query(query);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            match self.attempt(builder).await {
                Err(err) if err.is_transient() => {
                    warn!("Attempt {}/{} failed: {}", attempt, attempts, err);
                    last_error = Some(err);
                }
                outcome => return outcome,
            }
        }

        Err(last_error.unwrap_or_else(|| {
            UpstreamError::Transport("Request failed after all retries".into())
        }))
    }

    async fn attempt(&self, builder: RequestBuilder) -> RequestOutcome {
        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;
        classify_response(status, text)
    }

    fn transport_error(&self, err: &reqwest::Error) -> UpstreamError {
        let reason = if err.is_timeout() {
            format!("Request timeout after {} seconds", format_secs(self.timeout))
        } else if err.is_connect() {
            format!("Connection failed: {}", err)
        } else {
            format!("HTTP error: {}", err)
        };
        UpstreamError::Transport(reason)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> RequestOutcome {
        self.request(Method::GET, path, query, None, DEFAULT_MAX_RETRIES)
            .await
    }

    /// `GET /api/status`
    pub async fn get_status(&self) -> RequestOutcome {
        self.get("/api/status", &[]).await
    }

    /// `GET /api/plugins`
    pub async fn get_plugins(&self) -> RequestOutcome {
        self.get("/api/plugins", &[]).await
    }

    /// `POST /api/command` with a single command
    pub async fn execute_command(&self, command: &str) -> RequestOutcome {
        let body = serde_json::json!({ "commands": command });
        self.request(
            Method::POST,
            "/api/command",
            &[],
            Some(&body),
            DEFAULT_MAX_RETRIES,
        )
        .await
    }

    /// `GET /api/logs`
    pub async fn get_logs(&self, query: &LogQuery) -> RequestOutcome {
        self.get("/api/logs", &query.to_params()).await
    }

    /// `GET /api/players`
    pub async fn get_players(&self) -> RequestOutcome {
        self.get("/api/players", &[]).await
    }

    /// `GET /api/logs/{level}`
    pub async fn get_filtered_logs(
        &self,
        level: LogLevel,
        plugin: Option<&str>,
        limit: Option<u32>,
    ) -> RequestOutcome {
        let mut params = Vec::new();
        if let Some(plugin) = plugin {
            params.push(("plugin", plugin.to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let path = format!("/api/logs/{}", level.path_segment());
        self.get(&path, &params).await
    }

    /// `GET /api/commands`
    pub async fn get_commands(&self) -> RequestOutcome {
        self.get("/api/commands", &[]).await
    }
}

/// Map a received response to an outcome.
///
/// 401 and every other status >= 400 are terminal. For error bodies the
/// upstream's own `error` field wins; a non-JSON body is used verbatim.
fn classify_response(status: StatusCode, text: String) -> RequestOutcome {
    if status == StatusCode::UNAUTHORIZED {
        return Err(UpstreamError::Unauthorized);
    }

    if status.as_u16() >= 400 {
        let generic = format!("HTTP {}", status.as_u16());
        let message = match serde_json::from_str::<Value>(&text) {
            Ok(body) => match body.get("error") {
                Some(Value::String(message)) => message.clone(),
                Some(other) => other.to_string(),
                None => generic,
            },
            Err(_) if !text.is_empty() => text,
            Err(_) => generic,
        };
        return Err(UpstreamError::Http {
            status: status.as_u16(),
            message,
        });
    }

    match serde_json::from_str(&text) {
        Ok(payload) => Ok(payload),
        Err(_) => Ok(serde_json::json!({ "data": text })),
    }
}

fn format_secs(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        timeout.as_secs().to_string()
    } else {
        format!("{}", timeout.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_unauthorized() {
        let outcome = classify_response(StatusCode::UNAUTHORIZED, r#"{"error":"x"}"#.into());
        assert_eq!(outcome, Err(UpstreamError::Unauthorized));
    }

    #[test]
    fn test_classify_prefers_upstream_error_field() {
        let outcome = classify_response(
            StatusCode::NOT_FOUND,
            r#"{"error":"Not Found","message":"Endpoint not found"}"#.into(),
        );
        assert_eq!(
            outcome,
            Err(UpstreamError::Http {
                status: 404,
                message: "Not Found".into()
            })
        );
    }

    #[test]
    fn test_classify_error_fallbacks() {
        let text = classify_response(StatusCode::BAD_GATEWAY, "upstream down".into());
        assert_eq!(text.unwrap_err().to_string(), "upstream down");

        let empty = classify_response(StatusCode::INTERNAL_SERVER_ERROR, String::new());
        assert_eq!(empty.unwrap_err().to_string(), "HTTP 500");

        let json_without_error =
            classify_response(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"x"}"#.into());
        assert_eq!(json_without_error.unwrap_err().to_string(), "HTTP 500");
    }

    #[test]
    fn test_classify_success_bodies() {
        let json_body = classify_response(StatusCode::OK, r#"{"online":true}"#.into());
        assert_eq!(json_body.unwrap(), json!({"online": true}));

        let text_body = classify_response(StatusCode::OK, "pong".into());
        assert_eq!(text_body.unwrap(), json!({"data": "pong"}));
    }

    #[test]
    fn test_log_query_params() {
        let query = LogQuery {
            limit: Some(50),
            start_time: Some(TimeBound::parse("2024-01-15T10:00:00Z").unwrap()),
            end_time: None,
        };
        assert_eq!(
            query.to_params(),
            vec![
                ("limit", "50".to_string()),
                ("start_time", "2024-01-15T10:00:00+00:00".to_string())
            ]
        );
        assert!(LogQuery::default().to_params().is_empty());
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(Duration::from_secs(10)), "10");
        assert_eq!(format_secs(Duration::from_millis(250)), "0.25");
    }

    #[test]
    fn test_rejects_unusable_api_key() {
        let result = PluginApiClient::new(
            "http://localhost:8080",
            &Credential::new("bad\nkey"),
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }
}
