//! Connection registry and session lifecycle
//!
//! Each credential slot moves `absent -> connecting -> connected -> absent`.
//! The connecting state only reserves the credential; lookups, listings and
//! counts see connected sessions only. The table lock is never held across an
//! `.await`, so the uniqueness check and the reservation happen in one
//! critical section.

use chrono::{DateTime, SecondsFormat, Utc};
use smc_client::PluginApiClient;
use smc_core::output::{ServerSummary, SessionInfo};
use smc_core::{Credential, CredentialKey, ServerStatus, SmcError, UpstreamError, normalize_base_url};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// A live, registered upstream session
pub struct Session {
    api_key: String,
    fingerprint: String,
    base_url: String,
    connected_at: DateTime<Utc>,
    client: PluginApiClient,
}

impl Session {
    /// Redacted credential
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn timeout(&self) -> Duration {
        self.client.timeout()
    }

    pub fn client(&self) -> &PluginApiClient {
        &self.client
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            api_key: self.api_key.clone(),
            url: self.base_url.clone(),
            connected_at: self.connected_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// Successful `connect`
pub struct ConnectedServer {
    pub session: Arc<Session>,
    pub server_info: ServerSummary,
}

/// Successful `disconnect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnected {
    pub api_key: String,
    pub url: String,
    pub remaining_connections: usize,
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Already connected with this API key")]
    AlreadyConnected,
    #[error("Not connected with this API key")]
    NotConnected,
    #[error("{0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Client(SmcError),
    #[error("Failed to connect to server - connection test failed")]
    Unreachable,
    #[error("Connected but failed to get status: {0}")]
    StatusFailed(UpstreamError),
    #[error("Connected but failed to get status: {0}")]
    InvalidStatus(SmcError),
    #[error("Connection registry is shutting down")]
    ShuttingDown,
}

enum Slot {
    /// Reserved by the `connect` call holding this token
    Connecting(u64),
    Connected(Arc<Session>),
}

type SlotTable = Mutex<HashMap<CredentialKey, Slot>>;

fn lock(slots: &SlotTable) -> MutexGuard<'_, HashMap<CredentialKey, Slot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds a credential slot in the connecting state. Dropping it without
/// [`Reservation::commit`] frees the slot again.
struct Reservation<'a> {
    slots: &'a SlotTable,
    key: CredentialKey,
    token: u64,
    committed: bool,
}

impl Reservation<'_> {
    fn holds(&self, slots: &HashMap<CredentialKey, Slot>) -> bool {
        matches!(slots.get(&self.key), Some(Slot::Connecting(token)) if *token == self.token)
    }

    /// Promote the slot to connected. Fails if the slot was cleared by a
    /// shutdown in the meantime.
    fn commit(mut self, session: Arc<Session>) -> bool {
        let mut slots = lock(self.slots);
        if !self.holds(&slots) {
            return false;
        }
        slots.insert(self.key, Slot::Connected(session));
        self.committed = true;
        true
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut slots = lock(self.slots);
        if self.holds(&slots) {
            slots.remove(&self.key);
        }
    }
}

/// Registry of live upstream sessions keyed by credential
#[derive(Default)]
pub struct ConnectionRegistry {
    slots: SlotTable,
    next_token: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn reserve(&self, key: CredentialKey) -> Result<Reservation<'_>, RegistryError> {
        let mut slots = lock(&self.slots);
        if slots.contains_key(&key) {
            return Err(RegistryError::AlreadyConnected);
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        slots.insert(key, Slot::Connecting(token));
        Ok(Reservation {
            slots: &self.slots,
            key,
            token,
            committed: false,
        })
    }

    /// Open a session: check the server is reachable, fetch its status, then register.
    /// On any failure nothing stays registered and the client built for the
    /// attempt is closed.
    pub async fn connect(
        &self,
        url: &str,
        credential: &Credential,
        timeout: Duration,
    ) -> Result<ConnectedServer, RegistryError> {
        let reservation = self.reserve(credential.key())?;

        let base_url =
            normalize_base_url(url).map_err(|e| RegistryError::InvalidUrl(e.to_string()))?;
        let client =
            PluginApiClient::new(&base_url, credential, timeout).map_err(RegistryError::Client)?;

        debug!(%base_url, key = %credential.fingerprint(), "Probing server");
        if !client.check_connection().await {
            client.close().await;
            return Err(RegistryError::Unreachable);
        }

        let status = match client.get_status().await {
            Ok(payload) => payload,
            Err(err) => {
                client.close().await;
                return Err(RegistryError::StatusFailed(err));
            }
        };
        let status: ServerStatus = match serde_json::from_value(status) {
            Ok(status) => status,
            Err(e) => {
                client.close().await;
                return Err(RegistryError::InvalidStatus(SmcError::InvalidPayload(
                    e.to_string(),
                )));
            }
        };

        let session = Arc::new(Session {
            api_key: credential.redacted(),
            fingerprint: credential.fingerprint(),
            base_url,
            connected_at: Utc::now(),
            client,
        });

        if !reservation.commit(session.clone()) {
            session.client.close().await;
            return Err(RegistryError::ShuttingDown);
        }

        info!(
            url = %session.base_url,
            key = %session.fingerprint,
            "Connected to server"
        );

        Ok(ConnectedServer {
            session,
            server_info: ServerSummary {
                server_version: status.server_version,
                minecraft_version: status.minecraft_version,
                online: status.online.unwrap_or(false),
            },
        })
    }

    /// Remove the session, then close its transport. A concurrent lookup
    /// never sees a session whose transport is being torn down.
    pub async fn disconnect(&self, credential: &Credential) -> Result<Disconnected, RegistryError> {
        let key = credential.key();
        let (session, remaining_connections) = {
            let mut slots = lock(&self.slots);
            let session = match slots.remove(&key) {
                Some(Slot::Connected(session)) => session,
                Some(reserved @ Slot::Connecting(_)) => {
                    slots.insert(key, reserved);
                    return Err(RegistryError::NotConnected);
                }
                None => return Err(RegistryError::NotConnected),
            };
            (session, connected_count(&slots))
        };

        session.client.close().await;
        info!(url = %session.base_url, key = %session.fingerprint, "Disconnected from server");

        Ok(Disconnected {
            api_key: session.api_key.clone(),
            url: session.base_url.clone(),
            remaining_connections,
        })
    }

    pub fn lookup(&self, credential: &Credential) -> Option<Arc<Session>> {
        match lock(&self.slots).get(&credential.key()) {
            Some(Slot::Connected(session)) => Some(session.clone()),
            _ => None,
        }
    }

    /// Snapshot of live sessions, oldest first
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<Arc<Session>> = lock(&self.slots)
            .values()
            .filter_map(|slot| match slot {
                Slot::Connected(session) => Some(session.clone()),
                Slot::Connecting(_) => None,
            })
            .collect();
        sessions.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.base_url.cmp(&b.base_url))
        });
        sessions.iter().map(|session| session.info()).collect()
    }

    pub fn count(&self) -> usize {
        connected_count(&lock(&self.slots))
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Clear the table and close every session
    pub async fn shutdown_all(&self) {
        let sessions: Vec<Arc<Session>> = lock(&self.slots)
            .drain()
            .filter_map(|(_, slot)| match slot {
                Slot::Connected(session) => Some(session),
                Slot::Connecting(_) => None,
            })
            .collect();

        for session in sessions {
            session.client.close().await;
            info!(url = %session.base_url, "Closed connection");
        }
    }
}

fn connected_count(slots: &HashMap<CredentialKey, Slot>) -> usize {
    slots
        .values()
        .filter(|slot| matches!(slot, Slot::Connected(_)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use smc_client::testing::{StubReply, StubServer, refused_url};
    use std::sync::atomic::AtomicUsize;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn status_body() -> serde_json::Value {
        json!({"serverVersion": "1.2", "minecraftVersion": "1.20", "online": true})
    }

    async fn healthy_server() -> StubServer {
        StubServer::plugin(status_body(), |_| StubReply::Json(404, json!({"error": "Not Found"})))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_registers_session() {
        let server = healthy_server().await;
        let registry = ConnectionRegistry::new();
        let credential = Credential::new("abcd1234efgh");

        let connected = registry
            .connect(&format!("{}/", server.url()), &credential, TIMEOUT)
            .await
            .unwrap();

        assert_eq!(connected.session.api_key(), "abcd1234...");
        assert_eq!(connected.session.base_url(), server.url());
        assert_eq!(connected.session.timeout(), TIMEOUT);
        assert_eq!(connected.server_info.server_version, "1.2");
        assert_eq!(connected.server_info.minecraft_version, "1.20");
        assert!(connected.server_info.online);
        assert_eq!(registry.count(), 1);
        assert!(registry.lookup(&credential).is_some());
        // Reachability check plus status fetch
        assert_eq!(server.count_path("/api/status"), 2);
    }

    #[tokio::test]
    async fn test_second_connect_with_same_credential_is_rejected() {
        let first = healthy_server().await;
        let second = healthy_server().await;
        let registry = ConnectionRegistry::new();
        let credential = Credential::new("shared-key");

        registry.connect(&first.url(), &credential, TIMEOUT).await.unwrap();
        let err = registry
            .connect(&second.url(), &credential, TIMEOUT)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, RegistryError::AlreadyConnected));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.lookup(&credential).unwrap().base_url(), first.url());
        assert!(second.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_leaves_slot_absent() {
        let registry = ConnectionRegistry::new();
        let credential = Credential::new("key-1");

        let err = registry
            .connect(&refused_url().await.unwrap(), &credential, TIMEOUT)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::Unreachable));
        assert_eq!(
            err.to_string(),
            "Failed to connect to server - connection test failed"
        );
        assert!(registry.is_empty());

        let server = healthy_server().await;
        assert!(registry.connect(&server.url(), &credential, TIMEOUT).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_status_fetch_is_not_registered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let server = StubServer::start(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                StubReply::Json(200, status_body())
            } else {
                StubReply::Json(500, json!({"error": "Internal server error"}))
            }
        })
        .await
        .unwrap();

        let registry = ConnectionRegistry::new();
        let err = registry
            .connect(&server.url(), &Credential::new("key-2"), TIMEOUT)
            .await
            .err()
            .unwrap();

        assert_eq!(
            err.to_string(),
            "Connected but failed to get status: Internal server error"
        );
        assert!(registry.is_empty());
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_without_io() {
        let registry = ConnectionRegistry::new();
        let err = registry
            .connect("localhost:8080", &Credential::new("key-3"), TIMEOUT)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::InvalidUrl(_)));
        assert!(err.to_string().contains("http:// or https://"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_removes_and_closes() {
        let server = healthy_server().await;
        let registry = ConnectionRegistry::new();
        let a = Credential::new("key-a-123456");
        let b = Credential::new("key-b-123456");
        registry.connect(&server.url(), &a, TIMEOUT).await.unwrap();
        registry.connect(&server.url(), &b, TIMEOUT).await.unwrap();

        let session = registry.lookup(&a).unwrap();
        let disconnected = registry.disconnect(&a).await.unwrap();

        assert_eq!(disconnected.api_key, "key-a-12...");
        assert_eq!(disconnected.remaining_connections, 1);
        assert!(session.client().is_closed().await);
        assert!(registry.lookup(&a).is_none());
        assert!(registry.list().iter().all(|info| info.api_key != "key-a-12..."));

        let err = registry.disconnect(&a).await.err().unwrap();
        assert!(matches!(err, RegistryError::NotConnected));
    }

    #[tokio::test]
    async fn test_list_is_redacted_and_ordered() {
        let server = healthy_server().await;
        let registry = ConnectionRegistry::new();
        for key in ["first-secret", "second-secret", "third-secret"] {
            registry
                .connect(&server.url(), &Credential::new(key), TIMEOUT)
                .await
                .unwrap();
        }

        let listed = registry.list();
        let keys: Vec<_> = listed.iter().map(|info| info.api_key.as_str()).collect();
        assert_eq!(keys, ["first-se...", "second-s...", "third-se..."]);
        assert!(listed.iter().all(|info| info.url == server.url()));
        assert!(DateTime::parse_from_rfc3339(&listed[0].connected_at).is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_all_closes_everything() {
        let server = healthy_server().await;
        let registry = ConnectionRegistry::new();
        let credential = Credential::new("key-4");
        registry.connect(&server.url(), &credential, TIMEOUT).await.unwrap();
        let session = registry.lookup(&credential).unwrap();

        registry.shutdown_all().await;

        assert!(registry.is_empty());
        assert!(session.client().is_closed().await);
        registry.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_connecting_slot_is_reserved_but_invisible() {
        let hanging = StubServer::start(|_| StubReply::Hang).await.unwrap();
        let registry = Arc::new(ConnectionRegistry::new());
        let credential = Credential::new("slow-key");

        let pending = {
            let registry = registry.clone();
            let credential = credential.clone();
            let url = hanging.url();
            tokio::spawn(async move {
                registry
                    .connect(&url, &credential, Duration::from_secs(30))
                    .await
                    .is_ok()
            })
        };

        // Wait until the reachability check reaches the server
        while hanging.requests().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(registry.lookup(&credential).is_none());
        assert!(registry.list().is_empty());
        assert!(matches!(
            registry.disconnect(&credential).await,
            Err(RegistryError::NotConnected)
        ));

        let healthy = healthy_server().await;
        assert!(matches!(
            registry.connect(&healthy.url(), &credential, TIMEOUT).await,
            Err(RegistryError::AlreadyConnected)
        ));

        // Cancelling the pending connect frees the slot
        pending.abort();
        assert!(pending.await.is_err());
        assert!(registry.connect(&healthy.url(), &credential, TIMEOUT).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_connects_register_once() {
        let server = healthy_server().await;
        let registry = Arc::new(ConnectionRegistry::new());
        let url = server.url();

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let url = url.clone();
                tokio::spawn(async move {
                    registry
                        .connect(&url, &Credential::new("raced-key"), TIMEOUT)
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut successes = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(registry.count(), 1);
    }
}
