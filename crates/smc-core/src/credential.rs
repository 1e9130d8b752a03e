//! Shared-secret credentials
//!
//! A credential both authenticates against one upstream server and names the
//! session for that server. The raw secret is never used as a map key or
//! written to logs: the registry indexes sessions by [`CredentialKey`] and log
//! lines carry [`Credential::fingerprint`].

use sha2::{Digest, Sha256};
use std::fmt;

/// Number of characters echoed back to callers
const VISIBLE_PREFIX: usize = 8;

/// A shared-secret API key
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for the authentication header only
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Prefix view echoed in tool results, e.g. `abcd1234...`
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(VISIBLE_PREFIX).collect();
        format!("{prefix}...")
    }

    /// Table index derived from the secret
    pub fn key(&self) -> CredentialKey {
        CredentialKey(Sha256::digest(self.0.as_bytes()).into())
    }

    /// Short digest prefix safe to put in log lines
    pub fn fingerprint(&self) -> String {
        self.key().fingerprint()
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.redacted()).finish()
    }
}

/// SHA-256 digest of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CredentialKey([u8; 32]);

impl CredentialKey {
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..4])
    }
}
