//! Platform authenticator credentials
//!
//! Keeps the list of registered passkeys and drives the platform
//! authenticator through a small capability trait. The authenticator itself
//! (biometrics, secure enclave) lives outside this crate.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use keyward_crypto::{default_provider, CryptoProvider};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Challenge length in bytes
pub const CHALLENGE_LEN: usize = 32;

/// Relying party id presented to the authenticator
pub const RP_ID: &str = "keyward.local";

/// Platform authenticator capability
pub trait PlatformAuthenticator: Send + Sync {
    /// Create a credential, returning its id
    fn create_credential(&self, challenge: &[u8], rp_id: &str, user_id: &[u8]) -> Result<String>;

    /// Produce an assertion with one of `allowed_ids`, returning the id used
    fn get_assertion(&self, challenge: &[u8], allowed_ids: &[String]) -> Result<String>;
}

/// A registered passkey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPasskey {
    /// Authenticator-issued credential id
    pub credential_id: String,
    /// User-chosen label
    pub label: String,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Last successful assertion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

/// Registered passkeys plus the authenticator that backs them
pub struct CredentialRegistry {
    authenticator: Arc<dyn PlatformAuthenticator>,
    provider: Arc<dyn CryptoProvider>,
    user_id: Vec<u8>,
    passkeys: Vec<RegisteredPasskey>,
}

impl std::fmt::Debug for CredentialRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRegistry")
            .field("passkeys", &self.passkeys.len())
            .finish_non_exhaustive()
    }
}

impl CredentialRegistry {
    /// Create over an existing passkey list
    pub fn new(
        authenticator: Arc<dyn PlatformAuthenticator>,
        passkeys: Vec<RegisteredPasskey>,
    ) -> Self {
        Self::with_provider(authenticator, default_provider(), passkeys)
    }

    /// Create with an explicit provider for challenge generation
    pub fn with_provider(
        authenticator: Arc<dyn PlatformAuthenticator>,
        provider: Arc<dyn CryptoProvider>,
        passkeys: Vec<RegisteredPasskey>,
    ) -> Self {
        Self {
            authenticator,
            provider,
            user_id: b"keyward-local-user".to_vec(),
            passkeys,
        }
    }

    /// Register a new passkey
    pub fn register(&mut self, label: &str) -> Result<RegisteredPasskey> {
        let label = label.trim();
        if label.is_empty() {
            return Err(Error::Validation("Passkey label must not be empty.".to_string()));
        }

        let challenge = self.challenge()?;
        let credential_id = self
            .authenticator
            .create_credential(&challenge, RP_ID, &self.user_id)?;

        if self.passkeys.iter().any(|p| p.credential_id == credential_id) {
            return Err(Error::DuplicateCredential(
                "passkey is already registered".to_string(),
            ));
        }

        let passkey = RegisteredPasskey {
            credential_id,
            label: label.to_string(),
            created_at: Utc::now(),
            last_used: None,
        };
        self.passkeys.push(passkey.clone());

        tracing::info!(count = self.passkeys.len(), "passkey registered");
        Ok(passkey)
    }

    /// Request an assertion restricted to registered passkeys
    pub fn authenticate(&mut self) -> Result<RegisteredPasskey> {
        if self.passkeys.is_empty() {
            return Err(Error::NotConfigured("no passkeys registered".to_string()));
        }

        let challenge = self.challenge()?;
        let allowed: Vec<String> = self.passkeys.iter().map(|p| p.credential_id.clone()).collect();
        let used = self.authenticator.get_assertion(&challenge, &allowed)?;

        let passkey = self
            .passkeys
            .iter_mut()
            .find(|p| p.credential_id == used)
            .ok_or_else(|| {
                tracing::warn!("authenticator returned an unregistered credential");
                Error::Authentication
            })?;
        passkey.last_used = Some(Utc::now());

        Ok(passkey.clone())
    }

    /// Remove a passkey by id
    pub fn remove(&mut self, credential_id: &str) -> Result<RegisteredPasskey> {
        let index = self
            .passkeys
            .iter()
            .position(|p| p.credential_id == credential_id)
            .ok_or_else(|| Error::Validation("Unknown passkey.".to_string()))?;
        Ok(self.passkeys.remove(index))
    }

    /// Registered passkeys
    pub fn list(&self) -> &[RegisteredPasskey] {
        &self.passkeys
    }

    /// Consume, returning the passkey list for persistence
    pub fn into_passkeys(self) -> Vec<RegisteredPasskey> {
        self.passkeys
    }

    fn challenge(&self) -> Result<[u8; CHALLENGE_LEN]> {
        let mut challenge = [0u8; CHALLENGE_LEN];
        self.provider.fill_random(&mut challenge)?;
        Ok(challenge)
    }
}

/// In-memory authenticator for tests and headless builds
#[derive(Debug, Default)]
pub struct MockAuthenticator {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    issued: u32,
    fail: bool,
    forced_id: Option<String>,
    last_challenge: Vec<u8>,
}

impl MockAuthenticator {
    /// Create a new mock authenticator
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with `Authentication`
    pub fn set_fail(&self, fail: bool) {
        self.state.lock().fail = fail;
    }

    /// Return `id` from the next assertions instead of an allowed one
    pub fn force_assertion_id(&self, id: Option<String>) {
        self.state.lock().forced_id = id;
    }

    /// Challenge seen by the most recent call
    pub fn last_challenge(&self) -> Vec<u8> {
        self.state.lock().last_challenge.clone()
    }
}

impl PlatformAuthenticator for MockAuthenticator {
    fn create_credential(&self, challenge: &[u8], _rp_id: &str, _user_id: &[u8]) -> Result<String> {
        let mut state = self.state.lock();
        state.last_challenge = challenge.to_vec();
        if state.fail {
            return Err(Error::Authentication);
        }
        state.issued += 1;
        Ok(format!("mock-credential-{}", state.issued))
    }

    fn get_assertion(&self, challenge: &[u8], allowed_ids: &[String]) -> Result<String> {
        let mut state = self.state.lock();
        state.last_challenge = challenge.to_vec();
        if state.fail {
            return Err(Error::Authentication);
        }
        if let Some(id) = &state.forced_id {
            return Ok(id.clone());
        }
        allowed_ids.first().cloned().ok_or(Error::Authentication)
    }
}
