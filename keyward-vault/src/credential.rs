//! Passcode credential setup and verification
//!
//! The stored verifier is `SHA-256(passcode || salt)`. It gates unlock but is
//! never a key: content keys come from the slow KDF over the same passcode
//! and salt, so the verifier alone cannot decrypt anything.

use crate::encoding::hex_bytes;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use keyward_crypto::{default_provider, CryptoProvider, KdfParams};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Salt length in bytes
pub const SALT_LEN: usize = 32;

/// Shortest passcode accepted at setup
pub const MIN_PASSCODE_LEN: usize = 4;

/// Stored passcode credential
///
/// One per device. Replaced wholesale on rotation, never edited in place.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasscodeCredential {
    #[serde(with = "hex_bytes")]
    salt: Vec<u8>,
    #[serde(with = "hex_bytes")]
    verifier_hash: Vec<u8>,
    created_at: DateTime<Utc>,
    kdf: KdfParams,
}

impl PasscodeCredential {
    /// Salt shared by the verifier and the master key derivation
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// `SHA-256(passcode || salt)`
    pub fn verifier_hash(&self) -> &[u8] {
        &self.verifier_hash
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// KDF parameters used for the master key
    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.salt.len() != SALT_LEN || self.verifier_hash.len() != 32 {
            return Err(Error::Validation(
                "stored credential has the wrong shape".to_string(),
            ));
        }
        self.kdf.validate()?;
        Ok(())
    }
}

impl fmt::Debug for PasscodeCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasscodeCredential")
            .field("created_at", &self.created_at)
            .field("kdf", &self.kdf)
            .finish_non_exhaustive()
    }
}

/// Passcode strength for UI feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasscodeStrength {
    /// Short or single character class
    Weak,
    /// Acceptable
    Fair,
    /// Long or varied
    Good,
    /// Long and varied
    Strong,
}

/// Classify a passcode by length and character variety
pub fn evaluate_strength(passcode: &str) -> PasscodeStrength {
    let len = passcode.chars().count();
    let classes = [
        passcode.chars().any(|c| c.is_ascii_lowercase()),
        passcode.chars().any(|c| c.is_ascii_uppercase()),
        passcode.chars().any(|c| c.is_ascii_digit()),
        passcode.chars().any(|c| !c.is_ascii_alphanumeric()),
    ]
    .iter()
    .filter(|present| **present)
    .count();

    if len < 6 || (classes <= 1 && len < 12) {
        PasscodeStrength::Weak
    } else if len >= 16 && classes >= 3 {
        PasscodeStrength::Strong
    } else if len >= 12 || (len >= 8 && classes >= 3) {
        PasscodeStrength::Good
    } else {
        PasscodeStrength::Fair
    }
}

/// Creates and checks passcode credentials
#[derive(Clone)]
pub struct PasscodeCredentialStore {
    provider: Arc<dyn CryptoProvider>,
}

impl fmt::Debug for PasscodeCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasscodeCredentialStore")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl Default for PasscodeCredentialStore {
    fn default() -> Self {
        Self::new(default_provider())
    }
}

impl PasscodeCredentialStore {
    /// Create with an explicit provider
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { provider }
    }

    /// Create a credential under a fresh random salt
    pub fn setup(&self, passcode: &str, kdf: KdfParams) -> Result<PasscodeCredential> {
        validate_passcode(passcode)?;
        kdf.validate()?;

        let mut salt = vec![0u8; SALT_LEN];
        self.provider.fill_random(&mut salt)?;
        let verifier_hash = self.hash(passcode, &salt).to_vec();

        tracing::info!("passcode credential created");
        Ok(PasscodeCredential {
            salt,
            verifier_hash,
            created_at: Utc::now(),
            kdf,
        })
    }

    /// Constant-time check of `passcode` against the stored verifier
    pub fn verify(&self, passcode: &str, credential: &PasscodeCredential) -> bool {
        let candidate = self.hash(passcode, &credential.salt);
        bool::from(candidate.as_slice().ct_eq(credential.verifier_hash.as_slice()))
    }

    /// `SHA-256(passcode || salt)`
    pub fn hash(&self, passcode: &str, salt: &[u8]) -> [u8; 32] {
        self.provider.digest(&[passcode.as_bytes(), salt])
    }
}

pub(crate) fn validate_passcode(passcode: &str) -> Result<()> {
    if passcode.chars().count() < MIN_PASSCODE_LEN {
        return Err(Error::Validation(format!(
            "Passcode must be at least {} characters.",
            MIN_PASSCODE_LEN
        )));
    }
    Ok(())
}
