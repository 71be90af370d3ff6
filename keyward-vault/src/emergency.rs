//! Emergency access through split recovery kits
//!
//! The passcode is padded to a fixed block so shares do not reveal its
//! length, then split among trusted contacts. Recovery only succeeds when the
//! reconstructed passcode verifies against the current credential.

use crate::credential::{PasscodeCredential, PasscodeCredentialStore};
use crate::{Error, Result};
use keyward_crypto::{SecretShare, SecretSplitter};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Padding block size in bytes
const PAD_BLOCK: usize = 64;

/// Length prefix size
const LEN_PREFIX: usize = 2;

/// Person who may hold a share or receive switch notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    /// Display name
    pub name: String,
    /// Delivery address (email, phone, handle)
    pub address: String,
}

impl EmergencyContact {
    /// Create a contact; both fields must be non-blank
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let contact = Self {
            name: name.into().trim().to_string(),
            address: address.into().trim().to_string(),
        };
        contact.validate()?;
        Ok(contact)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.address.trim().is_empty() {
            return Err(Error::Validation(
                "Emergency contacts need a name and an address.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Creates and redeems recovery kits
#[derive(Debug, Clone, Default)]
pub struct EmergencyAccess {
    credentials: PasscodeCredentialStore,
    splitter: SecretSplitter,
}

impl EmergencyAccess {
    /// Create from the credential store and splitter
    pub fn new(credentials: PasscodeCredentialStore, splitter: SecretSplitter) -> Self {
        Self {
            credentials,
            splitter,
        }
    }

    /// Split the passcode into `total` shares, any `threshold` of which
    /// recover it
    ///
    /// `labels` is either empty or one label per share, in share order.
    pub fn create_kit(
        &self,
        passcode: &str,
        credential: &PasscodeCredential,
        total: u8,
        threshold: u8,
        labels: &[String],
    ) -> Result<Vec<SecretShare>> {
        if !self.credentials.verify(passcode, credential) {
            return Err(Error::Authentication);
        }
        if !labels.is_empty() && labels.len() != total as usize {
            return Err(Error::Validation(format!(
                "Expected {} share labels, got {}.",
                total,
                labels.len()
            )));
        }

        let padded = pad(passcode.as_bytes())?;
        let shares = self.splitter.split(&padded, total, threshold)?;

        let shares = if labels.is_empty() {
            shares
        } else {
            shares
                .into_iter()
                .zip(labels)
                .map(|(share, label)| share.with_label(label.clone()))
                .collect()
        };

        tracing::info!(total, threshold, "emergency kit created");
        Ok(shares)
    }

    /// Reconstruct the passcode and confirm it against `credential`
    pub fn recover(
        &self,
        shares: &[SecretShare],
        credential: &PasscodeCredential,
    ) -> Result<Zeroizing<String>> {
        let padded = self.splitter.reconstruct(shares)?;
        let passcode = unpad(&padded).ok_or(Error::Authentication)?;

        if !self.credentials.verify(&passcode, credential) {
            tracing::warn!("recovered secret does not match the current passcode");
            return Err(Error::Authentication);
        }

        tracing::info!(shares = shares.len(), "passcode recovered from emergency kit");
        Ok(passcode)
    }
}

fn pad(secret: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let len = u16::try_from(secret.len())
        .map_err(|_| Error::Validation("Passcode is too long to split.".to_string()))?;

    let needed = LEN_PREFIX + secret.len();
    let padded_len = needed.div_ceil(PAD_BLOCK) * PAD_BLOCK;

    let mut out = Zeroizing::new(vec![0u8; padded_len]);
    out[..LEN_PREFIX].copy_from_slice(&len.to_be_bytes());
    out[LEN_PREFIX..needed].copy_from_slice(secret);
    Ok(out)
}

fn unpad(padded: &[u8]) -> Option<Zeroizing<String>> {
    if padded.len() < LEN_PREFIX || padded.len() % PAD_BLOCK != 0 {
        return None;
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    let end = LEN_PREFIX.checked_add(len)?;
    if end > padded.len() || padded[end..].iter().any(|b| *b != 0) {
        return None;
    }
    let text = std::str::from_utf8(&padded[LEN_PREFIX..end]).ok()?;
    Some(Zeroizing::new(text.to_string()))
}
