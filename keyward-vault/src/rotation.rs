//! Key rotation
//!
//! Rotation re-salts the passcode credential and moves every supplied blob
//! from the old privacy keys to the new ones. The new credential is written
//! last, in one save; until then the old credential stays authoritative.

use crate::config::SecurityConfig;
use crate::credential::{PasscodeCredential, PasscodeCredentialStore};
use crate::store::ConfigStore;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use keyward_crypto::{EncryptedBlob, KeyDerivation, PrivacyKey, PrivacyLevel, SymmetricCipher};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{BTreeMap, Entry};

/// Default rotation reminder interval in days
pub const DEFAULT_REMINDER_DAYS: u32 = 90;

/// Rotation reminder schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationSchedule {
    /// Time of the last completed rotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rotation: Option<DateTime<Utc>>,
    /// Days between reminders
    pub reminder_days: u32,
}

impl Default for RotationSchedule {
    fn default() -> Self {
        Self {
            last_rotation: None,
            reminder_days: DEFAULT_REMINDER_DAYS,
        }
    }
}

impl RotationSchedule {
    /// Whether a reminder is due
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        is_rotation_due(self.last_rotation, self.reminder_days, now)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.reminder_days == 0 {
            return Err(Error::Validation(
                "Rotation reminder must be at least one day.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whether rotation is due: never rotated, or `reminder_days` have elapsed
pub fn is_rotation_due(
    last_rotation: Option<DateTime<Utc>>,
    reminder_days: u32,
    now: DateTime<Utc>,
) -> bool {
    match last_rotation {
        None => true,
        Some(last) => now - last >= Duration::days(i64::from(reminder_days)),
    }
}

/// A blob to move to the new keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationItem {
    /// Caller's identifier for the blob
    pub id: String,
    /// Privacy level the blob is encrypted under
    pub level: PrivacyLevel,
    /// Current ciphertext
    pub blob: EncryptedBlob,
}

/// Outcome of a committed rotation
#[derive(Debug, Clone)]
pub struct RotationResult {
    /// The credential now in force
    pub credential: PasscodeCredential,
    /// Commit time
    pub rotated_at: DateTime<Utc>,
    /// Re-encrypted blobs by id, in input order
    pub reencrypted: Vec<(String, EncryptedBlob)>,
    /// Ids that could not be re-encrypted
    pub failed: Vec<String>,
}

impl RotationResult {
    /// Fail with `RotationPartialFailure` if any item was left behind
    pub fn into_complete(self) -> Result<Self> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(Error::RotationPartialFailure {
                failed: self.failed,
            })
        }
    }
}

/// Re-salts the credential and re-keys content
#[derive(Debug, Clone, Default)]
pub struct KeyRotationService {
    credentials: PasscodeCredentialStore,
    kdf: KeyDerivation,
    cipher: SymmetricCipher,
}

impl KeyRotationService {
    /// Create from the component services
    pub fn new(
        credentials: PasscodeCredentialStore,
        kdf: KeyDerivation,
        cipher: SymmetricCipher,
    ) -> Self {
        Self {
            credentials,
            kdf,
            cipher,
        }
    }

    /// Rotate the credential in `config` and re-key `items`
    ///
    /// Steps: verify the passcode, create a credential under a new salt,
    /// re-encrypt each item independently, then save the updated config
    /// through `store`. `config` is only replaced after the save succeeds.
    /// Items that fail to re-encrypt are reported in
    /// [`RotationResult::failed`]; the rotation still commits.
    pub fn rotate(
        &self,
        passcode: &str,
        items: Vec<RotationItem>,
        config: &mut SecurityConfig,
        store: &dyn ConfigStore,
        now: DateTime<Utc>,
    ) -> Result<RotationResult> {
        let current = config
            .credential
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("no passcode credential".to_string()))?;

        if !self.credentials.verify(passcode, current) {
            tracing::warn!("rotation rejected: passcode did not verify");
            return Err(Error::Authentication);
        }

        let next_credential = self.credentials.setup(passcode, config.kdf)?;

        let old_master = self
            .kdf
            .derive_master_key(passcode.as_bytes(), current.salt(), current.kdf())?;
        let new_master = self.kdf.derive_master_key(
            passcode.as_bytes(),
            next_credential.salt(),
            next_credential.kdf(),
        )?;

        let mut key_pairs: BTreeMap<PrivacyLevel, (PrivacyKey, PrivacyKey)> = BTreeMap::new();
        let mut reencrypted = Vec::with_capacity(items.len());
        let mut failed = Vec::new();

        for item in items {
            let (old_key, new_key) = match key_pairs.entry(item.level) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let old_key = self.kdf.derive_privacy_key(&old_master, item.level)?;
                    let new_key = self.kdf.derive_privacy_key(&new_master, item.level)?;
                    entry.insert((old_key, new_key))
                }
            };

            match self.cipher.reencrypt(&item.blob, old_key.key(), new_key.key()) {
                Ok(blob) => reencrypted.push((item.id, blob)),
                Err(e) => {
                    tracing::warn!(item = %item.id, error = %e, "item could not be re-encrypted");
                    failed.push(item.id);
                }
            }
        }

        let mut next = config.clone();
        next.credential = Some(next_credential.clone());
        next.rotation.last_rotation = Some(now);
        store.save(&next)?;
        *config = next;

        tracing::info!(
            reencrypted = reencrypted.len(),
            failed = failed.len(),
            "key rotation committed"
        );

        Ok(RotationResult {
            credential: next_credential,
            rotated_at: now,
            reencrypted,
            failed,
        })
    }
}
