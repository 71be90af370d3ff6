//! Unlocked vault session
//!
//! A real session holds the privacy keys derived from the passcode. A decoy
//! session has the same shape, but its keys are derived from a random
//! throwaway master key. It can encrypt, it can never open real content, and
//! it exposes the decoy dataset for display.

use crate::config::DecoyDataset;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use keyward_crypto::{
    EncryptedBlob, KeyDerivation, MasterKey, PrivacyKey, PrivacyLevel, SymmetricCipher,
    SymmetricKey,
};
use std::collections::BTreeMap;
use zeroize::Zeroizing;

/// How the session was unlocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockMode {
    /// Real passcode
    Real,
    /// Duress passcode
    Duress,
}

/// Privacy keys by level, held in memory only
#[derive(Clone)]
pub struct PrivacyKeyring {
    keys: BTreeMap<PrivacyLevel, PrivacyKey>,
}

impl std::fmt::Debug for PrivacyKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivacyKeyring")
            .field("levels", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PrivacyKeyring {
    /// Derive keys for levels `0..levels` from `master`
    pub fn derive(kdf: &KeyDerivation, master: &MasterKey, levels: u8) -> Result<Self> {
        let keys = kdf
            .derive_privacy_keys(master, levels)?
            .into_iter()
            .map(|key| (key.level(), key))
            .collect();
        Ok(Self { keys })
    }

    /// Key for `level`
    pub fn key(&self, level: PrivacyLevel) -> Result<&PrivacyKey> {
        self.keys
            .get(&level)
            .ok_or_else(|| Error::Validation(format!("Unknown privacy {}.", level)))
    }

    /// Levels held
    pub fn levels(&self) -> impl Iterator<Item = PrivacyLevel> + '_ {
        self.keys.keys().copied()
    }
}

/// An unlocked vault
#[derive(Debug)]
pub struct VaultSession {
    mode: UnlockMode,
    keyring: PrivacyKeyring,
    cipher: SymmetricCipher,
    decoy: Option<DecoyDataset>,
    unlocked_at: DateTime<Utc>,
}

impl VaultSession {
    pub(crate) fn real(keyring: PrivacyKeyring, cipher: SymmetricCipher) -> Self {
        Self {
            mode: UnlockMode::Real,
            keyring,
            cipher,
            decoy: None,
            unlocked_at: Utc::now(),
        }
    }

    pub(crate) fn decoy(
        kdf: &KeyDerivation,
        cipher: SymmetricCipher,
        levels: u8,
        dataset: DecoyDataset,
    ) -> Result<Self> {
        let throwaway = MasterKey::from_key(SymmetricKey::generate()?);
        let keyring = PrivacyKeyring::derive(kdf, &throwaway, levels)?;
        Ok(Self {
            mode: UnlockMode::Duress,
            keyring,
            cipher,
            decoy: Some(dataset),
            unlocked_at: Utc::now(),
        })
    }

    /// Unlock mode
    pub fn mode(&self) -> UnlockMode {
        self.mode
    }

    /// Unlock time
    pub fn unlocked_at(&self) -> DateTime<Utc> {
        self.unlocked_at
    }

    /// Decoy content; `Some` only in duress mode
    pub fn decoy_dataset(&self) -> Option<&DecoyDataset> {
        self.decoy.as_ref()
    }

    /// Keyring for direct use with the cipher
    pub fn keyring(&self) -> &PrivacyKeyring {
        &self.keyring
    }

    /// Encrypt content at `level`
    pub fn encrypt(&self, level: PrivacyLevel, plaintext: &[u8]) -> Result<EncryptedBlob> {
        let key = self.keyring.key(level)?;
        Ok(self.cipher.encrypt(plaintext, key.key())?)
    }

    /// Decrypt content at `level`
    pub fn decrypt(&self, level: PrivacyLevel, blob: &EncryptedBlob) -> Result<Zeroizing<Vec<u8>>> {
        let key = self.keyring.key(level)?;
        Ok(self.cipher.decrypt(blob, key.key())?)
    }
}
