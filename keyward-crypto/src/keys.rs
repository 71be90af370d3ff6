//! Key material types
//!
//! Every key type zeroizes on drop and prints redacted `Debug` output, so key
//! bytes cannot leak through logging by accident.

use crate::{CryptoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// AES-GCM IV length in bytes (96 bits)
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes (128 bits)
pub const TAG_LEN: usize = 16;

/// 256-bit symmetric key
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; KEY_LEN]>);

impl SymmetricKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Create from a byte slice, rejecting anything but 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Generate a random key from the default provider's CSPRNG
    pub fn generate() -> Result<Self> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        crate::default_provider().fill_random(key.as_mut())?;
        Ok(Self(key))
    }

    /// Get key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Root key stretched from the passcode
///
/// Only ever used as HKDF input for [`PrivacyKey`]s; content is never
/// encrypted under the master key directly.
#[derive(Clone)]
pub struct MasterKey(SymmetricKey);

impl MasterKey {
    /// Wrap an already-derived key
    pub fn from_key(key: SymmetricKey) -> Self {
        Self(key)
    }

    /// Get the underlying key
    pub fn key(&self) -> &SymmetricKey {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Privacy level label used to domain-separate content keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivacyLevel(u8);

impl PrivacyLevel {
    /// Create a privacy level
    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    /// Get inner value
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// HKDF info string for this level
    pub fn info(&self) -> Vec<u8> {
        format!("keyward/privacy-level/{}", self.0).into_bytes()
    }
}

impl From<u8> for PrivacyLevel {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {}", self.0)
    }
}

/// Content key for one privacy level, held in memory only
#[derive(Clone)]
pub struct PrivacyKey {
    level: PrivacyLevel,
    key: SymmetricKey,
}

impl PrivacyKey {
    pub(crate) fn new(level: PrivacyLevel, key: SymmetricKey) -> Self {
        Self { level, key }
    }

    /// Privacy level this key belongs to
    pub fn level(&self) -> PrivacyLevel {
        self.level
    }

    /// Key used with [`crate::SymmetricCipher`]
    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }
}

impl fmt::Debug for PrivacyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivacyKey")
            .field("level", &self.level)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(SymmetricKey::from_slice(&[0u8; 31]).is_err());
        assert!(SymmetricKey::from_slice(&[0u8; 33]).is_err());
        assert!(SymmetricKey::from_slice(&[7u8; 32]).is_ok());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SymmetricKey::from_bytes([0xAB; KEY_LEN]);
        let printed = format!("{:?}", MasterKey::from_key(key.clone()));
        assert!(!printed.contains("ab"));
        assert!(!printed.contains("171"));
        assert!(format!("{:?}", key).contains("REDACTED"));
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = SymmetricKey::generate().unwrap();
        let b = SymmetricKey::generate().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_privacy_level_info_is_distinct() {
        assert_ne!(PrivacyLevel::new(0).info(), PrivacyLevel::new(1).info());
    }
}
