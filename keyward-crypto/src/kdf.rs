//! Key derivation
//!
//! The master key is stretched from the passcode with Argon2id (or PBKDF2 for
//! credentials created with it). Privacy subkeys are expanded from the master
//! key with HKDF-SHA256 so each level gets an independent content key.

use crate::keys::{MasterKey, PrivacyKey, PrivacyLevel, SymmetricKey, KEY_LEN};
use crate::provider::{default_provider, CryptoProvider};
use crate::{CryptoError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Default Argon2id memory cost (64 MiB)
pub const ARGON2_MEMORY_KIB: u32 = 65536;

/// Default Argon2id iterations
pub const ARGON2_ITERATIONS: u32 = 3;

/// Default Argon2id lanes
pub const ARGON2_PARALLELISM: u32 = 4;

/// Lowest PBKDF2 iteration count accepted
pub const PBKDF2_MIN_ITERATIONS: u32 = 100_000;

/// Fixed HKDF salt for privacy subkeys
const PRIVACY_DOMAIN_SALT: &[u8] = b"keyward/privacy-keys/v1";

/// Minimum salt length accepted for master key derivation
const MIN_SALT_LEN: usize = 16;

/// Argon2 lane limit (2^24 - 1)
const ARGON2_MAX_LANES: u32 = 0x00FF_FFFF;

/// Passcode stretching parameters
///
/// Stored with each credential so derivation stays reproducible after the
/// defaults change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum KdfParams {
    /// Argon2id, version 0x13
    Argon2id {
        /// Memory cost in KiB
        memory_kib: u32,
        /// Time cost
        iterations: u32,
        /// Lanes
        parallelism: u32,
    },
    /// PBKDF2-HMAC-SHA256
    Pbkdf2Sha256 {
        /// Iteration count
        iterations: u32,
    },
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams::Argon2id {
            memory_kib: ARGON2_MEMORY_KIB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

impl KdfParams {
    /// PBKDF2 at the minimum accepted iteration count
    pub fn pbkdf2() -> Self {
        KdfParams::Pbkdf2Sha256 {
            iterations: PBKDF2_MIN_ITERATIONS,
        }
    }

    /// Reject parameters below the algorithm's floor
    pub fn validate(&self) -> Result<()> {
        match *self {
            KdfParams::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => {
                if iterations == 0 || parallelism == 0 {
                    return Err(CryptoError::InvalidParameters(
                        "Argon2id iterations and parallelism must be non-zero".to_string(),
                    ));
                }
                if parallelism > ARGON2_MAX_LANES {
                    return Err(CryptoError::InvalidParameters(format!(
                        "Argon2id supports at most {} lanes",
                        ARGON2_MAX_LANES
                    )));
                }
                let min_memory = u64::from(parallelism) * 8;
                if u64::from(memory_kib) < min_memory {
                    return Err(CryptoError::InvalidParameters(format!(
                        "Argon2id memory must be at least {} KiB for {} lanes",
                        min_memory, parallelism
                    )));
                }
                Ok(())
            }
            KdfParams::Pbkdf2Sha256 { iterations } => {
                if iterations < PBKDF2_MIN_ITERATIONS {
                    return Err(CryptoError::InvalidParameters(format!(
                        "PBKDF2 requires at least {} iterations",
                        PBKDF2_MIN_ITERATIONS
                    )));
                }
                Ok(())
            }
        }
    }

    /// Whether memory and time cost reach the production default
    ///
    /// Lane count only affects wall-clock time on the defender's side, so it
    /// is not part of the check.
    pub fn is_recommended(&self) -> bool {
        match *self {
            KdfParams::Argon2id {
                memory_kib,
                iterations,
                ..
            } => memory_kib >= ARGON2_MEMORY_KIB && iterations >= ARGON2_ITERATIONS,
            KdfParams::Pbkdf2Sha256 { iterations } => iterations >= PBKDF2_MIN_ITERATIONS,
        }
    }
}

/// Derives master and privacy keys
#[derive(Clone)]
pub struct KeyDerivation {
    provider: Arc<dyn CryptoProvider>,
}

impl std::fmt::Debug for KeyDerivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDerivation")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl Default for KeyDerivation {
    fn default() -> Self {
        Self::new(default_provider())
    }
}

impl KeyDerivation {
    /// Create with an explicit provider
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { provider }
    }

    /// Stretch a passcode into the master key
    ///
    /// Deterministic for a fixed passcode, salt and parameter set. A wrong
    /// passcode yields a different, equally valid key.
    pub fn derive_master_key(
        &self,
        passcode: &[u8],
        salt: &[u8],
        params: &KdfParams,
    ) -> Result<MasterKey> {
        params.validate()?;
        if salt.len() < MIN_SALT_LEN {
            return Err(CryptoError::InvalidParameters(format!(
                "salt must be at least {} bytes",
                MIN_SALT_LEN
            )));
        }
        if !params.is_recommended() {
            tracing::warn!(?params, "deriving master key with below-default KDF parameters");
        }

        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        self.provider.stretch(passcode, salt, params, out.as_mut())?;
        tracing::debug!(provider = self.provider.name(), "master key derived");

        Ok(MasterKey::from_key(SymmetricKey::from_bytes(*out)))
    }

    /// Expand the content key for one privacy level
    pub fn derive_privacy_key(
        &self,
        master: &MasterKey,
        level: PrivacyLevel,
    ) -> Result<PrivacyKey> {
        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        self.provider.expand(
            master.key().as_bytes(),
            PRIVACY_DOMAIN_SALT,
            &level.info(),
            out.as_mut(),
        )?;
        Ok(PrivacyKey::new(level, SymmetricKey::from_bytes(*out)))
    }

    /// Expand content keys for levels `0..count`
    pub fn derive_privacy_keys(&self, master: &MasterKey, count: u8) -> Result<Vec<PrivacyKey>> {
        (0..count)
            .map(|level| self.derive_privacy_key(master, PrivacyLevel::new(level)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> KdfParams {
        KdfParams::Argon2id {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_master_key_is_deterministic() {
        let kdf = KeyDerivation::default();
        let salt = [5u8; 32];
        let a = kdf.derive_master_key(b"1234", &salt, &light()).unwrap();
        let b = kdf.derive_master_key(b"1234", &salt, &light()).unwrap();
        assert_eq!(a.key().as_bytes(), b.key().as_bytes());
    }

    #[test]
    fn test_different_salt_or_passcode_changes_key() {
        let kdf = KeyDerivation::default();
        let base = kdf.derive_master_key(b"1234", &[5u8; 32], &light()).unwrap();
        let other_salt = kdf.derive_master_key(b"1234", &[6u8; 32], &light()).unwrap();
        let other_pass = kdf.derive_master_key(b"1235", &[5u8; 32], &light()).unwrap();
        assert_ne!(base.key().as_bytes(), other_salt.key().as_bytes());
        assert_ne!(base.key().as_bytes(), other_pass.key().as_bytes());
    }

    #[test]
    fn test_pbkdf2_is_deterministic() {
        let kdf = KeyDerivation::default();
        let params = KdfParams::pbkdf2();
        let a = kdf.derive_master_key(b"pass", &[1u8; 32], &params).unwrap();
        let b = kdf.derive_master_key(b"pass", &[1u8; 32], &params).unwrap();
        assert_eq!(a.key().as_bytes(), b.key().as_bytes());
    }

    #[test]
    fn test_privacy_keys_are_independent() {
        let kdf = KeyDerivation::default();
        let master = kdf.derive_master_key(b"1234", &[5u8; 32], &light()).unwrap();
        let keys = kdf.derive_privacy_keys(&master, 3).unwrap();

        assert_eq!(keys.len(), 3);
        assert_ne!(keys[0].key().as_bytes(), keys[1].key().as_bytes());
        assert_ne!(keys[1].key().as_bytes(), keys[2].key().as_bytes());
        for key in &keys {
            assert_ne!(key.key().as_bytes(), master.key().as_bytes());
        }

        let again = kdf.derive_privacy_key(&master, PrivacyLevel::new(1)).unwrap();
        assert_eq!(again.key().as_bytes(), keys[1].key().as_bytes());
    }

    #[test]
    fn test_validate_floors() {
        assert!(KdfParams::default().validate().is_ok());
        assert!(KdfParams::default().is_recommended());
        assert!(KdfParams::pbkdf2().validate().is_ok());
        assert!(KdfParams::Pbkdf2Sha256 { iterations: 99_999 }.validate().is_err());
        assert!(KdfParams::Argon2id {
            memory_kib: 31,
            iterations: 1,
            parallelism: 4
        }
        .validate()
        .is_err());
        assert!(KdfParams::Argon2id {
            memory_kib: 1024,
            iterations: 0,
            parallelism: 1
        }
        .validate()
        .is_err());
        assert!(light().validate().is_ok());
        assert!(!light().is_recommended());
    }

    #[test]
    fn test_validate_huge_lane_count() {
        for parallelism in [0x0100_0000, 0x2000_0000, u32::MAX] {
            let params = KdfParams::Argon2id {
                memory_kib: 1024,
                iterations: 1,
                parallelism,
            };
            assert!(matches!(
                params.validate(),
                Err(CryptoError::InvalidParameters(_))
            ));
        }

        // At the lane limit only the memory floor applies
        let at_limit = KdfParams::Argon2id {
            memory_kib: u32::MAX,
            iterations: 1,
            parallelism: ARGON2_MAX_LANES,
        };
        assert!(at_limit.validate().is_ok());
        let starved = KdfParams::Argon2id {
            memory_kib: 1024,
            iterations: 1,
            parallelism: ARGON2_MAX_LANES,
        };
        assert!(starved.validate().is_err());
    }

    #[test]
    fn test_recommended_ignores_lane_count() {
        let single_lane = KdfParams::Argon2id {
            memory_kib: ARGON2_MEMORY_KIB,
            iterations: ARGON2_ITERATIONS,
            parallelism: 1,
        };
        assert!(single_lane.is_recommended());

        let low_memory = KdfParams::Argon2id {
            memory_kib: ARGON2_MEMORY_KIB / 2,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        };
        assert!(!low_memory.is_recommended());
    }

    #[test]
    fn test_short_salt_rejected() {
        let kdf = KeyDerivation::default();
        assert!(matches!(
            kdf.derive_master_key(b"1234", &[0u8; 8], &light()),
            Err(CryptoError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_params_serde_shape() {
        let json = serde_json::to_string(&KdfParams::default()).unwrap();
        assert!(json.contains("\"algorithm\":\"argon2id\""));
        let back: KdfParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, KdfParams::default());
    }

    #[test]
    fn test_production_profile_derives() {
        let kdf = KeyDerivation::default();
        let key = kdf
            .derive_master_key(b"correct horse", &[9u8; 32], &KdfParams::default())
            .unwrap();
        assert_eq!(key.key().as_bytes().len(), KEY_LEN);
    }
}
