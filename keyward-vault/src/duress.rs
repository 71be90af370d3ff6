//! Duress passcode
//!
//! A second passcode that unlocks into a decoy session instead of the real
//! vault. Unlock evaluation does the same work for every input: both hashes
//! are computed and both comparisons run in constant time, with a dummy
//! target standing in when no binding is active.

use crate::credential::{validate_passcode, PasscodeCredential, PasscodeCredentialStore};
use crate::encoding::hex_bytes;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::{Choice, ConstantTimeEq};

const DUMMY_TARGET: [u8; 32] = [0u8; 32];

/// Stored duress passcode binding
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuressBinding {
    #[serde(with = "hex_bytes")]
    duress_hash: Vec<u8>,
    enabled: bool,
    /// Salt the hash was computed under. Kept separately so rotating the real
    /// credential leaves the binding valid.
    #[serde(with = "hex_bytes")]
    salt: Vec<u8>,
    created_at: DateTime<Utc>,
}

impl DuressBinding {
    /// Whether unlock should honour this binding
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Salt the duress hash was computed under
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Copy with the enabled flag changed
    pub fn with_enabled(&self, enabled: bool) -> Self {
        Self {
            enabled,
            ..self.clone()
        }
    }
}

impl fmt::Debug for DuressBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuressBinding")
            .field("enabled", &self.enabled)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Result of evaluating an unlock attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Real passcode
    Real,
    /// Duress passcode; serve the decoy
    Duress,
    /// Neither
    Reject,
}

/// Sets up and evaluates the duress passcode
#[derive(Debug, Clone, Default)]
pub struct DuressGuard {
    credentials: PasscodeCredentialStore,
}

impl DuressGuard {
    /// Create around a credential store
    pub fn new(credentials: PasscodeCredentialStore) -> Self {
        Self { credentials }
    }

    /// Bind a duress passcode against the current real credential
    ///
    /// Fails `DuplicateCredential` when the duress passcode hashes to the real
    /// verifier; no binding is produced in that case.
    pub fn setup(&self, duress_passcode: &str, real: &PasscodeCredential) -> Result<DuressBinding> {
        validate_passcode(duress_passcode)?;

        let duress_hash = self.credentials.hash(duress_passcode, real.salt());
        if duress_hash.as_slice() == real.verifier_hash() {
            tracing::warn!("duress passcode rejected: matches the real passcode");
            return Err(Error::DuplicateCredential(
                "duress passcode must differ from the real passcode".to_string(),
            ));
        }

        tracing::info!("duress passcode configured");
        Ok(DuressBinding {
            duress_hash: duress_hash.to_vec(),
            enabled: true,
            salt: real.salt().to_vec(),
            created_at: Utc::now(),
        })
    }

    /// Classify `entered` as real, duress or neither
    pub fn evaluate_unlock(
        &self,
        entered: &str,
        real: &PasscodeCredential,
        binding: Option<&DuressBinding>,
    ) -> UnlockOutcome {
        let (duress_salt, duress_target, active) = match binding {
            Some(b) => (b.salt.as_slice(), b.duress_hash.as_slice(), b.enabled),
            None => (real.salt(), DUMMY_TARGET.as_slice(), false),
        };

        let real_hash = self.credentials.hash(entered, real.salt());
        let duress_hash = self.credentials.hash(entered, duress_salt);

        let real_match = real_hash.as_slice().ct_eq(real.verifier_hash());
        let duress_match = duress_hash.as_slice().ct_eq(duress_target) & Choice::from(active as u8);

        if bool::from(real_match) {
            UnlockOutcome::Real
        } else if bool::from(duress_match) {
            UnlockOutcome::Duress
        } else {
            UnlockOutcome::Reject
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_crypto::KdfParams;

    fn real() -> PasscodeCredential {
        PasscodeCredentialStore::default()
            .setup("1111", KdfParams::default())
            .unwrap()
    }

    #[test]
    fn test_three_way_evaluation() {
        let guard = DuressGuard::default();
        let real = real();
        let binding = guard.setup("9999", &real).unwrap();

        assert_eq!(guard.evaluate_unlock("1111", &real, Some(&binding)), UnlockOutcome::Real);
        assert_eq!(guard.evaluate_unlock("9999", &real, Some(&binding)), UnlockOutcome::Duress);
        assert_eq!(guard.evaluate_unlock("5555", &real, Some(&binding)), UnlockOutcome::Reject);
    }

    #[test]
    fn test_duplicate_of_real_rejected() {
        let guard = DuressGuard::default();
        let real = real();
        assert!(matches!(
            guard.setup("1111", &real),
            Err(Error::DuplicateCredential(_))
        ));
        assert_eq!(guard.evaluate_unlock("1111", &real, None), UnlockOutcome::Real);
    }

    #[test]
    fn test_disabled_binding_is_ignored() {
        let guard = DuressGuard::default();
        let real = real();
        let binding = guard.setup("9999", &real).unwrap().with_enabled(false);

        assert!(!binding.is_enabled());
        assert_eq!(guard.evaluate_unlock("9999", &real, Some(&binding)), UnlockOutcome::Reject);
    }

    #[test]
    fn test_no_binding_rejects_everything_but_real() {
        let guard = DuressGuard::default();
        let real = real();
        assert_eq!(guard.evaluate_unlock("9999", &real, None), UnlockOutcome::Reject);
    }

    #[test]
    fn test_binding_survives_real_resalt() {
        let guard = DuressGuard::default();
        let store = PasscodeCredentialStore::default();
        let original = real();
        let binding = guard.setup("9999", &original).unwrap();

        let rotated = store.setup("1111", KdfParams::default()).unwrap();
        assert_ne!(rotated.salt(), original.salt());
        assert_eq!(guard.evaluate_unlock("9999", &rotated, Some(&binding)), UnlockOutcome::Duress);
        assert_eq!(guard.evaluate_unlock("1111", &rotated, Some(&binding)), UnlockOutcome::Real);
    }

    #[test]
    fn test_short_duress_passcode_rejected() {
        let guard = DuressGuard::default();
        assert!(matches!(guard.setup("99", &real()), Err(Error::Validation(_))));
    }
}
