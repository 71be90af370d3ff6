//! Security manager
//!
//! Facade over the credential services, bound to one [`SecurityConfig`] and
//! the [`ConfigStore`] it is persisted through. Every mutation works on a
//! copy of the config, saves it, and only then replaces the in-memory copy.

use crate::config::SecurityConfig;
use crate::credential::{evaluate_strength, PasscodeCredentialStore, PasscodeStrength};
use crate::duress::{DuressGuard, UnlockOutcome};
use crate::emergency::{EmergencyAccess, EmergencyContact};
use crate::inactivity::{InactivityAction, InactivityMonitor, InactivityStatus};
use crate::passkey::{CredentialRegistry, PlatformAuthenticator, RegisteredPasskey};
use crate::rotation::{KeyRotationService, RotationItem, RotationResult};
use crate::session::{PrivacyKeyring, VaultSession};
use crate::store::ConfigStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use keyward_crypto::{
    default_provider, CryptoProvider, KdfParams, KeyDerivation, SecretShare, SecretSplitter,
    SymmetricCipher,
};
use parking_lot::RwLock;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Facade over the credential lifecycle
pub struct SecurityManager {
    config: RwLock<SecurityConfig>,
    store: Arc<dyn ConfigStore>,
    credentials: PasscodeCredentialStore,
    kdf: KeyDerivation,
    cipher: SymmetricCipher,
    duress: DuressGuard,
    rotation: KeyRotationService,
    emergency: EmergencyAccess,
    provider: Arc<dyn CryptoProvider>,
    authenticator: Option<Arc<dyn PlatformAuthenticator>>,
}

impl std::fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityManager")
            .field("configured", &self.config.read().is_configured())
            .field("authenticator", &self.authenticator.is_some())
            .finish_non_exhaustive()
    }
}

impl SecurityManager {
    /// Load config from `store` using the default crypto provider
    pub fn open(store: Arc<dyn ConfigStore>) -> Result<Self> {
        Self::with_provider(store, default_provider())
    }

    /// Load config from `store` using `provider` for all primitives
    pub fn with_provider(
        store: Arc<dyn ConfigStore>,
        provider: Arc<dyn CryptoProvider>,
    ) -> Result<Self> {
        let config = store.load()?;
        config.validate()?;

        let credentials = PasscodeCredentialStore::new(provider.clone());
        let kdf = KeyDerivation::new(provider.clone());
        let cipher = SymmetricCipher::new(provider.clone());
        let splitter = SecretSplitter::new(provider.clone());

        tracing::debug!(configured = config.is_configured(), "security manager opened");
        Ok(Self {
            config: RwLock::new(config),
            store,
            duress: DuressGuard::new(credentials.clone()),
            rotation: KeyRotationService::new(credentials.clone(), kdf.clone(), cipher.clone()),
            emergency: EmergencyAccess::new(credentials.clone(), splitter),
            credentials,
            kdf,
            cipher,
            provider,
            authenticator: None,
        })
    }

    /// Attach a platform authenticator for passkey operations
    pub fn with_authenticator(mut self, authenticator: Arc<dyn PlatformAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Snapshot of the current config
    pub fn config(&self) -> SecurityConfig {
        self.config.read().clone()
    }

    /// Whether a passcode has been set up
    pub fn is_configured(&self) -> bool {
        self.config.read().is_configured()
    }

    // ------------------------------------------------------------------
    // Passcode
    // ------------------------------------------------------------------

    /// Create the passcode credential
    pub fn setup_passcode(&self, passcode: &str) -> Result<()> {
        self.update(|config| {
            if config.credential.is_some() {
                return Err(Error::Validation(
                    "A passcode is already set up.".to_string(),
                ));
            }
            let credential = self.credentials.setup(passcode, config.kdf)?;
            config.rotation.last_rotation = Some(credential.created_at());
            config.inactivity.record_activity(credential.created_at());
            config.credential = Some(credential);
            Ok(())
        })
    }

    /// Check a passcode without unlocking
    pub fn verify_passcode(&self, passcode: &str) -> Result<bool> {
        let config = self.config.read();
        let credential = config
            .credential
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("no passcode credential".to_string()))?;
        Ok(self.credentials.verify(passcode, credential))
    }

    /// Strength feedback for a candidate passcode
    pub fn passcode_strength(&self, passcode: &str) -> PasscodeStrength {
        evaluate_strength(passcode)
    }

    /// Unlock the vault
    ///
    /// The real passcode yields a real session, the duress passcode a decoy
    /// session, anything else `Authentication`. All three paths run one slow
    /// KDF derivation and none of them writes the config. Callers report
    /// activity separately through [`Self::record_activity`].
    pub fn unlock(&self, passcode: &str) -> Result<VaultSession> {
        let config = self.config();
        let credential = config
            .credential
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("no passcode credential".to_string()))?;

        match self
            .duress
            .evaluate_unlock(passcode, credential, config.duress.as_ref())
        {
            UnlockOutcome::Real => {
                let master = self.kdf.derive_master_key(
                    passcode.as_bytes(),
                    credential.salt(),
                    credential.kdf(),
                )?;
                if config.require_passkey {
                    self.authenticate_passkey()?;
                }
                let keyring = PrivacyKeyring::derive(&self.kdf, &master, config.privacy_levels)?;

                tracing::info!(mode = "real", "vault unlocked");
                Ok(VaultSession::real(keyring, self.cipher.clone()))
            }
            UnlockOutcome::Duress => {
                let salt = config
                    .duress
                    .as_ref()
                    .map(|binding| binding.salt())
                    .unwrap_or(credential.salt());
                // Matches the real path's cost; the key is discarded
                let _ = self
                    .kdf
                    .derive_master_key(passcode.as_bytes(), salt, credential.kdf())?;
                if config.require_passkey {
                    self.authenticate_passkey()?;
                }

                tracing::info!(mode = "duress", "vault unlocked");
                VaultSession::decoy(
                    &self.kdf,
                    self.cipher.clone(),
                    config.privacy_levels,
                    config.decoy.clone(),
                )
            }
            UnlockOutcome::Reject => {
                let _ = self.kdf.derive_master_key(
                    passcode.as_bytes(),
                    credential.salt(),
                    credential.kdf(),
                )?;
                tracing::info!("unlock rejected");
                Err(Error::Authentication)
            }
        }
    }

    /// KDF parameters used by the next setup or rotation
    pub fn set_kdf_params(&self, params: KdfParams) -> Result<()> {
        self.update(|config| {
            config.kdf = params;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Duress
    // ------------------------------------------------------------------

    /// Bind a duress passcode
    ///
    /// On failure the previous duress state is left unchanged.
    pub fn set_duress_passcode(&self, duress_passcode: &str) -> Result<()> {
        self.update(|config| {
            let credential = config
                .credential
                .as_ref()
                .ok_or_else(|| Error::NotConfigured("no passcode credential".to_string()))?;
            let binding = self.duress.setup(duress_passcode, credential)?;
            config.duress = Some(binding);
            Ok(())
        })
    }

    /// Enable or disable an existing duress binding
    pub fn set_duress_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|config| {
            let binding = config
                .duress
                .as_ref()
                .ok_or_else(|| Error::NotConfigured("no duress passcode".to_string()))?;
            config.duress = Some(binding.with_enabled(enabled));
            Ok(())
        })
    }

    /// Delete the duress binding
    pub fn remove_duress(&self) -> Result<()> {
        self.update(|config| {
            config.duress = None;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Rotation
    // ------------------------------------------------------------------

    /// Rotate the credential and re-key `items`
    pub fn rotate(&self, passcode: &str, items: Vec<RotationItem>) -> Result<RotationResult> {
        let mut config = self.config.write();
        self.rotation
            .rotate(passcode, items, &mut config, self.store.as_ref(), Utc::now())
    }

    /// Whether a rotation reminder is due
    pub fn is_rotation_due(&self, now: DateTime<Utc>) -> bool {
        self.config.read().rotation.is_due(now)
    }

    /// Change the rotation reminder interval
    pub fn set_rotation_reminder(&self, days: u32) -> Result<()> {
        self.update(|config| {
            config.rotation.reminder_days = days;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Inactivity
    // ------------------------------------------------------------------

    /// Record user activity
    pub fn record_activity(&self, now: DateTime<Utc>) -> Result<()> {
        self.update(|config| {
            config.inactivity.record_activity(now);
            Ok(())
        })
    }

    /// Switch status
    pub fn inactivity_status(&self, now: DateTime<Utc>) -> InactivityStatus {
        self.config.read().inactivity.status(now)
    }

    /// Arm the switch
    pub fn arm_inactivity(&self, threshold_days: u32, action: InactivityAction) -> Result<()> {
        self.update(|config| {
            config.inactivity.threshold_days = threshold_days;
            config.inactivity.action = action;
            config.inactivity.armed = true;
            config.inactivity.fired_at = None;
            Ok(())
        })
    }

    /// Disarm the switch
    pub fn disarm_inactivity(&self) -> Result<()> {
        self.update(|config| {
            config.inactivity.armed = false;
            Ok(())
        })
    }

    /// Poll the switch, dispatching through `monitor` if due
    ///
    /// The sink runs without any lock held, so it may call back into the
    /// manager. Delivery is at-least-once: `fired_at` is persisted after the
    /// sink returns, and if that save fails (or another poll races this one)
    /// the action is dispatched again on a later poll.
    pub fn poll_inactivity(
        &self,
        monitor: &InactivityMonitor,
        now: DateTime<Utc>,
    ) -> Result<Option<InactivityAction>> {
        let (mut state, contacts) = {
            let config = self.config.read();
            if config.inactivity.fired_at.is_some() || !config.inactivity.should_trigger(now) {
                return Ok(None);
            }
            (config.inactivity.clone(), config.contacts.clone())
        };

        let fired = monitor.poll(&mut state, &contacts, now)?;
        if fired.is_some() {
            self.update(|config| {
                // Activity recorded while the sink ran re-arms the countdown
                if config.inactivity.last_activity == state.last_activity {
                    config.inactivity.fired_at = state.fired_at;
                }
                Ok(())
            })?;
        }
        Ok(fired)
    }

    // ------------------------------------------------------------------
    // Emergency access
    // ------------------------------------------------------------------

    /// Add an emergency contact
    pub fn add_contact(&self, contact: EmergencyContact) -> Result<()> {
        self.update(|config| {
            if config.contacts.iter().any(|c| c.name == contact.name) {
                return Err(Error::Validation(format!(
                    "A contact named {} already exists.",
                    contact.name
                )));
            }
            config.contacts.push(contact);
            Ok(())
        })
    }

    /// Remove an emergency contact by name
    pub fn remove_contact(&self, name: &str) -> Result<()> {
        self.update(|config| {
            let before = config.contacts.len();
            config.contacts.retain(|c| c.name != name);
            if config.contacts.len() == before {
                return Err(Error::Validation("Unknown contact.".to_string()));
            }
            Ok(())
        })
    }

    /// Emergency contacts
    pub fn contacts(&self) -> Vec<EmergencyContact> {
        self.config.read().contacts.clone()
    }

    /// Split the passcode into a recovery kit
    pub fn create_emergency_kit(
        &self,
        passcode: &str,
        total: u8,
        threshold: u8,
        labels: &[String],
    ) -> Result<Vec<SecretShare>> {
        let config = self.config.read();
        let credential = config
            .credential
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("no passcode credential".to_string()))?;
        self.emergency
            .create_kit(passcode, credential, total, threshold, labels)
    }

    /// Recover the passcode from kit shares
    pub fn recover_passcode(&self, shares: &[SecretShare]) -> Result<Zeroizing<String>> {
        let config = self.config.read();
        let credential = config
            .credential
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("no passcode credential".to_string()))?;
        self.emergency.recover(shares, credential)
    }

    // ------------------------------------------------------------------
    // Passkeys
    // ------------------------------------------------------------------

    /// Register a passkey with the attached authenticator
    pub fn register_passkey(&self, label: &str) -> Result<RegisteredPasskey> {
        let authenticator = self.authenticator()?;
        self.update(|config| {
            let mut registry = self.registry(authenticator, config);
            let passkey = registry.register(label)?;
            config.passkeys = registry.into_passkeys();
            Ok(passkey)
        })
    }

    /// Require an assertion from a registered passkey
    pub fn authenticate_passkey(&self) -> Result<RegisteredPasskey> {
        let authenticator = self.authenticator()?;
        self.update(|config| {
            let mut registry = self.registry(authenticator, config);
            let passkey = registry.authenticate()?;
            config.passkeys = registry.into_passkeys();
            Ok(passkey)
        })
    }

    /// Remove a passkey
    pub fn remove_passkey(&self, credential_id: &str) -> Result<()> {
        let authenticator = self.authenticator()?;
        self.update(|config| {
            let mut registry = self.registry(authenticator, config);
            registry.remove(credential_id)?;
            config.passkeys = registry.into_passkeys();
            Ok(())
        })
    }

    /// Registered passkeys
    pub fn passkeys(&self) -> Vec<RegisteredPasskey> {
        self.config.read().passkeys.clone()
    }

    /// Require a passkey on real unlock
    pub fn set_require_passkey(&self, required: bool) -> Result<()> {
        self.update(|config| {
            config.require_passkey = required;
            Ok(())
        })
    }

    fn registry(
        &self,
        authenticator: Arc<dyn PlatformAuthenticator>,
        config: &SecurityConfig,
    ) -> CredentialRegistry {
        CredentialRegistry::with_provider(
            authenticator,
            self.provider.clone(),
            config.passkeys.clone(),
        )
    }

    fn authenticator(&self) -> Result<Arc<dyn PlatformAuthenticator>> {
        self.authenticator
            .clone()
            .ok_or_else(|| Error::NotConfigured("no platform authenticator".to_string()))
    }

    fn update<T>(&self, f: impl FnOnce(&mut SecurityConfig) -> Result<T>) -> Result<T> {
        let mut guard = self.config.write();
        let mut next = guard.clone();
        let value = f(&mut next)?;
        next.validate()?;
        self.store.save(&next)?;
        *guard = next;
        Ok(value)
    }
}
