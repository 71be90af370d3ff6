//! Keyward Vault
//!
//! The credential-to-key lifecycle on top of `keyward-crypto`:
//!
//! - **Passcode credential**: salted SHA-256 verifier, constant-time check
//! - **Unlock**: passcode → Argon2id master key → per-level privacy keys
//! - **Duress**: a second passcode that opens a decoy session instead
//! - **Rotation**: re-salt the credential and re-key supplied blobs
//! - **Emergency access**: Shamir recovery kit of the passcode
//! - **Dead man's switch**: inactivity status and action dispatch
//! - **Passkeys**: optional platform-authenticator second factor
//!
//! [`SecurityManager`] ties these to a [`SecurityConfig`] persisted through a
//! [`ConfigStore`]; [`KeyWorker`] moves the slow parts off async callers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credential;
pub mod duress;
pub mod emergency;
mod encoding;
pub mod error;
pub mod inactivity;
pub mod manager;
pub mod passkey;
pub mod rotation;
pub mod session;
pub mod store;
pub mod worker;

pub use config::{
    DecoyDataset, DecoyEntry, SecurityConfig, DEFAULT_PRIVACY_LEVELS, MAX_PRIVACY_LEVELS,
};
pub use credential::{
    evaluate_strength, PasscodeCredential, PasscodeCredentialStore, PasscodeStrength,
    MIN_PASSCODE_LEN, SALT_LEN,
};
pub use duress::{DuressBinding, DuressGuard, UnlockOutcome};
pub use emergency::{EmergencyAccess, EmergencyContact};
pub use error::{Error, ErrorCategory, Result};
pub use inactivity::{
    get_status, should_trigger, ActionSink, InactivityAction, InactivityMonitor, InactivityState,
    InactivityStatus, UrgencyLevel,
};
pub use manager::SecurityManager;
pub use passkey::{CredentialRegistry, MockAuthenticator, PlatformAuthenticator, RegisteredPasskey};
pub use rotation::{
    is_rotation_due, KeyRotationService, RotationItem, RotationResult, RotationSchedule,
};
pub use session::{PrivacyKeyring, UnlockMode, VaultSession};
pub use store::{data_dir, ConfigStore, FileConfigStore, MemoryConfigStore};
pub use worker::KeyWorker;

pub use keyward_crypto::{EncryptedBlob, KdfParams, PrivacyLevel, SecretShare};
