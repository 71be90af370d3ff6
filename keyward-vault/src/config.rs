//! Security configuration
//!
//! The single local-only settings object: credential, duress binding,
//! rotation schedule, switch state, contacts and passkeys. Serialized as JSON
//! through a [`crate::ConfigStore`]; never transmitted.

use crate::credential::PasscodeCredential;
use crate::duress::DuressBinding;
use crate::emergency::EmergencyContact;
use crate::inactivity::InactivityState;
use crate::passkey::RegisteredPasskey;
use crate::rotation::RotationSchedule;
use crate::{Error, Result};
use keyward_crypto::KdfParams;
use serde::{Deserialize, Serialize};

/// Default number of privacy levels
pub const DEFAULT_PRIVACY_LEVELS: u8 = 3;

/// Upper bound on privacy levels
pub const MAX_PRIVACY_LEVELS: u8 = 16;

/// One entry of the decoy dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoyEntry {
    /// Entry title
    pub title: String,
    /// Entry body
    pub body: String,
}

/// Plausible, non-sensitive content served in duress mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoyDataset {
    /// Entries in display order
    pub entries: Vec<DecoyEntry>,
}

impl Default for DecoyDataset {
    fn default() -> Self {
        let entry = |title: &str, body: &str| DecoyEntry {
            title: title.to_string(),
            body: body.to_string(),
        };
        Self {
            entries: vec![
                entry("Groceries", "Milk, eggs, bread, coffee, apples"),
                entry("Library", "Return books by Friday"),
                entry("Wi-Fi", "Guest network: CoffeeShop-Guest"),
                entry("Birthday ideas", "Board game, scarf, concert tickets"),
            ],
        }
    }
}

/// Security settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityConfig {
    /// Active passcode credential
    pub credential: Option<PasscodeCredential>,
    /// Duress binding
    pub duress: Option<DuressBinding>,
    /// Rotation reminder schedule
    pub rotation: RotationSchedule,
    /// Dead man's switch state
    pub inactivity: InactivityState,
    /// Emergency contacts
    pub contacts: Vec<EmergencyContact>,
    /// Registered passkeys
    pub passkeys: Vec<RegisteredPasskey>,
    /// Require a passkey assertion on real unlock
    pub require_passkey: bool,
    /// Number of privacy levels derived on unlock
    pub privacy_levels: u8,
    /// KDF parameters for new credentials
    pub kdf: KdfParams,
    /// Content served in duress mode
    pub decoy: DecoyDataset,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            credential: None,
            duress: None,
            rotation: RotationSchedule::default(),
            inactivity: InactivityState::default(),
            contacts: Vec::new(),
            passkeys: Vec::new(),
            require_passkey: false,
            privacy_levels: DEFAULT_PRIVACY_LEVELS,
            kdf: KdfParams::default(),
            decoy: DecoyDataset::default(),
        }
    }
}

impl SecurityConfig {
    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.privacy_levels == 0 || self.privacy_levels > MAX_PRIVACY_LEVELS {
            return Err(Error::Validation(format!(
                "Privacy levels must be between 1 and {}.",
                MAX_PRIVACY_LEVELS
            )));
        }
        self.kdf.validate()?;
        self.rotation.validate()?;
        self.inactivity.validate()?;

        if let Some(credential) = &self.credential {
            credential.validate()?;
        } else if self.duress.is_some() {
            return Err(Error::Validation(
                "duress binding present without a passcode credential".to_string(),
            ));
        }

        for contact in &self.contacts {
            contact.validate()?;
        }

        if self.require_passkey && self.passkeys.is_empty() {
            return Err(Error::Validation(
                "A passkey is required but none is registered.".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether a passcode has been set up
    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }
}
