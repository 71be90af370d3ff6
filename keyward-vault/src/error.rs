//! Error types for Keyward Vault
//!
//! Error taxonomy for the credential lifecycle. A failed unlock always maps to
//! [`Error::Authentication`] with no further detail, whatever the cause.

use keyward_crypto::CryptoError;
use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Keyward Vault errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Passcode, duress attempt or passkey assertion rejected
    #[error("Authentication failed")]
    Authentication,

    /// Ciphertext failed authentication
    #[error("Integrity check failed")]
    Integrity,

    /// Not enough distinct recovery shares
    #[error("Insufficient shares: need {required}, got {provided}")]
    InsufficientShares {
        /// Threshold recorded in the shares
        required: usize,
        /// Distinct shares supplied
        provided: usize,
    },

    /// A recovery share failed validation
    #[error("Malformed share: {0}")]
    MalformedShare(String),

    /// New credential collides with an existing one
    #[error("Duplicate credential: {0}")]
    DuplicateCredential(String),

    /// Rotation committed but some items could not be re-encrypted
    #[error("Rotation incomplete: {} item(s) failed", failed.len())]
    RotationPartialFailure {
        /// Ids of the items left under the old key
        failed: Vec<String>,
    },

    /// Required state has not been set up yet
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Input rejected before any work was done
    #[error("Validation error: {0}")]
    Validation(String),

    /// Config store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Background task failure
    #[error("Worker error: {0}")]
    Worker(String),

    /// Other cryptographic failure
    #[error("Crypto error: {0}")]
    Crypto(CryptoError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Integrity => Error::Integrity,
            CryptoError::InsufficientShares { required, provided } => {
                Error::InsufficientShares { required, provided }
            }
            CryptoError::MalformedShare(msg) => Error::MalformedShare(msg),
            other => Error::Crypto(other),
        }
    }
}

impl Error {
    /// Check if error is a user-facing error (vs internal error)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::Authentication
                | Error::InsufficientShares { .. }
                | Error::MalformedShare(_)
                | Error::DuplicateCredential(_)
                | Error::NotConfigured(_)
                | Error::Validation(_)
        )
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Error::Authentication => "Incorrect passcode. Please try again.".to_string(),
            Error::Integrity => {
                "This item could not be decrypted. It may be damaged.".to_string()
            }
            Error::InsufficientShares { required, provided } => format!(
                "{} recovery shares are needed, but only {} were provided.",
                required, provided
            ),
            Error::MalformedShare(_) => {
                "One of the recovery shares is invalid. Please check it was entered correctly."
                    .to_string()
            }
            Error::DuplicateCredential(_) => {
                "This passcode cannot be used here. Please choose a different one.".to_string()
            }
            Error::RotationPartialFailure { failed } => format!(
                "Your keys were rotated, but {} item(s) could not be updated.",
                failed.len()
            ),
            Error::NotConfigured(_) => "Please set up a passcode first.".to_string(),
            Error::Validation(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Authentication | Error::DuplicateCredential(_) => ErrorCategory::Credential,
            Error::Integrity | Error::Crypto(_) => ErrorCategory::Crypto,
            Error::InsufficientShares { .. } | Error::MalformedShare(_) => ErrorCategory::Recovery,
            Error::RotationPartialFailure { .. } => ErrorCategory::Rotation,
            Error::NotConfigured(_) | Error::Validation(_) => ErrorCategory::Configuration,
            Error::Storage(_) | Error::Io(_) | Error::Serialization(_) => ErrorCategory::Storage,
            Error::Worker(_) => ErrorCategory::Internal,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Passcode and passkey errors
    Credential,
    /// Cipher and key derivation errors
    Crypto,
    /// Secret share errors
    Recovery,
    /// Key rotation errors
    Rotation,
    /// Setup and input errors
    Configuration,
    /// Persistence errors
    Storage,
    /// Internal/system errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Credential => write!(f, "Credential"),
            ErrorCategory::Crypto => write!(f, "Crypto"),
            ErrorCategory::Recovery => write!(f, "Recovery"),
            ErrorCategory::Rotation => write!(f, "Rotation"),
            ErrorCategory::Configuration => write!(f, "Configuration"),
            ErrorCategory::Storage => write!(f, "Storage"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_error_mapping() {
        assert!(matches!(Error::from(CryptoError::Integrity), Error::Integrity));
        assert!(matches!(
            Error::from(CryptoError::InsufficientShares {
                required: 3,
                provided: 2
            }),
            Error::InsufficientShares {
                required: 3,
                provided: 2
            }
        ));
        assert!(matches!(
            Error::from(CryptoError::Random("os".to_string())),
            Error::Crypto(_)
        ));
    }

    #[test]
    fn test_user_error_detection() {
        assert!(Error::Authentication.is_user_error());
        assert!(Error::Validation("short".to_string()).is_user_error());
        assert!(!Error::Storage("disk".to_string()).is_user_error());
        assert!(!Error::Integrity.is_user_error());
    }

    #[test]
    fn test_user_messages() {
        assert!(Error::Authentication.user_message().contains("Incorrect passcode"));
        let msg = Error::InsufficientShares {
            required: 3,
            provided: 2,
        }
        .user_message();
        assert!(msg.contains('3') && msg.contains('2'));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::Authentication.category(), ErrorCategory::Credential);
        assert_eq!(
            Error::RotationPartialFailure { failed: vec!["a".into()] }.category(),
            ErrorCategory::Rotation
        );
        assert_eq!(ErrorCategory::Recovery.to_string(), "Recovery");
    }
}
