//! Error types

/// Result type
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Cryptographic errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Authentication tag did not verify.
    ///
    /// Raised for a wrong key and for tampered or corrupted bytes alike; the
    /// two cases are deliberately indistinguishable.
    #[error("Integrity check failed")]
    Integrity,

    /// Blob carries a version or algorithm this build does not understand
    #[error("Unsupported blob: {0}")]
    UnsupportedBlob(String),

    /// Key material has the wrong shape
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Key derivation failed
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Caller supplied parameters outside the accepted range
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Not enough distinct shares to reach the threshold
    #[error("Insufficient shares: need {required}, got {provided}")]
    InsufficientShares {
        /// Threshold recorded in the shares
        required: usize,
        /// Distinct shares supplied
        provided: usize,
    },

    /// A share failed format validation
    #[error("Malformed share: {0}")]
    MalformedShare(String),

    /// The random number generator failed
    #[error("Randomness unavailable: {0}")]
    Random(String),
}

impl CryptoError {
    /// Check if the error was caused by caller input rather than the platform
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CryptoError::Integrity
                | CryptoError::UnsupportedBlob(_)
                | CryptoError::InvalidParameters(_)
                | CryptoError::InsufficientShares { .. }
                | CryptoError::MalformedShare(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_message_carries_no_cause() {
        assert_eq!(CryptoError::Integrity.to_string(), "Integrity check failed");
    }

    #[test]
    fn test_input_error_classification() {
        assert!(CryptoError::Integrity.is_input_error());
        assert!(CryptoError::InsufficientShares { required: 3, provided: 2 }.is_input_error());
        assert!(!CryptoError::Random("os".to_string()).is_input_error());
        assert!(!CryptoError::KeyDerivation("argon2".to_string()).is_input_error());
    }
}
