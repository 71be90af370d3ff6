//! Keyward cryptographic primitives
//!
//! Building blocks for the local credential lifecycle. Nothing in this crate
//! persists data or makes policy decisions; it turns passcodes into keys,
//! keys into ciphertext, and secrets into threshold shares.
//!
//! ## Primitives
//!
//! - **Authenticated encryption**: AES-256-GCM with a fresh 96-bit IV per blob
//! - **Master key derivation**: Argon2id (64 MiB, 3 iterations, 4 lanes) or
//!   PBKDF2-HMAC-SHA256 (at least 100,000 iterations)
//! - **Privacy subkeys**: HKDF-SHA256 expansion keyed by privacy level
//! - **Secret splitting**: Shamir's Secret Sharing over GF(256), 2 ≤ M ≤ N ≤ 20
//!
//! All primitives are reached through [`CryptoProvider`], so a native
//! AEAD/KDF library can be dropped in without touching call sites.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod provider;
pub mod shamir;

pub use cipher::{BlobAlgorithm, EncryptedBlob, SymmetricCipher, BLOB_VERSION};
pub use error::{CryptoError, Result};
pub use kdf::{
    KdfParams, KeyDerivation, ARGON2_ITERATIONS, ARGON2_MEMORY_KIB, ARGON2_PARALLELISM,
    PBKDF2_MIN_ITERATIONS,
};
pub use keys::{MasterKey, PrivacyKey, PrivacyLevel, SymmetricKey, IV_LEN, KEY_LEN, TAG_LEN};
pub use provider::{default_provider, CryptoProvider, RustCryptoProvider};
pub use shamir::{SecretShare, SecretSplitter, MAX_SHARES, MIN_THRESHOLD};
