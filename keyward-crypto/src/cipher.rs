//! Authenticated encryption of content blobs
//!
//! Every blob is AES-256-GCM with a fresh 96-bit IV and no associated data.
//!
//! Byte framing for opaque stores:
//! `[version(1)][algorithm(1)][iv(12)][ciphertext(n)][tag(16)]`

use crate::keys::{SymmetricKey, IV_LEN, TAG_LEN};
use crate::provider::{default_provider, CryptoProvider};
use crate::{CryptoError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Current blob format version
pub const BLOB_VERSION: u8 = 1;

const HEADER_LEN: usize = 2;

/// Blob encryption algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlobAlgorithm {
    /// AES-256-GCM
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl BlobAlgorithm {
    /// Wire identifier
    pub fn id(&self) -> u8 {
        match self {
            BlobAlgorithm::Aes256Gcm => 0,
        }
    }

    /// Parse a wire identifier
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(BlobAlgorithm::Aes256Gcm),
            other => Err(CryptoError::UnsupportedBlob(format!(
                "unknown algorithm id {}",
                other
            ))),
        }
    }
}

/// Encrypted content blob
///
/// Immutable: re-encrypting produces a new blob with a fresh IV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlob {
    version: u8,
    algorithm: BlobAlgorithm,
    #[serde(with = "base64_bytes")]
    iv: Vec<u8>,
    #[serde(with = "base64_bytes")]
    ciphertext: Vec<u8>,
    #[serde(with = "base64_bytes")]
    auth_tag: Vec<u8>,
}

impl EncryptedBlob {
    /// Format version
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Encryption algorithm
    pub fn algorithm(&self) -> BlobAlgorithm {
        self.algorithm
    }

    /// Initialization vector
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Ciphertext without the tag
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Authentication tag
    pub fn auth_tag(&self) -> &[u8] {
        &self.auth_tag
    }

    /// Serialize to the compact byte framing
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            HEADER_LEN + self.iv.len() + self.ciphertext.len() + self.auth_tag.len(),
        );
        out.push(self.version);
        out.push(self.algorithm.id());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.auth_tag);
        out
    }

    /// Parse the compact byte framing
    ///
    /// Unknown version or algorithm fails `UnsupportedBlob`; truncated input
    /// fails `Integrity`, the same as a tag mismatch.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(CryptoError::Integrity);
        }
        let version = data[0];
        if version != BLOB_VERSION {
            return Err(CryptoError::UnsupportedBlob(format!(
                "unknown blob version {}",
                version
            )));
        }
        let algorithm = BlobAlgorithm::from_id(data[1])?;

        let body = &data[HEADER_LEN..];
        if body.len() < IV_LEN + TAG_LEN {
            return Err(CryptoError::Integrity);
        }
        let (iv, rest) = body.split_at(IV_LEN);
        let (ciphertext, auth_tag) = rest.split_at(rest.len() - TAG_LEN);

        Ok(Self {
            version,
            algorithm,
            iv: iv.to_vec(),
            ciphertext: ciphertext.to_vec(),
            auth_tag: auth_tag.to_vec(),
        })
    }
}

/// AES-256-GCM over byte strings
#[derive(Clone)]
pub struct SymmetricCipher {
    provider: Arc<dyn CryptoProvider>,
}

impl std::fmt::Debug for SymmetricCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricCipher")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl Default for SymmetricCipher {
    fn default() -> Self {
        Self::new(default_provider())
    }
}

impl SymmetricCipher {
    /// Create with an explicit provider
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { provider }
    }

    /// Encrypt under a fresh random IV
    pub fn encrypt(&self, plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedBlob> {
        let mut iv = [0u8; IV_LEN];
        self.provider.fill_random(&mut iv)?;

        let (ciphertext, tag) = self.provider.aead_seal(key, &iv, plaintext)?;

        Ok(EncryptedBlob {
            version: BLOB_VERSION,
            algorithm: BlobAlgorithm::Aes256Gcm,
            iv: iv.to_vec(),
            ciphertext,
            auth_tag: tag.to_vec(),
        })
    }

    /// Authenticated decryption
    ///
    /// Wrong key, tampering and malformed IV/tag lengths all fail
    /// [`CryptoError::Integrity`].
    pub fn decrypt(&self, blob: &EncryptedBlob, key: &SymmetricKey) -> Result<Zeroizing<Vec<u8>>> {
        if blob.version != BLOB_VERSION {
            return Err(CryptoError::UnsupportedBlob(format!(
                "unknown blob version {}",
                blob.version
            )));
        }
        let iv: &[u8; IV_LEN] = blob
            .iv
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::Integrity)?;
        let tag: &[u8; TAG_LEN] = blob
            .auth_tag
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::Integrity)?;

        self.provider.aead_open(key, iv, &blob.ciphertext, tag)
    }

    /// Decrypt under `old_key` and encrypt the plaintext under `new_key`
    pub fn reencrypt(
        &self,
        blob: &EncryptedBlob,
        old_key: &SymmetricKey,
        new_key: &SymmetricKey,
    ) -> Result<EncryptedBlob> {
        let plaintext = self.decrypt(blob, old_key)?;
        self.encrypt(&plaintext, new_key)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
