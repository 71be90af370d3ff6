//! Crypto provider abstraction
//!
//! Every primitive the workspace needs goes through [`CryptoProvider`]. The
//! default [`RustCryptoProvider`] is backed by the RustCrypto crates; a
//! platform-native implementation can be swapped in by handing a different
//! provider to [`crate::SymmetricCipher`] and [`crate::KeyDerivation`].

use crate::kdf::KdfParams;
use crate::keys::{SymmetricKey, IV_LEN, TAG_LEN};
use crate::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Primitive operations backing the cipher and key derivation
pub trait CryptoProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Fill `out` from a cryptographically secure RNG
    fn fill_random(&self, out: &mut [u8]) -> Result<()>;

    /// AES-256-GCM seal with no associated data, returning ciphertext and tag
    fn aead_seal(
        &self,
        key: &SymmetricKey,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, [u8; TAG_LEN])>;

    /// AES-256-GCM open with no associated data
    ///
    /// Any verification failure is reported as [`CryptoError::Integrity`].
    fn aead_open(
        &self,
        key: &SymmetricKey,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
        tag: &[u8; TAG_LEN],
    ) -> Result<Zeroizing<Vec<u8>>>;

    /// Slow, salted passcode stretching
    fn stretch(&self, passcode: &[u8], salt: &[u8], params: &KdfParams, out: &mut [u8])
        -> Result<()>;

    /// HKDF-SHA256 extract-and-expand
    fn expand(&self, ikm: &[u8], salt: &[u8], info: &[u8], out: &mut [u8]) -> Result<()>;

    /// SHA-256 over the concatenation of `parts`
    fn digest(&self, parts: &[&[u8]]) -> [u8; 32];
}

/// Provider backed by the RustCrypto crates and the OS RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoProvider;

impl CryptoProvider for RustCryptoProvider {
    fn name(&self) -> &'static str {
        "rustcrypto"
    }

    fn fill_random(&self, out: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(out)
            .map_err(|e| CryptoError::Random(e.to_string()))
    }

    fn aead_seal(
        &self,
        key: &SymmetricKey,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, [u8; TAG_LEN])> {
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let nonce = Nonce::from_slice(iv);

        // aes-gcm appends the tag; split it off so the blob keeps it separately
        let mut sealed = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::InvalidParameters("plaintext too large".to_string()))?;
        if sealed.len() < TAG_LEN {
            return Err(CryptoError::Integrity);
        }
        let split = sealed.len() - TAG_LEN;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&sealed[split..]);
        sealed.truncate(split);

        Ok((sealed, tag))
    }

    fn aead_open(
        &self,
        key: &SymmetricKey,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
        tag: &[u8; TAG_LEN],
    ) -> Result<Zeroizing<Vec<u8>>> {
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let nonce = Nonce::from_slice(iv);

        let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        cipher
            .decrypt(nonce, sealed.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::Integrity)
    }

    fn stretch(
        &self,
        passcode: &[u8],
        salt: &[u8],
        params: &KdfParams,
        out: &mut [u8],
    ) -> Result<()> {
        match *params {
            KdfParams::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => {
                let params = Params::new(memory_kib, iterations, parallelism, Some(out.len()))
                    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
                Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                    .hash_password_into(passcode, salt, out)
                    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
            }
            KdfParams::Pbkdf2Sha256 { iterations } => {
                pbkdf2::pbkdf2_hmac::<Sha256>(passcode, salt, iterations, out);
                Ok(())
            }
        }
    }

    fn expand(&self, ikm: &[u8], salt: &[u8], info: &[u8], out: &mut [u8]) -> Result<()> {
        Hkdf::<Sha256>::new(Some(salt), ikm)
            .expand(info, out)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
    }

    fn digest(&self, parts: &[&[u8]]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().into()
    }
}

/// Shared handle to the default provider
pub fn default_provider() -> Arc<dyn CryptoProvider> {
    Arc::new(RustCryptoProvider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let provider = RustCryptoProvider;
        let key = SymmetricKey::from_bytes([3u8; 32]);
        let iv = [9u8; IV_LEN];

        let (ct, tag) = provider.aead_seal(&key, &iv, b"hello vault").unwrap();
        assert_eq!(ct.len(), b"hello vault".len());

        let pt = provider.aead_open(&key, &iv, &ct, &tag).unwrap();
        assert_eq!(pt.as_slice(), b"hello vault");
    }

    #[test]
    fn test_open_with_wrong_tag_is_integrity_error() {
        let provider = RustCryptoProvider;
        let key = SymmetricKey::from_bytes([3u8; 32]);
        let iv = [9u8; IV_LEN];

        let (ct, mut tag) = provider.aead_seal(&key, &iv, b"payload").unwrap();
        tag[0] ^= 0x01;
        assert_eq!(
            provider.aead_open(&key, &iv, &ct, &tag).unwrap_err(),
            CryptoError::Integrity
        );
    }

    #[test]
    fn test_digest_concatenates_parts() {
        let provider = RustCryptoProvider;
        assert_eq!(
            provider.digest(&[b"abc", b"def"]),
            provider.digest(&[b"abcdef"])
        );
    }

    #[test]
    fn test_known_sha256_vector() {
        let provider = RustCryptoProvider;
        assert_eq!(
            hex::encode(provider.digest(&[b"abc"])),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_stretch_rejects_bad_argon2_params() {
        let provider = RustCryptoProvider;
        let mut out = [0u8; 32];
        let params = KdfParams::Argon2id {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        };
        assert!(matches!(
            provider.stretch(b"pw", &[0u8; 32], &params, &mut out),
            Err(CryptoError::KeyDerivation(_))
        ));
    }
}
