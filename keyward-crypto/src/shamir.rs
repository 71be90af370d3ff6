//! Shamir's Secret Sharing over GF(256)
//!
//! Splits a recovery secret into N shares so that any M of them reconstruct
//! it and M-1 reveal nothing. Interpolation is delegated to `sharks`; this
//! module owns the share encoding and all validation around it.
//!
//! # Share encoding
//!
//! `encoded_value = hex(format(1) | threshold(1) | x(1) | y(n) | checksum(4))`
//!
//! The checksum is the first four bytes of SHA-256 over the preceding bytes,
//! so a mistyped share is rejected as malformed instead of silently producing
//! a wrong secret.

use crate::provider::{default_provider, CryptoProvider};
use crate::{CryptoError, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use sharks::{Share, Sharks};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Smallest threshold accepted
pub const MIN_THRESHOLD: u8 = 2;

/// Largest number of shares per split
pub const MAX_SHARES: u8 = 20;

const SHARE_FORMAT: u8 = 1;
const CHECKSUM_LEN: usize = 4;
const PREFIX_LEN: usize = 3;

/// One share of a split secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretShare {
    /// Share index, 1-based
    pub share_id: u8,
    /// Hex-encoded share body
    pub encoded_value: String,
    /// Optional holder label, e.g. the contact's name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SecretShare {
    /// Attach a holder label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Debug for SecretShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretShare")
            .field("share_id", &self.share_id)
            .field("encoded_value", &"[REDACTED]")
            .field("label", &self.label)
            .finish()
    }
}

/// A share after format validation
struct ParsedShare {
    threshold: u8,
    x: u8,
    y: Zeroizing<Vec<u8>>,
}

/// Splits and reconstructs secrets
#[derive(Clone)]
pub struct SecretSplitter {
    provider: Arc<dyn CryptoProvider>,
}

impl fmt::Debug for SecretSplitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSplitter")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl Default for SecretSplitter {
    fn default() -> Self {
        Self::new(default_provider())
    }
}

impl SecretSplitter {
    /// Create with an explicit provider
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { provider }
    }

    /// Split `secret` into `total` shares with reconstruction threshold
    /// `threshold`
    ///
    /// Requires `2 <= threshold <= total <= 20`. Share ids are `1..=total`.
    pub fn split(&self, secret: &[u8], total: u8, threshold: u8) -> Result<Vec<SecretShare>> {
        if secret.is_empty() {
            return Err(CryptoError::InvalidParameters(
                "secret must not be empty".to_string(),
            ));
        }
        if threshold < MIN_THRESHOLD || threshold > total || total > MAX_SHARES {
            return Err(CryptoError::InvalidParameters(format!(
                "require {} <= threshold <= total <= {}, got threshold {} of {}",
                MIN_THRESHOLD, MAX_SHARES, threshold, total
            )));
        }

        let mut seed = Zeroizing::new([0u8; 32]);
        self.provider.fill_random(seed.as_mut())?;
        let mut rng = StdRng::from_seed(*seed);

        let shares = Sharks(threshold)
            .dealer_rng(secret, &mut rng)
            .take(total as usize)
            .map(|share| self.encode(threshold, &share))
            .collect::<Result<Vec<_>>>()?;

        if shares.len() != total as usize {
            return Err(CryptoError::InvalidParameters(format!(
                "dealer produced {} of {} shares",
                shares.len(),
                total
            )));
        }

        tracing::debug!(total, threshold, "secret split");
        Ok(shares)
    }

    /// Reconstruct a secret from at least `threshold` distinct shares
    ///
    /// Every share is validated before interpolation. Identical duplicates
    /// collapse into one; two different values for the same index are
    /// malformed. Never returns a partial result.
    pub fn reconstruct(&self, shares: &[SecretShare]) -> Result<Zeroizing<Vec<u8>>> {
        if shares.is_empty() {
            return Err(CryptoError::InsufficientShares {
                required: MIN_THRESHOLD as usize,
                provided: 0,
            });
        }

        let parsed = shares
            .iter()
            .map(|share| self.parse(share))
            .collect::<Result<Vec<_>>>()?;

        let threshold = parsed[0].threshold;
        let y_len = parsed[0].y.len();
        let mut distinct: BTreeMap<u8, &ParsedShare> = BTreeMap::new();
        for share in &parsed {
            if share.threshold != threshold {
                return Err(CryptoError::MalformedShare(
                    "shares disagree on threshold".to_string(),
                ));
            }
            if share.y.len() != y_len {
                return Err(CryptoError::MalformedShare(
                    "shares disagree on length".to_string(),
                ));
            }
            match distinct.get(&share.x) {
                Some(existing) if existing.y.as_slice() != share.y.as_slice() => {
                    return Err(CryptoError::MalformedShare(format!(
                        "conflicting values for share {}",
                        share.x
                    )));
                }
                Some(_) => {}
                None => {
                    distinct.insert(share.x, share);
                }
            }
        }

        if distinct.len() < threshold as usize {
            return Err(CryptoError::InsufficientShares {
                required: threshold as usize,
                provided: distinct.len(),
            });
        }

        let sharks_shares = distinct
            .values()
            .map(|share| {
                let mut raw = Zeroizing::new(Vec::with_capacity(1 + share.y.len()));
                raw.push(share.x);
                raw.extend_from_slice(&share.y);
                Share::try_from(raw.as_slice())
                    .map_err(|e| CryptoError::MalformedShare(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let secret = Sharks(threshold)
            .recover(&sharks_shares)
            .map_err(|e| CryptoError::MalformedShare(e.to_string()))?;

        Ok(Zeroizing::new(secret))
    }

    fn encode(&self, threshold: u8, share: &Share) -> Result<SecretShare> {
        let raw = Zeroizing::new(Vec::<u8>::from(share));
        let Some(&x) = raw.first() else {
            return Err(CryptoError::MalformedShare("empty share".to_string()));
        };

        let mut body = Zeroizing::new(Vec::with_capacity(PREFIX_LEN + raw.len() + CHECKSUM_LEN));
        body.push(SHARE_FORMAT);
        body.push(threshold);
        body.extend_from_slice(&raw);
        let checksum = self.provider.digest(&[body.as_slice()]);
        body.extend_from_slice(&checksum[..CHECKSUM_LEN]);

        Ok(SecretShare {
            share_id: x,
            encoded_value: hex::encode(&*body),
            label: None,
        })
    }

    fn parse(&self, share: &SecretShare) -> Result<ParsedShare> {
        let bytes = Zeroizing::new(hex::decode(share.encoded_value.trim()).map_err(|_| {
            CryptoError::MalformedShare(format!("share {} is not valid hex", share.share_id))
        })?);

        if bytes.len() < PREFIX_LEN + 1 + CHECKSUM_LEN {
            return Err(CryptoError::MalformedShare(format!(
                "share {} is too short",
                share.share_id
            )));
        }

        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let expected = self.provider.digest(&[body]);
        if checksum != &expected[..CHECKSUM_LEN] {
            return Err(CryptoError::MalformedShare(format!(
                "share {} failed checksum",
                share.share_id
            )));
        }

        if body[0] != SHARE_FORMAT {
            return Err(CryptoError::MalformedShare(format!(
                "share {} has unknown format {}",
                share.share_id, body[0]
            )));
        }

        let threshold = body[1];
        if !(MIN_THRESHOLD..=MAX_SHARES).contains(&threshold) {
            return Err(CryptoError::MalformedShare(format!(
                "share {} has invalid threshold {}",
                share.share_id, threshold
            )));
        }

        let x = body[2];
        if x == 0 || x > MAX_SHARES || x != share.share_id {
            return Err(CryptoError::MalformedShare(format!(
                "share {} has inconsistent index",
                share.share_id
            )));
        }

        Ok(ParsedShare {
            threshold,
            x,
            y: Zeroizing::new(body[PREFIX_LEN..].to_vec()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_reconstruct() {
        let splitter = SecretSplitter::default();
        let shares = splitter.split(b"recovery secret", 5, 3).unwrap();

        assert_eq!(shares.len(), 5);
        let ids: Vec<u8> = shares.iter().map(|s| s.share_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let secret = splitter.reconstruct(&shares[1..4]).unwrap();
        assert_eq!(secret.as_slice(), b"recovery secret");
    }

    #[test]
    fn test_split_parameter_bounds() {
        let splitter = SecretSplitter::default();
        assert!(splitter.split(b"s", 5, 1).is_err());
        assert!(splitter.split(b"s", 3, 4).is_err());
        assert!(splitter.split(b"s", 21, 3).is_err());
        assert!(splitter.split(b"", 5, 3).is_err());
        assert_eq!(splitter.split(b"s", 20, 20).unwrap().len(), 20);
        assert_eq!(splitter.split(b"s", 2, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_input_is_insufficient() {
        let splitter = SecretSplitter::default();
        assert_eq!(
            splitter.reconstruct(&[]).unwrap_err(),
            CryptoError::InsufficientShares {
                required: 2,
                provided: 0
            }
        );
    }

    #[test]
    fn test_identical_duplicates_collapse() {
        let splitter = SecretSplitter::default();
        let shares = splitter.split(b"dup", 5, 3).unwrap();

        let repeated = vec![shares[0].clone(), shares[0].clone(), shares[1].clone()];
        assert_eq!(
            splitter.reconstruct(&repeated).unwrap_err(),
            CryptoError::InsufficientShares {
                required: 3,
                provided: 2
            }
        );

        let enough = vec![
            shares[0].clone(),
            shares[0].clone(),
            shares[1].clone(),
            shares[2].clone(),
        ];
        assert_eq!(splitter.reconstruct(&enough).unwrap().as_slice(), b"dup");
    }

    #[test]
    fn test_conflicting_duplicates_are_malformed() {
        let splitter = SecretSplitter::default();
        let first = splitter.split(b"same length", 5, 3).unwrap();
        let second = splitter.split(b"same length", 5, 3).unwrap();

        let mixed = vec![first[0].clone(), second[0].clone(), first[1].clone(), first[2].clone()];
        assert!(matches!(
            splitter.reconstruct(&mixed),
            Err(CryptoError::MalformedShare(_))
        ));
    }

    #[test]
    fn test_transcription_error_is_caught() {
        let splitter = SecretSplitter::default();
        let mut shares = splitter.split(b"typo check", 3, 2).unwrap();

        let mut chars: Vec<char> = shares[0].encoded_value.chars().collect();
        chars[8] = if chars[8] == '0' { '1' } else { '0' };
        shares[0].encoded_value = chars.into_iter().collect();

        assert!(matches!(
            splitter.reconstruct(&shares),
            Err(CryptoError::MalformedShare(_))
        ));
    }

    #[test]
    fn test_non_hex_and_mismatched_id_are_malformed() {
        let splitter = SecretSplitter::default();
        let shares = splitter.split(b"abc", 3, 2).unwrap();

        let mut bad_hex = shares.clone();
        bad_hex[0].encoded_value = "zz-not-hex".to_string();
        assert!(matches!(
            splitter.reconstruct(&bad_hex),
            Err(CryptoError::MalformedShare(_))
        ));

        let mut wrong_id = shares.clone();
        wrong_id[0].share_id = 9;
        assert!(matches!(
            splitter.reconstruct(&wrong_id),
            Err(CryptoError::MalformedShare(_))
        ));
    }

    #[test]
    fn test_malformed_wins_over_insufficient() {
        let splitter = SecretSplitter::default();
        let shares = splitter.split(b"abc", 5, 3).unwrap();
        let mut one_bad = vec![shares[0].clone()];
        one_bad[0].encoded_value.push_str("00");
        assert!(matches!(
            splitter.reconstruct(&one_bad),
            Err(CryptoError::MalformedShare(_))
        ));
    }

    #[test]
    fn test_debug_redacts_value() {
        let splitter = SecretSplitter::default();
        let share = splitter.split(b"abc", 3, 2).unwrap().remove(0).with_label("alice");
        let printed = format!("{:?}", share);
        assert!(printed.contains("REDACTED"));
        assert!(printed.contains("alice"));
        assert!(!printed.contains(&share.encoded_value));
    }
}
