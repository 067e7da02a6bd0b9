//! Signer identity derivation
//!
//! A signer identity is a DID-like string derived from the public key alone:
//! `did:inkless:` followed by the hex of the first [`IDENTITY_KEY_PREFIX`]
//! bytes of the key material. The same key always yields the same identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{CryptoError, CryptoResult};
use super::keys::PublicKey;

/// DID method namespace
pub const DID_NAMESPACE: &str = "did:inkless:";

/// Number of key bytes embedded in an identity
pub const IDENTITY_KEY_PREFIX: usize = 16;

/// A signer identifier derived from a public key
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignerIdentity(String);

impl SignerIdentity {
    /// Validate an identity string received from elsewhere
    ///
    /// Accepts any non-empty `did:<method>:<id>` string so identities minted by
    /// other registries can still be looked up and displayed.
    pub fn parse(s: &str) -> CryptoResult<Self> {
        let s = s.trim();
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("did"), Some(method), Some(id)) if !method.is_empty() && !id.is_empty() => {
                Ok(SignerIdentity(s.to_string()))
            }
            _ => Err(CryptoError::MalformedEncoding(format!(
                "not a DID: {}",
                s
            ))),
        }
    }

    /// The identity string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identity was minted by [`derive_identity`]
    pub fn is_native(&self) -> bool {
        self.0.starts_with(DID_NAMESPACE)
    }
}

impl fmt::Display for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the signer identity for a public key
pub fn derive_identity(public_key: &PublicKey) -> CryptoResult<SignerIdentity> {
    let bytes = public_key.as_bytes();
    if bytes.len() < IDENTITY_KEY_PREFIX {
        return Err(CryptoError::InvalidPublicKey);
    }
    Ok(SignerIdentity(format!(
        "{}{}",
        DID_NAMESPACE,
        hex::encode(&bytes[..IDENTITY_KEY_PREFIX])
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::SchemeId;

    #[test]
    fn test_stable() {
        let key = PublicKey::new(SchemeId::Ed25519, (0u8..32).collect());
        let a = derive_identity(&key).unwrap();
        let b = derive_identity(&key).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "did:inkless:000102030405060708090a0b0c0d0e0f");
        assert!(a.is_native());
    }

    #[test]
    fn test_different_keys_differ() {
        let a = derive_identity(&PublicKey::new(SchemeId::Ed25519, vec![1u8; 32])).unwrap();
        let b = derive_identity(&PublicKey::new(SchemeId::Ed25519, vec![2u8; 32])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_key_is_malformed() {
        let key = PublicKey::new(SchemeId::Ed25519, vec![1u8; 8]);
        assert_eq!(derive_identity(&key), Err(CryptoError::InvalidPublicKey));
    }

    #[test]
    fn test_parse() {
        assert!(SignerIdentity::parse("did:x:1").is_ok());
        assert!(!SignerIdentity::parse("did:x:1").unwrap().is_native());
        assert!(SignerIdentity::parse("did:x:").is_err());
        assert!(SignerIdentity::parse("alice@example.com").is_err());
    }
}
