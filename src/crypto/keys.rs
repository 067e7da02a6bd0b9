//! Key material shared by every signature scheme
//!
//! Keys and signatures carry their scheme tag so that a verifier can pick
//! the right backend without any out-of-band knowledge.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::error::{CryptoError, CryptoResult};

/// Identifies a signature scheme
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemeId {
    /// Ed25519 (classical)
    Ed25519,
    /// ML-DSA-65, FIPS 204 (post-quantum)
    MlDsa65,
}

impl SchemeId {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeId::Ed25519 => "ed25519",
            SchemeId::MlDsa65 => "ml-dsa-65",
        }
    }

    /// Whether this scheme resists quantum adversaries
    pub fn is_post_quantum(&self) -> bool {
        matches!(self, SchemeId::MlDsa65)
    }

    fn tag(&self) -> u8 {
        match self {
            SchemeId::Ed25519 => 0x01,
            SchemeId::MlDsa65 => 0x02,
        }
    }

    fn from_tag(tag: u8) -> CryptoResult<Self> {
        match tag {
            0x01 => Ok(SchemeId::Ed25519),
            0x02 => Ok(SchemeId::MlDsa65),
            other => Err(CryptoError::MalformedEncoding(format!(
                "unknown scheme tag {:#x}",
                other
            ))),
        }
    }
}

impl fmt::Display for SchemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A public verification key
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    scheme: SchemeId,
    #[serde(with = "hex_bytes")]
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Wrap raw key bytes for a scheme
    pub fn new(scheme: SchemeId, bytes: Vec<u8>) -> Self {
        PublicKey { scheme, bytes }
    }

    /// Scheme this key belongs to
    pub fn scheme(&self) -> SchemeId {
        self.scheme
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert to hex string for display
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Tagged encoding: `scheme:hex`
    pub fn to_tagged(&self) -> String {
        format!("{}:{}", self.scheme.as_str(), self.to_hex())
    }

    /// Parse the tagged encoding produced by [`PublicKey::to_tagged`]
    pub fn from_tagged(s: &str) -> CryptoResult<Self> {
        let (scheme, hex_part) = s.split_once(':').ok_or(CryptoError::InvalidPublicKey)?;
        let scheme = match scheme {
            "ed25519" => SchemeId::Ed25519,
            "ml-dsa-65" => SchemeId::MlDsa65,
            _ => return Err(CryptoError::InvalidPublicKey),
        };
        let bytes = hex::decode(hex_part).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(PublicKey { scheme, bytes })
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "PublicKey({}, {}...)", self.scheme, &hex[..hex.len().min(16)])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tagged())
    }
}

/// A signature produced by a key pair
///
/// Serialized as base64 in JSON.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureBytes(pub Vec<u8>);

impl SignatureBytes {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        SignatureBytes(bytes.to_vec())
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no signature bytes are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Base64 (standard alphabet)
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    /// Parse base64 (standard alphabet)
    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        BASE64
            .decode(s.trim())
            .map(SignatureBytes)
            .map_err(|e| CryptoError::MalformedEncoding(format!("signature: {}", e)))
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Signature({}...)", &hex[..hex.len().min(16)])
    }
}

/// Secret signing key material, zeroized on drop
pub struct SecretKey {
    scheme: SchemeId,
    bytes: Zeroizing<Vec<u8>>,
}

impl SecretKey {
    /// Wrap raw secret bytes for a scheme
    pub fn new(scheme: SchemeId, bytes: Vec<u8>) -> Self {
        SecretKey {
            scheme,
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Scheme this key belongs to
    pub fn scheme(&self) -> SchemeId {
        self.scheme
    }

    /// Get the secret key bytes
    ///
    /// # Security Warning
    /// Handle with extreme care! The secret key should never be logged,
    /// stored unencrypted, or transmitted over a network.
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey({}, <redacted>)", self.scheme)
    }
}

/// A signing key pair
///
/// The secret half is zeroized when the pair is dropped.
#[derive(Debug)]
pub struct KeyPair {
    public_key: PublicKey,
    secret_key: SecretKey,
}

impl KeyPair {
    /// Assemble a key pair. Both halves must belong to the same scheme.
    pub fn from_parts(public_key: PublicKey, secret_key: SecretKey) -> CryptoResult<Self> {
        if public_key.scheme() != secret_key.scheme() {
            return Err(CryptoError::SchemeMismatch {
                expected: public_key.scheme().to_string(),
                actual: secret_key.scheme().to_string(),
            });
        }
        Ok(KeyPair {
            public_key,
            secret_key,
        })
    }

    /// Assemble halves a backend has just produced together
    pub(crate) fn from_backend(public_key: PublicKey, secret_key: SecretKey) -> Self {
        debug_assert_eq!(public_key.scheme(), secret_key.scheme());
        KeyPair {
            public_key,
            secret_key,
        }
    }

    /// Scheme of this pair
    pub fn scheme(&self) -> SchemeId {
        self.public_key.scheme()
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Export the key pair to bytes (for an explicit, caller-chosen backup)
    ///
    /// Layout: scheme tag (1) || secret length (u32 LE) || secret || public.
    /// WARNING: This exposes the secret key. Handle with extreme care.
    pub fn export_bytes(&self) -> Zeroizing<Vec<u8>> {
        let secret = self.secret_key.expose();
        let public = self.public_key.as_bytes();
        let mut bytes = Vec::with_capacity(1 + 4 + secret.len() + public.len());
        bytes.push(self.scheme().tag());
        bytes.extend_from_slice(&(secret.len() as u32).to_le_bytes());
        bytes.extend_from_slice(secret);
        bytes.extend_from_slice(public);
        Zeroizing::new(bytes)
    }

    /// Import bytes produced by [`KeyPair::export_bytes`]
    ///
    /// Only the layout is checked here; use
    /// [`SignatureScheme::check_key_pair`](super::provider::SignatureScheme::check_key_pair)
    /// to confirm the halves belong together.
    pub fn import_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < 5 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 5,
                actual: bytes.len(),
            });
        }
        let scheme = SchemeId::from_tag(bytes[0])?;
        let secret_len = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        let rest = &bytes[5..];
        if rest.len() <= secret_len {
            return Err(CryptoError::InvalidSecretKey);
        }
        let secret = SecretKey::new(scheme, rest[..secret_len].to_vec());
        let public = PublicKey::new(scheme, rest[secret_len..].to_vec());
        KeyPair::from_parts(public, secret)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
