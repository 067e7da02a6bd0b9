//! Document fingerprinting
//!
//! Computes a fixed-width digest of document bytes. The engine is a pure
//! function of its input: it never caches, never compares against a
//! previously computed value, and never touches the network.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Sha3_256};
use thiserror::Error;

use super::error::{CryptoError, CryptoResult};

/// Size of a fingerprint digest in bytes
pub const FINGERPRINT_SIZE: usize = 32;

const READ_CHUNK: usize = 64 * 1024;

/// Digest algorithm used to fingerprint documents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintAlgorithm {
    /// SHA3-256
    #[default]
    Sha3_256,
    /// SHA-256 (what browsers can compute without extra code)
    Sha256,
    /// BLAKE3
    Blake3,
}

impl FingerprintAlgorithm {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            FingerprintAlgorithm::Sha3_256 => "sha3-256",
            FingerprintAlgorithm::Sha256 => "sha256",
            FingerprintAlgorithm::Blake3 => "blake3",
        }
    }
}

impl std::str::FromStr for FingerprintAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha3-256" | "sha3_256" | "sha3" => Ok(FingerprintAlgorithm::Sha3_256),
            "sha256" | "sha-256" => Ok(FingerprintAlgorithm::Sha256),
            "blake3" => Ok(FingerprintAlgorithm::Blake3),
            other => Err(CryptoError::MalformedEncoding(format!(
                "unknown fingerprint algorithm: {}",
                other
            ))),
        }
    }
}

/// Reading the document failed; no digest was produced
#[derive(Error, Debug, Clone)]
#[error("Unable to read document: {source}")]
pub struct FingerprintError {
    source: Arc<io::Error>,
}

impl FingerprintError {
    /// Kind of the underlying I/O failure
    pub fn io_kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

impl From<io::Error> for FingerprintError {
    fn from(source: io::Error) -> Self {
        FingerprintError {
            source: Arc::new(source),
        }
    }
}

/// Content fingerprint of a document, hex encoded on the wire
///
/// Fingerprints produced by [`FingerprintEngine`] are always
/// [`FINGERPRINT_SIZE`] bytes. Fingerprints parsed from external input keep
/// whatever (non-empty) length they arrived with, since registries are keyed
/// by the string a client supplied.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.is_empty() {
            return Err(CryptoError::MalformedEncoding(
                "empty fingerprint".to_string(),
            ));
        }
        Ok(Fingerprint(bytes.to_vec()))
    }

    /// Parse a hex fingerprint, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| CryptoError::MalformedEncoding(format!("fingerprint: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex, no prefix
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Short form for display and file names
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        hex.chars().take(8).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental hasher over the selected algorithm
enum Hasher {
    Sha3(Sha3_256),
    Sha2(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: FingerprintAlgorithm) -> Self {
        match algorithm {
            FingerprintAlgorithm::Sha3_256 => Hasher::Sha3(Sha3_256::new()),
            FingerprintAlgorithm::Sha256 => Hasher::Sha2(Sha256::new()),
            FingerprintAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha3(h) => Digest::update(h, data),
            Hasher::Sha2(h) => Digest::update(h, data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> [u8; FINGERPRINT_SIZE] {
        match self {
            Hasher::Sha3(h) => h.finalize().into(),
            Hasher::Sha2(h) => h.finalize().into(),
            Hasher::Blake3(h) => (*h.finalize().as_bytes()),
        }
    }
}

/// Computes document fingerprints
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FingerprintEngine {
    algorithm: FingerprintAlgorithm,
}

impl FingerprintEngine {
    /// Create an engine for the given algorithm
    pub fn new(algorithm: FingerprintAlgorithm) -> Self {
        FingerprintEngine { algorithm }
    }

    /// Algorithm in use
    pub fn algorithm(&self) -> FingerprintAlgorithm {
        self.algorithm
    }

    /// Fingerprint an in-memory byte sequence (any length, including empty)
    pub fn fingerprint(&self, data: &[u8]) -> Fingerprint {
        let mut hasher = Hasher::new(self.algorithm);
        hasher.update(data);
        Fingerprint(hasher.finalize().to_vec())
    }

    /// Fingerprint a stream
    ///
    /// A read error aborts the whole operation; interrupted reads are retried
    /// as `Read::read` requires.
    pub fn fingerprint_reader<R: Read>(&self, reader: &mut R) -> Result<Fingerprint, FingerprintError> {
        let mut hasher = Hasher::new(self.algorithm);
        let mut buffer = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buffer[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Fingerprint(hasher.finalize().to_vec()))
    }

    /// Fingerprint a file on disk
    pub fn fingerprint_file<P: AsRef<Path>>(&self, path: P) -> Result<Fingerprint, FingerprintError> {
        let mut file = File::open(path)?;
        self.fingerprint_reader(&mut file)
    }

    /// Recompute the fingerprint of `data` and compare it to `expected`
    pub fn matches(&self, data: &[u8], expected: &Fingerprint) -> bool {
        let computed = self.fingerprint(data);
        constant_time_eq(computed.as_bytes(), expected.as_bytes())
    }
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
