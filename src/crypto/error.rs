//! Errors from key handling and signature backends

use thiserror::Error;

/// Failures inside the signature and key layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material of the wrong size for its scheme
    #[error("Key is {actual} bytes, scheme needs {expected}")]
    InvalidKeyLength {
        /// Size the scheme requires
        expected: usize,
        /// Size that was supplied
        actual: usize,
    },

    /// Signature of the wrong size for its scheme
    #[error("Signature is {actual} bytes, scheme produces {expected}")]
    InvalidSignatureLength {
        /// Size the scheme produces
        expected: usize,
        /// Size that was supplied
        actual: usize,
    },

    /// The signature does not match the fingerprint and key
    #[error("Signature does not verify")]
    SignatureVerificationFailed,

    /// Public key bytes the backend refused
    #[error("Public key rejected by backend")]
    InvalidPublicKey,

    /// Secret key bytes the backend refused, or a pair whose halves disagree
    #[error("Secret key rejected by backend")]
    InvalidSecretKey,

    /// The key belongs to a different signature scheme than the one in use
    #[error("Scheme mismatch: engine uses {expected}, key is {actual}")]
    SchemeMismatch {
        /// Scheme of the engine
        expected: String,
        /// Scheme of the key
        actual: String,
    },

    /// The requested scheme is not compiled in or failed its self-test
    #[error("Signature backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend reported a failure while signing
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The operating system could not supply entropy
    #[error("No entropy available for key generation")]
    RngError,

    /// Hex or identity string could not be parsed
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),
}

/// Result alias for the crypto layer
pub type CryptoResult<T> = Result<T, CryptoError>;
