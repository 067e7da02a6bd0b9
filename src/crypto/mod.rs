//! Cryptographic primitives
//!
//! - `fingerprint`: SHA3-256 / SHA-256 / BLAKE3 document fingerprints
//! - `keys`: scheme-tagged public keys, secret keys and signatures
//! - `provider`: the signature scheme capability and provider negotiation
//! - `classical`: Ed25519 backend
//! - `post_quantum`: ML-DSA-65 backend (cargo feature `pq`)
//! - `did`: signer identity derivation

pub mod classical;
pub mod did;
pub mod error;
pub mod fingerprint;
pub mod keys;
#[cfg(feature = "pq")]
pub mod post_quantum;
pub mod provider;

// Re-export commonly used types
pub use classical::Ed25519Scheme;
pub use did::{derive_identity, SignerIdentity};
pub use error::{CryptoError, CryptoResult};
pub use fingerprint::{Fingerprint, FingerprintAlgorithm, FingerprintEngine, FingerprintError};
pub use keys::{KeyPair, PublicKey, SchemeId, SecretKey, SignatureBytes};
#[cfg(feature = "pq")]
pub use post_quantum::MlDsa65Scheme;
pub use provider::{negotiate, scheme_for, ProviderSelection, SchemePreference, SignatureScheme};

use sha3::{Digest, Sha3_256};

/// SHA3-256 commitment to arbitrary bytes, hex encoded with a `0x` prefix
pub fn commitment(data: &[u8]) -> String {
    format!("0x{}", hex::encode(Sha3_256::digest(data)))
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_fingerprint_sign_verify_flow() {
        let engine = FingerprintEngine::default();
        let fingerprint = engine.fingerprint(b"I, Alice, agree to the terms.");

        let scheme = negotiate(SchemePreference::PreferPostQuantum).scheme().unwrap();
        let pair = scheme.generate().unwrap();
        let signature = scheme.sign(pair.secret_key(), fingerprint.as_bytes()).unwrap();

        // Anyone with the public key can verify
        let verifier = scheme_for(pair.public_key().scheme()).unwrap();
        assert!(verifier
            .verify(pair.public_key(), fingerprint.as_bytes(), &signature)
            .is_ok());

        // A different document does not verify
        let tampered = engine.fingerprint(b"I, Alice, agree to nothing.");
        assert!(verifier
            .verify(pair.public_key(), tampered.as_bytes(), &signature)
            .is_err());
    }

    #[test]
    fn test_identity_follows_key() {
        let scheme = Ed25519Scheme::new();
        let pair = scheme.generate().unwrap();
        let id1 = derive_identity(pair.public_key()).unwrap();
        let id2 = derive_identity(pair.public_key()).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_commitment_shape() {
        let c = commitment(b"signature bytes");
        assert!(c.starts_with("0x"));
        assert_eq!(c.len(), 66);
        assert_eq!(c, commitment(b"signature bytes"));
    }
}
