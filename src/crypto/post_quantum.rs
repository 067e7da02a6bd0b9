//! ML-DSA-65 signature backend (FIPS 204)
//!
//! Compiled in with the `pq` cargo feature. Uses the `fips204` crate, a pure
//! Rust implementation of the Module-Lattice-Based Digital Signature
//! Standard. ML-DSA-65 targets NIST security category 3.
//!
//! # Key Sizes (per FIPS 204)
//!
//! - Public key: 1,952 bytes
//! - Secret key: 4,032 bytes
//! - Signature: 3,309 bytes
//!
//! This backend never logs secret key material.

use fips204::ml_dsa_65;
use fips204::traits::{KeyGen, SerDes, Signer, Verifier};

use super::error::{CryptoError, CryptoResult};
use super::keys::{KeyPair, PublicKey, SchemeId, SecretKey, SignatureBytes};
use super::provider::SignatureScheme;

/// ML-DSA-65 public key size in bytes
pub const PUBLIC_KEY_SIZE: usize = ml_dsa_65::PK_LEN;

/// ML-DSA-65 secret key size in bytes
pub const SECRET_KEY_SIZE: usize = ml_dsa_65::SK_LEN;

/// ML-DSA-65 signature size in bytes
pub const SIGNATURE_SIZE: usize = ml_dsa_65::SIG_LEN;

/// FIPS 204 context string bound into every signature
const CONTEXT: &[u8] = b"inkless";

/// ML-DSA-65 backend
#[derive(Clone, Copy, Debug, Default)]
pub struct MlDsa65Scheme;

impl MlDsa65Scheme {
    /// Create the backend
    pub fn new() -> Self {
        MlDsa65Scheme
    }

    fn private_key(secret: &SecretKey) -> CryptoResult<ml_dsa_65::PrivateKey> {
        if secret.scheme() != SchemeId::MlDsa65 {
            return Err(CryptoError::SchemeMismatch {
                expected: SchemeId::MlDsa65.to_string(),
                actual: secret.scheme().to_string(),
            });
        }
        let bytes: [u8; SECRET_KEY_SIZE] =
            secret.expose().try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: SECRET_KEY_SIZE,
                actual: secret.expose().len(),
            })?;
        ml_dsa_65::PrivateKey::try_from_bytes(bytes).map_err(|_| CryptoError::InvalidSecretKey)
    }

    fn public_key(public: &PublicKey) -> CryptoResult<ml_dsa_65::PublicKey> {
        if public.scheme() != SchemeId::MlDsa65 {
            return Err(CryptoError::SchemeMismatch {
                expected: SchemeId::MlDsa65.to_string(),
                actual: public.scheme().to_string(),
            });
        }
        let bytes: [u8; PUBLIC_KEY_SIZE] =
            public.as_bytes().try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: public.as_bytes().len(),
            })?;
        ml_dsa_65::PublicKey::try_from_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)
    }
}

impl SignatureScheme for MlDsa65Scheme {
    fn scheme(&self) -> SchemeId {
        SchemeId::MlDsa65
    }

    fn generate(&self) -> CryptoResult<KeyPair> {
        let (pk, sk) = ml_dsa_65::KG::try_keygen().map_err(|_| CryptoError::RngError)?;
        let public = PublicKey::new(SchemeId::MlDsa65, pk.into_bytes().to_vec());
        let secret = SecretKey::new(SchemeId::MlDsa65, sk.into_bytes().to_vec());
        Ok(KeyPair::from_backend(public, secret))
    }

    fn sign(&self, secret: &SecretKey, message: &[u8]) -> CryptoResult<SignatureBytes> {
        let sk = Self::private_key(secret)?;
        let signature = sk
            .try_sign(message, CONTEXT)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        Ok(SignatureBytes(signature.to_vec()))
    }

    fn verify(&self, public: &PublicKey, message: &[u8], signature: &SignatureBytes) -> CryptoResult<()> {
        let pk = Self::public_key(public)?;
        let sig: [u8; SIGNATURE_SIZE] =
            signature.as_bytes().try_into().map_err(|_| CryptoError::InvalidSignatureLength {
                expected: SIGNATURE_SIZE,
                actual: signature.len(),
            })?;
        if pk.verify(message, &sig, CONTEXT) {
            Ok(())
        } else {
            Err(CryptoError::SignatureVerificationFailed)
        }
    }

    fn check_key_pair(&self, pair: &KeyPair) -> CryptoResult<()> {
        // FIPS 204 secret keys do not embed the full public key, so check by
        // signing a probe.
        let probe = b"inkless/key-pair-check";
        let signature = self.sign(pair.secret_key(), probe)?;
        self.verify(pair.public_key(), probe, &signature)
            .map_err(|_| CryptoError::InvalidSecretKey)
    }
}
