//! Ed25519 signature backend
//!
//! The classical scheme. Always compiled in, so it is the fallback whenever
//! the post-quantum backend is missing or fails its self-test.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use super::error::{CryptoError, CryptoResult};
use super::keys::{KeyPair, PublicKey, SchemeId, SecretKey, SignatureBytes};
use super::provider::SignatureScheme;

/// Size of a public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a secret key in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of a signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Ed25519 backend
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Scheme;

impl Ed25519Scheme {
    /// Create the backend
    pub fn new() -> Self {
        Ed25519Scheme
    }

    /// Create a key pair from a seed (deterministic generation)
    pub fn from_seed(seed: &[u8; SECRET_KEY_SIZE]) -> KeyPair {
        let signing_key = SigningKey::from_bytes(seed);
        Self::pair_from_signing_key(&signing_key)
    }

    fn pair_from_signing_key(signing_key: &SigningKey) -> KeyPair {
        let public = PublicKey::new(SchemeId::Ed25519, signing_key.verifying_key().to_bytes().to_vec());
        let secret = SecretKey::new(SchemeId::Ed25519, signing_key.to_bytes().to_vec());
        KeyPair::from_backend(public, secret)
    }

    fn signing_key(secret: &SecretKey) -> CryptoResult<SigningKey> {
        if secret.scheme() != SchemeId::Ed25519 {
            return Err(CryptoError::SchemeMismatch {
                expected: SchemeId::Ed25519.to_string(),
                actual: secret.scheme().to_string(),
            });
        }
        let bytes: [u8; SECRET_KEY_SIZE] = secret.expose().try_into().map_err(|_| {
            CryptoError::InvalidKeyLength {
                expected: SECRET_KEY_SIZE,
                actual: secret.expose().len(),
            }
        })?;
        Ok(SigningKey::from_bytes(&bytes))
    }
}

impl SignatureScheme for Ed25519Scheme {
    fn scheme(&self) -> SchemeId {
        SchemeId::Ed25519
    }

    fn generate(&self) -> CryptoResult<KeyPair> {
        let mut seed = [0u8; SECRET_KEY_SIZE];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|_| CryptoError::RngError)?;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self::pair_from_signing_key(&signing_key))
    }

    fn sign(&self, secret: &SecretKey, message: &[u8]) -> CryptoResult<SignatureBytes> {
        let signing_key = Self::signing_key(secret)?;
        let signature = signing_key.sign(message);
        Ok(SignatureBytes(signature.to_bytes().to_vec()))
    }

    fn verify(&self, public: &PublicKey, message: &[u8], signature: &SignatureBytes) -> CryptoResult<()> {
        if public.scheme() != SchemeId::Ed25519 {
            return Err(CryptoError::SchemeMismatch {
                expected: SchemeId::Ed25519.to_string(),
                actual: public.scheme().to_string(),
            });
        }
        let key_bytes: [u8; PUBLIC_KEY_SIZE] =
            public.as_bytes().try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: public.as_bytes().len(),
            })?;
        let verifying_key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig_bytes: [u8; SIGNATURE_SIZE] =
            signature.as_bytes().try_into().map_err(|_| CryptoError::InvalidSignatureLength {
                expected: SIGNATURE_SIZE,
                actual: signature.len(),
            })?;
        let sig = Signature::from_bytes(&sig_bytes);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    fn check_key_pair(&self, pair: &KeyPair) -> CryptoResult<()> {
        let signing_key = Self::signing_key(pair.secret_key())?;
        if signing_key.verifying_key().to_bytes().as_slice() != pair.public_key().as_bytes() {
            return Err(CryptoError::InvalidSecretKey);
        }
        Ok(())
    }
}
