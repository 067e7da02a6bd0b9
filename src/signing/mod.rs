//! Signature production over document fingerprints
//!
//! [`SignatureEngine`] wraps whichever [`SignatureScheme`] the session
//! negotiated. Callers hand it a fingerprint and a key pair and get back
//! signature bytes; they never see which backend produced them.
//!
//! The signed message is domain separated:
//!
//! ```text
//! "inkless/fingerprint/v1" || fingerprint bytes
//! ```
//!
//! so a signature over a fingerprint cannot be presented as a signature
//! over any other protocol message.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::{
    derive_identity, scheme_for, CryptoError, Fingerprint, KeyPair, ProviderSelection, PublicKey,
    SchemeId, SignatureBytes, SignatureScheme, SignerIdentity,
};
use crate::error::{InklessError, Result};

pub mod offline;
pub mod session;
pub mod workflow;

pub use offline::{OfflineQueue, QueuedSignature, SyncReport};
pub use session::SigningSession;
pub use workflow::{DocumentSource, SelectedDocument, SignedOutcome, SigningState, SigningWorkflow, WorkflowEvent};

/// Domain separation prefix for fingerprint signatures
pub const SIGNING_DOMAIN: &[u8] = b"inkless/fingerprint/v1";

/// The exact bytes that get signed for a fingerprint
pub fn signing_message(fingerprint: &Fingerprint) -> Vec<u8> {
    let mut message = Vec::with_capacity(SIGNING_DOMAIN.len() + fingerprint.as_bytes().len());
    message.extend_from_slice(SIGNING_DOMAIN);
    message.extend_from_slice(fingerprint.as_bytes());
    message
}

/// Verify a fingerprint signature with whatever scheme the key declares
///
/// Returns `false` for keys of a scheme this build cannot verify.
pub fn verify_detached(fingerprint: &Fingerprint, signature: &SignatureBytes, public_key: &PublicKey) -> bool {
    match scheme_for(public_key.scheme()) {
        Some(scheme) => scheme
            .verify(public_key, &signing_message(fingerprint), signature)
            .is_ok(),
        None => false,
    }
}

/// One produced signature, immutable once created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    /// What was signed
    pub fingerprint: Fingerprint,
    /// Signature bytes
    pub signature: SignatureBytes,
    /// Identity derived from `public_key`
    pub signer_identity: SignerIdentity,
    /// Key that verifies `signature`
    pub public_key: PublicKey,
    /// Scheme used
    pub scheme: SchemeId,
    /// When the signature was produced
    pub created_at: DateTime<Utc>,
}

impl SignatureRecord {
    /// Re-check the signature against the embedded public key
    pub fn verify(&self) -> bool {
        verify_detached(&self.fingerprint, &self.signature, &self.public_key)
    }
}

/// Signs fingerprints with a negotiated scheme
#[derive(Clone)]
pub struct SignatureEngine {
    scheme: Arc<dyn SignatureScheme>,
}

impl SignatureEngine {
    /// Engine backed by a specific scheme
    pub fn new(scheme: Arc<dyn SignatureScheme>) -> Self {
        SignatureEngine { scheme }
    }

    /// Engine backed by the outcome of provider negotiation
    pub fn from_selection(selection: &ProviderSelection) -> Result<Self> {
        let scheme = selection.scheme().map_err(InklessError::KeyGeneration)?;
        Ok(SignatureEngine::new(scheme))
    }

    /// Scheme in use
    pub fn scheme_id(&self) -> SchemeId {
        self.scheme.scheme()
    }

    /// Generate a key pair for this engine's scheme
    pub fn generate(&self) -> Result<KeyPair> {
        self.scheme.generate().map_err(InklessError::KeyGeneration)
    }

    /// Sign a fingerprint
    pub fn sign(&self, fingerprint: &Fingerprint, key_pair: &KeyPair) -> Result<SignatureBytes> {
        if key_pair.scheme() != self.scheme_id() {
            return Err(InklessError::Signing(CryptoError::SchemeMismatch {
                expected: self.scheme_id().to_string(),
                actual: key_pair.scheme().to_string(),
            }));
        }
        let signature = self
            .scheme
            .sign(key_pair.secret_key(), &signing_message(fingerprint))
            .map_err(InklessError::Signing)?;
        debug!(fingerprint = %fingerprint.short(), scheme = %self.scheme_id(), "fingerprint signed");
        Ok(signature)
    }

    /// Sign a fingerprint and wrap the result with the signer's identity
    pub fn sign_record(&self, fingerprint: &Fingerprint, key_pair: &KeyPair) -> Result<SignatureRecord> {
        let signature = self.sign(fingerprint, key_pair)?;
        let signer_identity = derive_identity(key_pair.public_key()).map_err(InklessError::Signing)?;
        Ok(SignatureRecord {
            fingerprint: fingerprint.clone(),
            signature,
            signer_identity,
            public_key: key_pair.public_key().clone(),
            scheme: self.scheme_id(),
            created_at: Utc::now(),
        })
    }

    /// Check a signature; `false` on any mismatch or malformed input
    pub fn verify(&self, fingerprint: &Fingerprint, signature: &SignatureBytes, public_key: &PublicKey) -> bool {
        if public_key.scheme() != self.scheme_id() {
            return false;
        }
        self.scheme
            .verify(public_key, &signing_message(fingerprint), signature)
            .is_ok()
    }
}

impl std::fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureEngine")
            .field("scheme", &self.scheme_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519Scheme, FingerprintEngine};

    fn engine() -> SignatureEngine {
        SignatureEngine::new(Arc::new(Ed25519Scheme::new()))
    }

    #[test]
    fn test_sign_verify() {
        let engine = engine();
        let pair = engine.generate().unwrap();
        let fp = FingerprintEngine::default().fingerprint(b"lease agreement");

        let sig = engine.sign(&fp, &pair).unwrap();
        assert!(engine.verify(&fp, &sig, pair.public_key()));
        assert!(verify_detached(&fp, &sig, pair.public_key()));
    }

    #[test]
    fn test_wrong_key_or_fingerprint_fails() {
        let engine = engine();
        let alice = engine.generate().unwrap();
        let bob = engine.generate().unwrap();
        let fp = FingerprintEngine::default().fingerprint(b"contract");
        let other = FingerprintEngine::default().fingerprint(b"other contract");

        let sig = engine.sign(&fp, &alice).unwrap();
        assert!(!engine.verify(&fp, &sig, bob.public_key()));
        assert!(!engine.verify(&other, &sig, alice.public_key()));
    }

    #[test]
    fn test_signature_is_domain_separated() {
        let pair = Ed25519Scheme::from_seed(&[3u8; 32]);
        let fp = Fingerprint::from_hex("abc123").unwrap();
        let sig = engine().sign(&fp, &pair).unwrap();

        // A raw signature over the fingerprint bytes alone must not verify
        let raw = Ed25519Scheme::new()
            .sign(pair.secret_key(), fp.as_bytes())
            .unwrap();
        assert_ne!(sig, raw);
        assert!(!engine().verify(&fp, &raw, pair.public_key()));
    }

    #[test]
    fn test_record_carries_identity() {
        let engine = engine();
        let pair = engine.generate().unwrap();
        let fp = Fingerprint::from_hex("abc123").unwrap();
        let record = engine.sign_record(&fp, &pair).unwrap();

        assert_eq!(record.signer_identity, derive_identity(pair.public_key()).unwrap());
        assert_eq!(record.scheme, SchemeId::Ed25519);
        assert!(record.verify());
    }

    #[test]
    fn test_unavailable_selection_is_key_generation_error() {
        let selection = ProviderSelection::Unavailable {
            reason: "no backend".into(),
        };
        assert!(matches!(
            SignatureEngine::from_selection(&selection),
            Err(InklessError::KeyGeneration(_))
        ));
    }

    #[cfg(feature = "pq")]
    #[test]
    fn test_scheme_mismatch_is_signing_error() {
        let classical = engine();
        let pq = SignatureEngine::new(Arc::new(crate::crypto::MlDsa65Scheme::new()));
        let pair = pq.generate().unwrap();
        let fp = Fingerprint::from_hex("abcd").unwrap();
        assert!(matches!(
            classical.sign(&fp, &pair),
            Err(InklessError::Signing(CryptoError::SchemeMismatch { .. }))
        ));
    }
}
