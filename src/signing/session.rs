//! Key material lifecycle for one signing session
//!
//! A [`SigningSession`] negotiates a provider once, then holds at most one
//! key pair. The secret half lives in zeroizing memory and is wiped when the
//! pair is replaced, when [`SigningSession::end`] is called, or on drop.

use uuid::Uuid;
use zeroize::Zeroizing;

use tracing::{debug, info};

use super::{SignatureEngine, SignatureRecord};
use crate::crypto::{
    derive_identity, negotiate, CryptoError, Fingerprint, KeyPair, ProviderSelection, PublicKey,
    SchemePreference, SignatureScheme, SignerIdentity,
};
use crate::error::{InklessError, Result};

/// Holds the key pair for one signing attempt
pub struct SigningSession {
    id: Uuid,
    selection: ProviderSelection,
    engine: SignatureEngine,
    key_pair: Option<KeyPair>,
}

impl SigningSession {
    /// Negotiate a provider and open a session with no key yet
    pub fn open(preference: SchemePreference) -> Result<Self> {
        let selection = negotiate(preference);
        let engine = SignatureEngine::from_selection(&selection)?;
        let session = SigningSession {
            id: Uuid::new_v4(),
            selection,
            engine,
            key_pair: None,
        };
        info!(session = %session.id, provider = ?session.selection, "signing session opened");
        Ok(session)
    }

    /// Open a session over a caller-supplied scheme
    pub fn with_scheme(scheme: std::sync::Arc<dyn SignatureScheme>) -> Self {
        let selection = if scheme.scheme().is_post_quantum() {
            ProviderSelection::PostQuantum(scheme.clone())
        } else {
            ProviderSelection::Classical(scheme.clone())
        };
        SigningSession {
            id: Uuid::new_v4(),
            selection,
            engine: SignatureEngine::new(scheme),
            key_pair: None,
        }
    }

    /// Open a session around a key pair the caller persisted earlier
    pub fn with_key_pair(scheme: std::sync::Arc<dyn SignatureScheme>, key_pair: KeyPair) -> Result<Self> {
        if key_pair.scheme() != scheme.scheme() {
            return Err(InklessError::Signing(CryptoError::SchemeMismatch {
                expected: scheme.scheme().to_string(),
                actual: key_pair.scheme().to_string(),
            }));
        }
        scheme.check_key_pair(&key_pair).map_err(InklessError::Signing)?;
        let mut session = SigningSession::with_scheme(scheme);
        session.key_pair = Some(key_pair);
        Ok(session)
    }

    /// Session id, for logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// What negotiation selected
    pub fn selection(&self) -> &ProviderSelection {
        &self.selection
    }

    /// The engine bound to this session's scheme
    pub fn engine(&self) -> &SignatureEngine {
        &self.engine
    }

    /// Generate a fresh key pair, replacing (and wiping) any previous one
    pub fn generate_key_pair(&mut self) -> Result<&PublicKey> {
        let pair = self.engine.generate()?;
        debug!(session = %self.id, scheme = %pair.scheme(), "key pair generated");
        let pair = self.key_pair.insert(pair);
        Ok(pair.public_key())
    }

    /// Whether a key pair is loaded
    pub fn has_key(&self) -> bool {
        self.key_pair.is_some()
    }

    /// Current public key
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.key_pair.as_ref().map(KeyPair::public_key)
    }

    /// Identity derived from the current public key
    pub fn identity(&self) -> Result<SignerIdentity> {
        let pair = self.require_key()?;
        derive_identity(pair.public_key()).map_err(InklessError::Signing)
    }

    /// Sign a fingerprint with the session key
    pub fn sign(&self, fingerprint: &Fingerprint) -> Result<SignatureRecord> {
        let pair = self.require_key()?;
        self.engine.sign_record(fingerprint, pair)
    }

    /// Serialize the key pair so the caller can persist it
    ///
    /// This is the only way secret key material leaves the session.
    pub fn export_key_pair(&self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(self.require_key()?.export_bytes())
    }

    /// Wipe the key material and close the session
    pub fn end(mut self) {
        self.key_pair = None;
        debug!(session = %self.id, "signing session ended");
    }

    fn require_key(&self) -> Result<&KeyPair> {
        self.key_pair
            .as_ref()
            .ok_or(InklessError::Signing(CryptoError::InvalidSecretKey))
    }
}

impl std::fmt::Debug for SigningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSession")
            .field("id", &self.id)
            .field("selection", &self.selection)
            .field("public_key", &self.public_key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519Scheme, SchemeId};
    use std::sync::Arc;

    #[test]
    fn test_sign_requires_key() {
        let session = SigningSession::with_scheme(Arc::new(Ed25519Scheme::new()));
        let fp = Fingerprint::from_hex("abc123").unwrap();
        assert!(!session.has_key());
        assert!(matches!(session.sign(&fp), Err(InklessError::Signing(_))));
    }

    #[test]
    fn test_generate_and_sign() {
        let mut session = SigningSession::open(SchemePreference::ClassicalOnly).unwrap();
        let public = session.generate_key_pair().unwrap().clone();
        assert_eq!(public.scheme(), SchemeId::Ed25519);

        let fp = Fingerprint::from_hex("abc123").unwrap();
        let record = session.sign(&fp).unwrap();
        assert_eq!(record.public_key, public);
        assert_eq!(record.signer_identity, session.identity().unwrap());
        assert!(session.engine().verify(&fp, &record.signature, &public));
        session.end();
    }

    #[test]
    fn test_regenerate_replaces_key() {
        let mut session = SigningSession::with_scheme(Arc::new(Ed25519Scheme::new()));
        let first = session.generate_key_pair().unwrap().clone();
        let second = session.generate_key_pair().unwrap().clone();
        assert_ne!(first, second);
        assert_eq!(session.public_key(), Some(&second));
    }

    #[test]
    fn test_export_then_resume() {
        let mut session = SigningSession::with_scheme(Arc::new(Ed25519Scheme::new()));
        session.generate_key_pair().unwrap();
        let identity = session.identity().unwrap();
        let exported = session.export_key_pair().unwrap();

        let pair = KeyPair::import_bytes(&exported).unwrap();
        let resumed = SigningSession::with_key_pair(Arc::new(Ed25519Scheme::new()), pair).unwrap();
        assert_eq!(resumed.identity().unwrap(), identity);
    }

    #[test]
    fn test_debug_hides_secret() {
        let mut session = SigningSession::with_scheme(Arc::new(Ed25519Scheme::new()));
        session.generate_key_pair().unwrap();
        let exported = session.export_key_pair().unwrap();
        let pair = KeyPair::import_bytes(&exported).unwrap();
        let debug = format!("{:?}", session);
        assert!(!debug.contains(&hex::encode(pair.secret_key().expose())));
    }
}
