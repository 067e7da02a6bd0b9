//! Signature scheme capability and provider negotiation
//!
//! Callers never branch on which scheme is in use. A session negotiates a
//! provider once, then hands the selected [`SignatureScheme`] to the
//! signing engine. Negotiation prefers the post-quantum backend, probes it
//! with a self-test, and falls back to Ed25519 when it is missing or broken.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::classical::Ed25519Scheme;
use super::error::{CryptoError, CryptoResult};
use super::keys::{KeyPair, PublicKey, SchemeId, SecretKey, SignatureBytes};

/// A signature scheme backend
pub trait SignatureScheme: Send + Sync {
    /// Which scheme this backend implements
    fn scheme(&self) -> SchemeId;

    /// Generate a fresh key pair from the OS random source
    fn generate(&self) -> CryptoResult<KeyPair>;

    /// Sign a message
    fn sign(&self, secret: &SecretKey, message: &[u8]) -> CryptoResult<SignatureBytes>;

    /// Verify a signature; `Ok(())` only if it is valid for `public`
    fn verify(&self, public: &PublicKey, message: &[u8], signature: &SignatureBytes) -> CryptoResult<()>;

    /// Confirm that both halves of an imported pair belong together
    fn check_key_pair(&self, pair: &KeyPair) -> CryptoResult<()>;
}

/// Which schemes a session is willing to use
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemePreference {
    /// Post-quantum if available, otherwise Ed25519
    #[default]
    PreferPostQuantum,
    /// Post-quantum or nothing
    RequirePostQuantum,
    /// Ed25519 only
    ClassicalOnly,
}

impl std::str::FromStr for SchemePreference {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prefer-pq" | "prefer_post_quantum" => Ok(SchemePreference::PreferPostQuantum),
            "require-pq" | "require_post_quantum" => Ok(SchemePreference::RequirePostQuantum),
            "classical" | "classical_only" => Ok(SchemePreference::ClassicalOnly),
            other => Err(CryptoError::MalformedEncoding(format!(
                "unknown scheme preference: {}",
                other
            ))),
        }
    }
}

/// Outcome of provider negotiation
#[derive(Clone)]
pub enum ProviderSelection {
    /// The post-quantum backend passed its self-test
    PostQuantum(Arc<dyn SignatureScheme>),
    /// The classical backend is in use
    Classical(Arc<dyn SignatureScheme>),
    /// No acceptable backend could be loaded
    Unavailable {
        /// Why negotiation failed
        reason: String,
    },
}

impl ProviderSelection {
    /// The selected scheme, or the reason there is none
    pub fn scheme(&self) -> CryptoResult<Arc<dyn SignatureScheme>> {
        match self {
            ProviderSelection::PostQuantum(s) | ProviderSelection::Classical(s) => Ok(s.clone()),
            ProviderSelection::Unavailable { reason } => {
                Err(CryptoError::BackendUnavailable(reason.clone()))
            }
        }
    }

    /// Whether a backend was selected
    pub fn is_available(&self) -> bool {
        !matches!(self, ProviderSelection::Unavailable { .. })
    }
}

impl fmt::Debug for ProviderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderSelection::PostQuantum(s) => write!(f, "PostQuantum({})", s.scheme()),
            ProviderSelection::Classical(s) => write!(f, "Classical({})", s.scheme()),
            ProviderSelection::Unavailable { reason } => write!(f, "Unavailable({})", reason),
        }
    }
}

/// Generate, sign and verify once to make sure a backend actually works
pub fn self_test(scheme: &dyn SignatureScheme) -> CryptoResult<()> {
    let pair = scheme.generate()?;
    let probe = b"inkless/self-test";
    let signature = scheme.sign(pair.secret_key(), probe)?;
    scheme.verify(pair.public_key(), probe, &signature)
}

#[cfg(feature = "pq")]
fn load_post_quantum() -> CryptoResult<Arc<dyn SignatureScheme>> {
    let scheme = super::post_quantum::MlDsa65Scheme::new();
    self_test(&scheme)?;
    Ok(Arc::new(scheme))
}

#[cfg(not(feature = "pq"))]
fn load_post_quantum() -> CryptoResult<Arc<dyn SignatureScheme>> {
    Err(CryptoError::BackendUnavailable(
        "built without the `pq` feature".to_string(),
    ))
}

fn load_classical() -> CryptoResult<Arc<dyn SignatureScheme>> {
    let scheme = Ed25519Scheme::new();
    self_test(&scheme)?;
    Ok(Arc::new(scheme))
}

/// Select a provider for one session
pub fn negotiate(preference: SchemePreference) -> ProviderSelection {
    negotiate_with(preference, load_post_quantum, load_classical)
}

fn negotiate_with<P, C>(preference: SchemePreference, post_quantum: P, classical: C) -> ProviderSelection
where
    P: FnOnce() -> CryptoResult<Arc<dyn SignatureScheme>>,
    C: FnOnce() -> CryptoResult<Arc<dyn SignatureScheme>>,
{
    if preference != SchemePreference::ClassicalOnly {
        match post_quantum() {
            Ok(scheme) => {
                debug!(scheme = %scheme.scheme(), "post-quantum provider selected");
                return ProviderSelection::PostQuantum(scheme);
            }
            Err(e) if preference == SchemePreference::RequirePostQuantum => {
                warn!(error = %e, "post-quantum provider required but unavailable");
                return ProviderSelection::Unavailable {
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                warn!(error = %e, "post-quantum provider unavailable, using classical fallback");
            }
        }
    }

    match classical() {
        Ok(scheme) => {
            debug!(scheme = %scheme.scheme(), "classical provider selected");
            ProviderSelection::Classical(scheme)
        }
        Err(e) => {
            warn!(error = %e, "classical provider failed its self-test");
            ProviderSelection::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}

/// Resolve a verifier for keys of a known scheme
///
/// Returns `None` for schemes not compiled into this build.
pub fn scheme_for(id: SchemeId) -> Option<Arc<dyn SignatureScheme>> {
    match id {
        SchemeId::Ed25519 => Some(Arc::new(Ed25519Scheme::new())),
        #[cfg(feature = "pq")]
        SchemeId::MlDsa65 => Some(Arc::new(super::post_quantum::MlDsa65Scheme::new())),
        #[cfg(not(feature = "pq"))]
        SchemeId::MlDsa65 => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken() -> CryptoResult<Arc<dyn SignatureScheme>> {
        Err(CryptoError::BackendUnavailable("module failed to load".to_string()))
    }

    fn working() -> CryptoResult<Arc<dyn SignatureScheme>> {
        Ok(Arc::new(Ed25519Scheme::new()))
    }

    #[test]
    fn test_fallback_to_classical() {
        let selection = negotiate_with(SchemePreference::PreferPostQuantum, broken, working);
        assert!(matches!(selection, ProviderSelection::Classical(_)));
        assert_eq!(selection.scheme().unwrap().scheme(), SchemeId::Ed25519);
    }

    #[test]
    fn test_required_post_quantum_unavailable() {
        let selection = negotiate_with(SchemePreference::RequirePostQuantum, broken, working);
        assert!(!selection.is_available());
        assert!(matches!(
            selection.scheme(),
            Err(CryptoError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_classical_only_skips_post_quantum() {
        let selection = negotiate_with(
            SchemePreference::ClassicalOnly,
            || -> CryptoResult<Arc<dyn SignatureScheme>> {
                panic!("post-quantum backend must not be probed")
            },
            working,
        );
        assert!(matches!(selection, ProviderSelection::Classical(_)));
    }

    #[test]
    fn test_nothing_available() {
        let selection = negotiate_with(SchemePreference::PreferPostQuantum, broken, broken);
        assert!(matches!(selection, ProviderSelection::Unavailable { .. }));
    }

    #[test]
    fn test_real_negotiation_always_yields_a_scheme() {
        let selection = negotiate(SchemePreference::PreferPostQuantum);
        let scheme = selection.scheme().unwrap();
        assert_eq!(scheme.scheme().is_post_quantum(), cfg!(feature = "pq"));
    }

    #[test]
    fn test_scheme_for_classical() {
        assert!(scheme_for(SchemeId::Ed25519).is_some());
        assert_eq!(scheme_for(SchemeId::MlDsa65).is_some(), cfg!(feature = "pq"));
    }

    #[test]
    fn test_preference_from_str() {
        assert_eq!(
            "classical".parse::<SchemePreference>().unwrap(),
            SchemePreference::ClassicalOnly
        );
        assert!("quantum-ish".parse::<SchemePreference>().is_err());
    }
}
