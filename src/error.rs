//! Top-level error type
//!
//! Every failure in a signing or verification attempt ends up here. None of
//! them are retried inside the library; [`InklessError::is_retryable`] tells
//! the caller whether starting a brand-new attempt could help.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{CryptoError, FingerprintError};
use crate::registry::LedgerError;
use crate::transport::TransportError;

/// Errors surfaced by the signing, anchoring and verification flows
#[derive(Error, Debug, Clone)]
pub enum InklessError {
    /// The document could not be read
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// Entropy or the signature backend was unavailable
    #[error("Key generation failed: {0}")]
    KeyGeneration(CryptoError),

    /// The backend or key material could not produce a signature
    #[error("Signing failed: {0}")]
    Signing(CryptoError),

    /// The relay could not be reached or answered garbage
    #[error("Submission failed: {0}")]
    SubmissionNetwork(#[from] TransportError),

    /// The ledger rejected or did not confirm the write
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// No registry entry exists for the fingerprint
    #[error("No anchor found for fingerprint {fingerprint}")]
    NotFound {
        /// Hex fingerprint that was looked up
        fingerprint: String,
    },

    /// The document category may not be signed electronically
    #[error("Documents of category '{category}' cannot be signed electronically")]
    PolicyExcluded {
        /// Category id
        category: String,
    },

    /// The caller abandoned the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The request was malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The workflow does not accept this event in its current state
    #[error("Cannot handle {event} while {state}")]
    InvalidTransition {
        /// Current state
        state: String,
        /// Rejected event
        event: String,
    },

    /// Bad configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local file storage failed
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// Local JSON state could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(Arc<serde_json::Error>),

    /// A relay-side failure with no local counterpart, kept as reported
    #[error("Relay error ({kind:?}): {message}")]
    Remote {
        /// Category reported by the relay
        kind: ErrorKind,
        /// Relay's description
        message: String,
        /// Relay's retry verdict
        retryable: bool,
    },
}

impl From<std::io::Error> for InklessError {
    fn from(e: std::io::Error) -> Self {
        InklessError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for InklessError {
    fn from(e: serde_json::Error) -> Self {
        InklessError::Serialization(Arc::new(e))
    }
}

/// Result type for the crate
pub type Result<T> = std::result::Result<T, InklessError>;

/// Error category carried over the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Document unreadable
    Fingerprint,
    /// Key generation failed
    KeyGeneration,
    /// Signing failed
    Signing,
    /// Transport failure
    SubmissionNetwork,
    /// Ledger failure
    Ledger,
    /// Unknown fingerprint
    NotFound,
    /// Category excluded by policy
    PolicyExcluded,
    /// Cancelled
    Cancelled,
    /// Malformed request
    InvalidRequest,
    /// Workflow misuse
    InvalidTransition,
    /// Anything else
    Internal,
}

impl InklessError {
    /// Whether a fresh attempt could succeed
    ///
    /// Transport failures and ledger timeouts mean the request itself failed.
    /// Everything else is a definitive answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            InklessError::SubmissionNetwork(_) => true,
            InklessError::Ledger(e) => e.is_retryable(),
            InklessError::Remote { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Wire category for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            InklessError::Fingerprint(_) => ErrorKind::Fingerprint,
            InklessError::KeyGeneration(_) => ErrorKind::KeyGeneration,
            InklessError::Signing(_) => ErrorKind::Signing,
            InklessError::SubmissionNetwork(_) => ErrorKind::SubmissionNetwork,
            InklessError::Ledger(_) => ErrorKind::Ledger,
            InklessError::NotFound { .. } => ErrorKind::NotFound,
            InklessError::PolicyExcluded { .. } => ErrorKind::PolicyExcluded,
            InklessError::Cancelled => ErrorKind::Cancelled,
            InklessError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            InklessError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            InklessError::Config(_) | InklessError::Io(_) | InklessError::Serialization(_) => {
                ErrorKind::Internal
            }
            InklessError::Remote { kind, .. } => *kind,
        }
    }

    /// Payload sent alongside [`ErrorKind`] so the peer can rebuild the error
    pub fn wire_detail(&self) -> String {
        match self {
            InklessError::NotFound { fingerprint } => fingerprint.clone(),
            InklessError::PolicyExcluded { category } => category.clone(),
            InklessError::InvalidRequest(msg) => msg.clone(),
            InklessError::Ledger(e) => e.to_string(),
            InklessError::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Rebuild an error received from the relay
    pub fn from_wire(kind: ErrorKind, detail: String, retryable: bool) -> Self {
        match kind {
            ErrorKind::NotFound => InklessError::NotFound { fingerprint: detail },
            ErrorKind::PolicyExcluded => InklessError::PolicyExcluded { category: detail },
            ErrorKind::InvalidRequest => InklessError::InvalidRequest(detail),
            ErrorKind::Cancelled => InklessError::Cancelled,
            ErrorKind::Ledger if retryable => InklessError::Ledger(LedgerError::Unavailable(detail)),
            ErrorKind::Ledger => InklessError::Ledger(LedgerError::Rejected(detail)),
            ErrorKind::SubmissionNetwork => {
                InklessError::SubmissionNetwork(TransportError::ReceiveFailed(detail))
            }
            ErrorKind::Signing => InklessError::Signing(CryptoError::SigningFailed(detail)),
            ErrorKind::KeyGeneration => {
                InklessError::KeyGeneration(CryptoError::BackendUnavailable(detail))
            }
            ErrorKind::Fingerprint | ErrorKind::InvalidTransition | ErrorKind::Internal => {
                InklessError::Remote {
                    kind,
                    message: detail,
                    retryable,
                }
            }
        }
    }
}
