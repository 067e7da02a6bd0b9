//! Public registry ledger interface
//!
//! The registry is an append-only map from document fingerprint to the
//! ordered list of signers who anchored it. Reads are open to anyone; writes
//! are accepted only from the ledger's owner authority (the relay).
//!
//! Writes are not immediately visible: a transaction is `Pending` until the
//! ledger confirms it, and only then does it show up in [`RegistryLedger::lookup`].

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{Fingerprint, SignerIdentity};

pub mod memory;
pub use memory::InMemoryLedger;

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The caller is not the ledger owner
    #[error("Write rejected: {caller} is not the registry authority")]
    Unauthorized {
        /// Who attempted the write
        caller: String,
    },

    /// The ledger refused the transaction
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// The write was not confirmed in time
    #[error("Ledger confirmation timed out")]
    Timeout,

    /// The ledger could not be reached
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// No such transaction
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),
}

impl LedgerError {
    /// Whether a fresh attempt might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Timeout | LedgerError::Unavailable(_))
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// An account allowed (or trying) to write to the ledger
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authority(String);

impl Authority {
    /// Wrap an authority name or address
    pub fn new(name: impl Into<String>) -> Self {
        Authority(name.into())
    }

    /// The authority string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a ledger transaction
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

impl TxRef {
    /// Wrap a transaction reference
    pub fn new(reference: impl Into<String>) -> Self {
        TxRef(reference.into())
    }

    /// The reference string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One anchor write, as submitted by the relay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorWrite {
    /// Document fingerprint (the registry key)
    pub fingerprint: Fingerprint,
    /// Who signed
    pub signer: SignerIdentity,
    /// SHA3-256 commitment to the signature bytes
    pub signature_commitment: String,
}

/// One signer record stored under a fingerprint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    /// Who signed
    pub signer: SignerIdentity,
    /// When the write was submitted to the ledger
    pub timestamp: DateTime<Utc>,
    /// Transaction that recorded this entry
    pub ledger_tx_ref: TxRef,
    /// Commitment to the signature bytes
    pub signature_commitment: String,
}

/// Confirmation state of a transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Confirmation {
    /// Submitted, not yet final
    Pending,
    /// Final and visible to readers
    Confirmed {
        /// When it became final
        at: DateTime<Utc>,
    },
    /// Will never be recorded
    Rejected {
        /// Why
        reason: String,
    },
}

/// The registry contract surface the protocol depends on
#[async_trait]
pub trait RegistryLedger: Send + Sync {
    /// The single authority allowed to write
    async fn owner(&self) -> LedgerResult<Authority>;

    /// Append a signer record under a fingerprint (owner only)
    async fn anchor(&self, caller: &Authority, write: AnchorWrite) -> LedgerResult<TxRef>;

    /// Confirmation state of a previously submitted write
    async fn confirmation(&self, tx: &TxRef) -> LedgerResult<Confirmation>;

    /// All confirmed entries for a fingerprint, in submission order
    async fn lookup(&self, fingerprint: &Fingerprint) -> LedgerResult<Vec<RegistryEntry>>;
}
