//! Anchoring: recording a signed fingerprint on the public registry
//!
//! The client bundles a fingerprint, signature and signer identity with some
//! document metadata into an [`AnchorRequest`] and hands it to the relay. The
//! relay is the only party holding ledger write credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{Fingerprint, SignatureBytes, SignerIdentity};
use crate::error::{InklessError, Result};
use crate::registry::TxRef;
use crate::signing::SignatureRecord;

pub mod client;
pub use client::AnchorClient;

/// Lifecycle of an anchor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStatus {
    /// Submitted, ledger write not yet confirmed
    Pending,
    /// Ledger write confirmed
    Anchored,
    /// Ledger write rejected
    Failed,
}

impl AnchorStatus {
    /// Whether the status can no longer change
    pub fn is_final(&self) -> bool {
        !matches!(self, AnchorStatus::Pending)
    }
}

impl std::fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnchorStatus::Pending => "pending",
            AnchorStatus::Anchored => "anchored",
            AnchorStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Optional document details sent along with an anchor
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Category id (see [`crate::policy`])
    #[serde(default)]
    pub category: String,
    /// Original file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Human readable size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl DocumentMetadata {
    /// Metadata with only a category
    pub fn with_category(category: impl Into<String>) -> Self {
        DocumentMetadata {
            category: category.into(),
            ..Default::default()
        }
    }
}

/// Human readable size, the way it is shown in the recent-anchors list
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Submission sent to the relay
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRequest {
    /// Document fingerprint (hex)
    pub fingerprint: Fingerprint,
    /// Signature over the fingerprint (base64)
    pub signature: SignatureBytes,
    /// Who signed
    pub signer_identity: SignerIdentity,
    /// Category id
    #[serde(default)]
    pub document_category: String,
    /// Original file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Human readable size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl AnchorRequest {
    /// Build a request from its parts
    pub fn new(
        fingerprint: Fingerprint,
        signature: SignatureBytes,
        signer_identity: SignerIdentity,
        metadata: DocumentMetadata,
    ) -> Self {
        AnchorRequest {
            fingerprint,
            signature,
            signer_identity,
            document_category: metadata.category,
            file_name: metadata.file_name,
            file_size: metadata.file_size,
            mime_type: metadata.mime_type,
        }
    }

    /// Build a request for a produced signature
    pub fn from_record(record: &SignatureRecord, metadata: DocumentMetadata) -> Self {
        AnchorRequest::new(
            record.fingerprint.clone(),
            record.signature.clone(),
            record.signer_identity.clone(),
            metadata,
        )
    }
}

/// Relay receipt for an anchor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorResponse {
    /// Ledger transaction that carries the anchor
    pub ledger_tx_ref: TxRef,
    /// When the relay submitted the write
    pub anchored_at: DateTime<Utc>,
    /// Relay-assigned document id
    pub doc_id: String,
    /// Where the write stands
    pub status: AnchorStatus,
}

/// Client-side view of one anchor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRecord {
    /// Relay-assigned document id
    pub doc_id: String,
    /// Anchored fingerprint
    pub fingerprint: Fingerprint,
    /// Ledger transaction
    pub ledger_tx_ref: TxRef,
    /// Submission time
    pub anchored_at: DateTime<Utc>,
    status: AnchorStatus,
}

impl AnchorRecord {
    /// A freshly submitted anchor
    pub fn pending(doc_id: String, fingerprint: Fingerprint, ledger_tx_ref: TxRef, anchored_at: DateTime<Utc>) -> Self {
        AnchorRecord {
            doc_id,
            fingerprint,
            ledger_tx_ref,
            anchored_at,
            status: AnchorStatus::Pending,
        }
    }

    /// Build from a relay receipt, applying its status as the single transition
    pub fn from_response(fingerprint: Fingerprint, response: AnchorResponse) -> Result<Self> {
        let mut record = AnchorRecord::pending(
            response.doc_id,
            fingerprint,
            response.ledger_tx_ref,
            response.anchored_at,
        );
        record.resolve(response.status)?;
        Ok(record)
    }

    /// Current status
    pub fn status(&self) -> AnchorStatus {
        self.status
    }

    /// Move out of `pending`
    ///
    /// Resolving to `pending` is a no-op. Once the record is `anchored` or
    /// `failed` it never changes again; asking for another final status is
    /// an error, repeating the same one is not.
    pub fn resolve(&mut self, status: AnchorStatus) -> Result<()> {
        match (self.status, status) {
            (_, AnchorStatus::Pending) if !self.status.is_final() => Ok(()),
            (AnchorStatus::Pending, next) => {
                self.status = next;
                Ok(())
            }
            (current, next) if current == next => Ok(()),
            (current, next) => Err(InklessError::InvalidTransition {
                state: current.to_string(),
                event: format!("resolve to {}", next),
            }),
        }
    }
}
