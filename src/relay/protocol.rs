//! Relay wire protocol
//!
//! JSON messages of the form `{"type": "...", "data": {...}}`. Every request
//! gets exactly one response; failures come back as [`RelayMessage::Error`]
//! with enough information to rebuild the typed error on the client.
//!
//! Over a socket each message travels in a [`Frame`] whose `id` the relay
//! echoes on the response, so a late answer to an abandoned request is never
//! mistaken for the answer to the next one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anchor::{AnchorRequest, AnchorResponse, AnchorStatus};
use crate::crypto::{Fingerprint, SignerIdentity};
use crate::error::{ErrorKind, InklessError};
use crate::registry::TxRef;
use crate::verify::VerifyResponse;

/// Messages between client and relay
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[allow(missing_docs)]
pub enum RelayMessage {
    /// Anchor a signed fingerprint
    Anchor(AnchorRequest),
    /// Receipt for an anchor
    Anchored(AnchorResponse),
    /// Ask for the status of a ledger transaction
    Status { ledger_tx_ref: TxRef },
    /// Status of a ledger transaction
    StatusReport { ledger_tx_ref: TxRef, status: AnchorStatus },
    /// Verify a fingerprint
    Verify { fingerprint: Fingerprint },
    /// Verification verdict
    Verified(VerifyResponse),
    /// Latest anchors
    Recent { limit: usize },
    /// Latest anchors, newest first
    RecentAnchors { items: Vec<RecentAnchor> },
    /// Submit signatures produced offline
    Sync { items: Vec<AnchorRequest> },
    /// Per-item sync outcome
    Synced { results: Vec<SyncResult> },
    /// Relay counters
    Stats,
    /// Relay counters
    StatsReport(RelayStats),
    /// Audit events for a fingerprint
    Audit { fingerprint: Fingerprint },
    /// Audit events, newest first
    AuditTrail { events: Vec<AuditEvent> },
    /// Request failed
    Error { kind: ErrorKind, message: String, retryable: bool },
    /// Ping
    Ping,
    /// Pong
    Pong,
}

impl RelayMessage {
    /// Error response for a failed request
    pub fn error(err: &InklessError) -> Self {
        RelayMessage::Error {
            kind: err.kind(),
            message: err.wire_detail(),
            retryable: err.is_retryable(),
        }
    }

    /// Error response for a request that could not be parsed
    pub fn invalid(message: impl Into<String>) -> Self {
        RelayMessage::Error {
            kind: ErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    /// Message type name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            RelayMessage::Anchor(_) => "anchor",
            RelayMessage::Anchored(_) => "anchored",
            RelayMessage::Status { .. } => "status",
            RelayMessage::StatusReport { .. } => "status_report",
            RelayMessage::Verify { .. } => "verify",
            RelayMessage::Verified(_) => "verified",
            RelayMessage::Recent { .. } => "recent",
            RelayMessage::RecentAnchors { .. } => "recent_anchors",
            RelayMessage::Sync { .. } => "sync",
            RelayMessage::Synced { .. } => "synced",
            RelayMessage::Stats => "stats",
            RelayMessage::StatsReport(_) => "stats_report",
            RelayMessage::Audit { .. } => "audit",
            RelayMessage::AuditTrail { .. } => "audit_trail",
            RelayMessage::Error { .. } => "error",
            RelayMessage::Ping => "ping",
            RelayMessage::Pong => "pong",
        }
    }
}

/// A message on the wire, tagged with the request id it belongs to
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Frame {
    /// Chosen by the client, echoed by the relay
    pub id: u64,
    /// Payload
    pub message: RelayMessage,
}

impl Frame {
    /// Wrap a message
    pub fn new(id: u64, message: RelayMessage) -> Self {
        Frame { id, message }
    }

    /// Request id of a frame whose message did not parse, 0 if none can be read
    pub fn salvage_id(text: &str) -> u64 {
        #[derive(Deserialize)]
        struct IdOnly {
            id: u64,
        }
        serde_json::from_str::<IdOnly>(text).map(|f| f.id).unwrap_or(0)
    }
}

/// One row of the recent-anchors list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAnchor {
    /// Relay-assigned document id
    pub doc_id: String,
    /// Anchored fingerprint
    pub fingerprint: Fingerprint,
    /// File name, or `Document_<8 hex>.pdf` when none was given
    pub file_name: String,
    /// File size, or `Unknown`
    pub file_size: String,
    /// Category id
    pub category: String,
    /// Category display name
    pub category_label: String,
    /// Who signed
    pub signer_identity: SignerIdentity,
    /// Ledger transaction
    pub ledger_tx_ref: TxRef,
    /// Submission time
    pub anchored_at: DateTime<Utc>,
    /// Current status
    pub status: AnchorStatus,
}

/// Outcome of syncing one offline signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Newly anchored
    Synced,
    /// The (fingerprint, signer) pair was already anchored
    AlreadyExists,
    /// Could not be anchored
    Failed,
}

/// Per-item sync result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Fingerprint of the item
    pub fingerprint: Fingerprint,
    /// Signer of the item
    pub signer_identity: SignerIdentity,
    /// What happened
    pub outcome: SyncOutcome,
    /// Ledger transaction, when anchored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_tx_ref: Option<TxRef>,
    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Relay counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    /// Anchors recorded
    pub total_anchors: usize,
    /// Distinct fingerprints
    pub documents: usize,
    /// Distinct signers
    pub signers: usize,
    /// Verifications served
    pub verifications: usize,
}

/// What an audit event records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// New anchor written
    Anchor,
    /// Resubmission answered from the existing anchor
    Duplicate,
    /// Verification served
    Verify,
    /// Offline item synced
    Sync,
}

/// One audit trail entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Action
    pub action: AuditAction,
    /// Fingerprint concerned
    pub fingerprint: Fingerprint,
    /// Signer concerned, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_identity: Option<SignerIdentity>,
    /// Short description
    pub detail: String,
    /// When it happened
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let msg = RelayMessage::Verify {
            fingerprint: Fingerprint::from_hex("abc123").unwrap(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Verify");
        assert_eq!(json["data"]["fingerprint"], "abc123");
    }

    #[test]
    fn test_error_carries_kind() {
        let err = InklessError::NotFound {
            fingerprint: "00000000".into(),
        };
        let json = serde_json::to_string(&RelayMessage::error(&err)).unwrap();
        let parsed: RelayMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            RelayMessage::Error {
                kind,
                message,
                retryable,
            } => {
                assert_eq!(kind, ErrorKind::NotFound);
                assert_eq!(message, "00000000");
                assert!(!retryable);
            }
            other => panic!("Wrong message type: {}", other.name()),
        }
    }

    #[test]
    fn test_unit_messages_parse() {
        let parsed: RelayMessage = serde_json::from_str(r#"{"type":"Ping"}"#).unwrap();
        assert!(matches!(parsed, RelayMessage::Ping));
        let parsed: RelayMessage = serde_json::from_str(r#"{"type":"Stats"}"#).unwrap();
        assert!(matches!(parsed, RelayMessage::Stats));
    }

    #[test]
    fn test_frame_carries_id() {
        let frame = Frame::new(42, RelayMessage::Stats);
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["message"]["type"], "Stats");

        let parsed: Frame = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.id, 42);
        assert!(matches!(parsed.message, RelayMessage::Stats));
    }

    #[test]
    fn test_salvage_id_from_bad_frame() {
        assert_eq!(Frame::salvage_id(r#"{"id":9,"message":{"type":"Nonsense"}}"#), 9);
        assert_eq!(Frame::salvage_id("not json"), 0);
    }
}
