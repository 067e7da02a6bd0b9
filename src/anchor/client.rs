//! Anchor client: the only path from a signer to the registry
//!
//! One call per user action. Nothing here retries: a failed submission is
//! reported and the caller decides whether to start a brand-new attempt.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{AnchorRecord, AnchorRequest, AnchorStatus};
use crate::cancel::Cancellation;
use crate::crypto::Fingerprint;
use crate::error::{InklessError, Result};
use crate::relay::{AuditEvent, RecentAnchor, RelayMessage, RelayStats, SyncResult};
use crate::transport::{Relay, TransportError};
use crate::verify::{VerificationResult, VerifyResponse};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Submits anchors and queries through a relay
pub struct AnchorClient<R: Relay> {
    relay: R,
    timeout: Duration,
}

impl<R: Relay> AnchorClient<R> {
    /// Client over `relay` with the default timeout
    pub fn new(relay: R) -> Self {
        AnchorClient {
            relay,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying relay
    pub fn relay(&self) -> &R {
        &self.relay
    }

    async fn call(&self, request: RelayMessage) -> Result<RelayMessage> {
        let name = request.name();
        let response = tokio::time::timeout(self.timeout, self.relay.call(request))
            .await
            .map_err(|_| TransportError::Timeout)??;

        match response {
            RelayMessage::Error {
                kind,
                message,
                retryable,
            } => {
                debug!(request = name, kind = ?kind, "relay returned an error");
                Err(InklessError::from_wire(kind, message, retryable))
            }
            other => Ok(other),
        }
    }

    fn unexpected(response: &RelayMessage) -> InklessError {
        TransportError::InvalidData(format!("unexpected response '{}'", response.name())).into()
    }

    /// Submit a signed fingerprint for anchoring
    ///
    /// The returned record is `anchored` once the ledger confirmed the
    /// write, `pending` if the relay gave up waiting, `failed` if the
    /// ledger rejected it.
    pub async fn submit(&self, request: AnchorRequest) -> Result<AnchorRecord> {
        let fingerprint = request.fingerprint.clone();
        match self.call(RelayMessage::Anchor(request)).await {
            Ok(RelayMessage::Anchored(response)) => {
                let record = AnchorRecord::from_response(fingerprint, response)?;
                info!(
                    fingerprint = %record.fingerprint.short(),
                    tx = %record.ledger_tx_ref,
                    status = %record.status(),
                    "anchor submitted"
                );
                Ok(record)
            }
            Ok(other) => Err(Self::unexpected(&other)),
            Err(e) => {
                warn!(fingerprint = %fingerprint.short(), error = %e, "anchor submission failed");
                Err(e)
            }
        }
    }

    /// [`submit`](Self::submit), abandoned if `cancel` fires first
    pub async fn submit_cancellable(&self, request: AnchorRequest, cancel: &Cancellation) -> Result<AnchorRecord> {
        cancel.run(self.submit(request)).await
    }

    /// Ask the relay whether a pending anchor has been confirmed
    ///
    /// Applies the single allowed transition to `record`; a record that is
    /// already final is returned as is without a network call.
    pub async fn refresh(&self, record: &mut AnchorRecord) -> Result<AnchorStatus> {
        if record.status().is_final() {
            return Ok(record.status());
        }
        let request = RelayMessage::Status {
            ledger_tx_ref: record.ledger_tx_ref.clone(),
        };
        match self.call(request).await? {
            RelayMessage::StatusReport { status, .. } => {
                record.resolve(status)?;
                Ok(record.status())
            }
            other => Err(Self::unexpected(&other)),
        }
    }

    /// Verdict for a fingerprint, as the relay reports it
    pub async fn verify(&self, fingerprint: &Fingerprint) -> Result<VerificationResult> {
        let request = RelayMessage::Verify {
            fingerprint: fingerprint.clone(),
        };
        match self.call(request).await? {
            RelayMessage::Verified(response) => Ok(VerificationResult::from_response(fingerprint.clone(), response)),
            other => Err(Self::unexpected(&other)),
        }
    }

    /// Raw wire verdict
    pub async fn verify_response(&self, fingerprint: &Fingerprint) -> Result<VerifyResponse> {
        let request = RelayMessage::Verify {
            fingerprint: fingerprint.clone(),
        };
        match self.call(request).await? {
            RelayMessage::Verified(response) => Ok(response),
            other => Err(Self::unexpected(&other)),
        }
    }

    /// [`verify`](Self::verify), abandoned if `cancel` fires first
    pub async fn verify_cancellable(&self, fingerprint: &Fingerprint, cancel: &Cancellation) -> Result<VerificationResult> {
        cancel.run(self.verify(fingerprint)).await
    }

    /// Latest anchors, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<RecentAnchor>> {
        match self.call(RelayMessage::Recent { limit }).await? {
            RelayMessage::RecentAnchors { items } => Ok(items),
            other => Err(Self::unexpected(&other)),
        }
    }

    /// Submit a batch of offline signatures
    pub async fn sync(&self, items: Vec<AnchorRequest>) -> Result<Vec<SyncResult>> {
        match self.call(RelayMessage::Sync { items }).await? {
            RelayMessage::Synced { results } => Ok(results),
            other => Err(Self::unexpected(&other)),
        }
    }

    /// Relay counters
    pub async fn stats(&self) -> Result<RelayStats> {
        match self.call(RelayMessage::Stats).await? {
            RelayMessage::StatsReport(stats) => Ok(stats),
            other => Err(Self::unexpected(&other)),
        }
    }

    /// Audit trail for a fingerprint
    pub async fn audit_trail(&self, fingerprint: &Fingerprint) -> Result<Vec<AuditEvent>> {
        let request = RelayMessage::Audit {
            fingerprint: fingerprint.clone(),
        };
        match self.call(request).await? {
            RelayMessage::AuditTrail { events } => Ok(events),
            other => Err(Self::unexpected(&other)),
        }
    }

    /// Round trip to the relay
    pub async fn ping(&self) -> Result<()> {
        match self.call(RelayMessage::Ping).await? {
            RelayMessage::Pong => Ok(()),
            other => Err(Self::unexpected(&other)),
        }
    }
}
