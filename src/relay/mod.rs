//! The relay: sole writer to the registry ledger
//!
//! Clients never hold ledger credentials. They submit [`AnchorRequest`]s to
//! the relay, which checks them, writes them to the ledger under its own
//! [`Authority`], and waits (bounded) for confirmation.
//!
//! Anchoring is idempotent per `(fingerprint, signer)`: submissions of the
//! same pair queue on a per-pair lock covering the index lookup, the ledger
//! write and the confirmation wait, so two identical submissions racing each
//! other produce one ledger entry and the same receipt. The shared state is
//! only locked for lookups and bookkeeping, so reads and anchors of other
//! pairs never wait on a slow confirmation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::anchor::{AnchorRequest, AnchorResponse, AnchorStatus};
use crate::crypto::{commitment, Fingerprint, SignerIdentity};
use crate::error::{InklessError, Result};
use crate::policy;
use crate::registry::{AnchorWrite, Authority, Confirmation, LedgerError, RegistryLedger, TxRef};
use crate::verify::{VerificationService, VerifyResponse};

pub mod protocol;
pub mod server;
pub use protocol::{AuditAction, AuditEvent, Frame, RecentAnchor, RelayMessage, RelayStats, SyncOutcome, SyncResult};

/// Default bound on waiting for a ledger confirmation
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between confirmation polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound on items returned by `recent`
pub const MAX_RECENT: usize = 100;

struct StoredAnchor {
    response: AnchorResponse,
    fingerprint: Fingerprint,
    signer: SignerIdentity,
    category: String,
    file_name: Option<String>,
    file_size: Option<String>,
}

impl StoredAnchor {
    fn to_recent(&self) -> RecentAnchor {
        let hex = self.fingerprint.to_hex();
        RecentAnchor {
            doc_id: self.response.doc_id.clone(),
            fingerprint: self.fingerprint.clone(),
            file_name: self
                .file_name
                .clone()
                .unwrap_or_else(|| format!("Document_{}.pdf", &hex[..hex.len().min(8)])),
            file_size: self.file_size.clone().unwrap_or_else(|| "Unknown".to_string()),
            category: self.category.clone(),
            category_label: policy::category_label(&self.category),
            signer_identity: self.signer.clone(),
            ledger_tx_ref: self.response.ledger_tx_ref.clone(),
            anchored_at: self.response.anchored_at,
            status: self.response.status,
        }
    }
}

type AnchorKey = (Fingerprint, SignerIdentity);

#[derive(Default)]
struct RelayState {
    /// (fingerprint, signer) -> position in `anchors`
    index: HashMap<AnchorKey, usize>,
    anchors: Vec<StoredAnchor>,
    audit: Vec<AuditEvent>,
    verifications: usize,
}

impl RelayState {
    fn record(
        &mut self,
        key: AnchorKey,
        response: AnchorResponse,
        category: String,
        file_name: Option<String>,
        file_size: Option<String>,
    ) {
        let pos = self.anchors.len();
        self.anchors.push(StoredAnchor {
            response,
            fingerprint: key.0.clone(),
            signer: key.1.clone(),
            category,
            file_name,
            file_size,
        });
        self.index.insert(key, pos);
    }

    fn audit(&mut self, action: AuditAction, fingerprint: &Fingerprint, signer: Option<&SignerIdentity>, detail: String) {
        self.audit.push(AuditEvent {
            action,
            fingerprint: fingerprint.clone(),
            signer_identity: signer.cloned(),
            detail,
            at: Utc::now(),
        });
    }
}

/// Relay service state and operations
pub struct RelayService {
    ledger: Arc<dyn RegistryLedger>,
    authority: Authority,
    verifier: VerificationService,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    state: Mutex<RelayState>,
    in_flight: Mutex<HashMap<AnchorKey, Arc<Mutex<()>>>>,
}

impl RelayService {
    /// Relay writing to `ledger` as `authority`
    pub fn new(ledger: Arc<dyn RegistryLedger>, authority: Authority) -> Self {
        RelayService {
            verifier: VerificationService::new(ledger.clone()),
            ledger,
            authority,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: Mutex::new(RelayState::default()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Bound the wait for ledger confirmation
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Set how often confirmation is polled
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Authority this relay writes as
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Check that the ledger accepts writes from this relay
    pub async fn check_authority(&self) -> Result<()> {
        let owner = self.ledger.owner().await?;
        if owner != self.authority {
            return Err(LedgerError::Unauthorized {
                caller: self.authority.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Anchor a signed fingerprint
    pub async fn anchor(&self, request: AnchorRequest) -> Result<AnchorResponse> {
        let (response, _) = self.anchor_inner(request, AuditAction::Anchor).await?;
        Ok(response)
    }

    async fn anchor_inner(&self, request: AnchorRequest, action: AuditAction) -> Result<(AnchorResponse, bool)> {
        if request.signature.is_empty() {
            return Err(InklessError::InvalidRequest("signature is empty".to_string()));
        }
        let category = match policy::check(&request.document_category) {
            Ok(category) => category,
            Err(e) => {
                warn!(category = %request.document_category, fingerprint = %request.fingerprint.short(), "anchor rejected by category policy");
                return Err(e);
            }
        };

        let key = (request.fingerprint.clone(), request.signer_identity.clone());
        let slot = self.claim(&key).await;
        let result = {
            let _writing = slot.lock().await;
            self.anchor_claimed(key.clone(), request, category, action).await
        };
        self.release(&key, slot).await;
        result
    }

    /// Lock for one (fingerprint, signer) pair, shared by every submission of that pair
    async fn claim(&self, key: &AnchorKey) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        in_flight.entry(key.clone()).or_default().clone()
    }

    async fn release(&self, key: &AnchorKey, slot: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        // The map and this call hold the only references: nobody is waiting
        if Arc::strong_count(&slot) == 2 {
            in_flight.remove(key);
        }
    }

    /// Runs with the pair's lock held; `state` is only locked for lookups and bookkeeping
    async fn anchor_claimed(
        &self,
        key: AnchorKey,
        request: AnchorRequest,
        category: String,
        action: AuditAction,
    ) -> Result<(AnchorResponse, bool)> {
        {
            let mut state = self.state.lock().await;
            if let Some(&pos) = state.index.get(&key) {
                let response = state.anchors[pos].response.clone();
                debug!(fingerprint = %key.0.short(), signer = %key.1, "duplicate anchor, returning existing receipt");
                state.audit(
                    AuditAction::Duplicate,
                    &key.0,
                    Some(&key.1),
                    format!("resubmission answered with {}", response.ledger_tx_ref),
                );
                return Ok((response, false));
            }
        }

        if let Some(response) = self.find_on_ledger(&key.0, &key.1).await? {
            debug!(fingerprint = %key.0.short(), signer = %key.1, "anchor already on ledger");
            let mut state = self.state.lock().await;
            state.audit(
                AuditAction::Duplicate,
                &key.0,
                Some(&key.1),
                format!("recovered {} from the ledger", response.ledger_tx_ref),
            );
            state.record(key, response.clone(), category, request.file_name, request.file_size);
            return Ok((response, false));
        }

        let write = AnchorWrite {
            fingerprint: request.fingerprint.clone(),
            signer: request.signer_identity.clone(),
            signature_commitment: commitment(request.signature.as_bytes()),
        };
        let anchored_at = Utc::now();
        let tx = self.ledger.anchor(&self.authority, write).await?;
        let status = self.await_confirmation(&tx).await?;

        let response = AnchorResponse {
            ledger_tx_ref: tx,
            anchored_at,
            doc_id: Uuid::new_v4().to_string(),
            status,
        };

        let mut state = self.state.lock().await;
        match status {
            AnchorStatus::Failed => {
                warn!(tx = %response.ledger_tx_ref, fingerprint = %key.0.short(), "ledger rejected anchor");
            }
            _ => {
                info!(
                    tx = %response.ledger_tx_ref,
                    fingerprint = %key.0.short(),
                    signer = %key.1,
                    status = %status,
                    "anchor recorded"
                );
                state.record(
                    key.clone(),
                    response.clone(),
                    category,
                    request.file_name,
                    request.file_size,
                );
            }
        }
        state.audit(action, &key.0, Some(&key.1), format!("{} in {}", status, response.ledger_tx_ref));
        Ok((response, true))
    }

    /// Rebuild a receipt for a pair that is on the ledger but not in the index
    async fn find_on_ledger(&self, fingerprint: &Fingerprint, signer: &SignerIdentity) -> Result<Option<AnchorResponse>> {
        let entries = self.ledger.lookup(fingerprint).await?;
        Ok(entries.into_iter().find(|e| &e.signer == signer).map(|e| AnchorResponse {
            doc_id: Uuid::new_v4().to_string(),
            ledger_tx_ref: e.ledger_tx_ref,
            anchored_at: e.timestamp,
            status: AnchorStatus::Anchored,
        }))
    }

    /// Poll until the write is final or the timeout elapses; still pending after that is not an error
    async fn await_confirmation(&self, tx: &TxRef) -> Result<AnchorStatus> {
        let deadline = Instant::now() + self.confirmation_timeout;
        loop {
            match self.ledger.confirmation(tx).await? {
                Confirmation::Confirmed { .. } => return Ok(AnchorStatus::Anchored),
                Confirmation::Rejected { reason } => {
                    debug!(tx = %tx, reason = %reason, "write rejected");
                    return Ok(AnchorStatus::Failed);
                }
                Confirmation::Pending => {}
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(tx = %tx, "confirmation still pending at timeout");
                return Ok(AnchorStatus::Pending);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Current status of a ledger transaction
    pub async fn status(&self, tx: &TxRef) -> Result<AnchorStatus> {
        let status = match self.ledger.confirmation(tx).await? {
            Confirmation::Pending => AnchorStatus::Pending,
            Confirmation::Confirmed { .. } => AnchorStatus::Anchored,
            Confirmation::Rejected { .. } => AnchorStatus::Failed,
        };

        if status.is_final() {
            let mut state = self.state.lock().await;
            if let Some(stored) = state
                .anchors
                .iter_mut()
                .find(|a| &a.response.ledger_tx_ref == tx && !a.response.status.is_final())
            {
                stored.response.status = status;
            }
        }
        Ok(status)
    }

    /// Verdict for a fingerprint
    pub async fn verify(&self, fingerprint: &Fingerprint) -> Result<VerifyResponse> {
        let result = self.verifier.verify(fingerprint).await?;
        let mut state = self.state.lock().await;
        state.verifications += 1;
        state.audit(
            AuditAction::Verify,
            fingerprint,
            None,
            format!("{} signer(s)", result.signers.len()),
        );
        Ok(VerifyResponse::from(&result))
    }

    /// Latest anchors, newest first
    pub async fn recent(&self, limit: usize) -> Vec<RecentAnchor> {
        let state = self.state.lock().await;
        state
            .anchors
            .iter()
            .rev()
            .take(limit.min(MAX_RECENT))
            .map(StoredAnchor::to_recent)
            .collect()
    }

    /// Anchor a batch of signatures produced offline
    ///
    /// Items are processed in order and independently: one failure does not
    /// stop the rest.
    pub async fn sync_offline(&self, items: Vec<AnchorRequest>) -> Vec<SyncResult> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let fingerprint = item.fingerprint.clone();
            let signer_identity = item.signer_identity.clone();
            let result = match self.anchor_inner(item, AuditAction::Sync).await {
                Ok((response, _)) if response.status == AnchorStatus::Failed => SyncResult {
                    fingerprint,
                    signer_identity,
                    outcome: SyncOutcome::Failed,
                    ledger_tx_ref: Some(response.ledger_tx_ref),
                    error: Some("ledger rejected the write".to_string()),
                },
                Ok((response, created)) => SyncResult {
                    fingerprint,
                    signer_identity,
                    outcome: if created {
                        SyncOutcome::Synced
                    } else {
                        SyncOutcome::AlreadyExists
                    },
                    ledger_tx_ref: Some(response.ledger_tx_ref),
                    error: None,
                },
                Err(e) => SyncResult {
                    fingerprint,
                    signer_identity,
                    outcome: SyncOutcome::Failed,
                    ledger_tx_ref: None,
                    error: Some(e.to_string()),
                },
            };
            results.push(result);
        }
        info!(
            total = results.len(),
            synced = results.iter().filter(|r| r.outcome == SyncOutcome::Synced).count(),
            "offline batch processed"
        );
        results
    }

    /// Relay counters
    pub async fn stats(&self) -> RelayStats {
        let state = self.state.lock().await;
        let documents: HashSet<_> = state.anchors.iter().map(|a| &a.fingerprint).collect();
        let signers: HashSet<_> = state.anchors.iter().map(|a| &a.signer).collect();
        RelayStats {
            total_anchors: state.anchors.len(),
            documents: documents.len(),
            signers: signers.len(),
            verifications: state.verifications,
        }
    }

    /// Audit events for a fingerprint, newest first
    pub async fn audit_trail(&self, fingerprint: &Fingerprint) -> Vec<AuditEvent> {
        let state = self.state.lock().await;
        state
            .audit
            .iter()
            .rev()
            .filter(|e| &e.fingerprint == fingerprint)
            .cloned()
            .collect()
    }

    /// Serve one protocol request
    pub async fn handle(&self, message: RelayMessage) -> RelayMessage {
        debug!(request = message.name(), "relay request");
        let result = match message {
            RelayMessage::Anchor(request) => self.anchor(request).await.map(RelayMessage::Anchored),
            RelayMessage::Status { ledger_tx_ref } => self
                .status(&ledger_tx_ref)
                .await
                .map(|status| RelayMessage::StatusReport {
                    ledger_tx_ref,
                    status,
                }),
            RelayMessage::Verify { fingerprint } => {
                self.verify(&fingerprint).await.map(RelayMessage::Verified)
            }
            RelayMessage::Recent { limit } => Ok(RelayMessage::RecentAnchors {
                items: self.recent(limit).await,
            }),
            RelayMessage::Sync { items } => Ok(RelayMessage::Synced {
                results: self.sync_offline(items).await,
            }),
            RelayMessage::Stats => Ok(RelayMessage::StatsReport(self.stats().await)),
            RelayMessage::Audit { fingerprint } => Ok(RelayMessage::AuditTrail {
                events: self.audit_trail(&fingerprint).await,
            }),
            RelayMessage::Ping => Ok(RelayMessage::Pong),
            other => Err(InklessError::InvalidRequest(format!(
                "'{}' is not a request",
                other.name()
            ))),
        };

        result.unwrap_or_else(|e| {
            debug!(error = %e, "relay request failed");
            RelayMessage::error(&e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::DocumentMetadata;
    use crate::crypto::SignatureBytes;
    use crate::registry::InMemoryLedger;

    fn relay() -> (Arc<InMemoryLedger>, RelayService) {
        let authority = Authority::new("relay");
        let ledger = Arc::new(InMemoryLedger::new(authority.clone()));
        let service = RelayService::new(ledger.clone(), authority);
        (ledger, service)
    }

    fn request(fp: &str, signer: &str, category: &str) -> AnchorRequest {
        AnchorRequest::new(
            Fingerprint::from_hex(fp).unwrap(),
            SignatureBytes(vec![7u8; 64]),
            SignerIdentity::parse(signer).unwrap(),
            DocumentMetadata::with_category(category),
        )
    }

    #[tokio::test]
    async fn test_anchor_then_verify() {
        let (_, relay) = relay();
        relay.check_authority().await.unwrap();
        let response = relay
            .anchor(request("abc123", "did:x:1", "general_contract"))
            .await
            .unwrap();
        assert_eq!(response.status, AnchorStatus::Anchored);
        assert!(response.ledger_tx_ref.as_str().starts_with("0x"));

        let verdict = relay.verify(&Fingerprint::from_hex("abc123").unwrap()).await.unwrap();
        assert!(verdict.is_valid);
        assert_eq!(verdict.signer.as_deref(), Some("did:x:1"));
        assert_eq!(verdict.ledger_tx.as_deref(), Some(response.ledger_tx_ref.as_str()));
    }

    #[tokio::test]
    async fn test_resubmission_is_idempotent() {
        let (ledger, relay) = relay();
        let first = relay.anchor(request("abc123", "did:x:1", "")).await.unwrap();
        let second = relay.anchor(request("abc123", "did:x:1", "")).await.unwrap();
        assert_eq!(first, second);

        let entries = ledger.lookup(&Fingerprint::from_hex("abc123").unwrap()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(relay.stats().await.total_anchors, 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_submissions_write_once() {
        let (ledger, relay) = relay();
        let relay = Arc::new(relay);
        let a = tokio::spawn({
            let relay = relay.clone();
            async move { relay.anchor(request("abcd", "did:x:1", "invoice")).await }
        });
        let b = tokio::spawn({
            let relay = relay.clone();
            async move { relay.anchor(request("abcd", "did:x:1", "invoice")).await }
        });
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a.ledger_tx_ref, b.ledger_tx_ref);
        let entries = ledger.lookup(&Fingerprint::from_hex("abcd").unwrap()).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_excluded_category_rejected() {
        let (ledger, relay) = relay();
        let err = relay.anchor(request("abc123", "did:x:1", "will")).await.unwrap_err();
        assert!(matches!(err, InklessError::PolicyExcluded { .. }));
        let entries = ledger.lookup(&Fingerprint::from_hex("abc123").unwrap()).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_empty_signature_rejected() {
        let (_, relay) = relay();
        let mut req = request("abc123", "did:x:1", "");
        req.signature = SignatureBytes(Vec::new());
        assert!(matches!(
            relay.anchor(req).await,
            Err(InklessError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_authority_cannot_write() {
        let ledger = Arc::new(InMemoryLedger::new(Authority::new("owner")));
        let relay = RelayService::new(ledger, Authority::new("impostor"));
        assert!(relay.check_authority().await.is_err());
        let err = relay.anchor(request("abc123", "did:x:1", "")).await.unwrap_err();
        assert!(matches!(
            err,
            InklessError::Ledger(LedgerError::Unauthorized { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_confirmation_returns_pending_then_resolves() {
        let authority = Authority::new("relay");
        let ledger = Arc::new(InMemoryLedger::with_confirmation_delay(
            authority.clone(),
            Duration::from_secs(60),
        ));
        let relay = RelayService::new(ledger, authority)
            .with_confirmation_timeout(Duration::from_secs(2))
            .with_poll_interval(Duration::from_millis(500));

        let response = relay.anchor(request("abc123", "did:x:1", "")).await.unwrap();
        assert_eq!(response.status, AnchorStatus::Pending);
        assert_eq!(relay.status(&response.ledger_tx_ref).await.unwrap(), AnchorStatus::Pending);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(relay.status(&response.ledger_tx_ref).await.unwrap(), AnchorStatus::Anchored);
        assert_eq!(relay.recent(10).await[0].status, AnchorStatus::Anchored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_confirmation_does_not_block_other_requests() {
        let authority = Authority::new("relay");
        let ledger = Arc::new(InMemoryLedger::with_confirmation_delay(
            authority.clone(),
            Duration::from_secs(60),
        ));
        let relay = Arc::new(
            RelayService::new(ledger, authority)
                .with_confirmation_timeout(Duration::from_secs(30))
                .with_poll_interval(Duration::from_millis(500)),
        );

        let slow = tokio::spawn({
            let relay = relay.clone();
            async move { relay.anchor(request("aaaa", "did:x:1", "")).await }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let started = Instant::now();
        let verdict = relay.verify(&Fingerprint::from_hex("bbbb").unwrap()).await.unwrap();
        assert!(!verdict.is_valid);
        assert!(relay.recent(10).await.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));

        // A second pair runs its own confirmation wait alongside the first
        let other = relay.anchor(request("cccc", "did:x:1", "")).await.unwrap();
        assert_eq!(other.status, AnchorStatus::Pending);
        assert!(started.elapsed() < Duration::from_secs(31));

        let slow = slow.await.unwrap().unwrap();
        assert_eq!(slow.status, AnchorStatus::Pending);
        assert_eq!(relay.stats().await.total_anchors, 2);
    }

    #[tokio::test]
    async fn test_anchor_found_on_ledger_is_indexed() {
        let (ledger, relay) = relay();
        let fp = Fingerprint::from_hex("abc123").unwrap();
        let signer = SignerIdentity::parse("did:x:1").unwrap();
        let tx = ledger
            .anchor(
                relay.authority(),
                AnchorWrite {
                    fingerprint: fp.clone(),
                    signer: signer.clone(),
                    signature_commitment: commitment(&[7u8; 64]),
                },
            )
            .await
            .unwrap();

        let first = relay.anchor(request("abc123", "did:x:1", "nda")).await.unwrap();
        assert_eq!(first.ledger_tx_ref, tx);
        assert_ne!(first.doc_id, tx.as_str());

        let again = relay.anchor(request("abc123", "did:x:1", "nda")).await.unwrap();
        assert_eq!(again, first);
        assert_eq!(relay.stats().await.total_anchors, 1);
        assert_eq!(relay.recent(10).await[0].category, "nda");
        assert_eq!(ledger.lookup(&fp).await.unwrap().len(), 1);

        let actions: Vec<_> = relay.audit_trail(&fp).await.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Duplicate, AuditAction::Duplicate]);
    }

    #[tokio::test]
    async fn test_recent_fallbacks() {
        let (_, relay) = relay();
        relay.anchor(request("0123456789abcdef", "did:x:1", "")).await.unwrap();
        let mut named = request("ffee", "did:x:2", "loan_agreement");
        named.file_name = Some("loan.pdf".into());
        named.file_size = Some("2.0 KB".into());
        relay.anchor(named).await.unwrap();

        let recent = relay.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].file_name, "loan.pdf");
        assert_eq!(recent[0].category_label, "Loan Agreement");
        assert_eq!(recent[1].file_name, "Document_01234567.pdf");
        assert_eq!(recent[1].file_size, "Unknown");
        assert_eq!(recent[1].category, "general_contract");

        assert_eq!(relay.recent(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_outcomes() {
        let (_, relay) = relay();
        relay.anchor(request("aa", "did:x:1", "")).await.unwrap();

        let results = relay
            .sync_offline(vec![
                request("aa", "did:x:1", ""),
                request("bb", "did:x:1", ""),
                request("cc", "did:x:1", "land_deed"),
            ])
            .await;
        let outcomes: Vec<_> = results.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![SyncOutcome::AlreadyExists, SyncOutcome::Synced, SyncOutcome::Failed]
        );
        assert!(results[2].error.is_some());
    }

    #[tokio::test]
    async fn test_stats_and_audit() {
        let (_, relay) = relay();
        let fp = Fingerprint::from_hex("abc123").unwrap();
        relay.anchor(request("abc123", "did:x:1", "")).await.unwrap();
        relay.anchor(request("abc123", "did:x:2", "")).await.unwrap();
        relay.anchor(request("abc123", "did:x:2", "")).await.unwrap();
        relay.anchor(request("ffff", "did:x:1", "")).await.unwrap();
        relay.verify(&fp).await.unwrap();

        let stats = relay.stats().await;
        assert_eq!(stats.total_anchors, 3);
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.signers, 2);
        assert_eq!(stats.verifications, 1);

        let trail = relay.audit_trail(&fp).await;
        let actions: Vec<_> = trail.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::Verify,
                AuditAction::Duplicate,
                AuditAction::Anchor,
                AuditAction::Anchor
            ]
        );
    }

    #[tokio::test]
    async fn test_handle_maps_errors() {
        let (ledger, relay) = relay();
        ledger.set_offline(true);
        let response = relay
            .handle(RelayMessage::Verify {
                fingerprint: Fingerprint::from_hex("abcd").unwrap(),
            })
            .await;
        match response {
            RelayMessage::Error { kind, retryable, .. } => {
                assert_eq!(kind, crate::error::ErrorKind::Ledger);
                assert!(retryable);
            }
            other => panic!("Wrong message type: {}", other.name()),
        }

        let response = relay.handle(RelayMessage::Pong).await;
        assert!(matches!(response, RelayMessage::Error { .. }));
    }
}
