//! End-to-end tests: client, in-process relay, in-memory ledger

use std::sync::Arc;
use std::time::Duration;

use inkless::anchor::DocumentMetadata;
use inkless::cancel::Cancellation;
use inkless::crypto::{Ed25519Scheme, SignerIdentity};
use inkless::relay::SyncOutcome;
use inkless::{
    AnchorClient, AnchorRequest, AnchorStatus, Authority, Fingerprint, FingerprintEngine, InMemoryLedger,
    InklessError, LocalRelay, OfflineQueue, RelayService, SchemePreference, SelectedDocument,
    SignatureBytes, SigningSession, SigningState, SigningWorkflow, VerificationStatus, WorkflowEvent,
};

fn relay_with(ledger: Arc<InMemoryLedger>, authority: Authority) -> AnchorClient<LocalRelay> {
    let service = RelayService::new(ledger, authority).with_poll_interval(Duration::from_millis(10));
    AnchorClient::new(LocalRelay::spawn(Arc::new(service)))
}

fn client() -> AnchorClient<LocalRelay> {
    let authority = Authority::new("relay");
    relay_with(Arc::new(InMemoryLedger::new(authority.clone())), authority)
}

fn request(fp: &str, signer: &str, category: &str) -> AnchorRequest {
    AnchorRequest::new(
        Fingerprint::from_hex(fp).unwrap(),
        SignatureBytes::from_bytes(&[7u8; 64]),
        SignerIdentity::parse(signer).unwrap(),
        DocumentMetadata::with_category(category),
    )
}

fn classical_session(seed: u8) -> SigningSession {
    SigningSession::with_key_pair(Arc::new(Ed25519Scheme::new()), Ed25519Scheme::from_seed(&[seed; 32])).unwrap()
}

#[test]
fn test_fingerprint_of_empty_input_is_stable() {
    let a = FingerprintEngine::default().fingerprint(b"");
    let b = FingerprintEngine::default().fingerprint(b"");
    assert_eq!(a.to_hex(), b.to_hex());
    assert_ne!(a, FingerprintEngine::default().fingerprint(b"\0"));
}

#[tokio::test]
async fn test_anchor_then_verify() {
    let client = client();
    let record = client
        .submit(request("abc123", "did:x:1", "general_contract"))
        .await
        .unwrap();
    assert_eq!(record.status(), AnchorStatus::Anchored);

    let fp = Fingerprint::from_hex("abc123").unwrap();
    let response = client.verify_response(&fp).await.unwrap();
    assert!(response.is_valid);
    assert_eq!(response.signer.as_deref(), Some("did:x:1"));
    assert_eq!(response.ledger_tx.as_deref(), Some(record.ledger_tx_ref.as_str()));
    assert_eq!(response.signer_count, Some(1));
}

#[tokio::test]
async fn test_unknown_fingerprint_is_not_found() {
    let client = client();
    let result = client
        .verify(&Fingerprint::from_hex("00000000").unwrap())
        .await
        .unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.status, VerificationStatus::NotFound);
    assert!(result.signers.is_empty());
}

#[tokio::test]
async fn test_cosigners_in_submission_order() {
    let client = client();
    client.submit(request("abcd", "did:x:1", "nda")).await.unwrap();
    client.submit(request("abcd", "did:x:2", "nda")).await.unwrap();

    let result = client.verify(&Fingerprint::from_hex("abcd").unwrap()).await.unwrap();
    let ids: Vec<&str> = result.signers.iter().map(|s| s.identity.as_str()).collect();
    assert_eq!(ids, vec!["did:x:1", "did:x:2"]);
}

#[tokio::test]
async fn test_resubmission_is_idempotent() {
    let client = client();
    let first = client.submit(request("abcd", "did:x:1", "nda")).await.unwrap();
    let again = client.submit(request("abcd", "did:x:1", "nda")).await.unwrap();
    assert_eq!(first.ledger_tx_ref, again.ledger_tx_ref);
    assert_eq!(first.doc_id, again.doc_id);

    let result = client.verify(&Fingerprint::from_hex("abcd").unwrap()).await.unwrap();
    assert_eq!(result.signers.len(), 1);

    let stats = client.stats().await.unwrap();
    assert_eq!(stats.total_anchors, 1);
}

#[tokio::test]
async fn test_concurrent_identical_submissions_anchor_once() {
    let client = Arc::new(client());
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client.submit(request("feed", "did:x:1", "nda")).await.unwrap()
        }));
    }

    let mut refs = Vec::new();
    for task in tasks {
        refs.push(task.await.unwrap().ledger_tx_ref);
    }
    refs.dedup();
    assert_eq!(refs.len(), 1);
    assert_eq!(client.stats().await.unwrap().total_anchors, 1);
}

#[tokio::test]
async fn test_excluded_category_is_refused_by_relay() {
    let client = client();
    let err = client.submit(request("abcd", "did:x:1", "will")).await.unwrap_err();
    assert!(matches!(err, InklessError::PolicyExcluded { ref category } if category == "will"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_ledger_outage_is_retryable() {
    let authority = Authority::new("relay");
    let ledger = Arc::new(InMemoryLedger::new(authority.clone()));
    let client = relay_with(ledger.clone(), authority);

    ledger.set_offline(true);
    let err = client.submit(request("abcd", "did:x:1", "nda")).await.unwrap_err();
    assert!(matches!(err, InklessError::Ledger(_)));
    assert!(err.is_retryable());

    ledger.set_offline(false);
    let record = client.submit(request("abcd", "did:x:1", "nda")).await.unwrap();
    assert_eq!(record.status(), AnchorStatus::Anchored);
}

#[tokio::test]
async fn test_workflow_signs_and_anchors() {
    let client = client();
    let mut session = SigningSession::open(SchemePreference::PreferPostQuantum).unwrap();
    let mut workflow = SigningWorkflow::default();

    workflow
        .handle(WorkflowEvent::ContentChosen(SelectedDocument::from_bytes(
            b"I agree to the terms".to_vec(),
            "nda",
        )))
        .unwrap();
    let outcome = workflow
        .sign(&mut session, &client, &Cancellation::never())
        .await
        .unwrap()
        .clone();

    assert!(outcome.record.verify());
    let anchor = outcome.anchor.expect("online signing anchors");
    assert_eq!(anchor.status(), AnchorStatus::Anchored);
    assert!(matches!(workflow.state(), SigningState::Complete(_)));

    let result = client.verify(&outcome.record.fingerprint).await.unwrap();
    assert!(result.is_valid);
    assert_eq!(result.signers[0].identity, outcome.record.signer_identity);
    assert_eq!(result.signers[0].ledger_tx_ref, anchor.ledger_tx_ref);
}

#[tokio::test]
async fn test_workflow_refuses_excluded_category() {
    let client = client();
    let mut session = classical_session(1);
    let mut workflow = SigningWorkflow::default();

    workflow
        .handle(WorkflowEvent::ContentChosen(SelectedDocument::from_bytes(
            b"Last will and testament".to_vec(),
            "will",
        )))
        .unwrap();
    let err = workflow
        .sign(&mut session, &client, &Cancellation::never())
        .await
        .unwrap_err();

    assert!(matches!(err, InklessError::PolicyExcluded { .. }));
    assert!(matches!(workflow.state(), SigningState::ContentSelected(_)));
    assert_eq!(client.stats().await.unwrap().total_anchors, 0);
}

#[tokio::test]
async fn test_offline_signatures_sync_once() {
    let dir = tempfile::tempdir().unwrap();
    let queue_path = dir.path().join("offline_queue.json");
    let client = client();
    let mut session = classical_session(2);

    for text in [&b"first"[..], &b"second"[..]] {
        let mut workflow = SigningWorkflow::default();
        workflow
            .handle(WorkflowEvent::ContentChosen(SelectedDocument::from_bytes(text.to_vec(), "invoice")))
            .unwrap();
        let mut queue = OfflineQueue::open(&queue_path).unwrap();
        workflow
            .sign_offline(&mut session, &mut queue, &Cancellation::never())
            .unwrap();
    }

    let mut queue = OfflineQueue::open(&queue_path).unwrap();
    assert_eq!(queue.len(), 2);

    // One of them reached the relay some other way first
    let early = queue.to_requests().remove(0);
    client.submit(early).await.unwrap();

    let report = queue.sync(&client).await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(report.already_exists, 1);
    assert!(queue.is_empty());
    assert!(OfflineQueue::open(&queue_path).unwrap().is_empty());

    let again = queue.sync(&client).await.unwrap();
    assert!(again.results.is_empty());
    assert_eq!(client.stats().await.unwrap().total_anchors, 2);
}

#[tokio::test]
async fn test_sync_reports_each_item() {
    let client = client();
    let results = client
        .sync(vec![
            request("aa01", "did:x:1", "nda"),
            request("aa02", "did:x:1", "land-deed"),
            request("aa03", "did:x:1", "nda"),
        ])
        .await
        .unwrap();

    let outcomes: Vec<SyncOutcome> = results.iter().map(|r| r.outcome).collect();
    assert_eq!(outcomes, vec![SyncOutcome::Synced, SyncOutcome::Failed, SyncOutcome::Synced]);
    assert!(results[1].error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_pending_anchor_confirms_on_refresh() {
    let authority = Authority::new("relay");
    let ledger = Arc::new(InMemoryLedger::with_confirmation_delay(
        authority.clone(),
        Duration::from_secs(10),
    ));
    let service = RelayService::new(ledger, authority)
        .with_confirmation_timeout(Duration::from_secs(1))
        .with_poll_interval(Duration::from_millis(100));
    let client = AnchorClient::new(LocalRelay::spawn(Arc::new(service)));

    let mut record = client.submit(request("beef", "did:x:1", "nda")).await.unwrap();
    assert_eq!(record.status(), AnchorStatus::Pending);

    assert_eq!(client.refresh(&mut record).await.unwrap(), AnchorStatus::Pending);

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(client.refresh(&mut record).await.unwrap(), AnchorStatus::Anchored);

    let result = client.verify(&record.fingerprint).await.unwrap();
    assert!(result.is_valid);
    assert_eq!(result.signers[0].ledger_tx_ref, record.ledger_tx_ref);
}

#[tokio::test]
async fn test_recent_lists_newest_first_with_fallbacks() {
    let client = client();
    client.submit(request("0102030405", "did:x:1", "nda")).await.unwrap();
    let mut named = request("0a0b0c0d", "did:x:2", "invoice");
    named.file_name = Some("invoice.pdf".to_string());
    named.file_size = Some("12.0 KB".to_string());
    client.submit(named).await.unwrap();

    let recent = client.recent(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].file_name, "invoice.pdf");
    assert_eq!(recent[1].file_name, "Document_01020304.pdf");
    assert_eq!(recent[1].file_size, "Unknown");
}
