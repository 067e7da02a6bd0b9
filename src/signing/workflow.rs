//! Client signing workflow
//!
//! ```text
//!            ContentChosen            SignRequested
//!   Idle ───────────────► ContentSelected ─────────► Signing
//!    ▲                     ▲     │   ▲                │   │
//!    │                     │     │   └── SignFailed ──┘   │ SignSucceeded
//!    │                     └─────┘                        ▼
//!    └──────────────────── Reset ◄──────────────────── Complete
//! ```
//!
//! `SignRequested` is refused for categories excluded by [`crate::policy`].
//! While `Signing`, every event except the outcome of the running attempt is
//! refused, so one workflow never runs two attempts at once.

use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};

use super::{SignatureRecord, SigningSession};
use crate::anchor::{AnchorClient, AnchorRecord, AnchorRequest, DocumentMetadata};
use crate::cancel::Cancellation;
use crate::crypto::{Fingerprint, FingerprintEngine};
use crate::error::{InklessError, Result};
use crate::policy;
use crate::signing::offline::OfflineQueue;
use crate::transport::Relay;

/// Where the document bytes come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentSource {
    /// Bytes already in memory
    Bytes(Vec<u8>),
    /// A file read (streamed) at signing time
    File(PathBuf),
}

/// The document the user picked
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedDocument {
    /// Content
    pub source: DocumentSource,
    /// Category and file details
    pub metadata: DocumentMetadata,
}

impl SelectedDocument {
    /// In-memory document
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, category: impl Into<String>) -> Self {
        let bytes = bytes.into();
        let mut metadata = DocumentMetadata::with_category(category);
        metadata.file_size = Some(crate::anchor::format_size(bytes.len() as u64));
        SelectedDocument {
            source: DocumentSource::Bytes(bytes),
            metadata,
        }
    }

    /// Document on disk; name and size are filled in when available
    pub fn from_file(path: impl Into<PathBuf>, category: impl Into<String>) -> Self {
        let path = path.into();
        let mut metadata = DocumentMetadata::with_category(category);
        metadata.file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        metadata.file_size = std::fs::metadata(&path)
            .ok()
            .map(|m| crate::anchor::format_size(m.len()));
        SelectedDocument {
            source: DocumentSource::File(path),
            metadata,
        }
    }

    fn fingerprint(&self, engine: &FingerprintEngine) -> Result<Fingerprint> {
        match &self.source {
            DocumentSource::Bytes(bytes) => Ok(engine.fingerprint(bytes)),
            DocumentSource::File(path) => Ok(engine.fingerprint_file(path)?),
        }
    }
}

/// Result of a successful attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedOutcome {
    /// The signature
    pub record: SignatureRecord,
    /// The anchor; `None` when signed offline
    pub anchor: Option<AnchorRecord>,
}

/// Workflow state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SigningState {
    /// Nothing selected
    Idle,
    /// A document is selected
    ContentSelected(SelectedDocument),
    /// An attempt is running
    Signing(SelectedDocument),
    /// The attempt succeeded
    Complete(Box<SignedOutcome>),
}

impl SigningState {
    fn name(&self) -> &'static str {
        match self {
            SigningState::Idle => "idle",
            SigningState::ContentSelected(_) => "content_selected",
            SigningState::Signing(_) => "signing",
            SigningState::Complete(_) => "complete",
        }
    }
}

impl fmt::Display for SigningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Discrete workflow events
#[derive(Debug)]
pub enum WorkflowEvent {
    /// The user picked a document
    ContentChosen(SelectedDocument),
    /// The user asked to sign
    SignRequested,
    /// The running attempt succeeded
    SignSucceeded(Box<SignedOutcome>),
    /// The running attempt failed
    SignFailed(InklessError),
    /// Start over
    Reset,
}

impl WorkflowEvent {
    fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::ContentChosen(_) => "ContentChosen",
            WorkflowEvent::SignRequested => "SignRequested",
            WorkflowEvent::SignSucceeded(_) => "SignSucceeded",
            WorkflowEvent::SignFailed(_) => "SignFailed",
            WorkflowEvent::Reset => "Reset",
        }
    }
}

/// Signing state machine for one user
#[derive(Debug)]
pub struct SigningWorkflow {
    state: SigningState,
    last_error: Option<InklessError>,
    fingerprints: FingerprintEngine,
}

impl Default for SigningWorkflow {
    fn default() -> Self {
        Self::new(FingerprintEngine::default())
    }
}

impl SigningWorkflow {
    /// Workflow fingerprinting with `fingerprints`
    pub fn new(fingerprints: FingerprintEngine) -> Self {
        SigningWorkflow {
            state: SigningState::Idle,
            last_error: None,
            fingerprints,
        }
    }

    /// Current state
    pub fn state(&self) -> &SigningState {
        &self.state
    }

    /// Error of the last failed attempt, cleared by the next transition out of `ContentSelected`
    pub fn last_error(&self) -> Option<&InklessError> {
        self.last_error.as_ref()
    }

    /// Apply one event
    pub fn handle(&mut self, event: WorkflowEvent) -> Result<()> {
        let state = std::mem::replace(&mut self.state, SigningState::Idle);
        let (next, result) = self.transition(state, event);
        self.state = next;
        result
    }

    fn transition(&mut self, state: SigningState, event: WorkflowEvent) -> (SigningState, Result<()>) {
        match (state, event) {
            (SigningState::Idle | SigningState::ContentSelected(_), WorkflowEvent::ContentChosen(doc)) => {
                self.last_error = None;
                (SigningState::ContentSelected(doc), Ok(()))
            }
            (SigningState::ContentSelected(doc), WorkflowEvent::SignRequested) => {
                match policy::check(&doc.metadata.category) {
                    Ok(_) => {
                        self.last_error = None;
                        (SigningState::Signing(doc), Ok(()))
                    }
                    Err(e) => {
                        warn!(category = %doc.metadata.category, "signing refused by category policy");
                        self.last_error = Some(e.clone());
                        (SigningState::ContentSelected(doc), Err(e))
                    }
                }
            }
            (SigningState::Signing(_), WorkflowEvent::SignSucceeded(outcome)) => {
                (SigningState::Complete(outcome), Ok(()))
            }
            (SigningState::Signing(doc), WorkflowEvent::SignFailed(err)) => {
                self.last_error = Some(err);
                (SigningState::ContentSelected(doc), Ok(()))
            }
            (state @ SigningState::Signing(_), event) => {
                let err = Self::invalid(&state, &event);
                (state, Err(err))
            }
            (_, WorkflowEvent::Reset) => {
                self.last_error = None;
                (SigningState::Idle, Ok(()))
            }
            (state, event) => {
                let err = Self::invalid(&state, &event);
                (state, Err(err))
            }
        }
    }

    fn invalid(state: &SigningState, event: &WorkflowEvent) -> InklessError {
        InklessError::InvalidTransition {
            state: state.to_string(),
            event: event.name().to_string(),
        }
    }

    fn selected(&self) -> Option<&SelectedDocument> {
        match &self.state {
            SigningState::Signing(doc) => Some(doc),
            _ => None,
        }
    }

    /// Fingerprint, generate a key, sign, and submit the anchor
    ///
    /// On failure the workflow is back in `ContentSelected` with the error
    /// available from [`last_error`](Self::last_error) and also returned.
    pub async fn sign<R: Relay>(
        &mut self,
        session: &mut SigningSession,
        client: &AnchorClient<R>,
        cancel: &Cancellation,
    ) -> Result<&SignedOutcome> {
        self.handle(WorkflowEvent::SignRequested)?;
        let doc = self.selected().cloned().ok_or_else(|| InklessError::InvalidTransition {
            state: self.state.to_string(),
            event: "sign".to_string(),
        })?;

        let attempt = async {
            let record = self.produce_signature(&doc, session, cancel)?;
            let request = AnchorRequest::from_record(&record, doc.metadata.clone());
            let anchor = client.submit_cancellable(request, cancel).await?;
            Ok(SignedOutcome {
                record,
                anchor: Some(anchor),
            })
        }
        .await;

        self.finish(attempt)
    }

    /// Fingerprint, generate a key and sign, then queue for a later sync
    pub fn sign_offline(
        &mut self,
        session: &mut SigningSession,
        queue: &mut OfflineQueue,
        cancel: &Cancellation,
    ) -> Result<&SignedOutcome> {
        self.handle(WorkflowEvent::SignRequested)?;
        let doc = self.selected().cloned().ok_or_else(|| InklessError::InvalidTransition {
            state: self.state.to_string(),
            event: "sign_offline".to_string(),
        })?;

        let attempt = self
            .produce_signature(&doc, session, cancel)
            .and_then(|record| {
                queue.push(record.clone(), doc.metadata.clone())?;
                Ok(SignedOutcome {
                    record,
                    anchor: None,
                })
            });

        self.finish(attempt)
    }

    fn produce_signature(
        &self,
        doc: &SelectedDocument,
        session: &mut SigningSession,
        cancel: &Cancellation,
    ) -> Result<SignatureRecord> {
        cancel.check()?;
        let fingerprint = doc.fingerprint(&self.fingerprints)?;
        cancel.check()?;
        if !session.has_key() {
            session.generate_key_pair()?;
        }
        cancel.check()?;
        let record = session.sign(&fingerprint)?;
        cancel.check()?;
        Ok(record)
    }

    fn finish(&mut self, attempt: Result<SignedOutcome>) -> Result<&SignedOutcome> {
        match attempt {
            Ok(outcome) => {
                info!(
                    fingerprint = %outcome.record.fingerprint.short(),
                    signer = %outcome.record.signer_identity,
                    anchored = outcome.anchor.is_some(),
                    "signing attempt complete"
                );
                self.handle(WorkflowEvent::SignSucceeded(Box::new(outcome)))?;
                match &self.state {
                    SigningState::Complete(outcome) => Ok(outcome.as_ref()),
                    other => Err(InklessError::InvalidTransition {
                        state: other.to_string(),
                        event: "SignSucceeded".to_string(),
                    }),
                }
            }
            Err(e) => {
                warn!(error = %e, "signing attempt failed");
                self.handle(WorkflowEvent::SignFailed(e.clone()))?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Scheme;
    use std::sync::Arc;

    fn doc(category: &str) -> SelectedDocument {
        SelectedDocument::from_bytes(b"terms".to_vec(), category)
    }

    #[test]
    fn test_happy_transitions() {
        let mut wf = SigningWorkflow::default();
        assert_eq!(wf.state(), &SigningState::Idle);
        wf.handle(WorkflowEvent::ContentChosen(doc("general_contract"))).unwrap();
        assert_eq!(wf.state().to_string(), "content_selected");
        wf.handle(WorkflowEvent::SignRequested).unwrap();
        assert_eq!(wf.state().to_string(), "signing");
    }

    #[test]
    fn test_sign_requested_needs_content() {
        let mut wf = SigningWorkflow::default();
        assert!(matches!(
            wf.handle(WorkflowEvent::SignRequested),
            Err(InklessError::InvalidTransition { .. })
        ));
        assert_eq!(wf.state(), &SigningState::Idle);
    }

    #[test]
    fn test_excluded_category_stays_selected() {
        let mut wf = SigningWorkflow::default();
        wf.handle(WorkflowEvent::ContentChosen(doc("will"))).unwrap();
        assert!(matches!(
            wf.handle(WorkflowEvent::SignRequested),
            Err(InklessError::PolicyExcluded { .. })
        ));
        assert_eq!(wf.state().to_string(), "content_selected");
        assert!(matches!(wf.last_error(), Some(InklessError::PolicyExcluded { .. })));
    }

    #[test]
    fn test_no_second_signing() {
        let mut wf = SigningWorkflow::default();
        wf.handle(WorkflowEvent::ContentChosen(doc(""))).unwrap();
        wf.handle(WorkflowEvent::SignRequested).unwrap();
        assert!(matches!(
            wf.handle(WorkflowEvent::SignRequested),
            Err(InklessError::InvalidTransition { .. })
        ));
        assert!(wf.handle(WorkflowEvent::Reset).is_err());
        assert_eq!(wf.state().to_string(), "signing");
    }

    #[test]
    fn test_failure_returns_to_selected_with_error() {
        let mut wf = SigningWorkflow::default();
        wf.handle(WorkflowEvent::ContentChosen(doc(""))).unwrap();
        wf.handle(WorkflowEvent::SignRequested).unwrap();
        wf.handle(WorkflowEvent::SignFailed(InklessError::Cancelled)).unwrap();
        assert_eq!(wf.state().to_string(), "content_selected");
        assert!(matches!(wf.last_error(), Some(InklessError::Cancelled)));
    }

    #[test]
    fn test_offline_sign_completes_and_queues() {
        let mut wf = SigningWorkflow::default();
        let mut session = SigningSession::with_scheme(Arc::new(Ed25519Scheme::new()));
        let mut queue = OfflineQueue::in_memory();

        wf.handle(WorkflowEvent::ContentChosen(doc("invoice"))).unwrap();
        let outcome = wf
            .sign_offline(&mut session, &mut queue, &Cancellation::never())
            .unwrap()
            .clone();
        assert!(outcome.anchor.is_none());
        assert!(outcome.record.verify());
        assert_eq!(queue.len(), 1);
        assert_eq!(wf.state().to_string(), "complete");

        // A fresh attempt starts from Idle
        assert!(wf.handle(WorkflowEvent::ContentChosen(doc(""))).is_err());
        wf.handle(WorkflowEvent::Reset).unwrap();
        assert_eq!(wf.state(), &SigningState::Idle);
    }

    #[test]
    fn test_unreadable_file_is_fingerprint_error() {
        let mut wf = SigningWorkflow::default();
        let mut session = SigningSession::with_scheme(Arc::new(Ed25519Scheme::new()));
        let mut queue = OfflineQueue::in_memory();

        wf.handle(WorkflowEvent::ContentChosen(SelectedDocument::from_file(
            "/nonexistent/inkless/contract.pdf",
            "",
        )))
        .unwrap();
        let err = wf
            .sign_offline(&mut session, &mut queue, &Cancellation::never())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Fingerprint);
        assert!(matches!(wf.last_error(), Some(InklessError::Fingerprint(_))));
        assert_eq!(wf.state().to_string(), "content_selected");
        assert!(queue.is_empty());
    }
}
