//! # Inkless
//!
//! Sign documents without sending them anywhere.
//!
//! ## Features
//!
//! - **Local fingerprinting**: documents never leave the device, only a
//!   32-byte digest does
//! - **Signer-held keys**: Ed25519 by default, ML-DSA-65 with the `pq` feature
//! - **Public anchoring** of (fingerprint, signer, time) through a relay
//! - **Verification** of any document against the public registry
//! - **Offline signing** with explicit, idempotent sync
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use inkless::{
//!     cancel::Cancellation, AnchorClient, Authority, InMemoryLedger, LocalRelay, RelayService,
//!     SchemePreference, SelectedDocument, SigningSession, SigningWorkflow, WorkflowEvent,
//! };
//!
//! # async fn demo() -> inkless::Result<()> {
//! let authority = Authority::new("relay");
//! let ledger = Arc::new(InMemoryLedger::new(authority.clone()));
//! let relay = LocalRelay::spawn(Arc::new(RelayService::new(ledger, authority)));
//! let client = AnchorClient::new(relay);
//!
//! let mut session = SigningSession::open(SchemePreference::PreferPostQuantum)?;
//! let mut workflow = SigningWorkflow::default();
//! workflow.handle(WorkflowEvent::ContentChosen(SelectedDocument::from_bytes(
//!     b"I agree to these terms".to_vec(),
//!     "nda",
//! )))?;
//! let outcome = workflow.sign(&mut session, &client, &Cancellation::never()).await?;
//! println!("anchored as {}", outcome.record.fingerprint);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              APPLICATION LAYER              │
//! │        inkless CLI  |  inkless-relay        │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │               CLIENT LAYER                  │
//! │  Workflow | Session | Offline queue | Verify│
//! └─────────────────────┬───────────────────────┘
//!                       │  RelayMessage (JSON)
//! ┌─────────────────────▼───────────────────────┐
//! │             TRANSPORT LAYER                 │
//! │        WebSocket  |  In-process             │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │          RELAY + REGISTRY LAYER             │
//! │  Policy | Idempotency | Ledger confirmation │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod anchor;
pub mod cancel;
pub mod config;
pub mod crypto;
pub mod error;
pub mod policy;
pub mod registry;
pub mod relay;
pub mod signing;
pub mod transport;
pub mod verify;

// Re-export main types at crate root
pub use anchor::{AnchorClient, AnchorRecord, AnchorRequest, AnchorResponse, AnchorStatus, DocumentMetadata};
pub use crypto::{
    Fingerprint, FingerprintAlgorithm, FingerprintEngine, KeyPair, PublicKey, SchemeId, SchemePreference,
    SignatureBytes, SignerIdentity,
};
pub use error::{ErrorKind, InklessError, Result};
pub use registry::{Authority, InMemoryLedger, RegistryEntry, RegistryLedger, TxRef};
pub use relay::{RelayMessage, RelayService};
pub use signing::{
    OfflineQueue, SelectedDocument, SignatureEngine, SignatureRecord, SigningSession, SigningState, SigningWorkflow,
    WorkflowEvent,
};
pub use transport::{LocalRelay, Relay, WebSocketRelay};
pub use verify::{VerificationResult, VerificationService, VerificationStatus};
