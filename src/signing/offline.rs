//! Signatures produced without a connection
//!
//! Offline signatures are kept in a JSON file until the user explicitly
//! syncs them. Nothing is retried in the background: a failed item simply
//! stays queued for the next manual sync.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::SignatureRecord;
use crate::anchor::{AnchorClient, AnchorRequest, DocumentMetadata};
use crate::error::Result;
use crate::relay::{SyncOutcome, SyncResult};
use crate::transport::Relay;

/// A signature waiting to be anchored
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSignature {
    /// The signature
    pub record: SignatureRecord,
    /// Document details to send along
    pub metadata: DocumentMetadata,
    /// When it was queued
    pub queued_at: DateTime<Utc>,
}

impl QueuedSignature {
    fn to_request(&self) -> AnchorRequest {
        AnchorRequest::from_record(&self.record, self.metadata.clone())
    }

    fn matches(&self, result: &SyncResult) -> bool {
        self.record.fingerprint == result.fingerprint && self.record.signer_identity == result.signer_identity
    }
}

/// Summary of one sync run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Newly anchored
    pub synced: usize,
    /// Already on record
    pub already_exists: usize,
    /// Still queued
    pub failed: usize,
    /// Per-item results from the relay
    pub results: Vec<SyncResult>,
}

/// Queue of offline signatures, optionally backed by a file
#[derive(Debug, Default)]
pub struct OfflineQueue {
    path: Option<PathBuf>,
    items: Vec<QueuedSignature>,
}

impl OfflineQueue {
    /// Queue that is never written to disk
    pub fn in_memory() -> Self {
        OfflineQueue::default()
    }

    /// Load the queue stored at `path`; a missing file is an empty queue
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items: Vec<QueuedSignature> = if path.exists() {
            let json = fs::read_to_string(&path)?;
            serde_json::from_str(&json)?
        } else {
            Vec::new()
        };
        debug!(path = %path.display(), count = items.len(), "offline queue loaded");
        Ok(OfflineQueue {
            path: Some(path),
            items,
        })
    }

    /// Queued items, oldest first
    pub fn items(&self) -> &[QueuedSignature] {
        &self.items
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Queue a signature and persist
    ///
    /// A signature for the same (fingerprint, signer) already in the queue
    /// is not queued twice. If the queue cannot be written the item is not
    /// kept in memory either.
    pub fn push(&mut self, record: SignatureRecord, metadata: DocumentMetadata) -> Result<()> {
        let duplicate = self.items.iter().any(|q| {
            q.record.fingerprint == record.fingerprint && q.record.signer_identity == record.signer_identity
        });
        if duplicate {
            debug!(fingerprint = %record.fingerprint.short(), "signature already queued");
            return Ok(());
        }
        self.items.push(QueuedSignature {
            record,
            metadata,
            queued_at: Utc::now(),
        });
        if let Err(e) = self.save() {
            self.items.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Requests for every queued item
    pub fn to_requests(&self) -> Vec<AnchorRequest> {
        self.items.iter().map(QueuedSignature::to_request).collect()
    }

    /// Drop the items the relay accepted (or already had) and persist
    pub fn apply(&mut self, results: &[SyncResult]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for result in results {
            match result.outcome {
                SyncOutcome::Synced => report.synced += 1,
                SyncOutcome::AlreadyExists => report.already_exists += 1,
                SyncOutcome::Failed => report.failed += 1,
            }
        }
        self.items.retain(|item| {
            !results
                .iter()
                .any(|r| r.outcome != SyncOutcome::Failed && item.matches(r))
        });
        report.results = results.to_vec();
        self.save()?;
        Ok(report)
    }

    /// Submit everything queued in one batch
    pub async fn sync<R: Relay>(&mut self, client: &AnchorClient<R>) -> Result<SyncReport> {
        if self.items.is_empty() {
            return Ok(SyncReport::default());
        }
        let results = client.sync(self.to_requests()).await?;
        let report = self.apply(&results)?;
        info!(
            synced = report.synced,
            already_exists = report.already_exists,
            failed = report.failed,
            remaining = self.items.len(),
            "offline sync finished"
        );
        Ok(report)
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.items)?;
        fs::write(path, json)?;
        Ok(())
    }
}
