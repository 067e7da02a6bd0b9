//! In-memory registry ledger
//!
//! Behaves like the on-chain registry as far as the protocol can observe:
//! owner-only appends, open reads, submission-order entries, and a
//! confirmation delay before a write becomes visible.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{
    AnchorWrite, Authority, Confirmation, LedgerError, LedgerResult, RegistryEntry,
    RegistryLedger, TxRef,
};
use crate::crypto::Fingerprint;

struct PendingWrite {
    tx: TxRef,
    write: AnchorWrite,
    submitted_at: DateTime<Utc>,
    visible_at: Instant,
}

#[derive(Default)]
struct LedgerState {
    entries: HashMap<Fingerprint, Vec<RegistryEntry>>,
    pending: VecDeque<PendingWrite>,
    transactions: HashMap<TxRef, Confirmation>,
    sequence: u64,
}

impl LedgerState {
    /// Move every write whose confirmation delay has elapsed into the registry
    fn settle(&mut self, now: Instant) {
        while let Some(front) = self.pending.front() {
            if front.visible_at > now {
                break;
            }
            let Some(pending) = self.pending.pop_front() else {
                break;
            };
            let entry = RegistryEntry {
                signer: pending.write.signer,
                timestamp: pending.submitted_at,
                ledger_tx_ref: pending.tx.clone(),
                signature_commitment: pending.write.signature_commitment,
            };
            self.entries
                .entry(pending.write.fingerprint)
                .or_default()
                .push(entry);
            self.transactions
                .insert(pending.tx, Confirmation::Confirmed { at: Utc::now() });
        }
    }
}

/// Registry ledger held in process memory
pub struct InMemoryLedger {
    owner: Authority,
    confirmation_delay: Duration,
    offline: AtomicBool,
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    /// Ledger whose writes confirm immediately
    pub fn new(owner: Authority) -> Self {
        Self::with_confirmation_delay(owner, Duration::ZERO)
    }

    /// Ledger whose writes confirm after `delay`
    pub fn with_confirmation_delay(owner: Authority, delay: Duration) -> Self {
        InMemoryLedger {
            owner,
            confirmation_delay: delay,
            offline: AtomicBool::new(false),
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Simulate losing (or regaining) connectivity to the ledger node
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> LedgerResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("ledger node unreachable".to_string()));
        }
        Ok(())
    }

    fn transaction_ref(write: &AnchorWrite, sequence: u64) -> TxRef {
        let mut hasher = blake3::Hasher::new();
        hasher.update(write.fingerprint.as_bytes());
        hasher.update(write.signer.as_str().as_bytes());
        hasher.update(write.signature_commitment.as_bytes());
        hasher.update(&sequence.to_le_bytes());
        TxRef::new(format!("0x{}", hasher.finalize().to_hex()))
    }
}

#[async_trait]
impl RegistryLedger for InMemoryLedger {
    async fn owner(&self) -> LedgerResult<Authority> {
        self.ensure_online()?;
        Ok(self.owner.clone())
    }

    async fn anchor(&self, caller: &Authority, write: AnchorWrite) -> LedgerResult<TxRef> {
        self.ensure_online()?;
        if caller != &self.owner {
            return Err(LedgerError::Unauthorized {
                caller: caller.to_string(),
            });
        }

        let mut state = self.state.write().await;
        state.sequence += 1;
        let tx = Self::transaction_ref(&write, state.sequence);

        debug!(tx = %tx, fingerprint = %write.fingerprint, "ledger write submitted");
        state.transactions.insert(tx.clone(), Confirmation::Pending);
        state.pending.push_back(PendingWrite {
            tx: tx.clone(),
            write,
            submitted_at: Utc::now(),
            visible_at: Instant::now() + self.confirmation_delay,
        });
        state.settle(Instant::now());

        if let Some(Confirmation::Confirmed { .. }) = state.transactions.get(&tx) {
            info!(tx = %tx, "ledger write confirmed");
        }
        Ok(tx)
    }

    async fn confirmation(&self, tx: &TxRef) -> LedgerResult<Confirmation> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        state.settle(Instant::now());
        state
            .transactions
            .get(tx)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownTransaction(tx.to_string()))
    }

    async fn lookup(&self, fingerprint: &Fingerprint) -> LedgerResult<Vec<RegistryEntry>> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        state.settle(Instant::now());
        Ok(state.entries.get(fingerprint).cloned().unwrap_or_default())
    }
}
