//! Verification: rebuild a verdict from the registry
//!
//! Verification is a pure read. It looks up every entry for a fingerprint,
//! keeps the first entry per signer identity, and reports them in the order
//! the ledger recorded them. A fingerprint with no entries is a valid
//! negative answer (`not_found`); a ledger failure is an error.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crypto::{Fingerprint, PublicKey, SignatureBytes, SignerIdentity};
use crate::error::{InklessError, Result};
use crate::registry::{RegistryEntry, RegistryLedger, TxRef};
use crate::signing::verify_detached;

/// One signer of a document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerInfo {
    /// Signer identity
    pub identity: SignerIdentity,
    /// When the anchor was submitted
    pub timestamp: DateTime<Utc>,
    /// Ledger transaction that recorded it
    pub ledger_tx_ref: TxRef,
}

impl From<RegistryEntry> for SignerInfo {
    fn from(entry: RegistryEntry) -> Self {
        SignerInfo {
            identity: entry.signer,
            timestamp: entry.timestamp,
            ledger_tx_ref: entry.ledger_tx_ref,
        }
    }
}

/// Verdict status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// At least one signer is on record
    Anchored,
    /// Nothing on record
    NotFound,
}

/// Verdict for a fingerprint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    /// Fingerprint that was checked
    pub fingerprint: Fingerprint,
    /// Whether any signer is on record
    pub is_valid: bool,
    /// Signers in submission order, one per identity
    pub signers: Vec<SignerInfo>,
    /// Status
    pub status: VerificationStatus,
}

impl VerificationResult {
    fn from_entries(fingerprint: Fingerprint, entries: Vec<RegistryEntry>) -> Self {
        let mut seen = HashSet::new();
        let signers: Vec<SignerInfo> = entries
            .into_iter()
            .filter(|e| seen.insert(e.signer.clone()))
            .map(SignerInfo::from)
            .collect();

        let is_valid = !signers.is_empty();
        VerificationResult {
            fingerprint,
            is_valid,
            signers,
            status: if is_valid {
                VerificationStatus::Anchored
            } else {
                VerificationStatus::NotFound
            },
        }
    }

    /// Earliest signer
    pub fn first_signer(&self) -> Option<&SignerInfo> {
        self.signers.first()
    }

    /// Rebuild a verdict from a relay response
    pub fn from_response(fingerprint: Fingerprint, response: VerifyResponse) -> Self {
        let signers = match (response.signers, response.signer, response.timestamp, response.ledger_tx) {
            (Some(signers), _, _, _) => signers,
            (None, Some(signer), Some(timestamp), Some(ledger_tx)) => {
                match SignerIdentity::parse(&signer) {
                    Ok(identity) => vec![SignerInfo {
                        identity,
                        timestamp,
                        ledger_tx_ref: TxRef::new(ledger_tx),
                    }],
                    Err(_) => Vec::new(),
                }
            }
            _ => Vec::new(),
        };
        // The signer list is authoritative; a flag without signers is not a verdict
        let is_valid = !signers.is_empty();
        VerificationResult {
            fingerprint,
            is_valid,
            signers,
            status: if is_valid {
                VerificationStatus::Anchored
            } else {
                VerificationStatus::NotFound
            },
        }
    }
}

/// Wire form of a verdict
///
/// `signer`, `timestamp` and `ledgerTx` describe the first signer for
/// clients that only understand single-signer documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether any signer is on record
    pub is_valid: bool,
    /// First signer identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    /// All signers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signers: Option<Vec<SignerInfo>>,
    /// Number of signers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_count: Option<usize>,
    /// First signer's timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// First signer's ledger transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_tx: Option<String>,
    /// Status
    pub status: VerificationStatus,
}

impl From<&VerificationResult> for VerifyResponse {
    fn from(result: &VerificationResult) -> Self {
        if !result.is_valid {
            return VerifyResponse {
                is_valid: false,
                signer: None,
                signers: None,
                signer_count: None,
                timestamp: None,
                ledger_tx: None,
                status: VerificationStatus::NotFound,
            };
        }
        let first = result.first_signer();
        VerifyResponse {
            is_valid: true,
            signer: first.map(|s| s.identity.to_string()),
            signers: Some(result.signers.clone()),
            signer_count: Some(result.signers.len()),
            timestamp: first.map(|s| s.timestamp),
            ledger_tx: first.map(|s| s.ledger_tx_ref.to_string()),
            status: result.status,
        }
    }
}

/// Looks fingerprints up on the registry
#[derive(Clone)]
pub struct VerificationService {
    ledger: Arc<dyn RegistryLedger>,
}

impl VerificationService {
    /// Service reading from `ledger`
    pub fn new(ledger: Arc<dyn RegistryLedger>) -> Self {
        VerificationService { ledger }
    }

    /// Verdict for a fingerprint
    ///
    /// `Ok` with `not_found` when nothing is on record; `Err` only when the
    /// ledger could not be read.
    pub async fn verify(&self, fingerprint: &Fingerprint) -> Result<VerificationResult> {
        let entries = self.ledger.lookup(fingerprint).await?;
        let result = VerificationResult::from_entries(fingerprint.clone(), entries);
        if result.is_valid {
            info!(fingerprint = %fingerprint.short(), signers = result.signers.len(), "fingerprint verified");
        } else {
            debug!(fingerprint = %fingerprint.short(), "fingerprint not found");
        }
        Ok(result)
    }

    /// Like [`verify`](Self::verify), but a missing fingerprint is [`InklessError::NotFound`]
    pub async fn require_signed(&self, fingerprint: &Fingerprint) -> Result<VerificationResult> {
        let result = self.verify(fingerprint).await?;
        if !result.is_valid {
            return Err(InklessError::NotFound {
                fingerprint: fingerprint.to_hex(),
            });
        }
        Ok(result)
    }

    /// Re-check a signature against a public key, without touching the ledger
    pub fn verify_signature(&self, fingerprint: &Fingerprint, signature: &SignatureBytes, public_key: &PublicKey) -> bool {
        verify_detached(fingerprint, signature, public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AnchorWrite, Authority, InMemoryLedger};

    async fn anchored(signers: &[&str]) -> (VerificationService, Fingerprint, Vec<TxRef>) {
        let relay = Authority::new("relay");
        let ledger = Arc::new(InMemoryLedger::new(relay.clone()));
        let fp = Fingerprint::from_hex("abc123").unwrap();
        let mut txs = Vec::new();
        for signer in signers {
            let tx = ledger
                .anchor(
                    &relay,
                    AnchorWrite {
                        fingerprint: fp.clone(),
                        signer: SignerIdentity::parse(signer).unwrap(),
                        signature_commitment: "0x00".into(),
                    },
                )
                .await
                .unwrap();
            txs.push(tx);
        }
        (VerificationService::new(ledger), fp, txs)
    }

    #[tokio::test]
    async fn test_not_found() {
        let (service, _, _) = anchored(&[]).await;
        let fp = Fingerprint::from_hex("00000000").unwrap();
        let result = service.verify(&fp).await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.status, VerificationStatus::NotFound);

        let response = VerifyResponse::from(&result);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"isValid": false, "status": "not_found"}));

        assert!(matches!(
            service.require_signed(&fp).await,
            Err(InklessError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_multiple_signers_in_order() {
        let (service, fp, txs) = anchored(&["did:x:1", "did:x:2"]).await;
        let result = service.verify(&fp).await.unwrap();
        assert!(result.is_valid);
        assert_eq!(result.signers.len(), 2);
        assert_eq!(result.signers[0].identity.as_str(), "did:x:1");
        assert_eq!(result.signers[1].identity.as_str(), "did:x:2");
        assert_eq!(result.signers[1].ledger_tx_ref, txs[1]);

        let response = VerifyResponse::from(&result);
        assert_eq!(response.signer.as_deref(), Some("did:x:1"));
        assert_eq!(response.ledger_tx.as_deref(), Some(txs[0].as_str()));
        assert_eq!(response.signer_count, Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_identity_keeps_first() {
        let (service, fp, txs) = anchored(&["did:x:1", "did:x:2", "did:x:1"]).await;
        let result = service.verify(&fp).await.unwrap();
        assert_eq!(result.signers.len(), 2);
        assert_eq!(result.signers[0].ledger_tx_ref, txs[0]);
    }

    #[tokio::test]
    async fn test_ledger_error_is_not_not_found() {
        let ledger = Arc::new(InMemoryLedger::new(Authority::new("relay")));
        ledger.set_offline(true);
        let service = VerificationService::new(ledger);
        let err = service
            .verify(&Fingerprint::from_hex("abcd").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, InklessError::Ledger(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_response_round_trip_keeps_signers() {
        let (service, fp, _) = anchored(&["did:x:1", "did:x:2"]).await;
        let result = service.verify(&fp).await.unwrap();
        let rebuilt = VerificationResult::from_response(fp.clone(), VerifyResponse::from(&result));
        assert_eq!(rebuilt, result);
    }

    #[test]
    fn test_response_without_signer_details_is_not_valid() {
        let fp = Fingerprint::from_hex("abc123").unwrap();
        let response = VerifyResponse {
            is_valid: true,
            signer: Some("did:x:1".to_string()),
            signers: None,
            signer_count: Some(1),
            timestamp: None,
            ledger_tx: None,
            status: VerificationStatus::Anchored,
        };
        let result = VerificationResult::from_response(fp, response);
        assert!(!result.is_valid);
        assert!(result.signers.is_empty());
        assert_eq!(result.status, VerificationStatus::NotFound);
        assert!(result.first_signer().is_none());
    }

    #[test]
    fn test_response_with_single_signer_fields_is_valid() {
        let fp = Fingerprint::from_hex("abc123").unwrap();
        let response = VerifyResponse {
            is_valid: true,
            signer: Some("did:x:1".to_string()),
            signers: None,
            signer_count: Some(1),
            timestamp: Some(Utc::now()),
            ledger_tx: Some("0xfeed".to_string()),
            status: VerificationStatus::Anchored,
        };
        let result = VerificationResult::from_response(fp, response);
        assert!(result.is_valid);
        assert_eq!(result.signers[0].ledger_tx_ref.as_str(), "0xfeed");
    }
}
