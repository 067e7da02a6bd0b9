//! Document category policy
//!
//! Whether a kind of document may be signed electronically at all is a legal
//! question, not a cryptographic one. Categories flagged [`WarningLevel::Danger`]
//! are excluded; the client workflow and the relay both refuse them.

use serde::{Deserialize, Serialize};

use crate::error::{InklessError, Result};

/// Category used when none is given
pub const DEFAULT_CATEGORY: &str = "general_contract";

/// How strongly a category's notice should be shown
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    /// Informational legal basis
    Info,
    /// E-signing may not be sufficient on its own
    Warning,
    /// E-signing is not legally valid; excluded
    Danger,
}

/// A known document category
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocumentCategory {
    /// Stable identifier used on the wire
    pub id: &'static str,
    /// Display name
    pub label: &'static str,
    /// Notice level
    pub level: WarningLevel,
    /// Notice shown to the signer
    pub notice: &'static str,
}

const CATEGORIES: &[DocumentCategory] = &[
    DocumentCategory {
        id: "general_contract",
        label: "General Contract",
        level: WarningLevel::Info,
        notice: "Legal Basis: Evidence Act 2011 (S.84-93); Cybercrimes Act 2015 (S.17)",
    },
    DocumentCategory {
        id: "loan_agreement",
        label: "Loan Agreement",
        level: WarningLevel::Info,
        notice: "Legal Basis: Evidence Act 2011 (S.84-93)",
    },
    DocumentCategory {
        id: "lease_short",
        label: "Short-Term Lease (<3 years)",
        level: WarningLevel::Info,
        notice: "Legal Basis: Cybercrimes Act 2015 (S.17)",
    },
    DocumentCategory {
        id: "invoice",
        label: "Invoice / Payment Acknowledgment",
        level: WarningLevel::Info,
        notice: "Legal Basis: Commercial practice; Evidence Act",
    },
    DocumentCategory {
        id: "gift_deed",
        label: "Gift Deed",
        level: WarningLevel::Warning,
        notice: "Gift deeds may require physical execution, witness attestation, and registration at the Lands Registry.",
    },
    DocumentCategory {
        id: "power_of_attorney_land",
        label: "Power of Attorney (Land-Related)",
        level: WarningLevel::Warning,
        notice: "Powers of Attorney affecting land must typically be registered at the State Lands Registry.",
    },
    DocumentCategory {
        id: "affidavit",
        label: "Affidavit / Statutory Declaration",
        level: WarningLevel::Warning,
        notice: "Affidavits must be sworn in person before a Notary Public or Commissioner for Oaths.",
    },
    DocumentCategory {
        id: "marriage_contract",
        label: "Marriage or Prenuptial Agreement",
        level: WarningLevel::Warning,
        notice: "Family law documents often require judicial review, notarization, or customary formalities.",
    },
    DocumentCategory {
        id: "adoption",
        label: "Adoption Papers",
        level: WarningLevel::Warning,
        notice: "Adoption requires court approval; electronic signing is not recognized for final orders.",
    },
    DocumentCategory {
        id: "will",
        label: "Will or Codicil",
        level: WarningLevel::Danger,
        notice: "Wills must be signed in wet ink in the physical presence of two witnesses.",
    },
    DocumentCategory {
        id: "land_deed",
        label: "Land Deed / Conveyance",
        level: WarningLevel::Danger,
        notice: "Land transactions require physical execution, notarization, and registration.",
    },
];

/// All built-in categories
pub fn categories() -> &'static [DocumentCategory] {
    CATEGORIES
}

/// Canonical form of a category id: trimmed, lowercase, `-` as `_`, empty as the default
pub fn normalize(id: &str) -> String {
    let id = id.trim();
    if id.is_empty() {
        return DEFAULT_CATEGORY.to_string();
    }
    id.to_lowercase().replace('-', "_")
}

/// Look up a built-in category
pub fn find(id: &str) -> Option<&'static DocumentCategory> {
    let id = normalize(id);
    CATEGORIES.iter().find(|c| c.id == id)
}

/// Notice level for a category; `None` for unknown categories
pub fn warning_level(id: &str) -> Option<WarningLevel> {
    find(id).map(|c| c.level)
}

/// Whether documents of this category must not be signed electronically
pub fn is_excluded(id: &str) -> bool {
    warning_level(id) == Some(WarningLevel::Danger)
}

/// Display name, falling back to Title Case of the id
pub fn category_label(id: &str) -> String {
    if let Some(category) = find(id) {
        return category.label.to_string();
    }
    if id.trim().is_empty() {
        return "Unknown Category".to_string();
    }
    id.trim()
        .split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a category and reject it if excluded
pub fn check(id: &str) -> Result<String> {
    let id = normalize(id);
    if is_excluded(&id) {
        return Err(InklessError::PolicyExcluded { category: id });
    }
    Ok(id)
}
