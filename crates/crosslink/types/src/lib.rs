//! Crosslink Types - shared identifiers and records.
//!
//! Domain vocabulary for the linking service: the primary identity (the
//! requester's chat-platform account), the secondary identity (the game
//! account being linked), and the verification records that carry a link
//! request from initiation to completion.

#![deny(unsafe_code)]

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::{
    is_valid_secondary_id, is_valid_secondary_name, normalize_secondary_id, sanitize_tag,
};

/// Identifier of the initiating platform's account (primary key of a link).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryId(pub String);
impl PrimaryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}
impl std::fmt::Display for PrimaryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the second platform's account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecondaryId(pub String);
impl SecondaryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}
impl std::fmt::Display for SecondaryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Length of every verification code.
pub const CODE_LENGTH: usize = 6;

/// Alphabet codes are drawn from. Uppercase alphanumerics, 36 symbols:
/// 36^6 distinct codes, far beyond any live pending population.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A short-lived single-use verification code.
///
/// Codes are stored and compared in a single case: construction trims the
/// input and uppercases it, so lookups are case-insensitive by design.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Normalize a submitted code: trim surrounding whitespace, uppercase.
    pub fn normalized(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    /// Whether the normalized code has the expected length and alphabet.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == CODE_LENGTH && self.0.bytes().all(|b| CODE_ALPHABET.contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Redacted rendering for log sinks: first two characters, rest elided.
    pub fn redacted(&self) -> String {
        let visible: String = self.0.chars().take(2).collect();
        format!("{visible}****")
    }
}

impl std::fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One linked (or not-yet-linked) principal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub primary_id: PrimaryId,
    /// Display tag snapshot of the primary identity, refreshed on contact.
    pub display_tag: String,
    pub secondary_id: Option<SecondaryId>,
    pub secondary_name: Option<String>,
    /// True iff `secondary_id` is set and the link was verified.
    pub linked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdentityRecord {
    /// Fresh unlinked record for a first-contact primary identity.
    pub fn unlinked(primary_id: PrimaryId, display_tag: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            primary_id,
            display_tag: display_tag.into(),
            secondary_id: None,
            secondary_name: None,
            linked: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lifecycle of a verification record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Pending,
    Completed,
    Expired,
}

/// One in-flight proof-of-control attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub code: VerificationCode,
    pub owner: PrimaryId,
    pub target_secondary_id: SecondaryId,
    pub target_secondary_name: String,
    pub status: VerificationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationRecord {
    /// Open a pending record with a fixed TTL from `now`.
    pub fn open(
        owner: PrimaryId,
        target_secondary_id: SecondaryId,
        target_secondary_name: impl Into<String>,
        code: VerificationCode,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            code,
            owner,
            target_secondary_id,
            target_secondary_name: target_secondary_name.into(),
            status: VerificationStatus::Pending,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// A record counts as live while pending and not yet past expiry.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == VerificationStatus::Pending && now < self.expires_at
    }
}

/// Single-use session token for game-side handoff.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub owner: PrimaryId,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl SessionToken {
    /// Issue a fresh token for `owner`, valid for `ttl` from `now`.
    pub fn issue(owner: PrimaryId, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            owner,
            expires_at: now + ttl,
            used: false,
        }
    }
}

/// Link state of one requester, as reported to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    NoLink,
    Pending {
        target_name: String,
    },
    Linked {
        target_name: String,
        linked_at: DateTime<Utc>,
    },
}

/// Aggregate counts over identity records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub total: u64,
    pub linked: u64,
    pub unlinked: u64,
}
