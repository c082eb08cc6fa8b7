use chrono::{DateTime, Utc};
use crosslink_types::PrimaryId;
use serde::{Deserialize, Serialize};

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

/// An audit event as submitted by the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditAppend {
    pub timestamp: DateTime<Utc>,
    /// Short action tag, e.g. `link_initiated`, `accounts_unlinked`.
    pub action: String,
    /// The primary identity the event concerns, when there is one.
    pub subject: Option<PrimaryId>,
    pub details: serde_json::Value,
}

/// A stored audit event, hash-linked to its predecessor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub subject: Option<PrimaryId>,
    pub details: serde_json::Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}

/// Counts reported by one expiry sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// Pending verifications transitioned to expired.
    pub expired_verifications: u64,
    /// Session tokens purged because they were used or past their TTL.
    pub purged_tokens: u64,
}
