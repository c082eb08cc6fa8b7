//! In-memory reference implementation of the link storage traits.
//!
//! All tables live behind one lock so the cross-table operations
//! (`complete_verification`) execute as a single critical section, giving
//! the same linearizability a serializable transaction would.

use crate::model::{AuditAppend, AuditRecord, QueryWindow, SweepOutcome};
use crate::traits::{AuditStore, IdentityStore, TokenStore, VerificationStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosslink_types::{
    IdentityRecord, LinkStats, PrimaryId, SecondaryId, SessionToken, VerificationCode,
    VerificationRecord, VerificationStatus,
};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    /// Keyed by primary identifier.
    identities: HashMap<String, IdentityRecord>,
    /// Keyed by normalized code.
    verifications: HashMap<String, VerificationRecord>,
    /// Keyed by token string.
    tokens: HashMap<String, SessionToken>,
    audits: Vec<AuditRecord>,
}

/// In-memory link storage adapter.
#[derive(Default)]
pub struct InMemoryLinkStorage {
    state: RwLock<State>,
}

impl InMemoryLinkStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn commit_link_locked(
    state: &mut State,
    primary: &PrimaryId,
    secondary: &SecondaryId,
    secondary_name: &str,
    now: DateTime<Utc>,
) -> StorageResult<IdentityRecord> {
    let holder = state
        .identities
        .values()
        .find(|record| record.secondary_id.as_ref() == Some(secondary));
    if let Some(holder) = holder {
        if holder.primary_id != *primary {
            return Err(StorageError::Conflict(format!(
                "secondary identity {} is already linked",
                secondary
            )));
        }
    }

    let record = state
        .identities
        .get_mut(&primary.0)
        .ok_or_else(|| StorageError::NotFound(format!("identity {} not found", primary)))?;

    record.secondary_id = Some(secondary.clone());
    record.secondary_name = Some(secondary_name.to_string());
    record.linked = true;
    record.updated_at = now;
    Ok(record.clone())
}

#[async_trait]
impl IdentityStore for InMemoryLinkStorage {
    async fn find_by_primary(&self, id: &PrimaryId) -> StorageResult<Option<IdentityRecord>> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;
        Ok(state.identities.get(&id.0).cloned())
    }

    async fn find_by_secondary(&self, id: &SecondaryId) -> StorageResult<Option<IdentityRecord>> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;
        Ok(state
            .identities
            .values()
            .find(|record| record.secondary_id.as_ref() == Some(id))
            .cloned())
    }

    async fn upsert_primary(
        &self,
        id: &PrimaryId,
        display_tag: &str,
    ) -> StorageResult<IdentityRecord> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;

        let record = state
            .identities
            .entry(id.0.clone())
            .or_insert_with(|| IdentityRecord::unlinked(id.clone(), display_tag));
        if record.display_tag != display_tag {
            record.display_tag = display_tag.to_string();
            record.updated_at = Utc::now();
        }
        Ok(record.clone())
    }

    async fn commit_link(
        &self,
        primary: &PrimaryId,
        secondary: &SecondaryId,
        secondary_name: &str,
    ) -> StorageResult<IdentityRecord> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;
        commit_link_locked(&mut state, primary, secondary, secondary_name, Utc::now())
    }

    async fn unlink(&self, primary: &PrimaryId) -> StorageResult<Option<IdentityRecord>> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;

        let Some(record) = state.identities.get_mut(&primary.0) else {
            return Ok(None);
        };
        if record.linked || record.secondary_id.is_some() {
            record.secondary_id = None;
            record.secondary_name = None;
            record.linked = false;
            record.updated_at = Utc::now();
        }
        Ok(Some(record.clone()))
    }

    async fn stats(&self) -> StorageResult<LinkStats> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;
        let total = state.identities.len() as u64;
        let linked = state.identities.values().filter(|r| r.linked).count() as u64;
        Ok(LinkStats {
            total,
            linked,
            unlinked: total - linked,
        })
    }
}

#[async_trait]
impl VerificationStore for InMemoryLinkStorage {
    async fn create_verification(&self, record: VerificationRecord) -> StorageResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;

        if let Some(existing) = state.verifications.get(record.code.as_str()) {
            if existing.is_live(record.created_at) {
                return Err(StorageError::Conflict(format!(
                    "code {} collides with a live record",
                    record.code.redacted()
                )));
            }
        }
        state
            .verifications
            .insert(record.code.as_str().to_string(), record);
        Ok(())
    }

    async fn find_by_code(
        &self,
        code: &VerificationCode,
    ) -> StorageResult<Option<VerificationRecord>> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;
        Ok(state.verifications.get(code.as_str()).cloned())
    }

    async fn find_pending_by_owner(
        &self,
        owner: &PrimaryId,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<VerificationRecord>> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;
        Ok(state
            .verifications
            .values()
            .filter(|record| record.owner == *owner && record.is_live(now))
            .max_by_key(|record| record.created_at)
            .cloned())
    }

    async fn complete_verification(
        &self,
        code: &VerificationCode,
        now: DateTime<Utc>,
    ) -> StorageResult<IdentityRecord> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;

        let (status, expires_at, owner, secondary, secondary_name) = {
            let record = state
                .verifications
                .get(code.as_str())
                .ok_or_else(|| StorageError::NotFound(format!("code {}", code.redacted())))?;
            (
                record.status,
                record.expires_at,
                record.owner.clone(),
                record.target_secondary_id.clone(),
                record.target_secondary_name.clone(),
            )
        };

        if status != VerificationStatus::Pending {
            return Err(StorageError::InvariantViolation(format!(
                "code {} is not pending",
                code.redacted()
            )));
        }
        if now >= expires_at {
            // Read-after-expiry lapses the record; the sweep would do the
            // same on its own schedule.
            if let Some(record) = state.verifications.get_mut(code.as_str()) {
                record.status = VerificationStatus::Expired;
            }
            return Err(StorageError::Expired(format!("code {}", code.redacted())));
        }

        // One critical section: a commit failure leaves the record pending.
        let identity = commit_link_locked(&mut state, &owner, &secondary, &secondary_name, now)?;

        if let Some(record) = state.verifications.get_mut(code.as_str()) {
            record.status = VerificationStatus::Completed;
        }
        Ok(identity)
    }

    async fn expire_pending_for_owner(
        &self,
        owner: &PrimaryId,
        now: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;

        let mut expired = 0;
        for record in state.verifications.values_mut() {
            if record.owner == *owner && record.is_live(now) {
                record.status = VerificationStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> StorageResult<SweepOutcome> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;

        let mut outcome = SweepOutcome::default();
        for record in state.verifications.values_mut() {
            if record.status == VerificationStatus::Pending && record.expires_at < now {
                record.status = VerificationStatus::Expired;
                outcome.expired_verifications += 1;
            }
        }

        let before = state.tokens.len();
        state
            .tokens
            .retain(|_, token| !token.used && token.expires_at >= now);
        outcome.purged_tokens = (before - state.tokens.len()) as u64;

        Ok(outcome)
    }
}

#[async_trait]
impl TokenStore for InMemoryLinkStorage {
    async fn issue_token(&self, token: SessionToken) -> StorageResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;

        if state.tokens.contains_key(&token.token) {
            return Err(StorageError::Conflict("token already issued".to_string()));
        }
        state.tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn redeem_token(&self, token: &str, now: DateTime<Utc>) -> StorageResult<PrimaryId> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;

        let stored = state
            .tokens
            .get_mut(token)
            .ok_or_else(|| StorageError::NotFound("unknown token".to_string()))?;

        if stored.used {
            return Err(StorageError::InvariantViolation(
                "token already redeemed".to_string(),
            ));
        }
        if now >= stored.expires_at {
            return Err(StorageError::Expired("token past its TTL".to_string()));
        }
        stored.used = true;
        Ok(stored.owner.clone())
    }
}

#[async_trait]
impl AuditStore for InMemoryLinkStorage {
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditRecord> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;

        let previous_hash = state.audits.last().map(|e| e.hash.clone());
        let sequence = state.audits.len() as u64 + 1;
        let hash = compute_audit_hash(&event, previous_hash.as_deref(), sequence)?;

        let record = AuditRecord {
            event_id: format!("audit-{}", Uuid::new_v4()),
            sequence,
            timestamp: event.timestamp,
            action: event.action,
            subject: event.subject,
            details: event.details,
            previous_hash,
            hash,
        };

        state.audits.push(record.clone());
        Ok(record)
    }

    async fn list_audit(&self, window: QueryWindow) -> StorageResult<Vec<AuditRecord>> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("state lock poisoned".to_string()))?;
        let mut values = state.audits.clone();
        values.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(apply_window(values, window))
    }
}

fn compute_audit_hash(
    event: &AuditAppend,
    previous_hash: Option<&str>,
    sequence: u64,
) -> StorageResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "timestamp": event.timestamp,
        "action": event.action,
        "subject": event.subject.as_ref().map(|id| id.0.clone()),
        "details": event.details,
    });
    let serialized = serde_json::to_vec(&serializable)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}
