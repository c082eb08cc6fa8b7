use crate::model::{AuditAppend, AuditRecord, QueryWindow, SweepOutcome};
use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosslink_types::{
    IdentityRecord, LinkStats, PrimaryId, SecondaryId, SessionToken, VerificationCode,
    VerificationRecord,
};

/// Storage interface for the durable primary/secondary identity mapping.
///
/// `commit_link` is the single mutation path that can set `linked = true`;
/// it re-checks secondary uniqueness at commit time so racing completions
/// for the same secondary identity cannot both succeed.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up a record by the initiating platform's identifier.
    async fn find_by_primary(&self, id: &PrimaryId) -> StorageResult<Option<IdentityRecord>>;

    /// Look up the record currently holding a secondary identifier.
    async fn find_by_secondary(&self, id: &SecondaryId) -> StorageResult<Option<IdentityRecord>>;

    /// Create the record if absent, else refresh the display tag only.
    /// Never touches link state. Idempotent.
    async fn upsert_primary(
        &self,
        id: &PrimaryId,
        display_tag: &str,
    ) -> StorageResult<IdentityRecord>;

    /// Atomically bind a secondary identity to `primary`.
    ///
    /// Fails with `Conflict` when another record already holds
    /// `secondary`, and `NotFound` when `primary` has no record.
    async fn commit_link(
        &self,
        primary: &PrimaryId,
        secondary: &SecondaryId,
        secondary_name: &str,
    ) -> StorageResult<IdentityRecord>;

    /// Clear the secondary binding. No-op-safe when already unlinked;
    /// returns the record's resulting state, or `None` for an unknown id.
    async fn unlink(&self, primary: &PrimaryId) -> StorageResult<Option<IdentityRecord>>;

    /// Total and linked record counts.
    async fn stats(&self) -> StorageResult<LinkStats>;
}

/// Storage interface for in-flight verification records.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Insert a freshly opened record.
    ///
    /// Fails with `Conflict` when the code collides with a live record;
    /// the caller regenerates and retries rather than overwriting.
    async fn create_verification(&self, record: VerificationRecord) -> StorageResult<()>;

    /// Lookup by code (codes are normalized before they get here).
    async fn find_by_code(
        &self,
        code: &VerificationCode,
    ) -> StorageResult<Option<VerificationRecord>>;

    /// The owner's live pending record, if any.
    async fn find_pending_by_owner(
        &self,
        owner: &PrimaryId,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<VerificationRecord>>;

    /// Atomically complete a pending verification and commit the link.
    ///
    /// Fails `NotFound` for an unknown code, `InvariantViolation` for a
    /// non-pending record, `Expired` past the TTL, and `Conflict` when the
    /// target secondary identity is already bound elsewhere. On `Conflict`
    /// the record remains pending; the status flip and the identity commit
    /// are one transaction.
    async fn complete_verification(
        &self,
        code: &VerificationCode,
        now: DateTime<Utc>,
    ) -> StorageResult<IdentityRecord>;

    /// Eagerly lapse the owner's pending records, returning how many were
    /// transitioned. Used when a new link request supersedes a prior one.
    async fn expire_pending_for_owner(
        &self,
        owner: &PrimaryId,
        now: DateTime<Utc>,
    ) -> StorageResult<u64>;

    /// Bulk-transition lapsed pending records to expired and purge dead
    /// session tokens. Never touches completed records; idempotent.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> StorageResult<SweepOutcome>;
}

/// Storage interface for single-use session tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a freshly issued token; `Conflict` on a duplicate token.
    async fn issue_token(&self, token: SessionToken) -> StorageResult<()>;

    /// Redeem a token exactly once, returning its owner.
    ///
    /// Fails `NotFound` for an unknown token, `InvariantViolation` when
    /// already used, `Expired` past the TTL.
    async fn redeem_token(&self, token: &str, now: DateTime<Utc>) -> StorageResult<PrimaryId>;
}

/// Storage interface for append-only audit events.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an event and return the canonical, hash-linked stored record.
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditRecord>;

    /// Read events newest-first.
    async fn list_audit(&self, window: QueryWindow) -> StorageResult<Vec<AuditRecord>>;
}

/// Unified storage bundle consumed by the linking orchestrator.
pub trait LinkStorage:
    IdentityStore + VerificationStore + TokenStore + AuditStore + Send + Sync
{
}

impl<T> LinkStorage for T where
    T: IdentityStore + VerificationStore + TokenStore + AuditStore + Send + Sync
{
}
