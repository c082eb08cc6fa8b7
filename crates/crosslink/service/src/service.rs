//! The linking state machine: `NoLink -> PendingVerification -> Linked`,
//! with expiry and explicit unlink as the only ways back.

use crate::codes::generate_code;
use crate::config::LinkServiceConfig;
use crate::error::{LinkError, LinkResult};
use chrono::{DateTime, Duration, Utc};
use crosslink_guard::SlidingWindowLimiter;
use crosslink_platform::{SecondaryPlatform, ServerStatus};
use crosslink_storage::{AuditAppend, LinkStorage, StorageError, SweepOutcome};
use crosslink_types::{
    is_valid_secondary_name, sanitize_tag, IdentityRecord, LinkStats, LinkStatus, PrimaryId,
    SecondaryId, SessionToken, VerificationCode, VerificationRecord,
};
use serde_json::json;
use std::sync::Arc;

/// Maximum length of a stored display tag.
const DISPLAY_TAG_MAX_LEN: usize = 100;

/// Outcome of a successful `initiate_link`.
#[derive(Clone, Debug)]
pub struct LinkStarted {
    pub target_name: String,
    pub code: VerificationCode,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a successful completion.
#[derive(Clone, Debug)]
pub struct LinkCompleted {
    pub identity: IdentityRecord,
}

/// Outcome of a successful unlink.
#[derive(Clone, Debug)]
pub struct Unlinked {
    pub previous_name: String,
}

/// Link state of a secondary identity, as reported to the game side.
#[derive(Clone, Debug, Default)]
pub struct SecondaryLinkStatus {
    pub linked: bool,
    pub display_tag: Option<String>,
    pub linked_at: Option<DateTime<Utc>>,
}

/// The linking orchestrator.
///
/// Stateless per request: every call is independent and tolerates
/// arbitrary interleaving. The stores arbitrate all durable invariants;
/// the limiter is the only in-process shared state.
pub struct LinkService {
    storage: Arc<dyn LinkStorage>,
    platform: Arc<dyn SecondaryPlatform>,
    limiter: Arc<SlidingWindowLimiter>,
    config: LinkServiceConfig,
}

impl LinkService {
    pub fn new(
        storage: Arc<dyn LinkStorage>,
        platform: Arc<dyn SecondaryPlatform>,
        limiter: Arc<SlidingWindowLimiter>,
        config: LinkServiceConfig,
    ) -> Self {
        Self {
            storage,
            platform,
            limiter,
            config,
        }
    }

    /// Start a link: verify the claimed secondary account exists, is
    /// unclaimed and present, then open a verification and deliver its
    /// code out-of-band.
    pub async fn initiate_link(
        &self,
        requester: &PrimaryId,
        display_tag: &str,
        claimed_name: &str,
    ) -> LinkResult<LinkStarted> {
        if !self.limiter.admit(&requester.0) {
            return Err(LinkError::RateLimited);
        }

        let claimed = claimed_name.trim();
        if !is_valid_secondary_name(claimed) {
            return Err(LinkError::InvalidName(claimed.to_string()));
        }

        let existing = self
            .storage
            .find_by_primary(requester)
            .await
            .map_err(|err| self.internal("initiate_link", Some(requester), err))?;
        if let Some(existing) = existing {
            if existing.linked {
                return Err(LinkError::AlreadyLinked {
                    target_name: existing.secondary_name.unwrap_or_default(),
                });
            }
        }

        let profile = match self.platform.resolve_by_name(claimed).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return Err(LinkError::TargetNotFound(claimed.to_string())),
            Err(err) => {
                tracing::warn!(requester = %requester, error = %err, "directory unreachable");
                return Err(LinkError::TargetNotReachable(claimed.to_string()));
            }
        };

        let holder = self
            .storage
            .find_by_secondary(&profile.id)
            .await
            .map_err(|err| self.internal("initiate_link", Some(requester), err))?;
        if let Some(holder) = holder {
            if holder.primary_id != *requester {
                return Err(LinkError::TargetAlreadyLinked(profile.canonical_name));
            }
        }

        // Presence proves control of a live session, not just knowledge of
        // the name. Fail closed on any probe error.
        let present = self
            .platform
            .is_present(&profile.canonical_name)
            .await
            .unwrap_or(false);
        if !present {
            return Err(LinkError::TargetNotReachable(profile.canonical_name));
        }

        let tag = sanitize_tag(display_tag, DISPLAY_TAG_MAX_LEN);
        self.storage
            .upsert_primary(requester, &tag)
            .await
            .map_err(|err| self.internal("initiate_link", Some(requester), err))?;

        let now = Utc::now();
        let superseded = self
            .storage
            .expire_pending_for_owner(requester, now)
            .await
            .map_err(|err| self.internal("initiate_link", Some(requester), err))?;
        if superseded > 0 {
            tracing::info!(requester = %requester, superseded, "prior pending link superseded");
        }

        let ttl = Duration::minutes(self.config.verification.ttl_minutes);
        let record = self.open_verification(requester, &profile.id, &profile.canonical_name, now, ttl).await?;

        let text = format!(
            "Your verification code is {}. It expires in {} minutes.",
            record.code, self.config.verification.ttl_minutes
        );
        let delivered = self
            .platform
            .deliver(&profile.canonical_name, &text)
            .await
            .unwrap_or(false);
        if !delivered {
            // The opened record stays pending: retrying delivery of the
            // same code is a valid recovery path.
            tracing::warn!(
                requester = %requester,
                target = %profile.canonical_name,
                code = %record.code.redacted(),
                "code delivery failed"
            );
            return Err(LinkError::DeliveryFailed(profile.canonical_name));
        }

        tracing::info!(
            requester = %requester,
            target = %profile.canonical_name,
            code = %record.code.redacted(),
            "verification started"
        );
        self.audit(
            "link_initiated",
            Some(requester.clone()),
            json!({
                "secondary_id": profile.id.0.clone(),
                "secondary_name": profile.canonical_name.clone(),
                "code": record.code.as_str(),
                "expires_at": record.expires_at,
            }),
        )
        .await;

        Ok(LinkStarted {
            target_name: profile.canonical_name,
            code: record.code,
            expires_at: record.expires_at,
        })
    }

    /// Complete a link from the requester's side with a submitted code.
    pub async fn complete_link(
        &self,
        requester: &PrimaryId,
        submitted_code: &str,
    ) -> LinkResult<LinkCompleted> {
        if !self.limiter.admit(&requester.0) {
            return Err(LinkError::RateLimited);
        }

        let code = VerificationCode::normalized(submitted_code);
        if !code.is_well_formed() {
            return Err(LinkError::InvalidCode);
        }

        let record = self
            .storage
            .find_by_code(&code)
            .await
            .map_err(|err| self.internal("complete_link", Some(requester), err))?
            .ok_or(LinkError::InvalidOrExpired)?;

        // A leaked code must not let another identity finish the link.
        if record.owner != *requester {
            return Err(LinkError::OwnerMismatch);
        }

        let identity = self.finish_completion(&code, &record, "requester").await?;

        // Best-effort success notification; the link is already durable.
        let text = format!("Account linked to {}.", identity.display_tag);
        if let Err(err) = self.platform.deliver(&record.target_secondary_name, &text).await {
            tracing::warn!(target = %record.target_secondary_name, error = %err, "success notice undelivered");
        }

        Ok(LinkCompleted { identity })
    }

    /// Complete a link submitted from the game side: the submitting
    /// session must match the record's target identity exactly.
    pub async fn complete_from_secondary(
        &self,
        secondary_id: &SecondaryId,
        secondary_name: &str,
        submitted_code: &str,
    ) -> LinkResult<LinkCompleted> {
        let code = VerificationCode::normalized(submitted_code);
        if !code.is_well_formed() {
            return Err(LinkError::InvalidCode);
        }

        let record = self
            .storage
            .find_by_code(&code)
            .await
            .map_err(|err| self.internal("complete_from_secondary", None, err))?
            .ok_or(LinkError::InvalidOrExpired)?;

        if record.target_secondary_id != *secondary_id
            || record.target_secondary_name != secondary_name
        {
            return Err(LinkError::OwnerMismatch);
        }

        let identity = self.finish_completion(&code, &record, "secondary").await?;
        Ok(LinkCompleted { identity })
    }

    /// Remove an existing link, reporting the previous target name.
    pub async fn unlink(&self, requester: &PrimaryId) -> LinkResult<Unlinked> {
        if !self.limiter.admit(&requester.0) {
            return Err(LinkError::RateLimited);
        }

        let existing = self
            .storage
            .find_by_primary(requester)
            .await
            .map_err(|err| self.internal("unlink", Some(requester), err))?;
        let Some(existing) = existing.filter(|record| record.linked) else {
            return Err(LinkError::NothingToUnlink);
        };
        let previous_name = existing.secondary_name.unwrap_or_default();

        self.storage
            .unlink(requester)
            .await
            .map_err(|err| self.internal("unlink", Some(requester), err))?;

        tracing::info!(requester = %requester, previous = %previous_name, "accounts unlinked");
        self.audit(
            "accounts_unlinked",
            Some(requester.clone()),
            json!({ "previous_secondary_name": previous_name.clone() }),
        )
        .await;

        Ok(Unlinked { previous_name })
    }

    /// The requester's current link state.
    pub async fn status(&self, requester: &PrimaryId) -> LinkResult<LinkStatus> {
        let record = self
            .storage
            .find_by_primary(requester)
            .await
            .map_err(|err| self.internal("status", Some(requester), err))?;

        if let Some(record) = record {
            if record.linked {
                return Ok(LinkStatus::Linked {
                    target_name: record.secondary_name.unwrap_or_default(),
                    linked_at: record.updated_at,
                });
            }
        }

        let pending = self
            .storage
            .find_pending_by_owner(requester, Utc::now())
            .await
            .map_err(|err| self.internal("status", Some(requester), err))?;
        Ok(match pending {
            Some(pending) => LinkStatus::Pending {
                target_name: pending.target_secondary_name,
            },
            None => LinkStatus::NoLink,
        })
    }

    /// Link state of a secondary identity, for game-side greetings.
    pub async fn secondary_status(
        &self,
        secondary_id: &SecondaryId,
    ) -> LinkResult<SecondaryLinkStatus> {
        let record = self
            .storage
            .find_by_secondary(secondary_id)
            .await
            .map_err(|err| self.internal("secondary_status", None, err))?;
        Ok(match record.filter(|record| record.linked) {
            Some(record) => SecondaryLinkStatus {
                linked: true,
                display_tag: Some(record.display_tag),
                linked_at: Some(record.updated_at),
            },
            None => SecondaryLinkStatus::default(),
        })
    }

    /// Issue a single-use session token for game-side handoff.
    pub async fn issue_session_token(&self, requester: &PrimaryId) -> LinkResult<SessionToken> {
        let token = SessionToken::issue(
            requester.clone(),
            Utc::now(),
            Duration::minutes(self.config.tokens.ttl_minutes),
        );
        self.storage
            .issue_token(token.clone())
            .await
            .map_err(|err| self.internal("issue_session_token", Some(requester), err))?;

        self.audit(
            "token_issued",
            Some(requester.clone()),
            json!({ "expires_at": token.expires_at }),
        )
        .await;
        Ok(token)
    }

    /// Redeem a session token exactly once, returning its owner.
    pub async fn redeem_session_token(&self, token: &str) -> LinkResult<PrimaryId> {
        let owner = match self.storage.redeem_token(token, Utc::now()).await {
            Ok(owner) => owner,
            Err(
                StorageError::NotFound(_)
                | StorageError::InvariantViolation(_)
                | StorageError::Expired(_),
            ) => return Err(LinkError::InvalidOrExpired),
            Err(err) => return Err(self.internal("redeem_session_token", None, err)),
        };

        self.audit("token_redeemed", Some(owner.clone()), json!({})).await;
        Ok(owner)
    }

    /// Aggregate link counts. Admin-only.
    pub async fn admin_stats(
        &self,
        caller: &PrimaryId,
        roles: &[String],
    ) -> LinkResult<LinkStats> {
        self.authorize(caller, roles)?;
        self.storage
            .stats()
            .await
            .map_err(|err| self.internal("admin_stats", Some(caller), err))
    }

    /// Run the expiry sweep over verifications, tokens, and the limiter's
    /// key map. Admin-only; safe to repeat.
    pub async fn admin_sweep(
        &self,
        caller: &PrimaryId,
        roles: &[String],
    ) -> LinkResult<SweepOutcome> {
        self.authorize(caller, roles)?;

        let outcome = self
            .storage
            .sweep_expired(Utc::now())
            .await
            .map_err(|err| self.internal("admin_sweep", Some(caller), err))?;
        self.limiter.sweep();

        tracing::info!(
            expired = outcome.expired_verifications,
            purged = outcome.purged_tokens,
            "expiry sweep complete"
        );
        self.audit(
            "admin_sweep",
            Some(caller.clone()),
            json!({
                "expired_verifications": outcome.expired_verifications,
                "purged_tokens": outcome.purged_tokens,
            }),
        )
        .await;
        Ok(outcome)
    }

    /// Game-server health snapshot. Admin-only; an unreachable server
    /// reads as offline.
    pub async fn admin_server_status(
        &self,
        caller: &PrimaryId,
        roles: &[String],
    ) -> LinkResult<ServerStatus> {
        self.authorize(caller, roles)?;
        match self.platform.server_status().await {
            Ok(status) => Ok(status),
            Err(err) => {
                tracing::warn!(error = %err, "server status probe failed");
                Ok(ServerStatus::default())
            }
        }
    }

    fn authorize(&self, caller: &PrimaryId, roles: &[String]) -> LinkResult<()> {
        if self.config.admin.is_authorized(caller, roles) {
            Ok(())
        } else {
            Err(LinkError::NotAuthorized)
        }
    }

    async fn open_verification(
        &self,
        requester: &PrimaryId,
        secondary_id: &SecondaryId,
        secondary_name: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> LinkResult<VerificationRecord> {
        let max_attempts = self.config.verification.max_code_attempts.max(1);
        for attempt in 1..=max_attempts {
            let code = {
                // ThreadRng is not Send; keep it out of the await below.
                let mut rng = rand::thread_rng();
                generate_code(&mut rng)
            };
            let record = VerificationRecord::open(
                requester.clone(),
                secondary_id.clone(),
                secondary_name,
                code,
                now,
                ttl,
            );
            match self.storage.create_verification(record.clone()).await {
                Ok(()) => return Ok(record),
                Err(StorageError::Conflict(_)) => {
                    tracing::warn!(requester = %requester, attempt, "code collision, regenerating");
                }
                Err(err) => return Err(self.internal("initiate_link", Some(requester), err)),
            }
        }
        Err(LinkError::Internal(
            "could not allocate a fresh verification code".to_string(),
        ))
    }

    async fn finish_completion(
        &self,
        code: &VerificationCode,
        record: &VerificationRecord,
        source: &str,
    ) -> LinkResult<IdentityRecord> {
        let identity = match self.storage.complete_verification(code, Utc::now()).await {
            Ok(identity) => identity,
            Err(
                StorageError::NotFound(_)
                | StorageError::InvariantViolation(_)
                | StorageError::Expired(_),
            ) => return Err(LinkError::InvalidOrExpired),
            Err(StorageError::Conflict(_)) => {
                return Err(LinkError::TargetAlreadyLinked(
                    record.target_secondary_name.clone(),
                ))
            }
            Err(err) => return Err(self.internal("complete_link", Some(&record.owner), err)),
        };

        tracing::info!(
            requester = %record.owner,
            target = %record.target_secondary_name,
            source,
            "verification completed"
        );
        self.audit(
            "link_completed",
            Some(record.owner.clone()),
            json!({
                "secondary_id": record.target_secondary_id.0.clone(),
                "secondary_name": record.target_secondary_name.clone(),
                "source": source,
            }),
        )
        .await;
        Ok(identity)
    }

    /// Best-effort audit append: an audit failure is logged, never turned
    /// into an operation failure.
    async fn audit(&self, action: &str, subject: Option<PrimaryId>, details: serde_json::Value) {
        let event = AuditAppend {
            timestamp: Utc::now(),
            action: action.to_string(),
            subject,
            details,
        };
        if let Err(err) = self.storage.append_audit(event).await {
            tracing::warn!(action, error = %err, "audit append failed");
        }
    }

    fn internal(
        &self,
        operation: &str,
        requester: Option<&PrimaryId>,
        err: StorageError,
    ) -> LinkError {
        tracing::error!(
            operation,
            requester = requester.map(|id| id.0.as_str()).unwrap_or("-"),
            error = %err,
            "storage failure"
        );
        LinkError::Internal(err.to_string())
    }
}
