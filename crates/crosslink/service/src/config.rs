//! Orchestrator configuration, one section per concern.

use crosslink_guard::RateLimitPolicy;
use crosslink_types::PrimaryId;
use serde::{Deserialize, Serialize};

/// Complete service configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LinkServiceConfig {
    pub verification: VerificationConfig,
    pub tokens: TokenConfig,
    pub rate_limit: RateLimitPolicy,
    pub admin: AdminPolicy,
}

/// Verification-code policy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Validity window of an issued code.
    pub ttl_minutes: i64,
    /// Bounded regeneration attempts when a generated code collides with
    /// a live record.
    pub max_code_attempts: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 30,
            max_code_attempts: 5,
        }
    }
}

/// Session-token policy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TokenConfig {
    pub ttl_minutes: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self { ttl_minutes: 15 }
    }
}

/// Who may call the admin surface.
///
/// Policy configuration, not core logic: the orchestrator only consults
/// the predicate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AdminPolicy {
    pub admin_users: Vec<String>,
    pub admin_roles: Vec<String>,
}

impl AdminPolicy {
    /// A caller is authorized when listed directly or holding any
    /// configured admin role.
    pub fn is_authorized(&self, caller: &PrimaryId, roles: &[String]) -> bool {
        self.admin_users.iter().any(|user| *user == caller.0)
            || self
                .admin_roles
                .iter()
                .any(|admin_role| roles.iter().any(|role| role == admin_role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_policy_matches_users_and_roles() {
        let policy = AdminPolicy {
            admin_users: vec!["u-admin".to_string()],
            admin_roles: vec!["moderator".to_string()],
        };

        assert!(policy.is_authorized(&PrimaryId::new("u-admin"), &[]));
        assert!(policy.is_authorized(
            &PrimaryId::new("u-other"),
            &["member".to_string(), "moderator".to_string()]
        ));
        assert!(!policy.is_authorized(&PrimaryId::new("u-other"), &["member".to_string()]));
    }

    #[test]
    fn empty_policy_authorizes_nobody() {
        let policy = AdminPolicy::default();
        assert!(!policy.is_authorized(&PrimaryId::new("anyone"), &["any".to_string()]));
    }
}
