use crate::PlatformResult;
use async_trait::async_trait;
use crosslink_types::SecondaryId;
use serde::{Deserialize, Serialize};

/// A resolved secondary-platform account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryProfile {
    pub id: SecondaryId,
    /// The platform's canonical spelling of the account name.
    pub canonical_name: String,
}

/// Game-server liveness snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub online: bool,
    pub players: u32,
    pub max_players: u32,
}

/// Name-to-identity resolution against the platform's account directory.
#[async_trait]
pub trait SecondaryDirectory: Send + Sync {
    /// Resolve a claimed account name; `None` when no such account exists.
    async fn resolve_by_name(&self, name: &str) -> PlatformResult<Option<SecondaryProfile>>;
}

/// Liveness check: is the account currently present on the server?
///
/// Presence proves the requester controls a live session, not merely
/// knowledge of the account name.
#[async_trait]
pub trait PresenceProbe: Send + Sync {
    async fn is_present(&self, canonical_name: &str) -> PlatformResult<bool>;
}

/// Best-effort out-of-band message delivery to a present account.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Returns whether the platform accepted the message.
    async fn deliver(&self, canonical_name: &str, text: &str) -> PlatformResult<bool>;
}

/// Aggregate server health, used by the admin surface.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn server_status(&self) -> PlatformResult<ServerStatus>;
}

/// Bundle trait for everything the orchestrator needs from the platform.
pub trait SecondaryPlatform:
    SecondaryDirectory + PresenceProbe + MessagingChannel + StatusProbe + Send + Sync
{
}

impl<T> SecondaryPlatform for T where
    T: SecondaryDirectory + PresenceProbe + MessagingChannel + StatusProbe + Send + Sync
{
}
