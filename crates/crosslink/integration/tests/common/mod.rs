//! Shared fixtures for the end-to-end tests.

use async_trait::async_trait;
use crosslink_guard::{RateLimitPolicy, SlidingWindowLimiter};
use crosslink_platform::{
    MessagingChannel, PlatformResult, PresenceProbe, SecondaryDirectory, SecondaryProfile,
    ServerStatus, StatusProbe,
};
use crosslink_service::{LinkService, LinkServiceConfig};
use crosslink_storage::memory::InMemoryLinkStorage;
use crosslink_types::SecondaryId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A secondary platform where every registered account is present and
/// every delivery succeeds.
pub struct StubPlatform {
    profiles: HashMap<String, SecondaryProfile>,
}

impl StubPlatform {
    pub fn with_accounts(accounts: &[(&str, &str)]) -> Self {
        let profiles = accounts
            .iter()
            .map(|(id, name)| {
                (
                    name.to_lowercase(),
                    SecondaryProfile {
                        id: SecondaryId::new(*id),
                        canonical_name: name.to_string(),
                    },
                )
            })
            .collect();
        Self { profiles }
    }
}

#[async_trait]
impl SecondaryDirectory for StubPlatform {
    async fn resolve_by_name(&self, name: &str) -> PlatformResult<Option<SecondaryProfile>> {
        Ok(self.profiles.get(&name.to_lowercase()).cloned())
    }
}

#[async_trait]
impl PresenceProbe for StubPlatform {
    async fn is_present(&self, _canonical_name: &str) -> PlatformResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl MessagingChannel for StubPlatform {
    async fn deliver(&self, _canonical_name: &str, _text: &str) -> PlatformResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl StatusProbe for StubPlatform {
    async fn server_status(&self) -> PlatformResult<ServerStatus> {
        Ok(ServerStatus {
            online: true,
            players: 1,
            max_players: 10,
        })
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Service wired with in-memory storage, the stub platform, and a
/// generous limiter.
pub fn service_with(platform: StubPlatform) -> (Arc<LinkService>, Arc<InMemoryLinkStorage>) {
    init_tracing();
    let storage = Arc::new(InMemoryLinkStorage::new());
    let limiter = Arc::new(SlidingWindowLimiter::new(RateLimitPolicy {
        limit: 1000,
        window: Duration::from_secs(60),
    }));
    let service = Arc::new(LinkService::new(
        storage.clone(),
        Arc::new(platform),
        limiter,
        LinkServiceConfig::default(),
    ));
    (service, storage)
}
