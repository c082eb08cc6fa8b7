//! HTTP adapter for the secondary platform.
//!
//! Two upstream surfaces: the platform-wide account directory (public,
//! unauthenticated) and the game server's companion API (bearer-token
//! authenticated) for presence, messaging, and status.

use crate::traits::{
    MessagingChannel, PresenceProbe, SecondaryDirectory, SecondaryProfile, ServerStatus,
    StatusProbe,
};
use crate::{PlatformError, PlatformResult};
use async_trait::async_trait;
use crosslink_types::{normalize_secondary_id, SecondaryId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Endpoints and credentials for the HTTP adapter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpPlatformConfig {
    /// Base URL of the account directory, e.g. `https://directory.example`.
    pub directory_url: String,
    /// Base URL of the game server's companion API.
    pub server_url: String,
    /// Bearer token for the companion API.
    pub api_key: String,
    /// Per-request timeout; a timeout is treated as unreachable.
    pub timeout_secs: u64,
}

impl Default for HttpPlatformConfig {
    fn default() -> Self {
        Self {
            directory_url: String::new(),
            server_url: String::new(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryProfilePayload {
    id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct PresencePayload {
    #[serde(default)]
    online: bool,
}

#[derive(Debug, Default, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    online: bool,
    #[serde(default)]
    players: u32,
    #[serde(default, rename = "maxPlayers")]
    max_players: u32,
}

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    message: &'a str,
}

/// Reqwest-backed implementation of the platform traits.
pub struct HttpSecondaryPlatform {
    client: Client,
    config: HttpPlatformConfig,
}

impl HttpSecondaryPlatform {
    pub fn new(config: HttpPlatformConfig) -> PlatformResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn directory_endpoint(&self, path: &str) -> PlatformResult<String> {
        if self.config.directory_url.is_empty() {
            return Err(PlatformError::NotConfigured("directory_url".to_string()));
        }
        Ok(format!(
            "{}{}",
            self.config.directory_url.trim_end_matches('/'),
            path
        ))
    }

    fn server_endpoint(&self, path: &str) -> PlatformResult<String> {
        if self.config.server_url.is_empty() || self.config.api_key.is_empty() {
            return Err(PlatformError::NotConfigured(
                "server_url / api_key".to_string(),
            ));
        }
        Ok(format!(
            "{}{}",
            self.config.server_url.trim_end_matches('/'),
            path
        ))
    }
}

#[async_trait]
impl SecondaryDirectory for HttpSecondaryPlatform {
    async fn resolve_by_name(&self, name: &str) -> PlatformResult<Option<SecondaryProfile>> {
        let url = self.directory_endpoint(&format!("/users/profiles/{name}"))?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            // The directory answers non-2xx for unknown accounts.
            return Ok(None);
        }

        let payload: DirectoryProfilePayload = response.json().await?;
        let id = normalize_secondary_id(&payload.id).ok_or_else(|| {
            PlatformError::Protocol(format!("malformed directory id: {}", payload.id))
        })?;
        Ok(Some(SecondaryProfile {
            id: SecondaryId::new(id),
            canonical_name: payload.name,
        }))
    }
}

#[async_trait]
impl PresenceProbe for HttpSecondaryPlatform {
    async fn is_present(&self, canonical_name: &str) -> PlatformResult<bool> {
        let url = self.server_endpoint(&format!("/api/players/{canonical_name}"))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let payload: PresencePayload = response.json().await.unwrap_or_default();
        Ok(payload.online)
    }
}

#[async_trait]
impl MessagingChannel for HttpSecondaryPlatform {
    async fn deliver(&self, canonical_name: &str, text: &str) -> PlatformResult<bool> {
        let url = self.server_endpoint(&format!("/api/players/{canonical_name}/message"))?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&MessagePayload { message: text })
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(
                canonical_name,
                status = %response.status(),
                "message delivery rejected"
            );
        }
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl StatusProbe for HttpSecondaryPlatform {
    async fn server_status(&self) -> PlatformResult<ServerStatus> {
        let url = self.server_endpoint("/api/status")?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(ServerStatus::default());
        }
        let payload: StatusPayload = response.json().await.unwrap_or_default();
        Ok(ServerStatus {
            online: payload.online,
            players: payload.players,
            max_players: payload.max_players,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_require_configuration() {
        let platform = HttpSecondaryPlatform::new(HttpPlatformConfig::default()).unwrap();
        assert!(matches!(
            platform.directory_endpoint("/users/profiles/Steve"),
            Err(PlatformError::NotConfigured(_))
        ));
        assert!(matches!(
            platform.server_endpoint("/api/status"),
            Err(PlatformError::NotConfigured(_))
        ));
    }

    #[test]
    fn endpoints_join_without_double_slashes() {
        let platform = HttpSecondaryPlatform::new(HttpPlatformConfig {
            directory_url: "https://directory.example/".to_string(),
            server_url: "https://mc.example".to_string(),
            api_key: "key".to_string(),
            timeout_secs: 10,
        })
        .unwrap();

        assert_eq!(
            platform.directory_endpoint("/users/profiles/Steve").unwrap(),
            "https://directory.example/users/profiles/Steve"
        );
        assert_eq!(
            platform.server_endpoint("/api/status").unwrap(),
            "https://mc.example/api/status"
        );
    }

    #[test]
    fn status_payload_tolerates_missing_fields() {
        let payload: StatusPayload = serde_json::from_str("{}").unwrap();
        assert!(!payload.online);
        assert_eq!(payload.players, 0);

        let payload: StatusPayload =
            serde_json::from_str(r#"{"online":true,"players":7,"maxPlayers":100}"#).unwrap();
        assert!(payload.online);
        assert_eq!(payload.max_players, 100);
    }
}
