//! Per-user API credential storage and resolution.
//!
//! Each user owns at most one key per external service, encrypted at rest
//! (see [`crate::crypto`]). Resolution order is cache, then persisted store,
//! then a process-wide environment fallback; see [`resolver::KeyResolver`].

mod cache;
mod json_file;
mod memory;
pub mod resolver;
mod throttle;

pub use cache::KeyCache;
pub use json_file::JsonFileCredentialStore;
pub use memory::MemoryCredentialStore;
pub use resolver::KeyResolver;
pub use throttle::{PoolSaturated, ThrottledStore};

use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External services a user can hold a key for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Youtube,
    RapidApi,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Youtube => "youtube",
            Service::RapidApi => "rapidapi",
        }
    }

    /// Environment variable consulted as the last-resort fallback key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Service::Youtube => "YOUTUBE_API_KEY",
            Service::RapidApi => "RAPIDAPI_KEY",
        }
    }

    /// Human-readable name used in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Service::Youtube => "YouTube",
            Service::RapidApi => "RapidAPI",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Service {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "youtube" => Ok(Service::Youtube),
            "rapidapi" => Ok(Service::RapidApi),
            other => anyhow::bail!("unknown service: {other}"),
        }
    }
}

/// Opaque user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One stored API key: unique per (user, service), ciphertext is an
/// `iv:authTag:ciphertext` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: UserId,
    pub service: Service,
    pub ciphertext: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence seam for credentials.
///
/// Backed by a relational table in a deployment; the implementations here
/// (memory, JSON files) cover tests and the CLI. `find` returns `Ok(None)`
/// when no row exists, which is not an error.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find(&self, user_id: &UserId, service: Service) -> Result<Option<Credential>>;

    /// Insert or replace the key for (user, service). Preserves `created_at`
    /// on replace and refreshes `updated_at`.
    async fn upsert(
        &self,
        user_id: &UserId,
        service: Service,
        ciphertext: String,
    ) -> Result<Credential>;
}

/// Process-wide fallback keys, loaded once from the environment.
///
/// Held as an explicit value rather than read ambiently so tests can inject
/// their own map. Fallback keys are shared, not user-scoped, and are never
/// written to the per-user cache.
#[derive(Debug, Clone, Default)]
pub struct EnvKeys {
    keys: HashMap<Service, String>,
}

impl EnvKeys {
    /// Snapshot the known service variables from the process environment.
    pub fn from_env() -> Self {
        let mut keys = HashMap::new();
        for service in [Service::Youtube, Service::RapidApi] {
            if let Ok(value) = std::env::var(service.env_var()) {
                if !value.is_empty() {
                    keys.insert(service, value);
                }
            }
        }
        Self { keys }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, service: Service, key: impl Into<String>) -> Self {
        self.keys.insert(service, key.into());
        self
    }

    pub fn get(&self, service: Service) -> Option<&str> {
        self.keys.get(&service).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_string_roundtrip() {
        for service in [Service::Youtube, Service::RapidApi] {
            let parsed: Service = service.as_str().parse().unwrap();
            assert_eq!(parsed, service);
        }
        assert!("vimeo".parse::<Service>().is_err());
    }

    #[test]
    fn service_serde_uses_lowercase_keys() {
        assert_eq!(
            serde_json::to_string(&Service::RapidApi).unwrap(),
            "\"rapidapi\""
        );
        let parsed: Service = serde_json::from_str("\"youtube\"").unwrap();
        assert_eq!(parsed, Service::Youtube);
    }

    #[test]
    fn env_keys_builder_and_lookup() {
        let keys = EnvKeys::empty().with_key(Service::Youtube, "ENV123");
        assert_eq!(keys.get(Service::Youtube), Some("ENV123"));
        assert_eq!(keys.get(Service::RapidApi), None);
    }
}
