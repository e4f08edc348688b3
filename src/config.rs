use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::deserialize_duration;
use crate::net::RetryPolicy;
use crate::ratelimit::RateLimitConfig;

/// Default environment variable holding the master encryption secret.
fn default_secret_var() -> String {
    crate::crypto::DEFAULT_SECRET_VAR.to_string()
}

/// Encryption configuration.
///
/// Only the *name* of the variable is configurable; the secret value itself
/// always comes from the environment, never from this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub secret_var: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            secret_var: default_secret_var(),
        }
    }
}

/// Default plaintext-key cache TTL (5 minutes).
fn default_key_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a decrypted key may be served from memory.
    #[serde(
        default = "default_key_ttl",
        deserialize_with = "deserialize_duration"
    )]
    pub key_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_ttl: default_key_ttl(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,

    /// First backoff delay; doubles per subsequent retry.
    #[serde(
        default = "default_base_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_delay)
    }
}

fn default_max_concurrent_lookups() -> usize {
    20
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Where credential files live. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,

    /// Concurrent credential lookups allowed against the backing store.
    pub max_concurrent_lookups: usize,

    /// How long a lookup may wait for a free slot before failing.
    #[serde(
        default = "default_acquire_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub acquire_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_concurrent_lookups: default_max_concurrent_lookups(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

fn default_search_requests() -> u32 {
    30
}

fn default_search_window() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Searches allowed per user per window.
    pub max_requests: u32,

    #[serde(
        default = "default_search_window",
        deserialize_with = "deserialize_duration"
    )]
    pub window: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_requests: default_search_requests(),
            window: default_search_window(),
        }
    }
}

impl SearchConfig {
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.max_requests, self.window.as_secs())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub encryption: EncryptionConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub store: StoreConfig,
    pub search: SearchConfig,
}

/// Config plus the paths resolved against the environment.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub data_dir: PathBuf,
}

impl ResolvedConfig {
    /// Load the config file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file {}", path.display()))
            }
        };

        let data_dir = resolve_data_dir(&config);
        Ok(Self { config, data_dir })
    }
}

#[cfg(feature = "cli")]
fn resolve_data_dir(config: &Config) -> PathBuf {
    config.store.data_dir.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clipscout")
    })
}

#[cfg(not(feature = "cli"))]
fn resolve_data_dir(config: &Config) -> PathBuf {
    config
        .store
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
}
