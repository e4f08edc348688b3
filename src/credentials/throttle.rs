//! Bounded concurrency for credential lookups.
//!
//! The backing store has a fixed connection budget. Lookups past the budget
//! wait for a slot; waiting past the acquire timeout fails with
//! [`PoolSaturated`], which the client layer classifies as resource
//! exhaustion rather than a credential problem.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use super::{Credential, CredentialStore, Service, UserId};

pub const DEFAULT_MAX_CONCURRENT: usize = 20;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Marker error for a saturated lookup pool.
#[derive(Debug, thiserror::Error)]
#[error("credential store is saturated; no connection freed within {waited:?}")]
pub struct PoolSaturated {
    pub waited: Duration,
}

/// Wraps any [`CredentialStore`] with a semaphore-bounded slot pool.
pub struct ThrottledStore {
    inner: Arc<dyn CredentialStore>,
    slots: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl ThrottledStore {
    pub fn new(inner: Arc<dyn CredentialStore>) -> Self {
        Self::with_limits(inner, DEFAULT_MAX_CONCURRENT, DEFAULT_ACQUIRE_TIMEOUT)
    }

    pub fn with_limits(
        inner: Arc<dyn CredentialStore>,
        max_concurrent: usize,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            acquire_timeout,
        }
    }

    async fn acquire(&self) -> Result<tokio::sync::OwnedSemaphorePermit> {
        match timeout(self.acquire_timeout, self.slots.clone().acquire_owned()).await {
            Ok(permit) => permit.map_err(|e| anyhow::anyhow!(e)),
            Err(_) => Err(PoolSaturated {
                waited: self.acquire_timeout,
            }
            .into()),
        }
    }
}

#[async_trait::async_trait]
impl CredentialStore for ThrottledStore {
    async fn find(&self, user_id: &UserId, service: Service) -> Result<Option<Credential>> {
        let _permit = self.acquire().await?;
        self.inner.find(user_id, service).await
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        service: Service,
        ciphertext: String,
    ) -> Result<Credential> {
        let _permit = self.acquire().await?;
        self.inner.upsert(user_id, service, ciphertext).await
    }
}
