//! In-memory credential store for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};

use super::{Credential, CredentialStore, Service, UserId};

/// In-memory store. Counts `find` calls so resolution-precedence tests can
/// assert which sources were consulted.
pub struct MemoryCredentialStore {
    rows: Mutex<HashMap<(UserId, Service), Credential>>,
    find_calls: AtomicUsize,
    clock: Arc<dyn Clock>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            find_calls: AtomicUsize::new(0),
            clock,
        }
    }

    /// Number of `find` calls issued so far.
    pub fn find_count(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find(&self, user_id: &UserId, service: Service) -> Result<Option<Credential>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().await;
        Ok(rows.get(&(user_id.clone(), service)).cloned())
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        service: Service,
        ciphertext: String,
    ) -> Result<Credential> {
        let now = self.clock.now();
        let mut rows = self.rows.lock().await;

        let key = (user_id.clone(), service);
        let credential = match rows.get(&key) {
            Some(existing) => Credential {
                ciphertext,
                updated_at: now,
                ..existing.clone()
            },
            None => Credential {
                user_id: user_id.clone(),
                service,
                ciphertext,
                created_at: now,
                updated_at: now,
            },
        };

        rows.insert(key, credential.clone());
        Ok(credential)
    }
}
