//! Credential resolution with a fixed precedence.
//!
//! Sources are consulted in order (cache, persisted store, environment
//! fallback) and each step either produces a key, passes to the next
//! source, or aborts resolution outright. The distinction matters for a
//! stored-but-broken credential: that is a fatal, user-actionable condition
//! and must never be silently papered over by a shared environment key.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, warn};

use crate::crypto::{CryptoError, SecretCipher};
use crate::net::ApiError;

use super::{CredentialStore, EnvKeys, KeyCache, PoolSaturated, Service, UserId};

/// Outcome of one resolution source.
enum Resolution {
    /// Usable plaintext key; stop here.
    Found(SecretString),
    /// This source has nothing; try the next one.
    Miss,
    /// Resolution must fail now, without consulting further sources.
    Fatal(ApiError),
}

/// Resolves a usable plaintext key for (user, service).
pub struct KeyResolver {
    cache: Arc<KeyCache>,
    store: Arc<dyn CredentialStore>,
    cipher: Arc<SecretCipher>,
    env: EnvKeys,
}

impl KeyResolver {
    pub fn new(
        cache: Arc<KeyCache>,
        store: Arc<dyn CredentialStore>,
        cipher: Arc<SecretCipher>,
        env: EnvKeys,
    ) -> Self {
        Self {
            cache,
            store,
            cipher,
            env,
        }
    }

    /// Resolve a key, short-circuiting on the first source that answers.
    pub async fn resolve(
        &self,
        user_id: &UserId,
        service: Service,
    ) -> Result<SecretString, ApiError> {
        match self.from_cache(user_id, service) {
            Resolution::Found(key) => return Ok(key),
            Resolution::Fatal(err) => return Err(err),
            Resolution::Miss => {}
        }

        match self.from_store(user_id, service).await {
            Resolution::Found(key) => return Ok(key),
            Resolution::Fatal(err) => return Err(err),
            Resolution::Miss => {}
        }

        match self.from_env(service) {
            Resolution::Found(key) => return Ok(key),
            Resolution::Fatal(err) => return Err(err),
            Resolution::Miss => {}
        }

        Err(ApiError::NotConfigured { service })
    }

    /// Encrypt and persist a user's key, then prime the cache.
    pub async fn save_key(
        &self,
        user_id: &UserId,
        service: Service,
        plaintext: &str,
    ) -> Result<(), ApiError> {
        let ciphertext = self
            .cipher
            .encrypt(plaintext)
            .map_err(|e| ApiError::Store(anyhow::Error::new(e)))?;

        self.store
            .upsert(user_id, service, ciphertext)
            .await
            .map_err(classify_store_error)?;

        self.cache
            .set(user_id, service, SecretString::from(plaintext.to_string()));
        Ok(())
    }

    fn from_cache(&self, user_id: &UserId, service: Service) -> Resolution {
        match self.cache.get(user_id, service) {
            Some(key) => {
                debug!(user = %user_id, service = %service, "credential cache hit");
                Resolution::Found(key)
            }
            None => Resolution::Miss,
        }
    }

    async fn from_store(&self, user_id: &UserId, service: Service) -> Resolution {
        let credential = match self.store.find(user_id, service).await {
            Ok(Some(credential)) => credential,
            Ok(None) => return Resolution::Miss,
            Err(err) => return Resolution::Fatal(classify_store_error(err)),
        };

        match self.cipher.decrypt(&credential.ciphertext) {
            Ok(key) => {
                debug!(user = %user_id, service = %service, "decrypted stored credential");
                self.cache.set(user_id, service, key.clone());
                Resolution::Found(key)
            }
            // A row exists but its envelope no longer opens. Fail fast: the
            // environment fallback must not mask a broken per-user key.
            Err(CryptoError::Authentication | CryptoError::MalformedEnvelope) => {
                warn!(user = %user_id, service = %service, "stored credential failed to decrypt");
                Resolution::Fatal(ApiError::InvalidStoredKey { service })
            }
            Err(err) => Resolution::Fatal(ApiError::MissingSecret(err.to_string())),
        }
    }

    fn from_env(&self, service: Service) -> Resolution {
        match self.env.get(service) {
            Some(key) => {
                debug!(service = %service, var = service.env_var(), "using environment fallback key");
                // Not user-scoped, so deliberately not cached.
                Resolution::Found(SecretString::from(key.to_string()))
            }
            None => Resolution::Miss,
        }
    }
}

fn classify_store_error(err: anyhow::Error) -> ApiError {
    if err.downcast_ref::<PoolSaturated>().is_some() {
        ApiError::ResourceExhausted
    } else {
        ApiError::Store(err)
    }
}
