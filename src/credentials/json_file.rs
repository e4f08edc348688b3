//! JSON file-backed credential store.
//!
//! Directory structure:
//! ```text
//! data/
//!   credentials/
//!     {user_id}.json      all of one user's credentials
//! ```
//!
//! Used by the CLI; deployments back the [`CredentialStore`] trait with a
//! relational table instead.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;

use crate::clock::{Clock, SystemClock};
use std::sync::Arc;

use super::{Credential, CredentialStore, Service, UserId};

pub struct JsonFileCredentialStore {
    base_path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonFileCredentialStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn credentials_dir(&self) -> PathBuf {
        self.base_path.join("credentials")
    }

    fn user_file(&self, user_id: &UserId) -> PathBuf {
        self.credentials_dir()
            .join(format!("{}.json", user_id.as_str()))
    }

    async fn read_user(&self, user_id: &UserId) -> Result<Vec<Credential>> {
        let path = self.user_file(user_id);
        match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse credentials from {path:?}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {path:?}")),
        }
    }

    async fn write_user(&self, user_id: &UserId, rows: &[Credential]) -> Result<()> {
        let path = self.user_file(user_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create credentials directory")?;
        }
        let content =
            serde_json::to_string_pretty(rows).context("Failed to serialize credentials")?;
        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {path:?}"))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for JsonFileCredentialStore {
    async fn find(&self, user_id: &UserId, service: Service) -> Result<Option<Credential>> {
        let rows = self.read_user(user_id).await?;
        Ok(rows.into_iter().find(|c| c.service == service))
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        service: Service,
        ciphertext: String,
    ) -> Result<Credential> {
        let now = self.clock.now();
        let mut rows = self.read_user(user_id).await?;

        let credential = match rows.iter_mut().find(|c| c.service == service) {
            Some(existing) => {
                existing.ciphertext = ciphertext;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let credential = Credential {
                    user_id: user_id.clone(),
                    service,
                    ciphertext,
                    created_at: now,
                    updated_at: now,
                };
                rows.push(credential.clone());
                credential
            }
        };

        self.write_user(user_id, &rows).await?;
        Ok(credential)
    }
}
