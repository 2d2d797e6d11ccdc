//! Keychain session persistence
//!
//! Stores the JSON session record as the secret of a single keychain entry
//! (macOS Keychain, Windows Credential Manager, Linux Secret Service).
//! Keychain calls block, so they run on the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use keyring::Entry;
use memberdesk_core::SessionPersistence;
use memberdesk_domain::{MemberdeskError, PersistedSession, Result};
use tracing::debug;

use crate::errors::InfraError;

/// Session record stored in the platform keychain
#[derive(Clone)]
pub struct KeychainSessionPersistence {
    entry: Arc<Entry>,
    service: String,
}

impl KeychainSessionPersistence {
    /// Entry for `service` / `account`
    ///
    /// # Errors
    /// Returns `MemberdeskError::Persistence` if the platform rejects the
    /// entry attributes.
    pub fn new(service: &str, account: &str) -> Result<Self> {
        let entry =
            Entry::new(service, account).map_err(|e| MemberdeskError::from(InfraError::from(e)))?;
        Ok(Self { entry: Arc::new(entry), service: service.to_string() })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Entry) -> Result<T> + Send + 'static,
    {
        let entry = Arc::clone(&self.entry);
        tokio::task::spawn_blocking(move || op(&entry))
            .await
            .map_err(|e| MemberdeskError::Internal(format!("keychain task failed: {e}")))?
    }
}

#[async_trait]
impl SessionPersistence for KeychainSessionPersistence {
    async fn load(&self) -> Result<Option<PersistedSession>> {
        let secret = self
            .blocking(|entry| match entry.get_password() {
                Ok(secret) => Ok(Some(secret)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(InfraError::from(e).into()),
            })
            .await?;

        let Some(secret) = secret else {
            return Ok(None);
        };
        let record = serde_json::from_str(&secret)
            .map_err(|e| MemberdeskError::from(InfraError::from(e)))?;
        debug!(service = %self.service, "Session record loaded from keychain");
        Ok(Some(record))
    }

    async fn save(&self, record: &PersistedSession) -> Result<()> {
        let secret =
            serde_json::to_string(record).map_err(|e| MemberdeskError::from(InfraError::from(e)))?;
        self.blocking(move |entry| {
            entry.set_password(&secret).map_err(|e| InfraError::from(e).into())
        })
        .await?;
        debug!(service = %self.service, "Session record stored in keychain");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.blocking(|entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(InfraError::from(e).into()),
        })
        .await?;
        debug!(service = %self.service, "Session record removed from keychain");
        Ok(())
    }
}
