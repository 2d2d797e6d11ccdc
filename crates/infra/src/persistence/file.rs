//! JSON file session persistence
//!
//! The record is written to a sibling temp file and renamed into place, so a
//! crash mid-write leaves either the old record or the new one. On Unix the
//! file is created with `0600` permissions.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use memberdesk_core::SessionPersistence;
use memberdesk_domain::{MemberdeskError, PersistedSession, Result};
use tracing::debug;

use crate::errors::InfraError;

/// Session record stored as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileSessionPersistence {
    path: PathBuf,
}

impl JsonFileSessionPersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn infra<E: Into<InfraError>>(err: E) -> MemberdeskError {
    MemberdeskError::from(err.into())
}

#[async_trait]
impl SessionPersistence for JsonFileSessionPersistence {
    async fn load(&self) -> Result<Option<PersistedSession>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(infra(err)),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }

        let record = serde_json::from_str(&contents).map_err(infra)?;
        debug!(path = %self.path.display(), "Session record loaded");
        Ok(Some(record))
    }

    async fn save(&self, record: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(infra)?;
        }

        let json = serde_json::to_vec_pretty(record).map_err(infra)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await.map_err(infra)?;
        restrict_permissions(&temp).await?;
        tokio::fs::rename(&temp, &self.path).await.map_err(infra)?;

        debug!(path = %self.path.display(), "Session record saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session record removed");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(infra(err)),
        }
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await.map_err(infra)
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
