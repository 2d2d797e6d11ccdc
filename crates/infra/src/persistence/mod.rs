//! Durable storage for the session record
//!
//! - [`file`]: JSON file, written atomically
//! - [`keychain`]: platform keychain entry via `keyring`

pub mod file;
pub mod keychain;

use std::sync::Arc;

use memberdesk_core::SessionPersistence;
use memberdesk_domain::{PersistenceBackend, PersistenceConfig, Result};

pub use file::JsonFileSessionPersistence;
pub use keychain::KeychainSessionPersistence;

/// Build the backend selected in the `[persistence]` section
pub fn from_config(config: &PersistenceConfig) -> Result<Arc<dyn SessionPersistence>> {
    match config.backend {
        PersistenceBackend::File => Ok(Arc::new(JsonFileSessionPersistence::new(&config.path))),
        PersistenceBackend::Keychain => Ok(Arc::new(KeychainSessionPersistence::new(
            &config.keychain_service,
            &config.keychain_account,
        )?)),
    }
}
