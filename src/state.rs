//! Shared state for an embedding viewer

use std::sync::Arc;

use crate::annotations::{LocalStore, SqliteLocalStore};
use crate::config::Config;
use crate::document::DocumentRef;
use crate::error::{StoreError, TransferError};
use crate::sync::{DocumentSession, RemoteRecordStore};
use crate::transfer::{TransferCoordinator, UiDispatcher};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to build transfer coordinator: {0}")]
    Transfer(#[from] TransferError),

    #[error("Failed to open local store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to create cache directory: {0}")]
    CacheDir(#[from] std::io::Error),
}

/// Explicitly constructed components shared by every open document
#[derive(Clone)]
pub struct FolioState {
    inner: Arc<FolioStateInner>,
}

struct FolioStateInner {
    config: Config,
    coordinator: TransferCoordinator,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteRecordStore>,
}

impl FolioState {
    pub fn new(
        config: Config,
        coordinator: TransferCoordinator,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteRecordStore>,
    ) -> Self {
        Self {
            inner: Arc::new(FolioStateInner {
                config,
                coordinator,
                local,
                remote,
            }),
        }
    }

    /// Build the default stack: `reqwest` + S3 transports and the SQLite cache
    pub async fn open(
        config: Config,
        dispatcher: Arc<dyn UiDispatcher>,
        remote: Arc<dyn RemoteRecordStore>,
    ) -> Result<Self, StateError> {
        tokio::fs::create_dir_all(&config.cache.cache_dir).await?;

        let coordinator =
            TransferCoordinator::from_config(&config.transfer, &config.storage, dispatcher)?;
        let local = SqliteLocalStore::connect(&config.cache.database_url).await?;
        tracing::info!(database = %config.cache.database_url, "Local store ready");

        Ok(Self::new(config, coordinator, Arc::new(local), remote))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn coordinator(&self) -> &TransferCoordinator {
        &self.inner.coordinator
    }

    pub fn local_store(&self) -> Arc<dyn LocalStore> {
        Arc::clone(&self.inner.local)
    }

    /// Reference for a document cached under the configured cache directory
    pub fn document(&self, id: &str, locator: &str) -> DocumentRef {
        DocumentRef::in_cache(&self.inner.config.cache.cache_dir, id, locator)
    }

    /// Open a session subscribed to the remote records for `document_id`
    pub fn session(&self, document_id: &str) -> DocumentSession {
        let mut session = DocumentSession::new(document_id, self.local_store());
        session.attach(self.inner.remote.as_ref());
        session
    }
}
