//! Application state management

use std::sync::Arc;

use crate::error::Result;
use crate::store::{BlobStore, DocumentStore, FileStore, MemoryStore};
use crate::training::ModelStore;

use super::{ServerConfig, StoreBackend};

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub models: ModelStore,
}

impl AppState {
    pub fn new(config: ServerConfig, documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let models = ModelStore::new(documents.clone(), blobs.clone());
        Self {
            config,
            documents,
            blobs,
            models,
        }
    }

    /// Build the stores named by `config.store_backend`.
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        match config.store_backend {
            StoreBackend::File => {
                let store = Arc::new(FileStore::open(&config.data_dir)?);
                Ok(Self::new(config, store.clone(), store))
            }
            StoreBackend::Memory => {
                let store = Arc::new(MemoryStore::new());
                Ok(Self::new(config, store.clone(), store))
            }
        }
    }

    /// In-memory state, as used by tests
    pub fn in_memory(config: ServerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store)
    }
}
