//! Backend selection.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::filesystem::{FsChunkStore, FsPersistentStore};
use crate::memory::{MemoryChunkStore, MemoryPersistentStore};
use crate::{ChunkStore, PersistentStore};

/// Which backend a storage role uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local directory.
    Filesystem { path: PathBuf },
    /// Process memory; contents are lost on exit.
    Memory,
}

/// Builds the chunk store described by `config`.
pub async fn chunk_store_from_config(config: &StorageConfig) -> StoreResult<Arc<dyn ChunkStore>> {
    match config {
        StorageConfig::Filesystem { path } => Ok(Arc::new(FsChunkStore::new(path).await?)),
        StorageConfig::Memory => Ok(Arc::new(MemoryChunkStore::new())),
    }
}

/// Builds the persistent store described by `config`.
pub async fn persistent_store_from_config(
    config: &StorageConfig,
) -> StoreResult<Arc<dyn PersistentStore>> {
    match config {
        StorageConfig::Filesystem { path } => Ok(Arc::new(FsPersistentStore::new(path).await?)),
        StorageConfig::Memory => Ok(Arc::new(MemoryPersistentStore::new())),
    }
}
