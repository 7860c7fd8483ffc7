//! Completeness tracking, derived from chunk store listings.

use std::sync::Arc;

use resumable_storage::ChunkStore;
use tracing::debug;

use crate::UploadError;
use crate::addressing::{ChunkNaming, UploadIdentity};
use crate::types::{ChunkInfo, UploadState, UploadStatus};

/// Answers "which chunks are stored" and "is the upload complete".
///
/// Holds no per-upload state: every call lists the chunk store again, so
/// concurrent requests and restarts always see the current stored state.
#[derive(Clone)]
pub struct UploadTracker {
    store: Arc<dyn ChunkStore>,
    naming: ChunkNaming,
}

impl UploadTracker {
    pub fn new(store: Arc<dyn ChunkStore>, naming: ChunkNaming) -> Self {
        Self { store, naming }
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    pub fn naming(&self) -> &ChunkNaming {
        &self.naming
    }

    /// Names of the stored chunks of `identity`, in ascending index order.
    pub async fn matching_chunk_names(
        &self,
        identity: &UploadIdentity,
    ) -> Result<Vec<String>, UploadError> {
        let names = self.store.list().await.map_err(UploadError::ChunkStore)?;
        let mut indexed: Vec<(u32, String)> = names
            .into_iter()
            .filter_map(|name| {
                self.naming
                    .chunk_index(identity, &name)
                    .map(|index| (index, name))
            })
            .collect();
        indexed.sort();
        Ok(indexed.into_iter().map(|(_, name)| name).collect())
    }

    /// Stored chunks with their sizes. Chunks removed between listing and
    /// size query are skipped.
    pub async fn chunks(&self, identity: &UploadIdentity) -> Result<Vec<ChunkInfo>, UploadError> {
        let mut chunks = Vec::new();
        for name in self.matching_chunk_names(identity).await? {
            let size = match self.store.size(&name).await {
                Ok(size) => size,
                Err(e) if e.is_not_found() => {
                    debug!(chunk = %name, "chunk vanished while sizing");
                    continue;
                }
                Err(e) => return Err(UploadError::ChunkStore(e)),
            };
            let index = self.naming.chunk_index(identity, &name).unwrap_or_default();
            chunks.push(ChunkInfo { name, index, size });
        }
        Ok(chunks)
    }

    /// Sum of the sizes of all stored chunks of `identity`.
    pub async fn aggregate_size(&self, identity: &UploadIdentity) -> Result<u64, UploadError> {
        Ok(self.chunks(identity).await?.iter().map(|c| c.size).sum())
    }

    /// `true` when the stored bytes equal the declared total size.
    ///
    /// Size-based only: a duplicated chunk can stand in for a missing one of
    /// the same size. [`status`](Self::status) reports overshoot separately.
    pub async fn is_complete(&self, identity: &UploadIdentity) -> Result<bool, UploadError> {
        Ok(self.aggregate_size(identity).await? == identity.total_size())
    }

    /// `true` if `name` is stored with exactly `declared_size` bytes.
    pub async fn chunk_is_valid(&self, name: &str, declared_size: u64) -> Result<bool, UploadError> {
        if !self.store.exists(name).await.map_err(UploadError::ChunkStore)? {
            return Ok(false);
        }
        match self.store.size(name).await {
            Ok(size) => Ok(size == declared_size),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(UploadError::ChunkStore(e)),
        }
    }

    /// Full snapshot of the upload.
    pub async fn status(&self, identity: &UploadIdentity) -> Result<UploadStatus, UploadError> {
        let chunks = self.chunks(identity).await?;
        let stored: u64 = chunks.iter().map(|c| c.size).sum();
        let declared = identity.total_size();
        Ok(UploadStatus {
            identity: identity.to_string(),
            declared_size: declared,
            stored_size: stored,
            state: UploadState::classify(chunks.len(), stored, declared),
            chunks,
        })
    }
}
