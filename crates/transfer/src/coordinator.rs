//! Chunk intake and finalization.

use std::sync::Arc;

use resumable_protocol::ResumableParams;
use resumable_storage::{ChunkStore, PersistentStore};
use tracing::{debug, info, warn};

use crate::UploadError;
use crate::addressing::UploadIdentity;
use crate::config::UploadConfig;
use crate::merger::Merger;
use crate::resumable::ResumableUpload;
use crate::tracker::UploadTracker;
use crate::types::Finalized;

/// Stores incoming chunks and turns complete uploads into persistent files.
///
/// Lifecycle of one upload: collecting → complete → finalizing → done.
/// A failed finalize leaves every chunk in place so it can be retried.
/// There is no locking: two concurrent finalizes of the same upload both
/// persist a copy (the persistent store picks distinct names) and both
/// delete the chunks, the second delete being a no-op.
#[derive(Clone)]
pub struct FinalizeCoordinator {
    tracker: UploadTracker,
    merger: Merger,
    persistent: Arc<dyn PersistentStore>,
    upload_to: String,
}

impl FinalizeCoordinator {
    pub fn new(
        chunks: Arc<dyn ChunkStore>,
        persistent: Arc<dyn PersistentStore>,
        config: &UploadConfig,
    ) -> Self {
        let tracker = UploadTracker::new(chunks, config.naming());
        let merger = Merger::new(tracker.clone(), config.temp_dir.clone());
        Self {
            tracker,
            merger,
            persistent,
            upload_to: config.upload_to.clone(),
        }
    }

    pub fn tracker(&self) -> &UploadTracker {
        &self.tracker
    }

    pub fn merger(&self) -> &Merger {
        &self.merger
    }

    /// Destination prefix for finished files.
    pub fn upload_to(&self) -> &str {
        &self.upload_to
    }

    /// Binds a request's parameters to this coordinator.
    pub fn upload(&self, params: ResumableParams) -> Result<ResumableUpload<'_>, UploadError> {
        ResumableUpload::new(self, params)
    }

    /// Parses form or query pairs and binds them to this coordinator.
    pub fn upload_from_pairs<I, K, V>(&self, pairs: I) -> Result<ResumableUpload<'_>, UploadError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.upload(ResumableParams::from_pairs(pairs)?)
    }

    /// Stores chunk `index` of `identity`, replacing any previous copy.
    ///
    /// Returns the chunk name. Re-sending the same bytes leaves the store
    /// unchanged; different bytes replace the old content.
    pub async fn process_chunk(
        &self,
        identity: &UploadIdentity,
        index: u32,
        data: &[u8],
        declared_size: u64,
    ) -> Result<String, UploadError> {
        let name = self.tracker.naming().chunk_name(identity, index)?;
        let store = self.tracker.store();

        if data.len() as u64 != declared_size {
            warn!(
                chunk = %name,
                received = data.len(),
                declared = declared_size,
                "chunk size differs from declared size"
            );
        }

        if store.exists(&name).await.map_err(UploadError::ChunkStore)? {
            debug!(chunk = %name, "replacing existing chunk");
            store.delete(&name).await.map_err(UploadError::ChunkStore)?;
        }
        store
            .save(&name, data)
            .await
            .map_err(UploadError::ChunkStore)?;

        debug!(upload = %identity, chunk = %name, size = data.len(), "chunk stored");
        Ok(name)
    }

    /// Merges a complete upload, saves it as `storage_filename` in the
    /// persistent store and deletes its chunks.
    ///
    /// Chunks are only deleted after the persistent save succeeded. Deletion
    /// is best effort: a failed delete is logged and leaves an orphan chunk,
    /// the finalized file is still reported.
    pub async fn collect(
        &self,
        identity: &UploadIdentity,
        storage_filename: &str,
    ) -> Result<Finalized, UploadError> {
        let mut merged = self.merger.merge(identity).await?;

        let filename = self
            .persistent
            .save(storage_filename, merged.reader())
            .await
            .map_err(UploadError::PersistentStore)?;

        let finalized = Finalized {
            filename,
            size: merged.size(),
            sha256: merged.sha256().to_string(),
        };
        if let Err(e) = merged.close() {
            warn!(upload = %identity, error = %e, "failed to remove merged temp file");
        }

        let deleted = self.delete_chunks(identity).await;
        info!(
            upload = %identity,
            filename = %finalized.filename,
            size = finalized.size,
            sha256 = %finalized.sha256,
            chunks = deleted,
            "upload finalized"
        );
        Ok(finalized)
    }

    /// Deletes every stored chunk of `identity`; returns how many deletes succeeded.
    async fn delete_chunks(&self, identity: &UploadIdentity) -> usize {
        let names = match self.tracker.matching_chunk_names(identity).await {
            Ok(names) => names,
            Err(e) => {
                warn!(upload = %identity, error = %e, "failed to list chunks for cleanup");
                return 0;
            }
        };

        let mut deleted = 0;
        for name in &names {
            match self.tracker.store().delete(name).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!(chunk = %name, error = %e, "failed to delete chunk"),
            }
        }
        deleted
    }
}
