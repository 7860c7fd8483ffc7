//! Per-request view of an upload, driven by the `resumable*` parameters.

use chrono::Local;
use resumable_protocol::ResumableParams;
use tracing::debug;

use crate::UploadError;
use crate::addressing::{UploadIdentity, storage_path};
use crate::coordinator::FinalizeCoordinator;
use crate::types::{ChunkOutcome, UploadStatus};

/// One chunk request (or test-chunk probe) bound to a coordinator.
///
/// Building it validates the filename, so a request carrying a path
/// separator is rejected before any storage I/O.
pub struct ResumableUpload<'a> {
    coordinator: &'a FinalizeCoordinator,
    params: ResumableParams,
    identity: UploadIdentity,
}

impl<'a> ResumableUpload<'a> {
    pub fn new(
        coordinator: &'a FinalizeCoordinator,
        params: ResumableParams,
    ) -> Result<Self, UploadError> {
        let identity = UploadIdentity::new(params.total_size, params.filename.clone())?;
        if params.chunk_number == 0 {
            return Err(UploadError::InvalidChunkNumber(0));
        }
        Ok(Self {
            coordinator,
            params,
            identity,
        })
    }

    pub fn params(&self) -> &ResumableParams {
        &self.params
    }

    pub fn identity(&self) -> &UploadIdentity {
        &self.identity
    }

    /// Name of the chunk carried by this request.
    pub fn chunk_name(&self) -> Result<String, UploadError> {
        self.coordinator
            .tracker()
            .naming()
            .chunk_name(&self.identity, self.params.chunk_number)
    }

    /// Path the finished file is requested under, relative to the persistent store.
    pub fn storage_filename(&self) -> Result<String, UploadError> {
        storage_path(
            self.coordinator.upload_to(),
            &self.identity.to_string(),
            Local::now().naive_local(),
        )
    }

    /// Test-chunk probe: `true` if this request's chunk is already stored
    /// with the declared size, so the client can skip sending it.
    pub async fn chunk_exists(&self) -> Result<bool, UploadError> {
        let name = self.chunk_name()?;
        self.coordinator
            .tracker()
            .chunk_is_valid(&name, self.params.current_chunk_size)
            .await
    }

    /// Stores this request's chunk and finalizes the upload if it is now complete.
    pub async fn receive(&self, data: &[u8]) -> Result<ChunkOutcome, UploadError> {
        self.coordinator
            .process_chunk(
                &self.identity,
                self.params.chunk_number,
                data,
                self.params.current_chunk_size,
            )
            .await?;

        if !self.coordinator.tracker().is_complete(&self.identity).await? {
            return Ok(ChunkOutcome::Stored);
        }

        let target = self.storage_filename()?;
        match self.coordinator.collect(&self.identity, &target).await {
            Ok(finalized) => Ok(ChunkOutcome::Finalized(finalized)),
            // Another request finalized the upload between our check and merge,
            // or deleted the chunks while we were reading them.
            Err(UploadError::IncompleteUpload { .. }) => {
                debug!(upload = %self.identity, "upload finalized concurrently");
                Ok(ChunkOutcome::Stored)
            }
            Err(UploadError::ChunkReadFailure { name, source }) if source.is_not_found() => {
                debug!(
                    upload = %self.identity,
                    chunk = %name,
                    "chunk removed by a concurrent finalize"
                );
                Ok(ChunkOutcome::Stored)
            }
            Err(e) => Err(e),
        }
    }

    /// Current stored state of this upload.
    pub async fn status(&self) -> Result<UploadStatus, UploadError> {
        self.coordinator.tracker().status(&self.identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use std::sync::atomic::{AtomicBool, Ordering};

    use resumable_storage::{
        BoxFuture, ChunkRead, ChunkStore, MemoryChunkStore, MemoryPersistentStore, StorageConfig,
        StoreResult,
    };

    use crate::config::UploadConfig;
    use crate::types::UploadState;

    type Fixture = (
        Arc<MemoryChunkStore>,
        Arc<MemoryPersistentStore>,
        FinalizeCoordinator,
    );

    fn coordinator(upload_to: &str) -> Fixture {
        let chunks = Arc::new(MemoryChunkStore::new());
        let persistent = Arc::new(MemoryPersistentStore::new());
        let config = UploadConfig {
            upload_to: upload_to.into(),
            chunk_storage: StorageConfig::Memory,
            persistent_storage: StorageConfig::Memory,
            ..Default::default()
        };
        let c = FinalizeCoordinator::new(chunks.clone(), persistent.clone(), &config);
        (chunks, persistent, c)
    }

    fn pairs(filename: &str, total: u64, number: u32, size: u64) -> Vec<(String, String)> {
        ResumableParams::new(filename, total, number, size)
            .to_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[tokio::test]
    async fn rejects_separator_before_any_io() {
        let (chunks, _persistent, c) = coordinator("");
        let err = c
            .upload_from_pairs(pairs("../etc/passwd", 10, 1, 10))
            .err()
            .unwrap();
        assert!(matches!(err, UploadError::InvalidFilename(_)));
        assert!(!err.is_retryable());
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn missing_parameter_is_a_request_error() {
        let (_chunks, _persistent, c) = coordinator("");
        let err = c
            .upload_from_pairs([("resumableFilename", "a.bin")])
            .err()
            .unwrap();
        assert!(matches!(err, UploadError::Params(_)));
    }

    #[tokio::test]
    async fn receive_finalizes_on_last_chunk() {
        let (chunks, persistent, c) = coordinator("media");

        let second = c.upload(ResumableParams::new("a.bin", 10, 2, 4)).unwrap();
        assert_eq!(second.receive(b"7890").await.unwrap(), ChunkOutcome::Stored);
        assert_eq!(second.status().await.unwrap().state, UploadState::Collecting);

        let first = c.upload(ResumableParams::new("a.bin", 10, 1, 6)).unwrap();
        let done = match first.receive(b"123456").await.unwrap() {
            ChunkOutcome::Finalized(done) => done,
            other => panic!("expected finalize, got {other:?}"),
        };

        assert_eq!(done.filename, "media/10_a.bin");
        assert_eq!(persistent.get("media/10_a.bin").unwrap(), b"1234567890");
        assert!(chunks.is_empty());
        assert_eq!(first.status().await.unwrap().state, UploadState::Absent);
    }

    #[tokio::test]
    async fn test_chunk_probe() {
        let (chunks, _persistent, c) = coordinator("");
        let probe = c.upload(ResumableParams::new("p.bin", 10, 1, 5)).unwrap();
        assert_eq!(probe.chunk_name().unwrap(), "10_p.bin_part_0001");
        assert!(!probe.chunk_exists().await.unwrap());

        // Truncated write: name present, size short.
        chunks.save("10_p.bin_part_0001", b"abc").await.unwrap();
        assert!(!probe.chunk_exists().await.unwrap());
        assert!(!c.tracker().is_complete(probe.identity()).await.unwrap());

        chunks.save("10_p.bin_part_0001", b"abcde").await.unwrap();
        assert!(probe.chunk_exists().await.unwrap());
    }

    /// Chunk store that empties itself on the first read, as a finalize
    /// running in another request would.
    struct FinalizedElsewhere {
        inner: MemoryChunkStore,
        cleared: AtomicBool,
    }

    impl ChunkStore for FinalizedElsewhere {
        fn exists<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<bool>> {
            self.inner.exists(name)
        }

        fn size<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<u64>> {
            self.inner.size(name)
        }

        fn save<'a>(&'a self, name: &'a str, data: &'a [u8]) -> BoxFuture<'a, StoreResult<()>> {
            self.inner.save(name, data)
        }

        fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<()>> {
            self.inner.delete(name)
        }

        fn open_read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<ChunkRead>> {
            Box::pin(async move {
                if !self.cleared.swap(true, Ordering::SeqCst) {
                    for other in self.inner.list().await? {
                        self.inner.delete(&other).await?;
                    }
                }
                self.inner.open_read(name).await
            })
        }

        fn list(&self) -> BoxFuture<'_, StoreResult<Vec<String>>> {
            self.inner.list()
        }
    }

    #[tokio::test]
    async fn receive_absorbs_chunks_deleted_mid_merge() {
        let chunks = Arc::new(FinalizedElsewhere {
            inner: MemoryChunkStore::new(),
            cleared: AtomicBool::new(false),
        });
        let persistent = Arc::new(MemoryPersistentStore::new());
        let config = UploadConfig::default();
        let c = FinalizeCoordinator::new(chunks.clone(), persistent.clone(), &config);

        let upload = c.upload(ResumableParams::new("a.bin", 3, 1, 3)).unwrap();
        assert_eq!(upload.receive(b"abc").await.unwrap(), ChunkOutcome::Stored);
        assert!(persistent.names().is_empty());
        assert!(chunks.inner.is_empty());
    }

    #[tokio::test]
    async fn read_faults_other_than_missing_chunks_still_fail() {
        let (chunks, _persistent, c) = coordinator("");
        chunks.fail_next_reads("3_b.bin_part_0001", 2);

        let upload = c.upload(ResumableParams::new("b.bin", 3, 1, 3)).unwrap();
        let err = upload.receive(b"abc").await.unwrap_err();
        assert!(matches!(err, UploadError::ChunkReadFailure { .. }));
        assert!(chunks.exists("3_b.bin_part_0001").await.unwrap());
    }

    #[tokio::test]
    async fn storage_filename_uses_destination() {
        let (_chunks, _persistent, c) = coordinator("files/");
        let upload = c.upload(ResumableParams::new("r.pdf", 3, 1, 3)).unwrap();
        assert_eq!(upload.storage_filename().unwrap(), "files/3_r.pdf");
    }
}
