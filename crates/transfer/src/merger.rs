//! Ordered merge of stored chunks into a temporary file.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use resumable_storage::StoreResult;
use sha2::{Digest, Sha256};
use tempfile::TempPath;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::UploadError;
use crate::addressing::UploadIdentity;
use crate::tracker::UploadTracker;

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// A merged upload waiting to be handed to the persistent store.
///
/// Owns a temporary file that is removed when this value is dropped, on the
/// success path and the failure path alike.
pub struct MergedUpload {
    file: tokio::fs::File,
    path: TempPath,
    size: u64,
    sha256: String,
    chunks: Vec<String>,
}

impl MergedUpload {
    /// Reader positioned at the start of the merged content.
    pub fn reader(&mut self) -> &mut tokio::fs::File {
        &mut self.file
    }

    /// Total merged size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hex SHA-256 of the merged content.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Chunk names merged, in order.
    pub fn chunk_names(&self) -> &[String] {
        &self.chunks
    }

    /// Location of the temporary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the temporary file now, reporting any error.
    pub fn close(self) -> std::io::Result<()> {
        drop(self.file);
        self.path.close()
    }
}

/// Concatenates the chunks of a complete upload in index order.
#[derive(Clone)]
pub struct Merger {
    tracker: UploadTracker,
    temp_dir: Option<PathBuf>,
}

impl Merger {
    /// `temp_dir` selects where merged files are staged (system temp dir if `None`).
    pub fn new(tracker: UploadTracker, temp_dir: Option<PathBuf>) -> Self {
        Self { tracker, temp_dir }
    }

    /// Merges the chunks of `identity`.
    ///
    /// Fails with [`UploadError::IncompleteUpload`] unless the stored bytes
    /// equal the declared total, both before and after reading the chunks.
    /// Each chunk read is retried once before giving up with
    /// [`UploadError::ChunkReadFailure`].
    pub async fn merge(&self, identity: &UploadIdentity) -> Result<MergedUpload, UploadError> {
        let status = self.tracker.status(identity).await?;
        let declared = identity.total_size();
        if status.stored_size != declared {
            return Err(UploadError::IncompleteUpload {
                identity: identity.to_string(),
                stored: status.stored_size,
                declared,
            });
        }

        let (std_file, path) = self.create_temp().await?.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);
        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let mut chunks = Vec::with_capacity(status.chunks.len());

        for chunk in status.chunks {
            let data = self.read_chunk(&chunk.name).await?;
            hasher.update(&data);
            file.write_all(&data).await.map_err(UploadError::TempFile)?;
            size += data.len() as u64;
            chunks.push(chunk.name);
        }

        // A chunk overwritten mid-merge changes the total.
        if size != declared {
            warn!(
                upload = %identity,
                merged = size,
                declared,
                "merged size differs from declared size"
            );
            return Err(UploadError::IncompleteUpload {
                identity: identity.to_string(),
                stored: size,
                declared,
            });
        }

        file.flush().await.map_err(UploadError::TempFile)?;
        file.seek(SeekFrom::Start(0))
            .await
            .map_err(UploadError::TempFile)?;

        let sha256 = hex::encode(hasher.finalize());
        debug!(
            upload = %identity,
            chunks = chunks.len(),
            size,
            sha256 = %sha256,
            "chunks merged"
        );

        Ok(MergedUpload {
            file,
            path,
            size,
            sha256,
            chunks,
        })
    }

    async fn create_temp(&self) -> Result<tempfile::NamedTempFile, UploadError> {
        let dir = self.temp_dir.clone();
        tokio::task::spawn_blocking(move || {
            let mut builder = tempfile::Builder::new();
            builder.prefix("resumable-").suffix(".merge");
            match dir {
                Some(dir) => builder.tempfile_in(dir),
                None => builder.tempfile(),
            }
        })
        .await
        .map_err(|e| UploadError::TempFile(std::io::Error::other(e)))?
        .map_err(UploadError::TempFile)
    }

    async fn read_chunk(&self, name: &str) -> Result<Vec<u8>, UploadError> {
        match self.try_read(name).await {
            Ok(data) => Ok(data),
            Err(first) => {
                warn!(chunk = name, error = %first, "chunk read failed, retrying once");
                self.try_read(name)
                    .await
                    .map_err(|source| UploadError::ChunkReadFailure {
                        name: name.to_string(),
                        source,
                    })
            }
        }
    }

    async fn try_read(&self, name: &str) -> StoreResult<Vec<u8>> {
        let mut reader = self.tracker.store().open_read(name).await?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        Ok(data)
    }
}
