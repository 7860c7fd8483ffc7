//! Server-side reassembly of files uploaded in chunks.
//!
//! Clients split a file into numbered chunks and send them independently,
//! in any order and possibly more than once. This crate stores each chunk
//! under a deterministic name, derives completeness from what is actually
//! in the chunk store, merges the chunks in index order and hands the result
//! to a persistent store before removing the chunks.
//!
//! No upload session is persisted anywhere: every question ("which chunks
//! are there?", "is it complete?") is answered by listing the chunk store.

mod addressing;
mod config;
mod coordinator;
mod merger;
mod resumable;
mod tracker;
mod types;
mod validation;

use resumable_protocol::ParamError;
use resumable_storage::StoreError;

pub use addressing::{ChunkNaming, UploadIdentity, storage_path, upload_identity};
pub use config::{ConfigError, UploadConfig};
pub use coordinator::FinalizeCoordinator;
pub use merger::{MergedUpload, Merger, checksum_bytes};
pub use resumable::ResumableUpload;
pub use tracker::UploadTracker;
pub use types::{ChunkInfo, ChunkOutcome, Finalized, UploadState, UploadStatus};
pub use validation::{validate_filename, validate_storage_path};

/// Default separator between upload identity and chunk index.
pub const DEFAULT_CHUNK_SUFFIX: &str = "_part_";

/// Default zero-padding width of chunk indices (up to 9999 chunks).
pub const DEFAULT_INDEX_WIDTH: usize = 4;

/// Errors produced by the upload core.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("invalid chunk number: {0}")]
    InvalidChunkNumber(u32),

    #[error("invalid storage path: {0}")]
    InvalidStoragePath(String),

    #[error("upload {identity} incomplete: {stored} of {declared} bytes stored")]
    IncompleteUpload {
        identity: String,
        stored: u64,
        declared: u64,
    },

    #[error("failed to read chunk {name}: {source}")]
    ChunkReadFailure {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("chunk store error: {0}")]
    ChunkStore(#[source] StoreError),

    #[error("persistent store error: {0}")]
    PersistentStore(#[source] StoreError),

    #[error("temporary file error: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("invalid request: {0}")]
    Params(#[from] ParamError),
}

impl UploadError {
    /// Returns `true` if repeating the operation later may succeed without
    /// the client changing its request.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::InvalidFilename(_)
            | UploadError::InvalidChunkNumber(_)
            | UploadError::InvalidStoragePath(_)
            | UploadError::Params(_) => false,
            UploadError::IncompleteUpload { .. }
            | UploadError::ChunkReadFailure { .. }
            | UploadError::ChunkStore(_)
            | UploadError::PersistentStore(_)
            | UploadError::TempFile(_) => true,
        }
    }
}
