//! Storage roles used by resumable upload reassembly.
//!
//! Two narrow interfaces:
//! - [`ChunkStore`] holds transient chunk bytes keyed by a flat name.
//! - [`PersistentStore`] receives the merged file and reports the name it
//!   was actually stored under.
//!
//! Backends: local filesystem and in-memory.

mod config;
mod error;
pub mod filesystem;
pub mod memory;
mod naming;

use std::future::Future;
use std::pin::Pin;

use tokio::io::AsyncRead;

pub use config::{StorageConfig, chunk_store_from_config, persistent_store_from_config};
pub use error::{StoreError, StoreResult};
pub use filesystem::{FsChunkStore, FsPersistentStore};
pub use memory::{MemoryChunkStore, MemoryPersistentStore};
pub use naming::{alternative_name, validate_key};

/// Boxed future returned by the storage traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reader over the bytes of a single stored chunk.
pub type ChunkRead = Box<dyn AsyncRead + Send + Unpin>;

/// Transient blob store for chunk bytes.
///
/// Every call addresses a single named object; the store is responsible for
/// the atomicity of `save` and `delete` on that object. No cross-object
/// guarantees are assumed.
pub trait ChunkStore: Send + Sync {
    /// Returns `true` if an object with this name exists.
    fn exists<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<bool>>;

    /// Returns the stored byte length. Fails with [`StoreError::NotFound`]
    /// if the object is absent.
    fn size<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<u64>>;

    /// Stores `data` under `name`, replacing any previous content.
    fn save<'a>(&'a self, name: &'a str, data: &'a [u8]) -> BoxFuture<'a, StoreResult<()>>;

    /// Removes the object. Deleting a missing object succeeds.
    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<()>>;

    /// Opens the object for reading.
    fn open_read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<ChunkRead>>;

    /// Lists every object name in the store (flat namespace, unordered).
    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<String>>>;
}

/// Durable store for finished uploads.
pub trait PersistentStore: Send + Sync {
    /// Stores the content read from `content` under `name` (or an available
    /// alternative if `name` is taken) and returns the name actually used.
    fn save<'a>(
        &'a self,
        name: &'a str,
        content: &'a mut (dyn AsyncRead + Send + Unpin),
    ) -> BoxFuture<'a, StoreResult<String>>;
}
