//! In-memory backends for embedding and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{StoreError, StoreResult};
use crate::naming::{alternative_name, validate_key, validate_relative_path};
use crate::{BoxFuture, ChunkRead, ChunkStore, PersistentStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// MemoryChunkStore
// ---------------------------------------------------------------------------

/// Chunk store keeping every object in a map.
///
/// Supports fault injection through [`fail_next_reads`](Self::fail_next_reads)
/// and [`fail_next_deletes`](Self::fail_next_deletes).
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    read_faults: Mutex<HashMap<String, usize>>,
    delete_faults: Mutex<HashMap<String, usize>>,
}

impl MemoryChunkStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls to `open_read(name)` fail.
    pub fn fail_next_reads(&self, name: &str, count: usize) {
        lock(&self.read_faults).insert(name.to_string(), count);
    }

    /// Makes the next `count` calls to `delete(name)` fail, leaving the object.
    pub fn fail_next_deletes(&self, name: &str, count: usize) {
        lock(&self.delete_faults).insert(name.to_string(), count);
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        lock(&self.objects).is_empty()
    }

    fn take_fault(faults: &Mutex<HashMap<String, usize>>, name: &str) -> bool {
        let mut faults = lock(faults);
        match faults.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

impl ChunkStore for MemoryChunkStore {
    fn exists<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move {
            validate_key(name)?;
            Ok(lock(&self.objects).contains_key(name))
        })
    }

    fn size<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            validate_key(name)?;
            lock(&self.objects)
                .get(name)
                .map(|data| data.len() as u64)
                .ok_or_else(|| StoreError::NotFound(name.to_string()))
        })
    }

    fn save<'a>(&'a self, name: &'a str, data: &'a [u8]) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            validate_key(name)?;
            lock(&self.objects).insert(name.to_string(), data.to_vec());
            Ok(())
        })
    }

    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            validate_key(name)?;
            if Self::take_fault(&self.delete_faults, name) {
                return Err(StoreError::Injected(name.to_string()));
            }
            lock(&self.objects).remove(name);
            Ok(())
        })
    }

    fn open_read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<ChunkRead>> {
        Box::pin(async move {
            validate_key(name)?;
            if Self::take_fault(&self.read_faults, name) {
                return Err(StoreError::Injected(name.to_string()));
            }
            let data = lock(&self.objects)
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
            Ok(Box::new(std::io::Cursor::new(data)) as ChunkRead)
        })
    }

    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<String>>> {
        Box::pin(async move { Ok(lock(&self.objects).keys().cloned().collect()) })
    }
}

// ---------------------------------------------------------------------------
// MemoryPersistentStore
// ---------------------------------------------------------------------------

/// Persistent store keeping finished files in a map.
#[derive(Debug, Default)]
pub struct MemoryPersistentStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    save_faults: Mutex<usize>,
}

impl MemoryPersistentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` saves fail.
    pub fn fail_next_saves(&self, count: usize) {
        *lock(&self.save_faults) = count;
    }

    /// Returns a stored file's content.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.files).get(name).cloned()
    }

    /// Returns every stored name, sorted.
    pub fn names(&self) -> Vec<String> {
        lock(&self.files).keys().cloned().collect()
    }
}

impl PersistentStore for MemoryPersistentStore {
    fn save<'a>(
        &'a self,
        name: &'a str,
        content: &'a mut (dyn AsyncRead + Send + Unpin),
    ) -> BoxFuture<'a, StoreResult<String>> {
        Box::pin(async move {
            validate_relative_path(name)?;
            {
                let mut faults = lock(&self.save_faults);
                if *faults > 0 {
                    *faults -= 1;
                    return Err(StoreError::Injected(name.to_string()));
                }
            }

            let mut data = Vec::new();
            content.read_to_end(&mut data).await?;

            let mut files = lock(&self.files);
            let mut actual = name.to_string();
            while files.contains_key(&actual) {
                actual = alternative_name(name);
            }
            files.insert(actual.clone(), data);
            Ok(actual)
        })
    }
}
