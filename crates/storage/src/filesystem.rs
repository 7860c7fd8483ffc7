//! Local filesystem backends.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::naming::{alternative_name, validate_key, validate_relative_path};
use crate::{BoxFuture, ChunkRead, ChunkStore, PersistentStore};

/// Attempts at finding a free name before giving up.
const MAX_NAME_ATTEMPTS: usize = 100;

// ---------------------------------------------------------------------------
// FsChunkStore
// ---------------------------------------------------------------------------

/// Chunk store backed by a single flat directory.
///
/// Writes go to a hidden temp file that is fsynced and renamed over the
/// target, so readers never observe a half-written chunk under its final name.
#[derive(Debug, Clone)]
pub struct FsChunkStore {
    root: PathBuf,
}

impl FsChunkStore {
    /// Opens (and creates if needed) the chunk directory.
    pub async fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Returns the chunk directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> StoreResult<PathBuf> {
        validate_key(name)?;
        Ok(self.root.join(name))
    }
}

impl ChunkStore for FsChunkStore {
    fn exists<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move {
            let path = self.path(name)?;
            Ok(fs::try_exists(&path).await?)
        })
    }

    fn size<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let path = self.path(name)?;
            let meta = fs::metadata(&path)
                .await
                .map_err(|e| StoreError::from_io(name, e))?;
            Ok(meta.len())
        })
    }

    fn save<'a>(&'a self, name: &'a str, data: &'a [u8]) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let path = self.path(name)?;
            let temp_path = self.root.join(format!(".{name}.tmp.{}", Uuid::new_v4()));

            let written = async {
                let mut file = fs::File::create(&temp_path).await?;
                file.write_all(data).await?;
                file.sync_all().await?;
                fs::rename(&temp_path, &path).await
            }
            .await;

            if let Err(e) = written {
                let _ = fs::remove_file(&temp_path).await;
                return Err(StoreError::Io(e));
            }

            debug!(chunk = name, size = data.len(), "chunk written");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let path = self.path(name)?;
            match fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(chunk = name, "chunk already deleted");
                    Ok(())
                }
                Err(e) => Err(StoreError::Io(e)),
            }
        })
    }

    fn open_read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, StoreResult<ChunkRead>> {
        Box::pin(async move {
            let path = self.path(name)?;
            let file = fs::File::open(&path)
                .await
                .map_err(|e| StoreError::from_io(name, e))?;
            Ok(Box::new(file) as ChunkRead)
        })
    }

    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<String>>> {
        Box::pin(async move {
            let mut names = Vec::new();
            let mut entries = fs::read_dir(&self.root).await?;
            while let Some(entry) = entries.next_entry().await? {
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }
                // Entries can disappear between read_dir and file_type.
                match entry.file_type().await {
                    Ok(ft) if ft.is_file() => names.push(name),
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(StoreError::Io(e)),
                }
            }
            Ok(names)
        })
    }
}

// ---------------------------------------------------------------------------
// FsPersistentStore
// ---------------------------------------------------------------------------

/// Persistent store rooted at a directory; names may contain sub-directories.
///
/// Existing files are never overwritten: a taken name is replaced by an
/// [`alternative_name`] and the file is created with create-new semantics.
#[derive(Debug, Clone)]
pub struct FsPersistentStore {
    root: PathBuf,
}

impl FsPersistentStore {
    /// Opens (and creates if needed) the storage root.
    pub async fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Returns the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn create_available(&self, name: &str) -> StoreResult<(String, fs::File)> {
        let mut candidate = name.to_string();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.root.join(&candidate);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(name = %candidate, "name taken, picking an alternative");
                    candidate = alternative_name(name);
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no available name for {name} after {MAX_NAME_ATTEMPTS} attempts"),
        )))
    }
}

impl PersistentStore for FsPersistentStore {
    fn save<'a>(
        &'a self,
        name: &'a str,
        content: &'a mut (dyn AsyncRead + Send + Unpin),
    ) -> BoxFuture<'a, StoreResult<String>> {
        Box::pin(async move {
            validate_relative_path(name)?;
            let (actual, mut file) = self.create_available(name).await?;
            let path = self.root.join(&actual);

            let copied = async {
                let n = tokio::io::copy(content, &mut file).await?;
                file.sync_all().await?;
                Ok::<u64, std::io::Error>(n)
            }
            .await;

            match copied {
                Ok(size) => {
                    debug!(name = %actual, size, "persistent file written");
                    Ok(actual)
                }
                Err(e) => {
                    drop(file);
                    if let Err(rm) = fs::remove_file(&path).await {
                        warn!(name = %actual, error = %rm, "failed to remove partial file");
                    }
                    Err(StoreError::Io(e))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    async fn read_all(store: &FsChunkStore, name: &str) -> Vec<u8> {
        let mut reader = store.open_read(name).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn chunk_save_and_read() {
        let dir = TempDir::new().unwrap();
        let store = FsChunkStore::new(dir.path().join("chunks")).await.unwrap();

        store.save("10_a.bin_part_0001", b"hello").await.unwrap();
        assert!(store.exists("10_a.bin_part_0001").await.unwrap());
        assert_eq!(store.size("10_a.bin_part_0001").await.unwrap(), 5);
        assert_eq!(read_all(&store, "10_a.bin_part_0001").await, b"hello");
    }

    #[tokio::test]
    async fn chunk_save_replaces_content() {
        let dir = TempDir::new().unwrap();
        let store = FsChunkStore::new(dir.path()).await.unwrap();

        store.save("c", b"first version").await.unwrap();
        store.save("c", b"second").await.unwrap();
        assert_eq!(store.size("c").await.unwrap(), 6);
        assert_eq!(read_all(&store, "c").await, b"second");
        assert_eq!(store.list().await.unwrap(), vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn chunk_size_of_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsChunkStore::new(dir.path()).await.unwrap();
        let err = store.size("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn chunk_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FsChunkStore::new(dir.path()).await.unwrap();
        store.save("c", b"x").await.unwrap();
        store.delete("c").await.unwrap();
        store.delete("c").await.unwrap();
        assert!(!store.exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn chunk_list_skips_hidden_and_directories() {
        let dir = TempDir::new().unwrap();
        let store = FsChunkStore::new(dir.path()).await.unwrap();
        store.save("a", b"1").await.unwrap();
        store.save("b", b"2").await.unwrap();
        std::fs::write(dir.path().join(".a.tmp.123"), b"partial").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let mut names = store.list().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn chunk_rejects_traversal_keys() {
        let dir = TempDir::new().unwrap();
        let store = FsChunkStore::new(dir.path()).await.unwrap();
        let err = store.save("../escape", b"evil").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        let err = store.exists("sub/chunk").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn persistent_save_creates_subdirectories() {
        let dir = TempDir::new().unwrap();
        let store = FsPersistentStore::new(dir.path()).await.unwrap();

        let mut content: &[u8] = b"merged bytes";
        let actual = store.save("2026/10/report.pdf", &mut content).await.unwrap();
        assert_eq!(actual, "2026/10/report.pdf");
        let written = std::fs::read(dir.path().join("2026/10/report.pdf")).unwrap();
        assert_eq!(written, b"merged bytes");
    }

    #[tokio::test]
    async fn persistent_save_renames_on_collision() {
        let dir = TempDir::new().unwrap();
        let store = FsPersistentStore::new(dir.path()).await.unwrap();

        let mut first: &[u8] = b"first";
        let mut second: &[u8] = b"second";
        let a = store.save("file.bin", &mut first).await.unwrap();
        let b = store.save("file.bin", &mut second).await.unwrap();

        assert_eq!(a, "file.bin");
        assert_ne!(b, "file.bin");
        assert!(b.starts_with("file_") && b.ends_with(".bin"));
        assert_eq!(std::fs::read(dir.path().join(&a)).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join(&b)).unwrap(), b"second");
    }

    #[tokio::test]
    async fn persistent_save_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FsPersistentStore::new(dir.path().join("root")).await.unwrap();
        let mut content: &[u8] = b"evil";
        let err = store.save("../outside.bin", &mut content).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert!(!dir.path().join("outside.bin").exists());
    }
}
