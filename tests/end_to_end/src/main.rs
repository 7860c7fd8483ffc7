fn main() {
    println!("Run `cargo test -p end-to-end` to execute the filesystem upload scenarios.");
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use resumable_protocol::ResumableParams;
    use resumable_storage::{
        ChunkStore, StorageConfig, chunk_store_from_config, persistent_store_from_config,
    };
    use resumable_transfer::{ChunkOutcome, FinalizeCoordinator, UploadConfig, UploadState};
    use tempfile::TempDir;

    /// Configuration with both stores on disk under `root`.
    fn fs_config(root: &Path, upload_to: &str) -> UploadConfig {
        UploadConfig {
            upload_to: upload_to.into(),
            chunk_storage: StorageConfig::Filesystem {
                path: root.join("chunks"),
            },
            persistent_storage: StorageConfig::Filesystem {
                path: root.join("files"),
            },
            ..Default::default()
        }
    }

    async fn coordinator(config: &UploadConfig) -> FinalizeCoordinator {
        let chunks = chunk_store_from_config(&config.chunk_storage).await.unwrap();
        let persistent = persistent_store_from_config(&config.persistent_storage)
            .await
            .unwrap();
        FinalizeCoordinator::new(chunks, persistent, config)
    }

    async fn send(
        c: &FinalizeCoordinator,
        filename: &str,
        total: u64,
        number: u32,
        data: &[u8],
    ) -> ChunkOutcome {
        c.upload(ResumableParams::new(filename, total, number, data.len() as u64))
            .unwrap()
            .receive(data)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn out_of_order_chunks_land_as_one_file() {
        let dir = TempDir::new().unwrap();
        let config = fs_config(dir.path(), "");
        let c = coordinator(&config).await;

        assert_eq!(send(&c, "a.bin", 10, 2, b"7890").await, ChunkOutcome::Stored);
        let done = match send(&c, "a.bin", 10, 1, b"123456").await {
            ChunkOutcome::Finalized(done) => done,
            other => panic!("expected finalize, got {other:?}"),
        };

        assert_eq!(done.filename, "10_a.bin");
        assert_eq!(done.size, 10);
        let written = std::fs::read(dir.path().join("files").join("10_a.bin")).unwrap();
        assert_eq!(written, b"1234567890");
        assert!(c.tracker().store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunks_survive_a_restart() {
        let dir = TempDir::new().unwrap();
        let config = fs_config(dir.path(), "");

        {
            let before = coordinator(&config).await;
            assert_eq!(send(&before, "r.txt", 6, 1, b"abc").await, ChunkOutcome::Stored);
        }

        let after = coordinator(&config).await;
        let probe = after
            .upload(ResumableParams::new("r.txt", 6, 1, 3))
            .unwrap();
        assert!(probe.chunk_exists().await.unwrap());
        assert_eq!(probe.status().await.unwrap().state, UploadState::Collecting);

        match send(&after, "r.txt", 6, 2, b"def").await {
            ChunkOutcome::Finalized(done) => assert_eq!(done.filename, "6_r.txt"),
            other => panic!("expected finalize, got {other:?}"),
        }
        let written = std::fs::read(dir.path().join("files").join("6_r.txt")).unwrap();
        assert_eq!(written, b"abcdef");
    }

    #[tokio::test]
    async fn existing_file_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let config = fs_config(dir.path(), "media");
        let existing = dir.path().join("files").join("media").join("5_x.txt");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"older").unwrap();

        let c = coordinator(&config).await;
        let done = match send(&c, "x.txt", 5, 1, b"newer").await {
            ChunkOutcome::Finalized(done) => done,
            other => panic!("expected finalize, got {other:?}"),
        };

        assert_ne!(done.filename, "media/5_x.txt");
        assert!(done.filename.starts_with("media/5_x_"));
        assert!(done.filename.ends_with(".txt"));
        assert_eq!(std::fs::read(&existing).unwrap(), b"older");
        let written = std::fs::read(dir.path().join("files").join(&done.filename)).unwrap();
        assert_eq!(written, b"newer");
    }

    #[tokio::test]
    async fn other_uploads_keep_their_chunks() {
        let dir = TempDir::new().unwrap();
        let config = fs_config(dir.path(), "");
        let c = coordinator(&config).await;

        assert_eq!(send(&c, "b.bin", 8, 1, b"1234").await, ChunkOutcome::Stored);
        assert!(matches!(
            send(&c, "a.bin", 4, 1, b"wxyz").await,
            ChunkOutcome::Finalized(_)
        ));

        let left = c.tracker().store().list().await.unwrap();
        assert_eq!(left, vec!["8_b.bin_part_0001".to_string()]);
    }

    #[tokio::test]
    async fn form_fields_drive_the_upload() {
        let dir = TempDir::new().unwrap();
        let config = fs_config(dir.path(), "");
        let c = coordinator(&config).await;

        let fields = [
            ("resumableChunkNumber", "1"),
            ("resumableChunkSize", "1048576"),
            ("resumableCurrentChunkSize", "3"),
            ("resumableTotalSize", "3"),
            ("resumableType", "text/plain"),
            ("resumableIdentifier", "3-notetxt"),
            ("resumableFilename", "note.txt"),
            ("resumableRelativePath", "note.txt"),
            ("resumableTotalChunks", "1"),
        ];
        let upload = c.upload_from_pairs(fields).unwrap();
        assert_eq!(upload.params().total_chunks, Some(1));
        assert_eq!(upload.params().content_type.as_deref(), Some("text/plain"));

        match upload.receive(b"hey").await.unwrap() {
            ChunkOutcome::Finalized(done) => assert_eq!(done.filename, "3_note.txt"),
            other => panic!("expected finalize, got {other:?}"),
        }
    }
}
