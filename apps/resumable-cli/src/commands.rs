use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rand::seq::SliceRandom;
use resumable_protocol::ResumableParams;
use resumable_transfer::{
    ChunkOutcome, Finalized, FinalizeCoordinator, UploadConfig, UploadIdentity, storage_path,
};

pub const DEFAULT_PUSH_CHUNK_SIZE: u64 = 1024 * 1024;

/// `$HOME/.config/resumable/config.json`, or `config.json` when HOME is unset.
pub fn default_config_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home)
            .join(".config")
            .join("resumable")
            .join("config.json"),
        None => PathBuf::from("config.json"),
    }
}

pub fn show_config(config: &UploadConfig, path: &Path, write: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if write {
        config.save(path)?;
        eprintln!("written to {}", path.display());
    }
    Ok(())
}

pub async fn status(
    coordinator: &FinalizeCoordinator,
    filename: &str,
    total_size: u64,
    json: bool,
) -> Result<()> {
    let identity = UploadIdentity::new(total_size, filename)?;
    let status = coordinator.tracker().status(&identity).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Upload:   {}", status.identity);
    println!("State:    {:?}", status.state);
    println!(
        "Stored:   {} / {} bytes ({:.1}%)",
        status.stored_size,
        status.declared_size,
        status.percentage()
    );
    if !status.chunks.is_empty() {
        println!("{:<8} {:>12}  NAME", "INDEX", "SIZE");
        for chunk in &status.chunks {
            println!("{:<8} {:>12}  {}", chunk.index, chunk.size, chunk.name);
        }
    }
    Ok(())
}

/// Byte ranges `(chunk_number, offset, len)` covering `total` bytes.
///
/// An empty file still gets one zero-length chunk so it can finalize.
pub fn plan_chunks(total: u64, chunk_size: u64) -> Vec<(u32, u64, u64)> {
    if total == 0 {
        return vec![(1, 0, 0)];
    }
    let mut plan = Vec::new();
    let mut offset = 0;
    let mut number = 1;
    while offset < total {
        let len = chunk_size.min(total - offset);
        plan.push((number, offset, len));
        offset += len;
        number += 1;
    }
    plan
}

/// Feeds `file` through the upload pipeline chunk by chunk.
///
/// Returns the finalize result, or `None` if the last chunk did not complete
/// the upload (possible when another writer touched the same chunks).
pub async fn push(
    coordinator: &FinalizeCoordinator,
    file: &Path,
    chunk_size: u64,
    name: Option<&str>,
    shuffle: bool,
) -> Result<Option<Finalized>> {
    if chunk_size == 0 {
        bail!("chunk size must be greater than zero");
    }
    let filename = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("cannot derive a filename from {}", file.display()))?,
    };

    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let total = data.len() as u64;

    let mut plan = plan_chunks(total, chunk_size);
    let total_chunks = plan.len() as u32;
    if shuffle {
        plan.shuffle(&mut rand::thread_rng());
    }

    let mut finalized = None;
    for (number, offset, len) in plan {
        let mut params = ResumableParams::new(filename.clone(), total, number, len);
        params.chunk_size = Some(chunk_size);
        params.total_chunks = Some(total_chunks);

        let upload = coordinator.upload(params)?;
        if upload.chunk_exists().await? {
            tracing::debug!(chunk = number, "chunk already stored, skipping");
            continue;
        }
        let bytes = &data[offset as usize..(offset + len) as usize];
        if let ChunkOutcome::Finalized(done) = upload.receive(bytes).await? {
            finalized = Some(done);
        }
    }
    Ok(finalized)
}

pub fn print_push_outcome(outcome: Option<&Finalized>) {
    match outcome {
        Some(done) => {
            println!("Stored as: {}", done.filename);
            println!("Size:      {} bytes", done.size);
            println!("SHA-256:   {}", done.sha256);
        }
        None => println!("Chunks stored; upload not complete yet"),
    }
}

pub async fn finalize(
    coordinator: &FinalizeCoordinator,
    filename: &str,
    total_size: u64,
    to: Option<&str>,
) -> Result<()> {
    let identity = UploadIdentity::new(total_size, filename)?;
    let target = match to {
        Some(to) => to.to_string(),
        None => storage_path(
            coordinator.upload_to(),
            &identity.to_string(),
            chrono::Local::now().naive_local(),
        )?,
    };
    let done = coordinator.collect(&identity, &target).await?;
    print_push_outcome(Some(&done));
    Ok(())
}
