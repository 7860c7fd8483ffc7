use serde::{Deserialize, Serialize};

/// Upload state as derived from the chunk store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadState {
    /// No chunk of this upload is stored.
    #[serde(rename = "absent")]
    Absent,
    /// Some chunks stored, fewer bytes than declared.
    #[serde(rename = "collecting")]
    Collecting,
    /// Stored bytes equal the declared total.
    #[serde(rename = "complete")]
    Complete,
    /// More bytes stored than declared (duplicated or corrupt chunks).
    #[serde(rename = "oversized")]
    Oversized,
}

impl UploadState {
    /// Classifies `stored` bytes spread over `chunk_count` chunks against `declared`.
    pub fn classify(chunk_count: usize, stored: u64, declared: u64) -> Self {
        if chunk_count == 0 {
            return UploadState::Absent;
        }
        match stored.cmp(&declared) {
            std::cmp::Ordering::Less => UploadState::Collecting,
            std::cmp::Ordering::Equal => UploadState::Complete,
            std::cmp::Ordering::Greater => UploadState::Oversized,
        }
    }
}

/// One stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub name: String,
    pub index: u32,
    pub size: u64,
}

/// Snapshot of an upload, recomputed from the chunk store on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    pub identity: String,
    pub declared_size: u64,
    pub stored_size: u64,
    pub state: UploadState,
    /// Chunks in ascending index order.
    pub chunks: Vec<ChunkInfo>,
}

impl UploadStatus {
    /// Returns stored bytes as a percentage (0-100) of the declared size.
    pub fn percentage(&self) -> f64 {
        if self.declared_size == 0 {
            return 0.0;
        }
        self.stored_size as f64 / self.declared_size as f64 * 100.0
    }

    /// Indices in `1..=total_chunks` with no stored chunk.
    pub fn missing_indices(&self, total_chunks: u32) -> Vec<u32> {
        (1..=total_chunks)
            .filter(|i| !self.chunks.iter().any(|c| c.index == *i))
            .collect()
    }
}

/// Result of a successful finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalized {
    /// Name assigned by the persistent store (may differ from the requested one).
    pub filename: String,
    pub size: u64,
    /// Hex SHA-256 of the merged content.
    pub sha256: String,
}

/// What happened to an incoming chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Chunk stored; the upload is not complete yet.
    Stored,
    /// Chunk stored, the upload was complete and has been finalized.
    Finalized(Finalized),
}
