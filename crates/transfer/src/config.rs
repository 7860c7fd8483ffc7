//! Upload configuration.
//!
//! Stored as JSON; every field is optional on disk and falls back to its
//! default, so a partial file only overrides what it names.

use std::path::{Path, PathBuf};

use resumable_storage::StorageConfig;
use serde::{Deserialize, Serialize};

use crate::addressing::ChunkNaming;
use crate::{DEFAULT_CHUNK_SUFFIX, DEFAULT_INDEX_WIDTH};

/// Largest index width that still fits a `u32` chunk number.
const MAX_INDEX_WIDTH: usize = 10;

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration shared by the tracker, merger and coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadConfig {
    /// Separator between upload identity and chunk index.
    pub chunk_suffix: String,
    /// Zero-padding width of chunk indices.
    pub index_width: usize,
    /// Directory for merged temp files (system temp dir if unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    /// Destination prefix for finished files; strftime codes allowed.
    pub upload_to: String,
    pub chunk_storage: StorageConfig,
    pub persistent_storage: StorageConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_suffix: DEFAULT_CHUNK_SUFFIX.into(),
            index_width: DEFAULT_INDEX_WIDTH,
            temp_dir: None,
            upload_to: String::new(),
            chunk_storage: StorageConfig::Filesystem {
                path: std::env::temp_dir().join("resumable-chunks"),
            },
            persistent_storage: StorageConfig::Filesystem {
                path: PathBuf::from("uploads"),
            },
        }
    }
}

impl UploadConfig {
    /// Loads configuration from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: UploadConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes configuration to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_suffix.is_empty() {
            return Err(ConfigError::Invalid("chunkSuffix must not be empty".into()));
        }
        if self.chunk_suffix.contains(['/', '\\', '\0']) {
            return Err(ConfigError::Invalid(format!(
                "chunkSuffix must not contain separators: {:?}",
                self.chunk_suffix
            )));
        }
        if !(1..=MAX_INDEX_WIDTH).contains(&self.index_width) {
            return Err(ConfigError::Invalid(format!(
                "indexWidth must be between 1 and {MAX_INDEX_WIDTH}, got {}",
                self.index_width
            )));
        }
        Ok(())
    }

    /// Chunk naming scheme described by this configuration.
    pub fn naming(&self) -> ChunkNaming {
        ChunkNaming::new(self.chunk_suffix.clone(), self.index_width)
    }
}
