//! Deterministic names for uploads, chunks and final files.

use std::fmt::{self, Write as _};

use chrono::NaiveDateTime;

use crate::validation::{validate_filename, validate_storage_path};
use crate::{DEFAULT_CHUNK_SUFFIX, DEFAULT_INDEX_WIDTH, UploadError};

/// Identity of one logical upload: declared total size plus filename.
///
/// Renders as `"<total_size>_<filename>"`, which is the prefix of every
/// chunk name belonging to the upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadIdentity {
    total_size: u64,
    filename: String,
}

impl UploadIdentity {
    /// Validates `filename` and builds the identity. No I/O happens here.
    pub fn new(total_size: u64, filename: impl Into<String>) -> Result<Self, UploadError> {
        let filename = filename.into();
        validate_filename(&filename)?;
        Ok(Self {
            total_size,
            filename,
        })
    }

    /// Declared total size in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Client-supplied filename.
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl fmt::Display for UploadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.total_size, self.filename)
    }
}

/// Returns the identity string for `(total_size, filename)`.
pub fn upload_identity(total_size: u64, filename: &str) -> Result<String, UploadError> {
    Ok(UploadIdentity::new(total_size, filename)?.to_string())
}

/// Chunk naming scheme: `<identity><suffix><zero-padded index>`.
///
/// `index_width` must cover the largest chunk count in use; wider indices
/// still parse, but lose the "lexicographic order equals numeric order"
/// property for other tools looking at the raw store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkNaming {
    suffix: String,
    index_width: usize,
}

impl Default for ChunkNaming {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SUFFIX, DEFAULT_INDEX_WIDTH)
    }
}

impl ChunkNaming {
    pub fn new(suffix: impl Into<String>, index_width: usize) -> Self {
        Self {
            suffix: suffix.into(),
            index_width,
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn index_width(&self) -> usize {
        self.index_width
    }

    /// Name of chunk `index` (1-based) of `identity`.
    pub fn chunk_name(&self, identity: &UploadIdentity, index: u32) -> Result<String, UploadError> {
        if index == 0 {
            return Err(UploadError::InvalidChunkNumber(index));
        }
        Ok(format!(
            "{}{index:0width$}",
            self.prefix(identity),
            width = self.index_width
        ))
    }

    /// Common prefix of every chunk of `identity`.
    pub fn prefix(&self, identity: &UploadIdentity) -> String {
        format!("{identity}{}", self.suffix)
    }

    /// Parses the chunk index out of `name` if it belongs to `identity`.
    ///
    /// The part after the prefix must be all ASCII digits, so an upload
    /// named `10_a_part_x` never claims chunks of `10_a`.
    pub fn chunk_index(&self, identity: &UploadIdentity, name: &str) -> Option<u32> {
        let rest = name.strip_prefix(&self.prefix(identity))?;
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        rest.parse().ok()
    }
}

/// Final storage path: `upload_to` expanded with strftime codes at `now`,
/// joined with `filename` using `/`.
///
/// Empty and `.` segments are dropped; absolute results and `..` are rejected.
pub fn storage_path(
    upload_to: &str,
    filename: &str,
    now: NaiveDateTime,
) -> Result<String, UploadError> {
    let mut dir = String::new();
    write!(dir, "{}", now.format(upload_to)).map_err(|_| {
        UploadError::InvalidStoragePath(format!("invalid date format in {upload_to:?}"))
    })?;

    if dir.starts_with('/') || dir.starts_with('\\') {
        return Err(UploadError::InvalidStoragePath(format!(
            "absolute upload destination not allowed: {dir}"
        )));
    }

    let mut segments: Vec<&str> = dir
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    segments.push(filename);
    let path = segments.join("/");

    validate_storage_path(&path)?;
    Ok(path)
}
