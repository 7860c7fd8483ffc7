use std::path::{Component, Path};

use crate::UploadError;

/// Validates a client-supplied filename.
///
/// Rejects:
/// - Empty names
/// - Path separators (`/` and `\`)
/// - NUL bytes
pub fn validate_filename(filename: &str) -> Result<(), UploadError> {
    if filename.is_empty() || filename.contains(['/', '\\', '\0']) {
        return Err(UploadError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// Validates that a storage path does not escape the persistent store root.
///
/// Rejects:
/// - Empty paths
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_storage_path(path: &str) -> Result<(), UploadError> {
    if path.is_empty() {
        return Err(UploadError::InvalidStoragePath("empty path".into()));
    }

    let p = Path::new(path);

    if p.is_absolute() {
        return Err(UploadError::InvalidStoragePath(format!(
            "absolute path not allowed: {path}"
        )));
    }

    for component in p.components() {
        match component {
            Component::ParentDir => {
                return Err(UploadError::InvalidStoragePath(format!(
                    "parent directory traversal not allowed: {path}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(UploadError::InvalidStoragePath(format!(
                    "absolute path not allowed: {path}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}
