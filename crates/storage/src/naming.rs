//! Key validation and collision-safe alternative names.

use std::path::{Component, Path};

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::{StoreError, StoreResult};

/// Length of the random suffix appended on name collisions.
const ALTERNATIVE_SUFFIX_LEN: usize = 7;

/// Validates a flat chunk key.
///
/// Keys must be non-empty, must not contain path separators or NUL, and must
/// not start with `.` (hidden names are reserved for in-flight temp files).
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("empty key".into()));
    }
    if key.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidKey(format!(
            "separator not allowed in key: {key}"
        )));
    }
    if key.starts_with('.') {
        return Err(StoreError::InvalidKey(format!(
            "hidden key not allowed: {key}"
        )));
    }
    Ok(())
}

/// Validates a relative object path for the persistent store.
///
/// Only normal components are accepted: no root, no prefix, no `.`/`..`.
pub(crate) fn validate_relative_path(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.contains('\0') {
        return Err(StoreError::InvalidKey(format!("invalid path: {name:?}")));
    }
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(StoreError::InvalidKey(format!(
                    "unsafe path component in {name}"
                )));
            }
        }
    }
    Ok(())
}

/// Returns `name` with `_<random>` inserted before the file extension.
///
/// `reports/q1.pdf` becomes e.g. `reports/q1_x7Gk2Qa.pdf`; directories are kept.
pub fn alternative_name(name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ALTERNATIVE_SUFFIX_LEN)
        .map(char::from)
        .collect();

    let (dir, base) = match name.rfind('/') {
        Some(idx) => (&name[..=idx], &name[idx + 1..]),
        None => ("", name),
    };

    let path = Path::new(base);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{dir}{}_{suffix}.{}",
            stem.to_string_lossy(),
            ext.to_string_lossy()
        ),
        _ => format!("{dir}{base}_{suffix}"),
    }
}
