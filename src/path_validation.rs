use std::path::Path;

use crate::error::PathError;

/// Maximum allowed path length
const MAX_PATH_LENGTH: usize = 4096;

/// Check that both roots are existing, accessible directories.
///
/// Must pass before any synchronize or watch start. Has no side effects.
pub fn validate(source: &Path, destination: &Path) -> Result<(), PathError> {
    if !is_accessible_dir(source) {
        return Err(PathError::InvalidSource(source.to_path_buf()));
    }
    if !is_accessible_dir(destination) {
        return Err(PathError::InvalidDestination(destination.to_path_buf()));
    }
    Ok(())
}

/// Single-root variant used by the watcher.
pub fn validate_source(source: &Path) -> Result<(), PathError> {
    if is_accessible_dir(source) {
        Ok(())
    } else {
        Err(PathError::InvalidSource(source.to_path_buf()))
    }
}

fn is_accessible_dir(path: &Path) -> bool {
    let raw = path.as_os_str();
    if raw.is_empty() || raw.len() > MAX_PATH_LENGTH {
        return false;
    }

    // metadata() follows symlinks, so a link to a directory is accepted
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::read_dir(path).is_ok(),
        _ => false,
    }
}
