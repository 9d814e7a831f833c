//! Moving flagged files into a quarantine directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{require_file, RemediationError};

/// Create the quarantine directory if it does not exist yet.
///
/// Calling this repeatedly is harmless.
///
/// # Errors
///
/// Returns [`RemediationError::QuarantineUnavailable`] if the directory
/// cannot be created or a non-directory exists at that path.
pub fn ensure_quarantine_dir(dir: &Path) -> Result<(), RemediationError> {
    fs::create_dir_all(dir).map_err(|source| RemediationError::QuarantineUnavailable {
        dir: dir.to_path_buf(),
        source,
    })?;

    if !dir.is_dir() {
        return Err(RemediationError::QuarantineUnavailable {
            dir: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "not a directory"),
        });
    }
    Ok(())
}

/// Pick a free destination for `file_name` inside `dir`.
///
/// Existing names get a numeric suffix: `clip.mkv`, `clip (1).mkv`, ...
///
/// # Example
///
/// ```no_run
/// use filevet::actions::unique_destination;
/// use std::ffi::OsStr;
/// use std::path::Path;
///
/// let dest = unique_destination(Path::new("/quarantine"), OsStr::new("clip.mkv"));
/// println!("{}", dest.display());
/// ```
#[must_use]
pub fn unique_destination(dir: &Path, file_name: &std::ffi::OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u32..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Move `path` into `dir`, returning its new location.
///
/// A rename is tried first; when that fails (e.g. across filesystems) the
/// file is copied and the original removed.
///
/// # Errors
///
/// - `NotFound` / `PermissionDenied` if the source cannot be accessed
/// - `MoveFailed` if neither rename nor copy succeeds
pub fn move_to_quarantine(path: &Path, dir: &Path) -> Result<PathBuf, RemediationError> {
    require_file(path)?;

    let file_name = path.file_name().ok_or_else(|| RemediationError::MoveFailed {
        path: path.to_path_buf(),
        destination: dir.to_path_buf(),
        message: "path has no file name".to_string(),
    })?;
    let destination = unique_destination(dir, file_name);

    let move_failed = |e: io::Error| RemediationError::MoveFailed {
        path: path.to_path_buf(),
        destination: destination.clone(),
        message: e.to_string(),
    };

    match fs::rename(path, &destination) {
        Ok(()) => {}
        Err(rename_err) => {
            log::debug!(
                "Rename of {} failed ({}), falling back to copy",
                path.display(),
                rename_err
            );
            copy_then_remove(path, &destination).map_err(move_failed)?;
        }
    }

    log::info!(
        "Quarantined: {} -> {}",
        path.display(),
        destination.display()
    );
    Ok(destination)
}

/// Copy `path` to `destination`, then remove `path`.
///
/// On any failure the copy at `destination` (complete or partial) is removed
/// and `path` is left in place.
fn copy_then_remove(path: &Path, destination: &Path) -> io::Result<()> {
    let result = fs::copy(path, destination).and_then(|_| fs::remove_file(path));
    if result.is_err() {
        let _ = fs::remove_file(destination);
    }
    result
}
