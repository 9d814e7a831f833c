//! Deletion of flagged files.
//!
//! # Overview
//!
//! Two flavours are provided:
//! - [`permanent_delete`]: removes the file, cannot be undone
//! - [`delete_to_trash`]: moves the file to the system trash (recoverable)
//!
//! Both check that the file still exists first so a vanished file reports
//! [`RemediationError::NotFound`] rather than a platform-specific message.
//!
//! # Example
//!
//! ```no_run
//! use filevet::actions::delete::permanent_delete;
//! use std::path::Path;
//!
//! match permanent_delete(Path::new("/videos/broken.mkv")) {
//!     Ok(()) => println!("deleted"),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::Path;

use super::{require_file, RemediationError};

/// Move a single file to the system trash.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if the file cannot be accessed
/// - `TrashFailed` if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<(), RemediationError> {
    require_file(path)?;

    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        RemediationError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {}", path.display());
    Ok(())
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `DeleteFailed` for any other failure
pub fn permanent_delete(path: &Path) -> Result<(), RemediationError> {
    require_file(path)?;

    fs::remove_file(path).map_err(|e| {
        log::error!("Delete failed for {}: {}", path.display(), e);
        match e.kind() {
            io::ErrorKind::NotFound => RemediationError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => {
                RemediationError::PermissionDenied(path.to_path_buf())
            }
            _ => RemediationError::DeleteFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        }
    })?;

    log::info!("Permanently deleted: {}", path.display());
    Ok(())
}
