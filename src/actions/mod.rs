//! Remediation of flagged files.
//!
//! This module provides functionality for:
//! - Moving flagged files into a quarantine directory
//! - Deleting flagged files (permanently or to the system trash)
//! - The confirm → act → done state machine that records one outcome per file
//!
//! # Isolation
//!
//! Each file is handled independently: a failure on one file becomes a
//! [`OutcomeKind::Failed`] outcome carrying the error text, and the engine
//! moves on to the next file.
//!
//! ```no_run
//! use filevet::actions::{AutoConfirm, RemediationAction, RemediationEngine, RemediationPlan};
//! use filevet::pipeline::FlaggedFile;
//! use std::path::PathBuf;
//!
//! let flagged = vec![FlaggedFile::new(PathBuf::from("/videos/broken.mkv"), "moov atom not found", 0)];
//! let plan = RemediationPlan::new(RemediationAction::Move).with_quarantine_dir("/videos/quarantine");
//! let engine = RemediationEngine::new(flagged, plan);
//! let outcomes = engine.run(&mut AutoConfirm(true), None).unwrap();
//! println!("{:?}", outcomes);
//! ```

pub mod delete;
pub mod prompt;
pub mod quarantine;
pub mod remediate;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use delete::{delete_to_trash, permanent_delete};
pub use prompt::{AutoConfirm, CancellableStdin, Confirm, PromptConfirm};
pub use quarantine::{ensure_quarantine_dir, move_to_quarantine, unique_destination};
pub use remediate::{
    OutcomeKind, RemediationAction, RemediationCallback, RemediationEngine, RemediationOutcome,
    RemediationPlan, RemediationState, CANCELLED_REASON,
};

/// Error type for a single remediation action.
#[derive(Debug, Error)]
pub enum RemediationError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied for the file.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The quarantine directory could not be created.
    #[error("quarantine directory {dir} unavailable: {source}")]
    QuarantineUnavailable {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Moving into quarantine failed.
    #[error("move of {path} to {destination} failed: {message}")]
    MoveFailed {
        path: PathBuf,
        destination: PathBuf,
        message: String,
    },

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    /// Permanent delete operation failed.
    #[error("delete failed for {path}: {message}")]
    DeleteFailed { path: PathBuf, message: String },
}

impl RemediationError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::MoveFailed { path: p, .. }
            | Self::TrashFailed { path: p, .. }
            | Self::DeleteFailed { path: p, .. } => p,
            Self::QuarantineUnavailable { dir, .. } => dir,
        }
    }
}

/// Stat a file, mapping the common failures to their own variants.
pub(crate) fn require_file(path: &Path) -> Result<(), RemediationError> {
    std::fs::symlink_metadata(path)
        .map(|_| ())
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RemediationError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => {
                RemediationError::PermissionDenied(path.to_path_buf())
            }
            _ => RemediationError::DeleteFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })
}
