//! External verification of individual files.
//!
//! # Overview
//!
//! The pipeline treats the verification tool as a black box: it is handed a
//! path and answers with diagnostic text. Empty output (after trimming) means
//! the file passed; anything else flags the file.
//!
//! - [`Verifier`]: the seam the scheduler dispatches through
//! - [`command`]: runs a user-supplied command template per file
//! - [`hasher`]: content digests for duplicate detection
//!
//! # Example
//!
//! ```no_run
//! use filevet::verifier::{CommandVerifier, Verifier};
//! use std::path::Path;
//! use std::sync::atomic::AtomicBool;
//!
//! let verifier = CommandVerifier::from_template("ffmpeg -v error -i {filePath} -f null -").unwrap();
//! let cancel = AtomicBool::new(false);
//! let diagnostic = verifier.verify(Path::new("movie.mkv"), &cancel).unwrap();
//! println!("flagged: {}", !diagnostic.trim().is_empty());
//! ```

pub mod command;
pub mod hasher;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use thiserror::Error;

pub use command::{CommandTemplate, CommandVerifier, TemplateError, PLACEHOLDER};
pub use hasher::{ContentHasher, HashAlgorithm, HashFault};

/// Runs the integrity check for a single file.
///
/// Implementations must return promptly once `cancel` becomes `true`,
/// terminating any external process they started.
pub trait Verifier: Send + Sync {
    /// Verify one file and return the tool's diagnostic output.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationFault`] when the tool could not be run at all.
    fn verify(&self, path: &Path, cancel: &AtomicBool) -> Result<String, InvocationFault>;
}

/// The verification tool could not produce a verdict for a file.
#[derive(Debug, Error)]
pub enum InvocationFault {
    /// The external process could not be started.
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the external process failed.
    #[error("failed to wait for verifier on {path}: {source}")]
    Wait {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled and the process terminated.
    #[error("verification cancelled for {0}")]
    Cancelled(PathBuf),

    /// The verifier panicked.
    #[error("verifier panicked on {path}: {message}")]
    Panicked { path: PathBuf, message: String },
}

impl InvocationFault {
    /// Whether this fault was caused by cancellation rather than the tool.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Verdict for one file, produced exactly once per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Path that was verified
    pub path: PathBuf,
    /// Whether the file failed verification (or could not be verified)
    pub is_flagged: bool,
    /// Trimmed diagnostic output, or the fault text
    pub diagnostic: String,
    /// Content digest, present only when duplicate detection is enabled
    pub content_hash: Option<String>,
    /// Why the content digest is missing, if hashing was attempted and failed
    pub hash_fault: Option<String>,
}

impl AnalysisResult {
    /// Build a result from the verifier's diagnostic output.
    ///
    /// # Example
    ///
    /// ```
    /// use filevet::verifier::AnalysisResult;
    /// use std::path::PathBuf;
    ///
    /// let ok = AnalysisResult::from_diagnostic(PathBuf::from("a.mp4"), "  \n".to_string());
    /// assert!(!ok.is_flagged);
    ///
    /// let bad = AnalysisResult::from_diagnostic(PathBuf::from("b.mp4"), "moov atom not found\n".to_string());
    /// assert!(bad.is_flagged);
    /// assert_eq!(bad.diagnostic, "moov atom not found");
    /// ```
    #[must_use]
    pub fn from_diagnostic(path: PathBuf, diagnostic: String) -> Self {
        let diagnostic = diagnostic.trim().to_string();
        Self {
            path,
            is_flagged: !diagnostic.is_empty(),
            diagnostic,
            content_hash: None,
            hash_fault: None,
        }
    }

    /// Build a flagged result from an invocation fault.
    ///
    /// Integrity could not be confirmed, so the file is treated as flagged.
    #[must_use]
    pub fn from_fault(path: PathBuf, fault: &InvocationFault) -> Self {
        Self {
            path,
            is_flagged: true,
            diagnostic: fault.to_string(),
            content_hash: None,
            hash_fault: None,
        }
    }

    /// Attach the outcome of content hashing.
    #[must_use]
    pub fn with_hash(mut self, hash: Result<String, HashFault>) -> Self {
        match hash {
            Ok(hex) => self.content_hash = Some(hex),
            Err(fault) => self.hash_fault = Some(fault.to_string()),
        }
        self
    }
}
