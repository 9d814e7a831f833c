//! File discovery.
//!
//! This module provides:
//! - Parallel directory walking using jwalk, in stable sorted order
//! - A case-insensitive extension allow-list
//! - De-duplication of files reachable from overlapping roots
//!
//! # Example
//!
//! ```no_run
//! use filevet::scanner::{Walker, WalkerConfig};
//! use std::path::PathBuf;
//!
//! let walker = Walker::new(vec![PathBuf::from(".")], WalkerConfig::default());
//! let (files, errors) = walker.discover();
//! for e in &errors {
//!     eprintln!("Warning: {}", e);
//! }
//! println!("{} files to verify", files.len());
//! ```

pub mod walker;

use std::path::{Path, PathBuf};

pub use walker::Walker;

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Lowercase extensions without dots; empty accepts every file.
    pub extensions: Vec<String>,

    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Directories never descended into, such as the quarantine directory.
    pub exclude_dirs: Vec<PathBuf>,
}

impl WalkerConfig {
    /// Configuration accepting only the given extensions.
    ///
    /// ```
    /// use filevet::scanner::WalkerConfig;
    /// use std::path::Path;
    ///
    /// let config = WalkerConfig::with_extensions([".MKV", "mp4"]);
    /// assert!(config.matches_extension(Path::new("/v/clip.mkv")));
    /// assert!(config.matches_extension(Path::new("/v/CLIP.MP4")));
    /// assert!(!config.matches_extension(Path::new("/v/clip.avi")));
    /// ```
    #[must_use]
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            ..Self::default()
        }
    }

    /// Also skip everything under `dir`.
    #[must_use]
    pub fn with_excluded_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude_dirs.push(dir.into());
        self
    }

    /// Whether `path` passes the allow-list.
    #[must_use]
    pub fn matches_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

/// Errors that can occur during discovery.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
