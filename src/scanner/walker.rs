//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! [`Walker`] turns one or more roots into the ordered list of files to
//! verify. Directory children are sorted by name so discovery order (and
//! with it every sequence number downstream) is stable between runs.
//!
//! # Example
//!
//! ```no_run
//! use filevet::scanner::{Walker, WalkerConfig};
//! use std::path::PathBuf;
//!
//! let config = WalkerConfig::with_extensions(["mkv", "mp4"]);
//! let walker = Walker::new(vec![PathBuf::from("/videos")], config);
//! let (files, errors) = walker.discover();
//! println!("{} files, {} unreadable entries", files.len(), errors.len());
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

use super::{ScanError, WalkerConfig};

/// Multi-root file discovery.
#[derive(Debug)]
pub struct Walker {
    roots: Vec<PathBuf>,
    config: WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a walker over `roots` (directories or single files).
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, config: WalkerConfig) -> Self {
        Self {
            roots,
            config,
            shutdown_flag: None,
        }
    }

    /// Stop discovery early when `flag` becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Collect every matching file in discovery order.
    ///
    /// Files reachable from more than one root are listed once. Unreadable
    /// entries are logged and returned separately; they never stop the walk.
    #[must_use]
    pub fn discover(&self) -> (Vec<PathBuf>, Vec<ScanError>) {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        let mut errors = Vec::new();

        for root in &self.roots {
            for item in self.walk_root(root) {
                match item {
                    Ok(path) => {
                        if seen.insert(path.clone()) {
                            files.push(path);
                        } else {
                            log::trace!("Already discovered: {}", path.display());
                        }
                    }
                    Err(e) => errors.push(e),
                }
            }
        }

        log::info!(
            "Discovered {} file(s) under {} root(s) ({} skipped with errors)",
            files.len(),
            self.roots.len(),
            errors.len()
        );
        (files, errors)
    }

    /// Walk one root, yielding matching files.
    fn walk_root<'a>(
        &'a self,
        root: &Path,
    ) -> Box<dyn Iterator<Item = Result<PathBuf, ScanError>> + 'a> {
        let root = match std::fs::canonicalize(root) {
            Ok(p) => p,
            Err(e) => return Box::new(std::iter::once(Err(self.handle_io_error(root, e)))),
        };

        if root.is_file() {
            log::debug!("Root is a single file: {}", root.display());
            return Box::new(std::iter::once(Ok(root)));
        }

        // Missing directories hold nothing to skip.
        let excluded: Vec<PathBuf> = self
            .config
            .exclude_dirs
            .iter()
            .filter_map(|dir| std::fs::canonicalize(dir).ok())
            .collect();

        let walk_dir = WalkDir::new(&root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                children.retain(|child| {
                    child.as_ref().map_or(true, |entry| {
                        let skip = entry.file_type().is_dir() && excluded.contains(&entry.path());
                        if skip {
                            log::debug!("Skipping excluded directory: {}", entry.path().display());
                        }
                        !skip
                    })
                });
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        Box::new(walk_dir.into_iter().filter_map(move |entry_result| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            match entry_result {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }
                    if file_type.is_symlink() && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", entry.path().display());
                        return None;
                    }

                    let path = entry.path();
                    if !self.config.matches_extension(&path) {
                        log::trace!("Skipping by extension: {}", path.display());
                        return None;
                    }

                    match std::fs::metadata(&path) {
                        Ok(m) if m.is_file() => Some(Ok(path)),
                        Ok(_) => None,
                        Err(e) => Some(Err(self.handle_io_error(&path, e))),
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| root.clone(), std::borrow::ToOwned::to_owned);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    Some(Err(ScanError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    }))
                }
            }
        }))
    }

    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => {
                log::warn!("Path not found: {}", path.display());
                ScanError::NotFound(path.to_path_buf())
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }
}
