//! Grouping of verified files by content hash.
//!
//! # Overview
//!
//! After the pipeline drains, every file whose content hash was computed
//! sits in a [`HashIndex`]. A hash shared by two or more files is a
//! duplicate group; a hash seen once is not reported.
//!
//! # Example
//!
//! ```
//! use filevet::duplicates::group_duplicates;
//! use filevet::pipeline::HashIndex;
//! use std::path::PathBuf;
//!
//! let mut index = HashIndex::new();
//! index.insert("aa", 0, PathBuf::from("/a.mkv"));
//! index.insert("bb", 1, PathBuf::from("/b.mkv"));
//! index.insert("aa", 2, PathBuf::from("/c.mkv"));
//!
//! let (groups, stats) = group_duplicates(&index);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].hash, "aa");
//! assert_eq!(stats.eliminated_unique, 1);
//! ```

use std::path::PathBuf;

use serde::Serialize;

use crate::pipeline::HashIndex;

/// Files sharing one content hash (always two or more).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Hex content hash shared by all members
    pub hash: String,
    /// Members in discovery order
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    #[must_use]
    pub fn new(hash: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            hash: hash.into(),
            paths,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of redundant copies (members beyond the first).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }
}

/// Statistics about a grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Distinct hashes in the index
    pub unique_hashes: usize,
    /// Hashes seen only once
    pub eliminated_unique: usize,
    /// Groups with 2+ members
    pub duplicate_groups: usize,
    /// Files belonging to some group
    pub duplicate_files: usize,
}

impl GroupingStats {
    /// Redundant copies across all groups.
    #[must_use]
    pub fn redundant_files(&self) -> usize {
        self.duplicate_files.saturating_sub(self.duplicate_groups)
    }
}

/// Extract duplicate groups from the hash index.
///
/// Groups come out in first-seen order (by the earliest-discovered member);
/// members keep discovery order. Singleton hashes are dropped.
#[must_use]
pub fn group_duplicates(index: &HashIndex) -> (Vec<DuplicateGroup>, GroupingStats) {
    let mut stats = GroupingStats::default();
    let mut groups = Vec::new();

    for (hash, paths) in index.entries() {
        stats.unique_hashes += 1;
        if paths.len() < 2 {
            stats.eliminated_unique += 1;
            log::trace!("Unique hash {}: {}", hash, paths[0].display());
            continue;
        }

        log::debug!("Hash {}: {} identical files", hash, paths.len());
        stats.duplicate_groups += 1;
        stats.duplicate_files += paths.len();
        groups.push(DuplicateGroup::new(
            hash,
            paths.into_iter().cloned().collect(),
        ));
    }

    log::info!(
        "Duplicate grouping: {} hashes → {} groups ({} redundant files)",
        stats.unique_hashes,
        stats.duplicate_groups,
        stats.redundant_files()
    );

    (groups, stats)
}
