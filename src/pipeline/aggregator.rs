//! Single-writer accumulation of task outcomes.
//!
//! # Overview
//!
//! The [`ResultAggregator`] is owned by the controller loop and is the only
//! place the flagged list, the hash index and the rolling window are
//! mutated. Applying the same task twice is a no-op, so a completion that is
//! observed again never double-counts.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use super::scheduler::{Completion, TaskState};

/// Number of recent outcomes kept for the live display.
pub const ROLLING_WINDOW_SIZE: usize = 10;

/// A file that failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlaggedFile {
    /// Path of the flagged file
    pub path: PathBuf,
    /// Diagnostic text (or invocation fault)
    pub diagnostic: String,
    /// Discovery position
    pub sequence: usize,
}

impl FlaggedFile {
    /// Create a flagged file entry.
    #[must_use]
    pub fn new(path: PathBuf, diagnostic: impl Into<String>, sequence: usize) -> Self {
        Self {
            path,
            diagnostic: diagnostic.into(),
            sequence,
        }
    }
}

/// Content hash → paths that produced it.
///
/// Paths inside a group are kept in discovery order, independent of the
/// order in which tasks completed.
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    groups: HashMap<String, Vec<(usize, PathBuf)>>,
}

impl HashIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `path` (discovered at `sequence`) hashed to `hash`.
    pub fn insert(&mut self, hash: &str, sequence: usize, path: PathBuf) {
        let members = self.groups.entry(hash.to_string()).or_default();
        let pos = members
            .binary_search_by_key(&sequence, |(seq, _)| *seq)
            .unwrap_or_else(|p| p);
        members.insert(pos, (sequence, path));
    }

    /// Number of distinct hashes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if no hashes were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of paths across all hashes.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Paths recorded for `hash`, in discovery order.
    #[must_use]
    pub fn paths_for(&self, hash: &str) -> Vec<PathBuf> {
        self.groups
            .get(hash)
            .map(|members| members.iter().map(|(_, p)| p.clone()).collect())
            .unwrap_or_default()
    }

    /// All entries, ordered by the earliest-discovered member of each hash.
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, Vec<&PathBuf>)> {
        let mut entries: Vec<(usize, &str, Vec<&PathBuf>)> = self
            .groups
            .iter()
            .filter_map(|(hash, members)| {
                let first = members.first()?.0;
                Some((
                    first,
                    hash.as_str(),
                    members.iter().map(|(_, p)| p).collect(),
                ))
            })
            .collect();
        entries.sort_by_key(|(first, _, _)| *first);
        entries
            .into_iter()
            .map(|(_, hash, paths)| (hash, paths))
            .collect()
    }
}

/// One line of the rolling window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEntry {
    /// Whether the file was flagged
    pub flagged: bool,
    /// Path that finished
    pub path: PathBuf,
}

/// Fixed-capacity ring of the most recent outcomes, oldest first.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    entries: VecDeque<WindowEntry>,
    capacity: usize,
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::with_capacity(ROLLING_WINDOW_SIZE)
    }
}

impl RollingWindow {
    /// Create a window holding at most `capacity` entries (at least 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: WindowEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries from oldest to most recent.
    pub fn iter(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Accumulated state of an analysis run.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    total: usize,
    completed: usize,
    failed: usize,
    hash_faults: usize,
    seen: HashSet<usize>,
    flagged: Vec<FlaggedFile>,
    hash_index: HashIndex,
    window: RollingWindow,
}

impl ResultAggregator {
    /// Create an aggregator expecting `total` tasks.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            hash_faults: 0,
            seen: HashSet::with_capacity(total),
            flagged: Vec::new(),
            hash_index: HashIndex::new(),
            window: RollingWindow::default(),
        }
    }

    /// Apply a completion. Returns `false` if this task was already applied.
    pub fn apply(&mut self, completion: &Completion) -> bool {
        let sequence = completion.task.sequence;
        if !self.seen.insert(sequence) {
            log::debug!("Ignoring repeated completion for #{}", sequence);
            return false;
        }

        let result = &completion.result;
        if completion.state == TaskState::Failed {
            self.failed += 1;
        }

        if result.is_flagged {
            let pos = self
                .flagged
                .binary_search_by_key(&sequence, |f| f.sequence)
                .unwrap_or_else(|p| p);
            self.flagged.insert(
                pos,
                FlaggedFile::new(result.path.clone(), result.diagnostic.clone(), sequence),
            );
        }

        if let Some(ref hash) = result.content_hash {
            self.hash_index.insert(hash, sequence, result.path.clone());
        }
        if result.hash_fault.is_some() {
            self.hash_faults += 1;
        }

        self.completed += 1;
        self.window.push(WindowEntry {
            flagged: result.is_flagged,
            path: result.path.clone(),
        });
        true
    }

    /// Number of distinct tasks applied.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed
    }

    /// Number of tasks expected.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Tasks whose verifier could not run.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed
    }

    /// Files whose content hash could not be computed.
    #[must_use]
    pub fn hash_fault_count(&self) -> usize {
        self.hash_faults
    }

    /// Flagged files in discovery order.
    #[must_use]
    pub fn flagged(&self) -> &[FlaggedFile] {
        &self.flagged
    }

    /// Hash index built so far.
    #[must_use]
    pub fn hash_index(&self) -> &HashIndex {
        &self.hash_index
    }

    /// Most recent outcomes.
    #[must_use]
    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    /// Whether every expected task has been applied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }

    /// Consume the aggregator, yielding the flagged list and hash index.
    #[must_use]
    pub fn into_parts(self) -> (Vec<FlaggedFile>, HashIndex) {
        (self.flagged, self.hash_index)
    }
}
