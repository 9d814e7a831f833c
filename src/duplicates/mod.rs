//! Exact-duplicate detection over verified files.
//!
//! Content hashes are computed by the workers while the pipeline runs; this
//! module only groups them once the run has drained.

pub mod groups;

pub use groups::{group_duplicates, DuplicateGroup, GroupingStats};
