//! FIFO backlog of verification tasks.
//!
//! The file list is static for a run: tasks are enqueued in bulk when the
//! pipeline starts and dequeued one at a time by the scheduler.

use std::collections::VecDeque;
use std::path::PathBuf;

/// A single unit of work: one file to verify.
///
/// `sequence` is the file's position in discovery order and is used to keep
/// reports deterministic regardless of completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    /// Path of the file to verify
    pub path: PathBuf,
    /// Zero-based discovery position
    pub sequence: usize,
}

impl FileTask {
    /// Create a new task.
    #[must_use]
    pub fn new(path: PathBuf, sequence: usize) -> Self {
        Self { path, sequence }
    }
}

/// Ordered backlog of tasks not yet dispatched.
#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: VecDeque<FileTask>,
}

impl TaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a queue from discovered paths, numbering them in order.
    ///
    /// # Example
    ///
    /// ```
    /// use filevet::pipeline::TaskQueue;
    /// use std::path::PathBuf;
    ///
    /// let mut queue = TaskQueue::from_paths(vec![PathBuf::from("a.mkv"), PathBuf::from("b.mkv")]);
    /// assert_eq!(queue.remaining(), 2);
    /// assert_eq!(queue.dequeue_next().unwrap().sequence, 0);
    /// ```
    #[must_use]
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        let mut queue = Self::new();
        queue.enqueue(
            paths
                .into_iter()
                .enumerate()
                .map(|(sequence, path)| FileTask::new(path, sequence)),
        );
        queue
    }

    /// Append tasks to the back of the queue.
    pub fn enqueue<I>(&mut self, tasks: I)
    where
        I: IntoIterator<Item = FileTask>,
    {
        self.pending.extend(tasks);
    }

    /// Take the next task, or `None` when the backlog is empty.
    pub fn dequeue_next(&mut self) -> Option<FileTask> {
        self.pending.pop_front()
    }

    /// Number of tasks still waiting for dispatch.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Check if the backlog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending task, returning them in queue order.
    pub fn drain_all(&mut self) -> Vec<FileTask> {
        self.pending.drain(..).collect()
    }
}
