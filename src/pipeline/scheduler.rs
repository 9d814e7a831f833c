//! Admission-controlled dispatch of verification tasks.
//!
//! # Overview
//!
//! The [`Scheduler`] keeps at most `max_concurrent` tasks in the
//! [`TaskState::Running`] state. Each admitted task runs on a rayon pool
//! sized to the cap; its verdict is sent back over a single channel that
//! only the controller drains, so every piece of aggregated state has one
//! writer.
//!
//! Nothing here blocks: [`Scheduler::tick`] admits work and returns
//! immediately, and [`Scheduler::poll_completions`] only takes what has
//! already arrived.
//!
//! # Example
//!
//! ```no_run
//! use filevet::pipeline::{Scheduler, SchedulerConfig, TaskQueue};
//! use filevet::verifier::CommandVerifier;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let queue = TaskQueue::from_paths(vec![PathBuf::from("a.mkv"), PathBuf::from("b.mkv")]);
//! let verifier = Arc::new(CommandVerifier::from_template("ffmpeg -v error -i {filePath} -f null -").unwrap());
//! let mut scheduler = Scheduler::new(queue, verifier, SchedulerConfig::default().with_max_concurrent(2)).unwrap();
//!
//! while !scheduler.is_drained() {
//!     scheduler.tick();
//!     for done in scheduler.poll_completions() {
//!         println!("{} -> {:?}", done.task.path.display(), done.state);
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! ```

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::queue::{FileTask, TaskQueue};
use crate::verifier::{AnalysisResult, ContentHasher, HashFault, InvocationFault, Verifier};

/// Lifecycle of a task. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting in the backlog
    Queued,
    /// Dispatched to the verifier
    Running,
    /// Verifier produced a verdict
    Completed,
    /// Verifier could not run
    Failed,
}

impl TaskState {
    /// Whether the task has reached a final state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running) | (Self::Running, Self::Completed | Self::Failed)
        )
    }
}

/// Errors constructing a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration for a [`Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum simultaneously running tasks (clamped to at least 1).
    pub max_concurrent: usize,
    /// Hash file contents after verification (duplicate detection).
    pub hasher: Option<ContentHasher>,
    /// Flag observed by in-flight verifiers; set by [`Scheduler::cancel_all`].
    pub cancel_flag: Arc<AtomicBool>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_concurrency(),
            hasher: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SchedulerConfig {
    /// Set the concurrency cap.
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Enable content hashing with the given hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: ContentHasher) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Share an externally owned cancellation flag with the verifiers.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = flag;
        self
    }
}

/// Number of logical CPUs, never less than 1.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .max(1)
}

/// A task that reached a terminal state, with its verdict.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The finished task
    pub task: FileTask,
    /// `Completed` or `Failed`
    pub state: TaskState,
    /// Verdict (invocation faults are flagged results)
    pub result: AnalysisResult,
}

struct WorkerReport {
    task: FileTask,
    verdict: Result<String, InvocationFault>,
    hash: Option<Result<String, HashFault>>,
}

/// Bounded-concurrency task scheduler.
pub struct Scheduler {
    queue: TaskQueue,
    states: HashMap<usize, TaskState>,
    total: usize,
    max_concurrent: usize,
    running: usize,
    peak_running: usize,
    cancelled: bool,
    pool: rayon::ThreadPool,
    verifier: Arc<dyn Verifier>,
    hasher: Option<ContentHasher>,
    cancel_flag: Arc<AtomicBool>,
    tx: Sender<WorkerReport>,
    rx: Receiver<WorkerReport>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("queued", &self.queue.remaining())
            .field("total", &self.total)
            .field("max_concurrent", &self.max_concurrent)
            .field("running", &self.running)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

impl Scheduler {
    /// Create a scheduler over a filled queue.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PoolBuild`] if the worker pool cannot be created.
    pub fn new(
        queue: TaskQueue,
        verifier: Arc<dyn Verifier>,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        if config.max_concurrent == 0 {
            log::warn!("max_concurrent of 0 would never make progress; using 1");
        }
        let max_concurrent = config.max_concurrent.max(1);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_concurrent)
            .thread_name(|i| format!("filevet-worker-{i}"))
            .build()?;

        let mut queue = queue;
        let tasks = queue.drain_all();
        let states = tasks
            .iter()
            .map(|task| (task.sequence, TaskState::Queued))
            .collect();
        let total = tasks.len();
        queue.enqueue(tasks);

        let (tx, rx) = mpsc::channel();

        log::debug!(
            "Scheduler ready: {} tasks, max {} concurrent",
            total,
            max_concurrent
        );

        Ok(Self {
            queue,
            states,
            total,
            max_concurrent,
            running: 0,
            peak_running: 0,
            cancelled: false,
            pool,
            verifier,
            hasher: config.hasher,
            cancel_flag: config.cancel_flag,
            tx,
            rx,
        })
    }

    /// Admit queued tasks while there is room under the cap.
    ///
    /// Returns the number of tasks dispatched. Does nothing after
    /// [`cancel_all`](Self::cancel_all).
    pub fn tick(&mut self) -> usize {
        if self.cancelled {
            return 0;
        }

        let mut dispatched = 0;
        while self.running < self.max_concurrent {
            let Some(task) = self.queue.dequeue_next() else {
                break;
            };
            self.transition(task.sequence, TaskState::Running);
            self.running += 1;
            self.peak_running = self.peak_running.max(self.running);
            self.dispatch(task);
            dispatched += 1;
        }
        dispatched
    }

    fn dispatch(&self, task: FileTask) {
        let verifier = Arc::clone(&self.verifier);
        let hasher = self.hasher;
        let cancel = Arc::clone(&self.cancel_flag);
        let tx = self.tx.clone();

        log::trace!("Dispatching #{} {}", task.sequence, task.path.display());

        self.pool.spawn(move || {
            let verdict = panic::catch_unwind(AssertUnwindSafe(|| {
                verifier.verify(&task.path, &cancel)
            }))
            .unwrap_or_else(|payload| {
                Err(InvocationFault::Panicked {
                    path: task.path.clone(),
                    message: panic_message(payload.as_ref()),
                })
            });

            let hash = match (&verdict, hasher) {
                (Ok(_), Some(hasher)) if !cancel.load(Ordering::SeqCst) => {
                    Some(hasher.hash_file(&task.path))
                }
                _ => None,
            };

            // The receiver only disappears when the scheduler is dropped.
            let _ = tx.send(WorkerReport {
                task,
                verdict,
                hash,
            });
        });
    }

    /// Collect tasks that finished since the last poll without blocking.
    ///
    /// Tasks finishing within the same poll are returned in discovery order.
    pub fn poll_completions(&mut self) -> Vec<Completion> {
        let mut done = Vec::new();
        while let Ok(report) = self.rx.try_recv() {
            done.push(self.reap(report));
        }
        done.sort_by_key(|c| c.task.sequence);
        done
    }

    fn reap(&mut self, report: WorkerReport) -> Completion {
        let WorkerReport {
            task,
            verdict,
            hash,
        } = report;

        let (state, result) = match verdict {
            Ok(diagnostic) => {
                let mut result = AnalysisResult::from_diagnostic(task.path.clone(), diagnostic);
                if let Some(hash) = hash {
                    if let Err(ref fault) = hash {
                        log::warn!("{}", fault);
                    }
                    result = result.with_hash(hash);
                }
                (TaskState::Completed, result)
            }
            Err(fault) => {
                if !fault.is_cancelled() {
                    log::warn!("Verifier could not run on {}: {}", task.path.display(), fault);
                }
                (
                    TaskState::Failed,
                    AnalysisResult::from_fault(task.path.clone(), &fault),
                )
            }
        };

        self.transition(task.sequence, state);
        self.running = self.running.saturating_sub(1);

        Completion {
            task,
            state,
            result,
        }
    }

    fn transition(&mut self, sequence: usize, next: TaskState) {
        let current = self.states.entry(sequence).or_insert(TaskState::Queued);
        debug_assert!(
            current.can_transition_to(next),
            "invalid task transition {:?} -> {:?} for #{}",
            current,
            next,
            sequence
        );
        *current = next;
    }

    /// True when nothing is queued or running.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.running == 0
    }

    /// Stop admitting work, drop queued tasks and signal in-flight verifiers.
    ///
    /// Returns the number of queued tasks that were dropped. The scheduler
    /// is terminal afterwards.
    pub fn cancel_all(&mut self) -> usize {
        self.cancelled = true;
        self.cancel_flag.store(true, Ordering::SeqCst);
        let dropped = self.queue.drain_all().len();
        log::info!(
            "Cancelled: {} queued task(s) dropped, {} in flight signalled",
            dropped,
            self.running
        );
        dropped
    }

    /// Wait up to `grace` for in-flight tasks to report back.
    ///
    /// Used after cancellation so terminated processes are reaped before exit.
    pub fn wait_for_running(&mut self, grace: Duration) -> Vec<Completion> {
        let deadline = Instant::now() + grace;
        let mut done = Vec::new();

        while self.running > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::warn!("{} verifier(s) still running after cancellation", self.running);
                break;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(report) => done.push(self.reap(report)),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        done.sort_by_key(|c| c.task.sequence);
        done
    }

    /// Current state of a task by sequence number.
    #[must_use]
    pub fn state_of(&self, sequence: usize) -> Option<TaskState> {
        self.states.get(&sequence).copied()
    }

    /// Tasks currently running.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.running
    }

    /// Highest number of simultaneously running tasks seen so far.
    #[must_use]
    pub fn peak_running(&self) -> usize {
        self.peak_running
    }

    /// Effective concurrency cap.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Tasks still waiting for dispatch.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queue.remaining()
    }

    /// Total tasks this scheduler was created with.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether [`cancel_all`](Self::cancel_all) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
