//! The bounded-concurrency verification pipeline.
//!
//! - [`queue`]: ordered backlog of files not yet dispatched
//! - [`scheduler`]: admission under the concurrency cap, dispatch and reaping
//! - [`aggregator`]: single-writer accumulation of verdicts
//! - [`controller`]: the polling loop tying them to progress and cancellation
//!
//! Workers only send results back; everything they produce is applied by
//! the controller thread, so no aggregated state needs a lock.

pub mod aggregator;
pub mod controller;
pub mod queue;
pub mod scheduler;

pub use aggregator::{
    FlaggedFile, HashIndex, ResultAggregator, RollingWindow, WindowEntry, ROLLING_WINDOW_SIZE,
};
pub use controller::{run_pipeline, ControllerConfig, PipelineOutcome, PipelineRun};
pub use queue::{FileTask, TaskQueue};
pub use scheduler::{
    default_concurrency, Completion, Scheduler, SchedulerConfig, SchedulerError, TaskState,
};
