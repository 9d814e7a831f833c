//! The controller loop driving one verification run.
//!
//! Each iteration: check for cancellation, admit work, collect finished
//! tasks, aggregate them, render a progress frame, then sleep for the poll
//! interval. The loop ends when the scheduler drains or a cancellation is
//! observed; in the latter case in-flight verifiers are signalled and
//! reaped, but their late verdicts are not aggregated.

use std::thread;
use std::time::{Duration, Instant};

use super::aggregator::ResultAggregator;
use super::scheduler::{Completion, Scheduler};
use crate::output::ActionLog;
use crate::progress::{build_frame, ProgressCallback};
use crate::signal::ShutdownHandler;

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Sleep between iterations
    pub poll_interval: Duration,
    /// How long to wait for cancelled verifiers to exit
    pub reap_grace: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            reap_grace: Duration::from_secs(5),
        }
    }
}

impl ControllerConfig {
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_reap_grace(mut self, grace: Duration) -> Self {
        self.reap_grace = grace;
        self
    }
}

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every task reached a terminal state.
    Drained,
    /// A cancellation was observed before draining.
    Cancelled,
}

/// Result of [`run_pipeline`].
#[derive(Debug)]
pub struct PipelineRun {
    pub outcome: PipelineOutcome,
    /// Everything aggregated before the loop ended
    pub aggregator: ResultAggregator,
    pub elapsed: Duration,
    /// Highest concurrency observed
    pub peak_running: usize,
    /// Queued tasks dropped by cancellation
    pub dropped: usize,
    /// In-flight tasks reaped after cancellation (not aggregated)
    pub abandoned: usize,
}

impl PipelineRun {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.outcome == PipelineOutcome::Cancelled
    }
}

fn record_completion(log: &mut ActionLog, completion: &Completion) {
    let result = &completion.result;
    if result.is_flagged {
        log.warn(format!(
            "FLAGGED {}: {}",
            result.path.display(),
            result.diagnostic
        ));
    } else {
        log.info(format!("OK {}", result.path.display()));
    }
    if let Some(fault) = &result.hash_fault {
        log.warn(format!("HASH FAILED {}: {}", result.path.display(), fault));
    }
}

/// Drive `scheduler` until it drains or `shutdown` is requested.
pub fn run_pipeline(
    mut scheduler: Scheduler,
    config: &ControllerConfig,
    shutdown: &ShutdownHandler,
    progress: &mut dyn ProgressCallback,
    action_log: &mut ActionLog,
) -> PipelineRun {
    let started = Instant::now();
    let total = scheduler.total();
    let mut aggregator = ResultAggregator::new(total);

    log::info!(
        "Verifying {} file(s), at most {} at a time",
        total,
        scheduler.max_concurrent()
    );
    action_log.info(format!(
        "Verifying {} file(s), at most {} at a time",
        total,
        scheduler.max_concurrent()
    ));
    progress.on_start(total);

    let outcome = loop {
        if shutdown.is_shutdown_requested() {
            break PipelineOutcome::Cancelled;
        }

        scheduler.tick();

        for completion in scheduler.poll_completions() {
            if aggregator.apply(&completion) {
                record_completion(action_log, &completion);
                progress.on_completion(&completion);
            }
        }

        let frame = build_frame(
            aggregator.completed_count(),
            total,
            aggregator.window(),
            progress.path_width(),
        );
        progress.on_frame(&frame);

        if scheduler.is_drained() {
            // A cancel that raced the last completions still counts.
            if shutdown.is_shutdown_requested() {
                break PipelineOutcome::Cancelled;
            }
            break PipelineOutcome::Drained;
        }

        thread::sleep(config.poll_interval);
    };

    let mut dropped = 0;
    let mut abandoned = 0;
    if outcome == PipelineOutcome::Cancelled {
        dropped = scheduler.cancel_all();
        abandoned = scheduler.wait_for_running(config.reap_grace).len();
        log::debug!("Reaped {} cancelled verifier(s)", abandoned);
        action_log.warn(format!(
            "Cancelled after {} of {} file(s); {} queued file(s) not started",
            aggregator.completed_count(),
            total,
            dropped
        ));
    } else {
        action_log.info(format!(
            "Verification finished: {} file(s), {} flagged",
            aggregator.completed_count(),
            aggregator.flagged().len()
        ));
    }

    progress.on_finish(outcome == PipelineOutcome::Cancelled);

    PipelineRun {
        outcome,
        aggregator,
        elapsed: started.elapsed(),
        peak_running: scheduler.peak_running(),
        dropped,
        abandoned,
    }
}
