//! End-to-end tests of the scheduler and controller loop.
//!
//! These use in-process verifiers so timing and verdicts are fully
//! controlled; the process-backed verifier is covered by `scan_tests`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use filevet::output::ActionLog;
use filevet::pipeline::{
    run_pipeline, Completion, ControllerConfig, PipelineOutcome, Scheduler, SchedulerConfig,
    TaskQueue,
};
use filevet::progress::{NoProgress, ProgressCallback, ProgressFrame};
use filevet::signal::ShutdownHandler;
use filevet::verifier::{InvocationFault, Verifier};

// =============================================================================
// Helper Verifiers
// =============================================================================

/// Flags the listed file names and records peak concurrency.
struct ScriptedVerifier {
    flagged: Vec<&'static str>,
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedVerifier {
    fn new(flagged: Vec<&'static str>, delay: Duration) -> Self {
        Self {
            flagged,
            delay,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl Verifier for ScriptedVerifier {
    fn verify(&self, path: &Path, _cancel: &AtomicBool) -> Result<String, InvocationFault> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.running.fetch_sub(1, Ordering::SeqCst);

        let name = path.file_name().unwrap().to_string_lossy();
        if self.flagged.iter().any(|f| *f == name) {
            Ok(format!("decode error in {name}"))
        } else {
            Ok(String::new())
        }
    }
}

/// First `fast` files (by numeric stem) finish at once; the rest hang
/// until cancelled.
struct HangingVerifier {
    fast: usize,
}

impl Verifier for HangingVerifier {
    fn verify(&self, path: &Path, cancel: &AtomicBool) -> Result<String, InvocationFault> {
        let index: usize = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse().ok())
            .unwrap();
        if index < self.fast {
            return Ok(String::new());
        }
        while !cancel.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(2));
        }
        Err(InvocationFault::Cancelled(path.to_path_buf()))
    }
}

/// Records completions and frames; requests shutdown after `cancel_after`.
#[derive(Default)]
struct Recorder {
    handler: Option<ShutdownHandler>,
    cancel_after: usize,
    completions: Vec<usize>,
    frames: Vec<ProgressFrame>,
    started_with: Option<usize>,
    finished: Option<bool>,
}

impl ProgressCallback for Recorder {
    fn on_start(&mut self, total: usize) {
        self.started_with = Some(total);
    }

    fn on_completion(&mut self, completion: &Completion) {
        self.completions.push(completion.task.sequence);
        if let Some(handler) = &self.handler {
            if self.completions.len() == self.cancel_after {
                handler.request_shutdown();
            }
        }
    }

    fn on_frame(&mut self, frame: &ProgressFrame) {
        self.frames.push(frame.clone());
    }

    fn on_finish(&mut self, cancelled: bool) {
        self.finished = Some(cancelled);
    }
}

fn fast_loop() -> ControllerConfig {
    ControllerConfig::default().with_poll_interval(Duration::from_millis(2))
}

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| PathBuf::from(format!("/media/{n}"))).collect()
}

// =============================================================================
// Draining Runs
// =============================================================================

#[test]
fn test_five_files_two_flagged_cap_two() {
    let verifier = Arc::new(ScriptedVerifier::new(
        vec!["f2.mkv", "f4.mkv"],
        Duration::from_millis(10),
    ));
    let scheduler = Scheduler::new(
        TaskQueue::from_paths(paths(&["f1.mkv", "f2.mkv", "f3.mkv", "f4.mkv", "f5.mkv"])),
        verifier.clone(),
        SchedulerConfig::default().with_max_concurrent(2),
    )
    .unwrap();
    let mut recorder = Recorder::default();
    let mut log = ActionLog::new();

    let run = run_pipeline(
        scheduler,
        &fast_loop(),
        &ShutdownHandler::new(),
        &mut recorder,
        &mut log,
    );

    assert_eq!(run.outcome, PipelineOutcome::Drained);
    assert_eq!(run.aggregator.completed_count(), 5);
    assert!(run.peak_running <= 2);
    assert!(verifier.peak.load(Ordering::SeqCst) <= 2);

    let flagged: Vec<_> = run
        .aggregator
        .flagged()
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(flagged, vec!["f2.mkv", "f4.mkv"]);
    assert_eq!(run.aggregator.flagged()[0].diagnostic, "decode error in f2.mkv");

    assert_eq!(recorder.started_with, Some(5));
    assert_eq!(recorder.finished, Some(false));
    let mut seen = recorder.completions.clone();
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);

    let last = recorder.frames.last().unwrap();
    assert_eq!(last.completed, 5);
    assert_eq!(last.total, 5);

    assert_eq!(log.count_matching("FLAGGED "), 2);
    assert_eq!(log.count_matching("OK "), 3);
}

#[test]
fn test_cap_of_one_runs_serially() {
    let verifier = Arc::new(ScriptedVerifier::new(vec![], Duration::from_millis(3)));
    let names: Vec<String> = (0..6).map(|i| format!("{i}.mkv")).collect();
    let scheduler = Scheduler::new(
        TaskQueue::from_paths(names.iter().map(PathBuf::from).collect()),
        verifier.clone(),
        SchedulerConfig::default().with_max_concurrent(1),
    )
    .unwrap();

    let run = run_pipeline(
        scheduler,
        &fast_loop(),
        &ShutdownHandler::new(),
        &mut NoProgress,
        &mut ActionLog::new(),
    );

    assert_eq!(run.aggregator.completed_count(), 6);
    assert_eq!(run.peak_running, 1);
    assert_eq!(verifier.peak.load(Ordering::SeqCst), 1);
}

#[test]
fn test_zero_cap_is_clamped_and_still_drains() {
    let scheduler = Scheduler::new(
        TaskQueue::from_paths(paths(&["a.mkv", "b.mkv"])),
        Arc::new(ScriptedVerifier::new(vec![], Duration::ZERO)),
        SchedulerConfig::default().with_max_concurrent(0),
    )
    .unwrap();

    let run = run_pipeline(
        scheduler,
        &fast_loop(),
        &ShutdownHandler::new(),
        &mut NoProgress,
        &mut ActionLog::new(),
    );

    assert_eq!(run.outcome, PipelineOutcome::Drained);
    assert_eq!(run.aggregator.completed_count(), 2);
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_cancel_after_two_of_ten() {
    let names: Vec<String> = (0..10).map(|i| format!("{i}.mkv")).collect();
    let handler = ShutdownHandler::new();
    let scheduler = Scheduler::new(
        TaskQueue::from_paths(names.iter().map(PathBuf::from).collect()),
        Arc::new(HangingVerifier { fast: 2 }),
        SchedulerConfig::default()
            .with_max_concurrent(2)
            .with_cancel_flag(handler.get_flag()),
    )
    .unwrap();
    let mut recorder = Recorder {
        handler: Some(handler.clone()),
        cancel_after: 2,
        ..Recorder::default()
    };
    let mut log = ActionLog::new();

    let run = run_pipeline(scheduler, &fast_loop(), &handler, &mut recorder, &mut log);

    assert!(run.is_cancelled());
    assert_eq!(run.aggregator.completed_count(), 2);
    assert!(run.aggregator.flagged().is_empty());
    assert_eq!(run.dropped + run.abandoned, 8);
    assert_eq!(recorder.completions.len(), 2);
    assert_eq!(recorder.finished, Some(true));
    assert_eq!(log.count_matching("Cancelled after 2 of 10"), 1);
}
