//! Full scans driving real verifier processes.
//!
//! `grep BAD {filePath}` stands in for a media checker: it prints the
//! offending line for "corrupt" files and nothing for clean ones.

#![cfg(unix)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use filevet::actions::{AutoConfirm, Confirm, OutcomeKind, CANCELLED_REASON};
use filevet::cli::{Cli, Commands, ScanArgs};
use filevet::config::Settings;
use filevet::error::ExitCode;
use filevet::pipeline::Completion;
use filevet::progress::{NoProgress, ProgressCallback, ProgressFrame};
use filevet::signal::ShutdownHandler;
use filevet::{run_scan, ScanContext, ScanSummary};
use tempfile::TempDir;

const GREP_VERIFIER: &str = "grep BAD {filePath}";

// =============================================================================
// Helper Functions
// =============================================================================

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// media/ holds a1, b (BAD), c, d (BAD), e (same as a1) and an ignored notes.txt.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let media = dir.path().join("media");
        fs::create_dir(&media).unwrap();
        for (name, content) in [
            ("a1.mkv", "same clean bytes"),
            ("b.mkv", "BAD frame 12"),
            ("c.mkv", "clean"),
            ("d.mkv", "BAD moov atom"),
            ("e.mkv", "same clean bytes"),
            ("notes.txt", "BAD but not a video"),
        ] {
            fs::write(media.join(name), content).unwrap();
        }
        Self { dir }
    }

    fn media(&self) -> PathBuf {
        self.dir.path().join("media")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn settings(&self, command: &str) -> Settings {
        Settings {
            command: command.to_string(),
            extensions: vec!["mkv".to_string()],
            max_concurrent: 2,
            quarantine_dir: self.path("quarantine"),
            poll_interval_ms: 5,
            ..Settings::default()
        }
        .validate()
        .unwrap()
    }
}

fn scan_args(extra: &[&str], media: &Path) -> ScanArgs {
    let media = media.to_string_lossy().into_owned();
    let mut argv = vec!["filevet", "scan", media.as_str()];
    argv.extend_from_slice(extra);
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Scan(args) => args,
        Commands::Config => panic!("Expected Scan command"),
    }
}

fn scan(
    args: &ScanArgs,
    settings: &Settings,
    shutdown: &ShutdownHandler,
    answer: bool,
) -> ScanSummary {
    run_scan(
        args,
        settings,
        ScanContext {
            shutdown,
            progress: &mut NoProgress,
            confirm: &mut AutoConfirm(answer),
            remediation_progress: None,
            watch_keys: false,
        },
    )
    .unwrap()
}

/// Fails the test if the remediation question is ever asked.
struct NeverAsked;

impl Confirm for NeverAsked {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        panic!("unexpected remediation prompt: {question}");
    }
}

/// Requests shutdown from inside the controller loop.
struct CancelOn {
    shutdown: ShutdownHandler,
    total: usize,
    seen: usize,
    on_first_flagged: bool,
}

impl CancelOn {
    fn last_completion(shutdown: &ShutdownHandler) -> Self {
        Self {
            shutdown: shutdown.clone(),
            total: 0,
            seen: 0,
            on_first_flagged: false,
        }
    }

    fn first_flagged(shutdown: &ShutdownHandler) -> Self {
        Self {
            on_first_flagged: true,
            ..Self::last_completion(shutdown)
        }
    }
}

impl ProgressCallback for CancelOn {
    fn on_start(&mut self, total: usize) {
        self.total = total;
    }

    fn on_completion(&mut self, completion: &Completion) {
        self.seen += 1;
        let hit = if self.on_first_flagged {
            completion.result.is_flagged
        } else {
            self.seen == self.total
        };
        if hit {
            self.shutdown.request_shutdown();
        }
    }

    fn on_frame(&mut self, _frame: &ProgressFrame) {}
}

/// Answers "yes" while a Ctrl+C lands at the prompt.
struct InterruptedAnswer(ShutdownHandler);

impl Confirm for InterruptedAnswer {
    fn confirm(&mut self, _question: &str) -> io::Result<bool> {
        self.0.request_shutdown();
        Ok(true)
    }
}

fn scan_with(
    args: &ScanArgs,
    settings: &Settings,
    shutdown: &ShutdownHandler,
    progress: &mut dyn ProgressCallback,
    confirm: &mut dyn Confirm,
) -> ScanSummary {
    run_scan(
        args,
        settings,
        ScanContext {
            shutdown,
            progress,
            confirm,
            remediation_progress: None,
            watch_keys: false,
        },
    )
    .unwrap()
}

fn assert_cancelled_untouched(summary: &ScanSummary, fx: &Fixture) {
    assert!(summary.interrupted);
    assert_eq!(summary.exit_code, ExitCode::Interrupted);
    assert!(!summary.outcomes.is_empty());
    assert_eq!(summary.outcomes.len(), summary.flagged.len());
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.action == OutcomeKind::Skipped && o.detail == CANCELLED_REASON));
    assert!(fx.media().join("b.mkv").exists());
    assert!(fx.media().join("d.mkv").exists());
    assert!(!fx.path("quarantine").exists());
}

fn file_names(paths: impl IntoIterator<Item = PathBuf>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

// =============================================================================
// Scans
// =============================================================================

#[test]
fn test_flagged_files_are_quarantined() {
    let fx = Fixture::new();
    let report = fx.path("report.csv");
    let log = fx.path("actions.log");
    let report_arg = report.to_string_lossy().into_owned();
    let log_arg = log.to_string_lossy().into_owned();
    let args = scan_args(&["--report", &report_arg, "--log", &log_arg], &fx.media());

    let summary = scan(&args, &fx.settings(GREP_VERIFIER), &ShutdownHandler::new(), true);

    assert_eq!(summary.exit_code, ExitCode::FlaggedFound);
    assert!(!summary.interrupted);
    assert_eq!(summary.total_files, 5);
    assert_eq!(summary.completed, 5);
    assert_eq!(
        file_names(summary.flagged.iter().map(|f| f.path.clone())),
        vec!["b.mkv", "d.mkv"]
    );
    assert_eq!(summary.flagged[0].diagnostic, "BAD frame 12");
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.action == OutcomeKind::Moved));

    let quarantine = fx.path("quarantine");
    assert!(quarantine.join("b.mkv").is_file());
    assert!(quarantine.join("d.mkv").is_file());
    assert!(!fx.media().join("b.mkv").exists());
    assert!(fx.media().join("notes.txt").exists());

    let csv = fs::read_to_string(&report).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "type,status,detail,diagnostic,path");
    assert_eq!(lines.iter().filter(|l| l.starts_with("flagged,moved,")).count(), 2);
    assert_eq!(lines.iter().filter(|l| l.contains(",BAD frame 12,")).count(), 1);

    let action_log = fs::read_to_string(&log).unwrap();
    assert_eq!(action_log.matches("] OK ").count(), 3);
    assert_eq!(action_log.matches("] FLAGGED ").count(), 2);
    assert_eq!(action_log.matches("] MOVED ").count(), 2);
}

#[test]
fn test_clean_run_exits_success() {
    let fx = Fixture::new();
    fs::remove_file(fx.media().join("b.mkv")).unwrap();
    fs::remove_file(fx.media().join("d.mkv")).unwrap();
    let args = scan_args(&[], &fx.media());

    let summary = scan(&args, &fx.settings(GREP_VERIFIER), &ShutdownHandler::new(), true);

    assert_eq!(summary.exit_code, ExitCode::Success);
    assert_eq!(summary.completed, 3);
    assert!(summary.outcomes.is_empty());
    assert!(!fx.path("quarantine").exists());
}

#[test]
fn test_declined_remediation_touches_nothing() {
    let fx = Fixture::new();
    let args = scan_args(&[], &fx.media());

    let summary = scan(&args, &fx.settings(GREP_VERIFIER), &ShutdownHandler::new(), false);

    assert_eq!(summary.exit_code, ExitCode::FlaggedFound);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.action == OutcomeKind::Skipped && o.detail == "declined by user"));
    assert!(fx.media().join("b.mkv").exists());
    assert!(fx.media().join("d.mkv").exists());
}

#[test]
fn test_no_remediate_skips_without_asking() {
    let fx = Fixture::new();
    let args = scan_args(&["--no-remediate"], &fx.media());

    // An approving answer is never consulted.
    let summary = scan(&args, &fx.settings(GREP_VERIFIER), &ShutdownHandler::new(), true);

    assert_eq!(summary.outcomes.len(), 2);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.detail == "remediation disabled"));
    assert!(fx.media().join("b.mkv").exists());
}

#[test]
fn test_dedup_with_json_report() {
    let fx = Fixture::new();
    let report = fx.path("report.json");
    let report_arg = report.to_string_lossy().into_owned();
    let args = scan_args(
        &["--report", &report_arg, "--report-format", "json", "--no-remediate"],
        &fx.media(),
    );
    let settings = Settings {
        dedup: true,
        ..fx.settings(GREP_VERIFIER)
    };

    let summary = scan(&args, &settings, &ShutdownHandler::new(), true);

    assert_eq!(summary.groups.len(), 1);
    assert_eq!(
        file_names(summary.groups[0].paths.clone()),
        vec!["a1.mkv", "e.mkv"]
    );

    let text = fs::read_to_string(&report).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    let records = doc["records"].as_array().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["type"], "duplicate");
    assert_eq!(records[0]["status"], "group-1");
    assert_eq!(records[2]["type"], "flagged");
    assert_eq!(records[2]["status"], "skipped");
    assert_eq!(records[2]["diagnostic"], "BAD frame 12");
    assert_eq!(doc["summary"]["total_files"], 5);
    assert_eq!(doc["summary"]["duplicate_groups"], 1);
    assert_eq!(doc["summary"]["exit_code"], 3);
    assert_eq!(doc["summary"]["exit_code_name"], "FV003");
}

#[test]
fn test_missing_verifier_program_flags_every_file() {
    let fx = Fixture::new();
    let args = scan_args(&["--no-remediate"], &fx.media());

    let summary = scan(
        &args,
        &fx.settings("filevet-no-such-verifier {filePath}"),
        &ShutdownHandler::new(),
        false,
    );

    assert_eq!(summary.flagged.len(), 5);
    assert_eq!(summary.faults, 5);
    assert!(summary.flagged[0].diagnostic.contains("failed to start"));
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_cancel_before_discovery() {
    let fx = Fixture::new();
    let args = scan_args(&[], &fx.media());
    let shutdown = ShutdownHandler::new();
    shutdown.request_shutdown();

    let summary = scan(&args, &fx.settings(GREP_VERIFIER), &shutdown, true);

    assert!(summary.interrupted);
    assert_eq!(summary.exit_code, ExitCode::Interrupted);
    assert_eq!(summary.completed, 0);
}

#[test]
fn test_cancel_kills_running_verifiers() {
    let fx = Fixture::new();
    let log = fx.path("actions.log");
    let log_arg = log.to_string_lossy().into_owned();
    let args = scan_args(&["--log", &log_arg], &fx.media());
    let shutdown = ShutdownHandler::new();

    let trigger = shutdown.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        trigger.request_shutdown();
    });

    let started = Instant::now();
    let summary = scan(
        &args,
        &fx.settings("tail -f {filePath}"),
        &shutdown,
        true,
    );
    canceller.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(summary.interrupted);
    assert_eq!(summary.exit_code, ExitCode::Interrupted);
    assert_eq!(summary.completed, 0);
    assert!(summary.outcomes.is_empty());
    assert!(fx.media().join("b.mkv").exists());

    let action_log = fs::read_to_string(&log).unwrap();
    assert!(action_log.contains("Cancelled after 0 of 5 file(s)"));
}

#[test]
fn test_cancel_after_flagged_file_never_prompts() {
    let fx = Fixture::new();
    let log = fx.path("actions.log");
    let log_arg = log.to_string_lossy().into_owned();
    let args = scan_args(&["--log", &log_arg], &fx.media());
    let shutdown = ShutdownHandler::new();

    let summary = scan_with(
        &args,
        &fx.settings(GREP_VERIFIER),
        &shutdown,
        &mut CancelOn::first_flagged(&shutdown),
        &mut NeverAsked,
    );

    assert_cancelled_untouched(&summary, &fx);
    let action_log = fs::read_to_string(&log).unwrap();
    assert!(action_log.contains("Cancelled after"));
    assert!(action_log.contains("] SKIPPED "));
}

#[test]
fn test_cancel_racing_last_completion_is_honoured() {
    let fx = Fixture::new();
    let args = scan_args(&[], &fx.media());
    let shutdown = ShutdownHandler::new();

    let summary = scan_with(
        &args,
        &fx.settings(GREP_VERIFIER),
        &shutdown,
        &mut CancelOn::last_completion(&shutdown),
        &mut NeverAsked,
    );

    assert_eq!(summary.completed, 5);
    assert_eq!(summary.flagged.len(), 2);
    assert_cancelled_untouched(&summary, &fx);
}

#[test]
fn test_cancel_at_prompt_skips_remediation() {
    let fx = Fixture::new();
    let args = scan_args(&[], &fx.media());
    let shutdown = ShutdownHandler::new();

    let summary = scan_with(
        &args,
        &fx.settings(GREP_VERIFIER),
        &shutdown,
        &mut NoProgress,
        &mut InterruptedAnswer(shutdown.clone()),
    );

    assert_eq!(summary.completed, 5);
    assert_cancelled_untouched(&summary, &fx);
    assert_eq!(summary.action_log.count_matching("Cancelled during remediation"), 1);
}
