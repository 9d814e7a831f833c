//! filevet - Bounded-Concurrency File Verifier
//!
//! Runs an external verification tool over every matching file under one or
//! more roots, a few at a time, with live progress, optional exact-duplicate
//! detection, and confirmed quarantine or deletion of flagged files.
//!
//! # Modules
//!
//! - [`scanner`]: discovery of files to verify
//! - [`verifier`]: external command invocation and content hashing
//! - [`pipeline`]: task queue, scheduler, aggregator and controller loop
//! - [`duplicates`]: grouping of identical content
//! - [`actions`]: the remediation state machine and file operations
//! - [`output`]: action log and CSV/JSON reports
//! - [`progress`]: live display and remediation progress
//! - [`config`], [`cli`], [`logging`], [`signal`], [`error`]: the shell around it

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod verifier;

use std::fs::File;
use std::io::{self, BufWriter, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use yansi::Paint;

use crate::actions::{
    AutoConfirm, Confirm, OutcomeKind, PromptConfirm, RemediationCallback, RemediationEngine,
    RemediationOutcome, RemediationPlan, CANCELLED_REASON,
};
use crate::cli::{Cli, Commands, ScanArgs};
use crate::config::{CliOverrides, Settings};
use crate::duplicates::{group_duplicates, DuplicateGroup, GroupingStats};
use crate::error::ExitCode;
use crate::output::{
    build_report, ActionLog, CsvOutput, JsonOutput, JsonSummary, ReportFormat, ReportRecord,
};
use crate::pipeline::{
    run_pipeline, ControllerConfig, FlaggedFile, Scheduler, SchedulerConfig, TaskQueue,
};
use crate::progress::{
    LogProgress, NoProgress, ProgressCallback, RemediationBar, TerminalProgress,
};
use crate::scanner::{Walker, WalkerConfig};
use crate::signal::{KeyWatcher, ShutdownHandler};
use crate::verifier::{CommandVerifier, ContentHasher};

/// Interactive pieces a scan is wired to.
pub struct ScanContext<'a> {
    /// Cancellation source shared with the verifiers
    pub shutdown: &'a ShutdownHandler,
    /// Live display for the verification phase
    pub progress: &'a mut dyn ProgressCallback,
    /// Answers the remediation question
    pub confirm: &'a mut dyn Confirm,
    /// Progress for the remediation phase
    pub remediation_progress: Option<&'a mut dyn RemediationCallback>,
    /// Put the terminal in raw mode and watch for the cancel key
    pub watch_keys: bool,
}

/// Everything a finished (or cancelled) scan produced.
#[derive(Debug)]
pub struct ScanSummary {
    pub exit_code: ExitCode,
    pub total_files: usize,
    pub completed: usize,
    /// Invocation faults among the completed files
    pub faults: usize,
    /// Entries skipped during discovery
    pub scan_errors: usize,
    pub flagged: Vec<FlaggedFile>,
    pub groups: Vec<DuplicateGroup>,
    pub grouping: GroupingStats,
    pub outcomes: Vec<RemediationOutcome>,
    pub records: Vec<ReportRecord>,
    pub action_log: ActionLog,
    pub elapsed: Duration,
    pub interrupted: bool,
}

impl ScanSummary {
    /// Remediation outcomes that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action.is_failure())
            .count()
    }

    fn count_outcomes(&self, kind: OutcomeKind) -> usize {
        self.outcomes.iter().filter(|o| o.action == kind).count()
    }

    /// Statistics block for the JSON report.
    #[must_use]
    pub fn json_summary(&self) -> JsonSummary {
        JsonSummary {
            total_files: self.total_files,
            completed: self.completed,
            flagged: self.flagged.len(),
            failed: self.failed_count(),
            duplicate_groups: self.groups.len(),
            duration_ms: u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX),
            interrupted: self.interrupted,
            ..JsonSummary::default()
        }
        .with_exit_code(self.exit_code)
    }
}

/// Main application logic.
///
/// # Errors
///
/// Returns an error when configuration is invalid, the worker pool cannot
/// start, or a report or log cannot be written.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    if cli.no_color || !io::stdout().is_terminal() {
        yansi::disable();
    }

    match &cli.command {
        Commands::Config => {
            let settings = Settings::load(cli.config.as_deref(), &CliOverrides::default())
                .context("failed to load configuration")?;
            print!(
                "{}",
                settings
                    .to_toml()
                    .context("failed to serialize configuration")?
            );
            Ok(ExitCode::Success)
        }
        Commands::Scan(args) => run_scan_command(&cli, args),
    }
}

fn run_scan_command(cli: &Cli, args: &ScanArgs) -> Result<ExitCode> {
    let settings = Settings::load(cli.config.as_deref(), &args.overrides())
        .context("failed to load configuration")?;
    log::debug!("Effective settings: {:?}", settings);

    let shutdown = signal::install_handler().context("failed to install signal handler")?;

    let interactive = io::stdout().is_terminal();
    let mut terminal_progress;
    let mut log_progress;
    let mut no_progress = NoProgress;
    let progress: &mut dyn ProgressCallback = if cli.quiet {
        &mut no_progress
    } else if interactive {
        terminal_progress = TerminalProgress::new(!cli.no_color);
        &mut terminal_progress
    } else {
        log_progress = LogProgress::new();
        &mut log_progress
    };

    let mut confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(PromptConfirm::stdio(shutdown.get_flag()))
    };
    let mut bar = RemediationBar::new(cli.quiet);

    let summary = run_scan(
        args,
        &settings,
        ScanContext {
            shutdown: &shutdown,
            progress,
            confirm: confirm.as_mut(),
            remediation_progress: Some(&mut bar),
            watch_keys: interactive && io::stdin().is_terminal(),
        },
    )?;

    if !cli.quiet {
        print_summary(&summary, &settings);
    }
    Ok(summary.exit_code)
}

/// Discover, verify, group, remediate and report.
///
/// A cancelled run skips duplicate grouping and remediation: every flagged
/// file found so far is reported as skipped. The action log and report are
/// still written.
///
/// # Errors
///
/// Returns an error when the verifier or worker pool cannot be set up, the
/// confirmation cannot be read, or an output file cannot be written.
pub fn run_scan(args: &ScanArgs, settings: &Settings, ctx: ScanContext<'_>) -> Result<ScanSummary> {
    let ScanContext {
        shutdown,
        progress,
        confirm,
        remediation_progress,
        watch_keys,
    } = ctx;
    let mut action_log = ActionLog::new();

    let walker = Walker::new(
        args.paths.clone(),
        WalkerConfig::with_extensions(&settings.extensions)
            .with_excluded_dir(settings.quarantine_dir.clone()),
    )
    .with_shutdown_flag(shutdown.get_flag());
    let (files, scan_errors) = walker.discover();
    for err in &scan_errors {
        action_log.warn(format!("SKIPPED {err}"));
    }

    let verifier = CommandVerifier::from_template(&settings.command)
        .context("invalid verifier command")?
        .with_flag_nonzero_exit(settings.flag_nonzero_exit);

    let mut scheduler_config = SchedulerConfig::default()
        .with_max_concurrent(settings.max_concurrent)
        .with_cancel_flag(shutdown.get_flag());
    if settings.dedup {
        scheduler_config = scheduler_config.with_hasher(ContentHasher::new(settings.hash_algorithm()?));
    }
    let scheduler = Scheduler::new(
        TaskQueue::from_paths(files),
        Arc::new(verifier),
        scheduler_config,
    )
    .context("failed to start verifier pool")?;

    let controller = ControllerConfig::default().with_poll_interval(settings.poll_interval());
    let run = {
        let _keys = if watch_keys {
            KeyWatcher::spawn(shutdown.clone())
                .map_err(|e| log::warn!("Cancel key unavailable: {}", e))
                .ok()
        } else {
            None
        };
        run_pipeline(scheduler, &controller, shutdown, progress, &mut action_log)
    };

    let mut interrupted = run.is_cancelled();
    if !interrupted && shutdown.is_shutdown_requested() {
        interrupted = true;
        action_log.warn("Cancelled before remediation");
    }
    let total_files = run.aggregator.total();
    let completed = run.aggregator.completed_count();
    let faults = run.aggregator.failed_count();
    let elapsed = run.elapsed;
    let (flagged, hash_index) = run.aggregator.into_parts();

    let (groups, grouping) = if settings.dedup && !interrupted {
        group_duplicates(&hash_index)
    } else {
        (Vec::new(), GroupingStats::default())
    };
    for (idx, group) in groups.iter().enumerate() {
        action_log.info(format!(
            "DUPLICATE group-{}: {} file(s) share {}",
            idx + 1,
            group.len(),
            group.hash
        ));
    }

    let plan = RemediationPlan::new(settings.action)
        .with_quarantine_dir(settings.quarantine_dir.clone())
        .with_trash(settings.use_trash);
    let mut engine =
        RemediationEngine::new(flagged.clone(), plan).with_cancel_flag(shutdown.get_flag());
    let outcomes = if interrupted {
        engine.skip_all(CANCELLED_REASON);
        engine.into_outcomes()
    } else if args.no_remediate {
        engine.skip_all("remediation disabled");
        engine.into_outcomes()
    } else {
        engine
            .run(confirm, remediation_progress)
            .context("failed to read remediation confirmation")?
    };
    if !interrupted && shutdown.is_shutdown_requested() {
        interrupted = true;
        action_log.warn("Cancelled during remediation");
    }
    for outcome in &outcomes {
        let line = format!(
            "{} {}: {}",
            outcome.action.label().to_uppercase(),
            outcome.path.display(),
            outcome.detail
        );
        if outcome.action.is_failure() {
            action_log.error(line);
        } else {
            action_log.info(line);
        }
    }

    let exit_code = if interrupted {
        ExitCode::Interrupted
    } else if flagged.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::FlaggedFound
    };

    let records = build_report(&groups, &outcomes);
    let summary = ScanSummary {
        exit_code,
        total_files,
        completed,
        faults,
        scan_errors: scan_errors.len(),
        flagged,
        groups,
        grouping,
        outcomes,
        records,
        action_log,
        elapsed,
        interrupted,
    };

    if let Some(path) = &args.report {
        write_report(path, args.report_format, &summary)?;
        log::info!("Report written to {}", path.display());
    }
    if let Some(path) = &args.log {
        summary
            .action_log
            .save(path)
            .with_context(|| format!("failed to write action log {}", path.display()))?;
        log::info!("Action log written to {}", path.display());
    }

    Ok(summary)
}

fn write_report(path: &Path, format: ReportFormat, summary: &ScanSummary) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create report {}", path.display()))?;
    let writer = BufWriter::new(file);
    match format {
        ReportFormat::Csv => CsvOutput::new(&summary.records)
            .write_to(writer)
            .with_context(|| format!("failed to write report {}", path.display()))?,
        ReportFormat::Json => JsonOutput::new(&summary.records, summary.json_summary())
            .write_to(writer)
            .with_context(|| format!("failed to write report {}", path.display()))?,
    }
    Ok(())
}

fn print_summary(summary: &ScanSummary, settings: &Settings) {
    let headline = format!(
        "Verified {} of {} file(s) in {:.1}s",
        summary.completed,
        summary.total_files,
        summary.elapsed.as_secs_f64()
    );
    if summary.interrupted {
        println!("{} {}", "Interrupted.".yellow().bold(), headline);
    } else {
        println!("{}", headline.bold());
    }

    let flagged = summary.flagged.len();
    if flagged == 0 {
        println!("  Flagged: {}", "0".green());
    } else {
        println!("  Flagged: {}", flagged.to_string().red().bold());
    }
    if summary.faults > 0 {
        println!("  Verifier failures: {}", summary.faults.to_string().red());
    }
    if summary.scan_errors > 0 {
        println!("  Unreadable entries: {}", summary.scan_errors.to_string().yellow());
    }
    if settings.dedup && !summary.interrupted {
        println!(
            "  Duplicate groups: {} ({} redundant file(s))",
            summary.groups.len(),
            summary.grouping.redundant_files()
        );
    }
    if flagged > 0 {
        println!(
            "  Remediation: {} moved, {} deleted, {} skipped, {} failed",
            summary.count_outcomes(OutcomeKind::Moved).to_string().green(),
            summary.count_outcomes(OutcomeKind::Deleted).to_string().green(),
            summary.count_outcomes(OutcomeKind::Skipped),
            summary.failed_count().to_string().red()
        );
    }
}
