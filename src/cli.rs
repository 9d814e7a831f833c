//! Command-line interface definitions for filevet.
//!
//! Global options (verbosity, color, config file) apply to every
//! subcommand. Scan options left unset fall through to the config file,
//! then to `FILEVET_*` environment variables, then to built-in defaults.
//!
//! # Example
//!
//! ```bash
//! # Verify every video under ~/Videos with ffmpeg, 4 at a time
//! filevet scan ~/Videos -j 4
//!
//! # Custom verifier, delete flagged files without asking
//! filevet scan /media --command "ffprobe -v error {filePath}" --action delete -y
//!
//! # Also report exact duplicates and write a CSV report
//! filevet scan /media --dedup --report report.csv
//!
//! # Show the merged configuration
//! filevet config
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::actions::RemediationAction;
use crate::config::CliOverrides;
use crate::output::ReportFormat;

/// Bounded-concurrency file verifier.
///
/// filevet runs an external verification tool over every matching file,
/// a few at a time, shows live progress, optionally reports exact
/// duplicates, and lets you quarantine or delete files the tool flagged.
#[derive(Debug, Parser)]
#[command(name = "filevet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Verify files under one or more directories
    Scan(ScanArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directories (or files) to verify
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// File extensions to include (repeatable; default: common video types)
    #[arg(short, long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Verifier command; {filePath} is replaced by each file's path
    #[arg(long, value_name = "TEMPLATE")]
    pub command: Option<String>,

    /// Maximum verifiers running at once (default: CPU count)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// What to do with flagged files
    #[arg(long, value_enum)]
    pub action: Option<RemediationAction>,

    /// Quarantine directory for the move action
    #[arg(long, value_name = "DIR")]
    pub quarantine: Option<PathBuf>,

    /// Send deleted files to the system trash
    #[arg(long)]
    pub trash: bool,

    /// Also hash every file and report exact duplicates
    #[arg(long)]
    pub dedup: bool,

    /// Content hash used for duplicate detection
    #[arg(long, value_name = "ALG", value_parser = ["blake3", "sha256"])]
    pub hash_algorithm: Option<String>,

    /// Treat a non-zero verifier exit status as flagged even without output
    #[arg(long)]
    pub flag_nonzero_exit: bool,

    /// Remediate without asking for confirmation
    #[arg(short = 'y', long, conflicts_with = "no_remediate")]
    pub yes: bool,

    /// Skip remediation; every flagged file is reported as skipped
    #[arg(long)]
    pub no_remediate: bool,

    /// Write the report to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Report encoding
    #[arg(long, value_enum, default_value = "csv")]
    pub report_format: ReportFormat,

    /// Write the timestamped action log to this file
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Controller refresh interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,
}

impl ScanArgs {
    /// Values given on the command line, for layering over the config.
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            command: self.command.clone(),
            extensions: (!self.extensions.is_empty()).then(|| self.extensions.clone()),
            max_concurrent: self.jobs,
            action: self.action,
            quarantine_dir: self.quarantine.clone(),
            use_trash: self.trash.then_some(true),
            dedup: self.dedup.then_some(true),
            hash_algorithm: self.hash_algorithm.clone(),
            poll_interval_ms: self.poll_interval,
            flag_nonzero_exit: self.flag_nonzero_exit.then_some(true),
        }
    }
}
