//! Logging infrastructure for filevet.
//!
//! Diagnostic logging uses the `log` facade with an `env_logger` backend
//! writing to stderr. Levels are determined by (in priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (error only) or `--verbose` (debug/trace)
//! 3. Default: info, or warn while the live progress display owns the terminal
//!
//! The persisted per-run record of verdicts and remediation outcomes is a
//! separate thing, see [`crate::output::ActionLog`].
//!
//! # Example
//!
//! ```rust,no_run
//! use filevet::logging::init_logging;
//!
//! init_logging(1, false, false);
//! log::debug!("Debug info here");
//! ```

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Initialize the logging subsystem based on CLI verbosity flags.
///
/// `live_display` lowers the default level to warn so info lines do not
/// tear the in-place progress frame; `-v` still raises it.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(verbose: u8, quiet: bool, live_display: bool) {
    let use_env = env::var("RUST_LOG").is_ok();

    let mut builder = Builder::new();
    let level = determine_level(verbose, quiet, live_display);

    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level);
    }

    configure_format(&mut builder, verbose);

    if builder.try_init().is_err() {
        return;
    }

    if use_env {
        log::debug!(
            "Logging initialized from RUST_LOG: {:?}",
            env::var("RUST_LOG").ok()
        );
    } else {
        log::debug!("Logging initialized at level: {:?}", level);
    }
}

/// Determine the log level from CLI flags.
fn determine_level(verbose: u8, quiet: bool, live_display: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 if live_display => LevelFilter::Warn,
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Line ending for the current terminal mode.
///
/// Raw mode (active while the cancel-key watcher runs) does not translate
/// `\n`, so lines need an explicit carriage return.
fn line_ending() -> &'static str {
    if crossterm::terminal::is_raw_mode_enabled().unwrap_or(false) {
        "\r\n"
    } else {
        "\n"
    }
}

/// Configure the log format.
///
/// - Debug builds: timestamp and level, plus module path with `-v`
/// - Release builds: level and message only
fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let timestamp = buf.timestamp_seconds();
            let level = record.level();
            let level_style = buf.default_level_style(level);

            if verbose >= 1 {
                write!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} [{}] {}{}",
                    timestamp,
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args(),
                    line_ending()
                )
            } else {
                write!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} {}{}",
                    timestamp,
                    level,
                    record.args(),
                    line_ending()
                )
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let level_style = buf.default_level_style(level);
            write!(
                buf,
                "{level_style}{:<5}{level_style:#} {}{}",
                level,
                record.args(),
                line_ending()
            )
        });
    }
}

/// Get the current log level as a string.
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
