//! Progress reporting for the analysis and remediation phases.
//!
//! # Overview
//!
//! [`build_frame`] is a pure function of the aggregator's counters and
//! rolling window: it computes the overall percentage and the truncated
//! lines to show, and never mutates anything, so it can be called at any
//! polling cadence. Renderers implement [`ProgressCallback`] and decide how
//! a frame reaches the user:
//!
//! - [`TerminalProgress`]: redraws the frame in place with crossterm
//! - [`LogProgress`]: plain log lines for pipes and CI
//! - [`NoProgress`]: quiet mode
//!
//! Remediation uses an indicatif bar via [`RemediationBar`].

use std::io::{self, Write};
use std::time::Duration;

use crossterm::{
    cursor, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::actions::{RemediationCallback, RemediationOutcome};
use crate::pipeline::{Completion, RollingWindow};

/// Path width used when the terminal size is unknown.
pub const DEFAULT_PATH_WIDTH: usize = 70;

/// Width of the `[FLAGGED] ` status column.
const STATUS_COLUMN_WIDTH: usize = 10;

const ELLIPSIS: &str = "...";

/// One rendered line of the rolling window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    /// Whether the file was flagged
    pub flagged: bool,
    /// Path, truncated to the available width
    pub display_path: String,
}

/// Everything a renderer needs to draw one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressFrame {
    /// Tasks aggregated so far
    pub completed: usize,
    /// Tasks in the run
    pub total: usize,
    /// `completed / total * 100`, rounded to two decimals
    pub percent: f64,
    /// At most ten recent outcomes, most recent last
    pub lines: Vec<ProgressLine>,
}

/// Build a render instruction from the aggregator's state.
///
/// An empty run counts as 100% complete.
///
/// # Example
///
/// ```
/// use filevet::pipeline::RollingWindow;
/// use filevet::progress::build_frame;
///
/// let frame = build_frame(1, 3, &RollingWindow::default(), 40);
/// assert_eq!(frame.percent, 33.33);
/// assert!(frame.lines.is_empty());
/// ```
#[must_use]
pub fn build_frame(
    completed: usize,
    total: usize,
    window: &RollingWindow,
    path_width: usize,
) -> ProgressFrame {
    let percent = if total == 0 {
        100.0
    } else {
        ((completed as f64 / total as f64) * 100.0 * 100.0).round() / 100.0
    };

    let lines = window
        .iter()
        .map(|entry| ProgressLine {
            flagged: entry.flagged,
            display_path: truncate_middle(&entry.path.to_string_lossy(), path_width),
        })
        .collect();

    ProgressFrame {
        completed,
        total,
        percent,
        lines,
    }
}

/// Shorten `path` to at most `width` characters by eliding the middle.
///
/// The head keeps `floor((width - 3) / 2) - 2` characters and the tail
/// takes the rest, joined by a three-character ellipsis. Widths too narrow
/// for the ellipsis fall back to a plain prefix.
///
/// # Example
///
/// ```
/// use filevet::progress::truncate_middle;
///
/// let path = "/media/archive/2019/holiday/video_0001.mkv";
/// let short = truncate_middle(path, 20);
/// assert_eq!(short, "/media...eo_0001.mkv");
/// assert_eq!(short.chars().count(), 20);
/// ```
#[must_use]
pub fn truncate_middle(path: &str, width: usize) -> String {
    let len = path.chars().count();
    if len <= width {
        return path.to_string();
    }
    if width <= ELLIPSIS.len() {
        return path.chars().take(width).collect();
    }

    let head = ((width - ELLIPSIS.len()) / 2).saturating_sub(2);
    let tail = width - ELLIPSIS.len() - head;

    let mut out: String = path.chars().take(head).collect();
    out.push_str(ELLIPSIS);
    out.extend(path.chars().skip(len - tail));
    out
}

/// Receives events from the controller loop.
pub trait ProgressCallback {
    /// Called once before the first dispatch.
    fn on_start(&mut self, _total: usize) {}

    /// Called once per newly aggregated task.
    fn on_completion(&mut self, _completion: &Completion) {}

    /// Called every loop iteration with a fresh frame.
    fn on_frame(&mut self, frame: &ProgressFrame);

    /// Called when the loop exits.
    fn on_finish(&mut self, _cancelled: bool) {}

    /// Width available for paths in frame lines.
    fn path_width(&self) -> usize {
        DEFAULT_PATH_WIDTH
    }
}

/// Discards all progress.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_frame(&mut self, _frame: &ProgressFrame) {}
}

/// Progress as log lines, for non-interactive output.
///
/// Flagged files are logged as they arrive; overall progress is logged at
/// every 10% step.
#[derive(Debug, Default)]
pub struct LogProgress {
    last_decile: Option<u64>,
}

impl LogProgress {
    /// Create a log-based reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressCallback for LogProgress {
    fn on_start(&mut self, total: usize) {
        log::info!("Verifying {} file(s)", total);
    }

    fn on_completion(&mut self, completion: &Completion) {
        let result = &completion.result;
        if result.is_flagged {
            log::warn!("FLAGGED {}: {}", result.path.display(), result.diagnostic);
        } else {
            log::debug!("OK {}", result.path.display());
        }
    }

    fn on_frame(&mut self, frame: &ProgressFrame) {
        let decile = (frame.percent / 10.0).floor() as u64;
        if self.last_decile != Some(decile) {
            self.last_decile = Some(decile);
            log::info!(
                "Progress: {:.2}% ({}/{})",
                frame.percent,
                frame.completed,
                frame.total
            );
        }
    }
}

/// Redraws the frame in place on an interactive terminal.
#[derive(Debug)]
pub struct TerminalProgress {
    lines_drawn: u16,
    color: bool,
}

impl TerminalProgress {
    /// Create a terminal renderer.
    ///
    /// # Arguments
    ///
    /// * `color` - Color the status column
    #[must_use]
    pub fn new(color: bool) -> Self {
        Self {
            lines_drawn: 0,
            color,
        }
    }

    fn draw(&mut self, frame: &ProgressFrame) -> io::Result<()> {
        let mut out = io::stdout().lock();

        if self.lines_drawn > 0 {
            queue!(out, cursor::MoveUp(self.lines_drawn))?;
        }
        queue!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::FromCursorDown),
            Print(format!(
                "Progress: {:>6.2}% ({}/{})  press q to cancel\r\n",
                frame.percent, frame.completed, frame.total
            ))
        )?;

        for line in &frame.lines {
            let (label, color) = if line.flagged {
                ("FLAGGED", Color::Red)
            } else {
                ("OK", Color::Green)
            };
            if self.color {
                queue!(out, SetForegroundColor(color))?;
            }
            queue!(out, Print(format!("[{label:^7}]")))?;
            if self.color {
                queue!(out, ResetColor)?;
            }
            queue!(out, Print(" "), Print(&line.display_path), Print("\r\n"))?;
        }

        out.flush()?;
        self.lines_drawn = u16::try_from(frame.lines.len() + 1).unwrap_or(u16::MAX);
        Ok(())
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_frame(&mut self, frame: &ProgressFrame) {
        if let Err(e) = self.draw(frame) {
            log::debug!("Failed to draw progress: {}", e);
        }
    }

    fn on_finish(&mut self, cancelled: bool) {
        let mut out = io::stdout().lock();
        let message = if cancelled {
            "Cancelled.\r\n"
        } else {
            "Verification complete.\r\n"
        };
        let _ = queue!(out, Print(message));
        let _ = out.flush();
    }

    fn path_width(&self) -> usize {
        terminal::size()
            .map(|(cols, _)| usize::from(cols).saturating_sub(STATUS_COLUMN_WIDTH + 1))
            .unwrap_or(DEFAULT_PATH_WIDTH)
            .max(10)
    }
}

/// indicatif bar tracking remediation actions.
pub struct RemediationBar {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl RemediationBar {
    /// Create a remediation bar. Nothing is drawn when `quiet` is set.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.red/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }
}

impl RemediationCallback for RemediationBar {
    fn on_start(&mut self, total: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(Self::style());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.bar = Some(bar);
    }

    fn on_before_action(&mut self, path: &std::path::Path, _index: usize, _total: usize) {
        if let Some(ref bar) = self.bar {
            bar.set_message(truncate_middle(&path.to_string_lossy(), 40));
        }
    }

    fn on_outcome(&mut self, outcome: &RemediationOutcome) {
        if let Some(ref bar) = self.bar {
            if outcome.action.is_failure() {
                bar.println(format!(
                    "Failed: {} ({})",
                    outcome.path.display(),
                    outcome.detail
                ));
            }
            bar.inc(1);
        }
    }

    fn on_complete(&mut self, outcomes: &[RemediationOutcome]) {
        if let Some(bar) = self.bar.take() {
            let failed = outcomes.iter().filter(|o| o.action.is_failure()).count();
            bar.finish_with_message(format!(
                "{} processed, {} failed",
                outcomes.len(),
                failed
            ));
        }
    }
}
