//! Confirm → act → done state machine over the flagged-file list.
//!
//! The engine is driven either step by step ([`RemediationEngine::answer`]
//! then [`RemediationEngine::act`]) or in one call with
//! [`RemediationEngine::run`]. Every flagged file ends up with exactly one
//! [`RemediationOutcome`], in discovery order.
//!
//! With a cancel flag attached, a cancellation observed after the question
//! is answered, or between two files, skips every file not yet handled.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::delete::{delete_to_trash, permanent_delete};
use super::prompt::Confirm;
use super::quarantine::{ensure_quarantine_dir, move_to_quarantine};
use crate::pipeline::FlaggedFile;

/// Detail of outcomes skipped because the run was cancelled.
pub const CANCELLED_REASON: &str = "run cancelled";

/// What to do with flagged files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RemediationAction {
    /// Move into the quarantine directory.
    #[default]
    Move,
    /// Delete (permanently, or to the trash when enabled).
    Delete,
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move => write!(f, "move"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Result of remediating one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Moved,
    Deleted,
    Skipped,
    Failed,
}

impl OutcomeKind {
    /// Lowercase label used in reports and logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Moved => "moved",
            Self::Deleted => "deleted",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_failure(self) -> bool {
        self == Self::Failed
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal record for one flagged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationOutcome {
    pub path: PathBuf,
    pub action: OutcomeKind,
    pub detail: String,
    /// Why the file was flagged
    pub diagnostic: String,
}

impl RemediationOutcome {
    fn new(file: &FlaggedFile, action: OutcomeKind, detail: impl Into<String>) -> Self {
        Self {
            path: file.path.clone(),
            action,
            detail: detail.into(),
            diagnostic: file.diagnostic.clone(),
        }
    }
}

/// How remediation should be carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationPlan {
    pub action: RemediationAction,
    pub quarantine_dir: PathBuf,
    pub use_trash: bool,
}

impl RemediationPlan {
    #[must_use]
    pub fn new(action: RemediationAction) -> Self {
        Self {
            action,
            quarantine_dir: PathBuf::from("quarantine"),
            use_trash: false,
        }
    }

    #[must_use]
    pub fn with_quarantine_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.quarantine_dir = dir.into();
        self
    }

    /// Send deletions to the system trash instead of removing them.
    #[must_use]
    pub fn with_trash(mut self, use_trash: bool) -> Self {
        self.use_trash = use_trash;
        self
    }
}

/// Engine state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationState {
    AwaitingConfirmation,
    Acting,
    Done,
}

/// Callback for remediation progress reporting.
pub trait RemediationCallback {
    /// Called once before the first file is handled.
    fn on_start(&mut self, total: usize);

    /// Called before each file.
    fn on_before_action(&mut self, path: &Path, index: usize, total: usize);

    /// Called with the outcome of each file.
    fn on_outcome(&mut self, outcome: &RemediationOutcome);

    /// Called when all files are handled.
    fn on_complete(&mut self, outcomes: &[RemediationOutcome]);
}

/// State machine turning a flagged-file list into outcomes.
#[derive(Debug)]
pub struct RemediationEngine {
    flagged: Vec<FlaggedFile>,
    plan: RemediationPlan,
    state: RemediationState,
    outcomes: Vec<RemediationOutcome>,
    cancel: Option<Arc<AtomicBool>>,
}

impl RemediationEngine {
    /// Create an engine. An empty list starts out `Done`.
    #[must_use]
    pub fn new(mut flagged: Vec<FlaggedFile>, plan: RemediationPlan) -> Self {
        flagged.sort_by_key(|f| f.sequence);
        let state = if flagged.is_empty() {
            RemediationState::Done
        } else {
            RemediationState::AwaitingConfirmation
        };
        Self {
            flagged,
            plan,
            state,
            outcomes: Vec::new(),
            cancel: None,
        }
    }

    /// Stop before the next file once `flag` becomes `true`.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn state(&self) -> RemediationState {
        self.state
    }

    #[must_use]
    pub fn plan(&self) -> &RemediationPlan {
        &self.plan
    }

    /// Outcomes recorded so far.
    #[must_use]
    pub fn outcomes(&self) -> &[RemediationOutcome] {
        &self.outcomes
    }

    /// The question shown to the user.
    #[must_use]
    pub fn prompt_message(&self) -> String {
        let count = self.flagged.len();
        let noun = if count == 1 { "file" } else { "files" };
        match (self.plan.action, self.plan.use_trash) {
            (RemediationAction::Move, _) => format!(
                "Move {count} flagged {noun} to {}?",
                self.plan.quarantine_dir.display()
            ),
            (RemediationAction::Delete, true) => {
                format!("Move {count} flagged {noun} to the trash?")
            }
            (RemediationAction::Delete, false) => {
                format!("Permanently delete {count} flagged {noun}?")
            }
        }
    }

    /// Record the confirmation answer.
    ///
    /// "yes" moves to `Acting`; "no" marks every file `Skipped` and moves
    /// to `Done`. Ignored outside `AwaitingConfirmation`.
    pub fn answer(&mut self, confirmed: bool) {
        if self.state != RemediationState::AwaitingConfirmation {
            return;
        }
        if confirmed {
            self.state = RemediationState::Acting;
            return;
        }

        self.skip_all("declined by user");
    }

    /// Mark every file `Skipped` with `reason` and finish without acting.
    ///
    /// Ignored once `Done`.
    pub fn skip_all(&mut self, reason: &str) {
        if self.state == RemediationState::Done {
            return;
        }

        log::info!("Skipping remediation of {} file(s): {}", self.flagged.len(), reason);
        self.outcomes = self
            .flagged
            .iter()
            .map(|f| RemediationOutcome::new(f, OutcomeKind::Skipped, reason))
            .collect();
        self.state = RemediationState::Done;
    }

    /// Consume the engine, yielding its outcomes.
    #[must_use]
    pub fn into_outcomes(self) -> Vec<RemediationOutcome> {
        self.outcomes
    }

    /// Handle every flagged file in discovery order. Ignored outside `Acting`.
    pub fn act(&mut self, mut callback: Option<&mut dyn RemediationCallback>) {
        if self.state != RemediationState::Acting {
            return;
        }

        let total = self.flagged.len();
        if let Some(cb) = callback.as_deref_mut() {
            cb.on_start(total);
        }

        let quarantine_fault = match self.plan.action {
            RemediationAction::Move => ensure_quarantine_dir(&self.plan.quarantine_dir)
                .err()
                .map(|e| {
                    log::error!("{}", e);
                    e.to_string()
                }),
            RemediationAction::Delete => None,
        };

        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = false;
        for (index, file) in self.flagged.iter().enumerate() {
            if !cancelled && self.is_cancelled() {
                log::warn!(
                    "Remediation cancelled with {} of {} file(s) handled",
                    index,
                    total
                );
                cancelled = true;
            }

            if let Some(cb) = callback.as_deref_mut() {
                cb.on_before_action(&file.path, index, total);
            }

            let outcome = match &quarantine_fault {
                _ if cancelled => {
                    RemediationOutcome::new(file, OutcomeKind::Skipped, CANCELLED_REASON)
                }
                Some(message) => {
                    RemediationOutcome::new(file, OutcomeKind::Failed, message.clone())
                }
                None => self.remediate_one(file),
            };

            if let Some(cb) = callback.as_deref_mut() {
                cb.on_outcome(&outcome);
            }
            outcomes.push(outcome);
        }

        if let Some(cb) = callback.as_deref_mut() {
            cb.on_complete(&outcomes);
        }

        self.outcomes = outcomes;
        self.state = RemediationState::Done;
    }

    fn remediate_one(&self, file: &FlaggedFile) -> RemediationOutcome {
        let path = file.path.as_path();
        let result = match self.plan.action {
            RemediationAction::Move => move_to_quarantine(path, &self.plan.quarantine_dir)
                .map(|dest| (OutcomeKind::Moved, dest.display().to_string())),
            RemediationAction::Delete if self.plan.use_trash => {
                delete_to_trash(path).map(|()| (OutcomeKind::Deleted, "moved to trash".to_string()))
            }
            RemediationAction::Delete => permanent_delete(path)
                .map(|()| (OutcomeKind::Deleted, "permanently deleted".to_string())),
        };

        match result {
            Ok((kind, detail)) => RemediationOutcome::new(file, kind, detail),
            Err(e) => {
                log::warn!("Remediation failed for {}: {}", path.display(), e);
                RemediationOutcome::new(file, OutcomeKind::Failed, e.to_string())
            }
        }
    }

    /// Ask for confirmation, act, and return the final outcomes.
    ///
    /// A cancellation seen once the prompt returns, whatever it returned,
    /// skips every file with [`CANCELLED_REASON`].
    ///
    /// # Errors
    ///
    /// Returns the prompt's I/O error if the answer could not be read; no
    /// file is touched in that case.
    pub fn run(
        mut self,
        confirm: &mut dyn Confirm,
        callback: Option<&mut dyn RemediationCallback>,
    ) -> io::Result<Vec<RemediationOutcome>> {
        if self.state == RemediationState::AwaitingConfirmation {
            let answer = confirm.confirm(&self.prompt_message());
            if self.is_cancelled() {
                self.skip_all(CANCELLED_REASON);
                return Ok(self.outcomes);
            }
            self.answer(answer?);
        }
        self.act(callback);
        Ok(self.outcomes)
    }
}
