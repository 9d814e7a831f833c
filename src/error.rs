//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for the filevet application.
///
/// - 0: Clean (every file verified, nothing flagged)
/// - 1: General error (unexpected failure)
/// - 2: Configuration error (unusable settings, nothing was run)
/// - 3: Flagged files found, or remediation had failures
/// - 130: Interrupted by user (Ctrl+C or `q`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Run completed and no file was flagged.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Settings were rejected before the pipeline started.
    ConfigError = 2,
    /// Run completed with flagged files or failed remediation.
    FlaggedFound = 3,
    /// Run was cancelled.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "FV000",
            Self::GeneralError => "FV001",
            Self::ConfigError => "FV002",
            Self::FlaggedFound => "FV003",
            Self::Interrupted => "FV130",
        }
    }

    /// Pick the exit code for an application error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<crate::config::ConfigError>().is_some() {
            Self::ConfigError
        } else {
            Self::GeneralError
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "FV002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
