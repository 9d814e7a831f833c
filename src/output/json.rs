//! JSON sink for report records.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "records": [
//!     { "type": "duplicate", "status": "group-1", "detail": "ab12...", "diagnostic": "", "path": "/a.mkv" },
//!     { "type": "flagged", "status": "moved", "detail": "/q/b.mkv", "diagnostic": "moov atom not found", "path": "/b.mkv" }
//!   ],
//!   "summary": {
//!     "total_files": 5,
//!     "completed": 5,
//!     "flagged": 1,
//!     "failed": 0,
//!     "duplicate_groups": 1,
//!     "duration_ms": 1234,
//!     "interrupted": false,
//!     "exit_code": 3,
//!     "exit_code_name": "FV003"
//!   }
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use super::report::ReportRecord;
use crate::error::ExitCode;

/// Run statistics included alongside the records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JsonSummary {
    pub total_files: usize,
    pub completed: usize,
    pub flagged: usize,
    pub failed: usize,
    pub duplicate_groups: usize,
    pub duration_ms: u64,
    pub interrupted: bool,
    pub exit_code: i32,
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Fill in the exit code fields.
    #[must_use]
    pub fn with_exit_code(mut self, code: ExitCode) -> Self {
        self.exit_code = code.as_i32();
        self.exit_code_name = code.code_prefix().to_string();
        self
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    records: &'a [ReportRecord],
    summary: &'a JsonSummary,
}

/// JSON output formatter.
pub struct JsonOutput<'a> {
    records: &'a [ReportRecord],
    summary: JsonSummary,
}

impl<'a> JsonOutput<'a> {
    #[must_use]
    pub fn new(records: &'a [ReportRecord], summary: JsonSummary) -> Self {
        Self { records, summary }
    }

    fn document(&self) -> JsonDocument<'_> {
        JsonDocument {
            records: self.records,
            summary: &self.summary,
        }
    }

    /// Compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.document())
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.document())
    }

    /// Write pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut writer, &self.document())?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
