//! Report records and their sinks.
//!
//! - [`report`]: builds the flat `{type, status, detail, path}` records
//! - [`csv`] / [`json`]: structured export of those records
//! - [`log`]: timestamped text log of every verdict and outcome
//!
//! # Example
//!
//! ```no_run
//! use filevet::output::{build_report, CsvOutput};
//!
//! let records = build_report(&[], &[]);
//! println!("{}", CsvOutput::new(&records).to_string().unwrap());
//! ```

pub mod csv;
pub mod json;
pub mod log;
pub mod report;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use self::csv::CsvOutput;
pub use self::json::{JsonOutput, JsonSummary};
pub use self::log::{ActionLog, LogEntry};
pub use self::report::{build_report, RecordType, ReportRecord};

/// Encoding for the structured report file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}
