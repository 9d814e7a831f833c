//! CSV sink for report records.
//!
//! One row per [`ReportRecord`], with the header `type,status,detail,diagnostic,path`.
//!
//! # Example
//!
//! ```no_run
//! use filevet::output::csv::CsvOutput;
//! use filevet::output::build_report;
//!
//! let records = build_report(&[], &[]);
//! CsvOutput::new(&records).write_to(std::io::stdout()).unwrap();
//! ```

use std::io;

use thiserror::Error;

use super::report::ReportRecord;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    records: &'a [ReportRecord],
}

impl<'a> CsvOutput<'a> {
    #[must_use]
    pub fn new(records: &'a [ReportRecord]) -> Self {
        Self { records }
    }

    /// Write the CSV output to the given writer.
    ///
    /// The header is written even when there are no records.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        csv_writer.write_record(["type", "status", "detail", "diagnostic", "path"])?;
        for record in self.records {
            csv_writer.serialize(record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
