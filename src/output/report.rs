//! Flat report records for duplicate groups and remediation outcomes.
//!
//! Every record has the same four fields so any sink can write it as a
//! table row:
//!
//! | type        | status       | detail         | diagnostic      | path         |
//! |-------------|--------------|----------------|-----------------|--------------|
//! | `duplicate` | `group-1`    | content hash   | empty           | member path  |
//! | `flagged`   | outcome kind | outcome detail | verifier output | flagged path |

use std::fmt;

use serde::Serialize;

use crate::actions::RemediationOutcome;
use crate::duplicates::DuplicateGroup;

/// Record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Duplicate,
    Flagged,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => write!(f, "duplicate"),
            Self::Flagged => write!(f, "flagged"),
        }
    }
}

/// One row of the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRecord {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub status: String,
    pub detail: String,
    pub diagnostic: String,
    pub path: String,
}

/// Build report records: duplicate members first (group order, then member
/// order), followed by one record per remediation outcome.
#[must_use]
pub fn build_report(
    groups: &[DuplicateGroup],
    outcomes: &[RemediationOutcome],
) -> Vec<ReportRecord> {
    let member_count: usize = groups.iter().map(DuplicateGroup::len).sum();
    let mut records = Vec::with_capacity(member_count + outcomes.len());

    for (idx, group) in groups.iter().enumerate() {
        let status = format!("group-{}", idx + 1);
        records.extend(group.paths.iter().map(|path| ReportRecord {
            record_type: RecordType::Duplicate,
            status: status.clone(),
            detail: group.hash.clone(),
            diagnostic: String::new(),
            path: path.to_string_lossy().into_owned(),
        }));
    }

    records.extend(outcomes.iter().map(|outcome| ReportRecord {
        record_type: RecordType::Flagged,
        status: outcome.action.label().to_string(),
        detail: outcome.detail.clone(),
        diagnostic: outcome.diagnostic.clone(),
        path: outcome.path.to_string_lossy().into_owned(),
    }));

    records
}
