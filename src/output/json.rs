//! JSON output formatter for scan results.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "duplicates": [
//!     {
//!       "key": "a.txt|10",
//!       "name": "a.txt",
//!       "size": 10,
//!       "files": ["/r/a.txt", "/r/b/a.txt"]
//!     }
//!   ],
//!   "summary": {
//!     "total_files": 3,
//!     "total_size": 25,
//!     "containers_visited": 2,
//!     "unreadable": [],
//!     "duplicate_groups": 1,
//!     "duplicate_files": 1,
//!     "reclaimable_space": 10,
//!     "scan_duration_ms": 4,
//!     "exit_code": 0,
//!     "exit_code_name": "DT000"
//!   }
//! }
//! ```
//!
//! Groups are sorted by name, then size.

use std::io::Write;

use serde::Serialize;

use crate::duplicates::GroupKey;
use crate::error::ExitCode;
use crate::orchestrator::{ScanReport, ScanSummary};
use crate::scanner::FileRecord;
use crate::source::SourceError;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// Group key, `name|size`
    pub key: String,
    /// Shared file name
    pub name: String,
    /// Shared size in bytes
    pub size: u64,
    /// Member locators, in discovery order
    pub files: Vec<String>,
}

impl JsonDuplicateGroup {
    /// Build a JSON group from a key and its members.
    #[must_use]
    pub fn new(key: &GroupKey, files: &[FileRecord]) -> Self {
        Self {
            key: key.to_string(),
            name: key.name.clone(),
            size: key.size,
            files: files.iter().map(|f| f.locator.to_string()).collect(),
        }
    }
}

/// A container skipped during the walk.
#[derive(Debug, Clone, Serialize)]
pub struct JsonUnreadable {
    /// Container that could not be listed
    pub locator: String,
    /// Why it could not be listed
    pub reason: String,
}

impl From<&SourceError> for JsonUnreadable {
    fn from(err: &SourceError) -> Self {
        let reason = match err {
            SourceError::Unreadable { reason, .. } | SourceError::BackendQuery { reason, .. } => {
                reason.clone()
            }
            other => other.to_string(),
        };
        Self {
            locator: err.locator().to_string(),
            reason,
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Total number of files scanned
    pub total_files: usize,
    /// Total size of all scanned files in bytes
    pub total_size: u64,
    /// Number of containers listed
    pub containers_visited: usize,
    /// Containers skipped as unreadable
    pub unreadable: Vec<JsonUnreadable>,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Number of duplicate files (excluding one per group)
    pub duplicate_files: usize,
    /// Bytes freed by keeping one copy per group
    pub reclaimable_space: u64,
    /// Duration of the scan in milliseconds
    pub scan_duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DT000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a ScanSummary and an exit code.
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            total_files: summary.total_files,
            total_size: summary.total_size,
            containers_visited: summary.containers_visited,
            unreadable: summary.unreadable.iter().map(JsonUnreadable::from).collect(),
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_bytes,
            scan_duration_ms: summary.scan_duration.as_millis() as u64,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// List of duplicate groups
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Scan summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create a new JSON output from a report and exit code.
    #[must_use]
    pub fn new(report: &ScanReport, exit_code: ExitCode) -> Self {
        Self {
            duplicates: report
                .groups
                .sorted_groups()
                .into_iter()
                .map(|(key, files)| JsonDuplicateGroup::new(key, files))
                .collect(),
            summary: JsonSummary::from_scan_summary(&report.summary, exit_code),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
