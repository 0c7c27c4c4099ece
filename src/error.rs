//! Structured error handling and exit codes.

use serde::Serialize;

use crate::orchestrator::{ScanError, ScanOutcome};

/// Process exit codes.
///
/// - 0: Scan completed and candidate duplicates were found
/// - 1: General error, including a failed scan
/// - 2: Scan completed, no candidate duplicates
/// - 3: Scan completed but some containers could not be read
/// - 130: Scan cancelled (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Scan completed and duplicates were found.
    Success = 0,
    /// An error occurred or the scan failed.
    GeneralError = 1,
    /// Scan completed but no duplicates were found.
    NoDuplicates = 2,
    /// Scan completed with unreadable containers skipped.
    PartialSuccess = 3,
    /// Scan was cancelled.
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
            Self::Success => "DT000",
            Self::GeneralError => "DT001",
            Self::NoDuplicates => "DT002",
            Self::PartialSuccess => "DT003",
            Self::Interrupted => "DT130",
        }
    }

    /// Exit code describing a finished scan.
    ///
    /// Unreadable containers take precedence over the duplicate count so a
    /// partial walk is never mistaken for a clean one.
    #[must_use]
    pub fn from_outcome(outcome: &ScanOutcome) -> Self {
        match outcome {
            ScanOutcome::Completed(report) if report.summary.has_unreadable() => {
                Self::PartialSuccess
            }
            ScanOutcome::Completed(report) if report.groups.is_empty() => Self::NoDuplicates,
            ScanOutcome::Completed(_) => Self::Success,
            ScanOutcome::Cancelled => Self::Interrupted,
            ScanOutcome::Failed(_) => Self::GeneralError,
        }
    }

    /// Exit code for an error that reached `main`.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<Interrupted>().is_some() {
            Self::Interrupted
        } else {
            Self::GeneralError
        }
    }
}

/// Marker error for a scan that ended by cancellation.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Scan cancelled")]
pub struct Interrupted;

/// Structured error information for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DT001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the scan was cancelled
    pub interrupted: bool,
    /// Whether the same scan could succeed if retried
    pub retryable: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        let retryable = err
            .downcast_ref::<crate::orchestrator::ScanFailure>()
            .is_some_and(|f| f.is_retryable())
            || err
                .downcast_ref::<ScanError>()
                .is_some_and(|e| matches!(e, ScanError::AlreadyInProgress));

        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
            retryable,
        }
    }
}
