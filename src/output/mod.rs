//! Output formatters for completed scans.
//!
//! - text for people reading a terminal
//! - JSON for automation and scripting
//! - CSV for spreadsheet import
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use dupetree::error::ExitCode;
//! use dupetree::orchestrator::{ScanOrchestrator, ScanOutcome};
//! use dupetree::output::json::JsonOutput;
//! use dupetree::source::{DirectSource, Locator};
//!
//! let handle = ScanOrchestrator::default()
//!     .start_scan(Locator::Path(PathBuf::from(".")), Arc::new(DirectSource::new()))
//!     .unwrap();
//!
//! if let ScanOutcome::Completed(report) = handle.wait() {
//!     let output = JsonOutput::new(&report, ExitCode::Success);
//!     println!("{}", output.to_json_pretty().unwrap());
//! }
//! ```

pub mod csv;
pub mod json;
pub mod text;

use std::io::Write;

use crate::cli::OutputFormat;
use crate::error::ExitCode;
use crate::orchestrator::ScanReport;

// Re-export main types
pub use csv::{CsvOutput, CsvOutputError};
pub use json::{JsonOutput, JsonOutputError};
pub use text::TextOutput;

/// Render a report in the chosen format.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn render<W: Write>(
    format: OutputFormat,
    report: &ScanReport,
    exit_code: ExitCode,
    color: bool,
    writer: &mut W,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => TextOutput::new(report).with_color(color).write_to(writer)?,
        OutputFormat::Json => JsonOutput::new(report, exit_code).write_to(writer, true)?,
        OutputFormat::Csv => CsvOutput::new(&report.groups).write_to(writer)?,
    }
    Ok(())
}
