//! CSV output formatter for scan results.
//!
//! One row is generated for each member of each duplicate group.
//!
//! # Columns
//!
//! - `group_id`: 1-based group number, groups ordered by name then size
//! - `name`: Shared file name
//! - `size`: Shared size in bytes
//! - `locator`: Path or document id of the file

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::duplicates::GroupingResult;

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

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    group_id: usize,
    name: &'a str,
    size: u64,
    locator: String,
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    groups: &'a GroupingResult,
}

impl<'a> CsvOutput<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(groups: &'a GroupingResult) -> Self {
        Self { groups }
    }

    /// Write the CSV output to the given writer.
    ///
    /// The header row is written even when there are no groups.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        // Header written by hand so it is present for zero groups too
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record(["group_id", "name", "size", "locator"])?;

        for (idx, (key, files)) in self.groups.sorted_groups().into_iter().enumerate() {
            for file in files {
                csv_writer.serialize(CsvRow {
                    group_id: idx + 1,
                    name: &key.name,
                    size: key.size,
                    locator: file.locator.to_string(),
                })?;
            }
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
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
