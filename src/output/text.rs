//! Human-readable listing of candidate duplicates.
//!
//! ```text
//! Duplicate files found:
//! Group: a.txt | 10
//!   → /photos/a.txt
//!   → /photos/b/a.txt
//!
//! 3 files (25 B) in 2 containers, 1 duplicate group, 10 B reclaimable
//! ```
//!
//! Groups are listed by name, then size, each followed by a blank line.
//! Members keep discovery order.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::{Condition, Paint};

use crate::orchestrator::{ScanReport, ScanSummary};

/// Text formatter for a completed scan.
pub struct TextOutput<'a> {
    report: &'a ScanReport,
    color: bool,
}

impl<'a> TextOutput<'a> {
    /// Create a formatter with colors disabled.
    #[must_use]
    pub fn new(report: &'a ScanReport) -> Self {
        Self {
            report,
            color: false,
        }
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn condition(&self) -> Condition {
        if self.color {
            Condition::ALWAYS
        } else {
            Condition::NEVER
        }
    }

    /// Write the listing and summary.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let on = self.condition();
        let groups = &self.report.groups;

        if groups.is_empty() {
            writeln!(writer, "{}", "No duplicate files found.".green().whenever(on))?;
            writeln!(writer)?;
        } else {
            writeln!(writer, "{}", "Duplicate files found:".bold().whenever(on))?;
            for (key, files) in groups.sorted_groups() {
                writeln!(
                    writer,
                    "{} {}",
                    "Group:".bold().whenever(on),
                    key.display_key().cyan().whenever(on)
                )?;
                for file in files {
                    writeln!(writer, "  → {}", file.locator)?;
                }
                writeln!(writer)?;
            }
        }

        self.write_summary(writer, &self.report.summary)
    }

    fn write_summary<W: Write>(&self, writer: &mut W, summary: &ScanSummary) -> io::Result<()> {
        let on = self.condition();

        writeln!(
            writer,
            "{} files ({}) in {} containers, {} duplicate group{}, {} reclaimable ({:.2?})",
            summary.total_files,
            ByteSize::b(summary.total_size),
            summary.containers_visited,
            summary.duplicate_groups,
            if summary.duplicate_groups == 1 { "" } else { "s" },
            ByteSize::b(summary.reclaimable_bytes),
            summary.scan_duration
        )?;

        if summary.has_unreadable() {
            writeln!(
                writer,
                "{}",
                format!(
                    "Skipped {} unreadable container(s):",
                    summary.unreadable.len()
                )
                .yellow()
                .whenever(on)
            )?;
            for err in &summary.unreadable {
                writeln!(writer, "  {}", err)?;
            }
        }

        Ok(())
    }

    /// Render into a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the output is not valid UTF-8 (never for this writer).
    pub fn to_string(&self) -> io::Result<String> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
