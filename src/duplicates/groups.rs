//! Grouping of file records by name and size.
//!
//! # Overview
//!
//! Two files are candidate duplicates when they share both their name and
//! their size. Grouping is a single pass over the records: every record is
//! appended to the list of its [`GroupKey`], then keys seen only once are
//! dropped.
//!
//! # Example
//!
//! ```
//! use dupetree::duplicates::{group_by_name_and_size, GroupKey};
//! use dupetree::scanner::FileRecord;
//! use dupetree::source::Locator;
//!
//! let files = vec![
//!     FileRecord::new("a.txt", 10, Locator::Document("1".into())),
//!     FileRecord::new("a.txt", 10, Locator::Document("2".into())),
//!     FileRecord::new("c.txt", 5, Locator::Document("3".into())),
//! ];
//!
//! let (groups, stats) = group_by_name_and_size(files);
//!
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups.get(&GroupKey::new("a.txt", 10)).unwrap().len(), 2);
//! assert_eq!(stats.eliminated_unique, 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::scanner::FileRecord;

/// Equality key of a candidate duplicate: file name plus size in bytes.
///
/// All fields take part in equality and hashing, so names containing `|`
/// cannot collide with other keys. A file name that is not valid UTF-8 is
/// compared by its raw bytes, never by its escaped display form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey {
    /// File name
    pub name: String,
    /// File size in bytes
    pub size: u64,
    #[serde(skip)]
    raw_name: Option<Box<[u8]>>,
}

impl GroupKey {
    /// Create a key from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            raw_name: None,
        }
    }

    /// Compute the key of a record.
    #[must_use]
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            name: record.name.clone(),
            size: record.size,
            raw_name: record.locator.non_utf8_file_name().map(Box::from),
        }
    }

    /// Presentation form used in reports, e.g. `a.txt | 10`.
    #[must_use]
    pub fn display_key(&self) -> String {
        format!("{} | {}", self.name, self.size)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.name, self.size)
    }
}

/// Statistics from the grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    /// Total number of records processed
    pub total_files: usize,
    /// Total size of all records in bytes
    pub total_size: u64,
    /// Number of distinct keys
    pub unique_keys: usize,
    /// Number of records in groups of 2+
    pub potential_duplicates: usize,
    /// Number of records dropped as singletons
    pub eliminated_unique: usize,
    /// Number of groups with 2+ records
    pub duplicate_groups: usize,
}

impl GroupingStats {
    /// Percentage of records eliminated as unique.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Candidate duplicate groups of a finished scan.
///
/// Only keys with more than one record are present. Within a group, records
/// keep the order in which they were discovered. There are no mutating
/// accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingResult {
    groups: HashMap<GroupKey, Vec<FileRecord>>,
}

impl GroupingResult {
    /// Records for a key, if it formed a group.
    #[must_use]
    pub fn get(&self, key: &GroupKey) -> Option<&[FileRecord]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Check whether a key formed a group.
    #[must_use]
    pub fn contains_key(&self, key: &GroupKey) -> bool {
        self.groups.contains_key(key)
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if no duplicates were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate groups in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &[FileRecord])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Groups sorted by key (name, then size).
    #[must_use]
    pub fn sorted_groups(&self) -> Vec<(&GroupKey, &[FileRecord])> {
        let mut groups: Vec<_> = self.iter().collect();
        groups.sort_by(|a, b| a.0.cmp(b.0));
        groups
    }

    /// Presentation view: `"name | size"` mapped to the locators of each member.
    #[must_use]
    pub fn display_map(&self) -> BTreeMap<String, Vec<String>> {
        self.groups
            .iter()
            .map(|(key, files)| {
                (
                    key.display_key(),
                    files.iter().map(|f| f.locator.to_string()).collect(),
                )
            })
            .collect()
    }

    /// Number of records beyond the first in each group.
    #[must_use]
    pub fn duplicate_files(&self) -> usize {
        self.groups.values().map(|files| files.len() - 1).sum()
    }

    /// Bytes that keeping one copy per group would free.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.groups
            .iter()
            .map(|(key, files)| key.size.saturating_mul(files.len() as u64 - 1))
            .fold(0, u64::saturating_add)
    }

    /// Consume the result into the underlying map.
    #[must_use]
    pub fn into_inner(self) -> HashMap<GroupKey, Vec<FileRecord>> {
        self.groups
    }
}

/// Streaming accumulator for records, one at a time.
#[derive(Debug, Default)]
pub struct Grouper {
    groups: HashMap<GroupKey, Vec<FileRecord>>,
    total_files: usize,
    total_size: u64,
}

impl Grouper {
    /// Create an empty grouper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record to the group of its key.
    pub fn push(&mut self, record: FileRecord) {
        self.total_files += 1;
        self.total_size = self.total_size.saturating_add(record.size);
        self.groups
            .entry(GroupKey::from_record(&record))
            .or_default()
            .push(record);
    }

    /// Number of records pushed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.total_files
    }

    /// Check if nothing has been pushed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_files == 0
    }

    /// Drop singleton keys and return the groups.
    #[must_use]
    pub fn finish(self) -> (GroupingResult, GroupingStats) {
        let mut stats = GroupingStats {
            total_files: self.total_files,
            total_size: self.total_size,
            unique_keys: self.groups.len(),
            ..GroupingStats::default()
        };

        let groups: HashMap<GroupKey, Vec<FileRecord>> = self
            .groups
            .into_iter()
            .filter(|(key, files)| {
                if files.len() == 1 {
                    stats.eliminated_unique += 1;
                    log::trace!("Eliminated unique key {}", key);
                    false
                } else {
                    stats.potential_duplicates += files.len();
                    stats.duplicate_groups += 1;
                    log::debug!("Group {}: {} files", key, files.len());
                    true
                }
            })
            .collect();

        log::info!(
            "Grouping complete: {} files → {} in {} groups ({:.1}% eliminated)",
            stats.total_files,
            stats.potential_duplicates,
            stats.duplicate_groups,
            stats.elimination_rate()
        );

        (GroupingResult { groups }, stats)
    }
}

impl Extend<FileRecord> for Grouper {
    fn extend<I: IntoIterator<Item = FileRecord>>(&mut self, iter: I) {
        for record in iter {
            self.push(record);
        }
    }
}

/// Group records by name and size in one call.
///
/// For a fixed input order the result is the same on every call.
#[must_use]
pub fn group_by_name_and_size(
    records: impl IntoIterator<Item = FileRecord>,
) -> (GroupingResult, GroupingStats) {
    let mut grouper = Grouper::new();
    grouper.extend(records);
    grouper.finish()
}
