//! Duplicate detection module.
//!
//! This module provides:
//! - Name-and-size keys for candidate duplicates
//! - Streaming and one-shot grouping of file records
//! - The read-only grouping result handed to callers

pub mod groups;

pub use groups::{group_by_name_and_size, GroupKey, Grouper, GroupingResult, GroupingStats};
