//! Scanner module: turns a tree source into a flat stream of file records.
//!
//! This module provides:
//! - [`FileRecord`], the per-file metadata handed to the grouper
//! - [`TraversalConfig`], optional walk filters (all off by default)
//! - [`Traversal`], a depth-first walk over any [`TreeSource`]
//!
//! # Example
//!
//! ```no_run
//! use dupetree::scanner::{Traversal, TraversalConfig};
//! use dupetree::source::{DirectSource, Locator};
//! use std::path::PathBuf;
//!
//! let source = DirectSource::new();
//! let root = Locator::Path(PathBuf::from("."));
//! let traversal = Traversal::from_locator(&source, &root, TraversalConfig::default()).unwrap();
//!
//! for record in traversal {
//!     match record {
//!         Ok(file) => println!("{}: {} bytes", file.locator, file.size),
//!         Err(e) => eprintln!("Scan stopped: {}", e),
//!     }
//! }
//! ```
//!
//! [`TreeSource`]: crate::source::TreeSource

pub mod traversal;

use serde::Serialize;

use crate::source::{Locator, SourceError, TreeNode};

pub use traversal::{Traversal, TraversalStats};

/// Metadata for a discovered file.
///
/// Created by the traversal from a leaf node and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileRecord {
    /// File name (last path component or document name)
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Where the file lives
    pub locator: Locator,
}

impl FileRecord {
    /// Create a new FileRecord.
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64, locator: Locator) -> Self {
        Self {
            name: name.into(),
            size,
            locator,
        }
    }
}

impl From<TreeNode> for FileRecord {
    fn from(node: TreeNode) -> Self {
        Self {
            name: node.name,
            size: node.size,
            locator: node.locator,
        }
    }
}

/// Configuration for a traversal.
///
/// Every filter is disabled by default, in which case each reachable file is
/// reported exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalConfig {
    /// Skip files and containers whose name starts with `.`.
    pub skip_hidden: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,

    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,

    /// Gitignore-style patterns matched against the path relative to the root.
    /// A matching container is not descended into.
    pub ignore_patterns: Vec<String>,
}

impl TraversalConfig {
    /// Skip hidden entries.
    #[must_use]
    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    /// Set the minimum file size.
    #[must_use]
    pub fn with_min_size(mut self, size: Option<u64>) -> Self {
        self.min_size = size;
        self
    }

    /// Set the maximum file size.
    #[must_use]
    pub fn with_max_size(mut self, size: Option<u64>) -> Self {
        self.max_size = size;
        self
    }

    /// Set the ignore patterns.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Check if a file passes size filters.
    #[must_use]
    pub fn passes_size_filter(&self, size: u64) -> bool {
        if self.min_size.is_some_and(|min| size < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| size > max) {
            return false;
        }
        true
    }
}

/// Errors that end a traversal.
///
/// Unreadable containers below the root are not errors here; they are
/// absorbed and counted in [`TraversalStats::unreadable`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TraversalError {
    /// Cancellation was requested.
    #[error("Traversal cancelled")]
    Cancelled,

    /// The root itself could not be listed, so nothing could be scanned.
    #[error("Root container is unreadable: {0}")]
    RootUnreadable(SourceError),

    /// The backend failed or the root was invalid.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl TraversalError {
    /// Whether running the same scan again could plausibly succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled | Self::RootUnreadable(_) => true,
            Self::Source(e) => matches!(e, SourceError::BackendQuery { .. }),
        }
    }
}
