//! Tree sources: the backends a scan can walk.
//!
//! A [`TreeSource`] answers one question, "what are the children of this
//! container?", for some hierarchical store. Two backends are provided:
//!
//! - [`DirectSource`]: nodes are filesystem paths, listed with `read_dir`
//! - [`HandleSource`]: nodes are opaque document ids, listed through an
//!   external [`DocumentResolver`] (a permission-scoped document provider)
//!
//! The traversal engine only ever talks to the trait, so the backend is chosen
//! once when a scan starts.
//!
//! # Example
//!
//! ```no_run
//! use dupetree::source::{DirectSource, Locator, TreeSource};
//! use std::path::PathBuf;
//!
//! let source = DirectSource::default();
//! let root = source.root(&Locator::Path(PathBuf::from("."))).unwrap();
//! for child in source.list_children(&root).unwrap() {
//!     println!("{} (container: {})", child.name, child.is_container);
//! }
//! ```

pub mod direct;
pub mod handle;
pub mod manifest;

use std::ffi::OsStr;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

pub use direct::DirectSource;
pub use handle::{DocumentEntry, DocumentKind, DocumentResolver, HandleSource, ResolverError};
pub use manifest::{ManifestBuilder, ManifestError, ManifestResolver};

/// Opaque identity of a node, tagged with the backend family it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Locator {
    /// A filesystem path (direct backend).
    Path(PathBuf),
    /// A document id issued by a document provider (handle backend).
    Document(String),
}

impl Locator {
    /// Path form of this locator, if it is one.
    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Document(_) => None,
        }
    }

    /// Document id form of this locator, if it is one.
    #[must_use]
    pub fn as_document(&self) -> Option<&str> {
        match self {
            Self::Path(_) => None,
            Self::Document(id) => Some(id),
        }
    }

    /// Raw bytes of the last path component, only when it is not valid UTF-8.
    ///
    /// Such names are displayed escaped, so the bytes are their exact identity.
    #[must_use]
    pub fn non_utf8_file_name(&self) -> Option<&[u8]> {
        match self {
            Self::Path(path) => path
                .file_name()
                .filter(|name| name.to_str().is_none())
                .map(OsStr::as_encoded_bytes),
            Self::Document(_) => None,
        }
    }
}

/// Render a file name, escaping bytes that are not valid UTF-8 as `\xNN`.
#[must_use]
pub fn display_name(name: &OsStr) -> String {
    if let Some(name) = name.to_str() {
        return name.to_string();
    }

    let mut out = String::new();
    for chunk in name.as_encoded_bytes().utf8_chunks() {
        out.push_str(chunk.valid());
        for byte in chunk.invalid() {
            let _ = write!(out, "\\x{:02X}", byte);
        }
    }
    out
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Document(id) => f.write_str(id),
        }
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One entry of a container listing.
///
/// Only lives for the duration of a traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Identity of the entry
    pub locator: Locator,
    /// Display name (last path component or document name)
    pub name: String,
    /// Size in bytes; 0 for containers
    pub size: u64,
    /// Whether the entry can be listed
    pub is_container: bool,
}

impl TreeNode {
    /// Create a container node.
    #[must_use]
    pub fn container(locator: Locator, name: impl Into<String>) -> Self {
        Self {
            locator,
            name: name.into(),
            size: 0,
            is_container: true,
        }
    }

    /// Create a leaf (file) node.
    #[must_use]
    pub fn leaf(locator: Locator, name: impl Into<String>, size: u64) -> Self {
        Self {
            locator,
            name: name.into(),
            size,
            is_container: false,
        }
    }
}

/// Backend capable of listing a hierarchical store.
///
/// Implementations may block on I/O; they are only ever called from the scan
/// worker, never from the thread that requested the scan.
pub trait TreeSource: Send + Sync {
    /// Short backend name used in log messages.
    fn backend(&self) -> &'static str;

    /// Resolve the root locator into a container node.
    ///
    /// # Errors
    ///
    /// Returns an error if the locator belongs to another backend, does not
    /// exist, or is not a container.
    fn root(&self, locator: &Locator) -> Result<TreeNode, SourceError>;

    /// List the immediate children of a container.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unreadable`] when this one container cannot be
    /// read, and [`SourceError::BackendQuery`] when the backend itself is no
    /// longer usable.
    fn list_children(&self, node: &TreeNode) -> Result<Vec<TreeNode>, SourceError>;

    /// Whether a node should be descended into.
    fn is_container(&self, node: &TreeNode) -> bool {
        node.is_container
    }
}

/// Errors reported by tree sources.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// A single container could not be read. The scan may continue.
    #[error("Unreadable container {locator}: {reason}")]
    Unreadable {
        /// Container that could not be listed
        locator: Locator,
        /// Backend-provided reason
        reason: String,
    },

    /// The backend failed outright and cannot answer further queries.
    #[error("Backend query failed for {locator}: {reason}")]
    BackendQuery {
        /// Container whose query failed
        locator: Locator,
        /// Backend-provided reason
        reason: String,
    },

    /// The root locator does not exist.
    #[error("Root not found: {0}")]
    NotFound(Locator),

    /// The root locator is not a container.
    #[error("Not a container: {0}")]
    NotAContainer(Locator),

    /// A locator of the wrong family was handed to a backend.
    #[error("The {backend} backend cannot resolve {locator}")]
    UnsupportedLocator {
        /// Backend that rejected the locator
        backend: &'static str,
        /// Offending locator
        locator: Locator,
    },
}

impl SourceError {
    /// Whether the traversal may absorb this error and keep walking.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unreadable { .. })
    }

    /// Locator the error refers to.
    #[must_use]
    pub fn locator(&self) -> &Locator {
        match self {
            Self::Unreadable { locator, .. }
            | Self::BackendQuery { locator, .. }
            | Self::UnsupportedLocator { locator, .. } => locator,
            Self::NotFound(locator) | Self::NotAContainer(locator) => locator,
        }
    }
}
