//! Document-provider backend.
//!
//! Nodes are opaque document ids. Every listing is one query against a
//! [`DocumentResolver`] supplied by the caller; the resolver decides what a
//! child is through an explicit [`DocumentKind`] tag; names are never
//! inspected to guess whether something is a directory.
//!
//! Resolver failures are split in two:
//!
//! - [`ResolverError::AccessDenied`] and [`ResolverError::NotFound`] concern a
//!   single container and become [`SourceError::Unreadable`]
//! - [`ResolverError::Unavailable`] means the provider itself is gone (grant
//!   revoked, connection lost) and becomes [`SourceError::BackendQuery`],
//!   which ends the scan

use serde::{Deserialize, Serialize};

use super::{Locator, SourceError, TreeNode, TreeSource};

/// Type tag returned by a document provider for each child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// A document that can be listed
    Directory,
    /// A leaf document
    File,
}

/// One child as reported by a document provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    /// Provider-issued document id
    pub id: String,
    /// Display name
    pub name: String,
    /// Size in bytes (ignored for directories)
    pub size: u64,
    /// Explicit type tag
    pub kind: DocumentKind,
}

/// Errors a document provider can report.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// The caller holds no grant for this container.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The container does not exist (any more).
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The provider cannot serve queries at all.
    #[error("Document provider unavailable: {reason}")]
    Unavailable {
        /// Provider-supplied reason
        reason: String,
    },
}

/// External, permission-scoped document provider.
///
/// Must be callable repeatedly; callers keep no cache between calls.
pub trait DocumentResolver: Send + Sync {
    /// List the children of a container document.
    ///
    /// # Errors
    ///
    /// See [`ResolverError`] for how each variant is treated by a scan.
    fn resolve_children(&self, container: &str) -> Result<Vec<DocumentEntry>, ResolverError>;
}

impl<R: DocumentResolver + ?Sized> DocumentResolver for std::sync::Arc<R> {
    fn resolve_children(&self, container: &str) -> Result<Vec<DocumentEntry>, ResolverError> {
        (**self).resolve_children(container)
    }
}

/// Tree source backed by a [`DocumentResolver`].
#[derive(Debug, Clone)]
pub struct HandleSource<R> {
    resolver: R,
}

impl<R: DocumentResolver> HandleSource<R> {
    /// Wrap a resolver.
    #[must_use]
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Access the wrapped resolver.
    #[must_use]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    fn id_of<'a>(&self, locator: &'a Locator) -> Result<&'a str, SourceError> {
        locator
            .as_document()
            .ok_or_else(|| SourceError::UnsupportedLocator {
                backend: self.backend(),
                locator: locator.clone(),
            })
    }
}

/// Map a resolver failure onto the tree-source taxonomy.
fn map_resolver_error(locator: &Locator, error: ResolverError) -> SourceError {
    match error {
        ResolverError::AccessDenied(_) | ResolverError::NotFound(_) => {
            log::warn!("Cannot list {}: {}", locator, error);
            SourceError::Unreadable {
                locator: locator.clone(),
                reason: error.to_string(),
            }
        }
        ResolverError::Unavailable { reason } => {
            log::error!("Document provider failed while listing {}: {}", locator, reason);
            SourceError::BackendQuery {
                locator: locator.clone(),
                reason,
            }
        }
    }
}

impl From<DocumentEntry> for TreeNode {
    fn from(entry: DocumentEntry) -> Self {
        let locator = Locator::Document(entry.id);
        match entry.kind {
            DocumentKind::Directory => TreeNode::container(locator, entry.name),
            DocumentKind::File => TreeNode::leaf(locator, entry.name, entry.size),
        }
    }
}

impl<R: DocumentResolver> TreeSource for HandleSource<R> {
    fn backend(&self) -> &'static str {
        "handle"
    }

    fn root(&self, locator: &Locator) -> Result<TreeNode, SourceError> {
        let id = self.id_of(locator)?;
        // The provider only answers "children of X"; whether X itself can be
        // listed is discovered by the first query.
        Ok(TreeNode::container(locator.clone(), id))
    }

    fn list_children(&self, node: &TreeNode) -> Result<Vec<TreeNode>, SourceError> {
        let id = self.id_of(&node.locator)?;
        let entries = self
            .resolver
            .resolve_children(id)
            .map_err(|e| map_resolver_error(&node.locator, e))?;

        log::trace!("{} returned {} children", node.locator, entries.len());
        Ok(entries.into_iter().map(TreeNode::from).collect())
    }
}
