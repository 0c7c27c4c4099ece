//! In-memory document provider loaded from a JSON manifest.
//!
//! The manifest describes a document tree the way a document provider
//! exposes one: a flat table of documents keyed by opaque id, each tagged
//! with its kind, with directories listing their children by id.
//!
//! ```json
//! {
//!   "root": "doc:root",
//!   "documents": {
//!     "doc:root": { "name": "Download", "kind": "directory", "children": ["doc:1", "doc:2"] },
//!     "doc:1":    { "name": "a.txt", "kind": "file", "size": 10 },
//!     "doc:2":    { "name": "private", "kind": "directory", "denied": true }
//!   }
//! }
//! ```
//!
//! A directory marked `denied` answers every query with
//! [`ResolverError::AccessDenied`], which is how a revoked or partial grant
//! looks from the scanner's side.
//!
//! Loading validates the manifest: the root must be a directory, every child
//! id must exist, and no document may have two parents. The last rule keeps
//! the tree acyclic so a walk always terminates.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::handle::{DocumentEntry, DocumentKind, DocumentResolver, ResolverError};
use super::Locator;

/// One document of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    /// Display name
    pub name: String,
    /// Explicit type tag
    pub kind: DocumentKind,
    /// Size in bytes (files only)
    #[serde(default)]
    pub size: u64,
    /// Child ids, in listing order (directories only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    /// Whether listing this directory is refused
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub denied: bool,
}

/// Serialized manifest layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Id of the root directory
    pub root: String,
    /// All documents keyed by id
    pub documents: HashMap<String, ManifestDocument>,
}

/// Errors raised while loading or validating a manifest.
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("Cannot read manifest {path}: {source}")]
    Io {
        /// Manifest path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid JSON for the expected layout.
    #[error("Invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),

    /// The root id has no document.
    #[error("Manifest root {0} is not defined")]
    MissingRoot(String),

    /// The root document is a file.
    #[error("Manifest root {0} is not a directory")]
    RootNotADirectory(String),

    /// A directory lists a child id that has no document.
    #[error("Document {parent} lists unknown child {child}")]
    UnknownChild {
        /// Listing directory
        parent: String,
        /// Missing child id
        child: String,
    },

    /// A file document declares children.
    #[error("File document {0} cannot have children")]
    ChildrenOnFile(String),

    /// A document is reachable from two parents, or the root is listed as a child.
    #[error("Document {0} has more than one parent")]
    MultipleParents(String),
}

/// Document provider serving a validated [`Manifest`].
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    manifest: Manifest,
}

impl ManifestResolver {
    /// Validate a manifest and wrap it.
    ///
    /// # Errors
    ///
    /// Returns a [`ManifestError`] describing the first structural problem found.
    pub fn from_manifest(manifest: Manifest) -> Result<Self, ManifestError> {
        validate(&manifest)?;
        Ok(Self { manifest })
    }

    /// Parse and validate a manifest from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the manifest is invalid.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Self::from_manifest(serde_json::from_str(json)?)
    }

    /// Load and validate a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let resolver = Self::from_json(&content)?;
        log::debug!(
            "Loaded manifest {} ({} documents)",
            path.display(),
            resolver.document_count()
        );
        Ok(resolver)
    }

    /// Id of the root directory.
    #[must_use]
    pub fn root_id(&self) -> &str {
        &self.manifest.root
    }

    /// Root id as a scan locator.
    #[must_use]
    pub fn root_locator(&self) -> Locator {
        Locator::Document(self.manifest.root.clone())
    }

    /// Number of documents in the manifest.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.manifest.documents.len()
    }

    /// The underlying manifest.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

fn validate(manifest: &Manifest) -> Result<(), ManifestError> {
    let root = manifest
        .documents
        .get(&manifest.root)
        .ok_or_else(|| ManifestError::MissingRoot(manifest.root.clone()))?;
    if root.kind != DocumentKind::Directory {
        return Err(ManifestError::RootNotADirectory(manifest.root.clone()));
    }

    let mut parented: HashSet<&str> = HashSet::new();
    for (id, document) in &manifest.documents {
        if document.kind == DocumentKind::File && !document.children.is_empty() {
            return Err(ManifestError::ChildrenOnFile(id.clone()));
        }
        for child in &document.children {
            if !manifest.documents.contains_key(child) {
                return Err(ManifestError::UnknownChild {
                    parent: id.clone(),
                    child: child.clone(),
                });
            }
            if child == &manifest.root || !parented.insert(child) {
                return Err(ManifestError::MultipleParents(child.clone()));
            }
        }
    }

    Ok(())
}

impl DocumentResolver for ManifestResolver {
    fn resolve_children(&self, container: &str) -> Result<Vec<DocumentEntry>, ResolverError> {
        let document = self
            .manifest
            .documents
            .get(container)
            .filter(|d| d.kind == DocumentKind::Directory)
            .ok_or_else(|| ResolverError::NotFound(container.to_string()))?;

        if document.denied {
            return Err(ResolverError::AccessDenied(container.to_string()));
        }

        let entries = document
            .children
            .iter()
            .filter_map(|id| {
                self.manifest.documents.get(id).map(|child| DocumentEntry {
                    id: id.clone(),
                    name: child.name.clone(),
                    size: child.size,
                    kind: child.kind,
                })
            })
            .collect();
        Ok(entries)
    }
}

/// Programmatic construction of a [`ManifestResolver`].
///
/// # Example
///
/// ```
/// use dupetree::source::{DocumentResolver, ManifestBuilder};
///
/// let resolver = ManifestBuilder::new("root")
///     .file("root", "f1", "a.txt", 10)
///     .directory("root", "d1", "b")
///     .file("d1", "f2", "a.txt", 10)
///     .build()
///     .unwrap();
///
/// assert_eq!(resolver.resolve_children("root").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    root: String,
    documents: HashMap<String, ManifestDocument>,
    links: Vec<(String, String)>,
}

impl ManifestBuilder {
    /// Start a manifest whose root directory has the given id.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let mut documents = HashMap::new();
        documents.insert(
            root.clone(),
            ManifestDocument {
                name: root.clone(),
                kind: DocumentKind::Directory,
                size: 0,
                children: Vec::new(),
                denied: false,
            },
        );
        Self {
            root,
            documents,
            links: Vec::new(),
        }
    }

    fn add(mut self, parent: &str, id: &str, document: ManifestDocument) -> Self {
        self.documents.insert(id.to_string(), document);
        self.links.push((parent.to_string(), id.to_string()));
        self
    }

    /// Add a directory under `parent`.
    #[must_use]
    pub fn directory(self, parent: &str, id: &str, name: &str) -> Self {
        self.add(
            parent,
            id,
            ManifestDocument {
                name: name.to_string(),
                kind: DocumentKind::Directory,
                size: 0,
                children: Vec::new(),
                denied: false,
            },
        )
    }

    /// Add a file under `parent`.
    #[must_use]
    pub fn file(self, parent: &str, id: &str, name: &str, size: u64) -> Self {
        self.add(
            parent,
            id,
            ManifestDocument {
                name: name.to_string(),
                kind: DocumentKind::File,
                size,
                children: Vec::new(),
                denied: false,
            },
        )
    }

    /// Mark a directory as refusing to be listed.
    #[must_use]
    pub fn denied(mut self, id: &str) -> Self {
        if let Some(document) = self.documents.get_mut(id) {
            document.denied = true;
        }
        self
    }

    /// Attach children to their parents and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnknownChild`] naming the parent if a link
    /// points at a parent that was never added, or any validation error.
    pub fn build(mut self) -> Result<ManifestResolver, ManifestError> {
        for (parent, child) in std::mem::take(&mut self.links) {
            match self.documents.get_mut(&parent) {
                Some(document) => document.children.push(child),
                None => {
                    return Err(ManifestError::UnknownChild {
                        parent,
                        child,
                    })
                }
            }
        }
        ManifestResolver::from_manifest(Manifest {
            root: self.root,
            documents: self.documents,
        })
    }
}
