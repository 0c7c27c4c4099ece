//! Direct filesystem backend.
//!
//! Nodes are plain paths. Listing a container is a single `read_dir` call;
//! entries come back sorted by name so a walk of an unchanged tree is
//! reproducible. A container that cannot be read (permission denied,
//! removed mid-scan, replaced by a file) is reported as
//! [`SourceError::Unreadable`] so the walk can carry on with its siblings.

use std::fs::{self, DirEntry};
use std::io;
use std::path::Path;

use super::{display_name, Locator, SourceError, TreeNode, TreeSource};

/// Tree source over the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct DirectSource {
    /// Follow symbolic links instead of skipping them.
    /// Warning: symlink cycles are not detected.
    follow_symlinks: bool,
}

impl DirectSource {
    /// Create a direct source that skips symbolic links.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow symbolic links during listing.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    fn path_of<'a>(&self, locator: &'a Locator) -> Result<&'a Path, SourceError> {
        locator
            .as_path()
            .ok_or_else(|| SourceError::UnsupportedLocator {
                backend: self.backend(),
                locator: locator.clone(),
            })
    }

    /// Build a node for one directory entry, or `None` if it should be skipped.
    fn entry_node(&self, dir_entry: &DirEntry) -> Option<TreeNode> {
        let path = dir_entry.path();

        let file_type = match dir_entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Cannot determine type of {}: {}", path.display(), e);
                return None;
            }
        };

        let is_symlink = file_type.is_symlink();
        if is_symlink && !self.follow_symlinks {
            log::trace!("Skipping symlink: {}", path.display());
            return None;
        }

        // DirEntry::metadata does not traverse links, fs::metadata does
        let metadata = if is_symlink {
            fs::metadata(&path)
        } else {
            dir_entry.metadata()
        };
        let metadata = match metadata {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Cannot read metadata of {}: {}", path.display(), e);
                return None;
            }
        };

        let file_name = dir_entry.file_name();
        let name = display_name(&file_name);
        if file_name.to_str().is_none() {
            log::warn!("File name is not valid UTF-8, shown as {}: {}", name, path.display());
        }
        let locator = Locator::Path(path);

        if metadata.is_dir() {
            Some(TreeNode::container(locator, name))
        } else if metadata.is_file() {
            Some(TreeNode::leaf(locator, name, metadata.len()))
        } else {
            log::trace!("Skipping special file: {}", locator);
            None
        }
    }
}

/// Map a listing failure to an unreadable-container error.
fn unreadable(locator: &Locator, error: &io::Error) -> SourceError {
    match error.kind() {
        io::ErrorKind::PermissionDenied => {
            log::warn!("Permission denied: {}", locator);
        }
        io::ErrorKind::NotFound => {
            log::debug!("Directory vanished during scan: {}", locator);
        }
        _ => {
            log::warn!("Cannot list {}: {}", locator, error);
        }
    }
    SourceError::Unreadable {
        locator: locator.clone(),
        reason: error.to_string(),
    }
}

/// Name shown for a root path (falls back to the whole path for `/` or `.`).
fn root_name(path: &Path) -> String {
    path.file_name()
        .map(display_name)
        .unwrap_or_else(|| path.display().to_string())
}

impl TreeSource for DirectSource {
    fn backend(&self) -> &'static str {
        "direct"
    }

    fn root(&self, locator: &Locator) -> Result<TreeNode, SourceError> {
        let path = self.path_of(locator)?;

        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(locator.clone()),
            _ => unreadable(locator, &e),
        })?;

        if !metadata.is_dir() {
            return Err(SourceError::NotAContainer(locator.clone()));
        }

        Ok(TreeNode::container(locator.clone(), root_name(path)))
    }

    fn list_children(&self, node: &TreeNode) -> Result<Vec<TreeNode>, SourceError> {
        let path = self.path_of(&node.locator)?;
        let read_dir = fs::read_dir(path).map_err(|e| unreadable(&node.locator, &e))?;

        let mut children = Vec::new();
        for dir_entry in read_dir {
            match dir_entry {
                Ok(dir_entry) => children.extend(self.entry_node(&dir_entry)),
                Err(e) => log::warn!("Error reading entry in {}: {}", path.display(), e),
            }
        }

        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }
}
