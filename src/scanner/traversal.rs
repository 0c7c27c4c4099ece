//! Depth-first traversal over a [`TreeSource`].
//!
//! # Overview
//!
//! [`Traversal`] walks a tree in pre-order: when a listing contains a
//! container, that container is fully walked before its later siblings.
//! Leaves come out as [`FileRecord`]s, lazily, through the `Iterator` impl.
//!
//! The walk keeps its pending work on the heap as a stack of child
//! iterators, one per open container, so tree depth is bounded by memory and
//! not by the thread stack. Every time a container is about to be listed the
//! cancel flags are checked; a listing already in progress is never
//! interrupted.
//!
//! # Error handling
//!
//! - A recoverable error on a container below the root (see
//!   [`SourceError::is_recoverable`]) is logged, recorded in
//!   [`TraversalStats::unreadable`], and the walk moves on to the next sibling.
//! - The same error on the root yields [`TraversalError::RootUnreadable`]:
//!   a scan that could read nothing must not look like a clean, empty scan.
//! - Any other source error, and cancellation, yield one `Err` item after
//!   which the iterator is exhausted.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use super::{FileRecord, TraversalConfig, TraversalError};
use crate::progress::ProgressCallback;
use crate::source::{Locator, SourceError, TreeNode, TreeSource};

/// Counters gathered while walking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Containers successfully listed, including the root
    pub containers_visited: usize,
    /// File records emitted
    pub files: usize,
    /// Total size of emitted records in bytes
    pub bytes: u64,
    /// Containers that could not be read and were skipped
    pub unreadable: Vec<SourceError>,
}

/// One open container: where it sits relative to the root and which of its
/// children are still to be visited.
struct Frame {
    relative: PathBuf,
    children: std::vec::IntoIter<TreeNode>,
}

/// Lazy depth-first walk yielding one [`FileRecord`] per reachable file.
///
/// Each `Traversal` owns all of its state, so walking the same root twice
/// means creating two independent traversals.
pub struct Traversal<'a> {
    source: &'a dyn TreeSource,
    config: TraversalConfig,
    ignore: Option<Gitignore>,
    /// Root waiting to be listed on the first call to `next`
    root: Option<TreeNode>,
    stack: Vec<Frame>,
    cancel_flags: Vec<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
    stats: TraversalStats,
    finished: bool,
}

impl<'a> Traversal<'a> {
    /// Create a traversal starting at an already resolved root node.
    #[must_use]
    pub fn new(source: &'a dyn TreeSource, root: TreeNode, config: TraversalConfig) -> Self {
        let ignore = build_ignore(&config.ignore_patterns);
        Self {
            source,
            config,
            ignore,
            root: Some(root),
            stack: Vec::new(),
            cancel_flags: Vec::new(),
            progress_callback: None,
            stats: TraversalStats::default(),
            finished: false,
        }
    }

    /// Resolve `locator` through the source and create a traversal from it.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Source`] if the source rejects the root.
    pub fn from_locator(
        source: &'a dyn TreeSource,
        locator: &Locator,
        config: TraversalConfig,
    ) -> Result<Self, TraversalError> {
        let root = source.root(locator)?;
        Ok(Self::new(source, root, config))
    }

    /// Add a flag that stops the walk when set to `true`.
    ///
    /// May be called more than once; any set flag cancels.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flags.push(flag);
        self
    }

    /// Report each emitted record to a progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Counters gathered so far.
    #[must_use]
    pub fn stats(&self) -> &TraversalStats {
        &self.stats
    }

    /// Consume the traversal and keep its counters.
    #[must_use]
    pub fn into_stats(self) -> TraversalStats {
        self.stats
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flags.iter().any(|f| f.load(Ordering::SeqCst))
    }

    /// End the walk with a terminal error.
    fn fail(&mut self, error: TraversalError) -> Option<Result<FileRecord, TraversalError>> {
        self.finished = true;
        self.stack.clear();
        Some(Err(error))
    }

    fn open_root(&mut self, root: TreeNode) -> Result<(), TraversalError> {
        if self.is_cancelled() {
            return Err(TraversalError::Cancelled);
        }

        log::debug!("Walking {} via {} backend", root.locator, self.source.backend());
        match self.source.list_children(&root) {
            Ok(children) => {
                self.stats.containers_visited += 1;
                self.stack.push(Frame {
                    relative: PathBuf::new(),
                    children: children.into_iter(),
                });
                Ok(())
            }
            Err(e) if e.is_recoverable() => Err(TraversalError::RootUnreadable(e)),
            Err(e) => Err(TraversalError::Source(e)),
        }
    }

    /// List a container and push it, absorbing recoverable failures.
    fn open_container(&mut self, node: &TreeNode, relative: PathBuf) -> Result<(), TraversalError> {
        match self.source.list_children(node) {
            Ok(children) => {
                self.stats.containers_visited += 1;
                self.stack.push(Frame {
                    relative,
                    children: children.into_iter(),
                });
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                log::debug!("Skipping unreadable container: {}", e);
                self.stats.unreadable.push(e);
                Ok(())
            }
            Err(e) => Err(TraversalError::Source(e)),
        }
    }

    /// Check whether a node is excluded by the hidden/ignore filters.
    fn is_excluded(&self, node: &TreeNode, relative: &Path, is_container: bool) -> bool {
        if self.config.skip_hidden && node.name.starts_with('.') {
            log::trace!("Skipping hidden entry: {}", node.locator);
            return true;
        }

        if let Some(gi) = &self.ignore {
            // Gitignore matching expects forward slashes even on Windows
            let path_str = relative.to_string_lossy();
            let normalized = if cfg!(windows) {
                path_str.replace('\\', "/")
            } else {
                path_str.into_owned()
            };
            if gi.matched(normalized, is_container).is_ignore() {
                log::trace!("Ignoring: {}", node.locator);
                return true;
            }
        }

        false
    }

    fn emit(&mut self, node: TreeNode) -> FileRecord {
        let record = FileRecord::from(node);
        self.stats.files += 1;
        self.stats.bytes = self.stats.bytes.saturating_add(record.size);

        if let Some(ref callback) = self.progress_callback {
            callback.on_progress(self.stats.files, &record.locator.to_string());
            callback.on_item_completed(record.size);
        }

        record
    }
}

impl Iterator for Traversal<'_> {
    type Item = Result<FileRecord, TraversalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if let Some(root) = self.root.take() {
            if let Err(e) = self.open_root(root) {
                return self.fail(e);
            }
        }

        loop {
            let next = match self.stack.last_mut() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(frame) => frame
                    .children
                    .next()
                    .map(|node| (frame.relative.join(&node.name), node)),
            };

            let Some((relative, node)) = next else {
                self.stack.pop();
                continue;
            };

            let is_container = self.source.is_container(&node);
            if self.is_excluded(&node, &relative, is_container) {
                continue;
            }

            if is_container {
                if self.is_cancelled() {
                    log::debug!("Traversal: cancellation requested, stopping");
                    return self.fail(TraversalError::Cancelled);
                }
                if let Err(e) = self.open_container(&node, relative) {
                    return self.fail(e);
                }
                continue;
            }

            if !self.config.passes_size_filter(node.size) {
                log::trace!(
                    "Skipping file due to size filter ({}): {}",
                    node.size,
                    node.locator
                );
                continue;
            }

            return Some(Ok(self.emit(node)));
        }
    }
}

impl std::iter::FusedIterator for Traversal<'_> {}

/// Build the ignore matcher for the configured patterns.
fn build_ignore(patterns: &[String]) -> Option<Gitignore> {
    if patterns.is_empty() {
        return None;
    }

    let mut builder = GitignoreBuilder::new("");
    for pattern in patterns {
        if let Err(e) = builder.add_line(None, pattern) {
            log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
        }
    }

    match builder.build() {
        Ok(gitignore) if gitignore.is_empty() => None,
        Ok(gitignore) => Some(gitignore),
        Err(e) => {
            log::warn!("Failed to build ignore patterns: {}", e);
            None
        }
    }
}
