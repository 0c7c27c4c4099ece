//! Scan orchestration: one background worker per scan.
//!
//! [`ScanOrchestrator::start_scan`] hands the walk to a named worker thread
//! and returns a [`ScanHandle`] right away. The worker drives a
//! [`Traversal`], folds every record into a [`Grouper`] and sends exactly one
//! [`ScanOutcome`] back over a channel.
//!
//! Only one scan runs per orchestrator at a time; starting another while the
//! first is still walking is rejected with [`ScanError::AlreadyInProgress`].
//! The status cell is the only shared state. The grouping map is owned by the
//! worker until it is moved into the outcome.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use dupetree::orchestrator::{ScanConfig, ScanOrchestrator, ScanOutcome};
//! use dupetree::source::{DirectSource, Locator};
//!
//! let orchestrator = ScanOrchestrator::new(ScanConfig::default());
//! let handle = orchestrator
//!     .start_scan(Locator::Path(PathBuf::from(".")), Arc::new(DirectSource::new()))
//!     .expect("no scan running");
//!
//! match handle.wait() {
//!     ScanOutcome::Completed(report) => println!("{} groups", report.groups.len()),
//!     ScanOutcome::Cancelled => println!("cancelled"),
//!     ScanOutcome::Failed(e) => eprintln!("scan failed: {}", e),
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::duplicates::{Grouper, GroupingResult};
use crate::progress::ProgressCallback;
use crate::scanner::{Traversal, TraversalConfig, TraversalError};
use crate::source::{Locator, SourceError, TreeSource};

/// Lifecycle of the most recent scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// No scan has been started
    Idle,
    /// A worker is walking the tree
    Scanning,
    /// The last scan produced a result
    Completed,
    /// The last scan was cancelled
    Cancelled,
    /// The last scan failed
    Failed,
}

impl ScanStatus {
    /// Check whether a scan has ended (completed, cancelled or failed).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Check whether a new scan may start.
    #[must_use]
    pub fn accepts_new_scan(self) -> bool {
        self != Self::Scanning
    }
}

/// Configuration shared by every scan of an orchestrator.
#[derive(Clone, Default)]
pub struct ScanConfig {
    /// Walk filters
    pub traversal: TraversalConfig,
    /// Process-wide shutdown flag (e.g. Ctrl+C), observed like a cancel
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Progress reporting for the walk
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl ScanConfig {
    /// Set the walk filters.
    #[must_use]
    pub fn with_traversal(mut self, traversal: TraversalConfig) -> Self {
        self.traversal = traversal;
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("traversal", &self.traversal)
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

/// Totals for a completed scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Files discovered
    pub total_files: usize,
    /// Combined size of discovered files
    pub total_size: u64,
    /// Containers listed, including the root
    pub containers_visited: usize,
    /// Containers skipped because they could not be read
    pub unreadable: Vec<SourceError>,
    /// Groups of candidate duplicates
    pub duplicate_groups: usize,
    /// Group members beyond the first
    pub duplicate_files: usize,
    /// Bytes freed by keeping one copy per group
    pub reclaimable_bytes: u64,
    /// Wall time of the walk and grouping
    pub scan_duration: Duration,
}

impl ScanSummary {
    /// Check whether any container was skipped.
    #[must_use]
    pub fn has_unreadable(&self) -> bool {
        !self.unreadable.is_empty()
    }
}

/// Result of a completed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Candidate duplicate groups
    pub groups: GroupingResult,
    /// Scan totals
    pub summary: ScanSummary,
}

/// Why a scan failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanFailure {
    /// The walk stopped on an error.
    #[error(transparent)]
    Traversal(#[from] TraversalError),

    /// The worker panicked.
    #[error("Scan worker panicked: {0}")]
    Panicked(String),

    /// The outcome was already taken from this handle.
    #[error("Scan outcome was already taken")]
    OutcomeTaken,
}

impl ScanFailure {
    /// Whether running the same scan again could plausibly succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Traversal(e) => e.is_retryable(),
            Self::Panicked(_) | Self::OutcomeTaken => false,
        }
    }
}

/// Terminal state of a scan, delivered once per scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The tree was fully walked
    Completed(ScanReport),
    /// Cancellation was requested; no result is produced
    Cancelled,
    /// The scan stopped on an error; no partial result is produced
    Failed(ScanFailure),
}

impl ScanOutcome {
    /// Status matching this outcome.
    #[must_use]
    pub fn status(&self) -> ScanStatus {
        match self {
            Self::Completed(_) => ScanStatus::Completed,
            Self::Cancelled => ScanStatus::Cancelled,
            Self::Failed(_) => ScanStatus::Failed,
        }
    }
}

/// Errors from starting a scan.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Another scan of this orchestrator has not finished yet.
    #[error("A scan is already in progress")]
    AlreadyInProgress,

    /// The worker thread could not be spawned.
    #[error("Failed to spawn scan worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Runs scans on a background worker and tracks their status.
pub struct ScanOrchestrator {
    config: ScanConfig,
    status: Arc<Mutex<ScanStatus>>,
}

impl ScanOrchestrator {
    /// Create an idle orchestrator.
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            status: Arc::new(Mutex::new(ScanStatus::Idle)),
        }
    }

    /// Configuration used for every scan.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ScanStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start scanning `root` through `source` on a background worker.
    ///
    /// # Errors
    ///
    /// - [`ScanError::AlreadyInProgress`] if the previous scan is still running
    /// - [`ScanError::Spawn`] if the worker thread cannot be created
    pub fn start_scan(
        &self,
        root: Locator,
        source: Arc<dyn TreeSource>,
    ) -> Result<ScanHandle, ScanError> {
        let previous = {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            if !status.accepts_new_scan() {
                log::warn!("Rejected scan of {}: another scan is in progress", root);
                return Err(ScanError::AlreadyInProgress);
            }
            std::mem::replace(&mut *status, ScanStatus::Scanning)
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let worker_cancel = Arc::clone(&cancel);
        let worker_status = Arc::clone(&self.status);
        let config = self.config.clone();

        let spawned = thread::Builder::new()
            .name("dupetree-scan".to_string())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_scan(&root, source.as_ref(), &config, &worker_cancel)
                }))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    log::error!("Scan worker panicked: {}", message);
                    ScanOutcome::Failed(ScanFailure::Panicked(message))
                });

                // Status goes terminal before the outcome is visible, so a
                // caller holding the outcome can start the next scan at once.
                *worker_status
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = outcome.status();
                let _ = tx.send(outcome);
            });

        match spawned {
            Ok(worker) => Ok(ScanHandle {
                cancel,
                receiver: rx,
                worker: Some(worker),
                delivered: false,
            }),
            Err(e) => {
                *self.status.lock().unwrap_or_else(PoisonError::into_inner) = previous;
                log::error!("Failed to spawn scan worker: {}", e);
                Err(ScanError::Spawn(e))
            }
        }
    }
}

impl Default for ScanOrchestrator {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

/// Handle to a running scan.
///
/// Dropping the handle detaches the worker; it still runs to completion.
pub struct ScanHandle {
    cancel: Arc<AtomicBool>,
    receiver: Receiver<ScanOutcome>,
    worker: Option<JoinHandle<()>>,
    delivered: bool,
}

impl ScanHandle {
    /// Request cancellation. Takes effect at the next container boundary.
    pub fn cancel(&self) {
        log::debug!("Scan cancellation requested");
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Check whether the worker has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Take the outcome if it is ready. Returns `Some` at most once.
    pub fn try_outcome(&mut self) -> Option<ScanOutcome> {
        if self.delivered {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(outcome) => Some(self.deliver(outcome)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.deliver(lost_outcome())),
        }
    }

    /// Wait up to `timeout` for the outcome. Returns `Some` at most once.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<ScanOutcome> {
        if self.delivered {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(self.deliver(outcome)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(self.deliver(lost_outcome())),
        }
    }

    /// Block until the scan finishes.
    ///
    /// If the outcome was already taken through [`try_outcome`] or
    /// [`wait_timeout`], this returns [`ScanFailure::OutcomeTaken`].
    ///
    /// [`try_outcome`]: Self::try_outcome
    /// [`wait_timeout`]: Self::wait_timeout
    #[must_use]
    pub fn wait(mut self) -> ScanOutcome {
        if self.delivered {
            return ScanOutcome::Failed(ScanFailure::OutcomeTaken);
        }
        let outcome = self.receiver.recv().unwrap_or_else(|_| lost_outcome());
        self.deliver(outcome)
    }

    fn deliver(&mut self, outcome: ScanOutcome) -> ScanOutcome {
        self.delivered = true;
        if let Some(worker) = self.worker.take() {
            // The worker sends as its last action
            let _ = worker.join();
        }
        outcome
    }
}

impl fmt::Debug for ScanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanHandle")
            .field("cancelled", &self.cancel.load(Ordering::SeqCst))
            .field("delivered", &self.delivered)
            .finish()
    }
}

fn lost_outcome() -> ScanOutcome {
    ScanOutcome::Failed(ScanFailure::Panicked(
        "scan worker exited without reporting an outcome".to_string(),
    ))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Walk and group on the current thread.
fn run_scan(
    root: &Locator,
    source: &dyn TreeSource,
    config: &ScanConfig,
    cancel: &Arc<AtomicBool>,
) -> ScanOutcome {
    let start = Instant::now();
    log::info!("Starting scan of {} ({} backend)", root, source.backend());

    let mut traversal = match Traversal::from_locator(source, root, config.traversal.clone()) {
        Ok(t) => t.with_cancel_flag(Arc::clone(cancel)),
        Err(e) => {
            log::error!("Cannot start scan of {}: {}", root, e);
            return ScanOutcome::Failed(e.into());
        }
    };
    if let Some(flag) = &config.shutdown_flag {
        traversal = traversal.with_cancel_flag(Arc::clone(flag));
    }
    if let Some(callback) = &config.progress_callback {
        callback.on_phase_start("walking", 0);
        traversal = traversal.with_progress_callback(Arc::clone(callback));
    }

    let mut grouper = Grouper::new();
    let mut stopped = None;
    for item in traversal.by_ref() {
        match item {
            Ok(record) => grouper.push(record),
            Err(e) => {
                stopped = Some(e);
                break;
            }
        }
    }

    if let Some(callback) = &config.progress_callback {
        callback.on_phase_end("walking");
    }

    let cancelled = cancel.load(Ordering::SeqCst)
        || config
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst));

    match stopped {
        Some(TraversalError::Cancelled) => {
            log::info!("Scan of {} cancelled after {} files", root, grouper.len());
            return ScanOutcome::Cancelled;
        }
        Some(e) => {
            log::error!("Scan of {} failed: {}", root, e);
            return ScanOutcome::Failed(e.into());
        }
        // A cancel landing after the last container still wins
        None if cancelled => {
            log::info!("Scan of {} cancelled after walk finished", root);
            return ScanOutcome::Cancelled;
        }
        None => {}
    }

    let stats = traversal.into_stats();
    let (groups, grouping) = grouper.finish();

    let summary = ScanSummary {
        total_files: grouping.total_files,
        total_size: grouping.total_size,
        containers_visited: stats.containers_visited,
        unreadable: stats.unreadable,
        duplicate_groups: groups.len(),
        duplicate_files: groups.duplicate_files(),
        reclaimable_bytes: groups.reclaimable_bytes(),
        scan_duration: start.elapsed(),
    };

    log::info!(
        "Scan of {} complete: {} files, {} duplicate groups, {} unreadable containers in {:.2?}",
        root,
        summary.total_files,
        summary.duplicate_groups,
        summary.unreadable.len(),
        summary.scan_duration
    );

    ScanOutcome::Completed(ScanReport { groups, summary })
}
