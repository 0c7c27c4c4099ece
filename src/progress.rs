//! Progress reporting utilities using indicatif.
//!
//! [`Progress`] implements [`ProgressCallback`] with a spinner that counts
//! discovered files while a scan walks the tree.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress callback for scan phases.
///
/// Implement this trait to receive progress updates from a traversal.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (currently always `"walking"`)
    /// * `total` - Total number of items, or 0 when unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each file discovered.
    ///
    /// # Arguments
    ///
    /// * `current` - Files discovered so far (1-based)
    /// * `locator` - Locator of the file, as displayed
    fn on_progress(&self, current: usize, locator: &str);

    /// Called with the size of each discovered file.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Spinner-based progress reporter writing to stderr.
pub struct Progress {
    walking: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupetree::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            walking: Mutex::new(None),
            quiet,
        }
    }

    fn walking_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let walking = self.walking.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ref pb) = *walking {
            f(pb);
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_style(Self::walking_style());
        pb.set_message(format!("Scanning ({})", phase));
        pb.enable_steady_tick(Duration::from_millis(100));
        *self.walking.lock().unwrap_or_else(PoisonError::into_inner) = Some(pb);
    }

    fn on_progress(&self, current: usize, locator: &str) {
        if self.quiet {
            return;
        }

        self.with_bar(|pb| {
            pb.set_position(current as u64);
            pb.set_message(truncate_locator(locator, 30));
        });
    }

    fn on_phase_end(&self, _phase: &str) {
        if self.quiet {
            return;
        }

        let bar = self
            .walking
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pb) = bar {
            pb.finish_and_clear();
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }

        self.with_bar(|pb| pb.set_message(message.to_string()));
    }
}

/// Truncate a locator for display in the spinner, keeping its last component.
fn truncate_locator(locator: &str, max_len: usize) -> String {
    if locator.chars().count() <= max_len {
        return locator.to_string();
    }

    let file_name = std::path::Path::new(locator)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| locator.to_string());

    let chars: Vec<char> = file_name.chars().collect();
    if chars.len() + 4 > max_len {
        let tail: String = chars[chars.len().saturating_sub(max_len - 3)..]
            .iter()
            .collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
