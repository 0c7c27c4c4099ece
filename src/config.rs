//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config FILE`, or `config.toml` in the platform config dir)
//! 3. `DUPETREE_*` environment variables
//! 4. Command-line flags
//!
//! Command-line flags only override a setting when they are actually given.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::{OutputFormat, ScanArgs};
use crate::scanner::TraversalConfig;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "DUPETREE_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Skip files and directories whose name starts with `.`
    pub skip_hidden: bool,
    /// Follow symbolic links in directory scans
    pub follow_symlinks: bool,
    /// Minimum file size in bytes
    pub min_size: Option<u64>,
    /// Maximum file size in bytes
    pub max_size: Option<u64>,
    /// Gitignore-style patterns to skip
    pub ignore_patterns: Vec<String>,
    /// Show the progress spinner
    pub show_progress: bool,
    /// Default output format
    pub output: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            skip_hidden: false,
            follow_symlinks: false,
            min_size: None,
            max_size: None,
            ignore_patterns: Vec::new(),
            show_progress: true,
            output: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Load the configuration from the default platform-specific path.
    ///
    /// Falls back to defaults (plus environment) if the file is unreadable.
    #[must_use]
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from_path(path),
            None => Self::figment(None).extract().unwrap_or_else(|e| {
                log::warn!("Invalid configuration from environment, using defaults: {}", e);
                Self::default()
            }),
        }
    }

    /// Load the configuration from a specific file, falling back to defaults
    /// with a warning if it cannot be parsed.
    #[must_use]
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load_from_path(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config from {}, using defaults: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load the configuration from a specific file.
    ///
    /// A missing file is not an error; its layer is simply empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or the environment holds invalid values.
    pub fn try_load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());
        Self::figment(Some(path))
            .extract()
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Build the layered figment without the command-line layer.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Get the default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dupetree", "dupetree")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply the flags given on the command line.
    pub fn merge_scan_args(&mut self, args: &ScanArgs) {
        if args.skip_hidden {
            self.skip_hidden = true;
        }
        if args.follow_symlinks {
            self.follow_symlinks = true;
        }
        if args.min_size.is_some() {
            self.min_size = args.min_size;
        }
        if args.max_size.is_some() {
            self.max_size = args.max_size;
        }
        self.ignore_patterns
            .extend(args.ignore_patterns.iter().cloned());
        if args.no_progress {
            self.show_progress = false;
        }
        if let Some(output) = args.output {
            self.output = output;
        }
    }

    /// Walk filters described by this configuration.
    #[must_use]
    pub fn traversal_config(&self) -> TraversalConfig {
        TraversalConfig::default()
            .with_skip_hidden(self.skip_hidden)
            .with_min_size(self.min_size)
            .with_max_size(self.max_size)
            .with_ignore_patterns(self.ignore_patterns.clone())
    }

    /// Reject contradictory settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `min_size` is greater than `max_size`.
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                anyhow::bail!("min_size ({}) is greater than max_size ({})", min, max);
            }
        }
        Ok(())
    }
}
