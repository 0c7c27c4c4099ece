//! dupetree - candidate duplicate file finder
//!
//! Walks a hierarchical tree and groups files that share both name and size.
//! Trees come from a [`source::TreeSource`]: the local filesystem
//! ([`source::DirectSource`]) or a permission-scoped document provider
//! ([`source::HandleSource`]). Scans run on a background worker managed by
//! [`orchestrator::ScanOrchestrator`] and can be cancelled at any time.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod source;

use std::io::{IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{Cli, Commands, ScanArgs, ScanRoot};
use crate::config::Config;
use crate::error::{ExitCode, Interrupted};
use crate::orchestrator::{ScanConfig, ScanOrchestrator, ScanOutcome};
use crate::progress::Progress;
use crate::source::{DirectSource, HandleSource, Locator, ManifestResolver, TreeSource};

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the root cannot be opened,
/// the scan fails or is cancelled, or the report cannot be written. A
/// cancelled scan is reported as [`error::Interrupted`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let color = !cli.no_color && std::io::stdout().is_terminal();

    match cli.command {
        Commands::Scan(ref args) => run_scan(args, cli.quiet, color),
    }
}

fn load_config(args: &ScanArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::try_load_from_path(path)?
        }
        None => Config::load(),
    };
    config.merge_scan_args(args);
    config.validate()?;
    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn open_source(root: ScanRoot, config: &Config) -> Result<(Locator, Arc<dyn TreeSource>)> {
    match root {
        ScanRoot::Directory(path) => {
            let source = DirectSource::new().with_follow_symlinks(config.follow_symlinks);
            Ok((Locator::Path(path), Arc::new(source)))
        }
        ScanRoot::Manifest(path) => {
            let resolver = ManifestResolver::load(&path)
                .with_context(|| format!("Failed to load manifest {}", path.display()))?;
            log::info!(
                "Loaded manifest {} ({} documents)",
                path.display(),
                resolver.document_count()
            );
            Ok((resolver.root_locator(), Arc::new(HandleSource::new(resolver))))
        }
    }
}

fn run_scan(args: &ScanArgs, quiet: bool, color: bool) -> Result<ExitCode> {
    let config = load_config(args)?;
    let root = args.scan_root().context("No scan root given")?;
    let (locator, source) = open_source(root, &config)?;

    let shutdown = signal::install_handler()?;
    let mut scan_config = ScanConfig::default()
        .with_traversal(config.traversal_config())
        .with_shutdown_flag(shutdown.get_flag());
    if config.show_progress && !quiet {
        scan_config = scan_config.with_progress_callback(Arc::new(Progress::new(false)));
    }

    let orchestrator = ScanOrchestrator::new(scan_config);
    let outcome = orchestrator.start_scan(locator, source)?.wait();
    let exit_code = ExitCode::from_outcome(&outcome);

    match outcome {
        ScanOutcome::Completed(report) => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            output::render(config.output, &report, exit_code, color, &mut handle)?;
            handle.flush()?;
            Ok(exit_code)
        }
        ScanOutcome::Cancelled => Err(Interrupted.into()),
        ScanOutcome::Failed(failure) => Err(anyhow::Error::new(failure).context("Scan failed")),
    }
}
