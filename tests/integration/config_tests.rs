use clap::Parser;
use dupetree::cli::{Cli, Commands, OutputFormat, ScanArgs};
use dupetree::config::Config;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use tempfile::tempdir;

use crate::ENV_MUTEX;

/// Clear all DUPETREE_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("DUPETREE_") {
            std::env::remove_var(key);
        }
    }
}

fn scan_args(argv: &[&str]) -> ScanArgs {
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Scan(args) => args,
    }
}

#[test]
fn test_config_defaults_extract() {
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config, Config::default());
    assert!(config.show_progress);
    assert_eq!(config.output, OutputFormat::Text);
}

#[test]
fn test_config_load_from_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    fs::write(
        &config_path,
        r#"
skip_hidden = true
min_size = 1024
ignore_patterns = ["*.tmp", "target/"]
show_progress = false
output = "csv"
"#,
    )
    .unwrap();

    let config = Config::try_load_from_path(&config_path).unwrap();

    assert!(config.skip_hidden);
    assert!(!config.follow_symlinks);
    assert_eq!(config.min_size, Some(1024));
    assert_eq!(config.max_size, None);
    assert_eq!(config.ignore_patterns, vec!["*.tmp", "target/"]);
    assert!(!config.show_progress);
    assert_eq!(config.output, OutputFormat::Csv);
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();

    let config = Config::load_from_path(temp_dir.path().join("nope.toml"));
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_invalid_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "min_size = \"lots\"").unwrap();

    assert!(Config::try_load_from_path(&config_path).is_err());
    // The lenient loader falls back to defaults
    assert_eq!(Config::load_from_path(&config_path), Config::default());
}

#[test]
fn test_env_overrides_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "output = \"csv\"\nskip_hidden = false\n").unwrap();

    std::env::set_var("DUPETREE_OUTPUT", "json");
    std::env::set_var("DUPETREE_SKIP_HIDDEN", "true");
    let config = Config::try_load_from_path(&config_path);
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.output, OutputFormat::Json);
    assert!(config.skip_hidden);
}

#[test]
fn test_figment_layer_order() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "max_size = 10\n").unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed("DUPETREE_TEST_UNUSED_"))
        .extract()
        .unwrap();
    assert_eq!(config.max_size, Some(10));
}

#[test]
fn test_cli_overrides_config() {
    let mut config = Config {
        min_size: Some(5),
        output: OutputFormat::Csv,
        ignore_patterns: vec!["*.tmp".to_string()],
        ..Config::default()
    };

    let args = scan_args(&[
        "dupetree",
        "scan",
        "/path",
        "--min-size",
        "1KB",
        "--output",
        "json",
        "-i",
        "*.bak",
        "--follow-symlinks",
        "--no-progress",
    ]);
    config.merge_scan_args(&args);

    assert_eq!(config.min_size, Some(1000));
    assert_eq!(config.output, OutputFormat::Json);
    assert_eq!(config.ignore_patterns, vec!["*.tmp", "*.bak"]);
    assert!(config.follow_symlinks);
    assert!(!config.show_progress);
}

#[test]
fn test_cli_absent_flags_keep_config() {
    let mut config = Config {
        skip_hidden: true,
        max_size: Some(99),
        output: OutputFormat::Csv,
        ..Config::default()
    };

    config.merge_scan_args(&scan_args(&["dupetree", "scan", "/path"]));

    assert!(config.skip_hidden);
    assert_eq!(config.max_size, Some(99));
    assert_eq!(config.output, OutputFormat::Csv);
    assert!(config.show_progress);
}

#[test]
fn test_traversal_config_from_config() {
    let config = Config {
        skip_hidden: true,
        min_size: Some(1),
        max_size: Some(2),
        ignore_patterns: vec!["x".to_string()],
        ..Config::default()
    };
    let traversal = config.traversal_config();

    assert!(traversal.skip_hidden);
    assert_eq!(traversal.min_size, Some(1));
    assert_eq!(traversal.max_size, Some(2));
    assert_eq!(traversal.ignore_patterns, vec!["x"]);
}
