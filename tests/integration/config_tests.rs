//! Integration tests for layered configuration.
//!
//! Defaults < TOML file < `FILEVET_*` environment < command-line flags.

use std::fs;
use std::sync::Mutex;

use clap::Parser;
use filevet::actions::RemediationAction;
use filevet::cli::{Cli, Commands};
use filevet::config::{CliOverrides, ConfigError, Settings, DEFAULT_COMMAND};
use filevet::error::ExitCode;
use tempfile::tempdir;

// =============================================================================
// Helper Functions
// =============================================================================

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clear all FILEVET_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("FILEVET_") {
            std::env::remove_var(key);
        }
    }
}

fn scan_overrides(args: &[&str]) -> CliOverrides {
    let cli = Cli::try_parse_from(args).unwrap();
    match cli.command {
        Commands::Scan(scan) => scan.overrides(),
        Commands::Config => panic!("Expected Scan command"),
    }
}

// =============================================================================
// Layering
// =============================================================================

#[test]
fn test_file_overrides_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
command = "ffprobe -v error {filePath}"
max_concurrent = 4
extensions = [".MKV", "webm"]
action = "delete"
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(path.as_path()), &CliOverrides::default()).unwrap();

    assert_eq!(settings.command, "ffprobe -v error {filePath}");
    assert_eq!(settings.max_concurrent, 4);
    assert_eq!(settings.extensions, vec!["mkv", "webm"]);
    assert_eq!(settings.action, RemediationAction::Delete);
    assert_eq!(settings.poll_interval_ms, 100);
}

#[test]
fn test_env_overrides_file() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "max_concurrent = 4\ndedup = false\n").unwrap();

    std::env::set_var("FILEVET_MAX_CONCURRENT", "6");
    std::env::set_var("FILEVET_DEDUP", "true");
    let settings = Settings::load(Some(path.as_path()), &CliOverrides::default());
    clear_env();

    let settings = settings.unwrap();
    assert_eq!(settings.max_concurrent, 6);
    assert!(settings.dedup);
}

#[test]
fn test_cli_overrides_everything() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "max_concurrent = 4\nhash_algorithm = \"blake3\"\n").unwrap();

    std::env::set_var("FILEVET_MAX_CONCURRENT", "6");
    let overrides = scan_overrides(&[
        "filevet",
        "scan",
        "/media",
        "-j",
        "2",
        "--hash-algorithm",
        "sha256",
        "--quarantine",
        "/tmp/quarantine",
    ]);
    let settings = Settings::load(Some(path.as_path()), &overrides);
    clear_env();

    let settings = settings.unwrap();
    assert_eq!(settings.max_concurrent, 2);
    assert_eq!(settings.hash_algorithm, "sha256");
    assert_eq!(settings.quarantine_dir.to_string_lossy(), "/tmp/quarantine");
    assert_eq!(settings.command, DEFAULT_COMMAND);
}

#[test]
fn test_unset_flags_do_not_clobber_file() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "dedup = true\nuse_trash = true\n").unwrap();

    let overrides = scan_overrides(&["filevet", "scan", "/media"]);
    let settings = Settings::load(Some(path.as_path()), &overrides).unwrap();

    assert!(settings.dedup);
    assert!(settings.use_trash);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_invalid_file_is_config_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "max_concurrent = \"many\"\n").unwrap();

    let err = Settings::load(Some(path.as_path()), &CliOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = anyhow::Error::new(err).context("failed to load configuration");
    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
}

#[test]
fn test_command_without_placeholder_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();

    let overrides = scan_overrides(&[
        "filevet",
        "scan",
        "/media",
        "--command",
        "ffprobe -v error",
    ]);
    let err = Settings::load(None, &overrides);

    assert!(matches!(err, Err(ConfigError::MissingPlaceholder(_))));
}

#[test]
fn test_missing_explicit_file_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = Settings::load(Some(path.as_path()), &CliOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingFile(_)));
}

#[test]
fn test_effective_config_renders_as_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "max_concurrent = 3\n").unwrap();

    let text = Settings::load(Some(path.as_path()), &CliOverrides::default())
        .unwrap()
        .to_toml()
        .unwrap();

    assert!(text.contains("max_concurrent = 3"));
    assert!(text.contains("action = \"move\""));
}
