//! Layered application settings.
//!
//! Settings are merged from, lowest to highest priority:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config FILE`, or `config.toml` in the platform config dir)
//! 3. `FILEVET_*` environment variables
//! 4. command-line flags
//!
//! ```toml
//! command = "ffmpeg -v error -i {filePath} -f null -"
//! extensions = ["mkv", "mp4"]
//! max_concurrent = 4
//! action = "move"
//! quarantine_dir = "/videos/quarantine"
//! dedup = true
//! hash_algorithm = "blake3"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::RemediationAction;
use crate::pipeline::default_concurrency;
use crate::verifier::{CommandTemplate, HashAlgorithm, TemplateError};

/// Prefix for environment overrides (`FILEVET_MAX_CONCURRENT=8`).
pub const ENV_PREFIX: &str = "FILEVET_";

/// Verifier used when none is configured.
pub const DEFAULT_COMMAND: &str = "ffmpeg -v error -i {filePath} -f null -";

/// Unusable settings. Fatal before the pipeline starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("verifier command is empty")]
    EmptyCommand,

    #[error("verifier command `{0}` does not contain {{filePath}}")]
    MissingPlaceholder(String),

    #[error("verifier command is malformed: {0}")]
    InvalidCommand(String),

    #[error("unknown hash algorithm `{0}` (expected blake3 or sha256)")]
    UnknownHashAlgorithm(String),

    #[error("poll interval must be at least 1 ms")]
    ZeroPollInterval,

    #[error("move action requires a quarantine directory")]
    EmptyQuarantineDir,

    #[error("config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// Effective settings for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Verifier command template; must contain `{filePath}`
    pub command: String,
    /// Extension allow-list without dots; empty accepts every file
    pub extensions: Vec<String>,
    /// Concurrency cap (0 is clamped to 1)
    pub max_concurrent: usize,
    /// Remediation applied to flagged files
    pub action: RemediationAction,
    /// Destination for the move action
    pub quarantine_dir: PathBuf,
    /// Delete to the system trash instead of permanently
    pub use_trash: bool,
    /// Hash files and report exact duplicates
    pub dedup: bool,
    /// `blake3` or `sha256`
    pub hash_algorithm: String,
    /// Controller loop sleep
    pub poll_interval_ms: u64,
    /// Treat a non-zero exit with no output as flagged
    pub flag_nonzero_exit: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            extensions: ["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_concurrent: default_concurrency(),
            action: RemediationAction::Move,
            quarantine_dir: PathBuf::from("quarantine"),
            use_trash: false,
            dedup: false,
            hash_algorithm: HashAlgorithm::default().to_string(),
            poll_interval_ms: 100,
            flag_nonzero_exit: false,
        }
    }
}

/// Command-line values layered over the file and environment.
///
/// `None` fields are left out of the merge.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<RemediationAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantine_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_trash: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_nonzero_exit: Option<bool>,
}

impl Settings {
    /// Platform config file (`.../filevet/config.toml`), if a home exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "filevet", "filevet")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Build the provider stack without extracting.
    ///
    /// The platform file is optional; an explicitly named file must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] if `config_file` does not exist.
    pub fn figment(
        config_file: Option<&Path>,
        overrides: &CliOverrides,
    ) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        match config_file {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Some(path) = Self::default_path() {
                    log::debug!("Looking for config at {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        Ok(figment
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::globals(overrides)))
    }

    /// Load and validate settings from every layer.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a layer cannot be parsed or the merged
    /// settings fail [`validate`](Self::validate).
    pub fn load(config_file: Option<&Path>, overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let settings: Settings = Self::figment(config_file, overrides)?
            .extract()
            .map_err(Box::new)?;
        settings.validate()
    }

    /// Check and normalise the settings.
    ///
    /// A zero concurrency cap is raised to 1 with a warning; extensions
    /// are lowercased and stripped of leading dots.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        match CommandTemplate::parse(&self.command) {
            Ok(_) => {}
            Err(TemplateError::Empty) => return Err(ConfigError::EmptyCommand),
            Err(TemplateError::MissingPlaceholder(cmd)) => {
                return Err(ConfigError::MissingPlaceholder(cmd))
            }
            Err(e) => return Err(ConfigError::InvalidCommand(e.to_string())),
        }

        self.hash_algorithm()?;

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        if self.action == RemediationAction::Move
            && self.quarantine_dir.as_os_str().is_empty()
        {
            return Err(ConfigError::EmptyQuarantineDir);
        }

        if self.max_concurrent == 0 {
            log::warn!("max_concurrent = 0 is not usable, running one task at a time");
            self.max_concurrent = 1;
        }

        self.extensions = self
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Ok(self)
    }

    /// Parsed hash algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownHashAlgorithm`] for unrecognized names.
    pub fn hash_algorithm(&self) -> Result<HashAlgorithm, ConfigError> {
        self.hash_algorithm
            .parse()
            .map_err(|_| ConfigError::UnknownHashAlgorithm(self.hash_algorithm.clone()))
    }

    /// Controller loop sleep as a duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Render as TOML, as printed by `filevet config`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
