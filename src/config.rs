//! Layered application configuration.
//!
//! Sources are merged lowest to highest priority:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config PATH`, or `reclaim/config.toml` in the platform
//!    config directory)
//! 3. Environment variables prefixed `RECLAIM_` (e.g. `RECLAIM_MIN_SIZE=4096`)
//! 4. Command-line flags
//!
//! ```toml
//! min_size = 1048576
//! keep = "oldest"
//! io_threads = 4
//! ignore_patterns = ["node_modules/", "*.tmp"]
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::{FinderConfig, RetentionPolicy, DEFAULT_QUEUE_DEPTH};
use crate::progress::ProgressSink;
use crate::scanner::{WalkerConfig, DEFAULT_SAMPLE_SIZE};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RECLAIM_";

/// Default minimum file size: files below 1 KiB are not worth reclaiming.
pub const DEFAULT_MIN_SIZE: u64 = 1024;

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A source could not be parsed or had the wrong type.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// A value parsed but is out of range.
    #[error("Invalid value for '{key}': {message}")]
    OutOfRange {
        /// Config key
        key: &'static str,
        /// What is wrong with it
        message: String,
    },
}

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum file size in bytes
    pub min_size: u64,
    /// Retention policy used for reports and cleanup
    pub keep: RetentionPolicy,
    /// Hashing workers; `None` picks a default from the core count
    pub io_threads: Option<usize>,
    /// Capacity of the hashing job queue
    pub queue_depth: usize,
    /// Bytes sampled from each end of a file by the quick fingerprint
    pub sample_size: usize,
    /// Cap on bytes re-read by full verification; `None` is unlimited
    pub verify_budget: Option<u64>,
    /// Skip hidden files and directories
    pub skip_hidden: bool,
    /// Gitignore-style patterns to skip
    pub ignore_patterns: Vec<String>,
    /// Abort on the first skipped file
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            keep: RetentionPolicy::default(),
            io_threads: None,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            sample_size: DEFAULT_SAMPLE_SIZE,
            verify_budget: None,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            strict: false,
        }
    }
}

/// Values supplied on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep: Option<RetentionPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_budget: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_patterns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl Config {
    /// Platform config file location, e.g. `~/.config/reclaim/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "reclaim").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Build the layered figment without CLI overrides.
    ///
    /// A missing default config file is ignored; a missing explicit one is
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `path` is given but absent.
    pub fn figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                log::debug!("Loading config from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(default) = Self::default_path() {
                    log::trace!("Looking for config at {}", default.display());
                    figment = figment.merge(Toml::file(default));
                }
            }
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load configuration with every layer applied.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a source is missing or malformed, or a
    /// value is out of range.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let figment = Self::figment(path)?.merge(Serialized::defaults(overrides));
        Self::extract(&figment)
    }

    /// Extract and validate a configuration from `figment`.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn extract(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_threads == Some(0) {
            return Err(ConfigError::OutOfRange {
                key: "io_threads",
                message: "must be at least 1".to_string(),
            });
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::OutOfRange {
                key: "queue_depth",
                message: "must be at least 1".to_string(),
            });
        }
        if self.sample_size == 0 {
            return Err(ConfigError::OutOfRange {
                key: "sample_size",
                message: "must be at least 1 byte".to_string(),
            });
        }
        Ok(())
    }

    /// Walker settings derived from this configuration.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            min_size: self.min_size,
            skip_hidden: self.skip_hidden,
            ignore_patterns: self.ignore_patterns.clone(),
        }
    }

    /// Finder settings derived from this configuration.
    #[must_use]
    pub fn finder_config(
        &self,
        shutdown_flag: Option<Arc<AtomicBool>>,
        progress: ProgressSink,
    ) -> FinderConfig {
        let mut config = FinderConfig::default()
            .with_walker_config(self.walker_config())
            .with_queue_depth(self.queue_depth)
            .with_sample_size(self.sample_size)
            .with_verify_budget(self.verify_budget)
            .with_strict(self.strict)
            .with_progress(progress);
        if let Some(threads) = self.io_threads {
            config = config.with_io_threads(threads);
        }
        if let Some(flag) = shutdown_flag {
            config = config.with_shutdown_flag(flag);
        }
        config
    }
}
