use anyhow::{Context, Result};
use dirs::config_dir;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::staleness::Tolerance;

/// Main configuration structure for gdrive-export
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Credential discovery settings
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Drive API endpoint settings
    #[serde(default)]
    pub drive: DriveConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Credential configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CredentialsConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "service_account", "token"

    /// Directory holding service account key files
    #[serde(default = "default_secrets_dir")]
    pub secrets_dir: String,

    /// Service account key file name, relative to `secrets_dir` unless absolute
    #[serde(default = "default_key_file")]
    pub key_file: String,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Seconds within which a remote and local timestamp count as unchanged
    #[serde(default = "default_update_tolerance")]
    pub update_tolerance: u64,
}

/// Drive API configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DriveConfig {
    /// Base URL of the Drive REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Children requested per listing page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Timeout for a single API request in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "pretty", "full"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Only log errors
    #[serde(default)]
    pub silent: bool,
}

/// Immutable per-run settings handed to the walker and export pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub tolerance: Tolerance,
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::from_secs(default_update_tolerance()),
            dry_run: false,
        }
    }
}

// Default value functions
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_secrets_dir() -> String {
    "./secrets".to_string()
}
fn default_key_file() -> String {
    "serviceAccountKey.json".to_string()
}
fn default_update_tolerance() -> u64 {
    60
}
fn default_api_base_url() -> String {
    "https://www.googleapis.com".to_string()
}
fn default_page_size() -> u32 {
    1000
}
fn default_timeout() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}
fn default_true() -> bool {
    true
}

// Default implementations
impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            secrets_dir: default_secrets_dir(),
            key_file: default_key_file(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            update_tolerance: default_update_tolerance(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            page_size: default_page_size(),
            timeout: default_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
            silent: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            let mut config = Self::default();
            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("gdrive-export").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.credentials.secrets_dir = shellexpand::full(&self.credentials.secrets_dir)
            .context("Failed to expand secrets_dir path")?
            .into_owned();

        self.credentials.key_file = shellexpand::full(&self.credentials.key_file)
            .context("Failed to expand key_file path")?
            .into_owned();

        Ok(())
    }

    /// Resolve the service account key file location
    pub fn key_file_path(&self) -> PathBuf {
        let key_file = Path::new(&self.credentials.key_file);
        if key_file.is_absolute() {
            key_file.to_path_buf().clean()
        } else {
            Path::new(&self.credentials.secrets_dir).join(key_file).clean()
        }
    }

    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(
        &mut self,
        key_file: Option<String>,
        silent: bool,
        update_tolerance: Option<u64>,
    ) {
        if let Some(key_file) = key_file {
            self.credentials.key_file = key_file;
        }
        if silent {
            self.logging.silent = true;
        }
        if let Some(tolerance) = update_tolerance {
            self.sync.update_tolerance = tolerance;
        }
    }

    /// Build the run options shared by the walker and the export pipeline
    pub fn sync_options(&self, dry_run: bool) -> SyncOptions {
        SyncOptions {
            tolerance: Tolerance::from_secs(self.sync.update_tolerance),
            dry_run,
        }
    }
}
