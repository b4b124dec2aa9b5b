//! Project configuration file support for cgmview.
//!
//! Loads configuration from `cgmview.toml` in the working directory, falling
//! back to `<config dir>/cgmview/cgmview.toml`.

use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use cgmview_core::default_session_gap;

/// The config file name
pub const CONFIG_FILE_NAME: &str = "cgmview.toml";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8501;

/// Project-level configuration loaded from `cgmview.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Dataset used when no `--file` is given. Relative paths resolve
    /// against the directory holding the config file.
    pub default_dataset: Option<PathBuf>,
    /// Keys accepted by the access gate. Empty disables the gate.
    #[serde(default)]
    pub access_keys: Vec<String>,
    /// Gap between readings that starts a new sensor session
    pub session_gap_hours: Option<f64>,
    /// Directory for rolling JSON log files
    pub log_dir: Option<PathBuf>,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

/// Configuration for `cgmview serve`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ProjectConfig {
    /// Load configuration from a directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        Self::load_file(&config_path).map(Some)
    }

    /// Load configuration from an explicit path. A missing file is an error.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf);

        Ok(config)
    }

    /// Find the effective configuration.
    /// Priority: explicit path > working directory > user config dir > defaults
    pub fn discover(explicit: Option<&Path>, working_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        if let Some(config) = Self::load(working_dir)? {
            return Ok(config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            if let Some(config) = Self::load(&config_dir.join("cgmview"))? {
                return Ok(config);
            }
        }

        Ok(Self::default())
    }

    /// The fallback dataset, resolved to a usable path.
    pub fn default_dataset(&self) -> Option<PathBuf> {
        let path = self.default_dataset.as_ref()?;
        if path.is_absolute() {
            return Some(path.clone());
        }
        Some(match &self.base_dir {
            Some(base) => base.join(path),
            None => path.clone(),
        })
    }

    /// Session gap, defaulting to eight hours.
    pub fn session_gap(&self) -> Result<Duration> {
        match self.session_gap_hours {
            None => Ok(default_session_gap()),
            Some(hours) if hours.is_finite() && hours > 0.0 => {
                Ok(Duration::milliseconds((hours * 3_600_000.0).round() as i64))
            }
            Some(hours) => anyhow::bail!(
                "session_gap_hours must be a positive number of hours, got {}",
                hours
            ),
        }
    }

    pub fn server_host(&self) -> &str {
        self.server.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn server_port(&self) -> u16 {
        self.server.port.unwrap_or(DEFAULT_PORT)
    }
}
