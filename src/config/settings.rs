//! pkgcenter settings and configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::paths;

/// pkgcenter configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between unforced cache refreshes
    pub refresh_interval_secs: u64,

    /// Quiet period after external package changes before re-checking
    pub idle_debounce_ms: u64,

    /// Marker file the system creates when a reboot is needed
    pub restart_marker: PathBuf,

    /// Root of the device tree scanned for drivers
    pub sysfs_devices: PathBuf,

    /// Package databases watched for changes made outside pkgcenter
    pub package_state_paths: Vec<PathBuf>,

    /// Metadata pool (TOML or JSON)
    pub metadata_path: Option<PathBuf>,

    /// Forward notifications to the desktop
    pub notifications: bool,

    /// Default log directive, overridden by `RUST_LOG`
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 24 * 60 * 60,
            idle_debounce_ms: 2000,
            restart_marker: paths::restart_marker(),
            sysfs_devices: paths::sysfs_devices(),
            package_state_paths: paths::package_state_paths(),
            metadata_path: None,
            notifications: true,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the config file, or defaults when there is none
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Save settings to the config file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the config file path
    #[must_use]
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.toml")
    }
}
