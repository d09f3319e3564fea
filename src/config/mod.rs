//! User configuration, stored as TOML.
//!
//! Lives at `$FLASHBACK_CONFIG_PATH` or `<config dir>/flashback/config.toml`.
//! A missing file is created with defaults on first load. `FLASHBACK_MANIFEST`
//! and `FLASHBACK_DEST` override the file; command-line flags override both.

#![deny(missing_docs)]

use crate::collab::{CommandPicker, FixedRoot, MountScanner, VolumeLocator};
use crate::error::Error;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "FLASHBACK_CONFIG_PATH";
/// Environment variable overriding `core.manifest_path`
pub const MANIFEST_ENV: &str = "FLASHBACK_MANIFEST";
/// Environment variable overriding `destination.root`
pub const DEST_ENV: &str = "FLASHBACK_DEST";

/// Every key accepted by [`Config::get`] and [`Config::set`]
pub const KEYS: &[&str] = &[
    "core.manifest_path",
    "core.lock_timeout_secs",
    "destination.root",
    "destination.search_roots",
    "reconcile.verify_hash",
    "reconcile.sync_writes",
    "picker.command",
    "logging.file",
];

/// Contents of `config.toml`, one field per section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Manifest location and locking
    #[serde(default)]
    pub core: CoreConfig,

    /// Where mirrors are written
    #[serde(default)]
    pub destination: DestinationConfig,

    /// How entries are compared and copied
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// External file dialog used by `+` and `flashback add` without paths
    #[serde(default)]
    pub picker: PickerConfig,

    /// Diagnostic log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[core]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Manifest file; its mirrored copy on the drive keeps the same file name
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,
    /// How long to wait for another session's lock
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

/// `[destination]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Fixed root; when unset the search roots are scanned for a mounted volume
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Directories whose subdirectories are candidate mount points, in order
    #[serde(default = "MountScanner::default_search_roots")]
    pub search_roots: Vec<PathBuf>,
}

/// `[reconcile]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Re-hash sources whose timestamps look unchanged
    #[serde(default = "default_true")]
    pub verify_hash: bool,
    /// fsync each copy before renaming it into place
    #[serde(default = "default_true")]
    pub sync_writes: bool,
}

/// `[picker]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PickerConfig {
    /// Command line, e.g. `zenity --file-selection`
    #[serde(default)]
    pub command: Option<String>,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Also write log events to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            manifest_path: default_manifest_path(),
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            root: None,
            search_roots: MountScanner::default_search_roots(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            verify_hash: true,
            sync_writes: true,
        }
    }
}

/// Config file location, honoring `FLASHBACK_CONFIG_PATH`
#[must_use]
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flashback")
        .join("config.toml")
}

impl Config {
    /// Load configuration from a file, creating it with defaults if absent
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or created
    /// - The file is not valid TOML
    /// - A value fails validation
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration atomically
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, serialization
    /// fails, or the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let toml_str = toml::to_string_pretty(self)?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(toml_str.as_bytes())?;
        temp.persist(path)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `FLASHBACK_MANIFEST` and `FLASHBACK_DEST` when set and non-empty
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = std::env::var_os(MANIFEST_ENV).filter(|p| !p.is_empty()) {
            self.core.manifest_path = PathBuf::from(path);
        }
        if let Some(path) = std::env::var_os(DEST_ENV).filter(|p| !p.is_empty()) {
            self.destination.root = Some(PathBuf::from(path));
        }
    }

    /// Check values that deserialize fine but cannot work
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero lock timeout or a blank picker command.
    pub fn validate(&self) -> Result<()> {
        if self.core.lock_timeout_secs == 0 {
            return Err(Error::Config {
                message: "core.lock_timeout_secs must be at least 1".to_string(),
            }
            .into());
        }
        if let Some(cmd) = &self.picker.command
            && cmd.trim().is_empty()
        {
            return Err(Error::Config {
                message: "picker.command cannot be empty; unset it to prompt for paths".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Lock wait as a duration
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.core.lock_timeout_secs)
    }

    /// Locator for the destination: the fixed root if set, else a mount scan
    #[must_use]
    pub fn volume_locator(&self) -> Box<dyn VolumeLocator> {
        match &self.destination.root {
            Some(root) => Box::new(FixedRoot(crate::utils::expand_tilde(&root.to_string_lossy()))),
            None => Box::new(MountScanner::new(self.destination.search_roots.clone())),
        }
    }

    /// The configured picker, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be parsed or its program is missing.
    pub fn file_picker(&self) -> Result<Option<CommandPicker>> {
        self.picker
            .command
            .as_deref()
            .map(|cmd| CommandPicker::from_command_line(cmd).map_err(anyhow::Error::from))
            .transpose()
    }

    /// Get a configuration value by dotted key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let display = |p: &Path| p.display().to_string();
        match key {
            "core.manifest_path" => Some(display(&self.core.manifest_path)),
            "core.lock_timeout_secs" => Some(self.core.lock_timeout_secs.to_string()),
            "destination.root" => self.destination.root.as_deref().map(display),
            "destination.search_roots" => Some(
                self.destination
                    .search_roots
                    .iter()
                    .map(|p| display(p))
                    .collect::<Vec<_>>()
                    .join(":"),
            ),
            "reconcile.verify_hash" => Some(self.reconcile.verify_hash.to_string()),
            "reconcile.sync_writes" => Some(self.reconcile.sync_writes.to_string()),
            "picker.command" => self.picker.command.clone(),
            "logging.file" => self.logging.file.as_deref().map(display),
            _ => None,
        }
    }

    /// Set a configuration value by dotted key.
    ///
    /// `destination.search_roots` takes a `:`-separated list.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse or validate
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        match key {
            "core.manifest_path" => updated.core.manifest_path = crate::utils::expand_tilde(value),
            "core.lock_timeout_secs" => {
                updated.core.lock_timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid number: {value}"))?;
            }
            "destination.root" => updated.destination.root = Some(crate::utils::expand_tilde(value)),
            "destination.search_roots" => {
                updated.destination.search_roots = value
                    .split(':')
                    .filter(|p| !p.is_empty())
                    .map(crate::utils::expand_tilde)
                    .collect();
            }
            "reconcile.verify_hash" => {
                updated.reconcile.verify_hash = value
                    .parse()
                    .with_context(|| format!("Invalid boolean: {value}"))?;
            }
            "reconcile.sync_writes" => {
                updated.reconcile.sync_writes = value
                    .parse()
                    .with_context(|| format!("Invalid boolean: {value}"))?;
            }
            "picker.command" => updated.picker.command = Some(value.to_string()),
            "logging.file" => updated.logging.file = Some(crate::utils::expand_tilde(value)),
            _ => anyhow::bail!("Unknown configuration key: {key}"),
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Clear an optional value
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or not optional
    pub fn unset(&mut self, key: &str) -> Result<()> {
        match key {
            "destination.root" => self.destination.root = None,
            "picker.command" => self.picker.command = None,
            "logging.file" => self.logging.file = None,
            _ => anyhow::bail!("Cannot unset configuration key: {key}"),
        }
        Ok(())
    }
}

fn default_manifest_path() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flashback")
        .join(crate::MANIFEST_FILE)
}

const fn default_lock_timeout_secs() -> u64 {
    5
}

const fn default_true() -> bool {
    true
}
