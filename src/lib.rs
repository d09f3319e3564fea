#![warn(missing_docs)]
#![allow(clippy::arithmetic_side_effects)] // Counters and sizes cannot realistically overflow
#![allow(clippy::indexing_slicing)] // Bounds checked by logic

//! # Flashback - mirror hand-picked files onto a removable drive
//!
//! Flashback keeps a manifest of individual files and, whenever the drive is
//! plugged in, tells you which of them are new, stale or already current on
//! it, then copies the ones you choose.
//!
//! ## Architecture
//!
//! - [`manifest`]: the tracked-file list, its text format and the registry
//!   operations (add, remove)
//! - [`reconcile`]: classifies every entry against the destination
//! - [`apply`]: copies a selection atomically and updates entries
//! - [`session`]: the interactive menu loop
//! - [`collab`]: file picker and volume discovery seams
//! - [`commands`]: CLI command implementations
//! - [`config`], [`logging`], [`lock`], [`output`]: ambient plumbing
//!
//! ## Example Usage
//!
//! ```no_run
//! use flashback::apply::{Applier, Selection};
//! use flashback::manifest::Manifest;
//! use flashback::reconcile::Reconciler;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let manifest_path = Path::new("/home/me/.local/share/flashback/metadata.txt");
//! let mut manifest = Manifest::load(manifest_path)?;
//!
//! let changes = Reconciler::new().classify(&manifest, Path::new("/media/me/USB"));
//! let result = Applier::new().apply(&mut manifest, &changes, &Selection::All);
//! if result.mutated() {
//!     manifest.save(manifest_path)?;
//! }
//! # Ok(())
//! # }
//! ```

/// Executing a selection: atomic copies and entry updates.
pub mod apply;

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// File picker and destination discovery.
pub mod collab;

/// Commands module containing all CLI command implementations.
pub mod commands;

/// Configuration loading, validation and key access.
pub mod config;

/// Error kinds of the core layers.
pub mod error;

/// Advisory locking of the manifest during a session.
pub mod lock;

/// Diagnostic logging setup.
pub mod logging;

/// The manifest model, file format and registry.
pub mod manifest;

/// Output formatting and progress display.
pub mod output;

/// Classification of entries against the destination.
pub mod reconcile;

/// Interactive selection loop.
pub mod session;

/// Utility functions and helpers.
pub mod utils;

use anyhow::{Context, Result};
use collab::VolumeLocator;
use std::path::{Path, PathBuf};

pub use error::Error;

/// Current version of the flashback binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default file name of the manifest, also used for its mirrored copy.
pub const MANIFEST_FILE: &str = "metadata.txt";

/// Central context for all flashback commands.
///
/// Holds the loaded configuration and the resolved manifest path and
/// destination override, after environment variables and command-line flags
/// have been applied.
///
/// # Examples
///
/// ```no_run
/// use flashback::FlashbackContext;
///
/// # fn main() -> anyhow::Result<()> {
/// // Default config location, environment overrides applied
/// let ctx = FlashbackContext::new()?;
///
/// // Explicit paths (for tests)
/// let ctx = FlashbackContext::new_explicit(
///     "/tmp/fb/metadata.txt".into(),
///     "/tmp/fb/config.toml".into(),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FlashbackContext {
    /// Path to the configuration file.
    pub config_path: PathBuf,

    /// Loaded configuration settings.
    pub config: config::Config,

    /// Manifest file in use.
    pub manifest_path: PathBuf,

    /// Destination root forced by `--dest`, bypassing discovery.
    pub dest_override: Option<PathBuf>,

    /// Never read from stdin (tests, scheduled triggers).
    pub non_interactive: bool,
}

impl FlashbackContext {
    /// Load the configuration from the default location and apply environment overrides.
    ///
    /// # Errors
    /// Returns an error if the configuration file cannot be read, created or parsed.
    pub fn new() -> Result<Self> {
        let config_path = config::default_config_path();
        let mut config = config::Config::load(&config_path)?;
        config.apply_env_overrides();

        Ok(Self {
            manifest_path: config.core.manifest_path.clone(),
            config_path,
            config,
            dest_override: None,
            non_interactive: false,
        })
    }

    /// Context with explicit paths; no environment lookups.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be loaded or created.
    pub fn new_explicit(manifest_path: PathBuf, config_path: PathBuf) -> Result<Self> {
        let mut config = config::Config::load(&config_path)?;
        config.core.manifest_path.clone_from(&manifest_path);

        Ok(Self {
            config_path,
            config,
            manifest_path,
            dest_override: None,
            non_interactive: true,
        })
    }

    /// Apply `--manifest` and `--dest`
    #[must_use]
    pub fn with_overrides(mut self, manifest: Option<PathBuf>, dest: Option<PathBuf>) -> Self {
        if let Some(manifest) = manifest {
            self.manifest_path = manifest;
        }
        if dest.is_some() {
            self.dest_override = dest;
        }
        self
    }

    /// Whether the manifest file exists.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.manifest_path.is_file()
    }

    /// Fails with [`Error::ManifestMissing`] if there is no manifest.
    ///
    /// # Errors
    /// Returns an error if the manifest does not exist.
    pub fn check_initialized(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(Error::ManifestMissing {
                path: self.manifest_path.clone(),
            })
            .context("Did you run 'flashback init'?");
        }
        Ok(())
    }

    /// Load the manifest, reporting skipped malformed blocks as warnings.
    ///
    /// # Errors
    /// Returns an error if the manifest is missing or unreadable.
    pub fn load_manifest(&self) -> Result<manifest::Manifest> {
        self.check_initialized()?;
        let report = manifest::Manifest::load_report(&self.manifest_path)?;
        for problem in &report.malformed {
            output::warning(&format!("Skipped: {problem}"));
        }
        Ok(report.manifest)
    }

    /// Find the destination root: `--dest`, else the configured locator.
    ///
    /// # Errors
    /// Returns an error if no destination is currently available.
    pub fn locate_destination(&self) -> Result<PathBuf> {
        let found = match &self.dest_override {
            Some(root) => collab::FixedRoot(root.clone()).find_removable_root(),
            None => self.config.volume_locator().find_removable_root(),
        };

        let fixed = self
            .dest_override
            .as_ref()
            .or(self.config.destination.root.as_ref());
        found.with_context(|| match fixed {
            Some(root) => format!("Destination not available: {}", root.display()),
            None => "No removable drive found; plug one in or pass --dest".to_string(),
        })
    }

    /// Reconciler configured from `[reconcile]`
    #[must_use]
    pub fn reconciler(&self) -> reconcile::Reconciler {
        reconcile::Reconciler::new()
            .with_hash_verification(self.config.reconcile.verify_hash)
            .with_manifest_path(&self.manifest_path)
    }

    /// Applier configured from `[reconcile]`
    #[must_use]
    pub const fn applier(&self) -> apply::Applier {
        apply::Applier::new().with_sync_writes(self.config.reconcile.sync_writes)
    }

    /// Take the session lock on the manifest.
    ///
    /// # Errors
    /// Returns an error if another session holds it past the configured timeout.
    pub fn lock(&self) -> Result<lock::SessionLock> {
        Ok(lock::SessionLock::acquire(
            &self.manifest_path,
            self.config.lock_timeout(),
        )?)
    }

    /// File name of the manifest, used for its mirrored copy.
    #[must_use]
    pub fn manifest_file_name(&self) -> String {
        self.manifest_path
            .file_name()
            .map_or_else(|| MANIFEST_FILE.to_string(), |n| n.to_string_lossy().to_string())
    }

    /// Where the mirrored manifest would live under `dest_root`.
    #[must_use]
    pub fn mirrored_manifest(&self, dest_root: &Path) -> PathBuf {
        dest_root.join(self.manifest_file_name())
    }
}
