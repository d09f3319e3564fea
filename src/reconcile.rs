//! Classification of every tracked file against the destination.
//!
//! A pass is read-only: it stats sources and mirrors, optionally re-hashes
//! sources, and produces a [`ChangeSet`] with one [`Change`] per manifest
//! entry, in manifest order.
//!
//! Per entry, first match wins:
//!
//! 1. source missing or unreadable: [`SyncStatus::MissingSource`]
//! 2. mirror missing: [`SyncStatus::Add`]
//! 3. source modified strictly after the mirror: [`SyncStatus::Update`]
//! 4. hash verification on, a recorded hash, and the source no longer
//!    matches it: [`SyncStatus::Update`] (never applied to the manifest's
//!    own entry, see [`Reconciler::with_manifest_path`])
//! 5. otherwise: [`SyncStatus::Current`]

use crate::manifest::{Manifest, ManifestEntry};
use crate::utils::hash::verify_hash;
use colored::{ColoredString, Colorize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Synchronization status of one tracked file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// The source is gone or unreadable; needs a fixed path or removal
    MissingSource,
    /// No mirror on the destination yet
    Add,
    /// The mirror is stale
    Update,
    /// The mirror is up to date
    Current,
}

impl SyncStatus {
    /// Whether applying this change would copy anything
    #[must_use]
    pub const fn is_actionable(self) -> bool {
        matches!(self, Self::Add | Self::Update)
    }

    /// Short label for listings
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MissingSource => "missing source",
            Self::Add => "add",
            Self::Update => "update",
            Self::Current => "current",
        }
    }

    /// Single-character code for short listings
    #[must_use]
    pub const fn short_char(self) -> char {
        match self {
            Self::MissingSource => '!',
            Self::Add => 'A',
            Self::Update => 'U',
            Self::Current => ' ',
        }
    }

    /// Label colored by severity
    #[must_use]
    pub fn colored_label(self) -> ColoredString {
        match self {
            Self::MissingSource => self.label().red().bold(),
            Self::Add => self.label().green(),
            Self::Update => self.label().yellow(),
            Self::Current => self.label().dimmed(),
        }
    }
}

/// Classification of one manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// 1-based position of the entry in the manifest
    pub position: usize,
    /// Entry name at classification time
    pub name: String,
    /// Source path at classification time
    pub source_path: PathBuf,
    /// Where the mirror lives
    pub dest_path: PathBuf,
    /// Classified status
    pub status: SyncStatus,
}

/// Result of one classification pass, in manifest order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Number of changes (equals the manifest length at classification)
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether the pass covered no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Change at a 1-based position
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Change> {
        position.checked_sub(1).and_then(|i| self.changes.get(i))
    }

    /// Iterate changes in order
    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    /// Changes that would copy something
    pub fn actionable(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.status.is_actionable())
    }

    /// How many changes have the given status
    #[must_use]
    pub fn count(&self, status: SyncStatus) -> usize {
        self.changes.iter().filter(|c| c.status == status).count()
    }

    /// Whether every mirror is current (missing sources aside)
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.actionable().next().is_none()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Classifies manifest entries against a destination root
#[derive(Debug, Clone)]
pub struct Reconciler {
    verify_hash: bool,
    manifest_path: Option<PathBuf>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    /// Reconciler with hash verification enabled
    #[must_use]
    pub const fn new() -> Self {
        Self {
            verify_hash: true,
            manifest_path: None,
        }
    }

    /// Toggle re-hashing of sources whose timestamps look unchanged
    #[must_use]
    pub const fn with_hash_verification(mut self, verify_hash: bool) -> Self {
        self.verify_hash = verify_hash;
        self
    }

    /// Mark the entry whose source is this manifest file.
    ///
    /// That entry is judged on timestamps only: its recorded digest is
    /// written into the very file it describes, so it can never match.
    #[must_use]
    pub fn with_manifest_path(mut self, manifest_path: &Path) -> Self {
        self.manifest_path = Some(absolute(manifest_path));
        self
    }

    /// Whether `entry` tracks the manifest file itself
    #[must_use]
    pub fn is_manifest_entry(&self, entry: &ManifestEntry) -> bool {
        self.manifest_path
            .as_deref()
            .is_some_and(|path| absolute(&entry.source_path) == path)
    }

    /// Classify every entry of `manifest` against `dest_root`
    #[must_use]
    pub fn classify(&self, manifest: &Manifest, dest_root: &Path) -> ChangeSet {
        let changes = manifest
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let dest_path = entry.dest_path(dest_root);
                let status = self.classify_entry(entry, &dest_path);
                debug!(name = %entry.name, status = status.label(), "classified");
                Change {
                    position: index + 1,
                    name: entry.name.clone(),
                    source_path: entry.source_path.clone(),
                    dest_path,
                    status,
                }
            })
            .collect();

        ChangeSet { changes }
    }

    fn classify_entry(&self, entry: &ManifestEntry, dest_path: &Path) -> SyncStatus {
        let source_meta = match std::fs::metadata(&entry.source_path) {
            Ok(meta) if meta.is_file() => meta,
            _ => return SyncStatus::MissingSource,
        };

        let Ok(dest_meta) = std::fs::metadata(dest_path) else {
            return SyncStatus::Add;
        };
        if !dest_meta.is_file() {
            // A directory squatting on the mirror path; the copy will report it
            return SyncStatus::Add;
        }

        let source_time = source_modified_time(entry, &source_meta);
        if let (Some(source_time), Ok(dest_time)) = (source_time, dest_meta.modified())
            && source_time > dest_time
        {
            return SyncStatus::Update;
        }

        if self.verify_hash
            && !self.is_manifest_entry(entry)
            && let Some(recorded) = entry.content_hash.as_deref()
        {
            return match verify_hash(&entry.source_path, recorded) {
                Ok(true) => SyncStatus::Current,
                Ok(false) => SyncStatus::Update,
                Err(_) => SyncStatus::MissingSource,
            };
        }

        SyncStatus::Current
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Fresh source mtime, or the recorded one when the filesystem has none
fn source_modified_time(entry: &ManifestEntry, meta: &std::fs::Metadata) -> Option<SystemTime> {
    meta.modified().ok().or_else(|| {
        entry
            .source_modified
            .and_then(|stamp| {
                stamp
                    .naive()
                    .and_local_timezone(chrono::Local)
                    .earliest()
            })
            .map(SystemTime::from)
    })
}
