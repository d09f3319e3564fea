//! Executing a user selection from a [`ChangeSet`].
//!
//! Each selected `Add`/`Update` change is copied on its own: directories are
//! created as needed, the source is streamed into a temp file beside the
//! mirror and renamed into place, and only then is the manifest entry
//! updated. A failure affects that one entry; the rest of the selection
//! still runs. Nothing here saves the manifest.

use crate::error::{Error, Result};
use crate::manifest::{Manifest, Stamp};
use crate::reconcile::{ChangeSet, SyncStatus};
use crate::utils::hash::{CHUNK_SIZE, HashingReader};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Which changes to apply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Apply nothing
    #[default]
    None,
    /// Every actionable change
    All,
    /// Explicit 1-based positions, duplicates removed, first-seen order
    Indices(Vec<usize>),
}

impl Selection {
    /// Build an explicit selection, dropping repeated positions
    #[must_use]
    pub fn indices(positions: impl IntoIterator<Item = usize>) -> Self {
        let mut seen = HashSet::new();
        let positions: Vec<usize> = positions.into_iter().filter(|p| seen.insert(*p)).collect();
        if positions.is_empty() {
            Self::None
        } else {
            Self::Indices(positions)
        }
    }
}

/// What happened to one selected position
#[derive(Debug)]
pub enum Outcome {
    /// The file was mirrored and its entry updated
    Copied {
        /// Bytes written to the destination
        bytes: u64,
    },
    /// Selected, but its status needs no copy
    NoActionTaken(SyncStatus),
    /// The position does not refer to a classified entry
    IndexSkipped,
    /// The copy failed; the entry was left as it was
    CopyFailed(Error),
}

/// Outcome for one selected position
#[derive(Debug)]
pub struct EntryOutcome {
    /// 1-based position as selected
    pub position: usize,
    /// Entry name, when the position resolved to one
    pub name: Option<String>,
    /// What happened
    pub outcome: Outcome,
}

/// Applied/skipped/failed counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Files copied
    pub applied: usize,
    /// Positions skipped (no action needed or invalid index)
    pub skipped: usize,
    /// Copies that failed
    pub failed: usize,
}

/// Per-position results of one [`Applier::apply`] call
#[derive(Debug, Default)]
pub struct AppliedResult {
    /// Outcomes in processing order
    pub outcomes: Vec<EntryOutcome>,
}

impl AppliedResult {
    /// Counts per outcome class
    #[must_use]
    pub fn summary(&self) -> Summary {
        self.outcomes
            .iter()
            .fold(Summary::default(), |mut acc, o| {
                match o.outcome {
                    Outcome::Copied { .. } => acc.applied += 1,
                    Outcome::NoActionTaken(_) | Outcome::IndexSkipped => acc.skipped += 1,
                    Outcome::CopyFailed(_) => acc.failed += 1,
                }
                acc
            })
    }

    /// Whether any entry was updated (and the manifest needs saving)
    #[must_use]
    pub fn mutated(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.outcome, Outcome::Copied { .. }))
    }
}

/// Copies selected changes to the destination and updates the manifest in memory
#[derive(Debug, Clone, Copy)]
pub struct Applier {
    sync_writes: bool,
}

impl Default for Applier {
    fn default() -> Self {
        Self::new()
    }
}

impl Applier {
    /// Applier that fsyncs every copy before renaming it into place
    #[must_use]
    pub const fn new() -> Self {
        Self { sync_writes: true }
    }

    /// Toggle fsync of each copy
    #[must_use]
    pub const fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Apply `selection` from `changes`, updating entries of `manifest` on success
    pub fn apply(
        &self,
        manifest: &mut Manifest,
        changes: &ChangeSet,
        selection: &Selection,
    ) -> AppliedResult {
        self.apply_with(manifest, changes, selection, |_, _| {})
    }

    /// Like [`Applier::apply`], calling `on_outcome(done, total)` after each position
    pub fn apply_with<F>(
        &self,
        manifest: &mut Manifest,
        changes: &ChangeSet,
        selection: &Selection,
        mut on_outcome: F,
    ) -> AppliedResult
    where
        F: FnMut(usize, usize),
    {
        let positions: Vec<usize> = match selection {
            Selection::None => Vec::new(),
            Selection::All => changes.actionable().map(|c| c.position).collect(),
            Selection::Indices(positions) => positions.clone(),
        };

        let total = positions.len();
        let mut outcomes = Vec::with_capacity(total);
        for position in positions {
            outcomes.push(self.apply_one(manifest, changes, position));
            on_outcome(outcomes.len(), total);
        }

        AppliedResult { outcomes }
    }

    fn apply_one(&self, manifest: &mut Manifest, changes: &ChangeSet, position: usize) -> EntryOutcome {
        let Some(change) = changes.get(position) else {
            debug!(position, "selected position out of range");
            return EntryOutcome {
                position,
                name: None,
                outcome: Outcome::IndexSkipped,
            };
        };

        let outcome = if !change.status.is_actionable() {
            Outcome::NoActionTaken(change.status)
        } else if manifest
            .get(position)
            .is_none_or(|entry| entry.name != change.name)
        {
            // The manifest was edited after this change-set was computed
            Outcome::IndexSkipped
        } else {
            match self.copy(&change.source_path, &change.dest_path) {
                Ok(copied) => {
                    if let Some(entry) = manifest.entry_mut(position) {
                        entry.last_backup = Some(Stamp::now());
                        entry.content_hash = Some(copied.digest);
                        entry.size = copied.bytes;
                        if let Some(modified) = copied.modified {
                            entry.source_modified = Some(Stamp::from_system_time(modified));
                        }
                    }
                    debug!(name = %change.name, bytes = copied.bytes, "copied");
                    Outcome::Copied {
                        bytes: copied.bytes,
                    }
                }
                Err(e) => {
                    warn!(name = %change.name, "copy failed: {e}");
                    Outcome::CopyFailed(e)
                }
            }
        };

        EntryOutcome {
            position,
            name: Some(change.name.clone()),
            outcome,
        }
    }

    /// Atomically mirror one file outside of a change-set, returning the bytes written
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceUnavailable`] or [`Error::DestinationUnavailable`];
    /// the destination is untouched on failure.
    pub fn copy_file(&self, source: &Path, dest: &Path) -> Result<u64> {
        self.copy(source, dest).map(|copied| copied.bytes)
    }

    fn copy(&self, source_path: &Path, dest_path: &Path) -> Result<Copied> {
        let dest_dir = dest_path.parent().unwrap_or_else(|| Path::new("."));
        let dest_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| Error::DestinationUnavailable { path, source }
        };
        let source_err = |source| Error::SourceUnavailable {
            path: source_path.to_path_buf(),
            source,
        };

        fs::create_dir_all(dest_dir).map_err(dest_err(dest_dir))?;

        let source = File::open(source_path).map_err(source_err)?;
        let modified = source.metadata().and_then(|m| m.modified()).ok();
        let mut reader = HashingReader::new(source);
        let mut temp = NamedTempFile::new_in(dest_dir).map_err(dest_err(dest_dir))?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buffer).map_err(source_err)?;
            if n == 0 {
                break;
            }
            temp.write_all(&buffer[..n])
                .map_err(dest_err(dest_path))?;
        }
        temp.flush().map_err(dest_err(dest_path))?;
        if self.sync_writes {
            temp.as_file()
                .sync_all()
                .map_err(dest_err(dest_path))?;
        }
        temp.persist(dest_path)
            .map_err(|e| dest_err(dest_path)(e.error))?;

        Ok(Copied {
            bytes: reader.bytes_read(),
            digest: reader.finish(),
            modified,
        })
    }
}

/// What a successful copy observed
struct Copied {
    bytes: u64,
    digest: String,
    modified: Option<std::time::SystemTime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestEntry;
    use crate::reconcile::Reconciler;
    use crate::utils::hash::hash_bytes;
    use filetime::{FileTime, set_file_mtime};
    use std::path::PathBuf;

    fn setup(files: &[(&str, &str)]) -> anyhow::Result<(tempfile::TempDir, PathBuf, Manifest)> {
        let dir = tempfile::tempdir()?;
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::create_dir_all(&src)?;
        fs::create_dir_all(&dest)?;

        let mut manifest = Manifest::new();
        for (name, content) in files {
            let path = src.join(name);
            fs::write(&path, content)?;
            manifest.add(ManifestEntry::from_source(&path)?)?;
        }
        Ok((dir, dest, manifest))
    }

    #[test]
    fn test_selection_indices_dedup() {
        assert_eq!(
            Selection::indices([3, 1, 3, 2, 1]),
            Selection::Indices(vec![3, 1, 2])
        );
        assert_eq!(Selection::indices([]), Selection::None);
    }

    #[test]
    fn test_empty_selection_is_noop() -> anyhow::Result<()> {
        let (_dir, dest, mut manifest) = setup(&[("a.txt", "alpha")])?;
        let before = manifest.clone();
        let changes = Reconciler::new().classify(&manifest, &dest);

        let result = Applier::new().apply(&mut manifest, &changes, &Selection::None);
        assert!(result.outcomes.is_empty());
        assert!(!result.mutated());
        assert_eq!(manifest, before);
        assert!(!dest.join("a.txt").exists());
        Ok(())
    }

    #[test]
    fn test_copy_updates_entry() -> anyhow::Result<()> {
        let (_dir, dest, mut manifest) = setup(&[("a.txt", "alpha")])?;
        let changes = Reconciler::new().classify(&manifest, &dest);

        let result = Applier::new().apply(&mut manifest, &changes, &Selection::indices([1]));
        assert_eq!(
            result.summary(),
            Summary {
                applied: 1,
                skipped: 0,
                failed: 0
            }
        );
        assert!(result.mutated());
        assert_eq!(fs::read_to_string(dest.join("a.txt"))?, "alpha");

        let entry = manifest.get(1).expect("entry");
        assert!(entry.last_backup.is_some());
        assert_eq!(entry.content_hash, Some(hash_bytes(b"alpha")));
        assert_eq!(entry.size, 5);
        Ok(())
    }

    #[test]
    fn test_copy_creates_directories_and_is_byte_exact() -> anyhow::Result<()> {
        let binary: Vec<u8> = (0..=255u8).cycle().take(CHUNK_SIZE * 2 + 3).collect();
        let dir = tempfile::tempdir()?;
        let src = dir.path().join("blob.bin");
        fs::write(&src, &binary)?;
        let dest = dir.path().join("dest");

        let mut entry = ManifestEntry::from_source(&src)?;
        entry.dest_rel = crate::manifest::DestRel::parse("deep/nested")?;
        let mut manifest = Manifest::new();
        manifest.add(entry)?;

        let changes = Reconciler::new().classify(&manifest, &dest);
        let result = Applier::new().apply(&mut manifest, &changes, &Selection::All);
        assert_eq!(result.summary().applied, 1);
        assert_eq!(fs::read(dest.join("deep/nested/blob.bin"))?, binary);
        Ok(())
    }

    #[test]
    fn test_out_of_range_positions_are_skipped_individually() -> anyhow::Result<()> {
        let (_dir, dest, mut manifest) = setup(&[("a.txt", "alpha"), ("b.txt", "beta")])?;
        let changes = Reconciler::new().classify(&manifest, &dest);

        let result =
            Applier::new().apply(&mut manifest, &changes, &Selection::indices([0, 2, 9]));
        let kinds: Vec<_> = result
            .outcomes
            .iter()
            .map(|o| (o.position, matches!(o.outcome, Outcome::IndexSkipped)))
            .collect();
        assert_eq!(kinds, vec![(0, true), (2, false), (9, true)]);
        assert_eq!(result.summary().applied, 1);
        assert!(dest.join("b.txt").exists());
        assert!(!dest.join("a.txt").exists());
        Ok(())
    }

    #[test]
    fn test_current_and_missing_take_no_action() -> anyhow::Result<()> {
        let (dir, dest, mut manifest) = setup(&[("a.txt", "alpha")])?;
        manifest.add(ManifestEntry::new("gone.txt", dir.path().join("src/gone.txt")))?;
        fs::write(dest.join("a.txt"), "alpha")?;
        set_file_mtime(dest.join("a.txt"), FileTime::from_unix_time(4_000_000_000, 0))?;
        let before = manifest.clone();

        let changes = Reconciler::new().classify(&manifest, &dest);
        let result = Applier::new().apply(&mut manifest, &changes, &Selection::indices([1, 2]));

        assert!(matches!(
            result.outcomes[0].outcome,
            Outcome::NoActionTaken(SyncStatus::Current)
        ));
        assert!(matches!(
            result.outcomes[1].outcome,
            Outcome::NoActionTaken(SyncStatus::MissingSource)
        ));
        assert!(!result.mutated());
        assert_eq!(manifest, before);
        Ok(())
    }

    #[test]
    fn test_select_all_skips_non_actionable() -> anyhow::Result<()> {
        let (dir, dest, mut manifest) = setup(&[("a.txt", "alpha"), ("b.txt", "beta")])?;
        manifest.add(ManifestEntry::new("gone.txt", dir.path().join("src/gone.txt")))?;

        let changes = Reconciler::new().classify(&manifest, &dest);
        let result = Applier::new().apply(&mut manifest, &changes, &Selection::All);
        let names: Vec<_> = result
            .outcomes
            .iter()
            .filter_map(|o| o.name.as_deref())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        Ok(())
    }

    #[test]
    fn test_failed_copy_leaves_entry_and_continues() -> anyhow::Result<()> {
        let (dir, dest, mut manifest) = setup(&[("a.txt", "alpha"), ("b.txt", "beta")])?;
        let changes = Reconciler::new().classify(&manifest, &dest);
        // Source vanishes between classification and apply
        fs::remove_file(dir.path().join("src/a.txt"))?;
        let before_a = manifest.get(1).cloned();

        let result = Applier::new().apply(&mut manifest, &changes, &Selection::All);
        assert!(matches!(
            result.outcomes[0].outcome,
            Outcome::CopyFailed(Error::SourceUnavailable { .. })
        ));
        assert!(matches!(result.outcomes[1].outcome, Outcome::Copied { .. }));
        assert_eq!(manifest.get(1).cloned(), before_a);
        assert!(manifest.get(2).and_then(|e| e.last_backup).is_some());
        assert_eq!(
            result.summary(),
            Summary {
                applied: 1,
                skipped: 0,
                failed: 1
            }
        );
        Ok(())
    }

    #[test]
    fn test_stale_change_set_is_skipped() -> anyhow::Result<()> {
        let (_dir, dest, mut manifest) = setup(&[("a.txt", "alpha"), ("b.txt", "beta")])?;
        let changes = Reconciler::new().classify(&manifest, &dest);
        manifest.remove(1)?;

        let result = Applier::new().apply(&mut manifest, &changes, &Selection::indices([1]));
        assert!(matches!(result.outcomes[0].outcome, Outcome::IndexSkipped));
        assert!(!dest.join("a.txt").exists());
        assert!(!dest.join("b.txt").exists());
        Ok(())
    }
}
