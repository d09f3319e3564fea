//! Adding, removing and looking up manifest entries.
//!
//! The registry only mutates memory. Callers save the manifest right after
//! each successful mutation.

use super::{DestRel, Manifest, ManifestEntry, Stamp, validate_name};
use crate::error::{Error, Result};
use crate::utils::hash::{hash_bytes, hash_file};
use std::path::Path;
use tracing::debug;

impl Manifest {
    /// Append an entry, keeping names unique.
    ///
    /// Returns the 1-based position of the new entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if an entry with the same name exists
    /// and [`Error::InvalidPath`] if the name is not a single path component.
    /// The manifest is unchanged in both cases.
    pub fn add(&mut self, entry: ManifestEntry) -> Result<usize> {
        validate_name(&entry.name)?;
        if self.find(&entry.name).is_some() {
            return Err(Error::DuplicateName { name: entry.name });
        }

        debug!(name = %entry.name, source = %entry.source_path.display(), "adding entry");
        self.entries.push(entry);
        Ok(self.entries.len())
    }

    /// Remove the entry at a 1-based position and return it
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index` is outside `[1, len]`.
    pub fn remove(&mut self, index: usize) -> Result<ManifestEntry> {
        if index == 0 || index > self.entries.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }

        let removed = self.entries.remove(index - 1);
        debug!(name = %removed.name, index, "removed entry");
        Ok(removed)
    }

    /// Entry at a 1-based position
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ManifestEntry> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Entry with this exact (case-sensitive) name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// 1-based position of the entry with this name
    #[must_use]
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name).map(|i| i + 1)
    }
}

impl ManifestEntry {
    /// Build an entry for a file about to be tracked.
    ///
    /// Captures the current modification time, size and content digest. The
    /// mirror goes directly under the destination root and is marked as never
    /// backed up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceUnavailable`] if the file cannot be read and
    /// [`Error::InvalidPath`] if it has no usable file name.
    pub fn from_source(path: &Path) -> Result<Self> {
        let unavailable = |source| Error::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        };

        let metadata = std::fs::metadata(path).map_err(unavailable)?;
        if !metadata.is_file() {
            return Err(unavailable(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::InvalidPath {
                value: path.display().to_string(),
                reason: "path has no file name",
            })?;

        let source_path = std::path::absolute(path).map_err(unavailable)?;

        Ok(Self {
            name,
            source_path,
            dest_rel: DestRel::Root,
            source_modified: metadata.modified().ok().map(Stamp::from_system_time),
            last_backup: None,
            size: metadata.len(),
            content_hash: Some(hash_file(path)?),
        })
    }

    /// The entry describing the manifest file itself.
    ///
    /// Written once when a manifest is initialized, before the file has any
    /// content, so its metadata are the empty-file sentinels.
    #[must_use]
    pub fn self_entry(manifest_path: &Path) -> Self {
        let name = manifest_path.file_name().map_or_else(
            || crate::MANIFEST_FILE.to_string(),
            |n| n.to_string_lossy().to_string(),
        );

        let source_path =
            std::path::absolute(manifest_path).unwrap_or_else(|_| manifest_path.to_path_buf());
        let mut entry = Self::new(name, source_path);
        entry.content_hash = Some(hash_bytes(b""));
        entry
    }
}
