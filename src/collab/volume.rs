use super::VolumeLocator;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A destination root configured up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedRoot(pub PathBuf);

impl VolumeLocator for FixedRoot {
    fn find_removable_root(&self) -> Option<PathBuf> {
        self.0.is_dir().then(|| self.0.clone())
    }
}

/// Picks the first mounted volume found under a list of mount directories.
///
/// Each search root is expected to hold one directory per mounted volume, as
/// `/media/$USER` and `/run/media/$USER` do on Linux and `/Volumes` on macOS.
/// Volumes are considered in name order so the choice is stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountScanner {
    search_roots: Vec<PathBuf>,
}

impl Default for MountScanner {
    fn default() -> Self {
        Self::new(Self::default_search_roots())
    }
}

impl MountScanner {
    /// Scanner over the given mount directories, in order
    #[must_use]
    pub const fn new(search_roots: Vec<PathBuf>) -> Self {
        Self { search_roots }
    }

    /// Usual removable-media mount points for the current user
    #[must_use]
    pub fn default_search_roots() -> Vec<PathBuf> {
        let user = crate::utils::get_current_user();
        vec![
            PathBuf::from("/media").join(&user),
            PathBuf::from("/run/media").join(&user),
            PathBuf::from("/Volumes"),
        ]
    }

    /// Directories searched
    #[must_use]
    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }
}

impl VolumeLocator for MountScanner {
    fn find_removable_root(&self) -> Option<PathBuf> {
        self.search_roots.iter().find_map(|root| first_volume(root))
    }
}

fn first_volume(mount_dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(mount_dir).ok()?;
    let mut volumes: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.path())
        // macOS lists the boot volume here too
        .filter(|p| !p.file_name().is_some_and(|n| n == "Macintosh HD"))
        .collect();
    volumes.sort();

    let found = volumes.into_iter().next();
    if let Some(volume) = &found {
        debug!(volume = %volume.display(), "found mounted volume");
    }
    found
}
