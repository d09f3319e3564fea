//! The manifest: an ordered list of tracked files and what was last seen of them.
//!
//! # Architecture
//!
//! - [`ManifestEntry`] is one tracked file: where it comes from, where its
//!   mirror lives under the destination root, and the metadata observed at
//!   the last add or copy.
//! - [`Manifest`] keeps entries in insertion order. Positions are 1-based
//!   everywhere they reach the user, matching the listing.
//! - [`store`] reads and writes the line-oriented text format, always
//!   atomically.
//! - [`registry`] adds and removes entries while keeping names unique.
//!
//! Nothing in this module touches the destination volume.

pub mod registry;
pub mod store;

use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, SubsecRound, TimeZone};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

pub use store::{LoadReport, SEPARATOR};

/// A wall-clock timestamp with one-second resolution, in local time.
///
/// Sub-second precision is dropped on construction so a stamp survives a
/// save/load cycle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp(NaiveDateTime);

impl Stamp {
    /// On-disk format
    pub const FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    /// The current time
    #[must_use]
    pub fn now() -> Self {
        Self::from_local(Local::now())
    }

    /// Convert a filesystem timestamp
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        Self::from_local(DateTime::<Local>::from(time))
    }

    fn from_local(datetime: DateTime<Local>) -> Self {
        Self(datetime.naive_local().trunc_subsecs(0))
    }

    /// Parse a stored value.
    ///
    /// Accepts the canonical `YYYY-MM-DD HH:MM:SS` form and, for manifests
    /// written by older tooling, fractional Unix seconds.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, Self::FORMAT) {
            return Some(Self(naive));
        }

        let seconds: f64 = value.parse().ok()?;
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let whole = seconds.trunc() as i64;
        Local.timestamp_opt(whole, 0).single().map(Self::from_local)
    }

    /// The underlying local date and time
    #[must_use]
    pub const fn naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

/// Directory of a mirrored copy, relative to the destination root.
///
/// `null`, `/` and an empty value all mean the root itself; the root is
/// always written back as `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DestRel {
    /// Directly under the destination root
    #[default]
    Root,
    /// A subdirectory of the destination root
    Dir(PathBuf),
}

impl DestRel {
    /// Parse a stored `To:` value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for values with `..` components or a
    /// drive/root prefix after trimming, which would escape the destination root.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("null") {
            return Ok(Self::Root);
        }

        let trimmed = value.trim_matches(|c| c == '/' || c == '\\');
        if trimmed.is_empty() {
            return Ok(Self::Root);
        }

        let path = PathBuf::from(trimmed.replace('\\', "/"));
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => {
                    return Err(Error::InvalidPath {
                        value: value.to_string(),
                        reason: "parent traversal not allowed",
                    });
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::InvalidPath {
                        value: value.to_string(),
                        reason: "must be relative to the destination root",
                    });
                }
            }
        }

        Ok(Self::Dir(path))
    }

    /// Resolve the directory under `root`
    #[must_use]
    pub fn under(&self, root: &Path) -> PathBuf {
        match self {
            Self::Root => root.to_path_buf(),
            Self::Dir(dir) => root.join(dir),
        }
    }
}

impl fmt::Display for DestRel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("/"),
            Self::Dir(dir) => write!(f, "{}", dir.to_string_lossy().replace('\\', "/")),
        }
    }
}

/// One tracked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// File name of the mirrored copy; unique within a manifest
    pub name: String,
    /// Absolute path of the original
    pub source_path: PathBuf,
    /// Directory of the mirror relative to the destination root
    pub dest_rel: DestRel,
    /// Source modification time at last observation
    pub source_modified: Option<Stamp>,
    /// Time of the last successful copy, `None` if never backed up
    pub last_backup: Option<Stamp>,
    /// Source size in bytes at last observation
    pub size: u64,
    /// Source content digest at last observation
    pub content_hash: Option<String>,
}

impl ManifestEntry {
    /// Create an entry with sentinel metadata
    #[must_use]
    pub fn new(name: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            dest_rel: DestRel::Root,
            source_modified: None,
            last_backup: None,
            size: 0,
            content_hash: None,
        }
    }

    /// Where the mirrored copy lives under `dest_root`
    #[must_use]
    pub fn dest_path(&self, dest_root: &Path) -> PathBuf {
        self.dest_rel.under(dest_root).join(&self.name)
    }

    /// Whether at least one copy has succeeded
    #[must_use]
    pub const fn is_backed_up(&self) -> bool {
        self.last_backup.is_some()
    }
}

/// Check that a name is a single path component
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] when the name is empty, `.`/`..`, contains
/// a separator or a line break.
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("name cannot be empty")
    } else if name == "." || name == ".." {
        Some("name cannot be a relative directory")
    } else if name.contains(['/', '\\']) {
        Some("name cannot contain path separators")
    } else if name.contains(['\n', '\r']) {
        Some("name cannot contain line breaks")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidPath {
            value: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Ordered collection of tracked files.
///
/// Names are unique; order is exactly insertion order and is never resorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Create an empty manifest
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in order
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Iterate entries in order
    pub fn iter(&self) -> std::slice::Iter<'_, ManifestEntry> {
        self.entries.iter()
    }

    /// Mutable access by 1-based position. Crate-private so names stay unique.
    pub(crate) fn entry_mut(&mut self, position: usize) -> Option<&mut ManifestEntry> {
        position
            .checked_sub(1)
            .and_then(|index| self.entries.get_mut(index))
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dest_rel_root_sentinels() -> anyhow::Result<()> {
        for value in ["null", "NULL", "/", "", "  ", "\\", "//"] {
            assert_eq!(DestRel::parse(value)?, DestRel::Root, "value {value:?}");
        }
        assert_eq!(DestRel::Root.to_string(), "/");
        Ok(())
    }

    #[test]
    fn test_dest_rel_subdirectory() -> anyhow::Result<()> {
        let rel = DestRel::parse("/docs/2024/")?;
        assert_eq!(rel, DestRel::Dir(PathBuf::from("docs/2024")));
        assert_eq!(rel.to_string(), "docs/2024");

        let windows = DestRel::parse("docs\\work")?;
        assert_eq!(windows, DestRel::Dir(PathBuf::from("docs/work")));
        Ok(())
    }

    #[test]
    fn test_dest_rel_rejects_traversal() {
        assert!(DestRel::parse("../outside").is_err());
        assert!(DestRel::parse("docs/../../etc").is_err());
    }

    #[test]
    fn test_dest_path() -> anyhow::Result<()> {
        let mut entry = ManifestEntry::new("a.txt", "/home/user/a.txt");
        assert_eq!(
            entry.dest_path(Path::new("/media/usb")),
            PathBuf::from("/media/usb/a.txt")
        );

        entry.dest_rel = DestRel::parse("notes")?;
        assert_eq!(
            entry.dest_path(Path::new("/media/usb")),
            PathBuf::from("/media/usb/notes/a.txt")
        );
        Ok(())
    }

    #[test]
    fn test_stamp_format_round_trip() {
        let stamp = Stamp::parse("2024-12-25 10:30:05").expect("canonical stamp");
        assert_eq!(stamp.to_string(), "2024-12-25 10:30:05");
        assert_eq!(Stamp::parse(&stamp.to_string()), Some(stamp));
    }

    #[test]
    fn test_stamp_drops_subseconds() {
        let now = Stamp::now();
        assert_eq!(Stamp::parse(&now.to_string()), Some(now));
    }

    #[test]
    fn test_stamp_accepts_epoch_seconds() {
        assert!(Stamp::parse("1735123456.789").is_some());
        assert!(Stamp::parse("-5").is_none());
        assert!(Stamp::parse("yesterday").is_none());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.docx").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("line\nbreak").is_err());
    }
}
