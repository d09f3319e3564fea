//! Text persistence for the manifest.
//!
//! Each entry is a block of `Key: Value` lines closed by a line of exactly
//! 40 dashes. Loading is lenient per block: a block that does not parse is
//! logged and skipped, the rest of the file still loads. Saving is atomic:
//! the new content goes to a temp file next to the target and is renamed
//! over it only once fully written and synced.

use super::{DestRel, Manifest, ManifestEntry, Stamp, validate_name};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Line that closes every entry block
pub const SEPARATOR: &str = "----------------------------------------";

const KEY_NAME: &str = "Name";
const KEY_FROM: &str = "From";
const KEY_MODIFIED: &str = "Modified";
const KEY_TO: &str = "To";
const KEY_BACKUP: &str = "Backup";
const KEY_SIZE: &str = "Size";
const KEY_HASH: &str = "Hash";

const KNOWN_KEYS: [&str; 7] = [
    KEY_NAME,
    KEY_FROM,
    KEY_MODIFIED,
    KEY_TO,
    KEY_BACKUP,
    KEY_SIZE,
    KEY_HASH,
];

/// Result of a lenient parse: the entries that loaded and the blocks that didn't
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Successfully parsed entries, in file order
    pub manifest: Manifest,
    /// One [`Error::MalformedEntry`] per skipped block
    pub malformed: Vec<Error>,
}

impl Manifest {
    /// Load a manifest from disk, skipping malformed blocks
    ///
    /// # Errors
    ///
    /// Returns [`Error::ManifestMissing`] if the file does not exist and
    /// [`Error::ManifestRead`] if it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_report(path).map(|report| report.manifest)
    }

    /// Load a manifest and report which blocks were skipped
    ///
    /// # Errors
    ///
    /// Same as [`Manifest::load`].
    pub fn load_report(path: &Path) -> Result<LoadReport> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ManifestMissing {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(Error::ManifestRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let report = parse(&content);
        debug!(
            path = %path.display(),
            entries = report.manifest.len(),
            skipped = report.malformed.len(),
            "loaded manifest"
        );
        Ok(report)
    }

    /// Atomically replace the manifest file with this manifest
    ///
    /// # Errors
    ///
    /// Returns [`Error::ManifestWrite`] if any step fails. The previous file
    /// is left intact in that case.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source| Error::ManifestWrite {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;

        let mut temp = NamedTempFile::new_in(&parent).map_err(write_err)?;
        temp.write_all(render(self).as_bytes()).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(path).map_err(|e| write_err(e.error))?;

        info!(path = %path.display(), entries = self.len(), "saved manifest");
        Ok(())
    }
}

/// Serialize every entry, each followed by the separator line
#[must_use]
pub fn render(manifest: &Manifest) -> String {
    let mut out = String::new();
    for entry in manifest {
        // Writing to a String cannot fail
        let _ = writeln!(out, "{KEY_NAME}: {}", entry.name);
        let _ = writeln!(out, "{KEY_FROM}: {}", entry.source_path.display());
        let _ = writeln!(
            out,
            "{KEY_MODIFIED}: {}",
            entry
                .source_modified
                .map_or_else(|| "null".to_string(), |s| s.to_string())
        );
        let _ = writeln!(out, "{KEY_TO}: {}", entry.dest_rel);
        let _ = writeln!(
            out,
            "{KEY_BACKUP}: {}",
            entry
                .last_backup
                .map_or_else(|| "never".to_string(), |s| s.to_string())
        );
        let _ = writeln!(out, "{KEY_SIZE}: {} bytes", entry.size);
        let _ = writeln!(
            out,
            "{KEY_HASH}: {}",
            entry.content_hash.as_deref().unwrap_or("null")
        );
        out.push_str(SEPARATOR);
        out.push('\n');
    }
    out
}

/// Parse manifest text, skipping blocks that do not form a valid entry
#[must_use]
pub fn parse(content: &str) -> LoadReport {
    let mut report = LoadReport::default();

    for (index, block) in split_blocks(content).iter().enumerate() {
        let block_no = index + 1;
        let parsed = parse_block(block_no, block).and_then(|entry| {
            if report.manifest.find(&entry.name).is_some() {
                Err(malformed(block_no, format!("duplicate name '{}'", entry.name)))
            } else {
                Ok(entry)
            }
        });

        match parsed {
            Ok(entry) => {
                // Uniqueness was checked just above
                let _ = report.manifest.add(entry);
            }
            Err(e) => {
                warn!("{e}, skipping");
                report.malformed.push(e);
            }
        }
    }

    report
}

fn split_blocks(content: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim() == SEPARATOR {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else if !line.trim().is_empty() {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn malformed(block: usize, reason: impl Into<String>) -> Error {
    Error::MalformedEntry {
        block,
        reason: reason.into(),
    }
}

/// Split `Key: value` at the first `": "`. The value is returned verbatim:
/// names and paths may begin or end with spaces.
fn split_field(line: &str) -> Option<(&str, &str)> {
    let (key, value) = match line.split_once(": ") {
        Some(pair) => pair,
        None => (line.trim_end().strip_suffix(':')?, ""),
    };
    let key = key.trim_start();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value))
}

fn is_null(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("null")
}

fn parse_block(block_no: usize, lines: &[&str]) -> Result<ManifestEntry> {
    let mut fields: HashMap<&str, &str> = HashMap::new();

    for line in lines {
        let (key, value) =
            split_field(line).ok_or_else(|| malformed(block_no, format!("bad line '{line}'")))?;

        if !KNOWN_KEYS.contains(&key) {
            debug!(block = block_no, key, "ignoring unknown manifest key");
            continue;
        }
        if fields.insert(key, value).is_some() {
            return Err(malformed(block_no, format!("duplicate key '{key}'")));
        }
    }

    let name = fields
        .get(KEY_NAME)
        .copied()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| malformed(block_no, "missing Name"))?;
    validate_name(name).map_err(|e| malformed(block_no, e.to_string()))?;

    let source_path = fields
        .get(KEY_FROM)
        .copied()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| malformed(block_no, "missing From"))?;

    let field = |key: &str| fields.get(key).map(|v| v.trim());

    let source_modified = match field(KEY_MODIFIED) {
        None => None,
        Some(v) if is_null(v) => None,
        Some(v) => Some(
            Stamp::parse(v).ok_or_else(|| malformed(block_no, format!("bad Modified '{v}'")))?,
        ),
    };

    let dest_rel = match field(KEY_TO) {
        None => DestRel::Root,
        Some(v) => DestRel::parse(v).map_err(|e| malformed(block_no, e.to_string()))?,
    };

    let last_backup = match field(KEY_BACKUP) {
        None => None,
        Some(v) if is_null(v) || v.eq_ignore_ascii_case("never") => None,
        Some(v) => Some(
            Stamp::parse(v).ok_or_else(|| malformed(block_no, format!("bad Backup '{v}'")))?,
        ),
    };

    let size = match field(KEY_SIZE) {
        None => 0,
        Some(v) => {
            let digits = v.strip_suffix("bytes").unwrap_or(v).trim();
            if is_null(digits) {
                0
            } else {
                digits
                    .parse()
                    .map_err(|_| malformed(block_no, format!("bad Size '{v}'")))?
            }
        }
    };

    let content_hash = match field(KEY_HASH) {
        None => None,
        Some(v) if is_null(v) => None,
        Some(v) if v.chars().all(|c| c.is_ascii_hexdigit()) => Some(v.to_ascii_lowercase()),
        Some(v) => return Err(malformed(block_no, format!("bad Hash '{v}'"))),
    };

    Ok(ManifestEntry {
        name: name.to_string(),
        source_path: PathBuf::from(source_path),
        dest_rel,
        source_modified,
        last_backup,
        size,
        content_hash,
    })
}
