//! Advisory lock guarding one `load -> mutate -> save` sequence.
//!
//! Two sessions over the same manifest would otherwise overwrite each
//! other's saves. The lock is `<manifest>.lock` beside the manifest, held
//! with an exclusive `fs4` lock and released when the guard drops. The file
//! is left in place so every contender locks the same inode.

use crate::error::{Error, Result};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

/// Exclusive hold on a manifest; released on drop
#[derive(Debug)]
pub struct SessionLock {
    /// Locked handle
    lock_file: File,
    /// Path of the lock file
    lock_path: PathBuf,
}

impl SessionLock {
    /// Lock file used for a manifest
    #[must_use]
    pub fn path_for(manifest_path: &Path) -> PathBuf {
        let mut name = manifest_path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| crate::MANIFEST_FILE.into());
        name.push(".lock");
        manifest_path.with_file_name(name)
    }

    /// Take the lock, retrying until `timeout` elapses
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lock`] if another process still holds it after
    /// `timeout`, or an I/O error if the lock file cannot be created.
    pub fn acquire(manifest_path: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = Self::path_for(manifest_path);
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let retry_interval = Duration::from_millis(if cfg!(test) { 10 } else { 100 });
        let start = Instant::now();

        loop {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;

            match FileExt::try_lock_exclusive(&file) {
                Ok(true) => {
                    let _ = file.set_len(0);
                    let mut file_ref = &file;
                    let _ = writeln!(
                        file_ref,
                        "pid={}\ntime={}",
                        std::process::id(),
                        humantime::format_rfc3339_seconds(SystemTime::now())
                    );
                    debug!(path = %lock_path.display(), "session lock acquired");
                    return Ok(Self {
                        lock_file: file,
                        lock_path,
                    });
                }
                Ok(false) | Err(_) if start.elapsed() < timeout => {
                    std::thread::sleep(retry_interval);
                }
                Ok(false) | Err(_) => {
                    return Err(Error::Lock { path: lock_path });
                }
            }
        }
    }

    /// Path of the held lock file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
        debug!(path = %self.lock_path.display(), "session lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            SessionLock::path_for(Path::new("/data/metadata.txt")),
            PathBuf::from("/data/metadata.txt.lock")
        );
    }

    #[test]
    fn test_lock_is_exclusive() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let manifest = dir.path().join("metadata.txt");

        let held = SessionLock::acquire(&manifest, Duration::from_millis(50))?;
        assert!(held.path().exists());
        let second = SessionLock::acquire(&manifest, Duration::from_millis(50));
        assert!(matches!(second, Err(Error::Lock { .. })));
        Ok(())
    }

    #[test]
    fn test_lock_released_on_drop() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let manifest = dir.path().join("metadata.txt");

        let lock_path = {
            let held = SessionLock::acquire(&manifest, Duration::from_millis(50))?;
            held.path().to_path_buf()
        };
        assert!(lock_path.exists());
        let _again = SessionLock::acquire(&manifest, Duration::from_millis(50))?;
        Ok(())
    }

    #[test]
    fn test_waiter_on_old_handle_still_excludes_newcomer() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let manifest = dir.path().join("metadata.txt");

        let held = SessionLock::acquire(&manifest, Duration::from_millis(50))?;
        let waiter = OpenOptions::new().write(true).open(held.path())?;
        drop(held);

        assert!(FileExt::try_lock_exclusive(&waiter)?);
        let newcomer = SessionLock::acquire(&manifest, Duration::from_millis(50));
        assert!(matches!(newcomer, Err(Error::Lock { .. })));

        FileExt::unlock(&waiter)?;
        let _again = SessionLock::acquire(&manifest, Duration::from_millis(50))?;
        Ok(())
    }
}
