#![allow(dead_code)]

use anyhow::Result;
use filetime::{FileTime, set_file_mtime};
use flashback::FlashbackContext;
use flashback::manifest::{Manifest, ManifestEntry};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch tree with a source directory, a fake removable drive and a
/// manifest/config pair, all under one temp dir.
pub struct TestDrive {
    pub temp_dir: TempDir,
    pub src: PathBuf,
    pub dest: PathBuf,
    pub manifest_path: PathBuf,
    pub config_path: PathBuf,
}

impl TestDrive {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let src = temp_dir.path().join("home");
        let dest = temp_dir.path().join("media/USB");
        std::fs::create_dir_all(&src)?;
        std::fs::create_dir_all(&dest)?;

        Ok(Self {
            manifest_path: temp_dir.path().join("data/metadata.txt"),
            config_path: temp_dir.path().join("config/config.toml"),
            temp_dir,
            src,
            dest,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a source file and return its path
    pub fn write_source(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.src.join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Manifest tracking freshly written sources, saved to `manifest_path`
    pub fn manifest_with(&self, files: &[(&str, &str)]) -> Result<Manifest> {
        let mut manifest = Manifest::new();
        for (name, content) in files {
            let path = self.write_source(name, content)?;
            manifest.add(ManifestEntry::from_source(&path)?)?;
        }
        manifest.save(&self.manifest_path)?;
        Ok(manifest)
    }

    /// Context pointed at this drive
    pub fn context(&self) -> Result<FlashbackContext> {
        Ok(
            FlashbackContext::new_explicit(self.manifest_path.clone(), self.config_path.clone())?
                .with_overrides(None, Some(self.dest.clone())),
        )
    }

    /// Pin a file's mtime to `secs` after the epoch
    pub fn set_mtime(&self, path: &Path, secs: i64) -> Result<()> {
        set_file_mtime(path, FileTime::from_unix_time(secs, 0))?;
        Ok(())
    }

    /// Command for the binary with config, manifest and destination pinned
    pub fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("flashback").expect("binary built");
        cmd.env("FLASHBACK_CONFIG_PATH", &self.config_path)
            .env("FLASHBACK_MANIFEST", &self.manifest_path)
            .env("FLASHBACK_DEST", &self.dest)
            .env("NO_COLOR", "1")
            .env_remove("FLASHBACK_LOG");
        cmd
    }
}
