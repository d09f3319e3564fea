use crate::FlashbackContext;
use crate::collab::FilePicker;
use crate::error::Error;
use crate::manifest::ManifestEntry;
use crate::output;
use crate::utils::expand_tilde;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Start tracking files.
///
/// Each path is handled on its own: an unreadable file or a name that is
/// already tracked is reported and the rest still get added. With no paths,
/// the configured picker is opened, or a path is read from stdin.
///
/// # Errors
///
/// Returns an error if:
/// - The manifest cannot be loaded, locked or saved
/// - No path was given and none could be picked
/// - None of the given paths could be added
pub fn execute(ctx: &FlashbackContext, paths: &[String]) -> Result<()> {
    let _lock = ctx.lock()?;
    let mut manifest = ctx.load_manifest()?;

    let paths: Vec<PathBuf> = if paths.is_empty() {
        match pick(ctx)? {
            Some(path) => vec![path],
            None => {
                output::info("Nothing selected");
                return Ok(());
            }
        }
    } else {
        paths.iter().map(|p| expand_tilde(p)).collect()
    };

    let mut added = 0;
    let mut failed = 0;
    for path in &paths {
        match ManifestEntry::from_source(path).and_then(|entry| manifest.add(entry)) {
            Ok(position) => {
                added += 1;
                output::tracked(path, position);
            }
            Err(e @ Error::DuplicateName { .. }) => {
                failed += 1;
                output::warning(&format!("{e}; skipping {}", path.display()));
            }
            Err(e) => {
                failed += 1;
                output::warning(&e.to_string());
            }
        }
    }

    if added > 0 {
        manifest.save(&ctx.manifest_path)?;
        output::success(&format!("Now tracking {} file(s)", manifest.len()));
    }
    if added == 0 && failed > 0 {
        anyhow::bail!("No files added");
    }
    Ok(())
}

fn pick(ctx: &FlashbackContext) -> Result<Option<PathBuf>> {
    if let Some(mut picker) = ctx.config.file_picker()? {
        return Ok(picker.pick_file()?);
    }
    if ctx.non_interactive {
        anyhow::bail!("No paths given and no picker configured (see 'flashback config picker.command')");
    }

    eprint!("File to add: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read path from stdin")?;
    let line = line.trim();
    Ok((!line.is_empty()).then(|| expand_tilde(line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use tempfile::tempdir;

    fn setup(dir: &std::path::Path) -> Result<FlashbackContext> {
        let ctx = FlashbackContext::new_explicit(dir.join("metadata.txt"), dir.join("config.toml"))?;
        Manifest::new().save(&ctx.manifest_path)?;
        Ok(ctx)
    }

    #[test]
    fn test_add_some_paths_fail() -> Result<()> {
        let dir = tempdir()?;
        let ctx = setup(dir.path())?;
        let good = dir.path().join("good.txt");
        std::fs::write(&good, "ok")?;

        let paths = [
            good.display().to_string(),
            dir.path().join("missing.txt").display().to_string(),
            good.display().to_string(),
        ];
        execute(&ctx, &paths)?;

        let manifest = Manifest::load(&ctx.manifest_path)?;
        assert_eq!(manifest.len(), 1);
        assert!(manifest.find("good.txt").is_some());
        Ok(())
    }

    #[test]
    fn test_add_nothing_valid_fails() -> Result<()> {
        let dir = tempdir()?;
        let ctx = setup(dir.path())?;
        let result = execute(&ctx, &[dir.path().join("nope").display().to_string()]);
        assert!(result.is_err());
        assert!(Manifest::load(&ctx.manifest_path)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_add_without_paths_non_interactive() -> Result<()> {
        let dir = tempdir()?;
        let ctx = setup(dir.path())?;
        assert!(execute(&ctx, &[]).is_err());
        Ok(())
    }
}
