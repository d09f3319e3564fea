use crate::FlashbackContext;
use crate::output;
use anyhow::{Context, Result};

/// Stop tracking the entry at a 1-based index.
///
/// The mirrored copy on the drive is left where it is.
///
/// # Errors
///
/// Returns an error if the index is out of range or the manifest cannot be
/// loaded, locked or saved.
pub fn execute(ctx: &FlashbackContext, index: usize) -> Result<()> {
    let _lock = ctx.lock()?;
    let mut manifest = ctx.load_manifest()?;

    let removed = manifest
        .remove(index)
        .context("Nothing removed; see 'flashback list' for valid indices")?;
    manifest.save(&ctx.manifest_path)?;

    output::untracked(&removed.name);
    output::verbose(&format!(
        "the copy under {} on the drive was kept",
        removed.dest_rel
    ));
    Ok(())
}
