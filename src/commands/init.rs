use crate::FlashbackContext;
use crate::manifest::{Manifest, ManifestEntry};
use crate::output;
use anyhow::{Context, Result};
use colored::Colorize;

/// Create a manifest whose only entry is the manifest itself
///
/// # Errors
///
/// Returns an error if:
/// - A manifest already exists and `force` is not set
/// - The manifest cannot be written
pub fn execute(ctx: &FlashbackContext, force: bool) -> Result<()> {
    let path = &ctx.manifest_path;
    if path.exists() && !force {
        anyhow::bail!(
            "Manifest already exists at {} (use --force to start over)",
            path.display()
        );
    }

    let mut manifest = Manifest::new();
    manifest.add(ManifestEntry::self_entry(path))?;
    manifest
        .save(path)
        .with_context(|| format!("Failed to create manifest at {}", path.display()))?;

    output::success(&format!("Initialized manifest at {}", path.display()));
    if ctx.non_interactive {
        return Ok(());
    }
    println!("\n{}", "Quick start:".bold());
    println!("  flashback add ~/notes.md      # Track a file");
    println!("  flashback status              # See what a sync would copy");
    println!("  flashback sync                # Pick what to copy");
    println!("  flashback sync --all          # Copy everything that changed");
    Ok(())
}
