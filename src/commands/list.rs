use crate::FlashbackContext;
use crate::manifest::Stamp;
use crate::output;
use crate::utils::formatters::{format_relative, format_size, format_stamp};
use anyhow::Result;
use colored::Colorize;

/// Print every entry with the metadata recorded in the manifest.
///
/// Does not look at the destination; `status` does that.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded.
pub fn execute(ctx: &FlashbackContext) -> Result<()> {
    let manifest = ctx.load_manifest()?;
    if manifest.is_empty() {
        output::info("No files tracked");
        return Ok(());
    }

    let now = Stamp::now();
    for (index, entry) in manifest.iter().enumerate() {
        let backed_up = match entry.last_backup {
            Some(stamp) => format!("{stamp} ({})", format_relative(stamp, now)),
            None => "never".yellow().to_string(),
        };

        println!("{:>3}) {}", index + 1, entry.name.bold());
        println!("     from:     {}", entry.source_path.display());
        println!("     to:       {}", entry.dest_rel);
        println!("     modified: {}", format_stamp(entry.source_modified));
        println!("     backup:   {backed_up}");
        println!("     size:     {}", format_size(entry.size));
        if output::get_verbosity() == output::Verbosity::Verbose {
            println!(
                "     hash:     {}",
                entry.content_hash.as_deref().unwrap_or("none")
            );
        }
    }
    Ok(())
}
