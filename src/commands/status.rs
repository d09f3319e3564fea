use crate::FlashbackContext;
use crate::output;
use crate::reconcile::{ChangeSet, SyncStatus};
use crate::utils::formatters::{format_change, format_change_short};
use anyhow::Result;
use colored::Colorize;

/// Classify every entry against the destination and print the result.
///
/// Read-only: neither the manifest nor the destination is touched.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded or no destination is
/// available.
pub fn execute(ctx: &FlashbackContext, short: bool) -> Result<()> {
    let manifest = ctx.load_manifest()?;
    let dest_root = ctx.locate_destination()?;
    let changes = ctx.reconciler().classify(&manifest, &dest_root);

    if short {
        for change in &changes {
            println!("{}", format_change_short(change));
        }
        return Ok(());
    }

    println!("{} {}", "Destination:".bold(), dest_root.display());
    if changes.is_empty() {
        output::info("No files tracked");
        return Ok(());
    }
    for change in &changes {
        println!("{}", format_change(change));
    }
    println!();
    print_counts(&changes);
    Ok(())
}

fn print_counts(changes: &ChangeSet) {
    if changes.is_up_to_date() {
        output::up_to_date();
    } else {
        output::info(&format!(
            "{} to add, {} to update; run 'flashback sync' to copy",
            changes.count(SyncStatus::Add),
            changes.count(SyncStatus::Update)
        ));
    }

    let missing = changes.count(SyncStatus::MissingSource);
    if missing > 0 {
        output::warning(&format!(
            "{missing} tracked file(s) missing at the source; fix the path or 'flashback rm' them"
        ));
    }
}
