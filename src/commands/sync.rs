use crate::FlashbackContext;
use crate::apply::Selection;
use crate::error::Error;
use crate::manifest::Manifest;
use crate::output::{self, Progress};
use crate::session::{Session, menu};
use anyhow::{Context, Result};
use std::path::Path;

/// How `sync` chooses what to copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// Show the menu and read commands from stdin
    Interactive,
    /// Copy every actionable entry
    All,
    /// Copy these 1-based positions
    Select(Vec<usize>),
}

impl SyncMode {
    /// Mode from the `--all` / `--select` flags
    ///
    /// # Errors
    ///
    /// Returns an error if the selection list is not a list of numbers.
    pub fn from_args(all: bool, select: Option<&str>) -> Result<Self> {
        match (all, select) {
            (true, _) => Ok(Self::All),
            (false, Some(list)) => menu::parse_indices(list)
                .map(Self::Select)
                .with_context(|| format!("Invalid selection '{list}': expected numbers like \"1 3,4\"")),
            (false, None) => Ok(Self::Interactive),
        }
    }
}

/// Mirror tracked files onto the destination.
///
/// When the local manifest is missing but the drive carries a mirrored copy
/// of it, that copy is restored first.
///
/// # Errors
///
/// Returns an error if:
/// - Another session holds the lock
/// - No destination is available
/// - There is no manifest locally or on the drive
/// - The manifest cannot be saved after a mutation
pub fn execute(ctx: &FlashbackContext, mode: SyncMode) -> Result<()> {
    let _lock = ctx.lock()?;
    let dest_root = ctx.locate_destination()?;
    if !ctx.is_initialized() {
        restore_from_destination(ctx, &dest_root)?;
    }
    let manifest = ctx.load_manifest()?;

    let mut picker = match mode {
        SyncMode::Interactive => ctx.config.file_picker()?,
        _ => None,
    };
    let mut session = Session::new(&ctx.manifest_path, &dest_root, manifest)
        .with_reconciler(ctx.reconciler())
        .with_applier(ctx.applier());
    if let Some(picker) = picker.as_mut() {
        session = session.with_picker(picker);
    }

    let selection = match mode {
        SyncMode::Interactive => {
            if ctx.non_interactive {
                anyhow::bail!("Interactive sync needs a terminal; use --all or --select");
            }
            let stdin = std::io::stdin();
            let report = session.run(stdin.lock(), std::io::stdout().lock())?;
            output::info(&format!(
                "Session done: {} copied, {} added, {} removed",
                report.summary.applied, report.added, report.removed
            ));
            return Ok(());
        }
        SyncMode::All => Selection::All,
        SyncMode::Select(indices) => Selection::indices(indices),
    };

    let mut progress: Option<Progress> = None;
    let result = session.apply_selection(&selection, |done, total| {
        progress
            .get_or_insert_with(|| output::copy_progress(total))
            .update(done);
    })?;
    if let Some(progress) = progress {
        progress.finish();
    }

    if result.outcomes.is_empty() {
        output::up_to_date();
        return Ok(());
    }
    output::report_batch(&result);
    if result.summary().failed > 0 {
        anyhow::bail!("Some files could not be copied");
    }
    Ok(())
}

/// Bring back the manifest from its mirrored copy on the drive
fn restore_from_destination(ctx: &FlashbackContext, dest_root: &Path) -> Result<()> {
    let mirrored = ctx.mirrored_manifest(dest_root);
    if !mirrored.is_file() {
        return Err(Error::ManifestMissing {
            path: ctx.manifest_path.clone(),
        })
        .context("No manifest here or on the drive; run 'flashback init' first");
    }

    let report = Manifest::load_report(&mirrored)?;
    report.manifest.save(&ctx.manifest_path)?;
    output::restored(&mirrored, report.manifest.len());
    Ok(())
}
