//! The interactive loop: classify, list, read a command, act, repeat.
//!
//! A [`Session`] owns the manifest for its lifetime. Every mutation (an add,
//! a removal, or a batch with at least one successful copy) is saved before
//! the next prompt, so quitting at any point loses nothing. Input and output
//! are generic so the loop can be driven by a script in tests.
//!
//! When the manifest tracks itself, that entry is never copied mid-batch.
//! It is refreshed once the rest of the batch is done, the manifest is saved,
//! and the saved file is mirrored last, so the copy on the drive always
//! holds the latest state.

pub mod menu;

use crate::apply::{AppliedResult, Applier, EntryOutcome, Outcome, Selection, Summary};
use crate::collab::FilePicker;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, ManifestEntry, Stamp};
use crate::reconcile::{ChangeSet, Reconciler, SyncStatus};
use crate::utils::expand_tilde;
use crate::utils::formatters::{format_change, format_size, format_summary};
use crate::utils::hash::hash_file;
use colored::Colorize;
use menu::Command;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PROMPT: &str = "> ";
const HELP: &str = "numbers: copy those  *: copy all  +: add file  -: remove  0: quit";

/// Totals over a whole session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Sum of every batch summary
    pub summary: Summary,
    /// Entries added
    pub added: usize,
    /// Entries removed
    pub removed: usize,
}

/// One interactive (or scripted) run over a manifest and destination
pub struct Session<'a> {
    manifest_path: PathBuf,
    dest_root: PathBuf,
    manifest: Manifest,
    reconciler: Reconciler,
    applier: Applier,
    picker: Option<&'a mut dyn FilePicker>,
}

impl<'a> Session<'a> {
    /// Session over a loaded manifest; saves go to `manifest_path`
    #[must_use]
    pub fn new(manifest_path: impl Into<PathBuf>, dest_root: impl Into<PathBuf>, manifest: Manifest) -> Self {
        let manifest_path = manifest_path.into();
        Self {
            reconciler: Reconciler::new().with_manifest_path(&manifest_path),
            manifest_path,
            dest_root: dest_root.into(),
            manifest,
            applier: Applier::new(),
            picker: None,
        }
    }

    /// Use this reconciler for every pass
    #[must_use]
    pub fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = reconciler.with_manifest_path(&self.manifest_path);
        self
    }

    /// Use this applier for every batch
    #[must_use]
    pub const fn with_applier(mut self, applier: Applier) -> Self {
        self.applier = applier;
        self
    }

    /// Ask this picker for files on `+`; without one the session prompts for a path
    #[must_use]
    pub fn with_picker(mut self, picker: &'a mut dyn FilePicker) -> Self {
        self.picker = Some(picker);
        self
    }

    /// The manifest as it currently stands
    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Destination root in use
    #[must_use]
    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Classify the manifest against the destination
    #[must_use]
    pub fn classify(&self) -> ChangeSet {
        self.reconciler.classify(&self.manifest, &self.dest_root)
    }

    /// Classify, apply `selection`, and save if anything was copied.
    ///
    /// `on_outcome(done, total)` is called after each selected position.
    ///
    /// # Errors
    ///
    /// Only a failed save is an error; per-entry failures are in the result.
    pub fn apply_selection<F>(&mut self, selection: &Selection, on_outcome: F) -> Result<AppliedResult>
    where
        F: FnMut(usize, usize),
    {
        let changes = self.classify();
        self.apply_changes(&changes, selection, on_outcome)
    }

    fn apply_changes<F>(&mut self, changes: &ChangeSet, selection: &Selection, mut on_outcome: F) -> Result<AppliedResult>
    where
        F: FnMut(usize, usize),
    {
        let Some(own) = self.manifest_entry_position(changes) else {
            let result = self
                .applier
                .apply_with(&mut self.manifest, changes, selection, on_outcome);
            if result.mutated() {
                self.save()?;
            }
            return Ok(result);
        };

        let own_change = changes.get(own);
        let own_actionable = own_change.is_some_and(|c| c.status.is_actionable());
        let (own_selected, others): (bool, Vec<usize>) = match selection {
            Selection::None => (false, Vec::new()),
            Selection::All => (own_actionable, changes.actionable().map(|c| c.position).collect()),
            Selection::Indices(positions) => (positions.contains(&own), positions.clone()),
        };
        let others: Vec<usize> = others.into_iter().filter(|&p| p != own).collect();
        let own_requested = own_selected && own_actionable;
        let total = others.len() + usize::from(own_requested || !others.is_empty());

        let mut result = self.applier.apply_with(
            &mut self.manifest,
            changes,
            &Selection::indices(others),
            |done, _| on_outcome(done, total),
        );

        if own_requested || result.mutated() {
            let outcome = self.mirror_manifest(own)?;
            result.outcomes.push(EntryOutcome {
                position: own,
                name: own_change.map(|c| c.name.clone()),
                outcome,
            });
            on_outcome(total, total);
        } else if own_selected
            && let Some(change) = own_change
        {
            result.outcomes.push(EntryOutcome {
                position: own,
                name: Some(change.name.clone()),
                outcome: Outcome::NoActionTaken(change.status),
            });
        }
        Ok(result)
    }

    /// Position of the entry tracking the manifest file, if the change-set agrees on it
    fn manifest_entry_position(&self, changes: &ChangeSet) -> Option<usize> {
        let position = self
            .manifest
            .iter()
            .position(|entry| self.reconciler.is_manifest_entry(entry))?
            + 1;
        let entry = self.manifest.get(position)?;
        changes
            .get(position)
            .is_some_and(|change| change.name == entry.name)
            .then_some(position)
    }

    /// Refresh the manifest's own entry, save, then mirror the saved file.
    ///
    /// The entry describes the manifest as it stood before this save; a
    /// digest of the new content would have to contain itself. If the copy
    /// fails the entry is put back and saved again.
    fn mirror_manifest(&mut self, position: usize) -> Result<Outcome> {
        let Some(previous) = self.manifest.get(position).cloned() else {
            return Ok(Outcome::IndexSkipped);
        };
        let dest_path = previous.dest_path(&self.dest_root);

        let metadata = fs::metadata(&self.manifest_path).ok();
        let digest = hash_file(&self.manifest_path).ok();
        if let Some(entry) = self.manifest.entry_mut(position) {
            if let Some(metadata) = metadata {
                entry.size = metadata.len();
                entry.source_modified = metadata.modified().ok().map(Stamp::from_system_time);
            }
            entry.content_hash = digest;
            entry.last_backup = Some(Stamp::now());
        }
        self.save()?;

        match self.applier.copy_file(&self.manifest_path, &dest_path) {
            Ok(bytes) => {
                debug!(dest = %dest_path.display(), bytes, "mirrored manifest");
                Ok(Outcome::Copied { bytes })
            }
            Err(e) => {
                warn!("could not mirror the manifest: {e}");
                if let Some(entry) = self.manifest.entry_mut(position) {
                    *entry = previous;
                }
                self.save()?;
                Ok(Outcome::CopyFailed(e))
            }
        }
    }

    /// Track a new file and save.
    ///
    /// # Errors
    ///
    /// Returns the registry error (unreadable source, duplicate name) with
    /// the manifest unchanged, or a save failure.
    pub fn add_file(&mut self, path: &Path) -> Result<usize> {
        let position = self.manifest.add(ManifestEntry::from_source(path)?)?;
        self.save()?;
        Ok(position)
    }

    /// Stop tracking the entry at a 1-based position and save.
    ///
    /// The mirrored copy on the destination is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] with the manifest unchanged, or a
    /// save failure.
    pub fn remove_entry(&mut self, index: usize) -> Result<ManifestEntry> {
        let removed = self.manifest.remove(index)?;
        self.save()?;
        Ok(removed)
    }

    fn save(&self) -> Result<()> {
        self.manifest.save(&self.manifest_path)
    }

    /// Run the prompt loop until `0` or end of input.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors on `input`/`out` or when the manifest cannot be
    /// saved. Per-entry problems are printed and the loop continues.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut out: W) -> Result<SessionReport> {
        let mut report = SessionReport::default();

        loop {
            let changes = self.classify();
            self.render(&changes, &mut out)?;
            write!(out, "{PROMPT}")?;
            out.flush()?;

            let Some(line) = read_line(&mut input)? else {
                debug!("input closed, ending session");
                break;
            };

            match menu::parse(&line) {
                Command::Quit => break,
                Command::Refresh => {}
                Command::ApplyAll => {
                    self.run_batch(&changes, &Selection::All, &mut out, &mut report)?;
                }
                Command::Apply(indices) => {
                    self.run_batch(&changes, &Selection::indices(indices), &mut out, &mut report)?;
                }
                Command::Add(path) => {
                    let path = match path {
                        Some(path) => Some(path),
                        None => self.ask_for_file(&mut input, &mut out)?,
                    };
                    match path {
                        Some(path) => self.run_add(&path, &mut out, &mut report)?,
                        None => writeln!(out, "{}", "add cancelled".dimmed())?,
                    }
                }
                Command::Remove(index) => {
                    let index = match index {
                        Some(index) => Some(index),
                        None => {
                            write!(out, "Remove which entry? ")?;
                            out.flush()?;
                            read_line(&mut input)?.as_deref().and_then(menu::parse_removal)
                        }
                    };
                    match index {
                        Some(index) => self.run_remove(index, &mut out, &mut report)?,
                        None => writeln!(out, "{}", "remove cancelled".dimmed())?,
                    }
                }
                Command::Invalid(raw) => {
                    writeln!(out, "{} '{raw}'", "invalid input:".yellow())?;
                }
            }
        }

        Ok(report)
    }

    fn render<W: Write>(&self, changes: &ChangeSet, out: &mut W) -> Result<()> {
        writeln!(out)?;
        writeln!(out, "{} {}", "Destination:".bold(), self.dest_root.display())?;
        if changes.is_empty() {
            writeln!(out, "  (no tracked files)")?;
        }
        for change in changes {
            writeln!(out, "{}", format_change(change))?;
        }
        writeln!(
            out,
            "{} to add, {} to update, {} missing source",
            changes.count(SyncStatus::Add),
            changes.count(SyncStatus::Update),
            changes.count(SyncStatus::MissingSource)
        )?;
        writeln!(out, "{}", HELP.dimmed())?;
        Ok(())
    }

    fn run_batch<W: Write>(
        &mut self,
        changes: &ChangeSet,
        selection: &Selection,
        out: &mut W,
        report: &mut SessionReport,
    ) -> Result<()> {
        let result = self.apply_changes(changes, selection, |_, _| {})?;

        for entry in &result.outcomes {
            let name = entry
                .name
                .clone()
                .unwrap_or_else(|| format!("#{}", entry.position));
            match &entry.outcome {
                Outcome::Copied { bytes } => {
                    writeln!(out, "{} {name} ({})", "copied".green(), format_size(*bytes))?;
                }
                Outcome::NoActionTaken(status) => {
                    writeln!(out, "{} {name}: {}", "skipped".dimmed(), status.label())?;
                }
                Outcome::IndexSkipped => {
                    writeln!(out, "{} {name}: no such entry", "skipped".dimmed())?;
                }
                Outcome::CopyFailed(e) => {
                    writeln!(out, "{} {name}: {e}", "failed".red().bold())?;
                }
            }
        }

        let summary = result.summary();
        writeln!(out, "{}", format_summary(summary))?;
        report.summary.applied += summary.applied;
        report.summary.skipped += summary.skipped;
        report.summary.failed += summary.failed;
        Ok(())
    }

    fn run_add<W: Write>(&mut self, path: &Path, out: &mut W, report: &mut SessionReport) -> Result<()> {
        match self.add_file(path) {
            Ok(position) => {
                report.added += 1;
                writeln!(out, "{} {} as #{position}", "added".green(), path.display())?;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                writeln!(out, "{} {e}", "not added:".yellow())?;
                Ok(())
            }
        }
    }

    fn run_remove<W: Write>(&mut self, index: usize, out: &mut W, report: &mut SessionReport) -> Result<()> {
        match self.remove_entry(index) {
            Ok(removed) => {
                report.removed += 1;
                writeln!(out, "{} {}", "removed".green(), removed.name)?;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                writeln!(out, "{} {e}", "not removed:".yellow())?;
                Ok(())
            }
        }
    }

    fn ask_for_file<R: BufRead, W: Write>(&mut self, input: &mut R, out: &mut W) -> Result<Option<PathBuf>> {
        if let Some(picker) = self.picker.as_deref_mut() {
            return match picker.pick_file() {
                Ok(path) => Ok(path),
                Err(e) => {
                    writeln!(out, "{} {e}", "picker failed:".yellow())?;
                    Ok(None)
                }
            };
        }

        write!(out, "File to add: ")?;
        out.flush()?;
        Ok(read_line(input)?
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .map(|line| expand_tilde(&line)))
    }
}

/// Next line without its terminator, `None` at end of input
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line).map_err(Error::Io)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    struct Setup {
        dir: TempDir,
        manifest_path: PathBuf,
        dest: PathBuf,
    }

    impl Setup {
        fn new(files: &[(&str, &str)]) -> anyhow::Result<(Self, Manifest)> {
            let dir = tempfile::tempdir()?;
            let manifest_path = dir.path().join("metadata.txt");
            let dest = dir.path().join("usb");
            fs::create_dir_all(&dest)?;

            let mut manifest = Manifest::new();
            for (name, content) in files {
                let path = dir.path().join(name);
                fs::write(&path, content)?;
                manifest.add(ManifestEntry::from_source(&path)?)?;
            }
            manifest.save(&manifest_path)?;
            Ok((
                Self {
                    dir,
                    manifest_path,
                    dest,
                },
                manifest,
            ))
        }

        fn run(&self, manifest: Manifest, script: &str) -> anyhow::Result<(SessionReport, String, Manifest)> {
            let mut session = Session::new(&self.manifest_path, &self.dest, manifest);
            let mut out = Vec::new();
            let report = session.run(Cursor::new(script.to_string()), &mut out)?;
            Ok((report, String::from_utf8(out)?, session.manifest().clone()))
        }
    }

    struct ScriptedPicker(Option<PathBuf>);

    impl FilePicker for ScriptedPicker {
        fn pick_file(&mut self) -> Result<Option<PathBuf>> {
            Ok(self.0.take())
        }
    }

    #[test]
    fn test_quit_without_changes() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[("a.txt", "alpha")])?;
        let before = fs::read_to_string(&setup.manifest_path)?;

        let (report, out, after) = setup.run(manifest.clone(), "0\n")?;
        assert_eq!(report, SessionReport::default());
        assert_eq!(after, manifest);
        assert_eq!(fs::read_to_string(&setup.manifest_path)?, before);
        assert!(out.contains("a.txt"));
        Ok(())
    }

    #[test]
    fn test_end_of_input_ends_session() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[("a.txt", "alpha")])?;
        let (report, _, _) = setup.run(manifest, "")?;
        assert_eq!(report, SessionReport::default());
        Ok(())
    }

    #[test]
    fn test_apply_all_then_saved() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[("a.txt", "alpha"), ("b.txt", "beta")])?;

        let (report, out, after) = setup.run(manifest, "*\n0\n")?;
        assert_eq!(report.summary.applied, 2);
        assert!(out.contains("2 applied, 0 skipped, 0 failed"));
        assert_eq!(fs::read_to_string(setup.dest.join("a.txt"))?, "alpha");
        assert_eq!(fs::read_to_string(setup.dest.join("b.txt"))?, "beta");

        let on_disk = Manifest::load(&setup.manifest_path)?;
        assert_eq!(on_disk, after);
        assert!(on_disk.iter().all(ManifestEntry::is_backed_up));
        Ok(())
    }

    #[test]
    fn test_apply_selected_indices() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[("a.txt", "alpha"), ("b.txt", "beta")])?;

        let (report, _, _) = setup.run(manifest, "2, 2\n0\n")?;
        assert_eq!(report.summary.applied, 1);
        assert!(setup.dest.join("b.txt").exists());
        assert!(!setup.dest.join("a.txt").exists());
        Ok(())
    }

    #[test]
    fn test_invalid_input_reprompts_without_mutation() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[("a.txt", "alpha")])?;
        let (report, out, after) = setup.run(manifest.clone(), "banana\n0\n")?;
        assert!(out.contains("'banana'"));
        assert_eq!(report, SessionReport::default());
        assert_eq!(after, manifest);
        Ok(())
    }

    #[test]
    fn test_add_by_prompt_and_direct() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[("a.txt", "alpha")])?;
        let b = setup.dir.path().join("b.txt");
        let c = setup.dir.path().join("c.txt");
        fs::write(&b, "beta")?;
        fs::write(&c, "gamma")?;

        let script = format!("+\n{}\n+ {}\n0\n", b.display(), c.display());
        let (report, _, after) = setup.run(manifest, &script)?;
        assert_eq!(report.added, 2);
        let names: Vec<_> = after.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(Manifest::load(&setup.manifest_path)?, after);
        Ok(())
    }

    #[test]
    fn test_add_with_picker() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[])?;
        let picked = setup.dir.path().join("picked.txt");
        fs::write(&picked, "x")?;

        let mut picker = ScriptedPicker(Some(picked));
        let mut session = Session::new(&setup.manifest_path, &setup.dest, manifest).with_picker(&mut picker);
        let report = session.run(Cursor::new("+\n+\n0\n"), Vec::new())?;
        assert_eq!(report.added, 1);
        assert!(session.manifest().find("picked.txt").is_some());
        Ok(())
    }

    #[test]
    fn test_duplicate_add_is_reported() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[("a.txt", "alpha")])?;
        let other = setup.dir.path().join("other");
        fs::create_dir_all(&other)?;
        fs::write(other.join("a.txt"), "imposter")?;

        let script = format!("+ {}\n0\n", other.join("a.txt").display());
        let (report, out, after) = setup.run(manifest.clone(), &script)?;
        assert_eq!(report.added, 0);
        assert!(out.contains("already tracked"));
        assert_eq!(after, manifest);
        Ok(())
    }

    #[test]
    fn test_remove_prompt_and_abort() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[("a.txt", "alpha"), ("b.txt", "beta")])?;

        let (report, _, after) = setup.run(manifest.clone(), "-\n\n-\n0\n- 7\n0\n")?;
        assert_eq!(report.removed, 0);
        assert_eq!(after, manifest);

        let (report, _, after) = setup.run(manifest, "-\n1\n0\n")?;
        assert_eq!(report.removed, 1);
        assert_eq!(after.len(), 1);
        assert_eq!(after.get(1).map(|e| e.name.as_str()), Some("b.txt"));
        assert_eq!(Manifest::load(&setup.manifest_path)?, after);
        Ok(())
    }

    fn with_self_entry(setup: &Setup, mut manifest: Manifest) -> anyhow::Result<Manifest> {
        manifest.add(ManifestEntry::self_entry(&setup.manifest_path))?;
        manifest.save(&setup.manifest_path)?;
        Ok(manifest)
    }

    fn statuses(session: &Session<'_>) -> Vec<SyncStatus> {
        session.classify().iter().map(|c| c.status).collect()
    }

    #[test]
    fn test_manifest_entry_is_mirrored_last_and_settles() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[("a.txt", "alpha")])?;
        let manifest = with_self_entry(&setup, manifest)?;
        let mirror = setup.dest.join("metadata.txt");
        let mut session = Session::new(&setup.manifest_path, &setup.dest, manifest);

        let result = session.apply_selection(&Selection::All, |_, _| {})?;
        let names: Vec<_> = result.outcomes.iter().filter_map(|o| o.name.as_deref()).collect();
        assert_eq!(names, vec!["a.txt", "metadata.txt"]);
        assert_eq!(result.summary().applied, 2);
        assert_eq!(statuses(&session), vec![SyncStatus::Current, SyncStatus::Current]);

        // The drive holds the manifest exactly as saved, backup time included
        assert_eq!(fs::read_to_string(&mirror)?, fs::read_to_string(&setup.manifest_path)?);
        let mirrored = Manifest::load(&mirror)?;
        assert!(mirrored.find("metadata.txt").is_some_and(ManifestEntry::is_backed_up));
        assert!(mirrored.find("a.txt").is_some_and(ManifestEntry::is_backed_up));

        let again = session.apply_selection(&Selection::All, |_, _| {})?;
        assert!(again.outcomes.is_empty());

        fs::write(setup.dir.path().join("a.txt"), "alpha, edited")?;
        filetime::set_file_mtime(
            setup.dest.join("a.txt"),
            filetime::FileTime::from_unix_time(1_000_000_000, 0),
        )?;
        assert_eq!(statuses(&session), vec![SyncStatus::Update, SyncStatus::Current]);

        let result = session.apply_selection(&Selection::indices([1]), |_, _| {})?;
        assert_eq!(result.summary().applied, 2);
        assert_eq!(statuses(&session), vec![SyncStatus::Current, SyncStatus::Current]);
        assert_eq!(fs::read_to_string(&mirror)?, fs::read_to_string(&setup.manifest_path)?);
        Ok(())
    }

    #[test]
    fn test_current_manifest_entry_selected_alone_is_skipped() -> anyhow::Result<()> {
        let (setup, manifest) = Setup::new(&[])?;
        let manifest = with_self_entry(&setup, manifest)?;
        let mut session = Session::new(&setup.manifest_path, &setup.dest, manifest);
        session.apply_selection(&Selection::All, |_, _| {})?;
        let saved = fs::read_to_string(&setup.manifest_path)?;

        let result = session.apply_selection(&Selection::indices([1]), |_, _| {})?;
        assert!(matches!(
            result.outcomes[0].outcome,
            Outcome::NoActionTaken(SyncStatus::Current)
        ));
        assert_eq!(fs::read_to_string(&setup.manifest_path)?, saved);
        Ok(())
    }

    #[test]
    fn test_failed_manifest_mirror_keeps_entry_unbacked() -> anyhow::Result<()> {
        let (setup, mut manifest) = Setup::new(&[])?;
        let mut own = ManifestEntry::self_entry(&setup.manifest_path);
        own.dest_rel = crate::manifest::DestRel::parse("blocked")?;
        manifest.add(own)?;
        manifest.save(&setup.manifest_path)?;
        fs::write(setup.dest.join("blocked"), "not a directory")?;

        let mut session = Session::new(&setup.manifest_path, &setup.dest, manifest);
        let result = session.apply_selection(&Selection::All, |_, _| {})?;
        assert_eq!(result.summary().failed, 1);

        let on_disk = Manifest::load(&setup.manifest_path)?;
        assert!(on_disk.find("metadata.txt").is_some_and(|e| !e.is_backed_up()));
        Ok(())
    }
}
