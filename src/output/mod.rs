//! User-facing messages for the flashback CLI.
//!
//! Everything a backup run reports goes through here: per-file copy
//! outcomes, the batch summary, registry changes and manifest restores.
//! Messages go to stderr so listings on stdout stay pipeable, and `--quiet`
//! leaves only warnings and errors.

mod progress;

use crate::apply::{AppliedResult, EntryOutcome, Outcome, Summary};
use crate::utils::formatters::{format_size, format_summary};
use colored::Colorize;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};

pub use progress::Progress;

/// How much to print
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet = 0,
    /// Default
    Normal = 1,
    /// Also print skipped files and other per-entry details
    Verbose = 2,
}

impl Verbosity {
    /// Level selected by the global `--quiet`/`--verbose` flags
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }
}

static VERBOSITY: AtomicU8 = AtomicU8::new(1);

/// Set the process-wide verbosity
pub fn set_verbosity(level: Verbosity) {
    VERBOSITY.store(level as u8, Ordering::Relaxed);
}

/// Current process-wide verbosity
pub fn get_verbosity() -> Verbosity {
    match VERBOSITY.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Normal,
    }
}

/// Kind of message; decides its colour and when it is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Per-entry detail, `--verbose` only
    Detail,
    /// Routine progress, dimmed
    Info,
    /// A file copied, added, removed or restored
    Done,
    /// Completed without problems, green
    Success,
    /// Something was skipped, bold yellow
    Warning,
    /// Something failed, bold red
    Error,
}

impl Level {
    /// Whether messages of this level print at `verbosity`
    #[must_use]
    pub const fn shown_at(self, verbosity: Verbosity) -> bool {
        match self {
            Self::Detail => matches!(verbosity, Verbosity::Verbose),
            Self::Info | Self::Done | Self::Success => !matches!(verbosity, Verbosity::Quiet),
            Self::Warning | Self::Error => true,
        }
    }
}

/// A styled line waiting to be printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Severity
    pub level: Level,
    /// Leading verb for [`Level::Done`] lines, e.g. `copied`
    pub verb: Option<&'static str>,
    /// Text after the verb
    pub text: String,
}

impl Message {
    fn new(level: Level, text: impl Into<String>) -> Self {
        Self {
            level,
            verb: None,
            text: text.into(),
        }
    }

    fn done(verb: &'static str, text: impl Into<String>) -> Self {
        Self {
            level: Level::Done,
            verb: Some(verb),
            text: text.into(),
        }
    }

    /// Print to stderr if the current verbosity allows it
    pub fn emit(&self) {
        if !self.level.shown_at(get_verbosity()) {
            return;
        }
        match (self.level, self.verb) {
            (_, Some(verb)) => eprintln!("{} {}", verb.dimmed().bold(), self.text),
            (Level::Detail | Level::Info | Level::Done, None) => eprintln!("{}", self.text.dimmed()),
            (Level::Success, None) => eprintln!("{}", self.text.green()),
            (Level::Warning, None) => eprintln!("{}", self.text.yellow().bold()),
            (Level::Error, None) => eprintln!("{}", self.text.red().bold()),
        }
    }
}

/// Green, hidden when quiet
pub fn success(message: &str) {
    Message::new(Level::Success, message).emit();
}

/// Bold yellow, always shown
pub fn warning(message: &str) {
    Message::new(Level::Warning, message).emit();
}

/// Dimmed, hidden when quiet
pub fn info(message: &str) {
    Message::new(Level::Info, message).emit();
}

/// Dimmed, only with `--verbose`
pub fn verbose(message: &str) {
    Message::new(Level::Detail, message).emit();
}

/// Line reporting what happened to one selected position
#[must_use]
pub fn outcome_message(entry: &EntryOutcome) -> Message {
    let name = entry
        .name
        .clone()
        .unwrap_or_else(|| format!("#{}", entry.position));
    match &entry.outcome {
        Outcome::Copied { bytes } => Message::done("copied", format!("{name} ({})", format_size(*bytes))),
        Outcome::NoActionTaken(status) => {
            Message::new(Level::Detail, format!("skipped {name}: {}", status.label()))
        }
        Outcome::IndexSkipped => Message::new(Level::Warning, format!("Skipped {name}: no such entry")),
        Outcome::CopyFailed(e) => Message::new(Level::Error, format!("Failed {name}: {e}")),
    }
}

/// Closing line of a batch; a warning when any copy failed
#[must_use]
pub fn summary_message(summary: Summary) -> Message {
    let level = if summary.failed > 0 {
        Level::Warning
    } else {
        Level::Success
    };
    Message::new(level, format_summary(summary))
}

/// Report each outcome of a batch, then the summary line
pub fn report_batch(result: &AppliedResult) {
    for entry in &result.outcomes {
        outcome_message(entry).emit();
    }
    summary_message(result.summary()).emit();
}

/// Nothing needed copying
pub fn up_to_date() {
    success("Everything is up to date");
}

/// A source file joined the manifest at `position`
pub fn tracked(source: &Path, position: usize) {
    Message::done("added", format!("{} as #{position}", source.display())).emit();
}

/// An entry left the manifest
pub fn untracked(name: &str) {
    Message::done("removed", name).emit();
}

/// The manifest was brought back from its mirrored copy
pub fn restored(mirrored: &Path, entries: usize) {
    Message::done(
        "restored",
        format!("manifest from {} ({entries} entries)", mirrored.display()),
    )
    .emit();
}

/// Counter for a batch of `total` copies
#[must_use]
pub fn copy_progress(total: usize) -> Progress {
    Progress::new("Copying files", total)
}
