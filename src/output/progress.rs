//! Inline progress for batch copies.

use colored::Colorize;
use std::io::{self, IsTerminal, Write};

/// Counter redrawn in place on a TTY, silent otherwise.
///
/// Renders as `Copying files: 50% (3/6)` and ends with `, done.`
pub struct Progress {
    /// Label before the counter
    title: String,
    /// Positions to process
    total: usize,
    /// Positions processed so far
    current: usize,
    /// Whether stderr is a TTY
    is_tty: bool,
}

impl Progress {
    /// Start a counter; draws immediately on a TTY when there is work
    #[must_use]
    pub fn new(title: &str, total: usize) -> Self {
        let progress = Self {
            title: title.to_string(),
            total,
            current: 0,
            is_tty: io::stderr().is_terminal() && super::get_verbosity() != super::Verbosity::Quiet,
        };
        progress.draw(false);
        progress
    }

    /// Move the counter to `current` (clamped to the total)
    pub fn update(&mut self, current: usize) {
        let current = current.min(self.total);
        if current != self.current {
            self.current = current;
            self.draw(false);
        }
    }

    /// Completion percentage
    #[must_use]
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            self.current * 100 / self.total
        }
    }

    /// Print the final line
    pub fn finish(mut self) {
        self.current = self.total;
        self.draw(true);
        self.total = 0;
    }

    fn draw(&self, done: bool) {
        if !self.is_tty || self.total == 0 {
            return;
        }
        let line = format!(
            "\r{}: {}% ({}/{})",
            self.title.dimmed(),
            self.percent(),
            self.current,
            self.total
        );
        if done {
            eprintln!("{line}, done.");
        } else {
            eprint!("{line}");
            let _ = io::stderr().flush();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        // Interrupted mid-way: leave the cursor on a fresh line
        if self.is_tty && self.total > 0 && self.current < self.total {
            eprintln!();
        }
    }
}
