use super::FilePicker;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{Level, debug, span};

/// Runs an external file dialog and reads the chosen path from its stdout.
///
/// Works with anything that prints a path and exits zero on success, e.g.
/// `zenity --file-selection` or `kdialog --getopenfilename`. A non-zero exit
/// or empty output means the user cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPicker {
    program: String,
    args: Vec<String>,
}

impl CommandPicker {
    /// Parse a command line with shell-style quoting.
    ///
    /// Examples:
    /// - `"zenity --file-selection"` → `("zenity", ["--file-selection"])`
    /// - `"kdialog --title 'Pick a file' --getopenfilename"`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unbalanced quotes, an empty command, or
    /// a program that is not on `PATH`.
    pub fn from_command_line(cmd: &str) -> Result<Self> {
        let span = span!(Level::DEBUG, "parse_picker_command", cmd);
        let _guard = span.enter();

        let mut parts = shell_words::split(cmd).map_err(|e| Error::Config {
            message: format!("invalid picker command '{cmd}': {e}"),
        })?;
        if parts.is_empty() {
            return Err(Error::Config {
                message: "empty picker command".to_string(),
            });
        }

        let program = parts.remove(0);
        which::which(&program).map_err(|_| Error::Config {
            message: format!("picker program '{program}' not found in PATH"),
        })?;

        debug!(program = %program, args = ?parts, "picker command parsed");
        Ok(Self {
            program,
            args: parts,
        })
    }
}

impl FilePicker for CommandPicker {
    fn pick_file(&mut self) -> Result<Option<PathBuf>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit())
            .output()?;

        if !output.status.success() {
            debug!(status = ?output.status.code(), "picker cancelled");
            return Ok(None);
        }

        let chosen = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from);
        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandPicker::from_command_line("   "),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_unbalanced_quotes_rejected() {
        assert!(CommandPicker::from_command_line("zenity 'oops").is_err());
    }

    #[test]
    fn test_missing_program_rejected() {
        assert!(CommandPicker::from_command_line("definitely-not-a-real-picker-xyz").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_pick_reads_first_line() -> anyhow::Result<()> {
        let mut picker = CommandPicker::from_command_line("printf '\\n/tmp/chosen file.txt\\nextra\\n'")?;
        assert_eq!(
            picker.pick_file()?,
            Some(PathBuf::from("/tmp/chosen file.txt"))
        );
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_cancel() -> anyhow::Result<()> {
        let mut picker = CommandPicker::from_command_line("false")?;
        assert_eq!(picker.pick_file()?, None);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_empty_output_is_cancel() -> anyhow::Result<()> {
        let mut picker = CommandPicker::from_command_line("true")?;
        assert_eq!(picker.pick_file()?, None);
        Ok(())
    }
}
