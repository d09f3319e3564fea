//! Parsing of the interactive prompt.

use std::path::PathBuf;

/// One line of user input, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `0`: end the session
    Quit,
    /// Empty line: classify again and redraw
    Refresh,
    /// `*`: apply every actionable change
    ApplyAll,
    /// A list of 1-based positions separated by spaces and/or commas
    Apply(Vec<usize>),
    /// `+` (ask for a file) or `+ <path>`
    Add(Option<PathBuf>),
    /// `-` (ask for an index) or `- <n>`
    Remove(Option<usize>),
    /// Anything else; carries the raw input for the error message
    Invalid(String),
}

/// Interpret a line from the main prompt
#[must_use]
pub fn parse(line: &str) -> Command {
    let line = line.trim();

    match line {
        "" => return Command::Refresh,
        "0" => return Command::Quit,
        "*" => return Command::ApplyAll,
        _ => {}
    }

    if let Some(rest) = line.strip_prefix('+') {
        let rest = rest.trim();
        return Command::Add((!rest.is_empty()).then(|| PathBuf::from(rest)));
    }

    if let Some(rest) = line.strip_prefix('-') {
        let rest = rest.trim();
        if rest.is_empty() {
            return Command::Remove(None);
        }
        return match rest.parse::<usize>() {
            Ok(index) => Command::Remove(Some(index)),
            Err(_) => Command::Invalid(line.to_string()),
        };
    }

    parse_indices(line).map_or_else(|| Command::Invalid(line.to_string()), Command::Apply)
}

/// Parse `1 3,4` style lists. `None` if any token is not a number.
#[must_use]
pub fn parse_indices(line: &str) -> Option<Vec<usize>> {
    let indices = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<usize>, _>>()
        .ok()?;

    (!indices.is_empty()).then_some(indices)
}

/// Interpret the answer to the removal prompt.
///
/// `None` means abort: empty input, `0`, `-`, or anything that is not a
/// positive number.
#[must_use]
pub fn parse_removal(line: &str) -> Option<usize> {
    match line.trim().parse::<usize>() {
        Ok(0) | Err(_) => None,
        Ok(index) => Some(index),
    }
}
