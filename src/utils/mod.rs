//! Small helpers shared across flashback.
//!
//! - [`hash`]: streaming content digests
//! - [`formatters`]: sizes, timestamps and status lines for display

/// Content hashing (xxHash3-128)
pub mod hash;
/// Display formatting
pub mod formatters;

use std::path::PathBuf;

pub use formatters::format_size;

/// Expand a leading `~` to the home directory.
///
/// Paths that do not start with `~` are returned unchanged, as is `~` when
/// no home directory is known.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Current login name, `unknown` if the environment has none
#[must_use]
pub fn get_current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
