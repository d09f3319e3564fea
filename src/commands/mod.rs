//! CLI command implementations.
//!
//! Each command takes the [`FlashbackContext`](crate::FlashbackContext)
//! built by the binary and returns `anyhow::Result`. Listings go to stdout,
//! status messages go through [`output`](crate::output) on stderr.

pub mod add;
pub mod config;
pub mod init;
pub mod list;
pub mod rm;
pub mod status;
pub mod sync;
