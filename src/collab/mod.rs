//! Seams to the outside world the core never reaches past.
//!
//! - [`FilePicker`] asks the user for a file to track. The stock
//!   implementation runs an external dialog program ([`CommandPicker`]).
//! - [`VolumeLocator`] finds the destination root. Either a fixed path
//!   ([`FixedRoot`]) or the first mounted volume under well-known mount
//!   directories ([`MountScanner`]).

pub mod picker;
pub mod volume;

use crate::error::Result;
use std::path::PathBuf;

pub use picker::CommandPicker;
pub use volume::{FixedRoot, MountScanner};

/// Interactive file selection
pub trait FilePicker {
    /// Ask for one file. `Ok(None)` when the user cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error when the picker itself could not be run.
    fn pick_file(&mut self) -> Result<Option<PathBuf>>;
}

/// Discovery of the destination root
pub trait VolumeLocator {
    /// The root to mirror into, if one is currently available
    fn find_removable_root(&self) -> Option<PathBuf>;
}

impl<T: VolumeLocator + ?Sized> VolumeLocator for Box<T> {
    fn find_removable_root(&self) -> Option<PathBuf> {
        (**self).find_removable_root()
    }
}

impl<T: FilePicker + ?Sized> FilePicker for Box<T> {
    fn pick_file(&mut self) -> Result<Option<PathBuf>> {
        (**self).pick_file()
    }
}
