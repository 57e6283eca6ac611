//! Directory enumeration backends.
//!
//! The scanner is written against two small traits: [`DirBackend`] opens the
//! directory a scan starts from and [`DirHandle`] enumerates one open
//! directory and opens its children. Filtering, node construction, the
//! admission callback and sorted insertion all live above this layer, so
//! every backend produces the same tree for the same input.

use std::ffi::{OsStr, OsString};
use std::path::Path;

use fstree_core::ScanError;

use crate::entry::RawDirEntry;

/// Opens the starting directory of a scan.
pub trait DirBackend {
    type Dir: DirHandle;

    /// Open `path`, or `subdir` relative to it, as a directory.
    fn open(&self, path: &Path, subdir: Option<&Path>) -> Result<Self::Dir, ScanError>;
}

/// One open directory.
///
/// Dropping the handle releases everything it holds.
pub trait DirHandle: Sized {
    /// Path of this directory, for messages.
    fn path(&self) -> &Path;

    /// Device id of this directory.
    fn device(&self) -> u64;

    /// Next entry, or `None` once the directory is exhausted.
    ///
    /// Entries are lazy and forward-only; a handle cannot be rewound.
    fn next_entry(&mut self) -> Result<Option<RawDirEntry>, ScanError>;

    /// Open the child directory `name` of this directory.
    fn open_child(&self, name: &OsStr) -> Result<Self, ScanError>;

    /// Read the target of symlink `name` into a buffer of `capacity` bytes,
    /// one of which is reserved for the terminator.
    fn read_link(&self, name: &OsStr, capacity: usize) -> Result<OsString, ScanError>;
}

/// Buffer size for a symlink target of `size` bytes plus terminator.
///
/// Returns `None` when that does not fit in `usize`.
pub fn link_buffer_len(size: u64) -> Option<usize> {
    usize::try_from(size).ok()?.checked_add(1)
}

/// Backend used by [`DirScanner::new`](crate::DirScanner::new).
#[cfg(unix)]
pub type DefaultBackend = crate::race_safe::RaceSafeBackend;

/// Backend used by [`DirScanner::new`](crate::DirScanner::new).
#[cfg(not(unix))]
pub type DefaultBackend = crate::portable::PortableBackend;
