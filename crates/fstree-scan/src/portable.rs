//! Path based backend.
//!
//! Enumerates one directory at a time with jwalk (serial, depth 1, hidden
//! entries included, links not followed) and re-resolves full paths for
//! every child. Works on any target, but an entry can be swapped between
//! being listed and being opened.

use std::ffi::{OsStr, OsString};
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fstree_core::ScanError;
use jwalk::{Parallelism, WalkDir};

use crate::backend::{DirBackend, DirHandle};
use crate::entry::{EntryFlags, RawDirEntry};
use crate::inode::InodeTracker;

type EntryIter = Box<dyn Iterator<Item = Result<jwalk::DirEntry<((), ())>, jwalk::Error>>>;

/// Path based directory backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableBackend;

impl DirBackend for PortableBackend {
    type Dir = PortableDir;

    fn open(&self, path: &Path, subdir: Option<&Path>) -> Result<PortableDir, ScanError> {
        let path = match subdir {
            Some(sub) => path.join(sub),
            None => path.to_path_buf(),
        };

        let metadata = std::fs::metadata(&path).map_err(|e| ScanError::io(&path, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory { path });
        }

        Ok(PortableDir::new(path, get_dev(&metadata), Arc::new(InodeTracker::new())))
    }
}

/// An open directory of the [`PortableBackend`].
pub struct PortableDir {
    path: PathBuf,
    device: u64,
    entries: EntryIter,
    inodes: Arc<InodeTracker>,
}

impl PortableDir {
    fn new(path: PathBuf, device: u64, inodes: Arc<InodeTracker>) -> Self {
        let walker = WalkDir::new(&path)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(false)
            .max_depth(1);

        Self {
            path,
            device,
            entries: Box::new(walker.into_iter()),
            inodes,
        }
    }
}

impl DirHandle for PortableDir {
    fn path(&self) -> &Path {
        &self.path
    }

    fn device(&self) -> u64 {
        self.device
    }

    fn next_entry(&mut self) -> Result<Option<RawDirEntry>, ScanError> {
        for result in self.entries.by_ref() {
            let mut entry = result.map_err(|err| {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| self.path.clone());
                ScanError::io(path, walk_error(&err))
            })?;

            // jwalk yields the directory itself first, carrying any error
            // from reading its children.
            if entry.depth() == 0 {
                if let Some(err) = entry.read_children_error.take() {
                    return Err(ScanError::io(&self.path, walk_error(&err)));
                }
                continue;
            }

            let path = entry.path();
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| ScanError::io(&path, e))?;

            let mut raw = raw_entry(entry.file_name().to_os_string(), &metadata);
            raw.classify(self.device, &self.inodes);
            return Ok(Some(raw));
        }
        Ok(None)
    }

    fn open_child(&self, name: &OsStr) -> Result<Self, ScanError> {
        let path = self.path.join(name);
        let metadata = std::fs::symlink_metadata(&path).map_err(|e| ScanError::io(&path, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory { path });
        }
        Ok(Self::new(path, get_dev(&metadata), Arc::clone(&self.inodes)))
    }

    fn read_link(&self, name: &OsStr, _capacity: usize) -> Result<OsString, ScanError> {
        let path = self.path.join(name);
        std::fs::read_link(&path)
            .map(PathBuf::into_os_string)
            .map_err(|e| ScanError::io(&path, e))
    }
}

/// Convert a jwalk error, keeping the io error kind where there is one.
fn walk_error(err: &jwalk::Error) -> io::Error {
    let kind = err.io_error().map_or(io::ErrorKind::Other, io::Error::kind);
    io::Error::new(kind, err.to_string())
}

/// Build a raw entry from `lstat`-style metadata.
#[cfg(unix)]
fn raw_entry(name: OsString, metadata: &Metadata) -> RawDirEntry {
    use std::os::unix::fs::MetadataExt;

    RawDirEntry {
        name,
        mode: metadata.mode(),
        size: metadata.size(),
        mtime: metadata.mtime(),
        dev: metadata.dev(),
        rdev: metadata.rdev(),
        uid: metadata.uid(),
        gid: metadata.gid(),
        ino: metadata.ino(),
        nlink: metadata.nlink(),
        flags: EntryFlags::empty(),
    }
}

/// Build a raw entry, synthesizing Unix mode bits from the file type.
#[cfg(not(unix))]
fn raw_entry(name: OsString, metadata: &Metadata) -> RawDirEntry {
    use fstree_core::mode;
    use std::time::UNIX_EPOCH;

    let file_type = metadata.file_type();
    let mode = if file_type.is_dir() {
        mode::S_IFDIR | 0o755
    } else if file_type.is_symlink() {
        mode::S_IFLNK | 0o777
    } else {
        mode::S_IFREG | 0o644
    };

    let mtime = match metadata.modified() {
        Ok(t) => match t.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            Err(e) => i64::try_from(e.duration().as_secs()).map_or(i64::MIN, |s| -s),
        },
        Err(_) => 0,
    };

    RawDirEntry {
        name,
        mode,
        size: metadata.len(),
        mtime,
        dev: 0,
        rdev: 0,
        uid: 0,
        gid: 0,
        ino: 0,
        nlink: 1,
        flags: EntryFlags::empty(),
    }
}

/// Get the device ID from metadata.
#[cfg(unix)]
fn get_dev(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.dev()
}

#[cfg(not(unix))]
fn get_dev(_metadata: &Metadata) -> u64 {
    0
}
