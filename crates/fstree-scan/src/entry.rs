//! Raw directory entries produced by a backend.

use std::ffi::OsString;
use std::ops::{BitOr, BitOrAssign};

use fstree_core::{NodeStat, NodeType};

use crate::inode::InodeTracker;

/// Entry-kind flags attached by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EntryFlags(u16);

impl EntryFlags {
    /// Entry lives on a different device than the directory listing it.
    pub const MOUNT_POINT: Self = Self(0x0001);
    /// Entry is another name for an inode already seen in this scan.
    pub const HARD_LINK: Self = Self(0x0002);

    /// No flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EntryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntryFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One entry read from a directory, with the metadata of the entry itself
/// (symlinks are not followed).
///
/// Produced by a [`DirHandle`](crate::DirHandle), consumed once by the
/// scanner and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDirEntry {
    pub name: OsString,
    /// Unix type and permission bits.
    pub mode: u32,
    /// Size in bytes; for symlinks the length of the target.
    pub size: u64,
    /// Modification time in seconds since the epoch.
    pub mtime: i64,
    /// Device the entry is stored on.
    pub dev: u64,
    /// Device number of a block or character device.
    pub rdev: u64,
    pub uid: u32,
    pub gid: u32,
    pub ino: u64,
    pub nlink: u64,
    pub flags: EntryFlags,
}

impl RawDirEntry {
    /// Type of the entry, `None` for type bits no node can represent.
    pub fn node_type(&self) -> Option<NodeType> {
        NodeType::from_mode(self.mode)
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.node_type() == Some(NodeType::Directory)
    }

    /// The `.` and `..` pseudo entries.
    pub fn is_dot_or_dotdot(&self) -> bool {
        let name = self.name.as_encoded_bytes();
        name == b"." || name == b".."
    }

    /// Metadata for node construction.
    pub fn to_stat(&self) -> NodeStat {
        NodeStat {
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
            size: self.size,
            mtime: self.mtime,
            rdev: self.rdev,
        }
    }

    /// Set `MOUNT_POINT` and `HARD_LINK` relative to the containing directory.
    pub(crate) fn classify(&mut self, dir_dev: u64, inodes: &InodeTracker) {
        if self.dev != dir_dev {
            self.flags |= EntryFlags::MOUNT_POINT;
        }
        if !self.is_dir() && self.nlink > 1 && !inodes.track(self.dev, self.ino) {
            self.flags |= EntryFlags::HARD_LINK;
        }
    }
}
