//! Inode tracking for hard link detection.

use dashmap::DashSet;

/// Tracks seen `(device, inode)` pairs so later names of the same file can
/// be flagged as hard links.
///
/// One tracker is shared by every directory handle of a scan.
#[derive(Debug, Default)]
pub struct InodeTracker {
    seen: DashSet<(u64, u64)>,
}

impl InodeTracker {
    /// Create a new inode tracker.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Track an inode. Returns `true` if this is the first time seeing it.
    pub fn track(&self, device: u64, inode: u64) -> bool {
        self.seen.insert((device, inode))
    }
}
