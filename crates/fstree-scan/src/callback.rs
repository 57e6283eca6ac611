//! Admission callbacks.

use std::cmp::Ordering;
use std::path::Path;

use fstree_core::TreeNode;

/// Verdict of an admission callback on a freshly built node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Keep the node and, for directories, descend into it.
    Keep,
    /// Drop the node and do not descend into it. Not an error.
    Discard,
    /// Stop the whole scan with [`ScanError::Aborted`](fstree_core::ScanError::Aborted).
    Abort,
}

impl Admission {
    /// Map the integer status convention: zero keeps, positive discards,
    /// negative aborts.
    pub fn from_status(status: i32) -> Self {
        match status.cmp(&0) {
            Ordering::Equal => Self::Keep,
            Ordering::Greater => Self::Discard,
            Ordering::Less => Self::Abort,
        }
    }

    /// Integer status for this verdict.
    pub fn status(self) -> i32 {
        match self {
            Self::Keep => 0,
            Self::Discard => 1,
            Self::Abort => -1,
        }
    }
}

/// Hook invoked once for every node the scanner creates.
///
/// `path` is the node's path relative to the directory being scanned. The
/// node is already linked into its parent; it may be modified, except for
/// its name which is fixed.
///
/// Entries removed by a type filter, by the one-filesystem rule, and
/// directories merged under `NoDir` never reach the callback.
pub trait ScanCallback {
    fn admit(&mut self, path: &Path, node: &mut TreeNode) -> Admission;
}

impl<F> ScanCallback for F
where
    F: FnMut(&Path, &mut TreeNode) -> Admission,
{
    fn admit(&mut self, path: &Path, node: &mut TreeNode) -> Admission {
        self(path, node)
    }
}

/// Callback that keeps everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

impl ScanCallback for KeepAll {
    fn admit(&mut self, _path: &Path, _node: &mut TreeNode) -> Admission {
        Admission::Keep
    }
}
