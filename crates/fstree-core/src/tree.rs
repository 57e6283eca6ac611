//! Filesystem tree container and statistics.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::config::TreeDefaults;
use crate::node::{NodeKind, TreeNode};

/// Summary statistics for a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    /// Total size of regular files in bytes.
    pub total_size: u64,
    /// Number of regular files.
    pub total_files: u64,
    /// Number of directories, not counting the root.
    pub total_dirs: u64,
    /// Number of symbolic links.
    pub total_symlinks: u64,
    /// Number of block and character devices.
    pub total_devices: u64,
    /// Number of fifos and sockets.
    pub total_other: u64,
    /// Deepest level reached (root children are depth 1).
    pub max_depth: u32,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect statistics for everything below `root`.
    pub fn collect(root: &TreeNode) -> Self {
        let mut stats = Self::new();
        stats.visit_children(root, 1);
        stats
    }

    fn visit_children(&mut self, dir: &TreeNode, depth: u32) {
        for child in dir.children() {
            self.record(child, depth);
            if child.is_dir() {
                self.visit_children(child, depth + 1);
            }
        }
    }

    fn record(&mut self, node: &TreeNode, depth: u32) {
        self.max_depth = self.max_depth.max(depth);
        match node.kind() {
            NodeKind::Directory { .. } => self.total_dirs += 1,
            NodeKind::File { size } => {
                self.total_files += 1;
                self.total_size += size;
            }
            NodeKind::Symlink { .. } => self.total_symlinks += 1,
            NodeKind::BlockDevice { .. } | NodeKind::CharDevice { .. } => self.total_devices += 1,
            NodeKind::Fifo | NodeKind::Socket => self.total_other += 1,
        }
    }

    /// Total number of nodes below the root.
    pub fn total_nodes(&self) -> u64 {
        self.total_files + self.total_dirs + self.total_symlinks + self.total_devices + self.total_other
    }
}

/// In-memory filesystem tree being assembled for an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsTree {
    /// Root directory node.
    pub root: TreeNode,

    /// Tree-wide defaults.
    pub defaults: TreeDefaults,
}

impl FsTree {
    /// Create a tree holding only a root directory built from `defaults`.
    pub fn new(defaults: TreeDefaults) -> Self {
        let root = TreeNode::new_root(defaults.mode, defaults.uid, defaults.gid, defaults.mtime);
        Self { root, defaults }
    }

    /// Resolve a `/`-separated path relative to the root.
    ///
    /// An empty path, `.` or `/` resolve to the root itself. `..` is not
    /// supported and yields `None`.
    pub fn node_by_path(&self, path: &Path) -> Option<&TreeNode> {
        let mut node = &self.root;
        for component in path.components() {
            match component {
                Component::Normal(name) => node = node.child(name)?,
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        Some(node)
    }

    /// Mutable variant of [`FsTree::node_by_path`].
    pub fn node_by_path_mut(&mut self, path: &Path) -> Option<&mut TreeNode> {
        let mut node = &mut self.root;
        for component in path.components() {
            match component {
                Component::Normal(name) => node = node.child_mut(name)?,
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        Some(node)
    }

    /// Compute statistics for the whole tree.
    pub fn stats(&self) -> TreeStats {
        TreeStats::collect(&self.root)
    }

    /// Check the sorted-sibling invariant over the whole tree.
    pub fn is_sorted(&self) -> bool {
        self.root.is_sorted_recursive()
    }
}

impl Default for FsTree {
    fn default() -> Self {
        Self::new(TreeDefaults::default())
    }
}
