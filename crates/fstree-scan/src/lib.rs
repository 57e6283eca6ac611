//! Directory scanning engine for fstree.
//!
//! This crate reads a directory on disk into an [`FsTree`], applying the
//! scan policy in [`ScanFlags`] and an optional admission callback.
//!
//! # Overview
//!
//! - **Sorted insertion** keeps every directory's children in byte order
//! - **Two backends**: a race-safe one that opens every directory relative
//!   to its parent's descriptor (Unix), and a portable path based one
//! - **Admission callbacks** can edit, discard or abort on every new node
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use fstree_scan::{DirScanner, FsTree, KeepAll, ScanConfig, ScanFlags};
//!
//! let mut tree = FsTree::default();
//! let config = ScanConfig::new("/path/to/rootfs").with_flags(ScanFlags::ONE_FILESYSTEM);
//!
//! let scanner = DirScanner::new();
//! let stats = scanner.scan(&mut tree, &config, &mut KeepAll).unwrap();
//!
//! println!("Added {} nodes", stats.added);
//! ```
//!
//! # Admission callbacks
//!
//! Any `FnMut(&Path, &mut TreeNode) -> Admission` is a callback:
//!
//! ```rust,no_run
//! use std::path::Path;
//! use fstree_scan::{Admission, DirScanner, FsTree, ScanConfig, TreeNode};
//!
//! let mut tree = FsTree::default();
//! let mut skip_git = |path: &Path, node: &mut TreeNode| {
//!     if path.ends_with(".git") {
//!         return Admission::Discard;
//!     }
//!     node.uid = 0;
//!     node.gid = 0;
//!     Admission::Keep
//! };
//!
//! DirScanner::new()
//!     .scan(&mut tree, &ScanConfig::new("."), &mut skip_git)
//!     .unwrap();
//! ```

mod backend;
mod callback;
mod entry;
mod filter;
mod inode;
mod portable;
mod progress;
#[cfg(unix)]
mod race_safe;
mod scanner;

pub use backend::{DefaultBackend, DirBackend, DirHandle, link_buffer_len};
pub use callback::{Admission, KeepAll, ScanCallback};
pub use entry::{EntryFlags, RawDirEntry};
pub use filter::{ExcludeFilter, FilterError};
pub use inode::InodeTracker;
pub use portable::{PortableBackend, PortableDir};
pub use progress::{ScanProgress, ScanStats};
#[cfg(unix)]
pub use race_safe::{RaceSafeBackend, RaceSafeDir};
pub use scanner::{DEFAULT_PROGRESS_INTERVAL, DirScanner};

// Re-export core types for convenience
pub use fstree_core::{
    FsTree, NodeKind, NodeType, ScanConfig, ScanError, ScanFlag, ScanFlags, TreeDefaults,
    TreeNode, TreeStats,
};
