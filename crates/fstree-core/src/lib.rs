//! Core types for fstree.
//!
//! This crate provides the in-memory filesystem tree that scans populate
//! and image writers consume, together with the scan policy flags and
//! configuration shared by the scanner.

mod config;
mod error;
mod node;
mod tree;

pub use config::{ScanConfig, ScanConfigBuilder, ScanFlag, ScanFlags, TreeDefaults};
pub use error::{ScanError, TreeError};
pub use node::{NodeKind, NodeStat, NodeType, TreeNode, clamp_mtime, mode, validate_name};
pub use tree::{FsTree, TreeStats};
