//! Tree node types.
//!
//! A [`TreeNode`] is one file, directory, symlink or special file of the
//! image being assembled. Directory nodes own their children in a vector
//! that is kept sorted by name (byte order) at all times.

use std::ffi::{OsStr, OsString};

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::TreeError;

/// Unix file type and permission bits, independent of the host OS.
pub mod mode {
    /// Mask for the file type bits.
    pub const S_IFMT: u32 = 0o170000;
    pub const S_IFSOCK: u32 = 0o140000;
    pub const S_IFLNK: u32 = 0o120000;
    pub const S_IFREG: u32 = 0o100000;
    pub const S_IFBLK: u32 = 0o060000;
    pub const S_IFDIR: u32 = 0o040000;
    pub const S_IFCHR: u32 = 0o020000;
    pub const S_IFIFO: u32 = 0o010000;
    /// Mask for permission bits, including setuid/setgid/sticky.
    pub const PERM_MASK: u32 = 0o7777;
}

/// Type of a node, derived from the `S_IFMT` bits of its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
pub enum NodeType {
    Directory,
    File,
    Symlink,
    BlockDevice,
    CharDevice,
    Fifo,
    Socket,
}

impl NodeType {
    /// Classify a raw mode value. Returns `None` for unknown type bits.
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode & mode::S_IFMT {
            mode::S_IFDIR => Some(Self::Directory),
            mode::S_IFREG => Some(Self::File),
            mode::S_IFLNK => Some(Self::Symlink),
            mode::S_IFBLK => Some(Self::BlockDevice),
            mode::S_IFCHR => Some(Self::CharDevice),
            mode::S_IFIFO => Some(Self::Fifo),
            mode::S_IFSOCK => Some(Self::Socket),
            _ => None,
        }
    }

    /// The `S_IFMT` bits for this type.
    pub fn type_bits(self) -> u32 {
        match self {
            Self::Directory => mode::S_IFDIR,
            Self::File => mode::S_IFREG,
            Self::Symlink => mode::S_IFLNK,
            Self::BlockDevice => mode::S_IFBLK,
            Self::CharDevice => mode::S_IFCHR,
            Self::Fifo => mode::S_IFIFO,
            Self::Socket => mode::S_IFSOCK,
        }
    }
}

/// Clamp a signed epoch timestamp into the unsigned 32 bit range.
///
/// Negative values become 0, anything past `u32::MAX` saturates.
pub fn clamp_mtime(mtime: i64) -> u32 {
    if mtime < 0 {
        0
    } else {
        u32::try_from(mtime).unwrap_or(u32::MAX)
    }
}

/// Stat-like metadata used to construct a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStat {
    /// Type and permission bits.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Size in bytes (regular files).
    pub size: u64,
    /// Modification time in seconds since the epoch, may be negative.
    pub mtime: i64,
    /// Device number (block and character devices).
    pub rdev: u64,
}

/// Type-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Directory with children sorted by name.
    Directory { children: Vec<TreeNode> },
    /// Regular file.
    File { size: u64 },
    /// Symbolic link.
    Symlink {
        #[serde(with = "os_string")]
        target: OsString,
    },
    /// Block device.
    BlockDevice { rdev: u64 },
    /// Character device.
    CharDevice { rdev: u64 },
    /// Named pipe.
    Fifo,
    /// Unix domain socket.
    Socket,
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory { .. })
    }

    /// Node type matching this payload.
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Directory { .. } => NodeType::Directory,
            NodeKind::File { .. } => NodeType::File,
            NodeKind::Symlink { .. } => NodeType::Symlink,
            NodeKind::BlockDevice { .. } => NodeType::BlockDevice,
            NodeKind::CharDevice { .. } => NodeType::CharDevice,
            NodeKind::Fifo => NodeType::Fifo,
            NodeKind::Socket => NodeType::Socket,
        }
    }
}

/// A single node of the filesystem tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(with = "os_string")]
    name: OsString,
    mode: u32,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Modification time, seconds since the epoch.
    pub mod_time: u32,
    kind: NodeKind,
}

/// Names and link targets serialize as strings when they are valid UTF-8
/// and as raw bytes otherwise.
mod os_string {
    use std::ffi::OsString;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &OsString, serializer: S) -> Result<S::Ok, S::Error> {
        match value.to_str() {
            Some(text) => serializer.serialize_str(text),
            None => serializer.serialize_bytes(value.as_encoded_bytes()),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OsString, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Ok(text.into()),
            Repr::Bytes(bytes) => from_bytes::<D>(bytes),
        }
    }

    #[cfg(unix)]
    fn from_bytes<'de, D: Deserializer<'de>>(bytes: Vec<u8>) -> Result<OsString, D::Error> {
        use std::os::unix::ffi::OsStringExt;
        Ok(OsString::from_vec(bytes))
    }

    #[cfg(not(unix))]
    fn from_bytes<'de, D: Deserializer<'de>>(bytes: Vec<u8>) -> Result<OsString, D::Error> {
        use serde::de::Error;
        String::from_utf8(bytes)
            .map(OsString::from)
            .map_err(D::Error::custom)
    }
}

/// Check that a name can be stored as a directory entry.
pub fn validate_name(name: &OsStr) -> Result<(), TreeError> {
    let bytes = name.as_encoded_bytes();
    if bytes.is_empty() || bytes == b"." || bytes == b".." {
        return Err(TreeError::InvalidName);
    }
    if bytes.iter().any(|&b| b == b'/' || b == 0) {
        return Err(TreeError::InvalidName);
    }
    Ok(())
}

impl TreeNode {
    /// Construct a node from a name, an optional symlink target and stat data.
    ///
    /// The node is not attached anywhere; use [`TreeNode::insert_sorted`] on
    /// the parent to link it in. The modification time is clamped with
    /// [`clamp_mtime`].
    pub fn from_stat(
        name: impl Into<OsString>,
        link_target: Option<OsString>,
        stat: &NodeStat,
    ) -> Result<Self, TreeError> {
        let name = name.into();
        validate_name(&name)?;

        let node_type = NodeType::from_mode(stat.mode).unwrap_or(NodeType::File);
        let kind = match node_type {
            NodeType::Directory => NodeKind::Directory {
                children: Vec::new(),
            },
            NodeType::File => NodeKind::File { size: stat.size },
            NodeType::Symlink => NodeKind::Symlink {
                target: link_target.ok_or(TreeError::MissingLinkTarget)?,
            },
            NodeType::BlockDevice => NodeKind::BlockDevice { rdev: stat.rdev },
            NodeType::CharDevice => NodeKind::CharDevice { rdev: stat.rdev },
            NodeType::Fifo => NodeKind::Fifo,
            NodeType::Socket => NodeKind::Socket,
        };

        Ok(Self {
            name,
            mode: node_type.type_bits() | (stat.mode & mode::PERM_MASK),
            uid: stat.uid,
            gid: stat.gid,
            mod_time: clamp_mtime(stat.mtime),
            kind,
        })
    }

    /// Create a directory node.
    pub fn new_directory(
        name: impl Into<OsString>,
        perm: u32,
        uid: u32,
        gid: u32,
        mod_time: u32,
    ) -> Result<Self, TreeError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self::directory_unchecked(name, perm, uid, gid, mod_time))
    }

    /// Create a nameless directory to act as the root of a tree.
    pub fn new_root(perm: u32, uid: u32, gid: u32, mod_time: u32) -> Self {
        Self::directory_unchecked(OsString::new(), perm, uid, gid, mod_time)
    }

    fn directory_unchecked(name: OsString, perm: u32, uid: u32, gid: u32, mod_time: u32) -> Self {
        Self {
            name,
            mode: mode::S_IFDIR | (perm & mode::PERM_MASK),
            uid,
            gid,
            mod_time,
            kind: NodeKind::Directory {
                children: Vec::new(),
            },
        }
    }

    /// Node name. Empty for a tree root.
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    /// Raw name bytes, the sort key among siblings.
    pub fn name_bytes(&self) -> &[u8] {
        self.name.as_encoded_bytes()
    }

    /// Type and permission bits.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Replace the permission bits, keeping the type bits.
    pub fn set_permissions(&mut self, perm: u32) {
        self.mode = (self.mode & mode::S_IFMT) | (perm & mode::PERM_MASK);
    }

    /// Node type.
    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Type-specific payload.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Symlink target, if this is a symlink.
    pub fn link_target(&self) -> Option<&OsStr> {
        match &self.kind {
            NodeKind::Symlink { target } => Some(target),
            _ => None,
        }
    }

    /// Children of a directory; empty for other nodes.
    pub fn children(&self) -> &[TreeNode] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            _ => &[],
        }
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    fn children_vec_mut(&mut self) -> Result<&mut Vec<TreeNode>, TreeError> {
        match &mut self.kind {
            NodeKind::Directory { children } => Ok(children),
            _ => Err(TreeError::NotADirectory),
        }
    }

    /// Insert a child, keeping siblings sorted by name.
    ///
    /// The node goes immediately before the first sibling whose name sorts
    /// after it. Returns the index it was placed at.
    pub fn insert_sorted(&mut self, node: TreeNode) -> Result<usize, TreeError> {
        let children = self.children_vec_mut()?;
        children
            .try_reserve(1)
            .map_err(|_| TreeError::OutOfMemory)?;

        let index = children.partition_point(|c| c.name_bytes() <= node.name_bytes());
        children.insert(index, node);
        Ok(index)
    }

    /// Position of the direct child with exactly this name.
    pub fn child_index(&self, name: &OsStr) -> Option<usize> {
        let key = name.as_encoded_bytes();
        self.children()
            .binary_search_by(|c| c.name_bytes().cmp(key))
            .ok()
    }

    /// Direct child with exactly this name.
    pub fn child(&self, name: &OsStr) -> Option<&TreeNode> {
        self.child_index(name).map(|i| &self.children()[i])
    }

    /// Mutable direct child with exactly this name.
    pub fn child_mut(&mut self, name: &OsStr) -> Option<&mut TreeNode> {
        let index = self.child_index(name)?;
        self.child_at_mut(index)
    }

    /// Mutable child by position.
    pub fn child_at_mut(&mut self, index: usize) -> Option<&mut TreeNode> {
        match &mut self.kind {
            NodeKind::Directory { children } => children.get_mut(index),
            _ => None,
        }
    }

    /// Unlink and return the child at `index`.
    pub fn remove_child(&mut self, index: usize) -> Option<TreeNode> {
        let children = self.children_vec_mut().ok()?;
        (index < children.len()).then(|| children.remove(index))
    }

    /// Check that siblings are strictly ascending at every level below.
    pub fn is_sorted_recursive(&self) -> bool {
        let children = self.children();
        children
            .windows(2)
            .all(|w| w[0].name_bytes() < w[1].name_bytes())
            && children.iter().all(TreeNode::is_sorted_recursive)
    }
}
