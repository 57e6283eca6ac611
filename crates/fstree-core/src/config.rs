//! Scan policy and configuration types.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;
use std::str::FromStr;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::ScanError;
use crate::node::NodeType;

/// A single scan policy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum ScanFlag {
    /// Do not create directory nodes; merge into existing ones instead.
    NoDir,
    /// Skip regular files.
    NoFile,
    /// Skip unix sockets.
    NoSocket,
    /// Skip symbolic links.
    NoSymlink,
    /// Skip block devices.
    NoBlockDev,
    /// Skip character devices.
    NoCharDev,
    /// Skip named pipes.
    NoFifo,
    /// Do not descend into directories.
    NoRecursion,
    /// Skip entries on a different device than the scan root.
    OneFilesystem,
    /// Keep source modification times.
    KeepTime,
}

impl ScanFlag {
    const fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Immutable set of [`ScanFlag`]s for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanFlags(u32);

impl ScanFlags {
    pub const NO_DIR: Self = Self(ScanFlag::NoDir.bit());
    pub const NO_FILE: Self = Self(ScanFlag::NoFile.bit());
    pub const NO_SOCKET: Self = Self(ScanFlag::NoSocket.bit());
    pub const NO_SYMLINK: Self = Self(ScanFlag::NoSymlink.bit());
    pub const NO_BLOCK_DEV: Self = Self(ScanFlag::NoBlockDev.bit());
    pub const NO_CHAR_DEV: Self = Self(ScanFlag::NoCharDev.bit());
    pub const NO_FIFO: Self = Self(ScanFlag::NoFifo.bit());
    pub const NO_RECURSION: Self = Self(ScanFlag::NoRecursion.bit());
    pub const ONE_FILESYSTEM: Self = Self(ScanFlag::OneFilesystem.bit());
    pub const KEEP_TIME: Self = Self(ScanFlag::KeepTime.bit());

    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check if a single flag is set.
    pub const fn has(self, flag: ScanFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Whether entries of this type are excluded by a type filter.
    ///
    /// Directories are never excluded here; `NoDir` has merge semantics.
    pub fn excludes(self, node_type: NodeType) -> bool {
        let flag = match node_type {
            NodeType::Directory => return false,
            NodeType::File => ScanFlag::NoFile,
            NodeType::Symlink => ScanFlag::NoSymlink,
            NodeType::BlockDevice => ScanFlag::NoBlockDev,
            NodeType::CharDevice => ScanFlag::NoCharDev,
            NodeType::Fifo => ScanFlag::NoFifo,
            NodeType::Socket => ScanFlag::NoSocket,
        };
        self.has(flag)
    }

    /// Iterate over the flags that are set.
    pub fn iter(self) -> impl Iterator<Item = ScanFlag> {
        ScanFlag::iter().filter(move |f| self.has(*f))
    }
}

impl From<ScanFlag> for ScanFlags {
    fn from(flag: ScanFlag) -> Self {
        Self(flag.bit())
    }
}

impl FromIterator<ScanFlag> for ScanFlags {
    fn from_iter<I: IntoIterator<Item = ScanFlag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |acc, f| acc | f.into())
    }
}

impl BitOr for ScanFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ScanFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ScanFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for flag in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{flag}")?;
            first = false;
        }
        Ok(())
    }
}

/// Tree-wide defaults for nodes that do not take their attributes from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDefaults {
    /// Owner of the root directory.
    #[serde(default)]
    pub uid: u32,
    /// Group of the root directory.
    #[serde(default)]
    pub gid: u32,
    /// Permission bits of the root directory.
    #[serde(default = "default_mode")]
    pub mode: u32,
    /// Modification time given to every node unless `KeepTime` is set.
    #[serde(default)]
    pub mtime: u32,
}

fn default_mode() -> u32 {
    0o755
}

impl Default for TreeDefaults {
    fn default() -> Self {
        Self {
            uid: 0,
            gid: 0,
            mode: default_mode(),
            mtime: 0,
        }
    }
}

impl TreeDefaults {
    /// Environment variable consulted for a reproducible default mtime.
    pub const SOURCE_DATE_EPOCH: &'static str = "SOURCE_DATE_EPOCH";

    /// Defaults with the mtime taken from `SOURCE_DATE_EPOCH` if it is set.
    pub fn from_env() -> Result<Self, ScanError> {
        let mut defaults = Self::default();
        if let Ok(value) = std::env::var(Self::SOURCE_DATE_EPOCH) {
            defaults.mtime = parse_u32(Self::SOURCE_DATE_EPOCH, value.trim(), 10)?;
        }
        Ok(defaults)
    }
}

fn parse_u32(key: &str, value: &str, radix: u32) -> Result<u32, ScanError> {
    u32::from_str_radix(value, radix).map_err(|e| ScanError::InvalidConfig {
        message: format!("{key}: invalid value '{value}': {e}"),
    })
}

impl FromStr for TreeDefaults {
    type Err = ScanError;

    /// Parse a comma separated `key=value` list, e.g.
    /// `uid=0,gid=0,mode=0755,mtime=1700000000`. Missing keys keep their
    /// default; `mode` is octal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut defaults = Self::default();

        for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (key, value) = item.split_once('=').ok_or_else(|| ScanError::InvalidConfig {
                message: format!("expected key=value, got '{item}'"),
            })?;

            match key.trim() {
                "uid" => defaults.uid = parse_u32(key, value.trim(), 10)?,
                "gid" => defaults.gid = parse_u32(key, value.trim(), 10)?,
                "mode" => {
                    let mode = parse_u32(key, value.trim(), 8)?;
                    if mode > 0o7777 {
                        return Err(ScanError::InvalidConfig {
                            message: format!("mode: '{value}' out of range"),
                        });
                    }
                    defaults.mode = mode;
                }
                "mtime" => defaults.mtime = parse_u32(key, value.trim(), 10)?,
                other => {
                    return Err(ScanError::InvalidConfig {
                        message: format!("unknown default '{other}'"),
                    });
                }
            }
        }

        Ok(defaults)
    }
}

/// Configuration for one scan invocation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Directory on disk to scan.
    pub source: PathBuf,

    /// Optional path below `source` to scan instead, opened relative to it.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub subdir: Option<PathBuf>,

    /// Tree path of the directory node to scan into (root if unset).
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub target: Option<PathBuf>,

    /// Scan policy.
    #[builder(default)]
    #[serde(default)]
    pub flags: ScanFlags,

    /// Emit a progress snapshot every this many entries (0 = only at the end).
    #[builder(default = "1000")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_progress_interval() -> u64 {
    1000
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.source {
            Some(ref source) if source.as_os_str().is_empty() => {
                Err("Source path cannot be empty".to_string())
            }
            Some(_) => Ok(()),
            None => Err("Source path is required".to_string()),
        }
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path into the tree root.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            subdir: None,
            target: None,
            flags: ScanFlags::empty(),
            progress_interval: default_progress_interval(),
        }
    }

    /// Same config with a different flag set.
    pub fn with_flags(mut self, flags: ScanFlags) -> Self {
        self.flags = flags;
        self
    }
}
