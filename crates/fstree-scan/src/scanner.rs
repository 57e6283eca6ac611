//! Directory-to-tree scanner.
//!
//! [`DirScanner`] walks a source directory depth first through a
//! [`DirBackend`] and links what it finds into a [`TreeNode`]. The walk is
//! single threaded and recursive, so the nesting depth of the source is
//! bounded by the thread's stack.

use std::path::{Path, PathBuf};

use tokio::sync::broadcast;
use tracing::{debug, trace};

use fstree_core::{
    FsTree, NodeType, ScanConfig, ScanError, ScanFlag, ScanFlags, TreeDefaults, TreeNode,
};

use crate::backend::{DefaultBackend, DirBackend, DirHandle, link_buffer_len};
use crate::callback::{Admission, ScanCallback};
use crate::entry::{EntryFlags, RawDirEntry};
use crate::progress::{ProgressTracker, ScanProgress, ScanStats};

/// Progress interval used by [`DirScanner::scan_dir`] and
/// [`DirScanner::scan_subdir`].
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// Scans directories into a tree.
pub struct DirScanner<B = DefaultBackend> {
    backend: B,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl DirScanner<DefaultBackend> {
    /// Create a scanner using the platform's default backend.
    pub fn new() -> Self {
        Self::with_backend(DefaultBackend::default())
    }
}

impl Default for DirScanner<DefaultBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: DirBackend> DirScanner<B> {
    /// Create a scanner on top of a specific backend.
    pub fn with_backend(backend: B) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            backend,
            progress_tx,
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// The backend in use.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Scan `config.source` (or `config.subdir` below it) into `tree`.
    ///
    /// Nodes are added below the directory at `config.target`, or below the
    /// root if no target is set.
    pub fn scan(
        &self,
        tree: &mut FsTree,
        config: &ScanConfig,
        callback: &mut dyn ScanCallback,
    ) -> Result<ScanStats, ScanError> {
        let defaults = tree.defaults;
        let target = match &config.target {
            Some(target) => tree
                .node_by_path_mut(target)
                .ok_or_else(|| ScanError::NotFound {
                    path: target.clone(),
                })?,
            None => &mut tree.root,
        };

        self.run(
            target,
            &defaults,
            &config.source,
            config.subdir.as_deref(),
            config.flags,
            config.progress_interval,
            callback,
        )
    }

    /// Scan the directory at `path` into `target`.
    pub fn scan_dir(
        &self,
        target: &mut TreeNode,
        defaults: &TreeDefaults,
        path: &Path,
        flags: ScanFlags,
        callback: &mut dyn ScanCallback,
    ) -> Result<ScanStats, ScanError> {
        self.scan_subdir(target, defaults, path, None, flags, callback)
    }

    /// Scan `subdir`, opened relative to `path`, into `target`.
    ///
    /// The device id of the directory actually scanned is the reference for
    /// `OneFilesystem` throughout the call.
    pub fn scan_subdir(
        &self,
        target: &mut TreeNode,
        defaults: &TreeDefaults,
        path: &Path,
        subdir: Option<&Path>,
        flags: ScanFlags,
        callback: &mut dyn ScanCallback,
    ) -> Result<ScanStats, ScanError> {
        self.run(
            target,
            defaults,
            path,
            subdir,
            flags,
            DEFAULT_PROGRESS_INTERVAL,
            callback,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        target: &mut TreeNode,
        defaults: &TreeDefaults,
        path: &Path,
        subdir: Option<&Path>,
        flags: ScanFlags,
        progress_interval: u64,
        callback: &mut dyn ScanCallback,
    ) -> Result<ScanStats, ScanError> {
        if !target.is_dir() {
            let path = match subdir {
                Some(sub) => path.join(sub),
                None => path.to_path_buf(),
            };
            return Err(ScanError::NotADirectory { path });
        }

        let mut dir = self.backend.open(path, subdir)?;
        debug!(path = %dir.path().display(), %flags, "scan started");

        let mut walk = Walk {
            defaults,
            flags,
            devstart: dir.device(),
            callback,
            stats: ScanStats::default(),
            rel: PathBuf::new(),
            progress: ProgressTracker::new(self.progress_tx.clone(), progress_interval),
        };

        walk.populate(&mut dir, target)?;

        walk.stats.duration = walk.progress.elapsed();
        walk.progress.publish(&walk.stats, dir.path());
        debug!(
            path = %dir.path().display(),
            added = walk.stats.added,
            skipped = walk.stats.skipped(),
            merged = walk.stats.merged,
            elapsed_ms = walk.stats.duration.as_millis() as u64,
            "scan finished"
        );

        Ok(walk.stats)
    }
}

/// State shared by every level of one scan invocation.
struct Walk<'a> {
    defaults: &'a TreeDefaults,
    flags: ScanFlags,
    /// Device of the directory the scan started at; never refreshed.
    devstart: u64,
    callback: &'a mut dyn ScanCallback,
    stats: ScanStats,
    /// Path of the current directory relative to the scan root.
    rel: PathBuf,
    progress: ProgressTracker,
}

impl Walk<'_> {
    /// Read every entry of `dir` into `parent`, recursing into directories.
    fn populate<H: DirHandle>(&mut self, dir: &mut H, parent: &mut TreeNode) -> Result<(), ScanError> {
        self.stats.dirs_scanned += 1;
        trace!(path = %dir.path().display(), "entering directory");

        while let Some(entry) = dir.next_entry()? {
            if entry.is_dot_or_dotdot() {
                continue;
            }

            self.stats.entries_seen += 1;
            self.progress.tick(&self.stats, dir.path());

            let Some(index) = self.place(dir, parent, &entry)? else {
                continue;
            };

            if self.flags.has(ScanFlag::NoRecursion) {
                continue;
            }

            let Some(child) = parent.child_at_mut(index) else {
                continue;
            };
            if !child.is_dir() {
                continue;
            }

            let mut sub = dir.open_child(&entry.name)?;
            self.rel.push(&entry.name);
            let result = self.populate(&mut sub, child);
            self.rel.pop();
            result?;
        }

        Ok(())
    }

    /// Filter one entry and link it into `parent`.
    ///
    /// Returns the index of the resulting child, or `None` if the entry was
    /// skipped or pruned.
    fn place<H: DirHandle>(
        &mut self,
        dir: &H,
        parent: &mut TreeNode,
        entry: &RawDirEntry,
    ) -> Result<Option<usize>, ScanError> {
        let Some(node_type) = entry.node_type() else {
            trace!(name = ?entry.name, mode = entry.mode, "unknown file type");
            self.stats.filtered += 1;
            return Ok(None);
        };

        if self.flags.excludes(node_type) {
            trace!(name = ?entry.name, %node_type, "excluded by type");
            self.stats.filtered += 1;
            return Ok(None);
        }

        if self.flags.has(ScanFlag::OneFilesystem) && entry.dev != self.devstart {
            trace!(name = ?entry.name, dev = entry.dev, "on another filesystem");
            self.stats.cross_device += 1;
            return Ok(None);
        }

        if entry.flags.contains(EntryFlags::HARD_LINK) {
            self.stats.hard_links += 1;
        }
        if entry.flags.contains(EntryFlags::MOUNT_POINT) {
            self.stats.mount_points += 1;
        }

        if node_type == NodeType::Directory && self.flags.has(ScanFlag::NoDir) {
            return Ok(match parent.child_index(&entry.name) {
                Some(index) => {
                    self.stats.merged += 1;
                    Some(index)
                }
                None => {
                    trace!(name = ?entry.name, "no existing directory to merge into");
                    self.stats.merge_missed += 1;
                    None
                }
            });
        }

        self.admit(dir, parent, entry, node_type)
    }

    /// Build a node, insert it and let the callback judge it.
    fn admit<H: DirHandle>(
        &mut self,
        dir: &H,
        parent: &mut TreeNode,
        entry: &RawDirEntry,
        node_type: NodeType,
    ) -> Result<Option<usize>, ScanError> {
        let full_path = || dir.path().join(&entry.name);

        let link_target = if node_type == NodeType::Symlink {
            let capacity = link_buffer_len(entry.size).ok_or_else(|| ScanError::SymlinkTooLong {
                path: full_path(),
                size: entry.size,
            })?;
            Some(dir.read_link(&entry.name, capacity)?)
        } else {
            None
        };

        let mut stat = entry.to_stat();
        if !self.flags.has(ScanFlag::KeepTime) {
            stat.mtime = i64::from(self.defaults.mtime);
        }

        let node = TreeNode::from_stat(entry.name.clone(), link_target, &stat)
            .map_err(|e| ScanError::tree(full_path(), e))?;
        let index = parent
            .insert_sorted(node)
            .map_err(|e| ScanError::tree(full_path(), e))?;

        self.rel.push(&entry.name);
        let verdict = match parent.child_at_mut(index) {
            Some(node) => self.callback.admit(&self.rel, node),
            None => Admission::Keep,
        };
        self.rel.pop();

        match verdict {
            Admission::Keep => {
                self.stats.added += 1;
                Ok(Some(index))
            }
            Admission::Discard => {
                parent.remove_child(index);
                trace!(name = ?entry.name, "discarded by callback");
                self.stats.pruned += 1;
                Ok(None)
            }
            Admission::Abort => Err(ScanError::Aborted { path: full_path() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::collections::VecDeque;
    use std::ffi::{OsStr, OsString};
    use std::rc::Rc;

    use fstree_core::{NodeKind, mode};

    /// In-memory directory tree for exercising the shared layer with
    /// conditions a real filesystem cannot easily produce.
    #[derive(Default)]
    struct MemFs {
        dirs: HashMap<PathBuf, Vec<RawDirEntry>>,
        links: HashMap<PathBuf, OsString>,
        devices: HashMap<PathBuf, u64>,
        open_handles: Rc<Cell<i64>>,
    }

    impl MemFs {
        fn dir(mut self, path: &str, entries: Vec<RawDirEntry>) -> Self {
            self.dirs.insert(PathBuf::from(path), entries);
            self
        }

        fn link(mut self, path: &str, target: &str) -> Self {
            self.links.insert(PathBuf::from(path), target.into());
            self
        }

        fn device(mut self, path: &str, dev: u64) -> Self {
            self.devices.insert(PathBuf::from(path), dev);
            self
        }
    }

    struct MemBackend(Rc<MemFs>);

    struct MemDir {
        fs: Rc<MemFs>,
        path: PathBuf,
        entries: VecDeque<RawDirEntry>,
    }

    impl MemDir {
        fn open(fs: &Rc<MemFs>, path: PathBuf) -> Result<Self, ScanError> {
            let entries = fs
                .dirs
                .get(&path)
                .cloned()
                .ok_or_else(|| ScanError::NotFound { path: path.clone() })?;
            fs.open_handles.set(fs.open_handles.get() + 1);
            Ok(Self {
                fs: Rc::clone(fs),
                path,
                entries: entries.into(),
            })
        }
    }

    impl Drop for MemDir {
        fn drop(&mut self) {
            self.fs.open_handles.set(self.fs.open_handles.get() - 1);
        }
    }

    impl DirBackend for MemBackend {
        type Dir = MemDir;

        fn open(&self, path: &Path, subdir: Option<&Path>) -> Result<MemDir, ScanError> {
            let path = match subdir {
                Some(sub) => path.join(sub),
                None => path.to_path_buf(),
            };
            MemDir::open(&self.0, path)
        }
    }

    impl DirHandle for MemDir {
        fn path(&self) -> &Path {
            &self.path
        }

        fn device(&self) -> u64 {
            self.fs.devices.get(&self.path).copied().unwrap_or(1)
        }

        fn next_entry(&mut self) -> Result<Option<RawDirEntry>, ScanError> {
            Ok(self.entries.pop_front())
        }

        fn open_child(&self, name: &OsStr) -> Result<Self, ScanError> {
            MemDir::open(&self.fs, self.path.join(name))
        }

        fn read_link(&self, name: &OsStr, capacity: usize) -> Result<OsString, ScanError> {
            let path = self.path.join(name);
            let target = self
                .fs
                .links
                .get(&path)
                .cloned()
                .ok_or(ScanError::NotFound { path })?;
            assert_eq!(capacity, target.len() + 1);
            Ok(target)
        }
    }

    fn raw(name: &str, mode: u32) -> RawDirEntry {
        RawDirEntry {
            name: name.into(),
            mode,
            size: 0,
            mtime: 1_000,
            dev: 1,
            rdev: 0,
            uid: 0,
            gid: 0,
            ino: 0,
            nlink: 1,
            flags: EntryFlags::empty(),
        }
    }

    fn file(name: &str) -> RawDirEntry {
        raw(name, mode::S_IFREG | 0o644)
    }

    fn dir(name: &str) -> RawDirEntry {
        raw(name, mode::S_IFDIR | 0o755)
    }

    fn symlink(name: &str, len: u64) -> RawDirEntry {
        let mut e = raw(name, mode::S_IFLNK | 0o777);
        e.size = len;
        e
    }

    fn special_fs() -> MemFs {
        MemFs::default()
            .dir(
                "/src",
                vec![
                    dir("."),
                    dir(".."),
                    file("file"),
                    dir("dir"),
                    symlink("link", 6),
                    raw("sock", mode::S_IFSOCK | 0o600),
                    raw("blk", mode::S_IFBLK | 0o660),
                    raw("chr", mode::S_IFCHR | 0o666),
                    raw("fifo", mode::S_IFIFO | 0o644),
                ],
            )
            .dir("/src/dir", vec![file("inner")])
            .link("/src/link", "target")
    }

    fn scan_mem(
        fs: MemFs,
        flags: ScanFlags,
        callback: &mut dyn ScanCallback,
    ) -> (FsTree, Result<ScanStats, ScanError>, Rc<Cell<i64>>) {
        let handles = Rc::clone(&fs.open_handles);
        let scanner = DirScanner::with_backend(MemBackend(Rc::new(fs)));
        let mut tree = FsTree::default();
        let config = ScanConfig::new("/src").with_flags(flags);
        let result = scanner.scan(&mut tree, &config, callback);
        (tree, result, handles)
    }

    fn names(node: &TreeNode) -> Vec<String> {
        node.children()
            .iter()
            .map(|c| c.name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_all_types_present_and_sorted() {
        let (tree, result, handles) = scan_mem(special_fs(), ScanFlags::empty(), &mut crate::KeepAll);
        let stats = result.unwrap();

        assert_eq!(
            names(&tree.root),
            ["blk", "chr", "dir", "fifo", "file", "link", "sock"]
        );
        assert_eq!(names(&tree.root.children()[2]), ["inner"]);
        assert_eq!(stats.added, 8);
        assert_eq!(stats.dirs_scanned, 2);
        assert_eq!(handles.get(), 0);

        let link = tree.root.child(OsStr::new("link")).unwrap();
        assert_eq!(link.link_target(), Some(OsStr::new("target")));
    }

    #[test]
    fn test_each_type_flag() {
        let cases = [
            (ScanFlags::NO_FILE, "file"),
            (ScanFlags::NO_SOCKET, "sock"),
            (ScanFlags::NO_SYMLINK, "link"),
            (ScanFlags::NO_BLOCK_DEV, "blk"),
            (ScanFlags::NO_CHAR_DEV, "chr"),
            (ScanFlags::NO_FIFO, "fifo"),
        ];

        for (flag, missing) in cases {
            let mut seen = Vec::new();
            let mut cb = |path: &Path, _: &mut TreeNode| {
                seen.push(path.to_path_buf());
                Admission::Keep
            };
            let (tree, result, _) = scan_mem(special_fs(), flag, &mut cb);
            result.unwrap();

            let got = names(&tree.root);
            assert!(!got.iter().any(|n| n == missing), "{missing} present with {flag}");
            assert_eq!(got.len(), 6, "{flag}");
            assert!(!seen.iter().any(|p| p == Path::new(missing)), "callback saw {missing}");
        }
    }

    #[test]
    fn test_one_filesystem_skips_foreign_entries() {
        let mut foreign = dir("mnt");
        foreign.dev = 9;
        let fs = MemFs::default()
            .device("/src", 1)
            .dir("/src", vec![file("a"), foreign])
            .dir("/src/mnt", vec![file("deep")]);

        let (tree, result, _) = scan_mem(fs, ScanFlags::ONE_FILESYSTEM, &mut crate::KeepAll);
        let stats = result.unwrap();
        assert_eq!(names(&tree.root), ["a"]);
        assert_eq!(stats.cross_device, 1);
        assert_eq!(stats.dirs_scanned, 1);
    }

    #[test]
    fn test_devstart_not_refreshed_in_subdirs() {
        // `sub` reports its own device as 5 but its entries are on device 1,
        // the device of the scan root: they must be kept.
        let fs = MemFs::default()
            .device("/src", 1)
            .device("/src/sub", 5)
            .dir("/src", vec![dir("sub")])
            .dir("/src/sub", vec![file("x")]);

        let (tree, result, _) = scan_mem(fs, ScanFlags::ONE_FILESYSTEM, &mut crate::KeepAll);
        result.unwrap();
        assert_eq!(names(&tree.root.children()[0]), ["x"]);
    }

    #[test]
    fn test_oversized_symlink_is_fatal() {
        let fs = MemFs::default().dir("/src", vec![file("a"), symlink("huge", u64::MAX)]);

        let (tree, result, handles) = scan_mem(fs, ScanFlags::empty(), &mut crate::KeepAll);
        let err = result.unwrap_err();
        assert!(matches!(err, ScanError::SymlinkTooLong { size: u64::MAX, .. }));
        assert!(err.to_string().contains("huge"));
        assert!(tree.root.child(OsStr::new("huge")).is_none());
        assert_eq!(handles.get(), 0);
    }

    #[test]
    fn test_time_resolution() {
        let mut old = file("old");
        old.mtime = -20;
        let mut future = file("future");
        future.mtime = 1 << 40;
        let fs = || {
            MemFs::default().dir("/src", vec![old.clone(), future.clone(), file("now")])
        };

        let (tree, result, _) = scan_mem(fs(), ScanFlags::KEEP_TIME, &mut crate::KeepAll);
        result.unwrap();
        let times: Vec<u32> = tree.root.children().iter().map(|c| c.mod_time).collect();
        assert_eq!(times, [u32::MAX, 1_000, 0]);

        let scanner = DirScanner::with_backend(MemBackend(Rc::new(fs())));
        let mut tree = FsTree::new(TreeDefaults {
            mtime: 77,
            ..TreeDefaults::default()
        });
        scanner
            .scan(&mut tree, &ScanConfig::new("/src"), &mut crate::KeepAll)
            .unwrap();
        assert!(tree.root.children().iter().all(|c| c.mod_time == 77));
    }

    #[test]
    fn test_callback_sees_resolved_time() {
        let fs = MemFs::default().dir("/src", vec![file("a")]);
        let mut seen = None;
        let mut cb = |_: &Path, node: &mut TreeNode| {
            seen = Some(node.mod_time);
            Admission::Keep
        };
        let (_, result, _) = scan_mem(fs, ScanFlags::KEEP_TIME, &mut cb);
        result.unwrap();
        assert_eq!(seen, Some(1_000));
    }

    #[test]
    fn test_discard_prunes_subtree() {
        let fs = MemFs::default()
            .dir("/src", vec![dir("keep"), dir("drop"), file("f")])
            .dir("/src/keep", vec![file("k")])
            .dir("/src/drop", vec![file("never")]);

        let mut visited = Vec::new();
        let mut cb = |path: &Path, _: &mut TreeNode| {
            visited.push(path.to_path_buf());
            if path == Path::new("drop") {
                Admission::Discard
            } else {
                Admission::Keep
            }
        };
        let (tree, result, handles) = scan_mem(fs, ScanFlags::empty(), &mut cb);
        let stats = result.unwrap();

        assert_eq!(names(&tree.root), ["f", "keep"]);
        assert_eq!(stats.pruned, 1);
        assert!(!visited.iter().any(|p| p.starts_with("drop/")));
        assert!(visited.contains(&PathBuf::from("keep/k")));
        assert_eq!(handles.get(), 0);
    }

    #[test]
    fn test_abort_at_depth_fails_whole_scan() {
        let fs = MemFs::default()
            .dir("/src", vec![dir("a"), file("z")])
            .dir("/src/a", vec![dir("b")])
            .dir("/src/a/b", vec![file("stop"), file("after")]);

        let mut calls = 0;
        let mut cb = |path: &Path, _: &mut TreeNode| {
            calls += 1;
            if path == Path::new("a/b/stop") {
                Admission::Abort
            } else {
                Admission::Keep
            }
        };
        let (_, result, handles) = scan_mem(fs, ScanFlags::empty(), &mut cb);

        let err = result.unwrap_err();
        assert!(err.is_aborted());
        assert_eq!(err.path(), Some(Path::new("/src/a/b/stop")));
        assert_eq!(calls, 3);
        assert_eq!(handles.get(), 0);
    }

    #[test]
    fn test_no_dir_merges_into_existing() {
        let fs = MemFs::default()
            .dir("/src", vec![dir("b"), dir("c"), file("f")])
            .dir("/src/b", vec![file("new")]);

        let scanner = DirScanner::with_backend(MemBackend(Rc::new(fs)));
        let mut tree = FsTree::default();
        let mut b = TreeNode::new_directory("b", 0o700, 0, 0, 0).unwrap();
        b.insert_sorted(TreeNode::new_directory("old", 0o755, 0, 0, 0).unwrap())
            .unwrap();
        tree.root.insert_sorted(b).unwrap();

        let mut callback_paths = Vec::new();
        let mut cb = |path: &Path, _: &mut TreeNode| {
            callback_paths.push(path.to_path_buf());
            Admission::Keep
        };
        let config = ScanConfig::new("/src").with_flags(ScanFlags::NO_DIR);
        let stats = scanner.scan(&mut tree, &config, &mut cb).unwrap();

        assert_eq!(names(&tree.root), ["b", "f"]);
        let b = tree.root.child(OsStr::new("b")).unwrap();
        assert_eq!(b.mode() & mode::PERM_MASK, 0o700);
        assert_eq!(names(b), ["new", "old"]);
        assert_eq!(stats.merged, 1);
        assert_eq!(stats.merge_missed, 1);
        assert!(!callback_paths.contains(&PathBuf::from("b")));
        assert!(callback_paths.contains(&PathBuf::from("b/new")));
    }

    #[test]
    fn test_no_recursion() {
        let fs = MemFs::default()
            .dir("/src", vec![dir("d")])
            .dir("/src/d", vec![file("x")]);
        let (tree, result, _) = scan_mem(fs, ScanFlags::NO_RECURSION, &mut crate::KeepAll);
        assert_eq!(result.unwrap().dirs_scanned, 1);
        assert_eq!(tree.root.children()[0].child_count(), 0);
    }

    #[test]
    fn test_target_must_be_directory() {
        let fs = MemFs::default().dir("/src", vec![]);
        let scanner = DirScanner::with_backend(MemBackend(Rc::new(fs)));
        let mut target = TreeNode::from_stat(
            "f",
            None,
            &fstree_core::NodeStat {
                mode: mode::S_IFREG,
                ..Default::default()
            },
        )
        .unwrap();

        let err = scanner
            .scan_dir(
                &mut target,
                &TreeDefaults::default(),
                Path::new("/src"),
                ScanFlags::empty(),
                &mut crate::KeepAll,
            )
            .unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory { .. }));
    }

    #[test]
    fn test_missing_scan_target() {
        let fs = MemFs::default().dir("/src", vec![]);
        let scanner = DirScanner::with_backend(MemBackend(Rc::new(fs)));
        let mut tree = FsTree::default();
        let config = ScanConfig::builder()
            .source("/src")
            .target("usr/share")
            .build()
            .unwrap();
        let err = scanner.scan(&mut tree, &config, &mut crate::KeepAll).unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }

    #[test]
    fn test_hard_link_and_mount_counters() {
        let mut hl = file("hl");
        hl.flags = EntryFlags::HARD_LINK;
        let mut mnt = dir("mnt");
        mnt.flags = EntryFlags::MOUNT_POINT;
        let fs = MemFs::default()
            .dir("/src", vec![hl, mnt])
            .dir("/src/mnt", vec![]);

        let (tree, result, _) = scan_mem(fs, ScanFlags::empty(), &mut crate::KeepAll);
        let stats = result.unwrap();
        assert_eq!(stats.hard_links, 1);
        assert_eq!(stats.mount_points, 1);
        assert!(matches!(
            tree.root.child(OsStr::new("hl")).unwrap().kind(),
            NodeKind::File { .. }
        ));
    }

    #[test]
    fn test_progress_is_published() {
        let fs = MemFs::default().dir("/src", (0..5).map(|i| file(&format!("f{i}"))).collect());
        let scanner = DirScanner::with_backend(MemBackend(Rc::new(fs)));
        let mut rx = scanner.subscribe();
        let mut tree = FsTree::default();
        let config = ScanConfig::builder()
            .source("/src")
            .progress_interval(2u64)
            .build()
            .unwrap();
        scanner.scan(&mut tree, &config, &mut crate::KeepAll).unwrap();

        let mut snapshots = Vec::new();
        while let Ok(p) = rx.try_recv() {
            snapshots.push(p.entries_seen);
        }
        assert_eq!(snapshots, [2, 4, 5]);
    }
}
