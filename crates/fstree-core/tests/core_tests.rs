use fstree_core::{
    FsTree, NodeKind, NodeStat, NodeType, ScanError, ScanFlag, ScanFlags, TreeDefaults, TreeError,
    TreeNode, clamp_mtime, mode,
};
use std::ffi::OsStr;
use std::path::Path;

fn stat(kind: u32, perm: u32) -> NodeStat {
    NodeStat {
        mode: kind | perm,
        uid: 1000,
        gid: 1000,
        size: 0,
        mtime: 1_600_000_000,
        rdev: 0,
    }
}

#[test]
fn test_every_node_type_from_stat() {
    let cases = [
        (mode::S_IFREG, NodeType::File),
        (mode::S_IFDIR, NodeType::Directory),
        (mode::S_IFBLK, NodeType::BlockDevice),
        (mode::S_IFCHR, NodeType::CharDevice),
        (mode::S_IFIFO, NodeType::Fifo),
        (mode::S_IFSOCK, NodeType::Socket),
    ];

    for (bits, expected) in cases {
        let node = TreeNode::from_stat("n", None, &stat(bits, 0o640)).unwrap();
        assert_eq!(node.node_type(), expected);
        assert_eq!(node.mode() & mode::S_IFMT, bits);
        assert_eq!(node.mode() & mode::PERM_MASK, 0o640);
        assert_eq!(node.uid, 1000);
        assert_eq!(node.mod_time, 1_600_000_000);
    }

    let link = TreeNode::from_stat("l", Some("../x".into()), &stat(mode::S_IFLNK, 0o777)).unwrap();
    assert_eq!(link.node_type(), NodeType::Symlink);
    assert_eq!(link.link_target(), Some(OsStr::new("../x")));
}

#[test]
fn test_device_keeps_rdev() {
    let mut st = stat(mode::S_IFCHR, 0o666);
    st.rdev = 0x0103;
    let node = TreeNode::from_stat("null", None, &st).unwrap();
    assert_eq!(node.kind(), &NodeKind::CharDevice { rdev: 0x0103 });
}

#[test]
fn test_sorted_insert_is_byte_order() {
    let mut dir = TreeNode::new_directory("d", 0o755, 0, 0, 0).unwrap();
    let names = ["zeta", "Alpha", "alpha", "_x", "10", "9", "a.txt", "a"];
    for name in names {
        dir.insert_sorted(TreeNode::from_stat(name, None, &stat(mode::S_IFREG, 0o644)).unwrap())
            .unwrap();
        assert!(dir.is_sorted_recursive(), "unsorted after inserting {name}");
    }

    let got: Vec<&[u8]> = dir.children().iter().map(TreeNode::name_bytes).collect();
    let mut expected: Vec<&[u8]> = names.iter().map(|n| n.as_bytes()).collect();
    expected.sort();
    assert_eq!(got, expected);
}

#[cfg(unix)]
#[test]
fn test_non_utf8_names() {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    let mut dir = TreeNode::new_directory("d", 0o755, 0, 0, 0).unwrap();
    let raw = OsString::from_vec(vec![0xff, b'x']);
    dir.insert_sorted(TreeNode::from_stat(raw.clone(), None, &stat(mode::S_IFREG, 0)).unwrap())
        .unwrap();
    dir.insert_sorted(TreeNode::from_stat("y", None, &stat(mode::S_IFREG, 0)).unwrap())
        .unwrap();

    assert_eq!(dir.children()[1].name(), raw.as_os_str());
    assert!(dir.child(&raw).is_some());
}

#[test]
fn test_tree_lookup_and_prune() {
    let mut tree = FsTree::new(TreeDefaults::default());
    let usr = TreeNode::new_directory("usr", 0o755, 0, 0, 0).unwrap();
    tree.root.insert_sorted(usr).unwrap();

    let usr = tree.node_by_path_mut(Path::new("usr")).unwrap();
    usr.insert_sorted(TreeNode::new_directory("bin", 0o755, 0, 0, 0).unwrap())
        .unwrap();
    let idx = usr
        .insert_sorted(TreeNode::from_stat("README", None, &stat(mode::S_IFREG, 0o644)).unwrap())
        .unwrap();

    assert!(tree.node_by_path(Path::new("/usr/bin")).unwrap().is_dir());

    let usr = tree.node_by_path_mut(Path::new("usr")).unwrap();
    usr.remove_child(idx).unwrap();
    assert!(tree.node_by_path(Path::new("usr/README")).is_none());
    assert_eq!(tree.stats().total_dirs, 2);
}

#[test]
fn test_time_clamping_boundaries() {
    assert_eq!(clamp_mtime(i64::MIN), 0);
    assert_eq!(clamp_mtime(-1), 0);
    assert_eq!(clamp_mtime(1), 1);
    assert_eq!(clamp_mtime(u32::MAX as i64 - 1), u32::MAX - 1);
    assert_eq!(clamp_mtime(u32::MAX as i64 + 1), u32::MAX);
    assert_eq!(clamp_mtime(0x0F_FFFF_FFFF), u32::MAX);
}

#[test]
fn test_flags_round_trip_through_names() {
    for flag in ScanFlags::from_iter([ScanFlag::NoFifo, ScanFlag::OneFilesystem]).iter() {
        let parsed: ScanFlag = flag.to_string().parse().unwrap();
        assert_eq!(parsed, flag);
    }
}

#[test]
fn test_error_mapping() {
    let err = ScanError::tree("/src/dir", TreeError::NotADirectory);
    assert!(matches!(err, ScanError::NotADirectory { .. }));
    assert_eq!(err.path(), Some(Path::new("/src/dir")));

    let err = ScanError::io(
        "/missing",
        std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
    );
    assert!(matches!(err, ScanError::NotFound { .. }));
}
