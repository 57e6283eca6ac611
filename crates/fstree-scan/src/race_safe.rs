//! Descriptor anchored backend.
//!
//! Every directory is opened relative to its parent's already open
//! descriptor with `openat`, and entries are inspected with `fstatat` and
//! `readlinkat` against the same descriptor. No path is ever re-resolved
//! from the scan root, so renaming or replacing an ancestor mid-scan cannot
//! redirect the walk.

use std::ffi::{CStr, CString, OsStr, OsString};
use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use fstree_core::{ScanError, mode};
use nix::errno::Errno;

use crate::backend::{DirBackend, DirHandle};
use crate::entry::{EntryFlags, RawDirEntry};
use crate::inode::InodeTracker;

const DIR_FLAGS: libc::c_int = libc::O_DIRECTORY | libc::O_RDONLY | libc::O_CLOEXEC;

/// Descriptor anchored directory backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct RaceSafeBackend;

impl DirBackend for RaceSafeBackend {
    type Dir = RaceSafeDir;

    fn open(&self, path: &Path, subdir: Option<&Path>) -> Result<RaceSafeDir, ScanError> {
        let fd = open_dir(None, path.as_os_str(), DIR_FLAGS, path)?;

        let (fd, path) = match subdir {
            Some(sub) => {
                let full = path.join(sub);
                let sub_fd = open_dir(Some(fd.as_fd()), sub.as_os_str(), DIR_FLAGS, &full)?;
                drop(fd);
                (sub_fd, full)
            }
            None => (fd, path.to_path_buf()),
        };

        let st = fstat(fd.as_fd()).map_err(|e| ScanError::io(&path, e))?;
        if st.st_mode as u32 & mode::S_IFMT != mode::S_IFDIR {
            return Err(ScanError::NotADirectory { path });
        }

        RaceSafeDir::from_fd(fd, path, st.st_dev as u64, Arc::new(InodeTracker::new()))
    }
}

/// An open directory stream of the [`RaceSafeBackend`].
///
/// Owns its descriptor; it is closed exactly once, on drop.
pub struct RaceSafeDir {
    stream: NonNull<libc::DIR>,
    path: PathBuf,
    device: u64,
    inodes: Arc<InodeTracker>,
}

impl RaceSafeDir {
    fn from_fd(
        fd: OwnedFd,
        path: PathBuf,
        device: u64,
        inodes: Arc<InodeTracker>,
    ) -> Result<Self, ScanError> {
        // SAFETY: `fd` is a valid open directory descriptor.
        let stream = unsafe { libc::fdopendir(fd.as_raw_fd()) };
        let Some(stream) = NonNull::new(stream) else {
            // `fd` is still ours and is closed on return.
            return Err(ScanError::io(&path, io::Error::last_os_error()));
        };
        // The stream owns the descriptor from here on.
        let _ = fd.into_raw_fd();

        Ok(Self {
            stream,
            path,
            device,
            inodes,
        })
    }

    /// Descriptor backing the stream. `fdopendir` may have replaced the one
    /// it was given.
    fn raw_fd(&self) -> RawFd {
        // SAFETY: the stream stays open for the lifetime of `self`.
        unsafe { libc::dirfd(self.stream.as_ptr()) }
    }

    fn fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the descriptor is owned by the stream, which outlives the borrow.
        unsafe { BorrowedFd::borrow_raw(self.raw_fd()) }
    }
}

impl Drop for RaceSafeDir {
    fn drop(&mut self) {
        // SAFETY: the stream was opened by `fdopendir` and is closed only here.
        unsafe {
            libc::closedir(self.stream.as_ptr());
        }
    }
}

impl DirHandle for RaceSafeDir {
    fn path(&self) -> &Path {
        &self.path
    }

    fn device(&self) -> u64 {
        self.device
    }

    fn next_entry(&mut self) -> Result<Option<RawDirEntry>, ScanError> {
        loop {
            // End of directory is told apart from a read error by errno.
            Errno::clear();
            // SAFETY: the stream is open; the returned record is only read
            // before the next `readdir` call on this stream.
            let ent = unsafe { libc::readdir(self.stream.as_ptr()) };
            if ent.is_null() {
                let err = io::Error::last_os_error();
                return match err.raw_os_error() {
                    None | Some(0) => Ok(None),
                    Some(_) => Err(ScanError::io(&self.path, err)),
                };
            }

            // SAFETY: `d_name` is a NUL terminated string inside the record.
            let name = unsafe { CStr::from_ptr((*ent).d_name.as_ptr()) }.to_owned();
            if matches!(name.as_bytes(), b"." | b"..") {
                continue;
            }

            let name_os = OsStr::from_bytes(name.as_bytes());
            let st = fstatat_nofollow(self.fd(), &name)
                .map_err(|e| ScanError::io(self.path.join(name_os), e))?;

            let mut entry = raw_entry(OsString::from_vec(name.into_bytes()), &st);
            entry.classify(self.device, &self.inodes);
            return Ok(Some(entry));
        }
    }

    fn open_child(&self, name: &OsStr) -> Result<Self, ScanError> {
        let path = self.path.join(name);
        let fd = open_dir(Some(self.fd()), name, DIR_FLAGS | libc::O_NOFOLLOW, &path)?;
        let st = fstat(fd.as_fd()).map_err(|e| ScanError::io(&path, e))?;
        Self::from_fd(fd, path, st.st_dev as u64, Arc::clone(&self.inodes))
    }

    fn read_link(&self, name: &OsStr, capacity: usize) -> Result<OsString, ScanError> {
        let path = || self.path.join(name);
        let c_name = c_string(name, &path())?;

        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| ScanError::OutOfMemory { path: path() })?;
        buf.resize(capacity, 0);

        // SAFETY: `buf` holds `capacity` bytes and at most `capacity - 1` are
        // written, leaving the last one as terminator.
        let len = unsafe {
            libc::readlinkat(
                self.raw_fd(),
                c_name.as_ptr(),
                buf.as_mut_ptr().cast(),
                capacity.saturating_sub(1),
            )
        };
        if len < 0 {
            return Err(ScanError::io(path(), io::Error::last_os_error()));
        }

        buf.truncate(len as usize);
        Ok(OsString::from_vec(buf))
    }
}

fn c_string(name: &OsStr, path: &Path) -> Result<CString, ScanError> {
    CString::new(name.as_bytes()).map_err(|_| ScanError::InvalidName {
        path: path.to_path_buf(),
    })
}

/// `open`, or `openat` relative to `dir`, returning an owned descriptor.
fn open_dir(
    dir: Option<BorrowedFd<'_>>,
    name: &OsStr,
    flags: libc::c_int,
    path: &Path,
) -> Result<OwnedFd, ScanError> {
    let c_name = c_string(name, path)?;

    // SAFETY: `c_name` is NUL terminated and `dir` is an open descriptor.
    let fd = unsafe {
        match dir {
            Some(dir) => libc::openat(dir.as_raw_fd(), c_name.as_ptr(), flags),
            None => libc::open(c_name.as_ptr(), flags),
        }
    };
    if fd < 0 {
        return Err(ScanError::io(path, io::Error::last_os_error()));
    }

    // SAFETY: `fd` was just returned by the kernel and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn fstat(fd: BorrowedFd<'_>) -> io::Result<libc::stat> {
    let mut st = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: `st` is a valid out pointer for one `stat` record.
    if unsafe { libc::fstat(fd.as_raw_fd(), st.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fstat` succeeded and filled the record.
    Ok(unsafe { st.assume_init() })
}

fn fstatat_nofollow(dir: BorrowedFd<'_>, name: &CStr) -> io::Result<libc::stat> {
    let mut st = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: `name` is NUL terminated and `st` is a valid out pointer.
    let rc = unsafe {
        libc::fstatat(
            dir.as_raw_fd(),
            name.as_ptr(),
            st.as_mut_ptr(),
            libc::AT_SYMLINK_NOFOLLOW,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fstatat` succeeded and filled the record.
    Ok(unsafe { st.assume_init() })
}

#[allow(clippy::unnecessary_cast)]
fn raw_entry(name: OsString, st: &libc::stat) -> RawDirEntry {
    RawDirEntry {
        name,
        mode: st.st_mode as u32,
        size: st.st_size.max(0) as u64,
        mtime: st.st_mtime as i64,
        dev: st.st_dev as u64,
        rdev: st.st_rdev as u64,
        uid: st.st_uid as u32,
        gid: st.st_gid as u32,
        ino: st.st_ino as u64,
        nlink: st.st_nlink as u64,
        flags: EntryFlags::empty(),
    }
}
