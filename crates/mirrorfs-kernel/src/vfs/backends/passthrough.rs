//! Passthrough backend.
//!
//! Mirrors a host directory one-to-one: every operation resolves its
//! virtual path under the root and hands it to the matching host primitive.

use std::fs;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

use rustix::fs::{
    AtFlags, CWD, Mode, OFlags, RawMode, SeekFrom, Timespec, Timestamps, UTIME_NOW, UTIME_OMIT,
};

use crate::vfs::error::{HostResultExt, VfsError, VfsResult};
use crate::vfs::ops::{DirStream, VfsOps};
use crate::vfs::resolve::Root;
use crate::vfs::types::{DirEntry, FileAttr, FileTimes, FileType, OpenHandle, SetTime, StatFs};

/// Passthrough filesystem backend.
///
/// All operations are relative to the root. If the root is
/// `/srv/export`, then `getattr("/src/main.rs")` stats
/// `/srv/export/src/main.rs`.
///
/// There is no path sandboxing beyond the join: `..` components and
/// symlinks are interpreted by the host exactly as a native caller's would be.
#[derive(Debug, Clone)]
pub struct PassthroughBackend {
    root: Root,
}

impl PassthroughBackend {
    /// Create a backend mirroring the given host directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_root(Root::new(root))
    }

    /// Create a backend from an already-built root.
    pub fn with_root(root: Root) -> Self {
        Self { root }
    }

    /// Get the root.
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Resolve a virtual path to its host path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.resolve(path)
    }
}

/// Borrow the descriptor behind a handle for the duration of one call.
fn handle_fd<'a>(handle: OpenHandle) -> VfsResult<BorrowedFd<'a>> {
    let raw = RawFd::try_from(handle.as_raw())
        .map_err(|_| VfsError::InvalidHandle(handle.as_raw()))?;
    // SAFETY: handles reach data operations only between a successful
    // open/create and the matching release, so `raw` is an open descriptor
    // owned by this process for the whole call.
    Ok(unsafe { BorrowedFd::borrow_raw(raw) })
}

fn timespec(time: SetTime) -> Timespec {
    match time {
        SetTime::Now => Timespec {
            tv_sec: 0,
            tv_nsec: UTIME_NOW,
        },
        SetTime::Omit => Timespec {
            tv_sec: 0,
            tv_nsec: UTIME_OMIT,
        },
        SetTime::At(t) => {
            let (secs, nsecs) = match t.duration_since(std::time::UNIX_EPOCH) {
                Ok(d) => (d.as_secs() as i64, d.subsec_nanos() as i64),
                Err(e) => {
                    // Before the epoch: round down to a whole second, then add back nanos.
                    let d = e.duration();
                    let mut secs = -(d.as_secs() as i64);
                    let mut nsecs = d.subsec_nanos() as i64;
                    if nsecs > 0 {
                        secs -= 1;
                        nsecs = 1_000_000_000 - nsecs;
                    }
                    (secs, nsecs)
                }
            };
            Timespec {
                tv_sec: secs as _,
                tv_nsec: nsecs as _,
            }
        }
    }
}

impl VfsOps for PassthroughBackend {
    fn access(&self, path: &Path, mode: u32) -> VfsResult<()> {
        let full_path = self.resolve(path);
        rustix::fs::access(&full_path, rustix::fs::Access::from_bits_truncate(mode as _))
            .map_err(|_| VfsError::permission_denied(full_path.display().to_string()))
    }

    fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let full_path = self.resolve(path);
        let meta = fs::symlink_metadata(&full_path).at(&full_path)?;
        Ok(FileAttr::from_metadata(&meta))
    }

    fn statfs(&self, path: &Path) -> VfsResult<StatFs> {
        let full_path = self.resolve(path);
        let stat = rustix::fs::statvfs(&full_path).at(&full_path)?;

        Ok(StatFs {
            bavail: stat.f_bavail,
            bfree: stat.f_bfree,
            blocks: stat.f_blocks,
            bsize: stat.f_bsize,
            favail: stat.f_favail,
            ffree: stat.f_ffree,
            files: stat.f_files,
            flag: stat.f_flag.bits(),
            frsize: stat.f_frsize,
            namemax: stat.f_namemax,
        })
    }

    fn chmod(&self, path: &Path, mode: u32) -> VfsResult<()> {
        let full_path = self.resolve(path);
        fs::set_permissions(&full_path, fs::Permissions::from_mode(mode)).at(&full_path)
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> VfsResult<()> {
        let full_path = self.resolve(path);
        std::os::unix::fs::chown(&full_path, uid, gid).at(&full_path)
    }

    fn utimens(&self, path: &Path, times: Option<FileTimes>) -> VfsResult<()> {
        let full_path = self.resolve(path);
        let times = times.unwrap_or(FileTimes {
            atime: SetTime::Now,
            mtime: SetTime::Now,
        });
        let stamps = Timestamps {
            last_access: timespec(times.atime),
            last_modification: timespec(times.mtime),
        };
        rustix::fs::utimensat(CWD, &full_path, &stamps, AtFlags::empty()).at(&full_path)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<()> {
        let full_path = self.resolve(path);
        fs::DirBuilder::new()
            .mode(mode)
            .create(&full_path)
            .at(&full_path)
    }

    fn rmdir(&self, path: &Path) -> VfsResult<()> {
        let full_path = self.resolve(path);
        fs::remove_dir(&full_path).at(&full_path)
    }

    fn unlink(&self, path: &Path) -> VfsResult<()> {
        let full_path = self.resolve(path);
        fs::remove_file(&full_path).at(&full_path)
    }

    fn mknod(&self, path: &Path, mode: u32, dev: u64) -> VfsResult<()> {
        let full_path = self.resolve(path);
        let raw = mode as RawMode;
        rustix::fs::mknodat(
            CWD,
            &full_path,
            rustix::fs::FileType::from_raw_mode(raw),
            Mode::from_raw_mode(raw),
            dev as _,
        )
        .at(&full_path)
    }

    fn symlink(&self, name: &Path, target: &Path) -> VfsResult<()> {
        let full_path = self.resolve(name);
        std::os::unix::fs::symlink(target, &full_path).at(&full_path)
    }

    fn readlink(&self, path: &Path) -> VfsResult<PathBuf> {
        let full_path = self.resolve(path);
        let target = fs::read_link(&full_path).at(&full_path)?;

        if target.is_absolute() {
            Ok(self.root.relativize(&target))
        } else {
            Ok(target)
        }
    }

    fn rename(&self, old: &Path, new: &Path) -> VfsResult<()> {
        let old_path = self.resolve(old);
        let new_path = self.resolve(new);
        fs::rename(&old_path, &new_path).at(&old_path)
    }

    fn link(&self, target: &Path, name: &Path) -> VfsResult<()> {
        let target_path = self.resolve(target);
        let name_path = self.resolve(name);
        fs::hard_link(&target_path, &name_path).at(&name_path)
    }

    fn readdir(&self, path: &Path) -> VfsResult<DirStream<'_>> {
        let full_path = self.resolve(path);
        let host = fs::read_dir(&full_path).at(&full_path)?;

        let dots = [DirEntry::directory("."), DirEntry::directory("..")]
            .into_iter()
            .map(Ok);

        let entries = host.map(move |entry| {
            let entry = entry.at(&full_path)?;
            let file_type = entry.file_type().at(&entry.path())?;
            Ok(DirEntry::new(entry.file_name(), FileType::from_std(file_type)))
        });

        Ok(Box::new(dots.chain(entries)))
    }

    fn open(&self, path: &Path, flags: i32) -> VfsResult<OpenHandle> {
        let full_path = self.resolve(path);
        let flags = OFlags::from_bits_retain(flags as _) | OFlags::CLOEXEC;
        let fd = rustix::fs::open(&full_path, flags, Mode::empty()).at(&full_path)?;
        Ok(OpenHandle::from_raw(fd.into_raw_fd() as u64))
    }

    fn create(&self, path: &Path, mode: u32) -> VfsResult<OpenHandle> {
        let full_path = self.resolve(path);
        let flags = OFlags::WRONLY | OFlags::CREATE | OFlags::CLOEXEC;
        let fd = rustix::fs::open(&full_path, flags, Mode::from_raw_mode(mode as RawMode))
            .at(&full_path)?;
        Ok(OpenHandle::from_raw(fd.into_raw_fd() as u64))
    }

    fn read(
        &self,
        path: &Path,
        length: usize,
        offset: u64,
        handle: OpenHandle,
    ) -> VfsResult<Vec<u8>> {
        let fd = handle_fd(handle)?;
        rustix::fs::seek(fd, SeekFrom::Start(offset)).via(path, handle)?;

        let mut buffer = vec![0u8; length];
        let bytes_read = rustix::io::read(fd, &mut buffer).via(path, handle)?;
        buffer.truncate(bytes_read);

        Ok(buffer)
    }

    fn write(&self, path: &Path, data: &[u8], offset: u64, handle: OpenHandle) -> VfsResult<usize> {
        let fd = handle_fd(handle)?;
        rustix::fs::seek(fd, SeekFrom::Start(offset)).via(path, handle)?;
        rustix::io::write(fd, data).via(path, handle)
    }

    fn truncate(&self, path: &Path, length: u64) -> VfsResult<()> {
        let full_path = self.resolve(path);

        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&full_path)
            .at(&full_path)?;

        file.set_len(length).at(&full_path)
    }

    fn flush(&self, path: &Path, handle: OpenHandle) -> VfsResult<()> {
        let fd = handle_fd(handle)?;
        rustix::fs::fsync(fd).via(path, handle)
    }

    fn fsync(&self, path: &Path, _datasync: bool, handle: OpenHandle) -> VfsResult<()> {
        self.flush(path, handle)
    }

    fn release(&self, path: &Path, handle: OpenHandle) -> VfsResult<()> {
        let fd = handle_fd(handle)?;
        rustix::io::fcntl_getfd(fd).via(path, handle)?;

        // SAFETY: the descriptor is open (checked above) and release is the
        // single point where ownership returns to us; dropping closes it.
        drop(unsafe { OwnedFd::from_raw_fd(fd.as_raw_fd()) });
        Ok(())
    }
}
