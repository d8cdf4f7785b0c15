//! FUSE transport.
//!
//! Decodes kernel requests into [`VfsOps`] calls: inode numbers become
//! virtual paths through the [`InodeTable`], results become FUSE replies, and
//! every [`VfsError`] is reported with its errno.

use std::ffi::{OsStr, OsString};
use std::os::raw::c_int;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileType as FuseFileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use rustix::io::Errno;
use tracing::{info, warn};

use mirrorfs_kernel::{FileAttr, FileTimes, FileType, OpenHandle, SetTime, VfsError, VfsOps};

use crate::constants::{FUSE_ROOT_ID, PREFERRED_IO_SIZE, UNKNOWN_INO};
use crate::inodes::InodeTable;

/// Unwrap a result or send its errno and return from the handler.
macro_rules! try_reply {
    ($reply:expr, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                $reply.error(err);
                return;
            }
        }
    };
}

/// `fuser::Filesystem` over any [`VfsOps`] backend.
pub struct FuseTransport<O> {
    ops: O,
    inodes: InodeTable,
    ttl: Duration,
}

impl<O: VfsOps> FuseTransport<O> {
    /// Create a transport driving `ops`.
    pub fn new(ops: O, ttl: Duration) -> Self {
        Self {
            ops,
            inodes: InodeTable::new(),
            ttl,
        }
    }

    /// Virtual path of `ino`, or `ENOENT` if the kernel never looked it up.
    fn path_of(&self, ino: u64) -> Result<PathBuf, c_int> {
        match self.inodes.path(ino) {
            Some(path) => Ok(path.to_path_buf()),
            None => {
                warn!(ino, "request for unknown inode");
                Err(Errno::NOENT.raw_os_error())
            }
        }
    }

    /// Virtual path of `name` inside directory `parent`.
    fn child_of(&self, parent: u64, name: &OsStr) -> Result<PathBuf, i32> {
        Ok(self.path_of(parent)?.join(name))
    }

    /// Stat `path` and register it with the kernel as a looked-up entry.
    fn entry(&mut self, path: &Path) -> Result<fuser::FileAttr, i32> {
        let attr = self.ops.getattr(path).map_err(errno)?;
        let ino = self.inodes.lookup(path);
        Ok(to_fuse_attr(ino, &attr))
    }

    /// Entries of directory `ino` after the first `skip`, with their
    /// inode numbers and resume offsets.
    ///
    /// Offsets are 1-based cookies: an entry's offset is what the kernel
    /// passes back to resume after it. `.` reports the directory itself,
    /// `..` its parent (the root for the root), and children their inode if
    /// the kernel has looked them up, else a placeholder.
    fn dir_listing(&self, ino: u64, skip: usize) -> Result<Vec<ListedEntry>, c_int> {
        let path = self.path_of(ino)?;
        let entries = self.ops.readdir(&path).map_err(errno)?;

        let parent_ino = path
            .parent()
            .and_then(|p| self.inodes.peek(p))
            .unwrap_or(FUSE_ROOT_ID);

        let mut listing = Vec::new();
        for (index, entry) in entries.enumerate().skip(skip) {
            let entry = entry.map_err(errno)?;
            let entry_ino = if entry.name == "." {
                ino
            } else if entry.name == ".." {
                parent_ino
            } else {
                self.inodes
                    .peek(&path.join(&entry.name))
                    .unwrap_or(UNKNOWN_INO)
            };

            listing.push(ListedEntry {
                ino: entry_ino,
                offset: (index + 1) as i64,
                kind: to_fuse_kind(entry.kind),
                name: entry.name,
            });
        }
        Ok(listing)
    }

    /// Create and open `name` in `parent`, returning its attributes and handle.
    ///
    /// If the new file cannot be stat'ed the handle is closed here: the
    /// kernel never learns about it, so it would never be released.
    fn handle_create(
        &mut self,
        parent: u64,
        name: &OsStr,
        mode: u32,
    ) -> Result<(fuser::FileAttr, OpenHandle), c_int> {
        let path = self.child_of(parent, name)?;
        let handle = self.ops.create(&path, mode).map_err(errno)?;

        match self.entry(&path) {
            Ok(attr) => Ok((attr, handle)),
            Err(err) => {
                if let Err(close_err) = self.ops.release(&path, handle) {
                    warn!(
                        path = %path.display(),
                        error = %close_err,
                        "failed to close handle after create"
                    );
                }
                Err(err)
            }
        }
    }

    fn handle_setattr(
        &mut self,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
    ) -> Result<fuser::FileAttr, i32> {
        let path = self.path_of(ino)?;

        if let Some(mode) = mode {
            self.ops.chmod(&path, mode).map_err(errno)?;
        }
        if uid.is_some() || gid.is_some() {
            self.ops.chown(&path, uid, gid).map_err(errno)?;
        }
        if let Some(size) = size {
            self.ops.truncate(&path, size).map_err(errno)?;
        }
        if atime.is_some() || mtime.is_some() {
            let times = FileTimes {
                atime: set_time(atime),
                mtime: set_time(mtime),
            };
            self.ops.utimens(&path, Some(times)).map_err(errno)?;
        }

        let attr = self.ops.getattr(&path).map_err(errno)?;
        Ok(to_fuse_attr(ino, &attr))
    }
}

/// One `readdir` reply slot.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ListedEntry {
    ino: u64,
    offset: i64,
    kind: FuseFileType,
    name: OsString,
}

fn errno(err: VfsError) -> i32 {
    err.raw_os_error()
}

fn offset(offset: i64) -> Result<u64, i32> {
    u64::try_from(offset).map_err(|_| Errno::INVAL.raw_os_error())
}

fn set_time(time: Option<TimeOrNow>) -> SetTime {
    match time {
        Some(TimeOrNow::SpecificTime(t)) => SetTime::At(t),
        Some(TimeOrNow::Now) => SetTime::Now,
        None => SetTime::Omit,
    }
}

fn to_fuse_kind(kind: FileType) -> FuseFileType {
    match kind {
        FileType::File => FuseFileType::RegularFile,
        FileType::Directory => FuseFileType::Directory,
        FileType::Symlink => FuseFileType::Symlink,
        FileType::Fifo => FuseFileType::NamedPipe,
        FileType::Socket => FuseFileType::Socket,
        FileType::CharDevice => FuseFileType::CharDevice,
        FileType::BlockDevice => FuseFileType::BlockDevice,
    }
}

/// Build the FUSE attribute block.
///
/// The adapter's attribute record carries neither `st_blocks` nor
/// `st_rdev`, so `blocks` is derived from `size` (sparse files report their
/// apparent size to `du`) and device nodes show `rdev` 0. `crtime` and
/// flags are zeroed.
fn to_fuse_attr(ino: u64, attr: &FileAttr) -> fuser::FileAttr {
    fuser::FileAttr {
        ino,
        size: attr.size,
        // st_blocks is always in 512-byte units.
        blocks: attr.size.div_ceil(512),
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: UNIX_EPOCH,
        kind: to_fuse_kind(attr.kind()),
        perm: attr.perm(),
        nlink: u32::try_from(attr.nlink).unwrap_or(u32::MAX),
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: PREFERRED_IO_SIZE,
        flags: 0,
    }
}

impl<O: VfsOps> Filesystem for FuseTransport<O> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!("mirrorfs session initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        info!(inodes = self.inodes.len(), "mirrorfs session destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let path = try_reply!(reply, self.child_of(parent, name));
        let attr = try_reply!(reply, self.entry(&path));
        reply.entry(&self.ttl, &attr, 0);
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let path = try_reply!(reply, self.path_of(ino));
        let attr = try_reply!(reply, self.ops.getattr(&path).map_err(errno));
        reply.attr(&self.ttl, &to_fuse_attr(ino, &attr));
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let attr = try_reply!(reply, self.handle_setattr(ino, mode, uid, gid, size, atime, mtime));
        reply.attr(&self.ttl, &attr);
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let path = try_reply!(reply, self.path_of(ino));
        let target = try_reply!(reply, self.ops.readlink(&path).map_err(errno));
        reply.data(target.as_os_str().as_bytes());
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        let path = try_reply!(reply, self.child_of(parent, name));
        try_reply!(reply, self.ops.mknod(&path, mode, u64::from(rdev)).map_err(errno));
        let attr = try_reply!(reply, self.entry(&path));
        reply.entry(&self.ttl, &attr, 0);
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let path = try_reply!(reply, self.child_of(parent, name));
        try_reply!(reply, self.ops.mkdir(&path, mode).map_err(errno));
        let attr = try_reply!(reply, self.entry(&path));
        reply.entry(&self.ttl, &attr, 0);
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = try_reply!(reply, self.child_of(parent, name));
        try_reply!(reply, self.ops.unlink(&path).map_err(errno));
        self.inodes.remove(&path);
        reply.ok();
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = try_reply!(reply, self.child_of(parent, name));
        try_reply!(reply, self.ops.rmdir(&path).map_err(errno));
        self.inodes.remove(&path);
        reply.ok();
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let path = try_reply!(reply, self.child_of(parent, link_name));
        try_reply!(reply, self.ops.symlink(&path, target).map_err(errno));
        let attr = try_reply!(reply, self.entry(&path));
        reply.entry(&self.ttl, &attr, 0);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        // RENAME_NOREPLACE / RENAME_EXCHANGE need renameat2; plain rename only.
        if flags != 0 {
            reply.error(Errno::INVAL.raw_os_error());
            return;
        }
        let old = try_reply!(reply, self.child_of(parent, name));
        let new = try_reply!(reply, self.child_of(newparent, newname));
        try_reply!(reply, self.ops.rename(&old, &new).map_err(errno));
        self.inodes.rename(&old, &new);
        reply.ok();
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let target = try_reply!(reply, self.path_of(ino));
        let name = try_reply!(reply, self.child_of(newparent, newname));
        try_reply!(reply, self.ops.link(&target, &name).map_err(errno));
        let attr = try_reply!(reply, self.entry(&name));
        reply.entry(&self.ttl, &attr, 0);
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let path = try_reply!(reply, self.path_of(ino));
        let handle = try_reply!(reply, self.ops.open(&path, flags).map_err(errno));
        reply.opened(handle.as_raw(), 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = try_reply!(reply, self.path_of(ino));
        let offset = try_reply!(reply, self::offset(offset));
        let data = try_reply!(
            reply,
            self.ops
                .read(&path, size as usize, offset, OpenHandle::from_raw(fh))
                .map_err(errno)
        );
        reply.data(&data);
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let path = try_reply!(reply, self.path_of(ino));
        let offset = try_reply!(reply, self::offset(offset));
        let written = try_reply!(
            reply,
            self.ops
                .write(&path, data, offset, OpenHandle::from_raw(fh))
                .map_err(errno)
        );
        reply.written(u32::try_from(written).unwrap_or(u32::MAX));
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        let path = try_reply!(reply, self.path_of(ino));
        try_reply!(reply, self.ops.flush(&path, OpenHandle::from_raw(fh)).map_err(errno));
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        // The handle must be closed even if the kernel already forgot the inode.
        let path = self.path_of(ino).unwrap_or_default();
        try_reply!(reply, self.ops.release(&path, OpenHandle::from_raw(fh)).map_err(errno));
        reply.ok();
    }

    fn fsync(&mut self, _req: &Request<'_>, ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        let path = try_reply!(reply, self.path_of(ino));
        try_reply!(
            reply,
            self.ops
                .fsync(&path, datasync, OpenHandle::from_raw(fh))
                .map_err(errno)
        );
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        // Listings are re-read per readdir; no directory handle to keep.
        try_reply!(reply, self.path_of(ino));
        reply.opened(0, 0);
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let skip = try_reply!(reply, self::offset(offset)) as usize;
        let listing = try_reply!(reply, self.dir_listing(ino, skip));

        for entry in listing {
            if reply.add(entry.ino, entry.offset, entry.kind, &entry.name) {
                break;
            }
        }

        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        let path = try_reply!(reply, self.path_of(ino));
        let stat = try_reply!(reply, self.ops.statfs(&path).map_err(errno));
        reply.statfs(
            stat.blocks,
            stat.bfree,
            stat.bavail,
            stat.files,
            stat.ffree,
            u32::try_from(stat.bsize).unwrap_or(u32::MAX),
            u32::try_from(stat.namemax).unwrap_or(u32::MAX),
            u32::try_from(stat.frsize).unwrap_or(u32::MAX),
        );
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let path = try_reply!(reply, self.path_of(ino));
        try_reply!(reply, self.ops.access(&path, mask as u32).map_err(errno));
        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let (attr, handle) = try_reply!(reply, self.handle_create(parent, name, mode));
        reply.created(&self.ttl, &attr, 0, handle.as_raw(), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mirrorfs_kernel::{DirStream, PassthroughBackend, StatFs, VfsResult};
    use tempfile::TempDir;

    /// Passthrough whose `getattr` always fails, counting handle releases.
    struct StatFails {
        inner: PassthroughBackend,
        released: AtomicUsize,
    }

    impl VfsOps for StatFails {
        fn access(&self, path: &Path, mode: u32) -> VfsResult<()> {
            self.inner.access(path, mode)
        }
        fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
            Err(VfsError::permission_denied(path.display().to_string()))
        }
        fn statfs(&self, path: &Path) -> VfsResult<StatFs> {
            self.inner.statfs(path)
        }
        fn chmod(&self, path: &Path, mode: u32) -> VfsResult<()> {
            self.inner.chmod(path, mode)
        }
        fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> VfsResult<()> {
            self.inner.chown(path, uid, gid)
        }
        fn utimens(&self, path: &Path, times: Option<FileTimes>) -> VfsResult<()> {
            self.inner.utimens(path, times)
        }
        fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<()> {
            self.inner.mkdir(path, mode)
        }
        fn rmdir(&self, path: &Path) -> VfsResult<()> {
            self.inner.rmdir(path)
        }
        fn unlink(&self, path: &Path) -> VfsResult<()> {
            self.inner.unlink(path)
        }
        fn mknod(&self, path: &Path, mode: u32, dev: u64) -> VfsResult<()> {
            self.inner.mknod(path, mode, dev)
        }
        fn symlink(&self, name: &Path, target: &Path) -> VfsResult<()> {
            self.inner.symlink(name, target)
        }
        fn readlink(&self, path: &Path) -> VfsResult<PathBuf> {
            self.inner.readlink(path)
        }
        fn rename(&self, old: &Path, new: &Path) -> VfsResult<()> {
            self.inner.rename(old, new)
        }
        fn link(&self, target: &Path, name: &Path) -> VfsResult<()> {
            self.inner.link(target, name)
        }
        fn readdir(&self, path: &Path) -> VfsResult<DirStream<'_>> {
            self.inner.readdir(path)
        }
        fn open(&self, path: &Path, flags: i32) -> VfsResult<OpenHandle> {
            self.inner.open(path, flags)
        }
        fn create(&self, path: &Path, mode: u32) -> VfsResult<OpenHandle> {
            self.inner.create(path, mode)
        }
        fn read(
            &self,
            path: &Path,
            length: usize,
            offset: u64,
            handle: OpenHandle,
        ) -> VfsResult<Vec<u8>> {
            self.inner.read(path, length, offset, handle)
        }
        fn write(
            &self,
            path: &Path,
            data: &[u8],
            offset: u64,
            handle: OpenHandle,
        ) -> VfsResult<usize> {
            self.inner.write(path, data, offset, handle)
        }
        fn truncate(&self, path: &Path, length: u64) -> VfsResult<()> {
            self.inner.truncate(path, length)
        }
        fn flush(&self, path: &Path, handle: OpenHandle) -> VfsResult<()> {
            self.inner.flush(path, handle)
        }
        fn fsync(&self, path: &Path, datasync: bool, handle: OpenHandle) -> VfsResult<()> {
            self.inner.fsync(path, datasync, handle)
        }
        fn release(&self, path: &Path, handle: OpenHandle) -> VfsResult<()> {
            self.released.fetch_add(1, Ordering::SeqCst);
            self.inner.release(path, handle)
        }
    }

    #[test]
    fn test_fuse_attr_conversion() {
        let attr = FileAttr {
            atime: UNIX_EPOCH + Duration::from_secs(1),
            ctime: UNIX_EPOCH + Duration::from_secs(2),
            gid: 20,
            mode: 0o100640,
            mtime: UNIX_EPOCH + Duration::from_secs(3),
            nlink: 1,
            size: 1025,
            uid: 501,
        };

        let fuse = to_fuse_attr(7, &attr);
        assert_eq!(fuse.ino, 7);
        assert_eq!(fuse.kind, FuseFileType::RegularFile);
        assert_eq!(fuse.perm, 0o640);
        assert_eq!(fuse.blocks, 3);
        assert_eq!(fuse.rdev, 0);
        assert_eq!((fuse.uid, fuse.gid), (501, 20));
        assert_eq!(fuse.mtime, attr.mtime);
    }

    #[test]
    fn test_set_time_mapping() {
        let t = UNIX_EPOCH + Duration::from_secs(42);
        assert_eq!(set_time(Some(TimeOrNow::SpecificTime(t))), SetTime::At(t));
        assert_eq!(set_time(Some(TimeOrNow::Now)), SetTime::Now);
        assert_eq!(set_time(None), SetTime::Omit);
    }

    #[test]
    fn test_negative_offset_rejected() {
        assert_eq!(offset(-1), Err(Errno::INVAL.raw_os_error()));
        assert_eq!(offset(4096), Ok(4096));
    }

    #[test]
    fn test_paths_resolve_through_inode_table() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/file.txt"), b"hi").unwrap();

        let mut transport = FuseTransport::new(PassthroughBackend::new(dir.path()), Duration::ZERO);

        let sub = transport.child_of(FUSE_ROOT_ID, OsStr::new("sub")).unwrap();
        assert_eq!(sub, PathBuf::from("/sub"));

        let sub_attr = transport.entry(&sub).unwrap();
        assert_eq!(sub_attr.kind, FuseFileType::Directory);

        let file = transport.child_of(sub_attr.ino, OsStr::new("file.txt")).unwrap();
        assert_eq!(file, PathBuf::from("/sub/file.txt"));
        assert_eq!(transport.entry(&file).unwrap().size, 2);
    }

    #[test]
    fn test_unknown_inode_is_enoent() {
        let dir = TempDir::new().unwrap();
        let transport = FuseTransport::new(PassthroughBackend::new(dir.path()), Duration::ZERO);
        assert_eq!(transport.path_of(999), Err(Errno::NOENT.raw_os_error()));
    }

    #[test]
    fn test_entry_for_missing_path_does_not_allocate() {
        let dir = TempDir::new().unwrap();
        let mut transport = FuseTransport::new(PassthroughBackend::new(dir.path()), Duration::ZERO);

        assert_eq!(
            transport.entry(Path::new("/missing")).unwrap_err(),
            Errno::NOENT.raw_os_error()
        );
        assert!(transport.inodes.is_empty());
    }

    #[test]
    fn test_setattr_fans_out() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f"), b"hello world").unwrap();
        let mut transport = FuseTransport::new(PassthroughBackend::new(dir.path()), Duration::ZERO);
        let ino = transport.entry(Path::new("/f")).unwrap().ino;

        let t = UNIX_EPOCH + Duration::from_secs(1_234_567);
        let attr = transport
            .handle_setattr(
                ino,
                Some(0o600),
                None,
                None,
                Some(5),
                None,
                Some(TimeOrNow::SpecificTime(t)),
            )
            .unwrap();

        assert_eq!(attr.perm, 0o600);
        assert_eq!(attr.size, 5);
        assert_eq!(attr.mtime, t);
        assert_eq!(std::fs::read(dir.path().join("f")).unwrap(), b"hello");
    }

    #[test]
    fn test_dir_listing_numbers_entries_and_picks_inodes() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/seen"), b"").unwrap();
        std::fs::write(dir.path().join("sub/unseen"), b"").unwrap();

        let mut transport = FuseTransport::new(PassthroughBackend::new(dir.path()), Duration::ZERO);
        let sub = transport.entry(Path::new("/sub")).unwrap().ino;
        let seen = transport.entry(Path::new("/sub/seen")).unwrap().ino;

        let listing = transport.dir_listing(sub, 0).unwrap();
        let offsets: Vec<i64> = listing.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![1, 2, 3, 4]);

        assert_eq!(listing[0].name, ".");
        assert_eq!(listing[0].ino, sub);
        assert_eq!(listing[1].name, "..");
        assert_eq!(listing[1].ino, FUSE_ROOT_ID);

        let by_name = |name: &str| listing.iter().find(|e| e.name == name).unwrap().clone();
        assert_eq!(by_name("seen").ino, seen);
        assert_eq!(by_name("seen").kind, FuseFileType::RegularFile);
        assert_eq!(by_name("unseen").ino, UNKNOWN_INO);
    }

    #[test]
    fn test_dir_listing_resumes_after_offset() {
        let dir = TempDir::new().unwrap();
        for name in ["a", "b", "c"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let transport = FuseTransport::new(PassthroughBackend::new(dir.path()), Duration::ZERO);

        let full = transport.dir_listing(FUSE_ROOT_ID, 0).unwrap();
        assert_eq!(full.len(), 5);

        // Resuming from the cookie of entry N yields exactly the entries after it.
        let rest = transport.dir_listing(FUSE_ROOT_ID, full[2].offset as usize).unwrap();
        assert_eq!(rest, full[3..].to_vec());
        assert_eq!(rest[0].offset, 4);

        assert!(transport.dir_listing(FUSE_ROOT_ID, 5).unwrap().is_empty());
    }

    #[test]
    fn test_dir_listing_dotdot_of_nested_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        let mut transport = FuseTransport::new(PassthroughBackend::new(dir.path()), Duration::ZERO);
        let a = transport.entry(Path::new("/a")).unwrap().ino;
        let b = transport.entry(Path::new("/a/b")).unwrap().ino;

        let listing = transport.dir_listing(b, 0).unwrap();
        assert_eq!(listing[0].ino, b);
        assert_eq!(listing[1].ino, a);
        assert_eq!(listing[1].kind, FuseFileType::Directory);
    }

    #[test]
    fn test_dir_listing_of_file_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f"), b"").unwrap();
        let mut transport = FuseTransport::new(PassthroughBackend::new(dir.path()), Duration::ZERO);
        let f = transport.entry(Path::new("/f")).unwrap().ino;

        assert_eq!(
            transport.dir_listing(f, 0).unwrap_err(),
            Errno::NOTDIR.raw_os_error()
        );
    }

    #[test]
    fn test_create_registers_entry_and_returns_open_handle() {
        let dir = TempDir::new().unwrap();
        let mut transport = FuseTransport::new(PassthroughBackend::new(dir.path()), Duration::ZERO);

        let (attr, handle) = transport
            .handle_create(FUSE_ROOT_ID, OsStr::new("new.txt"), 0o644)
            .unwrap();
        assert_eq!(attr.size, 0);
        assert_eq!(transport.inodes.peek(Path::new("/new.txt")), Some(attr.ino));

        transport.ops.release(Path::new("/new.txt"), handle).unwrap();
    }

    #[test]
    fn test_create_closes_handle_when_stat_fails() {
        let dir = TempDir::new().unwrap();
        let ops = StatFails {
            inner: PassthroughBackend::new(dir.path()),
            released: AtomicUsize::new(0),
        };
        let mut transport = FuseTransport::new(ops, Duration::ZERO);

        let err = transport
            .handle_create(FUSE_ROOT_ID, OsStr::new("orphan"), 0o644)
            .unwrap_err();

        assert_eq!(err, Errno::ACCESS.raw_os_error());
        assert_eq!(transport.ops.released.load(Ordering::SeqCst), 1);
        assert!(transport.inodes.peek(Path::new("/orphan")).is_none());
        // The host file was created; only the handle was given back.
        assert!(dir.path().join("orphan").exists());
    }
}
