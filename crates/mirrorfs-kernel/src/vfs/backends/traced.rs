//! Call tracing decorator.
//!
//! Wraps any [`VfsOps`] and records one `debug` span per operation with its
//! arguments, plus an event for the outcome. Results pass through untouched,
//! so removing the wrapper never changes behavior.

use std::path::{Path, PathBuf};

use tracing::{Span, debug, debug_span};

use crate::vfs::error::VfsResult;
use crate::vfs::ops::{DirStream, VfsOps};
use crate::vfs::types::{FileAttr, FileTimes, OpenHandle, StatFs};

/// Tracing wrapper around another backend.
#[derive(Debug, Clone)]
pub struct Traced<O> {
    inner: O,
}

impl<O: VfsOps> Traced<O> {
    /// Wrap a backend.
    pub fn new(inner: O) -> Self {
        Self { inner }
    }

    /// Unwrap, returning the backend.
    pub fn into_inner(self) -> O {
        self.inner
    }

    fn call<'a, T>(&'a self, span: Span, f: impl FnOnce(&'a O) -> VfsResult<T>) -> VfsResult<T> {
        let _guard = span.enter();
        debug!("entering");
        let result = f(&self.inner);
        match &result {
            Ok(_) => debug!("exiting"),
            Err(e) => debug!(errno = e.raw_os_error(), error = %e, "exiting with error"),
        }
        result
    }
}

impl<O: VfsOps> VfsOps for Traced<O> {
    fn access(&self, path: &Path, mode: u32) -> VfsResult<()> {
        let span = debug_span!("access", path = %path.display(), mode);
        self.call(span, |o| o.access(path, mode))
    }

    fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let span = debug_span!("getattr", path = %path.display());
        self.call(span, |o| o.getattr(path))
    }

    fn statfs(&self, path: &Path) -> VfsResult<StatFs> {
        let span = debug_span!("statfs", path = %path.display());
        self.call(span, |o| o.statfs(path))
    }

    fn chmod(&self, path: &Path, mode: u32) -> VfsResult<()> {
        let span = debug_span!("chmod", path = %path.display(), mode = format_args!("{:o}", mode));
        self.call(span, |o| o.chmod(path, mode))
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> VfsResult<()> {
        let span = debug_span!("chown", path = %path.display(), ?uid, ?gid);
        self.call(span, |o| o.chown(path, uid, gid))
    }

    fn utimens(&self, path: &Path, times: Option<FileTimes>) -> VfsResult<()> {
        let span = debug_span!("utimens", path = %path.display(), ?times);
        self.call(span, |o| o.utimens(path, times))
    }

    fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<()> {
        let span = debug_span!("mkdir", path = %path.display(), mode = format_args!("{:o}", mode));
        self.call(span, |o| o.mkdir(path, mode))
    }

    fn rmdir(&self, path: &Path) -> VfsResult<()> {
        let span = debug_span!("rmdir", path = %path.display());
        self.call(span, |o| o.rmdir(path))
    }

    fn unlink(&self, path: &Path) -> VfsResult<()> {
        let span = debug_span!("unlink", path = %path.display());
        self.call(span, |o| o.unlink(path))
    }

    fn mknod(&self, path: &Path, mode: u32, dev: u64) -> VfsResult<()> {
        let span = debug_span!(
            "mknod",
            path = %path.display(),
            mode = format_args!("{:o}", mode),
            dev
        );
        self.call(span, |o| o.mknod(path, mode, dev))
    }

    fn symlink(&self, name: &Path, target: &Path) -> VfsResult<()> {
        let span = debug_span!("symlink", name = %name.display(), target = %target.display());
        self.call(span, |o| o.symlink(name, target))
    }

    fn readlink(&self, path: &Path) -> VfsResult<PathBuf> {
        let span = debug_span!("readlink", path = %path.display());
        self.call(span, |o| o.readlink(path))
    }

    fn rename(&self, old: &Path, new: &Path) -> VfsResult<()> {
        let span = debug_span!("rename", old = %old.display(), new = %new.display());
        self.call(span, |o| o.rename(old, new))
    }

    fn link(&self, target: &Path, name: &Path) -> VfsResult<()> {
        let span = debug_span!("link", target = %target.display(), name = %name.display());
        self.call(span, |o| o.link(target, name))
    }

    fn readdir(&self, path: &Path) -> VfsResult<DirStream<'_>> {
        // Only the listing's opening is traced; entries stream lazily afterwards.
        let span = debug_span!("readdir", path = %path.display());
        self.call(span, |o| o.readdir(path))
    }

    fn open(&self, path: &Path, flags: i32) -> VfsResult<OpenHandle> {
        let span = debug_span!(
            "open",
            path = %path.display(),
            flags = format_args!("{:#x}", flags)
        );
        self.call(span, |o| {
            let handle = o.open(path, flags)?;
            debug!(fh = handle.as_raw(), "opened");
            Ok(handle)
        })
    }

    fn create(&self, path: &Path, mode: u32) -> VfsResult<OpenHandle> {
        let span = debug_span!("create", path = %path.display(), mode = format_args!("{:o}", mode));
        self.call(span, |o| {
            let handle = o.create(path, mode)?;
            debug!(fh = handle.as_raw(), "created");
            Ok(handle)
        })
    }

    fn read(
        &self,
        path: &Path,
        length: usize,
        offset: u64,
        handle: OpenHandle,
    ) -> VfsResult<Vec<u8>> {
        let span = debug_span!(
            "read",
            path = %path.display(),
            length,
            offset,
            fh = handle.as_raw()
        );
        self.call(span, |o| o.read(path, length, offset, handle))
    }

    fn write(&self, path: &Path, data: &[u8], offset: u64, handle: OpenHandle) -> VfsResult<usize> {
        let span = debug_span!(
            "write",
            path = %path.display(),
            len = data.len(),
            offset,
            fh = handle.as_raw()
        );
        self.call(span, |o| o.write(path, data, offset, handle))
    }

    fn truncate(&self, path: &Path, length: u64) -> VfsResult<()> {
        let span = debug_span!("truncate", path = %path.display(), length);
        self.call(span, |o| o.truncate(path, length))
    }

    fn flush(&self, path: &Path, handle: OpenHandle) -> VfsResult<()> {
        let span = debug_span!("flush", path = %path.display(), fh = handle.as_raw());
        self.call(span, |o| o.flush(path, handle))
    }

    fn fsync(&self, path: &Path, datasync: bool, handle: OpenHandle) -> VfsResult<()> {
        let span = debug_span!("fsync", path = %path.display(), datasync, fh = handle.as_raw());
        self.call(span, |o| o.fsync(path, datasync, handle))
    }

    fn release(&self, path: &Path, handle: OpenHandle) -> VfsResult<()> {
        let span = debug_span!("release", path = %path.display(), fh = handle.as_raw());
        self.call(span, |o| o.release(path, handle))
    }
}
