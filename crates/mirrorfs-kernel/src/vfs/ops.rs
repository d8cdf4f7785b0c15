//! VFS operations trait.
//!
//! The operation contract a transport drives. Paths are virtual (absolute,
//! rooted at the mount); handles are whatever `open`/`create` returned.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::VfsResult;
use super::types::{DirEntry, FileAttr, FileTimes, OpenHandle, StatFs};

/// Lazy directory listing.
///
/// Finite and not restartable; listing the same directory again re-reads it.
pub type DirStream<'a> = Box<dyn Iterator<Item = VfsResult<DirEntry>> + Send + 'a>;

/// Core VFS operations trait.
///
/// Every call is synchronous and self-contained. Implementations keep no
/// per-call state, so `&self` is enough and concurrent callers see whatever
/// consistency the host filesystem provides.
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Metadata & hierarchy
    // ========================================================================

    /// Check `mode` (an `R_OK | W_OK | X_OK` mask, or `F_OK`) against the path.
    fn access(&self, path: &Path, mode: u32) -> VfsResult<()>;

    /// Get attributes without following a trailing symlink.
    fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Statistics for the volume containing `path`.
    fn statfs(&self, path: &Path) -> VfsResult<StatFs>;

    /// Set permission bits.
    fn chmod(&self, path: &Path, mode: u32) -> VfsResult<()>;

    /// Set owner and/or group. `None` leaves that id unchanged.
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> VfsResult<()>;

    /// Set access and modification times. `None` sets both to now.
    fn utimens(&self, path: &Path, times: Option<FileTimes>) -> VfsResult<()>;

    /// Create an empty directory.
    fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<()>;

    /// Remove an empty directory.
    fn rmdir(&self, path: &Path) -> VfsResult<()>;

    /// Remove a non-directory entry.
    fn unlink(&self, path: &Path) -> VfsResult<()>;

    /// Create a filesystem node (regular file, fifo, device, socket).
    fn mknod(&self, path: &Path, mode: u32, dev: u64) -> VfsResult<()>;

    /// Create a symbolic link at `name` storing `target` verbatim.
    fn symlink(&self, name: &Path, target: &Path) -> VfsResult<()>;

    /// Read a symbolic link's target.
    fn readlink(&self, path: &Path) -> VfsResult<PathBuf>;

    /// Rename `old` to `new`.
    fn rename(&self, old: &Path, new: &Path) -> VfsResult<()>;

    /// Create a hard link: `name` becomes a new link to the existing `target`.
    fn link(&self, target: &Path, name: &Path) -> VfsResult<()>;

    /// List a directory: `.` and `..` first, then the host's entries in host order.
    fn readdir(&self, path: &Path) -> VfsResult<DirStream<'_>>;

    // ========================================================================
    // Data
    // ========================================================================

    /// Open an existing file with raw `open(2)` flags.
    fn open(&self, path: &Path, flags: i32) -> VfsResult<OpenHandle>;

    /// Create (if absent) and open a file write-only.
    fn create(&self, path: &Path, mode: u32) -> VfsResult<OpenHandle>;

    /// Read up to `length` bytes at `offset`. Short at end of file.
    fn read(
        &self,
        path: &Path,
        length: usize,
        offset: u64,
        handle: OpenHandle,
    ) -> VfsResult<Vec<u8>>;

    /// Write `data` at `offset`, returning the number of bytes written.
    fn write(&self, path: &Path, data: &[u8], offset: u64, handle: OpenHandle) -> VfsResult<usize>;

    /// Resize the file at `path` to exactly `length` bytes.
    fn truncate(&self, path: &Path, length: u64) -> VfsResult<()>;

    /// Push buffered writes for `handle` to stable storage.
    fn flush(&self, path: &Path, handle: OpenHandle) -> VfsResult<()>;

    /// Same as [`VfsOps::flush`]; `datasync` is accepted but not distinguished.
    fn fsync(&self, path: &Path, datasync: bool, handle: OpenHandle) -> VfsResult<()>;

    /// Close `handle`.
    fn release(&self, path: &Path, handle: OpenHandle) -> VfsResult<()>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Collect a directory listing into entry names.
    fn list_names(&self, path: &Path) -> VfsResult<Vec<OsString>> {
        self.readdir(path)?
            .map(|entry| entry.map(|e| e.name))
            .collect()
    }
}
