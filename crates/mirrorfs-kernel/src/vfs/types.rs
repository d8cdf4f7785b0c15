//! Core VFS types.
//!
//! Attribute and volume records are fixed-shape: every field the transport
//! needs is always present, and nothing else is carried.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// File type enumeration, derived from the mode's format bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Named pipe.
    Fifo,
    /// Unix domain socket.
    Socket,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
}

impl FileType {
    /// Decode the format bits of a raw `st_mode`.
    ///
    /// Unrecognised formats are reported as regular files.
    pub fn from_mode(mode: u32) -> Self {
        use rustix::fs::FileType as Host;

        match Host::from_raw_mode(mode as rustix::fs::RawMode) {
            Host::Directory => FileType::Directory,
            Host::Symlink => FileType::Symlink,
            Host::Fifo => FileType::Fifo,
            Host::Socket => FileType::Socket,
            Host::CharacterDevice => FileType::CharDevice,
            Host::BlockDevice => FileType::BlockDevice,
            _ => FileType::File,
        }
    }

    /// Convert a `std` directory-entry file type.
    pub fn from_std(ft: std::fs::FileType) -> Self {
        use std::os::unix::fs::FileTypeExt;

        if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else if ft.is_fifo() {
            FileType::Fifo
        } else if ft.is_socket() {
            FileType::Socket
        } else if ft.is_char_device() {
            FileType::CharDevice
        } else if ft.is_block_device() {
            FileType::BlockDevice
        } else {
            FileType::File
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }
}

/// File attributes, as reported by a non-following stat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// Last access time.
    pub atime: SystemTime,
    /// Last status change time.
    pub ctime: SystemTime,
    /// Group ID.
    pub gid: u32,
    /// Full `st_mode`: format bits plus permission bits.
    pub mode: u32,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Number of hard links.
    pub nlink: u64,
    /// Size in bytes.
    pub size: u64,
    /// User ID.
    pub uid: u32,
}

impl FileAttr {
    /// Build a record from host metadata.
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            atime: unix_time(meta.atime(), meta.atime_nsec()),
            ctime: unix_time(meta.ctime(), meta.ctime_nsec()),
            gid: meta.gid(),
            mode: meta.mode(),
            mtime: unix_time(meta.mtime(), meta.mtime_nsec()),
            nlink: meta.nlink(),
            size: meta.size(),
            uid: meta.uid(),
        }
    }

    /// File type encoded in `mode`.
    pub fn kind(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    /// Permission bits (including setuid/setgid/sticky).
    pub fn perm(&self) -> u16 {
        (self.mode & 0o7777) as u16
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind().is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind().is_dir()
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.kind().is_symlink()
    }
}

/// Seconds + nanoseconds since the epoch; negative seconds predate it.
fn unix_time(secs: i64, nsec: i64) -> SystemTime {
    let nsec = Duration::from_nanos(nsec.clamp(0, 999_999_999) as u64);
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64) + nsec
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + nsec
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: OsString,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<OsString>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<OsString>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

/// Filesystem statistics, as reported by `statvfs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatFs {
    /// Available blocks (to non-root).
    pub bavail: u64,
    /// Free blocks.
    pub bfree: u64,
    /// Total blocks, in `frsize` units.
    pub blocks: u64,
    /// Preferred block size.
    pub bsize: u64,
    /// Available inodes (to non-root).
    pub favail: u64,
    /// Free inodes.
    pub ffree: u64,
    /// Total inodes.
    pub files: u64,
    /// Mount flags.
    pub flag: u64,
    /// Fragment size.
    pub frsize: u64,
    /// Maximum name length.
    pub namemax: u64,
}

/// One timestamp argument to `utimens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetTime {
    /// Set to the current time.
    Now,
    /// Leave unchanged.
    Omit,
    /// Set to an explicit time.
    At(SystemTime),
}

/// Access and modification times for `utimens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimes {
    /// New access time.
    pub atime: SetTime,
    /// New modification time.
    pub mtime: SetTime,
}

impl FileTimes {
    /// Set both timestamps to explicit values.
    pub fn at(atime: SystemTime, mtime: SystemTime) -> Self {
        Self {
            atime: SetTime::At(atime),
            mtime: SetTime::At(mtime),
        }
    }
}

/// Opaque reference to a file opened on the host.
///
/// Wraps the host file descriptor. Valid from a successful `open`/`create`
/// until the matching `release`; the adapter does not track validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenHandle(u64);

impl OpenHandle {
    /// Rebuild a handle from the value a transport stored.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The value a transport stores (e.g. the FUSE `fh`).
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}
