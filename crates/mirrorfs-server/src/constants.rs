//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default filesystem name shown in the mount table.
pub const DEFAULT_FS_NAME: &str = "mirrorfs";

/// Filesystem subtype (`fuse.mirrorfs`).
pub const FS_SUBTYPE: &str = "mirrorfs";

/// How long the kernel may cache attributes and entries we reply with.
pub const DEFAULT_ATTR_TIMEOUT: Duration = Duration::from_secs(1);

/// FUSE root inode number.
pub const FUSE_ROOT_ID: u64 = 1;

/// Inode reported for directory entries we have not looked up yet.
///
/// The kernel ignores `d_ino` unless `use_ino` is set; libfuse uses the same
/// placeholder.
pub const UNKNOWN_INO: u64 = 0xffff_ffff;

/// Preferred I/O size reported as `st_blksize`.
pub const PREFERRED_IO_SIZE: u32 = 4096;
