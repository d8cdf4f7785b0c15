//! # mirrorfs-kernel
//!
//! Adapter core for mirrorfs, a passthrough filesystem.
//!
//! Every virtual filesystem request is resolved to a path under a fixed
//! [`Root`] and delegated to the equivalent host primitive. Host failures
//! come back as [`VfsError`] with their errno preserved for the transport.
//!
//! ```no_run
//! use std::path::Path;
//! use mirrorfs_kernel::{PassthroughBackend, VfsOps};
//!
//! let backend = PassthroughBackend::new("/srv/export");
//! let attr = backend.getattr(Path::new("/README.md"))?;
//! println!("{} bytes", attr.size);
//! # Ok::<(), mirrorfs_kernel::VfsError>(())
//! ```

pub mod vfs;

pub use vfs::{
    DirEntry, DirStream, FileAttr, FileTimes, FileType, OpenHandle, Root, SetTime, StatFs,
    VfsError, VfsOps, VfsResult,
    backends::{PassthroughBackend, Traced},
};
