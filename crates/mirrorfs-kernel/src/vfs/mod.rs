//! Virtual Filesystem abstraction.
//!
//! This module provides the path-based operation contract a transport
//! drives, and the backend that mirrors a host directory through it.
//! Key components:
//!
//! - [`VfsOps`] - Core trait for filesystem operations
//! - [`Root`] - Immutable mirrored directory and virtual path resolution
//! - [`PassthroughBackend`] - Host filesystem access under a root
//! - [`Traced`] - Per-operation tracing wrapper for any backend
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: Operations use virtual paths. Transports
//!   that speak in inodes keep their own inode ↔ path table.
//! - **Raw handles**: `open`/`create` hand back the host descriptor as an
//!   [`OpenHandle`]; the transport owns pairing each one with a `release`.
//! - **No caching**: every call re-resolves and re-asks the host.

pub mod backends;
mod error;
mod ops;
mod resolve;
mod types;

pub use backends::{PassthroughBackend, Traced};
pub use error::{VfsError, VfsResult};
pub use ops::{DirStream, VfsOps};
pub use resolve::Root;
pub use types::{DirEntry, FileAttr, FileTimes, FileType, OpenHandle, SetTime, StatFs};
