//! VFS backends.
//!
//! Backends implement [`VfsOps`](super::VfsOps) against a concrete store.

mod passthrough;
mod traced;

pub use passthrough::PassthroughBackend;
pub use traced::Traced;
