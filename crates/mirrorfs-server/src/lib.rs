//! mirrorfs server library
//!
//! FUSE transport and mount lifecycle for the mirrorfs passthrough adapter.

pub mod config;
pub mod constants;
pub mod fuse;
pub mod inodes;
pub mod mount;

pub use config::{Args, ConfigError, FileConfig, MountConfig};
pub use fuse::FuseTransport;
pub use inodes::InodeTable;
pub use mount::{prepare_mountpoint, run_session, serve};
