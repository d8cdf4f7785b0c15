//! mirrorfs binary
//!
//! Mirrors a host directory at a FUSE mount point.
//!
//! ## Usage
//!
//! ```bash
//! # Mirror /srv/data at /mnt/data (mount point created if missing)
//! mirrorfs /srv/data /mnt/data
//!
//! # Log every operation
//! RUST_LOG=debug mirrorfs /srv/data /mnt/data --trace
//!
//! # Take settings from a file
//! mirrorfs --config mirrorfs.toml
//! ```

use std::process::ExitCode;

use clap::Parser;
use mirrorfs_server::{Args, MountConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match MountConfig::from_args(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mirrorfs: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = mirrorfs_server::serve(config).await {
        tracing::error!("mirrorfs error: {:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
