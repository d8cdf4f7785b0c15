//! Mount lifecycle: prepare the mount point, run the FUSE session, unmount.

use std::path::Path;

use anyhow::{Context, Result, bail};
use fuser::Session;
use tracing::info;

use mirrorfs_kernel::{PassthroughBackend, Traced, VfsOps};

use crate::config::MountConfig;
use crate::fuse::FuseTransport;

/// Create the mount point as a directory if it cannot be stat'ed.
pub fn prepare_mountpoint(mountpoint: &Path) -> Result<()> {
    if std::fs::symlink_metadata(mountpoint).is_err() {
        info!(mountpoint = %mountpoint.display(), "creating mount point");
        std::fs::create_dir(mountpoint)
            .with_context(|| format!("failed to create mount point {}", mountpoint.display()))?;
    }
    Ok(())
}

/// Mount `config.root` at `config.mountpoint` and serve until unmounted or
/// interrupted.
pub async fn serve(config: MountConfig) -> Result<()> {
    let meta = std::fs::metadata(&config.root)
        .with_context(|| format!("cannot access root {}", config.root.display()))?;
    if !meta.is_dir() {
        bail!("root {} is not a directory", config.root.display());
    }
    prepare_mountpoint(&config.mountpoint)?;

    let backend = PassthroughBackend::new(&config.root);
    info!(
        root = %backend.root().path().display(),
        mountpoint = %config.mountpoint.display(),
        trace = config.trace,
        "mounting"
    );

    if config.trace {
        run_session(Traced::new(backend), &config).await
    } else {
        run_session(backend, &config).await
    }
}

/// Run one FUSE session over `ops` on a blocking task.
///
/// Returns when the filesystem is unmounted externally, or after Ctrl-C
/// triggers an unmount and the session drains.
pub async fn run_session<O: VfsOps + 'static>(ops: O, config: &MountConfig) -> Result<()> {
    let transport = FuseTransport::new(ops, config.attr_timeout);
    let mut session = Session::new(transport, &config.mountpoint, &config.mount_options())
        .with_context(|| format!("failed to mount at {}", config.mountpoint.display()))?;
    let mut unmounter = session.unmount_callable();

    let mut worker = tokio::task::spawn_blocking(move || session.run());

    tokio::select! {
        joined = &mut worker => {
            joined
                .context("FUSE session task panicked")?
                .context("FUSE session failed")?;
            info!("filesystem unmounted");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("interrupt received, unmounting");
            unmounter.unmount().context("failed to unmount")?;
            worker
                .await
                .context("FUSE session task panicked")?
                .context("FUSE session failed")?;
        }
    }

    Ok(())
}
