//! VFS error types.
//!
//! Host failures are classified into a handful of categories the transport
//! cares about. Everything else travels as [`VfsError::Host`] with the raw
//! errno intact, so the transport can re-encode it without losing detail.

use std::io;
use std::path::Path;

use rustix::io::Errno;
use thiserror::Error;

use super::types::OpenHandle;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path does not exist where existence was required.
    #[error("not found: {0}")]
    NotFound(String),

    /// Host access or permission check failed.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Creation target is already occupied.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A data operation was handed a handle that is not open.
    #[error("invalid handle: {0}")]
    InvalidHandle(u64),

    /// Any other host-reported failure.
    #[error("{path}: {errno}")]
    Host {
        /// Resolved path (or handle description) the failure occurred on.
        path: String,
        /// Host error code.
        errno: Errno,
    },
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Classify a host errno raised while operating on `path`.
    pub fn from_errno(errno: Errno, path: &Path) -> Self {
        let path = path.display().to_string();
        match errno {
            Errno::NOENT => Self::not_found(path),
            Errno::ACCESS => Self::permission_denied(path),
            Errno::EXIST => Self::already_exists(path),
            errno => Self::Host { path, errno },
        }
    }

    /// Classify a host errno raised while operating through `handle`.
    ///
    /// `EBADF` means the handle was not open, which is reported as
    /// [`VfsError::InvalidHandle`] rather than a host failure.
    pub fn from_handle_errno(errno: Errno, path: &Path, handle: OpenHandle) -> Self {
        match errno {
            Errno::BADF => Self::InvalidHandle(handle.as_raw()),
            errno => Self::from_errno(errno, path),
        }
    }

    /// The errno a transport should report for this error.
    pub fn errno(&self) -> Errno {
        match self {
            VfsError::NotFound(_) => Errno::NOENT,
            VfsError::PermissionDenied(_) => Errno::ACCESS,
            VfsError::AlreadyExists(_) => Errno::EXIST,
            VfsError::InvalidHandle(_) => Errno::BADF,
            VfsError::Host { errno, .. } => *errno,
        }
    }

    /// Raw errno value, as FUSE replies expect it.
    pub fn raw_os_error(&self) -> i32 {
        self.errno().raw_os_error()
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        let kind = io::Error::from_raw_os_error(e.raw_os_error()).kind();
        io::Error::new(kind, e)
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

/// Anything a host primitive can fail with.
pub(crate) trait IntoErrno {
    fn into_errno(self) -> Errno;
}

impl IntoErrno for Errno {
    fn into_errno(self) -> Errno {
        self
    }
}

impl IntoErrno for io::Error {
    fn into_errno(self) -> Errno {
        Errno::from_io_error(&self).unwrap_or(Errno::IO)
    }
}

/// Attach the failing path (and handle) to a host result.
pub(crate) trait HostResultExt<T> {
    /// Translate a failure on the resolved `path`.
    fn at(self, path: &Path) -> VfsResult<T>;

    /// Translate a failure on `handle`, opened for `path`.
    fn via(self, path: &Path, handle: OpenHandle) -> VfsResult<T>;
}

impl<T, E: IntoErrno> HostResultExt<T> for Result<T, E> {
    fn at(self, path: &Path) -> VfsResult<T> {
        self.map_err(|e| VfsError::from_errno(e.into_errno(), path))
    }

    fn via(self, path: &Path, handle: OpenHandle) -> VfsResult<T> {
        self.map_err(|e| VfsError::from_handle_errno(e.into_errno(), path, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_classification() {
        let path = Path::new("/srv/data/a.txt");

        assert!(matches!(
            VfsError::from_errno(Errno::NOENT, path),
            VfsError::NotFound(p) if p == "/srv/data/a.txt"
        ));
        assert!(matches!(
            VfsError::from_errno(Errno::ACCESS, path),
            VfsError::PermissionDenied(_)
        ));
        assert!(matches!(
            VfsError::from_errno(Errno::EXIST, path),
            VfsError::AlreadyExists(_)
        ));
        assert!(matches!(
            VfsError::from_errno(Errno::NOTEMPTY, path),
            VfsError::Host { errno: Errno::NOTEMPTY, .. }
        ));
    }

    #[test]
    fn test_ebadf_is_invalid_handle_only_through_handles() {
        let path = Path::new("/srv/data/a.txt");
        let handle = OpenHandle::from_raw(42);

        assert!(matches!(
            VfsError::from_handle_errno(Errno::BADF, path, handle),
            VfsError::InvalidHandle(42)
        ));
        assert!(matches!(
            VfsError::from_errno(Errno::BADF, path),
            VfsError::Host { errno: Errno::BADF, .. }
        ));
    }

    #[test]
    fn test_errno_round_trip() {
        let path = Path::new("x");
        for errno in [Errno::NOENT, Errno::ACCESS, Errno::EXIST, Errno::PERM, Errno::NOTDIR] {
            assert_eq!(VfsError::from_errno(errno, path).errno(), errno);
        }
        assert_eq!(VfsError::InvalidHandle(7).errno(), Errno::BADF);
        assert_eq!(VfsError::not_found("x").raw_os_error(), Errno::NOENT.raw_os_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: Result<(), io::Error> =
            Err(io::Error::from_raw_os_error(Errno::EXIST.raw_os_error()));
        assert!(matches!(err.at(Path::new("dup")), Err(VfsError::AlreadyExists(_))));

        let io_err: io::Error = VfsError::not_found("gone").into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_synthetic_io_error_maps_to_eio() {
        let err: Result<(), io::Error> = Err(io::Error::other("no errno"));
        match err.at(Path::new("p")) {
            Err(VfsError::Host { errno, .. }) => assert_eq!(errno, Errno::IO),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
