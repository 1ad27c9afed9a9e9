//! Local socket endpoint lifecycle
//!
//! A [`SocketEndpoint`] owns the filesystem location the relay binds to.
//! Auto-allocated endpoints live in a private temporary directory that is
//! removed when the endpoint is dropped or closed. Caller-supplied paths are
//! cleared of stale entries up front and then left alone.

use dockbridge_proto::DEFAULT_SOCKET_FILENAME;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::error::RemoteError;

#[derive(Debug)]
pub struct SocketEndpoint {
    path: PathBuf,
    temp_dir: Option<TempDir>,
}

impl SocketEndpoint {
    /// Prepare the socket location
    ///
    /// `None` or an empty path allocates `docker.sock` inside a fresh
    /// temporary directory. Any other path has whatever entry exists there
    /// removed first.
    pub fn prepare(requested: Option<&Path>) -> Result<Self, RemoteError> {
        match requested.filter(|p| !p.as_os_str().is_empty()) {
            None => Self::temporary(),
            Some(path) => Self::explicit(path),
        }
    }

    fn temporary() -> Result<Self, RemoteError> {
        let temp_dir = tempfile::Builder::new()
            .prefix("dockbridge-")
            .tempdir()
            .map_err(|source| RemoteError::EndpointPrepare {
                path: std::env::temp_dir(),
                source,
            })?;
        let path = temp_dir.path().join(DEFAULT_SOCKET_FILENAME);

        debug!(path = %path.display(), "Allocated temporary socket endpoint");

        Ok(Self {
            path,
            temp_dir: Some(temp_dir),
        })
    }

    fn explicit(path: &Path) -> Result<Self, RemoteError> {
        // symlink_metadata so that a dangling symlink still counts as stale
        if std::fs::symlink_metadata(path).is_ok() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed stale socket"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(RemoteError::EndpointPrepare {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            temp_dir: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the endpoint was auto-allocated and will be removed on cleanup
    pub fn is_temporary(&self) -> bool {
        self.temp_dir.is_some()
    }

    /// Value suitable for `DOCKER_HOST`
    pub fn docker_host(&self) -> String {
        format!("unix://{}", self.path.display())
    }

    /// Run cleanup now and report failures
    ///
    /// Dropping the endpoint performs the same cleanup but ignores errors.
    pub fn close(mut self) -> std::io::Result<()> {
        match self.temp_dir.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_endpoint_is_fresh_and_removed() {
        let endpoint = SocketEndpoint::prepare(None).unwrap();
        let dir = endpoint.path().parent().unwrap().to_path_buf();

        assert!(endpoint.is_temporary());
        assert!(dir.is_dir());
        assert_eq!(
            endpoint.path().file_name().unwrap(),
            DEFAULT_SOCKET_FILENAME
        );
        assert!(!endpoint.path().exists());

        // Something inside the directory must not block removal
        std::fs::write(endpoint.path(), b"x").unwrap();

        endpoint.close().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_temporary_endpoints_are_unique() {
        let a = SocketEndpoint::prepare(None).unwrap();
        let b = SocketEndpoint::prepare(Some(Path::new(""))).unwrap();
        assert!(b.is_temporary());
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_drop_removes_temporary_directory() {
        let endpoint = SocketEndpoint::prepare(None).unwrap();
        let dir = endpoint.path().parent().unwrap().to_path_buf();
        drop(endpoint);
        assert!(!dir.exists());
    }

    #[test]
    fn test_explicit_path_removes_stale_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("docker.sock");
        std::fs::write(&path, b"stale").unwrap();

        let endpoint = SocketEndpoint::prepare(Some(&path)).unwrap();
        assert_eq!(endpoint.path(), path);
        assert!(!endpoint.is_temporary());
        assert!(!path.exists());
        assert_eq!(endpoint.docker_host(), format!("unix://{}", path.display()));

        // Cleanup leaves caller-owned paths alone
        std::fs::write(&path, b"new").unwrap();
        endpoint.close().unwrap();
        assert!(path.exists());
        assert!(temp.path().is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_explicit_path_removes_dangling_symlink() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("docker.sock");
        std::os::unix::fs::symlink(temp.path().join("missing"), &path).unwrap();

        SocketEndpoint::prepare(Some(&path)).unwrap();
        assert!(std::fs::symlink_metadata(&path).is_err());
    }

    #[test]
    fn test_explicit_path_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fresh.sock");

        let endpoint = SocketEndpoint::prepare(Some(&path)).unwrap();
        assert_eq!(endpoint.path(), path);
    }

    #[test]
    fn test_explicit_path_that_cannot_be_removed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taken");
        std::fs::create_dir(&path).unwrap();

        let err = SocketEndpoint::prepare(Some(&path)).unwrap_err();
        assert!(matches!(err, RemoteError::EndpointPrepare { .. }));
        assert!(path.is_dir());
    }
}
