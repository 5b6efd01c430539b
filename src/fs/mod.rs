//! Filesystem handle contract consumed by the copy engine.
//!
//! A [`FileSystemProvider`] turns a namespace name into an authenticated
//! [`RemoteFileSystem`] handle. The copy engine only relies on the narrow
//! handle surface defined here (`exists`, `stat`, `list`, `open_read`), so
//! credential acquisition, configuration resolution and handle caching stay
//! entirely inside the provider.
//!
//! Handles are released when dropped; callers acquire one per copy and let
//! scope end release it on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use copier_core::fs::{FileSystemProvider, LocalFileSystemProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = LocalFileSystemProvider::new("/etc/copier/conf");
//! let handle = provider.open("warehouse").await?;
//! for entry in handle.list("/logs").await? {
//!     println!("{} ({} bytes)", entry.path, entry.length);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod local;

pub use error::FsError;
pub use local::{LocalFileSystem, LocalFileSystemProvider, NamespaceConfig};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncRead;

/// Byte stream returned by [`RemoteFileSystem::open_read`].
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Metadata for one remote path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    /// Absolute `/`-separated remote path.
    pub path: String,
    /// Whether the path is a directory.
    pub is_directory: bool,
    /// File length in bytes (0 for directories).
    pub length: u64,
}

impl FileStatus {
    /// Returns the final path component.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

/// An opened, authenticated connection to one namespace's filesystem.
#[async_trait]
pub trait RemoteFileSystem: Send + Sync {
    /// Returns whether `path` exists.
    async fn exists(&self, path: &str) -> Result<bool, FsError>;

    /// Returns metadata for `path`.
    async fn stat(&self, path: &str) -> Result<FileStatus, FsError>;

    /// Lists the direct children of the directory at `path`.
    async fn list(&self, path: &str) -> Result<Vec<FileStatus>, FsError>;

    /// Opens the file at `path` for streaming reads.
    async fn open_read(&self, path: &str) -> Result<ByteStream, FsError>;
}

/// Supplies authenticated handles per namespace.
#[async_trait]
pub trait FileSystemProvider: Send + Sync {
    /// Opens a handle for `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Authentication`] or [`FsError::Configuration`] when
    /// the namespace cannot be opened.
    async fn open(&self, namespace: &str) -> Result<Box<dyn RemoteFileSystem>, FsError>;
}

/// Joins a remote directory path and a child name with a single `/`.
#[must_use]
pub fn join_remote(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    format!("{parent}/{name}")
}
