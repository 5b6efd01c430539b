//! Error types for the copy module.

use std::path::PathBuf;

use thiserror::Error;

use crate::fs::FsError;

/// Errors that can occur while copying one item.
#[derive(Debug, Error)]
pub enum CopyError {
    /// The source path does not exist on the remote filesystem.
    #[error("source path does not exist: {path}")]
    NotFound {
        /// The missing remote path.
        path: String,
    },

    /// Local filesystem error (create directory, create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The local path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The remote stream failed mid-transfer.
    #[error("IO error reading {path}: {source}")]
    Read {
        /// The remote path being streamed.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The written file's digest does not match the digest of the bytes read.
    #[error("checksum mismatch for {path}: source={source_digest}, local={local_digest}")]
    Integrity {
        /// The destination file that failed verification.
        path: PathBuf,
        /// Hex digest of the bytes read from the source.
        source_digest: String,
        /// Hex digest recomputed from the destination file.
        local_digest: String,
    },

    /// A throttled wait observed the interrupt flag.
    #[error("throttled read interrupted while copying {path}")]
    Interrupted {
        /// The remote path being streamed.
        path: String,
    },

    /// The bandwidth limit is not a positive rate.
    #[error("invalid bandwidth limit: {bytes_per_second} bytes/s must be positive")]
    InvalidBandwidth {
        /// The rejected rate.
        bytes_per_second: u64,
    },

    /// Handle acquisition or a remote metadata call failed.
    #[error(transparent)]
    Fs(#[from] FsError),
}

impl CopyError {
    /// Creates a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a local IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a remote read error, mapping `ErrorKind::Interrupted` to
    /// [`CopyError::Interrupted`].
    pub fn read(path: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::Interrupted {
            return Self::Interrupted { path: path.into() };
        }
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a checksum mismatch error.
    pub fn integrity(
        path: impl Into<PathBuf>,
        source_digest: impl Into<String>,
        local_digest: impl Into<String>,
    ) -> Self {
        Self::Integrity {
            path: path.into(),
            source_digest: source_digest.into(),
            local_digest: local_digest.into(),
        }
    }

    /// Returns true if this error was caused by an interrupt.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}
