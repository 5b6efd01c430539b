//! Error types for filesystem handle acquisition and access.

use thiserror::Error;

/// Errors raised by a [`FileSystemProvider`](super::FileSystemProvider) or
/// one of its handles.
#[derive(Debug, Error)]
pub enum FsError {
    /// Credentials for the namespace could not be established.
    #[error("authentication failed for namespace {namespace}: {reason}")]
    Authentication {
        /// The namespace being opened.
        namespace: String,
        /// Why authentication failed.
        reason: String,
    },

    /// The namespace configuration is missing or invalid.
    #[error("invalid configuration for namespace {namespace}: {reason}")]
    Configuration {
        /// The namespace being opened.
        namespace: String,
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The remote path does not exist.
    #[error("remote path does not exist: {path}")]
    NotFound {
        /// The missing remote path.
        path: String,
    },

    /// The remote path is malformed or escapes the namespace root.
    #[error("invalid remote path: {path}")]
    InvalidPath {
        /// The rejected remote path.
        path: String,
    },

    /// Transport-level failure while talking to the remote filesystem.
    #[error("IO error accessing remote path {path}: {source}")]
    Io {
        /// The remote path being accessed.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    /// Creates an authentication error.
    pub fn authentication(namespace: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Authentication {
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(namespace: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates an IO error, promoting `ErrorKind::NotFound` to [`FsError::NotFound`].
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound { path: path.into() };
        }
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
