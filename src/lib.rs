//! Copier Core Library
//!
//! This library provides the core functionality for the copier tool, which
//! copies files and directory trees from a namespace-addressed remote
//! filesystem to local storage, tracking per-item and aggregate progress.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fs`] - Filesystem handle contract and the directory-backed provider
//! - [`copy`] - Copy engine, bandwidth throttling and checksum verification
//! - [`task`] - Task/item state and the concurrent orchestrator
//! - [`config`] - Process configuration loading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod copy;
pub mod fs;
pub mod task;

// Re-export commonly used types
pub use config::{CopierConfig, ConfigError, DEFAULT_THREAD_POOL_SIZE};
pub use copy::{CopyEngine, CopyError, CopyOutcome, ThrottledReader};
pub use fs::{
    ByteStream, FileStatus, FileSystemProvider, FsError, LocalFileSystemProvider,
    RemoteFileSystem,
};
pub use task::{
    CopyItem, CopyItemSnapshot, CopyOrchestrator, CopyTask, CopyTaskSnapshot, ItemStatus,
    TaskError, TaskStatus,
};
