//! Copying remote paths to the local filesystem.
//!
//! - [`CopyEngine`] copies a file or a directory tree from one namespace
//! - [`ThrottledReader`] caps the read rate with a one-second window
//! - [`DigestReader`] and [`sha256_file`] produce the digests used for
//!   end-to-end verification
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use copier_core::copy::CopyEngine;
//! use copier_core::fs::LocalFileSystemProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(LocalFileSystemProvider::new("/etc/copier/conf"));
//! let engine = CopyEngine::new(provider, true);
//! let outcome = engine
//!     .copy("warehouse", "/logs/2024", Path::new("/tmp/logs"), Some(50))
//!     .await?;
//! println!("{} bytes, verified: {}", outcome.bytes_copied, outcome.checksum_verified);
//! # Ok(())
//! # }
//! ```

mod checksum;
mod constants;
mod engine;
mod error;
mod rate_limiter;

pub use checksum::{DigestReader, sha256_file};
pub use constants::{BUFFER_SIZE, BYTES_PER_MB, INTERRUPT_POLL_INTERVAL, THROTTLE_WINDOW};
pub use engine::{CopyEngine, CopyOutcome, LocalDigestFn};
pub use error::CopyError;
pub use rate_limiter::ThrottledReader;
