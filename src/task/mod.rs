//! Copy tasks: item/task state machine and the orchestrator that runs them.
//!
//! # Overview
//!
//! - [`CopyOrchestrator`] accepts submissions, runs items on a bounded
//!   worker pool, and finalizes each task once every item is terminal
//! - [`CopyTask`] and [`CopyItem`] hold live state; [`CopyTaskSnapshot`] and
//!   [`CopyItemSnapshot`] are the read-only views handed to callers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use copier_core::{CopierConfig, CopyOrchestrator, LocalFileSystemProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CopierConfig::default();
//! let provider = Arc::new(LocalFileSystemProvider::new(&config.conf_basedir));
//! let orchestrator = CopyOrchestrator::new(&config, provider)?;
//!
//! let task_id = orchestrator.submit(
//!     "warehouse",
//!     Some(20),
//!     vec![("/logs/app.log".to_string(), "/tmp/app.log".to_string())],
//! );
//! if let Some(task) = orchestrator.wait(&task_id).await {
//!     println!("{}: {}", task.id, task.status);
//! }
//! # Ok(())
//! # }
//! ```

mod copy_task;
mod error;
mod item;
mod orchestrator;

pub use copy_task::{CopyTask, CopyTaskSnapshot, TaskStatus};
pub use error::TaskError;
pub use item::{CopyItem, CopyItemSnapshot, ItemStatus, SPEED_NOT_AVAILABLE, format_speed};
pub use orchestrator::CopyOrchestrator;
