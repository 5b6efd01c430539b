//! Exit code logic for the copier process.
//!
//! Single responsibility: map the task's terminal status to the process exit outcome.

use copier_core::TaskStatus;

use crate::ProcessExit;

/// Determines the process exit outcome from the final task status.
pub(crate) fn determine_exit_outcome(status: TaskStatus) -> ProcessExit {
    match status {
        TaskStatus::Completed => ProcessExit::Success,
        TaskStatus::PartiallyFailed => ProcessExit::Partial,
        TaskStatus::Failed | TaskStatus::Pending | TaskStatus::InProgress => ProcessExit::Failure,
    }
}
