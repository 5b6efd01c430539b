//! Copy task state, status aggregation and snapshots.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::{CopyItem, CopyItemSnapshot, ItemStatus};

/// Status of a copy task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TaskStatus {
    /// Registered, not yet dispatched.
    Pending = 0,
    /// Items dispatched; at least one not yet terminal.
    InProgress = 1,
    /// Every item completed.
    Completed = 2,
    /// Every item failed, or the completion wait was interrupted.
    Failed = 3,
    /// Some items completed and some failed.
    PartiallyFailed = 4,
}

impl TaskStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::PartiallyFailed => "partially_failed",
        }
    }

    /// Returns true for `Completed`, `Failed` and `PartiallyFailed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::PartiallyFailed
        )
    }

    /// Aggregates terminal item outcomes into a task status.
    ///
    /// No failures is `Completed`, all failures is `Failed`, anything in
    /// between is `PartiallyFailed`.
    #[must_use]
    pub fn aggregate(total: usize, failed: usize) -> Self {
        if failed == 0 {
            Self::Completed
        } else if failed >= total {
            Self::Failed
        } else {
            Self::PartiallyFailed
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::InProgress,
            2 => Self::Completed,
            4 => Self::PartiallyFailed,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "partially_failed" => Ok(Self::PartiallyFailed),
            _ => Err(format!("invalid task status: {s}")),
        }
    }
}

/// A submitted batch of items sharing a namespace and bandwidth limit.
///
/// The item list is fixed at creation. Status only moves forward:
/// `Pending`, then `InProgress`, then exactly one terminal value.
#[derive(Debug)]
pub struct CopyTask {
    id: String,
    namespace: String,
    bandwidth_limit: Option<u32>,
    status: AtomicU8,
    items: Vec<Arc<CopyItem>>,
    created_at: DateTime<Utc>,
    completed_at: OnceLock<DateTime<Utc>>,
}

impl CopyTask {
    /// Creates a pending task with a fresh UUID v4 id.
    pub fn new(
        namespace: impl Into<String>,
        bandwidth_limit: Option<u32>,
        items: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            namespace: namespace.into(),
            bandwidth_limit,
            status: AtomicU8::new(TaskStatus::Pending as u8),
            items: items
                .into_iter()
                .map(|(source, dest)| Arc::new(CopyItem::new(source, dest)))
                .collect(),
            created_at: Utc::now(),
            completed_at: OnceLock::new(),
        }
    }

    /// Task id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Namespace all items are copied from.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Bandwidth limit in MB/s, if any.
    #[must_use]
    pub fn bandwidth_limit(&self) -> Option<u32> {
        self.bandwidth_limit
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Items in submission order.
    #[must_use]
    pub fn items(&self) -> &[Arc<CopyItem>] {
        &self.items
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time the task reached a terminal status.
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.get().copied()
    }

    /// Moves a pending task to `InProgress`.
    pub(crate) fn mark_in_progress(&self) -> bool {
        self.status
            .compare_exchange(
                TaskStatus::Pending as u8,
                TaskStatus::InProgress as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Computes the terminal status from the items and records it.
    ///
    /// Call only once every item is terminal. Returns the task's final
    /// status, which is the existing one if the task was already terminal.
    pub(crate) fn finalize(&self) -> TaskStatus {
        let failed = self
            .items
            .iter()
            .filter(|item| item.status() == ItemStatus::Failed)
            .count();
        self.finish(TaskStatus::aggregate(self.items.len(), failed))
    }

    /// Forces the task to `Failed`. Used when the completion wait is interrupted.
    pub(crate) fn force_failed(&self) -> TaskStatus {
        self.finish(TaskStatus::Failed)
    }

    fn finish(&self, terminal: TaskStatus) -> TaskStatus {
        let mut current = self.status.load(Ordering::Acquire);
        loop {
            let status = TaskStatus::from_u8(current);
            if status.is_terminal() {
                return status;
            }
            let _ = self.completed_at.set(Utc::now());
            match self.status.compare_exchange_weak(
                current,
                terminal as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return terminal,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns a point-in-time view of the task and its items.
    #[must_use]
    pub fn snapshot(&self) -> CopyTaskSnapshot {
        let status = self.status();
        CopyTaskSnapshot {
            id: self.id.clone(),
            namespace: self.namespace.clone(),
            bandwidth_limit: self.bandwidth_limit,
            status,
            items: self.items.iter().map(|item| item.snapshot()).collect(),
            created_at: self.created_at,
            completed_at: self.completed_at(),
        }
    }
}

/// Read-only view of a [`CopyTask`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyTaskSnapshot {
    /// Task id.
    pub id: String,
    /// Namespace.
    pub namespace: String,
    /// Bandwidth limit in MB/s, if any.
    pub bandwidth_limit: Option<u32>,
    /// Status at snapshot time.
    pub status: TaskStatus,
    /// Items in submission order.
    pub items: Vec<CopyItemSnapshot>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time the task reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl CopyTaskSnapshot {
    /// Returns true if the task has reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Number of completed items.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.count(ItemStatus::Completed)
    }

    /// Number of failed items.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    /// Sum of bytes copied over all items.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|item| item.bytes_copied).sum()
    }

    fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }
}
