//! Copy item state and status definitions.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Sentinel speed shown when no meaningful rate can be computed.
pub const SPEED_NOT_AVAILABLE: &str = "N/A";

/// Status of one copy item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ItemStatus {
    /// Waiting for a worker slot.
    Pending = 0,
    /// Being copied.
    InProgress = 1,
    /// Copied (and verified, when enabled).
    Completed = 2,
    /// Copy failed; see the error message.
    Failed = 3,
}

impl ItemStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::InProgress,
            2 => Self::Completed,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid item status: {s}")),
        }
    }
}

/// One source to destination pair within a task.
///
/// Only the worker running the item writes to it. Counters are published
/// before the status with release ordering, so a reader that observes a
/// terminal status also observes the final counters.
#[derive(Debug)]
pub struct CopyItem {
    source_path: String,
    dest_path: String,
    status: AtomicU8,
    bytes_copied: AtomicU64,
    duration_ms: AtomicU64,
    error_message: OnceLock<String>,
    checksum_verified: AtomicBool,
}

impl CopyItem {
    /// Creates a pending item.
    pub fn new(source_path: impl Into<String>, dest_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            dest_path: dest_path.into(),
            status: AtomicU8::new(ItemStatus::Pending as u8),
            bytes_copied: AtomicU64::new(0),
            duration_ms: AtomicU64::new(0),
            error_message: OnceLock::new(),
            checksum_verified: AtomicBool::new(false),
        }
    }

    /// Remote source path.
    #[must_use]
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Local destination path.
    #[must_use]
    pub fn dest_path(&self) -> &str {
        &self.dest_path
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ItemStatus {
        ItemStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Bytes written so far (final once terminal).
    #[must_use]
    pub fn bytes_copied(&self) -> u64 {
        self.bytes_copied.load(Ordering::Acquire)
    }

    /// Copy duration in milliseconds (0 until terminal).
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms.load(Ordering::Acquire)
    }

    /// Failure description, if the item failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.get().map(String::as_str)
    }

    /// Whether the destination digest matched the source digest.
    #[must_use]
    pub fn checksum_verified(&self) -> bool {
        self.checksum_verified.load(Ordering::Acquire)
    }

    /// Moves a pending item to `InProgress`.
    pub(crate) fn mark_in_progress(&self) -> bool {
        self.status
            .compare_exchange(
                ItemStatus::Pending as u8,
                ItemStatus::InProgress as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Records a successful copy. Ignored if the item is already terminal.
    pub(crate) fn mark_completed(&self, bytes_copied: u64, checksum_verified: bool, duration_ms: u64) {
        if self.status().is_terminal() {
            return;
        }
        self.bytes_copied.store(bytes_copied, Ordering::Release);
        self.checksum_verified
            .store(checksum_verified, Ordering::Release);
        self.duration_ms.store(duration_ms, Ordering::Release);
        self.finish(ItemStatus::Completed);
    }

    /// Records a failure. Ignored if the item is already terminal.
    pub(crate) fn mark_failed(&self, message: impl Into<String>, duration_ms: u64) {
        if self.status().is_terminal() {
            return;
        }
        let _ = self.error_message.set(message.into());
        self.duration_ms.store(duration_ms, Ordering::Release);
        self.finish(ItemStatus::Failed);
    }

    fn finish(&self, terminal: ItemStatus) {
        let mut current = self.status.load(Ordering::Acquire);
        while !ItemStatus::from_u8(current).is_terminal() {
            match self.status.compare_exchange_weak(
                current,
                terminal as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns a point-in-time view of the item.
    #[must_use]
    pub fn snapshot(&self) -> CopyItemSnapshot {
        let status = self.status();
        let bytes_copied = self.bytes_copied();
        let duration_ms = self.duration_ms();
        CopyItemSnapshot {
            source_path: self.source_path.clone(),
            dest_path: self.dest_path.clone(),
            status,
            bytes_copied,
            duration_ms,
            error_message: self.error_message().map(str::to_string),
            checksum_verified: self.checksum_verified(),
            speed: format_speed(bytes_copied, duration_ms),
        }
    }
}

/// Read-only view of a [`CopyItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyItemSnapshot {
    /// Remote source path.
    pub source_path: String,
    /// Local destination path.
    pub dest_path: String,
    /// Status at snapshot time.
    pub status: ItemStatus,
    /// Bytes written.
    pub bytes_copied: u64,
    /// Copy duration in milliseconds.
    pub duration_ms: u64,
    /// Failure description, if any.
    pub error_message: Option<String>,
    /// Whether digest verification passed.
    pub checksum_verified: bool,
    /// Average throughput, e.g. `"12.50 MB/s"`, or `"N/A"`.
    pub speed: String,
}

/// Formats average throughput in MB/s (1 MB = 1024 * 1024 bytes).
///
/// Returns [`SPEED_NOT_AVAILABLE`] when either value is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_speed(bytes_copied: u64, duration_ms: u64) -> String {
    if bytes_copied == 0 || duration_ms == 0 {
        return SPEED_NOT_AVAILABLE.to_string();
    }
    let megabytes = bytes_copied as f64 / (1024.0 * 1024.0);
    let seconds = duration_ms as f64 / 1000.0;
    format!("{:.2} MB/s", megabytes / seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_status_round_trips_through_str() {
        for status in [
            ItemStatus::Pending,
            ItemStatus::InProgress,
            ItemStatus::Completed,
            ItemStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ItemStatus>(), Ok(status));
        }
        assert!("bogus".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn test_new_item_is_pending() {
        let item = CopyItem::new("/src/a", "/dst/a");
        assert_eq!(item.status(), ItemStatus::Pending);
        assert_eq!(item.bytes_copied(), 0);
        assert!(item.error_message().is_none());
        assert!(!item.checksum_verified());
    }

    #[test]
    fn test_item_lifecycle_completed() {
        let item = CopyItem::new("/src/a", "/dst/a");
        assert!(item.mark_in_progress());
        assert_eq!(item.status(), ItemStatus::InProgress);

        item.mark_completed(2048, true, 100);

        let snapshot = item.snapshot();
        assert_eq!(snapshot.status, ItemStatus::Completed);
        assert_eq!(snapshot.bytes_copied, 2048);
        assert_eq!(snapshot.duration_ms, 100);
        assert!(snapshot.checksum_verified);
        assert!(snapshot.error_message.is_none());
    }

    #[test]
    fn test_item_failed_from_pending() {
        let item = CopyItem::new("/src/a", "/dst/a");
        item.mark_failed("interrupted before copy started", 0);
        assert_eq!(item.status(), ItemStatus::Failed);
        assert_eq!(item.error_message(), Some("interrupted before copy started"));
        assert!(!item.mark_in_progress(), "terminal item must not restart");
    }

    #[test]
    fn test_item_terminal_status_is_final() {
        let item = CopyItem::new("/src/a", "/dst/a");
        item.mark_in_progress();
        item.mark_completed(10, true, 5);
        item.mark_failed("late failure", 7);

        assert_eq!(item.status(), ItemStatus::Completed);
        assert!(item.error_message().is_none());
        assert_eq!(item.duration_ms(), 5);
    }

    #[test]
    fn test_format_speed_not_available() {
        assert_eq!(format_speed(0, 1000), SPEED_NOT_AVAILABLE);
        assert_eq!(format_speed(1024, 0), SPEED_NOT_AVAILABLE);
    }

    #[test]
    fn test_format_speed_binary_megabytes() {
        assert_eq!(format_speed(10 * 1024 * 1024, 2000), "5.00 MB/s");
        assert_eq!(format_speed(1024 * 1024, 3000), "0.33 MB/s");
    }

    #[test]
    fn test_snapshot_serializes_snake_case() {
        let item = CopyItem::new("/src/a", "/dst/a");
        item.mark_in_progress();
        let json = serde_json::to_value(item.snapshot()).unwrap_or_default();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["source_path"], "/src/a");
        assert_eq!(json["speed"], SPEED_NOT_AVAILABLE);
    }
}
