//! Constants for the copy module (buffering, throttling).

use std::time::Duration;

/// Read/write buffer size for streaming copies and digest recomputation (64 KiB).
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Bytes per unit of the bandwidth limit (the limit is expressed in MB/s, MB = 1024 * 1024).
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Length of one throttling accounting window.
pub const THROTTLE_WINDOW: Duration = Duration::from_secs(1);

/// How often a throttled wait re-checks the interrupt flag.
pub const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
