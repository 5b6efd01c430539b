//! Byte-rate throttling for remote read streams.
//!
//! [`ThrottledReader`] wraps any [`AsyncRead`] and caps sustained throughput
//! with a sliding one-second accounting window:
//!
//! - before each read, if the bytes counted in the current window already
//!   reach the cap, the reader waits out the rest of the window and starts a
//!   new one;
//! - if the window has already run out, it restarts without waiting;
//! - the read itself is never truncated, so one large read may overrun the
//!   cap within its window. The next read then pays for it.
//!
//! Waits are sliced so an attached interrupt flag is noticed promptly; an
//! interrupted wait fails the read with `ErrorKind::Interrupted`.
//!
//! # Example
//!
//! ```
//! use copier_core::copy::ThrottledReader;
//! use tokio::io::AsyncReadExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0u8; 4096];
//! let mut reader = ThrottledReader::new(&data[..], 1024 * 1024)?;
//! let mut sink = Vec::new();
//! reader.read_to_end(&mut sink).await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep};
use tracing::trace;

use super::constants::{INTERRUPT_POLL_INTERVAL, THROTTLE_WINDOW};
use super::error::CopyError;

/// Reader adapter enforcing a maximum sustained byte rate.
#[derive(Debug)]
pub struct ThrottledReader<R> {
    inner: R,
    max_bytes_per_second: u64,
    window_start: Instant,
    bytes_in_window: u64,
    pause: Option<Pin<Box<Sleep>>>,
    interrupted: Option<Arc<AtomicBool>>,
}

impl<R> ThrottledReader<R> {
    /// Wraps `inner`, allowing at most `max_bytes_per_second` per window.
    ///
    /// # Errors
    ///
    /// Returns [`CopyError::InvalidBandwidth`] if the rate is zero.
    pub fn new(inner: R, max_bytes_per_second: u64) -> Result<Self, CopyError> {
        if max_bytes_per_second == 0 {
            return Err(CopyError::InvalidBandwidth {
                bytes_per_second: max_bytes_per_second,
            });
        }
        Ok(Self {
            inner,
            max_bytes_per_second,
            window_start: Instant::now(),
            bytes_in_window: 0,
            pause: None,
            interrupted: None,
        })
    }

    /// Attaches an interrupt flag checked during throttled waits.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(flag);
        self
    }

    /// Returns the configured cap.
    #[must_use]
    pub fn max_bytes_per_second(&self) -> u64 {
        self.max_bytes_per_second
    }

    /// Returns the bytes counted in the current window.
    #[must_use]
    pub fn bytes_in_window(&self) -> u64 {
        self.bytes_in_window
    }

    /// Unwraps the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Resolves once a read may proceed under the cap.
    fn poll_throttle(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        loop {
            if self.pause.is_some() {
                if self.is_interrupted() {
                    self.pause = None;
                    return Poll::Ready(Err(interrupted_error()));
                }
                if let Some(pause) = self.pause.as_mut() {
                    ready!(pause.as_mut().poll(cx));
                }
                self.pause = None;
            }

            if self.bytes_in_window < self.max_bytes_per_second {
                return Poll::Ready(Ok(()));
            }

            let elapsed = self.window_start.elapsed();
            if elapsed >= THROTTLE_WINDOW {
                self.window_start = Instant::now();
                self.bytes_in_window = 0;
                return Poll::Ready(Ok(()));
            }

            if self.is_interrupted() {
                return Poll::Ready(Err(interrupted_error()));
            }

            let remaining = THROTTLE_WINDOW - elapsed;
            let wait = if self.interrupted.is_some() {
                remaining.min(INTERRUPT_POLL_INTERVAL)
            } else {
                remaining
            };
            trace!(
                bytes_in_window = self.bytes_in_window,
                remaining_ms = remaining.as_millis(),
                "throttling read"
            );
            self.pause = Some(Box::pin(tokio::time::sleep(wait)));
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ThrottledReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_throttle(cx))?;
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.bytes_in_window += (buf.filled().len() - before) as u64;
        Poll::Ready(Ok(()))
    }
}

fn interrupted_error() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "throttled read interrupted")
}
