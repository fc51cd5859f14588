//! Last-of-calls guard: among overlapping async calls, only the most recently
//! started one may apply its result.
//!
//! Each call takes a [`Ticket`] from a monotonic counter. A result is applied
//! only if its ticket is still the latest when the caller holds the store's
//! write lock, so a slow early call can never overwrite a faster later one.
//! With a delay the guard also debounces: a call waits out the delay and gives
//! up if a newer call started meanwhile.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Result of a guarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Applied(T),
    /// A newer call superseded this one; its result was dropped.
    Skipped,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }
}

#[derive(Debug, Default)]
pub struct LastOfCalls {
    latest: AtomicU64,
    delay: Duration,
}

impl LastOfCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debouncing guard.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            latest: AtomicU64::new(0),
            delay,
        }
    }

    pub fn begin(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Invalidate every outstanding ticket.
    pub fn cancel_all(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Wait out the debounce delay. `false` if a newer call started meanwhile.
    pub async fn settle(&self, ticket: Ticket) -> bool {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.is_current(ticket)
    }
}
