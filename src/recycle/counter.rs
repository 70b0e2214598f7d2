//! Per-connection request counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Number of requests served on a single downstream connection.
///
/// One counter is created at zero for every accepted connection and is never
/// handed to another connection. Requests on one HTTP/1.1 connection are
/// processed one after another, so relaxed ordering is enough; the atomic is
/// needed because the handle travels inside `Send + Sync` request extensions.
#[derive(Debug, Default)]
pub struct RequestCounter {
    served: AtomicU64,
}

impl RequestCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more request and return the new total.
    pub fn increment(&self) -> u64 {
        self.served.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Requests recorded so far.
    pub fn current(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }
}
