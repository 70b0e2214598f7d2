//! Per-connection context and lifecycle tracking.
//!
//! # Responsibilities
//! - Give each accepted connection an ID and its own request counter
//! - Carry that state into every request served on the connection
//! - Track connection state (Open → ClosingAfterResponse → Closed)
//! - Count active connections for graceful shutdown

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::observability::metrics;
use crate::recycle::RequestCounter;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state as seen by the recycling logic.
///
/// Transitions only move forward: a connection never returns to `Open`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// Serving requests.
    Open = 0,
    /// Threshold reached; closes once the current response is flushed.
    ClosingAfterResponse = 1,
    /// Socket closed.
    Closed = 2,
}

impl From<u8> for ConnectionState {
    fn from(val: u8) -> Self {
        match val {
            0 => ConnectionState::Open,
            1 => ConnectionState::ClosingAfterResponse,
            _ => ConnectionState::Closed,
        }
    }
}

#[derive(Debug)]
struct ConnectionShared {
    counter: RequestCounter,
    state: AtomicU8,
}

/// State attached to one downstream connection.
///
/// A clone is inserted into the extensions of every request read from the
/// connection, keyed by this type. All clones share one counter.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    id: ConnectionId,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    shared: Arc<ConnectionShared>,
}

impl ConnectionContext {
    /// Create the context for a freshly accepted connection. The counter starts at zero.
    pub fn new(peer_addr: SocketAddr, local_addr: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            peer_addr,
            local_addr,
            shared: Arc::new(ConnectionShared {
                counter: RequestCounter::new(),
                state: AtomicU8::new(ConnectionState::Open as u8),
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Requests served on this connection.
    pub fn counter(&self) -> &RequestCounter {
        &self.shared.counter
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.shared.state.load(Ordering::Acquire))
    }

    /// Move to `ClosingAfterResponse`. Returns true only for the call that
    /// performed the transition.
    pub fn mark_closing(&self) -> bool {
        self.shared
            .state
            .compare_exchange(
                ConnectionState::Open as u8,
                ConnectionState::ClosingAfterResponse as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to the terminal `Closed` state.
    pub fn mark_closed(&self) {
        self.shared
            .state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }
}

/// Tracks active connections for graceful shutdown.
///
/// Uses a watch channel to tell connection tasks to drain.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
    /// Flipped to true when the server starts draining.
    drain_tx: Arc<watch::Sender<bool>>,
    drain_rx: watch::Receiver<bool>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            active_count: Arc::new(AtomicU64::new(0)),
            drain_tx: Arc::new(tx),
            drain_rx: rx,
        }
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self, context: &ConnectionContext) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::record_connection_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            context: context.clone(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Ask every tracked connection to finish its current exchange and close.
    pub fn begin_drain(&self) {
        self.drain_tx.send_replace(true);
    }

    /// Receiver that changes to true once draining starts.
    pub fn drain_receiver(&self) -> watch::Receiver<bool> {
        self.drain_rx.clone()
    }

    /// Wait until all connections are closed or the deadline passes.
    /// Returns true if every connection closed in time.
    pub async fn wait_for_idle(&self, deadline: Duration) -> bool {
        let wait = async {
            while self.active_count.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(deadline, wait).await.is_ok()
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Marks the connection closed and decrements the active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    context: ConnectionContext,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.context.mark_closed();
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        metrics::record_connection_closed();
        tracing::trace!(
            connection_id = %self.context.id(),
            requests = self.context.counter().current(),
            "Connection closed"
        );
    }
}
