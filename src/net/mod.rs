//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits, fresh request counter)
//!     → connection.rs (context attached to every request, lifecycle tracking)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Open → ClosingAfterResponse → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Connection state reaches request handlers through typed request
//!   extensions, never through the socket address

pub mod connection;
pub mod listener;

pub use connection::{ConnectionContext, ConnectionId, ConnectionState, ConnectionTracker};
pub use listener::{AcceptedConnection, Acceptor, CountingAcceptor, ListenerError};
