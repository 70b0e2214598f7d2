//! Counting TCP acceptor with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Attach a fresh, zeroed request counter to every accepted connection
//! - Enforce max_connections limit via semaphore
//!
//! # Design Decisions
//! - Accept failures are returned to the caller unchanged; the accept loop
//!   treats them as fatal
//! - A socket whose local address cannot be read is dropped on its own and
//!   does not stop the listener
//! - The accept loop is generic over [`Acceptor`] so it can run against any
//!   connection source

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;
use crate::net::connection::ConnectionContext;
use crate::observability::metrics;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),
}

/// Source of downstream connections for the accept loop.
pub trait Acceptor: Send + Sync + 'static {
    /// Wait for the next connection. An error ends the accept loop.
    fn accept(&self) -> impl Future<Output = Result<AcceptedConnection, ListenerError>> + Send;

    /// Address connections arrive on.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// A connection handed out by an [`Acceptor`].
#[derive(Debug)]
pub struct AcceptedConnection {
    pub stream: TcpStream,
    /// Context carrying this connection's request counter.
    pub context: ConnectionContext,
    /// Connection slot, released on drop.
    pub permit: ConnectionPermit,
}

/// A bounded TCP listener that gives every connection its own request counter.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
#[derive(Debug)]
pub struct CountingAcceptor {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
}

impl CountingAcceptor {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Self::from_listener(listener, config.max_connections)
    }

    /// Wrap an already bound listener.
    fn from_listener(listener: TcpListener, max_connections: usize) -> Result<Self, ListenerError> {
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached. The returned
    /// connection carries a brand-new counter at zero.
    pub async fn accept(&self) -> Result<AcceptedConnection, ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ListenerError::Accept(io::Error::other(e)))?;

        let (stream, context) = loop {
            let (stream, peer_addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
            if let Some(context) = connection_context(peer_addr, stream.local_addr()) {
                break (stream, context);
            }
        };
        metrics::record_connection_accepted();

        tracing::debug!(
            connection_id = %context.id(),
            peer_addr = %context.peer_addr(),
            available_permits = self.available_permits(),
            "Connection accepted"
        );

        Ok(AcceptedConnection {
            stream,
            context,
            permit: ConnectionPermit { _permit: permit },
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }
}

impl Acceptor for CountingAcceptor {
    async fn accept(&self) -> Result<AcceptedConnection, ListenerError> {
        CountingAcceptor::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        CountingAcceptor::local_addr(self)
    }
}

/// Build the context for an accepted socket, or `None` when its local
/// address is unknown. Such a socket is dropped; the listener keeps going.
fn connection_context(peer_addr: SocketAddr, local_addr: io::Result<SocketAddr>) -> Option<ConnectionContext> {
    match local_addr {
        Ok(local_addr) => Some(ConnectionContext::new(peer_addr, local_addr)),
        Err(e) => {
            tracing::warn!(
                peer_addr = %peer_addr,
                error = %e,
                "Dropping connection with unreadable local address"
            );
            None
        }
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool,
/// even if the connection task panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
