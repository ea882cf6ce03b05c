//! Connection identity and the transport handle threaded through a request.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Capture peer address and accept time once per accepted connection
//! - Hand every request on that connection the same opaque handle
//!
//! # Design Decisions
//! - The handle is a cheap `Arc` clone; the transport layer owns the socket
//! - Axum builds it through `Connected`, so it is created once per connection,
//!   not once per request

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::connect_info::Connected;
use axum::serve::IncomingStream;
use tokio::net::TcpListener;

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

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
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

#[derive(Debug)]
struct ConnectionInfo {
    id: ConnectionId,
    peer_addr: SocketAddr,
    accepted_at: Instant,
}

/// Opaque reference to the connection a request arrived on.
///
/// Cloning shares the same connection identity. The gateway context only
/// carries it to the write-back stage; it never reads from or writes to the
/// socket.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    inner: Arc<ConnectionInfo>,
}

impl TransportHandle {
    /// Create a handle for a freshly accepted connection from `peer_addr`.
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(ConnectionInfo {
                id: ConnectionId::new(),
                peer_addr,
                accepted_at: Instant::now(),
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    /// Time since the connection was accepted.
    pub fn age(&self) -> std::time::Duration {
        self.inner.accepted_at.elapsed()
    }

    /// Returns true if both handles refer to the same connection.
    pub fn same_connection(&self, other: &TransportHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Connected<IncomingStream<'_, TcpListener>> for TransportHandle {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        let handle = TransportHandle::new(*stream.remote_addr());
        tracing::trace!(
            connection_id = %handle.id(),
            peer = %handle.peer_addr(),
            "Connection accepted"
        );
        handle
    }
}
