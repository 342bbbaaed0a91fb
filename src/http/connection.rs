//! Handle to the transport connection a request arrived on.

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Cheaply clonable connection handle.
///
/// Handlers may queue extra response headers on it; the coordinator merges
/// them into whatever response it finally writes.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

#[derive(Debug)]
struct ConnectionInner {
    id: u64,
    remote_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    pending_headers: Mutex<Vec<(String, String)>>,
}

impl Connection {
    /// Create a handle for an accepted socket.
    pub fn new(remote_addr: Option<SocketAddr>, local_addr: Option<SocketAddr>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                remote_addr,
                local_addr,
                pending_headers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A connection with no socket behind it (tests, in-process calls).
    pub fn detached() -> Self {
        Self::new(None, None)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Peer address; `None` on unix sockets or detached connections.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr
    }

    /// Queue a header for the next response written on this connection.
    pub fn push_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.pending_headers.lock().push((name.into(), value.into()));
    }

    /// Drain queued headers.
    pub fn take_headers(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.inner.pending_headers.lock())
    }
}
