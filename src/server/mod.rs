//! Loopback protocol server.
//!
//! [`Server`] owns the listening socket and a registry of live connections.
//! Each accepted socket runs as its own task (see [`connection`]); the
//! registry records which phase every connection is in so that only
//! streaming connections are ever broadcast targets.
//!
//! A `Server` is a cheap handle: clones share the same listener and
//! registry. Call [`Server::shutdown`] to stop it; dropping handles does not.

mod connection;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::BridgeConfig;
use crate::handler::RequestHandler;
use crate::http::response;
use crate::jsonrpc::Message;
use crate::{AppError, Result};

use self::connection::Connection;

/// Identifier assigned to each accepted connection.
///
/// Allocated from a monotonic counter starting at 1 and never reused, so a
/// larger id always means a more recently accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Raw numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Queue feeding encoded frames to a connection task.
type Outbound = mpsc::UnboundedSender<Bytes>;

/// Registry view of a connection's phase.
///
/// Connections in the closing phase are absent from the registry.
enum Route {
    /// Waiting for the first complete message.
    Reading,
    /// Long-lived event stream; a broadcast target.
    Streaming(Outbound),
    /// Single `POST` being answered; reachable only by unicast.
    Request(Outbound),
}

struct Entry {
    route: Route,
    cancel: CancellationToken,
}

struct Inner {
    local_addr: SocketAddr,
    path: String,
    keep_alive: Duration,
    registry: Mutex<BTreeMap<ConnectionId, Entry>>,
    next_id: AtomicU64,
    handler: Arc<dyn RequestHandler>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Handle to a running bridge server.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

impl Server {
    /// Bind `127.0.0.1:config.port` and start accepting connections.
    ///
    /// Port `0` binds an ephemeral port; [`Server::port`] reports the port
    /// actually assigned. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the socket cannot be created, bound, or put
    /// into listening mode.
    pub fn start(config: &BridgeConfig, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let bind = SocketAddr::from(([127, 0, 0, 1], config.port));

        let socket = TcpSocket::new_v4()
            .map_err(|err| AppError::Io(format!("failed to create socket: {err}")))?;
        socket
            .bind(bind)
            .map_err(|err| AppError::Io(format!("failed to bind {bind}: {err}")))?;
        let listener = socket
            .listen(config.backlog)
            .map_err(|err| AppError::Io(format!("failed to listen on {bind}: {err}")))?;
        let local_addr = listener.local_addr()?;

        let server = Self {
            inner: Arc::new(Inner {
                local_addr,
                path: config.path.clone(),
                keep_alive: config.keep_alive_interval(),
                registry: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                handler,
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        };

        info!(%local_addr, path = %config.path, "bridge server listening");

        let acceptor = server.clone();
        server.inner.tracker.spawn(
            acceptor
                .accept_loop(listener)
                .instrument(info_span!("bridge_accept", port = local_addr.port())),
        );

        Ok(server)
    }

    /// Port the listener is bound to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.local_addr.port()
    }

    /// Full socket address of the listener.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Send `message` to connection `conn` as an SSE data frame.
    ///
    /// Works for streaming connections and for request connections whose
    /// handler is still running. Returns `false` when the connection is
    /// unknown, not yet routed, already draining, or the message cannot be
    /// encoded.
    pub fn send(&self, conn: ConnectionId, message: &Message) -> bool {
        let Some(frame) = encode(message) else {
            return false;
        };

        match self.registry().get(&conn).map(|entry| &entry.route) {
            Some(Route::Streaming(tx) | Route::Request(tx)) => tx.send(frame).is_ok(),
            _ => false,
        }
    }

    /// Send `message` to every streaming connection.
    ///
    /// Returns the number of streams the frame was queued on.
    pub fn broadcast_to_streams(&self, message: &Message) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };

        let registry = self.registry();
        let delivered = registry
            .values()
            .filter_map(|entry| match &entry.route {
                Route::Streaming(tx) => Some(tx),
                _ => None,
            })
            .filter(|tx| tx.send(frame.clone()).is_ok())
            .count();

        debug!(delivered, "broadcast to streams");
        delivered
    }

    /// Send `message` to the most recently accepted streaming connection.
    ///
    /// Returns `false` (and sends nothing) when no stream is open.
    pub fn send_to_last_stream(&self, message: &Message) -> bool {
        let Some(frame) = encode(message) else {
            return false;
        };

        let registry = self.registry();
        let last = registry.iter().rev().find_map(|(id, entry)| match &entry.route {
            Route::Streaming(tx) => Some((*id, tx)),
            _ => None,
        });

        match last {
            Some((id, tx)) => {
                debug!(conn_id = %id, "sending to last stream");
                tx.send(frame).is_ok()
            }
            None => false,
        }
    }

    /// Ids of every tracked connection, ascending.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.registry().keys().copied().collect()
    }

    /// Ids of connections in streaming mode, ascending.
    #[must_use]
    pub fn stream_ids(&self) -> Vec<ConnectionId> {
        self.registry()
            .iter()
            .filter(|(_, entry)| matches!(entry.route, Route::Streaming(_)))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of tracked connections in any phase.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry().len()
    }

    /// Close every tracked connection, then the listener.
    ///
    /// `on_close` fires for each connection still tracked. Returns once the
    /// accept loop and all connection tasks have exited. Calling it again is
    /// a no-op.
    pub async fn shutdown(&self) {
        let drained = std::mem::take(&mut *self.registry());
        let closed = drained.len();

        for (id, entry) in drained {
            entry.cancel.cancel();
            self.inner.handler.on_close(id);
        }

        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;

        info!(closed, "bridge server shut down");
    }

    async fn accept_loop(self, listener: TcpListener) {
        loop {
            tokio::select! {
                () = self.inner.cancel.cancelled() => {
                    debug!("accept loop stopping");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let (id, cancel) = self.register();
                            debug!(conn_id = %id, %peer, "connection accepted");
                            let conn = Connection::new(id, stream, self.clone(), cancel);
                            self.inner.tracker.spawn(
                                conn.run().instrument(info_span!("bridge_conn", conn_id = %id)),
                            );
                        }
                        Err(err) => {
                            warn!(%err, "accept failed");
                        }
                    }
                }
            }
        }
    }

    fn register(&self) -> (ConnectionId, CancellationToken) {
        let id = ConnectionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = self.inner.cancel.child_token();
        let entry = Entry {
            route: Route::Reading,
            cancel: cancel.clone(),
        };
        self.registry().insert(id, entry);
        (id, cancel)
    }

    /// Move a tracked connection out of the reading phase.
    ///
    /// Returns `false` if the connection is no longer tracked.
    fn promote(&self, conn: ConnectionId, route: Route) -> bool {
        match self.registry().get_mut(&conn) {
            Some(entry) => {
                entry.route = route;
                true
            }
            None => false,
        }
    }

    /// Drop `conn` from the registry, firing `on_close` if it was tracked.
    fn forget(&self, conn: ConnectionId) {
        let removed = self.registry().remove(&conn);
        if removed.is_some() {
            self.inner.handler.on_close(conn);
        }
    }

    fn dispatch(&self, conn: ConnectionId, message: Message) {
        self.inner.handler.on_request(self, conn, message);
    }

    fn path(&self) -> &str {
        &self.inner.path
    }

    fn keep_alive(&self) -> Duration {
        self.inner.keep_alive
    }

    fn registry(&self) -> MutexGuard<'_, BTreeMap<ConnectionId, Entry>> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn encode(message: &Message) -> Option<Bytes> {
    match response::data_frame(message) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(%err, method = ?message.method, "dropping outbound message");
            None
        }
    }
}
