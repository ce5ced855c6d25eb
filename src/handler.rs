//! Seam between the transport and the embedding application.

use crate::jsonrpc::Message;
use crate::server::{ConnectionId, Server};

/// Application callbacks invoked by [`Server`] connections.
///
/// Both methods run on the connection's task and must not block. Sends made
/// from `on_request` through `server` are queued before the request
/// connection is flushed and closed, so `server.send(conn, ..)` is how a
/// request is answered.
pub trait RequestHandler: Send + Sync + 'static {
    /// A `POST` body decoded into `message` arrived on connection `conn`.
    fn on_request(&self, server: &Server, conn: ConnectionId, message: Message);

    /// Connection `conn` closed. Called exactly once per connection.
    fn on_close(&self, conn: ConnectionId) {
        let _ = conn;
    }
}
