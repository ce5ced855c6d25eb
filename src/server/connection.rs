//! Per-socket connection state machine.
//!
//! ```text
//! Reading ──GET──▶ Streaming ───────────────┐
//!    │                                      ▼
//!    └──POST──▶ RequestHandling ──flush──▶ Closing
//! ```
//!
//! Any decode, routing, JSON, or transport error short-circuits to closing.
//! Closing drops the socket, removes the registry entry and fires
//! `on_close` once.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ConnectionId, Route, Server};
use crate::http::response::{self, Status, KEEP_ALIVE_FRAME};
use crate::http::{HttpDecoder, HttpMessage};
use crate::jsonrpc::{Message, METHOD_INITIALIZED};
use crate::{AppError, Result};

/// Initial receive-buffer capacity.
const READ_CAPACITY: usize = 8 * 1024;

/// How the first message on a connection is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Stream,
    Request,
}

/// Registry membership of a live connection.
///
/// Dropping it removes the entry and fires `on_close`, so a connection task
/// that unwinds is still accounted for.
struct Registration {
    server: Server,
    id: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.server.forget(self.id);
    }
}

pub(super) struct Connection {
    id: ConnectionId,
    socket: TcpStream,
    server: Server,
    cancel: CancellationToken,
    buffer: BytesMut,
    decoder: HttpDecoder,
    last_read: Instant,
    last_write: Instant,
    registration: Registration,
}

impl Connection {
    pub(super) fn new(
        id: ConnectionId,
        socket: TcpStream,
        server: Server,
        cancel: CancellationToken,
    ) -> Self {
        let now = Instant::now();
        let registration = Registration {
            server: server.clone(),
            id,
        };
        Self {
            id,
            socket,
            server,
            cancel,
            buffer: BytesMut::with_capacity(READ_CAPACITY),
            decoder: HttpDecoder::new(),
            last_read: now,
            last_write: now,
            registration,
        }
    }

    /// Drive the connection to completion, then close it.
    pub(super) async fn run(mut self) {
        match self.serve().await {
            Ok(()) => debug!("connection finished"),
            Err(err @ (AppError::Http(_) | AppError::Json(_) | AppError::Protocol(_))) => {
                warn!(%err, "closing connection on protocol error");
            }
            Err(err) => debug!(%err, "closing connection on transport error"),
        }
        self.close().await;
    }

    async fn serve(&mut self) -> Result<()> {
        let Some(message) = self.read_message().await? else {
            return Ok(());
        };

        match classify(&message, self.server.path())? {
            Mode::Stream => self.stream().await,
            Mode::Request => self.request(&message).await,
        }
    }

    /// Read until one complete message is buffered.
    ///
    /// Returns `None` on EOF or cancellation.
    async fn read_message(&mut self) -> Result<Option<HttpMessage>> {
        loop {
            if let Some(message) = self.decoder.decode(&mut self.buffer)? {
                return Ok(Some(message));
            }

            tokio::select! {
                () = self.cancel.cancelled() => return Ok(None),
                read = self.socket.read_buf(&mut self.buffer) => {
                    if read? == 0 {
                        debug!("peer closed before sending a complete message");
                        return Ok(None);
                    }
                    self.last_read = Instant::now();
                }
            }
        }
    }

    async fn stream(&mut self) -> Result<()> {
        self.write(&response::stream_head()).await?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if !self.server.promote(self.id, Route::Streaming(tx)) {
            return Ok(());
        }
        debug!("stream opened");

        let interval = self.server.keep_alive();
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                frame = rx.recv() => {
                    let Some(frame) = frame else {
                        return Ok(());
                    };
                    self.write(&frame).await?;
                }
                _ = ticker.tick() => {
                    if self.idle_for(interval) {
                        self.write(KEEP_ALIVE_FRAME).await?;
                        debug!("keep-alive sent");
                    }
                }
                read = self.socket.read_buf(&mut self.buffer) => {
                    if read? == 0 {
                        debug!("peer closed stream");
                        return Ok(());
                    }
                    self.last_read = Instant::now();
                    while let Some(extra) = self.decoder.decode(&mut self.buffer)? {
                        debug!(method = ?extra.method, "ignoring message on stream connection");
                    }
                }
            }
        }
    }

    async fn request(&mut self, message: &HttpMessage) -> Result<()> {
        let rpc = Message::from_slice(&message.body)?;

        let status = if rpc.method() == Some(METHOD_INITIALIZED) {
            Status::Accepted
        } else {
            Status::Ok
        };
        self.write(&response::request_head(status)).await?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if !self.server.promote(self.id, Route::Request(tx)) {
            return Ok(());
        }

        debug!(method = ?rpc.method, status = status.code(), "dispatching request");
        self.server.dispatch(self.id, rpc);

        // Nothing may be queued once the handler has returned; drain what it sent.
        rx.close();
        while let Some(frame) = rx.recv().await {
            self.write(&frame).await?;
        }
        self.socket.flush().await?;

        // The reply is already complete, and the connection closes whichever
        // way this goes; the check only decides how the exit is logged.
        if self.decoder.decode(&mut self.buffer)?.is_some() {
            return Err(AppError::Protocol(
                "second message on a request connection".into(),
            ));
        }

        Ok(())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if let Err(err) = self.socket.write_all(bytes).await {
            warn!(%err, "write failed");
            return Err(AppError::Io(format!("write failed: {err}")));
        }
        self.last_write = Instant::now();
        Ok(())
    }

    fn idle_for(&self, interval: std::time::Duration) -> bool {
        self.last_read.elapsed() >= interval && self.last_write.elapsed() >= interval
    }

    async fn close(mut self) {
        if let Err(err) = self.socket.shutdown().await {
            debug!(%err, "socket shutdown failed");
        }
        drop(self.socket);
        drop(self.registration);
    }
}

/// Decide how the first message is served.
fn classify(message: &HttpMessage, path: &str) -> Result<Mode> {
    let (Some(method), Some(target)) = (message.method.as_deref(), message.path()) else {
        return Err(AppError::Http("malformed request line".into()));
    };

    if target != path {
        return Err(AppError::Http(format!("unsupported path '{target}'")));
    }

    match method {
        "GET" => Ok(Mode::Stream),
        "POST" => Ok(Mode::Request),
        other => Err(AppError::Http(format!("unsupported method '{other}'"))),
    }
}
