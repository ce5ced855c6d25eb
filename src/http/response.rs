//! Outbound response heads and SSE framing.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::{AppError, Result};

/// Comment frame written to idle streams; SSE parsers ignore it.
pub const KEEP_ALIVE_FRAME: &[u8] = b":\n\n";

/// Status line used for a response head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `200 OK`.
    Ok,
    /// `202 Accepted`, reserved for the handshake-completion notification.
    Accepted,
}

impl Status {
    /// Numeric status code.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Accepted => 202,
        }
    }

    fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Accepted => "Accepted",
        }
    }
}

/// Response head opening a long-lived event stream.
#[must_use]
pub fn stream_head() -> Bytes {
    head(Status::Ok, "keep-alive")
}

/// Response head for a single-shot request connection.
#[must_use]
pub fn request_head(status: Status) -> Bytes {
    head(status, "close")
}

fn head(status: Status, connection: &str) -> Bytes {
    Bytes::from(format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: text/event-stream\r\n\
         Cache-Control: no-cache\r\n\
         Connection: {connection}\r\n\
         \r\n",
        status.code(),
        status.reason(),
    ))
}

/// Frame `message` as an SSE data event: `data: <compact json>\n\n`.
///
/// # Errors
///
/// Returns `AppError::Encode` if `message` cannot be serialized.
pub fn data_frame<T: Serialize + ?Sized>(message: &T) -> Result<Bytes> {
    let json = serde_json::to_vec(message)
        .map_err(|err| AppError::Encode(format!("failed to serialize message: {err}")))?;

    let mut frame = BytesMut::with_capacity(json.len() + 8);
    frame.put_slice(b"data: ");
    frame.put_slice(&json);
    frame.put_slice(b"\n\n");
    Ok(frame.freeze())
}
