//! Request decoder for the bridge's HTTP-shaped transport.
//!
//! Two entry points share one head parser:
//!
//! - [`decode`] is a pure function over an accumulated byte slice. It is safe
//!   to call repeatedly with a growing buffer and never panics.
//! - [`HttpDecoder`] is the incremental form used by connections. It
//!   implements [`tokio_util::codec::Decoder`] and remembers how far the
//!   header-terminator search has progressed, so a slowly trickling sender
//!   costs linear rather than quadratic scanning.
//!
//! Header names are lower-cased; when a header repeats, the last occurrence
//! wins. A missing or unparseable `content-length` means an empty body.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::AppError;

/// Blank line that separates the header block from the body.
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Largest single reservation made while waiting for a body.
///
/// `content-length` is client-controlled, so the buffer grows with the bytes
/// that actually arrive rather than with the declared length.
const MAX_BODY_RESERVE: usize = 64 * 1024;

/// One complete inbound HTTP message.
///
/// Start-line fields are `None` when the request line is malformed; callers
/// treat that as an unroutable request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage {
    /// Request method, e.g. `GET`.
    pub method: Option<String>,
    /// Request target as sent, including any query string.
    pub target: Option<String>,
    /// Protocol version token, e.g. `HTTP/1.1`.
    pub version: Option<String>,
    /// Headers keyed by lower-cased name.
    pub headers: HashMap<String, String>,
    /// Exactly `content-length` bytes of body.
    pub body: Bytes,
}

impl HttpMessage {
    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Request target without its query string.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.target
            .as_deref()
            .map(|target| target.split_once('?').map_or(target, |(path, _)| path))
    }
}

/// Result of a [`decode`] call.
///
/// `message` is `None` while the buffer holds an incomplete message, in which
/// case `remainder` is the whole input.
#[derive(Debug, PartialEq, Eq)]
pub struct Decoded<'a> {
    /// The decoded message, if one was complete.
    pub message: Option<HttpMessage>,
    /// Bytes not consumed by `message`.
    pub remainder: &'a [u8],
}

/// Parsed header block, cached by [`HttpDecoder`] while the body trickles in.
#[derive(Debug, Clone)]
struct Head {
    method: Option<String>,
    target: Option<String>,
    version: Option<String>,
    headers: HashMap<String, String>,
    content_length: usize,
}

impl Head {
    fn into_message(self, body: Bytes) -> HttpMessage {
        HttpMessage {
            method: self.method,
            target: self.target,
            version: self.version,
            headers: self.headers,
            body,
        }
    }
}

/// Extract one HTTP message from the front of `buffer`.
///
/// Returns an incomplete result (`message: None`, `remainder: buffer`) until
/// both the header block and `content-length` body bytes are present.
#[must_use]
pub fn decode(buffer: &[u8]) -> Decoded<'_> {
    let incomplete = Decoded {
        message: None,
        remainder: buffer,
    };

    let Some(head_end) = find_terminator(buffer, 0) else {
        return incomplete;
    };

    let head = parse_head(&buffer[..head_end]);
    let body_start = head_end + HEAD_TERMINATOR.len();
    let Some(body_end) = body_start.checked_add(head.content_length) else {
        return incomplete;
    };
    if buffer.len() < body_end {
        return incomplete;
    }

    let body = Bytes::copy_from_slice(&buffer[body_start..body_end]);
    Decoded {
        message: Some(head.into_message(body)),
        remainder: &buffer[body_end..],
    }
}

/// Incremental request decoder.
///
/// Consumes exactly one message per successful `decode` call, leaving any
/// following bytes in the source buffer.
#[derive(Debug, Default)]
pub struct HttpDecoder {
    /// Bytes already searched for the header terminator.
    scanned: usize,
    /// Offset of the terminator and the parsed head, once found.
    head: Option<(usize, Head)>,
}

impl HttpDecoder {
    /// Create a decoder positioned at the start of a message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.scanned = 0;
        self.head = None;
    }
}

impl Decoder for HttpDecoder {
    type Item = HttpMessage;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<HttpMessage>, AppError> {
        if self.head.is_none() {
            // Back up so a terminator split across chunks is still found.
            let from = self.scanned.saturating_sub(HEAD_TERMINATOR.len() - 1);
            match find_terminator(src, from) {
                Some(head_end) => {
                    self.head = Some((head_end, parse_head(&src[..head_end])));
                }
                None => {
                    self.scanned = src.len();
                    return Ok(None);
                }
            }
        }

        let Some((head_end, content_length)) = self
            .head
            .as_ref()
            .map(|(end, head)| (*end, head.content_length))
        else {
            return Ok(None);
        };

        let body_start = head_end + HEAD_TERMINATOR.len();
        let Some(body_end) = body_start.checked_add(content_length) else {
            return Err(AppError::Http(format!(
                "content-length {content_length} is out of range"
            )));
        };
        if src.len() < body_end {
            src.reserve((body_end - src.len()).min(MAX_BODY_RESERVE));
            return Ok(None);
        }

        let frame = src.split_to(body_end).freeze();
        let head = self.head.take().map(|(_, head)| head);
        self.reset();

        Ok(head.map(|head| head.into_message(frame.slice(body_start..))))
    }
}

/// Position of the header terminator at or after `from`.
fn find_terminator(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .map(|pos| from + pos)
}

fn parse_head(raw: &[u8]) -> Head {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text.split('\n').map(|line| line.trim_end_matches('\r'));

    let (method, target, version) = lines.next().map_or((None, None, None), parse_start_line);

    let mut headers = HashMap::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        headers.insert(name.to_ascii_lowercase(), value.trim().to_owned());
    }

    let content_length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);

    Head {
        method,
        target,
        version,
        headers,
        content_length,
    }
}

fn parse_start_line(line: &str) -> (Option<String>, Option<String>, Option<String>) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [method, target, version] if version.starts_with("HTTP/") => (
            Some((*method).to_owned()),
            Some((*target).to_owned()),
            Some((*version).to_owned()),
        ),
        _ => (None, None, None),
    }
}
