//! Error types shared across the bridge.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all bridge failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Socket or file-system I/O failure.
    Io(String),
    /// Unroutable HTTP message: malformed start line, unsupported path or method.
    Http(String),
    /// Request body is not a valid JSON-RPC message.
    Json(String),
    /// Inbound traffic the connection phase does not permit.
    Protocol(String),
    /// Outbound message could not be serialized.
    Encode(String),
    /// Discovery lock file could not be written, read, or removed.
    Discovery(String),
    /// Tool lookup or invocation failure.
    Tool(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::Json(msg) => write!(f, "json: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Encode(msg) => write!(f, "encode: {msg}"),
            Self::Discovery(msg) => write!(f, "discovery: {msg}"),
            Self::Tool(msg) => write!(f, "tool: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
