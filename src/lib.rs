#![forbid(unsafe_code)]

//! Loopback bridge between a host editor and an external command-line agent.
//!
//! The [`server`] module hosts an HTTP-shaped transport: `GET` opens a
//! Server-Sent-Events stream, `POST` carries a single JSON-RPC message. The
//! embedding application plugs in a [`handler::RequestHandler`]; the
//! [`bridge`] module provides the MCP-style handler used by the binary.

pub mod bridge;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod handler;
pub mod http;
pub mod jsonrpc;
pub mod server;
pub mod tools;

pub use config::BridgeConfig;
pub use errors::{AppError, Result};
pub use server::{ConnectionId, Server};
