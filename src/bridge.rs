//! MCP-style request handler used by the `agent-bridge` binary.
//!
//! | Method                      | Behaviour                                         |
//! |-----------------------------|---------------------------------------------------|
//! | `initialize`                | Replies with capabilities and server info         |
//! | `notifications/initialized` | Broadcasts a workspace snapshot to all streams    |
//! | `tools/list`                | Replies with the registered tool descriptors      |
//! | `tools/call`                | Runs the tool; result echoed on the same request  |
//! | `ping`                      | Replies with `{}`                                 |
//! | *(other request)*           | `-32601 method not found`                         |
//! | *(other notification)*      | Ignored; logged at `DEBUG`                        |

use std::path::PathBuf;

use serde_json::{json, Value};
use tracing::{debug, info, info_span, warn};

use crate::config::BridgeConfig;
use crate::handler::RequestHandler;
use crate::jsonrpc::{
    Message, INVALID_PARAMS, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_NOT_FOUND,
    METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};
use crate::server::{ConnectionId, Server};
use crate::tools::workspace_folders::WorkspaceFolders;
use crate::tools::ToolRegistry;

/// Protocol revision offered when the client does not name one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Notification pushed to streams once a client completes the handshake.
pub const METHOD_WORKSPACE_SNAPSHOT: &str = "notifications/workspace";

/// Default [`RequestHandler`] answering the agent's JSON-RPC surface.
pub struct BridgeHandler {
    workspace: PathBuf,
    server_name: String,
    tools: ToolRegistry,
}

impl BridgeHandler {
    /// Handler for `config.workspace` with the built-in tools.
    #[must_use]
    pub fn new(config: &BridgeConfig) -> Self {
        Self::with_tools(config, ToolRegistry::builtin(&config.workspace))
    }

    /// Handler with a caller-supplied tool registry.
    #[must_use]
    pub fn with_tools(config: &BridgeConfig, tools: ToolRegistry) -> Self {
        Self {
            workspace: config.workspace.clone(),
            server_name: config.server_name.clone(),
            tools,
        }
    }

    fn initialize_result(&self, params: Option<&Value>) -> Value {
        let protocol_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": { "listChanged": false },
            },
            "serverInfo": {
                "name": self.server_name,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    /// Run `tools/call`; `Err` carries a JSON-RPC error code and message.
    fn call_tool(&self, params: Option<&Value>) -> Result<Value, (i64, String)> {
        let Some(name) = params.and_then(|p| p.get("name")).and_then(Value::as_str) else {
            return Err((INVALID_PARAMS, "missing tool name".into()));
        };
        if !self.tools.contains(name) {
            return Err((INVALID_PARAMS, format!("unknown tool: {name}")));
        }

        let empty = json!({});
        let arguments = params
            .and_then(|p| p.get("arguments"))
            .unwrap_or(&empty);

        let (text, is_error) = match self.tools.call(name, arguments) {
            Ok(text) => (text, false),
            Err(err) => {
                warn!(tool = name, %err, "tool call failed");
                (err.to_string(), true)
            }
        };

        Ok(json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error,
        }))
    }
}

impl RequestHandler for BridgeHandler {
    fn on_request(&self, server: &Server, conn: ConnectionId, message: Message) {
        let span = info_span!("bridge_request", conn_id = %conn, method = ?message.method);
        let _guard = span.enter();

        let id = message.id.clone();
        let params = message.params.as_ref();

        let reply = match message.method() {
            Some(METHOD_INITIALIZE) => Message::response(id, self.initialize_result(params)),
            Some(METHOD_INITIALIZED) => {
                let snapshot = Message::notification(
                    METHOD_WORKSPACE_SNAPSHOT,
                    Some(WorkspaceFolders::snapshot(&self.workspace)),
                );
                let delivered = server.broadcast_to_streams(&snapshot);
                info!(delivered, "client initialized; workspace snapshot broadcast");
                return;
            }
            Some(METHOD_TOOLS_LIST) => {
                Message::response(id, json!({ "tools": self.tools.descriptors() }))
            }
            Some(METHOD_TOOLS_CALL) => match self.call_tool(params) {
                Ok(result) => Message::response(id, result),
                Err((code, text)) => Message::error_response(id, code, text),
            },
            Some(METHOD_PING) => Message::response(id, json!({})),
            Some(other) if message.is_notification() => {
                debug!(method = other, "ignoring notification");
                return;
            }
            Some(other) => {
                Message::error_response(id, METHOD_NOT_FOUND, format!("method not found: {other}"))
            }
            None => {
                debug!("ignoring message without method");
                return;
            }
        };

        if !server.send(conn, &reply) {
            warn!("reply could not be queued; connection already gone");
        }
    }

    fn on_close(&self, conn: ConnectionId) {
        debug!(conn_id = %conn, "connection closed");
    }
}
