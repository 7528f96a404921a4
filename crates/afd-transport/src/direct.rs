//! In-process transport over a local command registry.
//!
//! [`DirectTransport`] answers the three protocol methods without any I/O:
//!
//! | Method | Answer |
//! |--------|--------|
//! | `initialize` | fixed protocol version and server identity |
//! | `tools/list` | the registry's commands as tools |
//! | `tools/call` | the command's result, or an unknown-command diagnostic |
//!
//! Any other method is answered with a "method not found" error response.
//! Every response is also delivered to the message handler before `send`
//! returns it, so a connection manager observes the same event sequence as
//! over the network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use afd_core::handshake::{InitializeResult, ServerCapabilities, ServerInfo};
use afd_core::protocol::{Request, Response, methods};
use afd_core::registry::{CommandContext, CommandRegistry};
use afd_core::suggest::UnknownCommandDiagnostic;
use afd_core::types::{CallToolParams, CallToolResult, ListToolsResult, Tool};
use afd_core::JsonRpcError;
use async_trait::async_trait;
use tracing::trace;

use crate::error::TransportError;
use crate::traits::{CloseHandler, ErrorHandler, MessageHandler, Transport, TransportHandlers, TransportMetadata};

/// Server name reported by the in-process handshake.
pub const DIRECT_SERVER_NAME: &str = "afd-direct";

/// Transport that executes commands against an in-process registry.
pub struct DirectTransport {
    registry: Arc<dyn CommandRegistry>,
    handlers: TransportHandlers,
    connected: AtomicBool,
}

impl DirectTransport {
    /// Create a transport over `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn CommandRegistry>) -> Self {
        Self {
            registry,
            handlers: TransportHandlers::new(),
            connected: AtomicBool::new(false),
        }
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn CommandRegistry> {
        &self.registry
    }

    async fn dispatch(&self, request: Request) -> Result<Response, TransportError> {
        let id = request.id.clone();
        match request.method() {
            methods::INITIALIZE => {
                let result = InitializeResult::new(
                    ServerInfo::new(DIRECT_SERVER_NAME, env!("CARGO_PKG_VERSION")),
                    ServerCapabilities::new().with_tools(),
                );
                Ok(Response::success(id, serde_json::to_value(result)?))
            }
            methods::TOOLS_LIST => {
                let tools = self
                    .registry
                    .list_commands()
                    .into_iter()
                    .map(|info| match self.registry.get_command(&info.name) {
                        Some(definition) => Tool::from(&definition),
                        None => Tool::from(info),
                    })
                    .collect();
                Ok(Response::success(id, serde_json::to_value(ListToolsResult { tools })?))
            }
            methods::TOOLS_CALL => {
                let params = request
                    .params
                    .ok_or_else(|| "missing params".to_string())
                    .and_then(|p| serde_json::from_value::<CallToolParams>(p).map_err(|e| e.to_string()));
                let params = match params {
                    Ok(params) => params,
                    Err(e) => {
                        return Ok(Response::error(
                            id,
                            JsonRpcError::invalid_params(format!("Invalid tools/call params: {e}")),
                        ));
                    }
                };
                let call = self.call_tool(params).await?;
                Ok(Response::success(id, serde_json::to_value(call)?))
            }
            other => Ok(Response::error(id, JsonRpcError::method_not_found(other))),
        }
    }

    async fn call_tool(&self, params: CallToolParams) -> Result<CallToolResult, TransportError> {
        if !self.registry.has_command(&params.name) {
            let diagnostic =
                UnknownCommandDiagnostic::new(&params.name, self.registry.list_command_names());
            return Ok(CallToolResult::json(&diagnostic, true)?);
        }
        let arguments = if params.arguments.is_null() {
            serde_json::json!({})
        } else {
            params.arguments
        };
        let result = self
            .registry
            .execute(&params.name, arguments, CommandContext::new())
            .await;
        Ok(CallToolResult::from_command_result(&result)?)
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        trace!(id = %request.id, method = %request.method, "Direct request");
        let response = self.dispatch(request).await?;
        self.handlers.emit_message(response.clone());
        Ok(response)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn on_message(&self, handler: MessageHandler) {
        self.handlers.set_message(handler);
    }

    fn on_error(&self, handler: ErrorHandler) {
        self.handlers.set_error(handler);
    }

    fn on_close(&self, handler: CloseHandler) {
        self.handlers.set_close(handler);
    }

    fn metadata(&self) -> TransportMetadata {
        TransportMetadata::new("direct").push(true)
    }
}

impl std::fmt::Debug for DirectTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectTransport")
            .field("commands", &self.registry.list_command_names())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afd_core::registry::{CommandDefinition, CommandParameter, ParamType, SimpleRegistry};
    use afd_core::result::{CommandResult, error_codes};
    use afd_core::error::codes;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    fn transport() -> DirectTransport {
        let registry = SimpleRegistry::new().with_command(
            CommandDefinition::new("todo-list", "List todos")
                .with_parameter(CommandParameter::new("status", ParamType::String).optional()),
            |_input, _ctx| async { CommandResult::success(json!([])) },
        );
        DirectTransport::new(Arc::new(registry))
    }

    fn call(name: &str, arguments: serde_json::Value) -> Request {
        Request::new(methods::TOOLS_CALL, 3u64)
            .params(serde_json::to_value(CallToolParams::new(name, arguments)).unwrap())
    }

    #[tokio::test]
    async fn test_initialize() {
        let transport = transport();
        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        let response = transport.send(Request::new(methods::INITIALIZE, 1u64)).await.unwrap();
        let result: InitializeResult = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(result.protocol_version, afd_core::PROTOCOL_VERSION);
        assert_eq!(result.server_info.name, DIRECT_SERVER_NAME);
        assert!(result.capabilities.has_tools());
    }

    #[tokio::test]
    async fn test_tools_list_uses_definitions() {
        let response = transport().send(Request::new(methods::TOOLS_LIST, 2u64)).await.unwrap();
        let list: ListToolsResult = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(list.tools.len(), 1);
        assert_eq!(list.tools[0].name, "todo-list");
        assert!(list.tools[0].input_schema["properties"]["status"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_successful_response() {
        let response = transport().send(call("todo-lsit", json!({}))).await.unwrap();
        assert!(response.is_success());

        let call: CallToolResult = serde_json::from_value(response.result.unwrap()).unwrap();
        assert!(call.is_error);
        let payload: serde_json::Value = serde_json::from_str(call.first_text().unwrap()).unwrap();
        assert_eq!(payload["error"], error_codes::UNKNOWN_TOOL);
        assert_eq!(payload["suggestions"], json!(["todo-list"]));
    }

    #[tokio::test]
    async fn test_known_tool_executes() {
        let response = transport().send(call("todo-list", serde_json::Value::Null)).await.unwrap();
        let call: CallToolResult = serde_json::from_value(response.result.unwrap()).unwrap();
        assert!(!call.is_error);
        assert_eq!(call.into_command_result(), CommandResult::success(json!([])));
    }

    #[tokio::test]
    async fn test_unknown_method_and_bad_params() {
        let transport = transport();
        let response = transport.send(Request::new("resources/list", 4u64)).await.unwrap();
        assert_eq!(response.error.unwrap().code, codes::METHOD_NOT_FOUND);

        let response = transport.send(Request::new(methods::TOOLS_CALL, 5u64)).await.unwrap();
        assert_eq!(response.error.unwrap().code, codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_every_response_reaches_message_handler() {
        let transport = transport();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        transport.on_message(Arc::new(move |response: Response| {
            sink.lock().unwrap().push(response.id.to_string());
        }));

        transport.send(Request::new(methods::TOOLS_LIST, 7u64)).await.unwrap();
        transport.send(Request::new("nope", 8u64)).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["7".to_string(), "8".to_string()]);
    }
}
