//! A scriptable in-memory transport.
//!
//! [`MockTransport`] answers the protocol methods from a script and lets a
//! test drive the connection: fail connects, hang requests, push responses
//! and close the connection from the "server" side.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use afd_core::JsonRpcError;
use afd_core::handshake::{InitializeResult, ServerCapabilities, ServerInfo};
use afd_core::protocol::{Request, Response, methods};
use afd_core::result::CommandResult;
use afd_core::suggest::UnknownCommandDiagnostic;
use afd_core::types::{CallToolParams, CallToolResult, ListToolsResult, Tool};
use afd_transport::{
    CloseHandler, ErrorHandler, MessageHandler, Transport, TransportError, TransportHandlers,
    TransportMetadata,
};
use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

/// Server name reported by the scripted handshake.
pub const MOCK_SERVER_NAME: &str = "mock-server";

/// How replies reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    /// Only as the return value of `send`.
    #[default]
    Return,
    /// Pushed to the message handler, then returned.
    PushAndReturn,
}

#[derive(Default)]
struct Script {
    overrides: HashMap<String, Result<Value, JsonRpcError>>,
    tools: Vec<Tool>,
    tool_results: HashMap<String, CommandResult>,
    hung: HashSet<String>,
    reply_mode: ReplyMode,
}

/// A scriptable transport for tests.
///
/// Defaults: `initialize` succeeds as [`MOCK_SERVER_NAME`], `tools/list`
/// returns the configured tools, `tools/call` returns the configured result
/// or an unknown-command diagnostic, anything else is "method not found".
#[derive(Default)]
pub struct MockTransport {
    handlers: TransportHandlers,
    connected: AtomicBool,
    script: Mutex<Script>,
    failing_connects: AtomicU32,
    connect_delay: Mutex<Option<Duration>>,
    sent: Mutex<Vec<Request>>,
    connects: Mutex<Vec<Instant>>,
}

impl MockTransport {
    /// Create a transport with the default script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise `tool` in `tools/list` and answer calls to it with `result`.
    #[must_use]
    pub fn with_tool(self, tool: Tool, result: CommandResult) -> Self {
        self.add_tool(tool, result);
        self
    }

    /// Choose how replies are delivered.
    #[must_use]
    pub fn with_reply_mode(self, mode: ReplyMode) -> Self {
        self.script().reply_mode = mode;
        self
    }

    // ==========================================================================
    // Scripting
    // ==========================================================================

    /// See [`with_tool`](Self::with_tool).
    pub fn add_tool(&self, tool: Tool, result: CommandResult) {
        let mut script = self.script();
        script.tool_results.insert(tool.name.clone(), result);
        script.tools.retain(|t| t.name != tool.name);
        script.tools.push(tool);
    }

    /// Answer `method` with `result`, replacing the default answer.
    pub fn respond(&self, method: &str, result: Value) {
        self.script().overrides.insert(method.to_string(), Ok(result));
    }

    /// Answer `method` with an error response.
    pub fn respond_error(&self, method: &str, error: JsonRpcError) {
        self.script().overrides.insert(method.to_string(), Err(error));
    }

    /// Never answer `method`.
    pub fn hang(&self, method: &str) {
        self.script().hung.insert(method.to_string());
    }

    /// Answer `method` again after [`hang`](Self::hang).
    pub fn unhang(&self, method: &str) {
        self.script().hung.remove(method);
    }

    /// Fail the next `count` connects.
    pub fn fail_connects(&self, count: u32) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Fail every connect from now on.
    pub fn fail_all_connects(&self) {
        self.fail_connects(u32::MAX);
    }

    /// Make every connect take `delay` before it resolves.
    pub fn delay_connects(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    // ==========================================================================
    // Driving the connection
    // ==========================================================================

    /// Close the connection from the server side, firing the close handler.
    pub fn trigger_close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.handlers.emit_close();
        }
    }

    /// Push a response to the message handler.
    pub fn push(&self, response: Response) {
        self.handlers.emit_message(response);
    }

    /// Report an error to the error handler.
    pub fn emit_error(&self, error: &TransportError) {
        self.handlers.emit_error(error);
    }

    // ==========================================================================
    // Inspection
    // ==========================================================================

    /// Every request sent, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Methods of every request sent, oldest first.
    #[must_use]
    pub fn sent_methods(&self) -> Vec<String> {
        self.sent().iter().map(|r| r.method().to_string()).collect()
    }

    /// Instants of every connect attempt, successful or not.
    #[must_use]
    pub fn connect_times(&self) -> Vec<Instant> {
        self.connects.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of connect attempts.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer(&self, request: &Request) -> Result<Response, TransportError> {
        let id = request.id.clone();
        let script = self.script();
        if let Some(scripted) = script.overrides.get(request.method()) {
            return Ok(match scripted {
                Ok(result) => Response::success(id, result.clone()),
                Err(error) => Response::error(id, error.clone()),
            });
        }

        let response = match request.method() {
            methods::INITIALIZE => {
                let result = InitializeResult::new(
                    ServerInfo::new(MOCK_SERVER_NAME, "1.0.0"),
                    ServerCapabilities::new().with_tools(),
                );
                Response::success(id, serde_json::to_value(result)?)
            }
            methods::TOOLS_LIST => {
                let tools = script.tools.clone();
                Response::success(id, serde_json::to_value(ListToolsResult { tools })?)
            }
            methods::TOOLS_CALL => {
                let params = request.params.clone().unwrap_or(Value::Null);
                let Ok(params) = serde_json::from_value::<CallToolParams>(params) else {
                    return Ok(Response::error(id, JsonRpcError::invalid_params("Invalid tools/call params")));
                };
                let call = match script.tool_results.get(&params.name) {
                    Some(result) => CallToolResult::from_command_result(result)?,
                    None => {
                        let available = script.tools.iter().map(|t| t.name.clone()).collect();
                        CallToolResult::json(&UnknownCommandDiagnostic::new(&params.name, available), true)?
                    }
                };
                Response::success(id, serde_json::to_value(call)?)
            }
            other => Response::error(id, JsonRpcError::method_not_found(other)),
        };
        Ok(response)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Instant::now());

        let delay = *self.connect_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            if failing != u32::MAX {
                self.failing_connects.store(failing - 1, Ordering::SeqCst);
            }
            return Err(TransportError::connection("scripted connect failure"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let hung = self.script().hung.contains(request.method());
        if hung {
            return futures::future::pending().await;
        }

        let response = self.answer(&request)?;
        let mode = self.script().reply_mode;
        if mode == ReplyMode::PushAndReturn {
            self.handlers.emit_message(response.clone());
        }
        Ok(response)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
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
        TransportMetadata::new("mock")
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("connected", &self.is_connected())
            .field("sent", &self.sent().len())
            .field("connects", &self.connect_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afd_core::error::codes;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_default_script() {
        let transport = MockTransport::new().with_tool(Tool::new("ping"), CommandResult::success(json!("pong")));
        transport.connect().await.unwrap();

        let init = transport.send(Request::new(methods::INITIALIZE, 1u64)).await.unwrap();
        assert_eq!(init.into_result().unwrap()["serverInfo"]["name"], json!(MOCK_SERVER_NAME));

        let call = transport
            .send(Request::with_params(methods::TOOLS_CALL, 2u64, json!({"name": "ping"})))
            .await
            .unwrap();
        let call: CallToolResult = serde_json::from_value(call.into_result().unwrap()).unwrap();
        assert_eq!(call.into_command_result().data(), Some(&json!("pong")));

        let unknown = transport.send(Request::new("resources/list", 3u64)).await.unwrap();
        assert_eq!(unknown.error.unwrap().code, codes::METHOD_NOT_FOUND);
        assert_eq!(transport.sent_methods(), vec!["initialize", "tools/call", "resources/list"]);
    }

    #[tokio::test]
    async fn test_failing_connects() {
        let transport = MockTransport::new();
        transport.fail_connects(2);
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_ok());
        assert_eq!(transport.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let transport = MockTransport::new();
        let err = transport.send(Request::new(methods::TOOLS_LIST, 1u64)).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_trigger_close_fires_once() {
        let transport = MockTransport::new();
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        transport.on_close(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        transport.connect().await.unwrap();

        transport.trigger_close();
        transport.trigger_close();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_push_and_return() {
        let transport = MockTransport::new().with_reply_mode(ReplyMode::PushAndReturn);
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&pushed);
        transport.on_message(Arc::new(move |response: Response| {
            sink.lock().unwrap().push(response.id);
        }));
        transport.connect().await.unwrap();
        transport.send(Request::new(methods::TOOLS_LIST, 9u64)).await.unwrap();
        assert_eq!(pushed.lock().unwrap().len(), 1);
    }
}
