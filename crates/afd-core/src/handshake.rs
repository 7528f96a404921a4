//! Handshake payloads exchanged by the `initialize` method.

use serde::{Deserialize, Serialize};

/// The protocol version advertised during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// The `tools` entry of [`ServerCapabilities`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCapability {
    /// Whether the executor emits list-changed notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// What a command executor can do. Only `tools` matters to this client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool (command) support.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapability>,
}

impl ServerCapabilities {
    /// Create empty capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise tool support.
    #[must_use]
    pub fn with_tools(mut self) -> Self {
        self.tools = Some(ToolCapability::default());
        self
    }

    /// Whether tools are supported.
    #[must_use]
    pub const fn has_tools(&self) -> bool {
        self.tools.is_some()
    }
}

/// Capabilities the client advertises. Currently always empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCapabilities {}

/// Name and version of either end of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name.
    pub name: String,
    /// Implementation version.
    pub version: String,
}

impl Implementation {
    /// Create a name/version pair.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Identity the executor reports in `serverInfo`.
pub type ServerInfo = Implementation;

/// Identity the client sends in `clientInfo`.
pub type ClientInfo = Implementation;

/// Parameters of the `initialize` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Always [`PROTOCOL_VERSION`].
    pub protocol_version: String,
    /// Client capabilities.
    pub capabilities: ClientCapabilities,
    /// Who is connecting.
    pub client_info: ClientInfo,
}

impl InitializeRequest {
    /// Handshake parameters for `client_info` at the current protocol version.
    #[must_use]
    pub fn new(client_info: ClientInfo) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info,
        }
    }
}

/// What the executor answers to `initialize`.
///
/// Executors that omit `capabilities` are accepted; the field defaults to
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Version the executor settled on.
    pub protocol_version: String,
    /// Executor capabilities.
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Who answered.
    pub server_info: ServerInfo,
}

impl InitializeResult {
    /// Answer at the current protocol version.
    #[must_use]
    pub fn new(server_info: ServerInfo, capabilities: ServerCapabilities) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities,
            server_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_initialize_request_wire_shape() {
        let req = InitializeRequest::new(ClientInfo::new("afd-client", "0.3.0"));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "afd-client", "version": "0.3.0"}
            })
        );
    }

    #[test]
    fn test_initialize_result_tolerates_missing_capabilities() {
        let json = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"name": "todo", "version": "1.0.0"}
        });
        let result: InitializeResult = serde_json::from_value(json).unwrap();
        assert_eq!(result.server_info.name, "todo");
        assert!(!result.capabilities.has_tools());
    }
}
