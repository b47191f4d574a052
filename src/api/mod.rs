//! Request and response payloads exchanged with the inspector backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod events;

/// How a capability is addressed on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    /// Through the aggregating proxy, addressed by server name.
    #[default]
    Proxy,
    /// Directly against one backend server, addressed by id.
    Server,
}

impl InvocationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InvocationMode::Proxy => "proxy",
            InvocationMode::Server => "server",
        }
    }
}

impl std::str::FromStr for InvocationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "proxy" => Ok(InvocationMode::Proxy),
            "server" => Ok(InvocationMode::Server),
            other => Err(format!("Unsupported invocation mode: {other}")),
        }
    }
}

/// Kind of capability selected in the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Tool,
    Resource,
    Prompt,
}

impl CapabilityKind {
    /// Only tool invocations run inside a backend session.
    pub fn requires_session(self) -> bool {
        matches!(self, CapabilityKind::Tool)
    }
}

/// The (mode, server) tuple a session and its calls are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CallTarget {
    pub mode: InvocationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

impl CallTarget {
    pub fn new(
        mode: InvocationMode,
        server_id: Option<String>,
        server_name: Option<String>,
    ) -> Self {
        Self {
            mode,
            server_id: server_id.filter(|id| !id.trim().is_empty()),
            server_name: server_name.filter(|name| !name.trim().is_empty()),
        }
    }

    pub fn label(&self) -> String {
        let server = self
            .server_name
            .as_deref()
            .or(self.server_id.as_deref())
            .unwrap_or("*");
        format!("{}:{}", self.mode.as_str(), server)
    }
}

pub type OpenSessionRequest = CallTarget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub server_id: String,
    #[serde(default)]
    pub expires_at_epoch_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloseSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartCallRequest {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub mode: InvocationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
    pub timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartCallResponse {
    #[serde(default)]
    pub call_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelCallRequest {
    pub call_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListToolsRequest {
    #[serde(flatten)]
    pub target: CallTarget,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListToolsResponse {
    #[serde(default)]
    pub tools: Vec<crate::core::arguments::ToolDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadResourceRequest {
    pub uri: String,
    #[serde(flatten)]
    pub target: CallTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetPromptRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub target: CallTarget,
}
