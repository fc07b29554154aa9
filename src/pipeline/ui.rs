//! UI-facing events and the emission sink.
//!
//! Events serialize as `{"type": "<camelCase tag>", "data": ...}` so a
//! webview (or any NDJSON consumer) can switch on `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::cli::{McpServerStatus, ToolInput};

/// Session identity and capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub tools: Vec<String>,
    pub mcp_servers: Vec<McpServerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Context compaction marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactBoundaryInfo {
    pub trigger: Option<String>,
    pub pre_tokens: Option<u64>,
}

/// Per-call token deltas plus running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUpdate {
    pub total_tokens_input: u64,
    pub total_tokens_output: u64,
    pub current_input_tokens: u64,
    pub current_output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

/// Running cost/request totals plus the figures of the turn that just ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsUpdate {
    pub total_cost: f64,
    pub total_tokens_input: u64,
    pub total_tokens_output: u64,
    pub request_count: u64,
    pub current_cost: Option<f64>,
    pub current_duration_ms: Option<u64>,
    pub current_turns: Option<u32>,
}

/// A tool invocation as shown in the chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseEvent {
    pub tool_name: String,
    pub tool_use_id: String,
    pub raw_input: ToolInput,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_content_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_lines: Option<Vec<u32>>,
}

/// The outcome of a tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultEvent {
    pub content: String,
    pub is_error: bool,
    pub tool_use_id: Option<String>,
    pub tool_name: Option<String>,
    /// Suppressed in the chat unless it is an error.
    pub hidden: bool,
    pub duration_ms: Option<u64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<ToolInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_content_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_content_after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_lines: Option<Vec<u32>>,
}

/// A tool is waiting on a user decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequestEvent {
    pub request_id: String,
    pub tool_name: String,
    pub input: ToolInput,
    pub suggestions: Option<Value>,
    pub tool_use_id: Option<String>,
    /// Advisory "always allow commands like this" pattern.
    pub pattern: Option<String>,
}

/// Events posted to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum UiEvent {
    SessionInfo(SessionInfo),
    Compacting(bool),
    CompactBoundary(CompactBoundaryInfo),
    UpdateTokens(TokenUpdate),
    UpdateTotals(TotalsUpdate),
    Output(String),
    Thinking(String),
    ToolUse(ToolUseEvent),
    ToolResult(ToolResultEvent),
    TodosUpdate(Vec<Value>),
    PermissionRequest(PermissionRequestEvent),
    Error(String),
    SessionNotFound(String),
    AccountInfo(Value),
    UserInput(String),
    ProcessingState(bool),
}

impl UiEvent {
    /// The serialized `type` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionInfo(_) => "sessionInfo",
            Self::Compacting(_) => "compacting",
            Self::CompactBoundary(_) => "compactBoundary",
            Self::UpdateTokens(_) => "updateTokens",
            Self::UpdateTotals(_) => "updateTotals",
            Self::Output(_) => "output",
            Self::Thinking(_) => "thinking",
            Self::ToolUse(_) => "toolUse",
            Self::ToolResult(_) => "toolResult",
            Self::TodosUpdate(_) => "todosUpdate",
            Self::PermissionRequest(_) => "permissionRequest",
            Self::Error(_) => "error",
            Self::SessionNotFound(_) => "sessionNotFound",
            Self::AccountInfo(_) => "accountInfo",
            Self::UserInput(_) => "userInput",
            Self::ProcessingState(_) => "processingState",
        }
    }

    /// Whether the event belongs in the replayable conversation log.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(
            self,
            Self::SessionInfo(_)
                | Self::CompactBoundary(_)
                | Self::Output(_)
                | Self::Thinking(_)
                | Self::ToolUse(_)
                | Self::ToolResult(_)
                | Self::PermissionRequest(_)
                | Self::Error(_)
                | Self::UserInput(_)
        )
    }

    /// The `data` payload as JSON.
    #[must_use]
    pub fn payload(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

/// One-way channel to the UI. No acknowledgement, no backpressure.
pub trait EventSink: Send + Sync {
    fn post(&self, event: UiEvent);
}

impl EventSink for UnboundedSender<UiEvent> {
    fn post(&self, event: UiEvent) {
        if self.send(event).is_err() {
            tracing::trace!("UI event receiver dropped");
        }
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn post(&self, _event: UiEvent) {}
}
