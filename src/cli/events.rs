//! Record types from Claude Code stream-json output.
//!
//! This module defines the records that Claude Code writes to stdout when
//! running with `--output-format stream-json --input-format stream-json`.
//! Every record is discriminated by its `type` field; system records and
//! control requests carry a second `subtype` discriminant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arguments of a tool invocation, as sent by the CLI.
pub type ToolInput = Map<String, Value>;

/// Status of an MCP server declared at session start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpServerStatus {
    /// Server name.
    pub name: String,
    /// Connection status (e.g. "connected", "failed").
    pub status: String,
}

/// System initialization record data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemInit {
    /// Session identifier assigned by the CLI.
    pub session_id: String,
    /// Current working directory.
    pub cwd: Option<String>,
    /// Model in use.
    pub model: Option<String>,
    /// Available tools for this session.
    pub tools: Vec<String>,
    /// MCP servers and their status.
    pub mcp_servers: Vec<McpServerStatus>,
    /// Active permission mode.
    #[serde(rename = "permissionMode", alias = "permission_mode")]
    pub permission_mode: Option<String>,
}

/// System status record data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemStatus {
    /// Current status (`"compacting"` while context is being compacted).
    pub status: Option<String>,
}

impl SystemStatus {
    /// Returns true if the CLI reports it is compacting context.
    #[must_use]
    pub fn is_compacting(&self) -> bool {
        self.status.as_deref() == Some("compacting")
    }
}

/// Metadata attached to a compaction boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactMetadata {
    /// What triggered compaction ("manual" or "auto").
    pub trigger: Option<String>,
    /// Token count before compaction.
    #[serde(alias = "preTokens")]
    pub pre_tokens: Option<u64>,
}

/// Compaction boundary record data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactBoundary {
    #[serde(alias = "compactMetadata")]
    pub compact_metadata: Option<CompactMetadata>,
}

/// System records, discriminated by `subtype`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum SystemRecord {
    /// Session start.
    Init(SystemInit),
    /// Status change.
    Status(SystemStatus),
    /// Context was compacted.
    CompactBoundary(CompactBoundary),
    /// Catch-all for unknown subtypes (hook responses, etc.).
    #[serde(other)]
    Other,
}

/// Token usage reported on an assistant message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

/// A content block within an assistant or user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        #[serde(default)]
        text: String,
    },
    /// Extended thinking trace.
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    /// Tool invocation request.
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: ToolInput,
    },
    /// Outcome of a tool invocation.
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        is_error: bool,
    },
    /// Catch-all for block types this crate does not render.
    #[serde(other)]
    Unknown,
}

/// Message content - can be plain text or structured blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Structured content blocks
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Blocks(Vec::new())
    }
}

impl MessageContent {
    /// Structured blocks, or an empty slice for plain text.
    #[must_use]
    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            Self::Text(_) => &[],
            Self::Blocks(blocks) => blocks,
        }
    }

    /// Consume into structured blocks (empty for plain text).
    #[must_use]
    pub fn into_blocks(self) -> Vec<ContentBlock> {
        match self {
            Self::Text(_) => Vec::new(),
            Self::Blocks(blocks) => blocks,
        }
    }
}

/// Assistant message body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantMessage {
    pub id: Option<String>,
    pub model: Option<String>,
    pub content: Vec<ContentBlock>,
    pub usage: Option<Usage>,
}

/// Assistant output record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantRecord {
    pub message: AssistantMessage,
    pub session_id: Option<String>,
    pub parent_tool_use_id: Option<String>,
}

/// User message body (tool results flow back through here).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserMessage {
    pub content: MessageContent,
}

/// User / tool-result record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    pub message: UserMessage,
    pub session_id: Option<String>,
    pub parent_tool_use_id: Option<String>,
}

/// Final result record for a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultRecord {
    /// Result subtype (`"success"`, `"error_during_execution"`, ...).
    pub subtype: String,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Whether an error occurred.
    pub is_error: bool,
    /// Cost of this turn in USD.
    #[serde(alias = "cost_usd")]
    pub total_cost_usd: Option<f64>,
    /// Total duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// API call duration in milliseconds.
    pub duration_api_ms: Option<u64>,
    /// Number of conversation turns.
    pub num_turns: Option<u32>,
    /// Final result text.
    pub result: Option<String>,
    /// Error strings reported by the CLI.
    pub errors: Vec<String>,
    /// Aggregate usage for the turn.
    pub usage: Option<Usage>,
}

impl ResultRecord {
    /// Returns true if the turn completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.subtype == "success" && !self.is_error
    }
}

/// Permission request for a tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanUseTool {
    pub tool_name: String,
    pub input: ToolInput,
    pub permission_suggestions: Option<Value>,
    pub tool_use_id: Option<String>,
}

/// Body of a control request, discriminated by `subtype`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlRequestBody {
    /// The CLI asks whether a tool may run.
    CanUseTool(CanUseTool),
    /// Catch-all for control requests this crate does not answer.
    #[serde(other)]
    Other,
}

/// Control request from the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequestRecord {
    /// Correlation identifier echoed in the response.
    #[serde(default)]
    pub request_id: String,
    /// Request body.
    pub request: ControlRequestBody,
}

/// Records emitted by Claude Code in stream-json format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRecord {
    /// System record (init, status, compaction boundary).
    System(SystemRecord),
    /// Assistant output.
    Assistant(AssistantRecord),
    /// User message, carrying tool results.
    User(UserRecord),
    /// Final result of a turn.
    Result(ResultRecord),
    /// Side-channel request (permission prompts).
    ControlRequest(ControlRequestRecord),
    /// Side-channel response to a request this side sent.
    ControlResponse {
        #[serde(default)]
        response: Value,
    },
    /// The CLI withdrew an earlier control request.
    ControlCancelRequest {
        #[serde(default)]
        request_id: String,
    },
    /// Account details.
    #[serde(rename = "accountInfo")]
    AccountInfo {
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    /// Catch-all for unknown record types.
    #[serde(other)]
    Unknown,
}

impl StreamRecord {
    /// Returns true if this is a terminal record (Result).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Returns the session ID if the record carries one.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::System(SystemRecord::Init(init)) if !init.session_id.is_empty() => {
                Some(&init.session_id)
            }
            Self::Assistant(record) => record.session_id.as_deref(),
            Self::User(record) => record.session_id.as_deref(),
            Self::Result(result) => result.session_id.as_deref(),
            _ => None,
        }
    }

    /// Short name of the record kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::System(SystemRecord::Init(_)) => "system.init",
            Self::System(SystemRecord::Status(_)) => "system.status",
            Self::System(SystemRecord::CompactBoundary(_)) => "system.compact_boundary",
            Self::System(SystemRecord::Other) => "system.other",
            Self::Assistant(_) => "assistant",
            Self::User(_) => "user",
            Self::Result(_) => "result",
            Self::ControlRequest(_) => "control_request",
            Self::ControlResponse { .. } => "control_response",
            Self::ControlCancelRequest { .. } => "control_cancel_request",
            Self::AccountInfo { .. } => "account_info",
            Self::Unknown => "unknown",
        }
    }
}
