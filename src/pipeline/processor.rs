//! Record processing: turns stream records into UI events.
//!
//! One [`MessageProcessor`] belongs to one chat session. Records are handled
//! strictly in arrival order; the only suspension points are snapshot reads
//! of edited files, and those never fail outward.

use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use serde_json::Value;

use crate::cli::{
    AssistantRecord, ContentBlock, ControlRequestBody, ControlRequestRecord, OutboundRecord,
    ResultRecord, StdinHandle, StreamParser, StreamRecord, SystemRecord, ToolInput, UserRecord,
};
use crate::pipeline::{
    edit_start_lines, edited_file_path, is_file_edit_tool, is_hidden_result_tool, read_snapshot,
    synthetic_tool_use_id, todo_items, CompactBoundaryInfo, ConversationLog, EditLines,
    EventSink, FileAccess, PermissionBroker, PermissionRequestEvent, SessionInfo, SessionTotals,
    TokenUpdate, TokenUsageUpdate, ToolMetricTracker, ToolResultEvent, ToolUseEvent,
    ToolUseMetric, TotalsUpdate, UiEvent, EMPTY_RESULT_PLACEHOLDER,
};

/// Shown when a resumed session no longer exists on the CLI side.
pub const SESSION_EXPIRED_MESSAGE: &str =
    "The previous session could not be found. A new session will be started - please send your message again.";

/// Error strings that mean `--resume` pointed at an unknown session.
const SESSION_NOT_FOUND_PATTERNS: [&str; 2] = [
    r"(?i)no conversation found",
    r"(?i)session\b.*\bnot found",
];

/// Side effects the session owner must act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// The CLI reported the session id (init or successful result).
    SessionIdReceived(String),
    /// The turn finished successfully; persist the conversation.
    TurnComplete,
    /// The turn ended with an error result.
    TurnFailed,
    /// The resumed session is gone; the stored id was cleared.
    SessionNotFound,
}

#[derive(Debug, Clone)]
struct LastToolUse {
    tool_use_id: String,
    tool_name: String,
    input: ToolInput,
}

struct SessionErrorMatcher {
    patterns: Vec<Regex>,
}

impl SessionErrorMatcher {
    fn new() -> Self {
        let patterns = SESSION_NOT_FOUND_PATTERNS
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to compile session error pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    fn matches(&self, message: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(message))
    }
}

/// Converts stream records into UI events and session bookkeeping.
pub struct MessageProcessor {
    sink: Arc<dyn EventSink>,
    files: Arc<dyn FileAccess>,
    metrics: ToolMetricTracker,
    totals: SessionTotals,
    permissions: PermissionBroker,
    conversation: ConversationLog,
    session_id: Option<String>,
    current_usage: TokenUsageUpdate,
    last_tool_use: Option<LastToolUse>,
    stdin: Option<StdinHandle>,
    session_errors: SessionErrorMatcher,
}

impl MessageProcessor {
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>, files: Arc<dyn FileAccess>) -> Self {
        Self {
            sink,
            files,
            metrics: ToolMetricTracker::new(),
            totals: SessionTotals::new(),
            permissions: PermissionBroker::new(),
            conversation: ConversationLog::new(),
            session_id: None,
            current_usage: TokenUsageUpdate::default(),
            last_tool_use: None,
            stdin: None,
            session_errors: SessionErrorMatcher::new(),
        }
    }

    /// Resume from a known session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Classify and handle one framed line. Non-record lines are dropped.
    pub async fn process_line(&mut self, line: &str) -> Vec<SessionSignal> {
        match StreamParser::classify(line) {
            Some(record) => self.handle_record(record).await,
            None => Vec::new(),
        }
    }

    /// Handle one record.
    pub async fn handle_record(&mut self, record: StreamRecord) -> Vec<SessionSignal> {
        tracing::trace!(kind = record.kind(), "Handling record");
        match record {
            StreamRecord::System(system) => self.handle_system(system),
            StreamRecord::Assistant(assistant) => {
                self.handle_assistant(assistant).await;
                Vec::new()
            }
            StreamRecord::User(user) => {
                self.handle_user(user).await;
                Vec::new()
            }
            StreamRecord::Result(result) => self.handle_result(result),
            StreamRecord::ControlRequest(request) => {
                self.handle_control_request(request);
                Vec::new()
            }
            StreamRecord::ControlResponse { response } => {
                tracing::debug!(%response, "Ignoring control response");
                Vec::new()
            }
            StreamRecord::ControlCancelRequest { request_id } => {
                if self.permissions.cancel(&request_id) {
                    tracing::debug!(%request_id, "Permission request withdrawn");
                }
                Vec::new()
            }
            StreamRecord::AccountInfo { fields } => {
                self.emit(UiEvent::AccountInfo(Value::Object(fields)));
                Vec::new()
            }
            StreamRecord::Unknown => Vec::new(),
        }
    }

    fn handle_system(&mut self, system: SystemRecord) -> Vec<SessionSignal> {
        match system {
            SystemRecord::Init(init) => {
                tracing::info!(
                    session_id = %init.session_id,
                    model = ?init.model,
                    tools = init.tools.len(),
                    mcp_servers = init.mcp_servers.len(),
                    "Session initialized"
                );
                let mut signals = Vec::new();
                if !init.session_id.is_empty() {
                    self.session_id = Some(init.session_id.clone());
                    signals.push(SessionSignal::SessionIdReceived(init.session_id.clone()));
                }
                self.emit(UiEvent::SessionInfo(SessionInfo {
                    session_id: init.session_id,
                    tools: init.tools,
                    mcp_servers: init.mcp_servers,
                    model: init.model,
                }));
                signals
            }
            SystemRecord::Status(status) => {
                self.emit(UiEvent::Compacting(status.is_compacting()));
                Vec::new()
            }
            SystemRecord::CompactBoundary(boundary) => {
                let metadata = boundary.compact_metadata.unwrap_or_default();
                tracing::info!(
                    trigger = ?metadata.trigger,
                    pre_tokens = ?metadata.pre_tokens,
                    "Context compacted, resetting token totals"
                );
                self.totals.reset_tokens();
                self.emit(UiEvent::CompactBoundary(CompactBoundaryInfo {
                    trigger: metadata.trigger,
                    pre_tokens: metadata.pre_tokens,
                }));
                Vec::new()
            }
            SystemRecord::Other => Vec::new(),
        }
    }

    async fn handle_assistant(&mut self, record: AssistantRecord) {
        let message = record.message;

        if let Some(usage) = &message.usage {
            let update = TokenUsageUpdate::from(usage);
            self.totals.record_usage(&update);
            self.current_usage = update;
            self.emit(UiEvent::UpdateTokens(TokenUpdate {
                total_tokens_input: self.totals.total_tokens_input,
                total_tokens_output: self.totals.total_tokens_output,
                current_input_tokens: update.input_tokens,
                current_output_tokens: update.output_tokens,
                cache_creation_tokens: update.cache_creation_tokens,
                cache_read_tokens: update.cache_read_tokens,
            }));
        }

        for block in message.content {
            match block {
                ContentBlock::Text { text } => {
                    let text = text.trim();
                    if !text.is_empty() {
                        self.emit(UiEvent::Output(text.to_string()));
                    }
                }
                ContentBlock::Thinking { thinking } => {
                    let thinking = thinking.trim();
                    if !thinking.is_empty() {
                        self.emit(UiEvent::Thinking(thinking.to_string()));
                    }
                }
                ContentBlock::ToolUse { id, name, input } => {
                    self.handle_tool_use(id, name, input).await;
                }
                ContentBlock::ToolResult { .. } | ContentBlock::Unknown => {}
            }
        }
    }

    async fn handle_tool_use(&mut self, id: Option<String>, name: String, input: ToolInput) {
        let tool_use_id = id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| synthetic_tool_use_id(&name, Utc::now()));

        if let Some(todos) = todo_items(&name, &input) {
            self.emit(UiEvent::TodosUpdate(todos));
        }

        let mut metric = ToolUseMetric::new(&tool_use_id, &name, self.current_usage, input.clone());
        if is_file_edit_tool(&name) {
            if let Some(path) = edited_file_path(&input) {
                let before = read_snapshot(self.files.as_ref(), path)
                    .await
                    .unwrap_or_default();
                metric.edit_lines = edit_start_lines(&name, &input, &before);
                metric.file_content_before = Some(before);
            }
        }

        tracing::debug!(tool = %name, %tool_use_id, "Tool use started");

        let event = ToolUseEvent {
            tool_name: name.clone(),
            tool_use_id: tool_use_id.clone(),
            raw_input: input.clone(),
            input_tokens: metric.tokens.input_tokens,
            output_tokens: metric.tokens.output_tokens,
            file_content_before: metric.file_content_before.clone(),
            start_line: metric.edit_lines.as_ref().and_then(EditLines::single),
            start_lines: metric.edit_lines.as_ref().and_then(EditLines::multi),
        };

        self.metrics.insert(metric);
        self.last_tool_use = Some(LastToolUse {
            tool_use_id,
            tool_name: name,
            input,
        });
        self.emit(UiEvent::ToolUse(event));
    }

    async fn handle_user(&mut self, record: UserRecord) {
        for block in record.message.content.into_blocks() {
            if let ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } = block
            {
                self.handle_tool_result(tool_use_id, content, is_error).await;
            }
        }
    }

    async fn handle_tool_result(
        &mut self,
        tool_use_id: Option<String>,
        content: Option<Value>,
        is_error: bool,
    ) {
        let content = match content {
            Some(Value::String(text)) => text,
            None | Some(Value::Null) => EMPTY_RESULT_PLACEHOLDER.to_string(),
            Some(other) => other.to_string(),
        };

        // Results without an id belong to the most recent tool use. This
        // holds only while the CLI reports results in tool-use order.
        let explicit_id = tool_use_id.filter(|id| !id.is_empty());
        let fallback = match explicit_id {
            Some(_) => None,
            None => self.last_tool_use.as_ref(),
        };
        let key = explicit_id.or_else(|| fallback.map(|t| t.tool_use_id.clone()));
        let metric = key.as_deref().and_then(|k| self.metrics.get(k)).cloned();

        let (tool_name, input) = match (&metric, fallback) {
            (Some(m), _) => (Some(m.tool_name.clone()), Some(m.input.clone())),
            (None, Some(last)) => (Some(last.tool_name.clone()), Some(last.input.clone())),
            (None, None) => (None, None),
        };

        let file_path = match (&tool_name, &input) {
            (Some(name), Some(input)) if is_file_edit_tool(name) => {
                edited_file_path(input).map(str::to_string)
            }
            _ => None,
        };

        let file_content_after = match &file_path {
            Some(path) if !is_error => read_snapshot(self.files.as_ref(), path).await,
            _ => None,
        };

        let hidden = !is_error && tool_name.as_deref().is_some_and(is_hidden_result_tool);
        let duration_ms = metric.as_ref().map(ToolUseMetric::elapsed_ms);

        tracing::debug!(
            tool = ?tool_name,
            tool_use_id = ?key,
            is_error,
            ?duration_ms,
            "Tool result received"
        );

        let (file_content_before, edit_lines, tokens) = match metric {
            Some(m) => (m.file_content_before, m.edit_lines, Some(m.tokens)),
            None => (None, None, None),
        };

        self.emit(UiEvent::ToolResult(ToolResultEvent {
            content,
            is_error,
            tool_use_id: key.clone(),
            tool_name,
            hidden,
            duration_ms,
            input_tokens: tokens.map(|t| t.input_tokens),
            output_tokens: tokens.map(|t| t.output_tokens),
            raw_input: input,
            file_path,
            file_content_before,
            file_content_after,
            start_line: edit_lines.as_ref().and_then(EditLines::single),
            start_lines: edit_lines.as_ref().and_then(EditLines::multi),
        }));

        if let Some(key) = key {
            self.metrics.remove(&key);
        }
    }

    fn handle_result(&mut self, result: ResultRecord) -> Vec<SessionSignal> {
        let mut signals = Vec::new();

        if result.is_success() {
            if let Some(session_id) = result.session_id.filter(|id| !id.is_empty()) {
                self.session_id = Some(session_id.clone());
                signals.push(SessionSignal::SessionIdReceived(session_id.clone()));
                self.emit(UiEvent::SessionInfo(SessionInfo {
                    session_id,
                    ..SessionInfo::default()
                }));
            }

            self.totals.record_request(result.total_cost_usd);
            tracing::info!(
                cost_usd = ?result.total_cost_usd,
                total_cost = self.totals.total_cost,
                requests = self.totals.request_count,
                "Turn completed"
            );
            self.emit(UiEvent::UpdateTotals(TotalsUpdate {
                total_cost: self.totals.total_cost,
                total_tokens_input: self.totals.total_tokens_input,
                total_tokens_output: self.totals.total_tokens_output,
                request_count: self.totals.request_count,
                current_cost: result.total_cost_usd,
                current_duration_ms: result.duration_ms,
                current_turns: result.num_turns,
            }));
            signals.push(SessionSignal::TurnComplete);
            return signals;
        }

        let mut errors = result.errors;
        if errors.is_empty() {
            if let Some(text) = result.result.filter(|t| !t.trim().is_empty()) {
                errors.push(text);
            }
        }

        if errors.iter().any(|e| self.session_errors.matches(e)) {
            self.expire_session();
            signals.push(SessionSignal::SessionNotFound);
        } else {
            if errors.is_empty() {
                errors.push(format!("Claude CLI reported {}", result.subtype));
            }
            tracing::warn!(subtype = %result.subtype, errors = errors.len(), "Turn failed");
            for error in errors {
                self.emit(UiEvent::Error(error));
            }
        }

        signals.push(SessionSignal::TurnFailed);
        signals
    }

    fn handle_control_request(&mut self, record: ControlRequestRecord) {
        match record.request {
            ControlRequestBody::CanUseTool(request) => {
                let pending = self.permissions.register(&record.request_id, request);
                self.emit(UiEvent::PermissionRequest(PermissionRequestEvent {
                    request_id: pending.request_id,
                    tool_name: pending.tool_name,
                    input: pending.input,
                    suggestions: pending.suggestions,
                    tool_use_id: pending.tool_use_id,
                    pattern: pending.pattern,
                }));
            }
            ControlRequestBody::Other => {
                tracing::debug!(
                    request_id = %record.request_id,
                    "Ignoring unsupported control request"
                );
            }
        }
    }

    /// Answer a pending permission request over stdin.
    ///
    /// Silently does nothing if the request is unknown or stdin is closed.
    pub fn respond_to_permission(
        &mut self,
        request_id: &str,
        approved: bool,
        always_allow: bool,
    ) -> bool {
        self.permissions
            .respond(request_id, approved, always_allow, self.stdin.as_ref())
    }

    /// Attach the stdin of the current CLI process.
    pub fn attach_stdin(&mut self, stdin: StdinHandle) {
        self.stdin = Some(stdin);
    }

    /// Drop this processor's stdin handle. Returns whether one was attached.
    pub fn detach_stdin(&mut self) -> bool {
        self.stdin.take().is_some()
    }

    /// Returns true if a stdin handle is attached and still open.
    #[must_use]
    pub fn has_open_stdin(&self) -> bool {
        self.stdin.as_ref().is_some_and(StdinHandle::is_open)
    }

    /// Write a user turn to the CLI. Returns false if no open stdin is
    /// attached.
    pub fn write_user_message(&self, text: &str) -> bool {
        let record = OutboundRecord::user_text(self.session_id.as_deref(), text);
        self.stdin.as_ref().is_some_and(|stdin| stdin.send(&record))
    }

    /// Report a failure seen outside the record stream (e.g. CLI stderr).
    ///
    /// Session-not-found failures clear the session id and return a signal;
    /// anything else is posted as an error.
    pub fn report_failure(&mut self, message: &str) -> Option<SessionSignal> {
        if self.session_errors.matches(message) {
            self.expire_session();
            Some(SessionSignal::SessionNotFound)
        } else {
            self.emit(UiEvent::Error(message.to_string()));
            None
        }
    }

    fn expire_session(&mut self) {
        tracing::warn!(
            session_id = ?self.session_id,
            "Resumed session not found, clearing session id"
        );
        self.session_id = None;
        self.emit(UiEvent::SessionNotFound(SESSION_EXPIRED_MESSAGE.to_string()));
    }

    /// Abandon the current turn: clear live metrics, pending permissions and
    /// stdin. Safe to call when nothing is pending.
    pub fn end_turn(&mut self) {
        let metrics = self.metrics.clear();
        let permissions = self.permissions.clear();
        self.stdin = None;
        self.last_tool_use = None;
        if metrics > 0 || permissions > 0 {
            tracing::debug!(metrics, permissions, "Cleared pending turn state");
        }
    }

    /// Start over: end the turn and forget session id, totals and log.
    pub fn reset_session(&mut self) {
        self.end_turn();
        self.session_id = None;
        self.totals.reset();
        self.current_usage = TokenUsageUpdate::default();
        self.conversation.clear();
    }

    /// Record (if persistent) and post an event.
    pub fn emit(&mut self, event: UiEvent) {
        self.conversation.record(&event);
        self.sink.post(event);
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn totals(&self) -> &SessionTotals {
        &self.totals
    }

    #[must_use]
    pub fn metrics(&self) -> &ToolMetricTracker {
        &self.metrics
    }

    #[must_use]
    pub fn permissions(&self) -> &PermissionBroker {
        &self.permissions
    }

    #[must_use]
    pub fn conversation(&self) -> &ConversationLog {
        &self.conversation
    }
}
