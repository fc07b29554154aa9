//! Colored terminal rendering of UI events.
//!
//! Used by the `run` and `history` commands. Everything goes to stdout;
//! logs stay on stderr.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;
use serde_json::Value;

use crate::pipeline::{
    PermissionRequestEvent, SessionInfo, ToolResultEvent, ToolUseEvent, TotalsUpdate, UiEvent,
};
use crate::session::ConversationSummary;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to at most `max_len` characters, adding an ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Format tool input for display, truncating long values.
#[must_use]
pub fn format_tool_input(input: &serde_json::Map<String, Value>, raw_mode: bool) -> String {
    input
        .iter()
        .map(|(k, v)| {
            let value_str = match v {
                Value::String(s) => truncate(s, 50, raw_mode),
                other => truncate(&other.to_string(), 50, raw_mode),
            };
            format!("{k}={value_str}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render one event. Returns false for events with nothing to show.
pub fn render_event(event: &UiEvent, raw_mode: bool) -> bool {
    match event {
        UiEvent::SessionInfo(info) if !info.tools.is_empty() || info.model.is_some() => {
            print_session_start(info, raw_mode);
        }
        UiEvent::Compacting(true) => print_notice("[COMPACT]", "Compacting conversation..."),
        UiEvent::CompactBoundary(info) => {
            let tokens = info
                .pre_tokens
                .map_or(String::new(), |t| format!(" ({t} tokens before)"));
            print_notice("[COMPACT]", &format!("Conversation compacted{tokens}"));
        }
        UiEvent::UpdateTotals(totals) => print_totals(totals),
        UiEvent::Output(text) => print_text(text),
        UiEvent::Thinking(text) => print_thinking(text),
        UiEvent::ToolUse(tool) => print_tool_use(tool, raw_mode),
        UiEvent::ToolResult(result) if raw_mode || !result.hidden => {
            print_tool_result(result, raw_mode);
        }
        UiEvent::TodosUpdate(todos) => print_todos(todos),
        UiEvent::PermissionRequest(request) => print_permission_request(request, raw_mode),
        UiEvent::Error(message) => print_error(message),
        UiEvent::SessionNotFound(message) => print_notice("[SESSION]", message),
        _ => return false,
    }
    true
}

/// Print session start information.
pub fn print_session_start(info: &SessionInfo, raw_mode: bool) {
    println!(
        "{} {} model={}, session={}, tools={}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        info.model.as_deref().unwrap_or("default").cyan(),
        truncate(&info.session_id, 20, raw_mode).dimmed(),
        info.tools.len()
    );
    for server in info.mcp_servers.iter().filter(|s| s.status != "connected") {
        println!(
            "{} MCP server {} is {}",
            "[WARN]".yellow().bold(),
            server.name,
            server.status
        );
    }
    let _ = io::stdout().flush();
}

/// Print the running totals after a turn.
pub fn print_totals(totals: &TotalsUpdate) {
    let cost = totals
        .current_cost
        .map_or(String::new(), |c| format!("turn ${c:.4}, "));
    println!(
        "\n{} {} {}total ${:.4}, {} in / {} out tokens, {} requests",
        timestamp().dimmed(),
        "[DONE]".blue().bold(),
        cost,
        totals.total_cost,
        totals.total_tokens_input,
        totals.total_tokens_output,
        totals.request_count
    );
    let _ = io::stdout().flush();
}

/// Print thinking content (dimmed).
pub fn print_thinking(text: &str) {
    println!("{}", text.dimmed());
    let _ = io::stdout().flush();
}

/// Print text content.
pub fn print_text(text: &str) {
    println!("{text}");
    let _ = io::stdout().flush();
}

/// Print a tool request.
pub fn print_tool_use(tool: &ToolUseEvent, raw_mode: bool) {
    let line = tool
        .start_line
        .map_or(String::new(), |l| format!(" @{l}"));
    println!(
        "{} {}{} ({})",
        "[TOOL]".cyan().bold(),
        tool.tool_name.bold(),
        line.dimmed(),
        format_tool_input(&tool.raw_input, raw_mode).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print tool result output.
pub fn print_tool_result(result: &ToolResultEvent, raw_mode: bool) {
    let name = result.tool_name.as_deref().unwrap_or("tool");
    let duration = result
        .duration_ms
        .map_or(String::new(), |ms| format!(" {ms}ms"));
    let content_short = truncate(&result.content, 150, raw_mode);
    let label = format!("{name}{duration}");
    if result.is_error {
        println!(
            "{} {} {}",
            "[RESULT]".red().bold(),
            label.dimmed(),
            content_short
        );
    } else {
        println!(
            "{} {} {}",
            "[RESULT]".green().bold(),
            label.dimmed(),
            content_short
        );
    }
    let _ = io::stdout().flush();
}

/// Print the task list written by the todo tool.
pub fn print_todos(todos: &[Value]) {
    println!("{}", "[TODOS]".magenta().bold());
    for todo in todos {
        let content = todo.get("content").and_then(Value::as_str).unwrap_or("?");
        let marker = match todo.get("status").and_then(Value::as_str) {
            Some("completed") => "x",
            Some("in_progress") => ">",
            _ => " ",
        };
        println!("  [{marker}] {content}");
    }
    let _ = io::stdout().flush();
}

/// Print a permission prompt header.
pub fn print_permission_request(request: &PermissionRequestEvent, raw_mode: bool) {
    let pattern = request
        .pattern
        .as_deref()
        .map_or(String::new(), |p| format!(" [pattern: {p}]"));
    println!(
        "{} {} ({}){}",
        "[PERMISSION]".yellow().bold(),
        request.tool_name.bold(),
        format_tool_input(&request.input, raw_mode).dimmed(),
        pattern.dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stdout().flush();
}

/// Print an informational line with a tag.
pub fn print_notice(tag: &str, message: &str) {
    println!("{} {}", tag.yellow().bold(), message);
    let _ = io::stdout().flush();
}

/// Print saved conversations, newest first.
pub fn print_history(conversations: &[ConversationSummary]) {
    if conversations.is_empty() {
        println!("{}", "No saved conversations".dimmed());
        return;
    }
    for summary in conversations {
        println!(
            "{} {} {} msgs, ${:.4}  {}",
            summary.ended_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            summary.id.cyan(),
            summary.message_count,
            summary.total_cost,
            truncate(
                summary.first_user_message.as_deref().unwrap_or(""),
                DEFAULT_MAX_LEN,
                false
            )
        );
    }
    let _ = io::stdout().flush();
}
