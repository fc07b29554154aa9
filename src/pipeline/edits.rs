//! Tool classification and edit-location hints.

use serde_json::Value;

use crate::cli::ToolInput;

/// Tools that modify a file named by `file_path`.
pub const FILE_EDIT_TOOLS: [&str; 3] = ["Edit", "MultiEdit", "Write"];

/// Tools whose successful results are hidden in the chat.
pub const HIDDEN_RESULT_TOOLS: [&str; 2] = ["Read", "TodoWrite"];

/// The structured task-list tool.
pub const TODO_TOOL: &str = "TodoWrite";

/// Placeholder for a tool result with no content.
pub const EMPTY_RESULT_PLACEHOLDER: &str = "Tool executed successfully";

#[must_use]
pub fn is_file_edit_tool(tool_name: &str) -> bool {
    FILE_EDIT_TOOLS.contains(&tool_name)
}

#[must_use]
pub fn is_hidden_result_tool(tool_name: &str) -> bool {
    HIDDEN_RESULT_TOOLS.contains(&tool_name)
}

/// The `file_path` argument of a tool call, if present and non-empty.
#[must_use]
pub fn edited_file_path(input: &ToolInput) -> Option<&str> {
    input
        .get("file_path")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
}

/// The `todos` array of a task-list tool call.
#[must_use]
pub fn todo_items(tool_name: &str, input: &ToolInput) -> Option<Vec<Value>> {
    if tool_name != TODO_TOOL {
        return None;
    }
    input.get("todos").and_then(Value::as_array).cloned()
}

/// 1-based line on which `needle` first occurs in `haystack`.
///
/// Falls back to line 1 when the text is not found. Repeated occurrences
/// resolve to the first one.
#[must_use]
pub fn first_occurrence_line(haystack: &str, needle: &str) -> u32 {
    haystack.find(needle).map_or(1, |idx| {
        let newlines = haystack[..idx].bytes().filter(|b| *b == b'\n').count();
        u32::try_from(newlines).unwrap_or(u32::MAX - 1) + 1
    })
}

/// Starting line(s) of an edit within the pre-edit file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditLines {
    /// Single `Edit` call.
    Single(u32),
    /// One entry per sub-edit of a `MultiEdit` call.
    Multi(Vec<u32>),
}

impl EditLines {
    #[must_use]
    pub fn single(&self) -> Option<u32> {
        match self {
            Self::Single(line) => Some(*line),
            Self::Multi(_) => None,
        }
    }

    #[must_use]
    pub fn multi(&self) -> Option<Vec<u32>> {
        match self {
            Self::Single(_) => None,
            Self::Multi(lines) => Some(lines.clone()),
        }
    }
}

/// Compute edit start lines for `Edit` and `MultiEdit` calls.
#[must_use]
pub fn edit_start_lines(tool_name: &str, input: &ToolInput, before: &str) -> Option<EditLines> {
    match tool_name {
        "Edit" => input
            .get("old_string")
            .and_then(Value::as_str)
            .map(|old| EditLines::Single(first_occurrence_line(before, old))),
        "MultiEdit" => {
            let edits = input.get("edits").and_then(Value::as_array)?;
            let lines = edits
                .iter()
                .map(|edit| {
                    edit.get("old_string")
                        .and_then(Value::as_str)
                        .map_or(1, |old| first_occurrence_line(before, old))
                })
                .collect();
            Some(EditLines::Multi(lines))
        }
        _ => None,
    }
}
