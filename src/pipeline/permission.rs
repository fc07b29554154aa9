//! Pending tool-permission requests and their responses.

use std::collections::HashMap;

use serde_json::Value;

use crate::cli::{CanUseTool, OutboundRecord, PermissionDecision, StdinHandle, ToolInput};

/// Tools whose `command` argument is a shell command line.
const SHELL_TOOLS: [&str; 1] = ["Bash"];

/// Commands whose second word is a meaningful subcommand.
const SUBCOMMANDS: &[(&str, &[&str])] = &[
    (
        "git",
        &[
            "add", "branch", "checkout", "cherry-pick", "clone", "commit", "diff", "fetch",
            "init", "log", "merge", "pull", "push", "rebase", "remote", "reset", "restore",
            "show", "stash", "status", "switch", "tag",
        ],
    ),
    (
        "npm",
        &[
            "build", "ci", "exec", "install", "publish", "run", "start", "test", "uninstall",
            "update",
        ],
    ),
    ("yarn", &["add", "build", "install", "remove", "run", "test"]),
    ("pnpm", &["add", "build", "install", "remove", "run", "test"]),
    (
        "cargo",
        &[
            "add", "bench", "build", "check", "clippy", "doc", "fmt", "install", "run", "test",
            "update",
        ],
    ),
    ("go", &["build", "fmt", "get", "mod", "run", "test", "vet"]),
    (
        "docker",
        &[
            "build", "compose", "exec", "images", "ps", "pull", "push", "rm", "run", "stop",
        ],
    ),
    ("kubectl", &["apply", "delete", "describe", "exec", "get", "logs"]),
    ("pip", &["install", "uninstall"]),
    ("gh", &["issue", "pr", "release", "repo", "run"]),
];

/// Shell operators that chain or redirect commands.
const SHELL_OPERATORS: [&str; 6] = ["&&", "||", "|", ";", ">", "<"];

/// Derive an "always allow commands like this" pattern from a shell command.
///
/// Known command/subcommand pairs keep both words (`git commit -m x` →
/// `git commit *`). Other multi-word commands keep the first word
/// (`ls -la` → `ls *`) unless they chain or redirect, in which case the
/// literal command is returned. A single word is returned as-is.
#[must_use]
pub fn derive_command_pattern(command: &str) -> Option<String> {
    let command = command.trim();
    let mut words = command.split_whitespace();
    let first = words.next()?;
    let Some(second) = words.next() else {
        return Some(first.to_string());
    };

    let is_known_pair = SUBCOMMANDS
        .iter()
        .any(|(cmd, subs)| *cmd == first && subs.contains(&second));
    if is_known_pair {
        return Some(format!("{first} {second} *"));
    }

    if SHELL_OPERATORS.iter().any(|op| command.contains(op)) {
        return Some(command.to_string());
    }

    Some(format!("{first} *"))
}

/// Pattern for a tool call, if the tool runs shell commands.
#[must_use]
pub fn pattern_for_tool(tool_name: &str, input: &ToolInput) -> Option<String> {
    if !SHELL_TOOLS.contains(&tool_name) {
        return None;
    }
    input
        .get("command")
        .and_then(Value::as_str)
        .and_then(derive_command_pattern)
}

/// A permission request awaiting a user decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPermission {
    pub request_id: String,
    pub tool_name: String,
    pub input: ToolInput,
    pub suggestions: Option<Value>,
    pub tool_use_id: Option<String>,
    pub pattern: Option<String>,
}

/// Tracks permission requests and writes decisions back to the CLI.
#[derive(Debug, Default)]
pub struct PermissionBroker {
    pending: HashMap<String, PendingPermission>,
}

impl PermissionBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `can_use_tool` request and return the stored entry.
    pub fn register(&mut self, request_id: &str, request: CanUseTool) -> PendingPermission {
        let pattern = pattern_for_tool(&request.tool_name, &request.input);
        let pending = PendingPermission {
            request_id: request_id.to_string(),
            tool_name: request.tool_name,
            input: request.input,
            suggestions: request.permission_suggestions,
            tool_use_id: request.tool_use_id,
            pattern,
        };
        tracing::debug!(
            request_id,
            tool = %pending.tool_name,
            pattern = ?pending.pattern,
            "Permission requested"
        );
        self.pending.insert(request_id.to_string(), pending.clone());
        pending
    }

    /// Resolve a request and write the decision to stdin.
    ///
    /// Unknown ids and closed streams are silent no-ops; returns whether a
    /// decision was written.
    pub fn respond(
        &mut self,
        request_id: &str,
        approved: bool,
        always_allow: bool,
        stdin: Option<&StdinHandle>,
    ) -> bool {
        let Some(pending) = self.pending.remove(request_id) else {
            tracing::debug!(request_id, "No pending permission for response");
            return false;
        };
        let Some(stdin) = stdin.filter(|s| s.is_open()) else {
            tracing::debug!(request_id, "Stdin closed, dropping permission response");
            return false;
        };

        let decision = PermissionDecision::from_response(approved, always_allow);
        tracing::info!(
            request_id,
            tool = %pending.tool_name,
            ?decision,
            "Permission decided"
        );
        stdin.send(&OutboundRecord::control_response(request_id, decision))
    }

    /// Forget a request without answering it.
    pub fn cancel(&mut self, request_id: &str) -> bool {
        self.pending.remove(request_id).is_some()
    }

    /// Drop every pending request, returning how many were cleared.
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    #[must_use]
    pub fn get(&self, request_id: &str) -> Option<&PendingPermission> {
        self.pending.get(request_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
