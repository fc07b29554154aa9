//! Tests for the permission broker and its stdin decisions.

use claude_chat_bridge::cli::{CanUseTool, StdinHandle};
use claude_chat_bridge::pipeline::{pattern_for_tool, PermissionBroker};
use serde_json::{json, Value};

fn request(tool_name: &str, input: &Value) -> CanUseTool {
    serde_json::from_value(json!({
        "tool_name": tool_name,
        "input": input,
        "tool_use_id": "toolu_1",
        "permission_suggestions": [{"type": "addRules"}]
    }))
    .unwrap()
}

fn decision(line: &str) -> Value {
    let value: Value = serde_json::from_str(line.trim_end()).unwrap();
    value["permission_decision"].clone()
}

#[test]
fn register_keeps_request_details() {
    let mut broker = PermissionBroker::new();
    let pending = broker.register("r1", request("Bash", &json!({"command": "npm install left-pad"})));

    assert_eq!(pending.pattern.as_deref(), Some("npm install *"));
    assert_eq!(pending.tool_use_id.as_deref(), Some("toolu_1"));
    assert!(pending.suggestions.is_some());
    assert_eq!(broker.get("r1"), Some(&pending));
    assert_eq!(broker.len(), 1);
}

#[test]
fn non_shell_tools_have_no_pattern() {
    let mut broker = PermissionBroker::new();
    let pending = broker.register("r1", request("Write", &json!({"file_path": "a.txt"})));
    assert_eq!(pending.pattern, None);
}

#[test]
fn decisions_map_to_wire_values() {
    let (stdin, mut written) = StdinHandle::channel();
    let mut broker = PermissionBroker::new();
    for id in ["a", "b", "c"] {
        broker.register(id, request("Bash", &json!({"command": "ls -la"})));
    }

    assert!(broker.respond("a", true, false, Some(&stdin)));
    assert!(broker.respond("b", true, true, Some(&stdin)));
    assert!(broker.respond("c", false, true, Some(&stdin)));

    assert_eq!(decision(&written.try_recv().unwrap()), "allow");
    assert_eq!(decision(&written.try_recv().unwrap()), "allow_always");
    assert_eq!(decision(&written.try_recv().unwrap()), "deny");
    assert!(broker.is_empty());
}

#[test]
fn closed_stdin_drops_the_decision() {
    let (stdin, written) = StdinHandle::channel();
    drop(written);
    let mut broker = PermissionBroker::new();
    broker.register("r1", request("Bash", &json!({"command": "ls"})));

    assert!(!broker.respond("r1", true, false, Some(&stdin)));
    assert!(broker.is_empty());
}

#[test]
fn clear_forgets_every_request() {
    let mut broker = PermissionBroker::new();
    broker.register("r1", request("Bash", &json!({"command": "ls"})));
    broker.register("r2", request("Bash", &json!({"command": "pwd"})));
    assert_eq!(broker.clear(), 2);
    assert!(broker.get("r1").is_none());
}

#[test]
fn shell_patterns() {
    let cases = [
        ("git commit -m \"fix\"", Some("git commit *")),
        ("cargo test --all", Some("cargo test *")),
        ("git frobnicate now", Some("git *")),
        ("ls -la", Some("ls *")),
        ("cat a.txt | grep x", Some("cat a.txt | grep x")),
        ("make", Some("make")),
        ("   ", None),
    ];
    for (command, expected) in cases {
        let input = json!({"command": command});
        let input = input.as_object().unwrap();
        assert_eq!(
            pattern_for_tool("Bash", input).as_deref(),
            expected,
            "command: {command}"
        );
    }
}
