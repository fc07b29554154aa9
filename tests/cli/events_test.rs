//! Tests for stream-json record deserialization.

use claude_chat_bridge::cli::{
    ContentBlock, ControlRequestBody, MessageContent, StreamParser, StreamRecord, SystemRecord,
};
use serde_json::json;

fn parse(line: &str) -> StreamRecord {
    StreamParser::parse_line(line).expect("record should parse")
}

#[test]
fn system_init_record() {
    let record = parse(
        r#"{"type":"system","subtype":"init","session_id":"abc","cwd":"/work","model":"claude-sonnet","tools":["Read","Bash"],"mcp_servers":[{"name":"fs","status":"connected"}],"permissionMode":"default"}"#,
    );

    match &record {
        StreamRecord::System(SystemRecord::Init(init)) => {
            assert_eq!(init.session_id, "abc");
            assert_eq!(init.model.as_deref(), Some("claude-sonnet"));
            assert_eq!(init.tools, vec!["Read", "Bash"]);
            assert_eq!(init.mcp_servers[0].name, "fs");
            assert_eq!(init.permission_mode.as_deref(), Some("default"));
        }
        other => panic!("Expected system init, got {other:?}"),
    }
    assert_eq!(record.session_id(), Some("abc"));
    assert_eq!(record.kind(), "system.init");
}

#[test]
fn system_status_and_compact_boundary() {
    let status = parse(r#"{"type":"system","subtype":"status","status":"compacting"}"#);
    match status {
        StreamRecord::System(SystemRecord::Status(status)) => assert!(status.is_compacting()),
        other => panic!("Expected status, got {other:?}"),
    }

    let boundary = parse(
        r#"{"type":"system","subtype":"compact_boundary","compactMetadata":{"trigger":"auto","preTokens":150000}}"#,
    );
    match boundary {
        StreamRecord::System(SystemRecord::CompactBoundary(boundary)) => {
            let metadata = boundary.compact_metadata.expect("metadata");
            assert_eq!(metadata.trigger.as_deref(), Some("auto"));
            assert_eq!(metadata.pre_tokens, Some(150_000));
        }
        other => panic!("Expected compact boundary, got {other:?}"),
    }
}

#[test]
fn unknown_system_subtype_is_other() {
    let record = parse(r#"{"type":"system","subtype":"hook_response","output":"ok"}"#);
    assert!(matches!(record, StreamRecord::System(SystemRecord::Other)));
}

#[test]
fn assistant_record_with_blocks_and_usage() {
    let record = parse(
        r#"{"type":"assistant","session_id":"abc","message":{"id":"msg_1","content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"Hello"},{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}},{"type":"image","source":{}}],"usage":{"input_tokens":10,"output_tokens":5,"cache_read_input_tokens":3}}}"#,
    );

    let StreamRecord::Assistant(assistant) = record else {
        panic!("Expected assistant record");
    };
    let content = &assistant.message.content;
    assert_eq!(content.len(), 4);
    assert!(matches!(&content[0], ContentBlock::Thinking { thinking } if thinking == "hmm"));
    assert!(matches!(&content[1], ContentBlock::Text { text } if text == "Hello"));
    match &content[2] {
        ContentBlock::ToolUse { id, name, input } => {
            assert_eq!(id.as_deref(), Some("t1"));
            assert_eq!(name, "Bash");
            assert_eq!(input.get("command"), Some(&json!("ls")));
        }
        other => panic!("Expected tool use, got {other:?}"),
    }
    assert!(matches!(content[3], ContentBlock::Unknown));

    let usage = assistant.message.usage.expect("usage");
    assert_eq!(usage.input_tokens, 10);
    assert_eq!(usage.output_tokens, 5);
    assert_eq!(usage.cache_read_input_tokens, 3);
    assert_eq!(usage.cache_creation_input_tokens, 0);
}

#[test]
fn tool_use_without_id() {
    let record = parse(
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Read","input":{}}]}}"#,
    );
    let StreamRecord::Assistant(assistant) = record else {
        panic!("Expected assistant record");
    };
    assert!(matches!(
        &assistant.message.content[0],
        ContentBlock::ToolUse { id: None, .. }
    ));
}

#[test]
fn user_record_with_tool_results() {
    let record = parse(
        r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"file.txt"},{"type":"tool_result","tool_use_id":"t2","content":[{"type":"text","text":"x"}],"is_error":true}]}}"#,
    );
    let StreamRecord::User(user) = record else {
        panic!("Expected user record");
    };
    let blocks = user.message.content.blocks();
    assert_eq!(blocks.len(), 2);
    match &blocks[0] {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            assert_eq!(tool_use_id.as_deref(), Some("t1"));
            assert_eq!(content, &Some(json!("file.txt")));
            assert!(!is_error);
        }
        other => panic!("Expected tool result, got {other:?}"),
    }
    assert!(matches!(
        &blocks[1],
        ContentBlock::ToolResult { is_error: true, .. }
    ));
}

#[test]
fn user_record_with_plain_text_content() {
    let record = parse(r#"{"type":"user","message":{"role":"user","content":"hi"}}"#);
    let StreamRecord::User(user) = record else {
        panic!("Expected user record");
    };
    assert_eq!(user.message.content, MessageContent::Text("hi".to_string()));
    assert!(user.message.content.blocks().is_empty());
}

#[test]
fn result_records() {
    let success = parse(
        r#"{"type":"result","subtype":"success","session_id":"abc","is_error":false,"total_cost_usd":0.01,"duration_ms":1200,"num_turns":2,"result":"done"}"#,
    );
    let StreamRecord::Result(result) = success else {
        panic!("Expected result record");
    };
    assert!(result.is_success());
    assert_eq!(result.total_cost_usd, Some(0.01));
    assert_eq!(result.num_turns, Some(2));

    let failure = parse(
        r#"{"type":"result","subtype":"error_during_execution","is_error":true,"errors":["No conversation found with session ID: x"]}"#,
    );
    assert!(failure.is_terminal());
    let StreamRecord::Result(result) = failure else {
        panic!("Expected result record");
    };
    assert!(!result.is_success());
    assert_eq!(result.errors.len(), 1);
}

#[test]
fn legacy_cost_field_is_accepted() {
    let record = parse(r#"{"type":"result","subtype":"success","cost_usd":0.5}"#);
    let StreamRecord::Result(result) = record else {
        panic!("Expected result record");
    };
    assert_eq!(result.total_cost_usd, Some(0.5));
}

#[test]
fn control_request_can_use_tool() {
    let record = parse(
        r#"{"type":"control_request","request_id":"req-1","request":{"subtype":"can_use_tool","tool_name":"Bash","input":{"command":"git status"},"permission_suggestions":[{"type":"addRules"}],"tool_use_id":"t9"}}"#,
    );
    let StreamRecord::ControlRequest(request) = record else {
        panic!("Expected control request");
    };
    assert_eq!(request.request_id, "req-1");
    match request.request {
        ControlRequestBody::CanUseTool(can_use) => {
            assert_eq!(can_use.tool_name, "Bash");
            assert_eq!(can_use.tool_use_id.as_deref(), Some("t9"));
            assert!(can_use.permission_suggestions.is_some());
        }
        ControlRequestBody::Other => panic!("Expected can_use_tool"),
    }
}

#[test]
fn unsupported_control_request_is_other() {
    let record = parse(
        r#"{"type":"control_request","request_id":"req-2","request":{"subtype":"interrupt"}}"#,
    );
    assert!(matches!(
        record,
        StreamRecord::ControlRequest(ref r) if r.request == ControlRequestBody::Other
    ));
}

#[test]
fn side_channel_records() {
    assert!(matches!(
        parse(r#"{"type":"control_cancel_request","request_id":"req-1"}"#),
        StreamRecord::ControlCancelRequest { ref request_id } if request_id == "req-1"
    ));
    assert!(matches!(
        parse(r#"{"type":"control_response","response":{"subtype":"success"}}"#),
        StreamRecord::ControlResponse { .. }
    ));

    match parse(r#"{"type":"accountInfo","email":"dev@example.com","plan":"pro"}"#) {
        StreamRecord::AccountInfo { fields } => {
            assert_eq!(fields.get("email"), Some(&json!("dev@example.com")));
        }
        other => panic!("Expected account info, got {other:?}"),
    }
}

#[test]
fn unknown_record_type() {
    let record = parse(r#"{"type":"stream_event","event":{}}"#);
    assert!(matches!(record, StreamRecord::Unknown));
    assert_eq!(record.session_id(), None);
}
