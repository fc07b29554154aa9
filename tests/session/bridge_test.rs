//! Tests for the NDJSON bridge.

use std::sync::Arc;

use claude_chat_bridge::config::ChatConfig;
use claude_chat_bridge::pipeline::UiEvent;
use claude_chat_bridge::session::{run_bridge, BridgeCommand, ChatSession};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

/// Run a bridge over `input` and return the parsed output events.
async fn run(config: &ChatConfig, input: &str) -> Vec<UiEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = ChatSession::new(config, Arc::new(tx));

    let (mut front_in, bridge_in) = tokio::io::duplex(64 * 1024);
    let (bridge_out, mut front_out) = tokio::io::duplex(1024 * 1024);

    front_in.write_all(input.as_bytes()).await.unwrap();
    drop(front_in);

    run_bridge(session, rx, bridge_in, bridge_out).await.unwrap();

    let mut output = String::new();
    front_out.read_to_string(&mut output).await.unwrap();
    output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn command_wire_format() {
    let command = BridgeCommand::PermissionResponse {
        request_id: "r1".to_string(),
        approved: true,
        always_allow: true,
    };
    let json = serde_json::to_value(&command).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "type": "permissionResponse",
            "requestId": "r1",
            "approved": true,
            "alwaysAllow": true
        })
    );
    assert_eq!(
        BridgeCommand::parse(r#"{"type":"newSession"}"#),
        Some(BridgeCommand::NewSession)
    );
}

#[tokio::test]
async fn empty_input_closes_cleanly() {
    let config = ChatConfig {
        persist_conversations: false,
        ..ChatConfig::default()
    };
    let events = run(&config, "").await;
    assert!(events.is_empty());
}

#[tokio::test]
async fn stop_without_turn_is_harmless() {
    let config = ChatConfig {
        persist_conversations: false,
        ..ChatConfig::default()
    };
    let events = run(&config, "{\"type\":\"stop\"}\ngarbage\n").await;
    assert!(events.is_empty());
}

#[tokio::test]
async fn failed_spawn_is_reported_as_events() {
    let config = ChatConfig {
        binary: "/nonexistent/claude-chat-test-binary".to_string(),
        persist_conversations: false,
        ..ChatConfig::default()
    };
    let events = run(&config, "{\"type\":\"sendMessage\",\"text\":\"hi\"}\n").await;

    let kinds: Vec<&str> = events.iter().map(UiEvent::kind).collect();
    assert_eq!(
        kinds,
        vec!["userInput", "processingState", "error", "processingState"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn messages_run_in_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let log = dir.path().join("calls.log");
    let script = format!(
        r#"printf '%s\n' "$*" >> '{log}'
IFS= read -r line
echo '{{"type":"system","subtype":"init","session_id":"sess-b"}}'
echo '{{"type":"assistant","message":{{"content":[{{"type":"text","text":"pong"}}]}}}}'
echo '{{"type":"result","subtype":"success","session_id":"sess-b","total_cost_usd":0.5}}'
"#,
        log = log.display()
    );
    let config = ChatConfig {
        persist_conversations: false,
        ..super::fake_cli(dir.path(), &script)
    };

    let input = concat!(
        "{\"type\":\"sendMessage\",\"text\":\"ping\"}\n",
        "{\"type\":\"sendMessage\",\"text\":\"ping again\"}\n",
        "{\"type\":\"newSession\"}\n",
        "{\"type\":\"sendMessage\",\"text\":\"fresh\"}\n",
    );
    let events = run(&config, input).await;

    let user_inputs: Vec<&UiEvent> = events
        .iter()
        .filter(|e| matches!(e, UiEvent::UserInput(_)))
        .collect();
    assert_eq!(
        user_inputs,
        vec![
            &UiEvent::UserInput("ping".to_string()),
            &UiEvent::UserInput("ping again".to_string()),
            &UiEvent::UserInput("fresh".to_string()),
        ]
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == UiEvent::Output("pong".to_string()))
            .count(),
        3
    );
    assert_eq!(events.last(), Some(&UiEvent::ProcessingState(false)));

    let calls = std::fs::read_to_string(log).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(calls.len(), 3);
    assert!(!calls[0].contains("--resume"));
    assert!(calls[1].contains("--resume sess-b"));
    assert!(!calls[2].contains("--resume"));
}
