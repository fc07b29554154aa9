//! Tests for Claude process spawning and control.

use std::time::Duration;

use claude_chat_bridge::cli::{ClaudeProcess, ClaudeProcessBuilder, SpawnError};

#[test]
fn builder_default_flags() {
    let args = ClaudeProcessBuilder::new().build_args();

    assert_eq!(
        args,
        vec![
            "-p",
            "--output-format",
            "stream-json",
            "--input-format",
            "stream-json",
            "--verbose",
            "--permission-prompt-tool",
            "stdio",
        ]
    );
}

#[test]
fn builder_optional_flags() {
    let builder = ClaudeProcessBuilder::new()
        .model("opus")
        .permission_mode("acceptEdits")
        .resume("session_abc123")
        .mcp_config("/tmp/mcp.json");
    let args = builder.build_args();

    assert!(args.windows(2).any(|w| w == ["--model", "opus"]));
    assert!(args
        .windows(2)
        .any(|w| w == ["--permission-mode", "acceptEdits"]));
    assert!(args.windows(2).any(|w| w == ["--resume", "session_abc123"]));
    assert!(args.windows(2).any(|w| w == ["--mcp-config", "/tmp/mcp.json"]));
    assert_eq!(builder.get_resume_session(), Some("session_abc123"));
}

#[test]
fn builder_launcher_args_come_first() {
    let args = ClaudeProcessBuilder::new()
        .launcher_args(["fake-claude.sh"])
        .build_args();
    assert_eq!(args[0], "fake-claude.sh");
    assert_eq!(args[1], "-p");
}

#[test]
fn builder_working_dir() {
    let builder = ClaudeProcessBuilder::new().working_dir("/tmp");
    assert_eq!(
        builder.get_working_dir().map(|p| p.to_str()),
        Some(Some("/tmp"))
    );
}

#[test]
fn spawn_missing_binary_is_not_found() {
    let result = ClaudeProcess::spawn_with_binary(
        "definitely-not-a-claude-binary-7f3a",
        &ClaudeProcessBuilder::new(),
    );
    assert!(matches!(result, Err(SpawnError::NotFound)));
}

#[cfg(unix)]
#[tokio::test]
async fn graceful_terminate_stops_long_running_process() {
    let builder = ClaudeProcessBuilder::new().launcher_args(["-c", "sleep 30", "sh"]);
    let mut process = ClaudeProcess::spawn_with_binary("sh", &builder).unwrap();
    assert!(process.id().is_some());

    tokio::time::timeout(
        Duration::from_secs(10),
        process.graceful_terminate(Duration::from_secs(2)),
    )
    .await
    .expect("terminate should not hang")
    .unwrap();
    assert!(process.try_wait().unwrap().is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn pipes_can_be_taken_once() {
    let builder = ClaudeProcessBuilder::new().launcher_args(["-c", "exit 0", "sh"]);
    let mut process = ClaudeProcess::spawn_with_binary("sh", &builder).unwrap();

    assert!(process.take_stdin().is_some());
    assert!(process.take_stdin().is_none());
    assert!(process.take_stdout().is_some());
    assert!(process.take_stderr().is_some());
    assert!(process.wait().await.unwrap().success());
}
