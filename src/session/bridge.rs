//! NDJSON bridge between a front end and a [`ChatSession`].
//!
//! Commands arrive one JSON object per line on the input; UI events leave
//! one JSON object per line on the output.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::pipeline::UiEvent;
use crate::session::{ChatSession, SessionHandle};

/// A command from the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeCommand {
    /// Run a turn with this text.
    SendMessage { text: String },
    /// Answer a permission request.
    #[serde(rename_all = "camelCase")]
    PermissionResponse {
        request_id: String,
        approved: bool,
        #[serde(default)]
        always_allow: bool,
    },
    /// Abort the running turn.
    Stop,
    /// Forget the current conversation.
    NewSession,
}

impl BridgeCommand {
    /// Parse one input line. Blank and malformed lines yield `None`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(command) => Some(command),
            Err(e) => {
                tracing::warn!(error = %e, line, "Ignoring malformed bridge command");
                None
            }
        }
    }
}

/// Run the bridge until `input` reaches EOF and queued turns are done.
///
/// `events` must be the receiving end of the sink the session posts to.
/// Permission responses and stop requests act on the running turn right
/// away; messages and resets are handled in arrival order between turns.
///
/// # Errors
///
/// Returns an error if reading the input fails.
pub async fn run_bridge<R, W>(
    mut session: ChatSession,
    events: UnboundedReceiver<UiEvent>,
    input: R,
    output: W,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = spawn_event_writer(events, output);
    let (turn_tx, mut turn_rx) = mpsc::unbounded_channel();
    let reader = spawn_command_reader(input, session.handle(), turn_tx);

    while let Some(command) = turn_rx.recv().await {
        match command {
            BridgeCommand::SendMessage { text } => {
                if let Err(e) = session.send_message(&text).await {
                    tracing::warn!(error = %e, "Turn failed to start");
                }
            }
            BridgeCommand::NewSession => session.new_session(),
            BridgeCommand::PermissionResponse { .. } | BridgeCommand::Stop => {}
        }
    }

    drop(session);
    let read_result = reader.await.unwrap_or(Ok(()));
    if writer.await.is_err() {
        tracing::warn!("Event writer task failed");
    }
    read_result
}

fn spawn_command_reader<R>(
    input: R,
    handle: SessionHandle,
    turns: UnboundedSender<BridgeCommand>,
) -> JoinHandle<std::io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(input).lines();
        while let Some(line) = lines.next_line().await? {
            let Some(command) = BridgeCommand::parse(&line) else {
                continue;
            };
            tracing::debug!(?command, "Bridge command");
            match command {
                BridgeCommand::PermissionResponse {
                    request_id,
                    approved,
                    always_allow,
                } => {
                    handle.respond_permission(request_id, approved, always_allow);
                }
                BridgeCommand::Stop => {
                    handle.stop();
                }
                other => {
                    if turns.send(other).is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Bridge input closed");
        Ok(())
    })
}

fn spawn_event_writer<W>(mut events: UnboundedReceiver<UiEvent>, mut output: W) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let mut line = match serde_json::to_string(&event) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, kind = event.kind(), "Failed to serialize UI event");
                    continue;
                }
            };
            line.push('\n');
            if let Err(e) = output.write_all(line.as_bytes()).await {
                tracing::debug!(error = %e, "Bridge output closed");
                return;
            }
            let _ = output.flush().await;
        }
    })
}
