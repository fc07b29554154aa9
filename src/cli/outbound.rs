//! Records written to Claude Code's stdin.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Decision sent back for a `can_use_tool` control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Allow,
    AllowAlways,
    Deny,
}

impl PermissionDecision {
    /// Map a UI response to a decision. `always_allow` only matters when approved.
    #[must_use]
    pub fn from_response(approved: bool, always_allow: bool) -> Self {
        match (approved, always_allow) {
            (true, true) => Self::AllowAlways,
            (true, false) => Self::Allow,
            (false, _) => Self::Deny,
        }
    }
}

/// A content block in an outbound user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundContent {
    Text { text: String },
}

/// Message body of an outbound user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub role: &'static str,
    pub content: Vec<OutboundContent>,
}

/// A record written to the CLI's stdin, one per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundRecord {
    /// A user turn.
    User {
        session_id: String,
        message: OutboundMessage,
        parent_tool_use_id: Option<String>,
    },
    /// Answer to a permission control request.
    ControlResponse {
        request_id: String,
        permission_decision: PermissionDecision,
    },
}

impl OutboundRecord {
    /// Build a plain-text user turn. An unknown session is sent as `""`.
    #[must_use]
    pub fn user_text(session_id: Option<&str>, text: impl Into<String>) -> Self {
        Self::User {
            session_id: session_id.unwrap_or_default().to_string(),
            message: OutboundMessage {
                role: "user",
                content: vec![OutboundContent::Text { text: text.into() }],
            },
            parent_tool_use_id: None,
        }
    }

    /// Build a permission decision record.
    #[must_use]
    pub fn control_response(request_id: impl Into<String>, decision: PermissionDecision) -> Self {
        Self::ControlResponse {
            request_id: request_id.into(),
            permission_decision: decision,
        }
    }

    /// Serialize as a newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Sending half of the CLI's stdin.
///
/// Lines go through a channel to a writer task that owns the pipe. The
/// stream counts as open while that task is alive; dropping every handle
/// closes the pipe.
#[derive(Debug, Clone)]
pub struct StdinHandle {
    tx: UnboundedSender<String>,
}

impl StdinHandle {
    /// Wrap an existing line sender.
    #[must_use]
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Create a handle together with the receiver a writer should drain.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns true while the writer side is still accepting lines.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a record. Returns false if the stream is closed or the record
    /// could not be serialized.
    pub fn send(&self, record: &OutboundRecord) -> bool {
        let line = match record.to_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize stdin record");
                return false;
            }
        };
        self.tx.send(line).is_ok()
    }
}

/// Spawn a task that writes queued lines to `writer` until every
/// [`StdinHandle`] is dropped, then shuts the writer down.
pub fn spawn_stdin_writer<W>(mut writer: W, mut rx: UnboundedReceiver<String>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                tracing::debug!(error = %e, "Stdin write failed, closing");
                return;
            }
            if let Err(e) = writer.flush().await {
                tracing::debug!(error = %e, "Stdin flush failed, closing");
                return;
            }
        }
        let _ = writer.shutdown().await;
        tracing::trace!("Stdin closed");
    })
}
