//! Chat session runner.
//!
//! Each user message runs one CLI process. The session id reported by the
//! CLI is kept between turns and passed back with `--resume`, so the
//! conversation continues across processes.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::ChildStderr;
use tokio::sync::mpsc::{self, Receiver, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cli::{
    spawn_stdin_writer, ClaudeProcess, ClaudeProcessBuilder, SpawnError, StdinHandle,
    StreamParser, StreamRecord, DEFAULT_CHANNEL_BUFFER,
};
use crate::config::ChatConfig;
use crate::pipeline::{
    EventSink, FileAccess, MessageProcessor, SessionSignal, UiEvent, WorkspaceFiles,
};
use crate::session::{ConversationStore, StoredConversation};

/// How long to wait for stderr to drain once the process is gone.
const STDERR_GRACE: Duration = Duration::from_secs(1);

/// Error type for session operations.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The CLI could not be started.
    #[error("Failed to start Claude CLI: {0}")]
    Spawn(#[from] SpawnError),
    /// Process stdout was not available.
    #[error("Process stdout not available")]
    NoStdout,
    /// Process stdin was not available.
    #[error("Process stdin not available")]
    NoStdin,
}

/// Commands accepted while a turn is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Answer a pending permission request.
    RespondPermission {
        request_id: String,
        approved: bool,
        always_allow: bool,
    },
    /// Abort the running turn.
    Stop,
}

/// Cloneable handle for steering a running turn from another task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Queue a command. Returns false if the session is gone.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn respond_permission(
        &self,
        request_id: impl Into<String>,
        approved: bool,
        always_allow: bool,
    ) -> bool {
        self.send(SessionCommand::RespondPermission {
            request_id: request_id.into(),
            approved,
            always_allow,
        })
    }

    pub fn stop(&self) -> bool {
        self.send(SessionCommand::Stop)
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The CLI reported a successful result.
    Completed {
        /// Session identifier.
        session_id: Option<String>,
        /// Cost of this turn in USD.
        cost_usd: Option<f64>,
    },
    /// The CLI reported an error result.
    Failed,
    /// The resumed session no longer exists; the next turn starts fresh.
    SessionNotFound,
    /// Stopped through [`SessionHandle::stop`].
    Stopped,
    /// Cancelled via cancellation token.
    Cancelled,
    /// Stdout closed before a result arrived.
    ProcessExited,
}

impl TurnOutcome {
    /// Returns true if the turn was cut short from this side.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Stopped | Self::Cancelled)
    }
}

/// A multi-turn conversation with the Claude CLI.
pub struct ChatSession {
    processor: MessageProcessor,
    binary: String,
    builder: ClaudeProcessBuilder,
    terminate_timeout: Duration,
    store: Option<ConversationStore>,
    conversation_id: Option<String>,
    commands_tx: UnboundedSender<SessionCommand>,
    commands_rx: UnboundedReceiver<SessionCommand>,
    cancel: Option<CancellationToken>,
}

impl ChatSession {
    /// Create a session from configuration, reading files from disk.
    #[must_use]
    pub fn new(config: &ChatConfig, sink: Arc<dyn EventSink>) -> Self {
        let files = match &config.working_dir {
            Some(dir) => WorkspaceFiles::with_root(dir),
            None => WorkspaceFiles::new(),
        };
        Self::with_files(config, sink, Arc::new(files))
    }

    /// Create a session with a custom file reader.
    #[must_use]
    pub fn with_files(
        config: &ChatConfig,
        sink: Arc<dyn EventSink>,
        files: Arc<dyn FileAccess>,
    ) -> Self {
        let store = if config.persist_conversations {
            config.conversations_dir().map(ConversationStore::new)
        } else {
            None
        };
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Self {
            processor: MessageProcessor::new(sink, files),
            binary: config.binary.clone(),
            builder: config.process_builder(),
            terminate_timeout: config.terminate_timeout(),
            store,
            conversation_id: None,
            commands_tx,
            commands_rx,
            cancel: None,
        }
    }

    /// Continue an existing CLI session.
    #[must_use]
    pub fn resume(mut self, session_id: impl Into<String>) -> Self {
        self.processor = self.processor.with_session_id(session_id);
        self
    }

    /// Set a cancellation token for graceful shutdown.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.commands_tx.clone(),
        }
    }

    #[must_use]
    pub fn processor(&self) -> &MessageProcessor {
        &self.processor
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.processor.session_id()
    }

    /// Id of the stored conversation, once the first turn was saved.
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Forget the current conversation; the next message starts a new one.
    pub fn new_session(&mut self) {
        self.drain_stale_commands();
        self.processor.reset_session();
        self.conversation_id = None;
        tracing::info!("Started new session");
    }

    /// Run one turn: spawn the CLI, send `text`, and pump records until
    /// the process closes stdout or the turn is stopped.
    ///
    /// `processingState(false)` is posted on every exit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started or its pipes are
    /// missing. The failure is also posted as an error event.
    pub async fn send_message(&mut self, text: &str) -> Result<TurnOutcome, SessionError> {
        self.drain_stale_commands();
        self.processor.emit(UiEvent::UserInput(text.to_string()));
        self.processor.emit(UiEvent::ProcessingState(true));

        let mut builder = self.builder.clone();
        if let Some(session_id) = self.processor.session_id() {
            builder = builder.resume(session_id);
        }
        tracing::info!(
            binary = %self.binary,
            resume = ?builder.get_resume_session(),
            "Starting turn"
        );

        let mut process = match ClaudeProcess::spawn_with_binary(&self.binary, &builder) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(binary = %self.binary, error = %e, "Failed to spawn Claude CLI");
                self.processor
                    .emit(UiEvent::Error(format!("Failed to start Claude CLI: {e}")));
                self.processor.emit(UiEvent::ProcessingState(false));
                return Err(e.into());
            }
        };

        let Some(stdout) = process.take_stdout() else {
            self.abort_turn(&mut process, "Claude CLI stdout not available")
                .await;
            return Err(SessionError::NoStdout);
        };
        let Some(stdin) = process.take_stdin() else {
            self.abort_turn(&mut process, "Claude CLI stdin not available")
                .await;
            return Err(SessionError::NoStdin);
        };
        let stderr_task = process.take_stderr().map(collect_stderr);

        let (stdin_handle, stdin_rx) = StdinHandle::channel();
        spawn_stdin_writer(stdin, stdin_rx);
        self.processor.attach_stdin(stdin_handle);
        if !self.processor.write_user_message(text) {
            tracing::warn!("Failed to queue user message for stdin");
        }

        let mut records = StreamParser::into_channel(stdout, DEFAULT_CHANNEL_BUFFER);
        let outcome = self.pump(&mut records).await;
        drop(records);

        Ok(self.finish_turn(process, outcome, stderr_task).await)
    }

    async fn pump(&mut self, records: &mut Receiver<StreamRecord>) -> TurnOutcome {
        let cancel = self.cancel.clone().unwrap_or_default();
        let mut outcome: Option<TurnOutcome> = None;
        // Set once a result arrived; stdout gets this long to close.
        let mut drain_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::info!("Turn cancelled via token");
                    return TurnOutcome::Cancelled;
                }
                Some(command) = self.commands_rx.recv() => match command {
                    SessionCommand::RespondPermission { request_id, approved, always_allow } => {
                        self.processor.respond_to_permission(&request_id, approved, always_allow);
                    }
                    SessionCommand::Stop => {
                        tracing::info!("Turn stopped");
                        return outcome.unwrap_or(TurnOutcome::Stopped);
                    }
                },
                () = sleep_until(drain_deadline) => {
                    tracing::warn!("Claude CLI kept stdout open after result");
                    return outcome.unwrap_or(TurnOutcome::ProcessExited);
                }
                record = records.recv() => {
                    let Some(record) = record else {
                        return outcome.unwrap_or(TurnOutcome::ProcessExited);
                    };
                    let cost_usd = match &record {
                        StreamRecord::Result(result) => result.total_cost_usd,
                        _ => None,
                    };
                    for signal in self.processor.handle_record(record).await {
                        match signal {
                            SessionSignal::SessionIdReceived(session_id) => {
                                tracing::debug!(%session_id, "Session id received");
                            }
                            SessionSignal::TurnComplete => {
                                self.processor.detach_stdin();
                                self.persist();
                                outcome = Some(TurnOutcome::Completed {
                                    session_id: self.processor.session_id().map(str::to_string),
                                    cost_usd,
                                });
                            }
                            SessionSignal::SessionNotFound => {
                                outcome = Some(TurnOutcome::SessionNotFound);
                            }
                            SessionSignal::TurnFailed => {
                                self.processor.detach_stdin();
                                outcome.get_or_insert(TurnOutcome::Failed);
                            }
                        }
                    }
                    if outcome.is_some() && drain_deadline.is_none() {
                        drain_deadline = Some(Instant::now() + self.terminate_timeout);
                    }
                }
            }
        }
    }

    async fn finish_turn(
        &mut self,
        mut process: ClaudeProcess,
        mut outcome: TurnOutcome,
        stderr_task: Option<JoinHandle<String>>,
    ) -> TurnOutcome {
        self.processor.end_turn();

        let status = if outcome.is_interrupted() {
            self.terminate(&mut process).await;
            None
        } else {
            self.wait_for_exit(&mut process).await
        };

        let stderr = match stderr_task {
            Some(task) => tokio::time::timeout(STDERR_GRACE, task)
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default(),
            None => String::new(),
        };
        let stderr = stderr.trim();

        if let Some(status) = status.filter(|s| !s.success()) {
            tracing::warn!(%status, ?outcome, "Claude CLI exited with failure");
            let message = if stderr.is_empty() {
                matches!(outcome, TurnOutcome::ProcessExited)
                    .then(|| format!("Claude CLI exited with {status}"))
            } else {
                Some(stderr.to_string())
            };
            if outcome != TurnOutcome::SessionNotFound {
                if let Some(message) = message {
                    if self.processor.report_failure(&message) == Some(SessionSignal::SessionNotFound) {
                        outcome = TurnOutcome::SessionNotFound;
                    }
                }
            }
        } else if !stderr.is_empty() {
            tracing::debug!(%stderr, "Claude CLI stderr");
        }

        self.processor.emit(UiEvent::ProcessingState(false));
        tracing::info!(?outcome, "Turn finished");
        outcome
    }

    async fn wait_for_exit(&self, process: &mut ClaudeProcess) -> Option<ExitStatus> {
        match tokio::time::timeout(self.terminate_timeout, process.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to wait for Claude CLI");
                None
            }
            Err(_) => {
                tracing::warn!("Claude CLI still running after turn, terminating");
                self.terminate(process).await;
                None
            }
        }
    }

    async fn terminate(&self, process: &mut ClaudeProcess) {
        if let Err(e) = process.graceful_terminate(self.terminate_timeout).await {
            tracing::warn!(error = %e, "Failed to terminate Claude CLI");
        }
    }

    async fn abort_turn(&mut self, process: &mut ClaudeProcess, message: &str) {
        tracing::error!(reason = message, "Aborting turn");
        self.terminate(process).await;
        self.processor.end_turn();
        self.processor.emit(UiEvent::Error(message.to_string()));
        self.processor.emit(UiEvent::ProcessingState(false));
    }

    fn persist(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        if self.processor.conversation().is_empty() {
            return;
        }

        let id = self
            .conversation_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        let conversation = StoredConversation::from_log(
            id,
            self.processor.session_id(),
            self.processor.conversation(),
            self.processor.totals(),
        );
        if let Err(e) = store.save(&conversation) {
            tracing::warn!(error = %e, "Failed to save conversation");
        }
    }

    fn drain_stale_commands(&mut self) {
        let mut dropped = 0usize;
        while self.commands_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded commands sent between turns");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn collect_stderr(mut stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = stderr.read_to_end(&mut buf).await {
            tracing::debug!(error = %e, "Failed to read Claude CLI stderr");
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
