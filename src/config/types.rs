//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::ClaudeProcessBuilder;

/// Default Claude CLI executable.
pub const DEFAULT_BINARY: &str = "claude";

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_TERMINATE_TIMEOUT_SECS: u64 = 5;

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// CLI executable, looked up on `PATH` unless absolute.
    pub binary: String,
    /// Arguments placed before the stream-json flags (e.g. a wrapper script).
    pub launcher_args: Vec<String>,
    /// Model passed with `--model`.
    pub model: Option<String>,
    /// Permission mode passed with `--permission-mode`.
    pub permission_mode: Option<String>,
    /// MCP server configuration file.
    pub mcp_config: Option<PathBuf>,
    /// Directory the CLI runs in. Defaults to the current directory.
    pub working_dir: Option<PathBuf>,
    /// Where conversations are saved.
    pub conversations_dir: Option<PathBuf>,
    /// Seconds to wait after SIGTERM before killing the CLI.
    pub terminate_timeout_secs: u64,
    /// Save each completed turn to the conversation store.
    pub persist_conversations: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            launcher_args: Vec::new(),
            model: None,
            permission_mode: None,
            mcp_config: None,
            working_dir: None,
            conversations_dir: None,
            terminate_timeout_secs: DEFAULT_TERMINATE_TIMEOUT_SECS,
            persist_conversations: true,
        }
    }
}

impl ChatConfig {
    #[must_use]
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_secs(self.terminate_timeout_secs)
    }

    /// Conversation directory, falling back to the user data directory.
    #[must_use]
    pub fn conversations_dir(&self) -> Option<PathBuf> {
        self.conversations_dir.clone().or_else(|| {
            dirs::data_dir().map(|dir| dir.join("claude-chat").join("conversations"))
        })
    }

    /// Process builder carrying every per-session flag except `--resume`.
    #[must_use]
    pub fn process_builder(&self) -> ClaudeProcessBuilder {
        let mut builder = ClaudeProcessBuilder::new().launcher_args(self.launcher_args.iter());
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(mode) = &self.permission_mode {
            builder = builder.permission_mode(mode);
        }
        if let Some(path) = &self.mcp_config {
            builder = builder.mcp_config(path);
        }
        if let Some(dir) = &self.working_dir {
            builder = builder.working_dir(dir);
        }
        builder
    }
}
