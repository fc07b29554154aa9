//! On-disk conversation history.
//!
//! Each conversation lives in `<dir>/<id>.json`; `<dir>/index.json` lists
//! summaries newest first.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::{
    first_user_message, last_message, ConversationLog, ConversationMessage, SessionTotals,
};

/// Current index format version.
const INDEX_VERSION: u32 = 1;

/// Maximum number of summaries kept in the index.
pub const MAX_INDEX_ENTRIES: usize = 100;

/// Maximum characters of message text kept in a summary.
const SUMMARY_TEXT_LIMIT: usize = 100;

/// Errors from reading or writing conversation files.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Failed to create conversation directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Conversation I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize conversation: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A saved conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConversation {
    pub id: String,
    pub session_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub messages: Vec<ConversationMessage>,
}

impl StoredConversation {
    /// Snapshot a session's log and totals.
    #[must_use]
    pub fn from_log(
        id: impl Into<String>,
        session_id: Option<&str>,
        log: &ConversationLog,
        totals: &SessionTotals,
    ) -> Self {
        let ended_at = Utc::now();
        Self {
            id: id.into(),
            session_id: session_id.map(str::to_string),
            started_at: log.started_at().unwrap_or(ended_at),
            ended_at,
            total_cost: totals.total_cost,
            total_tokens: totals.total_tokens(),
            messages: log.messages().to_vec(),
        }
    }

    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        let truncate = |text: &str| truncate_chars(text, SUMMARY_TEXT_LIMIT);

        ConversationSummary {
            id: self.id.clone(),
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            message_count: self.messages.len(),
            total_cost: self.total_cost,
            total_tokens: self.total_tokens,
            first_user_message: first_user_message(&self.messages).map(truncate),
            last_message: last_message(&self.messages).map(truncate),
        }
    }
}

/// Index entry for a saved conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub session_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub message_count: usize,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub first_user_message: Option<String>,
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConversationIndex {
    version: u32,
    conversations: Vec<ConversationSummary>,
}

impl Default for ConversationIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            conversations: Vec::new(),
        }
    }
}

/// Directory-backed conversation store.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.dir.join("index.json")
    }

    /// Write a conversation and move it to the top of the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or files cannot be written.
    pub fn save(&self, conversation: &StoredConversation) -> Result<ConversationSummary, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(format!("{}.json", conversation.id));
        write_atomic(&path, &serde_json::to_string_pretty(conversation)?)?;

        let summary = conversation.summary();
        let mut index = self.load_index()?;
        index.conversations.retain(|c| c.id != summary.id);
        index.conversations.insert(0, summary.clone());
        index.conversations.truncate(MAX_INDEX_ENTRIES);
        write_atomic(&self.index_path(), &serde_json::to_string_pretty(&index)?)?;

        tracing::debug!(
            id = %conversation.id,
            messages = conversation.messages.len(),
            "Saved conversation"
        );
        Ok(summary)
    }

    /// Load a conversation by id. Unknown or malformed ids yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self, id: &str) -> Result<Option<StoredConversation>, StoreError> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        let path = self.dir.join(format!("{id}.json"));
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Summaries of saved conversations, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the index exists but cannot be read or parsed.
    pub fn list(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        Ok(self.load_index()?.conversations)
    }

    fn load_index(&self) -> Result<ConversationIndex, StoreError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(ConversationIndex::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
