//! Per-invocation tool metrics, keyed by tool-use id.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::cli::ToolInput;
use crate::pipeline::{EditLines, TokenUsageUpdate};

/// Bookkeeping for a tool invocation that has not produced a result yet.
#[derive(Debug, Clone)]
pub struct ToolUseMetric {
    pub tool_use_id: String,
    pub tool_name: String,
    pub started_at: Instant,
    /// Token counts of the assistant message that requested the tool.
    pub tokens: TokenUsageUpdate,
    pub input: ToolInput,
    /// File content before an edit tool ran.
    pub file_content_before: Option<String>,
    pub edit_lines: Option<EditLines>,
}

impl ToolUseMetric {
    #[must_use]
    pub fn new(
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        tokens: TokenUsageUpdate,
        input: ToolInput,
    ) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            started_at: Instant::now(),
            tokens,
            input,
            file_content_before: None,
            edit_lines: None,
        }
    }

    /// Time since the invocation started. Never negative.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Elapsed time in whole milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Key for a tool invocation that arrived without an id.
#[must_use]
pub fn synthetic_tool_use_id(tool_name: &str, at: DateTime<Utc>) -> String {
    format!("{tool_name}-{}", at.timestamp_millis())
}

/// Live tool metrics. At most one entry per id.
#[derive(Debug, Default)]
pub struct ToolMetricTracker {
    metrics: HashMap<String, ToolUseMetric>,
}

impl ToolMetricTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a metric, replacing any live entry with the same id.
    pub fn insert(&mut self, metric: ToolUseMetric) -> Option<ToolUseMetric> {
        let replaced = self.metrics.insert(metric.tool_use_id.clone(), metric);
        if let Some(old) = &replaced {
            tracing::warn!(
                tool_use_id = %old.tool_use_id,
                tool = %old.tool_name,
                "Replacing live tool metric"
            );
        }
        replaced
    }

    #[must_use]
    pub fn get(&self, tool_use_id: &str) -> Option<&ToolUseMetric> {
        self.metrics.get(tool_use_id)
    }

    #[must_use]
    pub fn contains(&self, tool_use_id: &str) -> bool {
        self.metrics.contains_key(tool_use_id)
    }

    /// Remove and return a metric.
    pub fn remove(&mut self, tool_use_id: &str) -> Option<ToolUseMetric> {
        self.metrics.remove(tool_use_id)
    }

    /// Drop every live metric, returning how many were cleared.
    pub fn clear(&mut self) -> usize {
        let count = self.metrics.len();
        self.metrics.clear();
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
