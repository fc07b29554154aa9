//! Line framing and record classification for Claude Code stdout.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::cli::StreamRecord;

/// Default buffer size for record channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;

/// Size of a single read from the child's stdout.
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Error type for stream operations.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// A line could not be parsed as a stream record.
    #[error("Failed to parse record: {reason}")]
    ParseError {
        /// The offending input line.
        input: String,
        /// Parser error message.
        reason: String,
    },
    /// Reading from the stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Splits a byte stream into newline-delimited text records.
///
/// Chunks may end anywhere, including in the middle of a UTF-8 sequence:
/// bytes are buffered until a `\n` arrives and only complete lines are
/// decoded. Decoding is lossy, so invalid UTF-8 becomes U+FFFD instead of an
/// error. Lines are trimmed and blank lines are discarded.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let scan_from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut cursor = scan_from;
        while let Some(offset) = self.pending[cursor..].iter().position(|b| *b == b'\n') {
            let end = cursor + offset;
            if let Some(line) = decode_line(&self.pending[start..end]) {
                lines.push(line);
            }
            start = end + 1;
            cursor = start;
        }

        self.pending.drain(..start);
        lines
    }

    /// Flush the trailing partial line at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }

    /// Number of buffered bytes not yet terminated by a newline.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parser for the stream-json record protocol.
pub struct StreamParser;

impl StreamParser {
    /// Parse a single line of stream-json output.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::ParseError` if the line is not a JSON record.
    pub fn parse_line(line: &str) -> Result<StreamRecord, StreamError> {
        serde_json::from_str(line).map_err(|e| StreamError::ParseError {
            input: line.to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse a line, dropping anything that is not a record.
    ///
    /// Non-JSON output on stdout is expected noise and is only traced.
    #[must_use]
    pub fn classify(line: &str) -> Option<StreamRecord> {
        match Self::parse_line(line) {
            Ok(record) => Some(record),
            Err(StreamError::ParseError { input, reason }) => {
                tracing::trace!(line = %input, %reason, "Dropping non-record line");
                None
            }
            Err(e) => {
                tracing::trace!(error = %e, "Dropping unreadable line");
                None
            }
        }
    }

    /// Read records from `reader` and send them to `tx` until EOF.
    ///
    /// Returns early without error if the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Io` if reading fails.
    pub async fn parse_stdout<R>(mut reader: R, tx: Sender<StreamRecord>) -> Result<(), StreamError>
    where
        R: AsyncRead + Unpin,
    {
        let mut framer = LineFramer::new();
        let mut buf = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            for line in framer.push(&buf[..n]) {
                if let Some(record) = Self::classify(&line) {
                    if tx.send(record).await.is_err() {
                        tracing::debug!("Record receiver dropped, stopping reader");
                        return Ok(());
                    }
                }
            }
        }

        if let Some(record) = framer.finish().as_deref().and_then(Self::classify) {
            let _ = tx.send(record).await;
        }
        Ok(())
    }

    /// Spawn a reader task and return the receiving end of its channel.
    ///
    /// The channel closes when the reader reaches EOF or fails.
    pub fn into_channel<R>(reader: R, buffer: usize) -> Receiver<StreamRecord>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer);
        tokio::spawn(async move {
            if let Err(e) = Self::parse_stdout(reader, tx).await {
                tracing::warn!(error = %e, "Stream reader stopped");
            }
        });
        rx
    }
}

/// Read records from an async reader as a `Stream`.
///
/// Unlike [`StreamParser::into_channel`] this does not spawn a task; records
/// are produced as the stream is polled.
pub fn read_records<R>(reader: R) -> impl futures_core::Stream<Item = StreamRecord>
where
    R: AsyncRead + Unpin,
{
    struct State<R> {
        reader: R,
        framer: LineFramer,
        ready: VecDeque<StreamRecord>,
        done: bool,
    }

    let state = State {
        reader,
        framer: LineFramer::new(),
        ready: VecDeque::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(record) = state.ready.pop_front() {
                return Some((record, state));
            }
            if state.done {
                return None;
            }
            match state.reader.read(&mut buf).await {
                Ok(0) => {
                    state.done = true;
                    state
                        .ready
                        .extend(state.framer.finish().as_deref().and_then(StreamParser::classify));
                }
                Ok(n) => {
                    let lines = state.framer.push(&buf[..n]);
                    state
                        .ready
                        .extend(lines.iter().filter_map(|line| StreamParser::classify(line)));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stream read failed");
                    state.done = true;
                }
            }
        }
    })
}
