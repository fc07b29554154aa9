//! Message pipeline tests.

mod permission_test;

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use claude_chat_bridge::pipeline::{FileAccess, MessageProcessor, UiEvent};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// In-memory files keyed by the path string the tool reported.
#[derive(Debug, Default)]
pub struct FakeFiles {
    files: Mutex<HashMap<String, String>>,
}

impl FakeFiles {
    pub fn set(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }
}

#[async_trait]
impl FileAccess for FakeFiles {
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let key = path.to_string_lossy().into_owned();
        self.files
            .lock()
            .unwrap()
            .get(&key)
            .map(|content| content.clone().into_bytes())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, key))
    }
}

/// A processor wired to an event channel and fake files.
pub struct Harness {
    pub processor: MessageProcessor,
    pub events: UnboundedReceiver<UiEvent>,
    pub files: Arc<FakeFiles>,
}

impl Harness {
    pub fn new() -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let files = Arc::new(FakeFiles::default());
        let processor = MessageProcessor::new(Arc::new(tx), files.clone());
        Self {
            processor,
            events,
            files,
        }
    }

    pub async fn feed(&mut self, lines: &[&str]) {
        for line in lines {
            self.processor.process_line(line).await;
        }
    }

    pub fn drain(&mut self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn kinds(events: &[UiEvent]) -> Vec<&'static str> {
    events.iter().map(UiEvent::kind).collect()
}
