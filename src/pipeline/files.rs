//! Workspace file access for before/after edit snapshots.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Reads files on behalf of the pipeline.
#[async_trait]
pub trait FileAccess: Send + Sync {
    /// Read the full contents of `path`.
    async fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// Reads from the local file system, resolving relative paths against an
/// optional workspace root.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFiles {
    root: Option<PathBuf>,
}

impl WorkspaceFiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl FileAccess for WorkspaceFiles {
    async fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.resolve(path)).await
    }
}

/// Read a file as text, swallowing any failure.
///
/// Returns `None` when the read fails; the error is only logged. Invalid
/// UTF-8 is decoded lossily.
pub async fn read_snapshot(files: &dyn FileAccess, path: &str) -> Option<String> {
    match files.read_file(Path::new(path)).await {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::debug!(path, error = %e, "Snapshot read failed");
            None
        }
    }
}
