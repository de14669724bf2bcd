//! Durable line sinks backing the audit recorder

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Where audit lines are durably written.
///
/// `write_line` must not return until the line is durable; the recorder
/// treats any error as `AuditWriteFailed` and fails the enforcement call
/// closed.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write_line(&self, line: &str) -> Result<()>;
    /// All previously written lines, oldest first
    async fn read_lines(&self) -> Result<Vec<String>>;
}

/// Append-only JSONL file sink; each write is flushed and synced before it
/// returns.
pub struct FileSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl FileSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl AuditSink for FileSink {
    async fn write_line(&self, line: &str) -> Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::AuditWriteFailed(e.to_string()))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| Error::AuditWriteFailed(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| Error::AuditWriteFailed(e.to_string()))?;
        file.sync_data()
            .await
            .map_err(|e| Error::AuditWriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn read_lines(&self) -> Result<Vec<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(content.lines().map(str::to_string).collect())
    }
}

/// In-memory sink for tests and ephemeral runs
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn write_line(&self, line: &str) -> Result<()> {
        self.lines.lock().await.push(line.to_string());
        Ok(())
    }

    async fn read_lines(&self) -> Result<Vec<String>> {
        Ok(self.lines.lock().await.clone())
    }
}

/// Sink that refuses every write, for fail-closed tests
pub struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    async fn write_line(&self, _line: &str) -> Result<()> {
        Err(Error::AuditWriteFailed("sink unavailable".to_string()))
    }

    async fn read_lines(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
