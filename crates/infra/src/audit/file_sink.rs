//! Append-only JSON-lines audit log.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use oncovista_core::{AuditSink, SinkError};
use oncovista_domain::AuditRecord;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditSink {
    /// Sink appending to `path`; parent directories are created on demand.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn send(&self, record: &AuditRecord) -> Result<(), SinkError> {
        let mut line =
            serde_json::to_vec(record).map_err(|err| SinkError::Unavailable(err.to_string()))?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(unavailable)?;
        }
        let mut file =
            OpenOptions::new().create(true).append(true).open(&self.path).await.map_err(unavailable)?;
        file.write_all(&line).await.map_err(unavailable)?;
        file.flush().await.map_err(unavailable)
    }
}

fn unavailable(err: std::io::Error) -> SinkError {
    SinkError::Unavailable(err.to_string())
}
