use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::ServiceError;
use crate::kernel::event::DeliveryLogEntry;
use crate::services::DeliveryLog;

/// In-memory delivery log. Entries are kept in append order.
#[derive(Debug, Default)]
pub struct MemoryDeliveryLog {
    entries: Mutex<Vec<DeliveryLogEntry>>,
}

impl MemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<DeliveryLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeliveryLog for MemoryDeliveryLog {
    async fn append(&self, entry: DeliveryLogEntry) -> Result<(), ServiceError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
        Ok(())
    }
}

/// Append-only JSON Lines file, one entry per line.
#[derive(Debug, Clone)]
pub struct JsonlDeliveryLog {
    path: PathBuf,
}

impl JsonlDeliveryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl DeliveryLog for JsonlDeliveryLog {
    async fn append(&self, entry: DeliveryLogEntry) -> Result<(), ServiceError> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
