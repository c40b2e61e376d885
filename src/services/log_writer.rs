//! Append-only per-order log files

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::domain::aggregates::LogEntry;
use crate::domain::value_objects::OrderId;
use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append one entry to the order's destination, returning where it landed
    async fn append(&self, order_id: &OrderId, entry: &LogEntry) -> Result<PathBuf>;
}

/// Writes `order_data_log_<id>.txt` files under a base directory
#[derive(Debug)]
pub struct FileLogWriter {
    base_dir: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileLogWriter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), locks: Mutex::new(HashMap::new()) }
    }

    pub fn base_dir(&self) -> &Path { &self.base_dir }

    pub fn path_for(&self, order_id: &OrderId) -> PathBuf {
        self.base_dir.join(format!("order_data_log_{}.txt", order_id.file_safe()))
    }

    /// Create the base directory if absent. Safe to call repeatedly.
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Drops the registry entry once no other append holds or awaits it
    fn release(&self, path: &Path, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks.get(path).is_some_and(|held| Arc::strong_count(held) == 1) {
            locks.remove(path);
        }
    }

    async fn write_entry(&self, path: &Path, entry: &LogEntry) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    #[cfg(test)]
    fn registered_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl LogSink for FileLogWriter {
    #[instrument(skip(self, entry), fields(order_id = %order_id))]
    async fn append(&self, order_id: &OrderId, entry: &LogEntry) -> Result<PathBuf> {
        self.ensure_dir().await?;
        let path = self.path_for(order_id);

        let lock = self.lock_for(&path);
        let written = {
            let _guard = lock.lock().await;
            self.write_entry(&path, entry).await
        };
        self.release(&path, lock);
        written?;

        debug!(path = %path.display(), bytes = entry.as_bytes().len(), "log entry appended");
        Ok(path)
    }
}
