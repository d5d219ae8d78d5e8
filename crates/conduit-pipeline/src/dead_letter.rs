//! Dead-letter sink
//!
//! Terminal destination for records that exhausted their retry budget or
//! failed in a way retries cannot fix. Items land here with their original
//! payload and failure reason for operator inspection; nothing is silently
//! dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_store::ChangeRecord;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::error;

/// One escalated item, payload preserved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub record: ChangeRecord,
    /// Delivery attempts made before escalation
    pub attempts: u32,
    pub reason: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub escalated_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    /// Build an entry for a record that is done retrying
    #[must_use]
    pub fn new(record: ChangeRecord, attempts: u32, reason: impl Into<String>) -> Self {
        Self {
            record,
            attempts,
            reason: reason.into(),
            escalated_at: Utc::now(),
        }
    }
}

/// Sink write failure
#[derive(Debug, thiserror::Error)]
#[error("dead-letter sink failure: {0}")]
pub struct DeadLetterError(pub String);

/// Terminal sink for exhausted items
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Persist one entry
    async fn push(&self, entry: DeadLetterEntry) -> Result<(), DeadLetterError>;
}

/// Durable append-only JSONL file sink
///
/// One JSON object per line; append-only so partially written history is
/// never rewritten. Suitable as the default terminal sink for a worker.
#[derive(Debug, Clone)]
pub struct JsonlDeadLetter {
    path: PathBuf,
}

impl JsonlDeadLetter {
    /// Sink writing to the given file, created on first push
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the underlying file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeadLetterSink for JsonlDeadLetter {
    async fn push(&self, entry: DeadLetterEntry) -> Result<(), DeadLetterError> {
        error!(
            sequence = %entry.record.sequence,
            attempts = entry.attempts,
            reason = %entry.reason,
            "escalating change record to dead letter"
        );
        let mut line =
            serde_json::to_vec(&entry).map_err(|e| DeadLetterError(e.to_string()))?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DeadLetterError(e.to_string()))?;
        file.write_all(&line)
            .await
            .map_err(|e| DeadLetterError(e.to_string()))?;
        file.flush().await.map_err(|e| DeadLetterError(e.to_string()))?;
        Ok(())
    }
}

/// In-memory sink for tests
#[derive(Debug, Default)]
pub struct MemoryDeadLetter {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl MemoryDeadLetter {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything escalated so far
    #[must_use]
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().clone()
    }

    /// Number of escalated items
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing was escalated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetter {
    async fn push(&self, entry: DeadLetterEntry) -> Result<(), DeadLetterError> {
        self.entries.lock().push(entry);
        Ok(())
    }
}
