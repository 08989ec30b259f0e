//! Append-only Quarantine Store (spec §4.8): durable record of blocks that
//! failed translation terminally. The pipeline substitutes `original_text`
//! for the block and continues; this store exists for the human-in-the-loop
//! follow-up pass.

use crate::document::BlockId;
use crate::error::PipelineResult;
use pdf_transl_storage::StorageBackend;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineRecord {
    pub document_id: String,
    pub block_id: BlockId,
    pub block_type: String,
    pub original_text: String,
    pub last_error: String,
    pub attempt_count: u32,
    pub timestamp: i64,
    /// The few blocks immediately before/after, for a human reviewer to
    /// re-establish context without re-opening the source PDF.
    pub context_neighbors: Vec<String>,
}

pub struct QuarantineStore {
    storage: Box<dyn StorageBackend>,
    directory: String,
    append_lock: Mutex<()>,
}

impl QuarantineStore {
    pub fn new(storage: Box<dyn StorageBackend>, directory: impl Into<String>) -> Self {
        Self { storage, directory: directory.into(), append_lock: Mutex::new(()) }
    }

    /// Appends one record as a JSON line. The mutex on the append path
    /// matches spec §5's "append-only with a mutex on the append path".
    pub async fn record(&self, entry: &QuarantineRecord) -> PipelineResult<()> {
        let _guard = self.append_lock.lock().await;
        let line = serde_json::to_string(entry)?;
        let path = format!("{}/{}.jsonl", self.directory, entry.document_id);
        self.storage.append_bytes(&path, format!("{line}\n").as_bytes()).await?;
        Ok(())
    }

    pub async fn records_for_document(&self, document_id: &str) -> PipelineResult<Vec<QuarantineRecord>> {
        let path = format!("{}/{document_id}.jsonl", self.directory);
        if !self.storage.exists(&path).await? {
            return Ok(Vec::new());
        }
        let bytes = self.storage.read_bytes(&path).await?;
        let records = String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();
        Ok(records)
    }

    pub async fn has_any_for_document(&self, document_id: &str) -> PipelineResult<bool> {
        Ok(!self.records_for_document(document_id).await?.is_empty())
    }
}
