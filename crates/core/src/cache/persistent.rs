use super::embed::{cosine_similarity, normalize_for_embedding, HashedTrigramEmbedder, SentenceEmbedder};
use super::{CacheEntry, CacheKey};
use crate::error::PipelineResult;
use pdf_transl_storage::StorageBackend;
use std::sync::Mutex;

const SHARD_FILE: &str = "entries.jsonl";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoredRecord {
    normalized_text: String,
    target_language: String,
    model_identifier: String,
    translated_text: String,
    embedding: Vec<f32>,
    quality_score: f64,
    timestamp: i64,
}

/// Persistent tier (spec §4.5 tier 2): exact-key lookup plus semantic
/// lookup over a fixed-size in-memory index, mirrored to disk with an
/// atomic full-file rewrite on every mutation. A true append-then-compact
/// scheme would cut write amplification, but a single atomic rewrite is
/// the simplest implementation that cannot produce a torn read, which is
/// the only guarantee the spec actually requires.
pub struct PersistentCache {
    storage: Box<dyn StorageBackend>,
    base_path: String,
    capacity: usize,
    embedder: Box<dyn SentenceEmbedder>,
    similarity_threshold: f32,
    records: Mutex<Vec<StoredRecord>>,
}

impl PersistentCache {
    pub async fn load(
        storage: Box<dyn StorageBackend>,
        base_path: impl Into<String>,
        capacity: usize,
        similarity_threshold: f64,
    ) -> PipelineResult<Self> {
        let base_path = base_path.into();
        storage.create_dir(&base_path).await?;
        let shard_path = format!("{base_path}/{SHARD_FILE}");
        let records = if storage.exists(&shard_path).await? {
            let bytes = storage.read_bytes(&shard_path).await?;
            parse_jsonl(&bytes)
        } else {
            Vec::new()
        };

        Ok(Self {
            storage,
            base_path,
            capacity,
            embedder: Box::new(HashedTrigramEmbedder::default()),
            similarity_threshold: similarity_threshold as f32,
            records: Mutex::new(records),
        })
    }

    pub fn get_exact(&self, key: &CacheKey) -> Option<CacheEntry> {
        let records = self.records.lock().unwrap();
        records
            .iter()
            .find(|r| {
                r.normalized_text == key.normalized_text
                    && r.target_language == key.target_language
                    && r.model_identifier == key.model_identifier
            })
            .map(record_to_entry)
    }

    /// Semantic lookup: among records matching `(target_language,
    /// model_identifier)`, return the top-1 by cosine similarity if it
    /// clears `similarity_threshold`.
    pub fn get_semantic(&self, key: &CacheKey) -> Option<CacheEntry> {
        let query_embedding = self.embedder.embed(&key.normalized_text);
        let records = self.records.lock().unwrap();
        records
            .iter()
            .filter(|r| r.target_language == key.target_language && r.model_identifier == key.model_identifier)
            .map(|r| (r, cosine_similarity(&query_embedding, &r.embedding)))
            .filter(|(_, score)| *score >= self.similarity_threshold)
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(r, _)| record_to_entry(r))
    }

    pub async fn put(&self, key: CacheKey, entry: CacheEntry, timestamp: i64) -> PipelineResult<()> {
        let embedding = if entry.embedding.is_empty() {
            self.embedder.embed(&normalize_for_embedding(&key.normalized_text))
        } else {
            entry.embedding.clone()
        };

        let record = StoredRecord {
            normalized_text: key.normalized_text,
            target_language: key.target_language,
            model_identifier: key.model_identifier,
            translated_text: entry.translated_text,
            embedding,
            quality_score: entry.quality_score,
            timestamp,
        };

        let serialized = {
            let mut records = self.records.lock().unwrap();
            records.push(record);
            evict_over_capacity(&mut records, self.capacity);
            serialize_jsonl(&records)
        };

        let shard_path = format!("{}/{SHARD_FILE}", self.base_path);
        self.storage.write_bytes_atomic(&shard_path, serialized.as_bytes()).await?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

fn evict_over_capacity(records: &mut Vec<StoredRecord>, capacity: usize) {
    while records.len() > capacity {
        let worst_index = records
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.quality_score
                    .partial_cmp(&b.quality_score)
                    .unwrap()
                    .then(a.timestamp.cmp(&b.timestamp))
            })
            .map(|(idx, _)| idx);
        if let Some(idx) = worst_index {
            records.remove(idx);
        } else {
            break;
        }
    }
}

fn record_to_entry(record: &StoredRecord) -> CacheEntry {
    CacheEntry {
        translated_text: record.translated_text.clone(),
        embedding: record.embedding.clone(),
        quality_score: record.quality_score,
        timestamp: record.timestamp,
    }
}

fn serialize_jsonl(records: &[StoredRecord]) -> String {
    records
        .iter()
        .filter_map(|r| serde_json::to_string(r).ok())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_jsonl(bytes: &[u8]) -> Vec<StoredRecord> {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_transl_storage::LocalStorage;
    use tempfile::TempDir;

    fn key(text: &str) -> CacheKey {
        CacheKey {
            normalized_text: text.to_string(),
            target_language: "fr".to_string(),
            model_identifier: "gpt-4o-mini".to_string(),
        }
    }

    fn entry(translated: &str, quality: f64, timestamp: i64) -> CacheEntry {
        CacheEntry { translated_text: translated.to_string(), embedding: vec![], quality_score: quality, timestamp }
    }

    #[tokio::test]
    async fn exact_lookup_roundtrips_through_storage() {
        let dir = TempDir::new().unwrap();
        let storage: Box<dyn StorageBackend> = Box::new(LocalStorage::new(dir.path().to_path_buf(), "http://localhost".to_string()));
        let cache = PersistentCache::load(storage, "cache", 10, 0.85).await.unwrap();
        cache.put(key("hello world"), entry("bonjour monde", 1.0, 1), 1).await.unwrap();

        assert_eq!(cache.get_exact(&key("hello world")).unwrap().translated_text, "bonjour monde");
    }

    #[tokio::test]
    async fn semantic_lookup_matches_near_duplicate_text() {
        let dir = TempDir::new().unwrap();
        let storage: Box<dyn StorageBackend> = Box::new(LocalStorage::new(dir.path().to_path_buf(), "http://localhost".to_string()));
        let cache = PersistentCache::load(storage, "cache", 10, 0.5).await.unwrap();
        cache
            .put(key("The quick brown fox jumps over the lazy dog"), entry("translation", 1.0, 1), 1)
            .await
            .unwrap();

        let near_duplicate = key("The quick brown fox jumps over the lazy dog!");
        assert!(cache.get_semantic(&near_duplicate).is_some());
    }

    #[tokio::test]
    async fn evicts_lowest_quality_score_over_capacity() {
        let dir = TempDir::new().unwrap();
        let storage: Box<dyn StorageBackend> = Box::new(LocalStorage::new(dir.path().to_path_buf(), "http://localhost".to_string()));
        let cache = PersistentCache::load(storage, "cache", 1, 0.85).await.unwrap();
        cache.put(key("low quality entry"), entry("x", 0.2, 1), 1).await.unwrap();
        cache.put(key("high quality entry"), entry("y", 0.9, 2), 2).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.get_exact(&key("low quality entry")).is_none());
        assert!(cache.get_exact(&key("high quality entry")).is_some());
    }
}
