//! Two-tier Semantic Cache (spec §4.5): an in-memory exact-match tier in
//! front of a persistent exact+semantic tier.

pub mod embed;
pub mod memory;
pub mod persistent;

use crate::config::CacheConfig;
use crate::error::PipelineResult;
use memory::MemoryCache;
use pdf_transl_storage::StorageBackend;
use persistent::PersistentCache;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub normalized_text: String,
    pub target_language: String,
    pub model_identifier: String,
}

impl CacheKey {
    pub fn new(text: &str, target_language: &str, model_identifier: &str) -> Self {
        Self {
            normalized_text: normalize_text(text),
            target_language: target_language.to_string(),
            model_identifier: model_identifier.to_string(),
        }
    }
}

/// Whitespace collapsed, leading/trailing trimmed. No lowercase folding —
/// headings are case-significant (spec §4.5).
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub translated_text: String,
    pub embedding: Vec<f32>,
    pub quality_score: f64,
    pub timestamp: i64,
}

pub enum CacheHit {
    Exact(CacheEntry),
    Semantic(CacheEntry),
    Miss,
}

pub struct SemanticCache {
    memory: Option<MemoryCache>,
    persistent: Option<PersistentCache>,
}

impl SemanticCache {
    pub async fn new(storage: Option<Box<dyn StorageBackend>>, config: &CacheConfig) -> PipelineResult<Self> {
        let memory = config.enable_memory.then(|| MemoryCache::new(config.memory_capacity));

        let persistent = match (config.enable_persistent, storage) {
            (true, Some(backend)) => Some(
                PersistentCache::load(
                    backend,
                    config.persistent_path.to_string_lossy().to_string(),
                    config.persistent_capacity,
                    config.similarity_threshold,
                )
                .await?,
            ),
            _ => None,
        };

        Ok(Self { memory, persistent })
    }

    /// Exact lookup in the memory tier, then exact then semantic lookup in
    /// the persistent tier.
    pub fn lookup(&self, key: &CacheKey) -> CacheHit {
        if let Some(memory) = &self.memory {
            if let Some(entry) = memory.get(key) {
                return CacheHit::Exact(entry);
            }
        }
        if let Some(persistent) = &self.persistent {
            if let Some(entry) = persistent.get_exact(key) {
                return CacheHit::Exact(entry);
            }
            if let Some(entry) = persistent.get_semantic(key) {
                return CacheHit::Semantic(entry);
            }
        }
        CacheHit::Miss
    }

    pub async fn store(&self, key: CacheKey, entry: CacheEntry, timestamp: i64) -> PipelineResult<()> {
        if let Some(memory) = &self.memory {
            memory.put(key.clone(), entry.clone());
        }
        if let Some(persistent) = &self.persistent {
            persistent.put(key, entry, timestamp).await?;
        }
        Ok(())
    }
}

/// Quality score derivation (spec §4.5): an exact structural pass is 1.0;
/// recoveries through the transport fallback chain score lower in
/// proportion to how far down the chain they needed to go.
pub fn quality_score_for(validator_confidence: f64, used_fallback_split: bool) -> f64 {
    if used_fallback_split {
        (validator_confidence * 0.7).clamp(0.0, 1.0)
    } else {
        validator_confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whitespace_without_lowercasing() {
        let key = CacheKey::new("  Hello   World  ", "fr", "gpt-4o-mini");
        assert_eq!(key.normalized_text, "Hello World");
    }

    #[test]
    fn fallback_split_lowers_quality_score() {
        assert!(quality_score_for(1.0, true) < quality_score_for(1.0, false));
    }
}
