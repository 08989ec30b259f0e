//! Sentence embedding for the persistent cache tier's semantic lookup (spec
//! §4.5). A hashed-trigram projection stands in for a learned embedding
//! model: deterministic, dependency-free, and good enough to catch
//! near-duplicate paragraphs without pulling in an ML runtime. `SentenceEmbedder`
//! is a trait so a real model can be substituted later.

use std::hash::{Hash, Hasher};

pub trait SentenceEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

pub struct HashedTrigramEmbedder {
    dims: usize,
}

impl HashedTrigramEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashedTrigramEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl SentenceEmbedder for HashedTrigramEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let normalized = normalize_for_embedding(text);
        let mut vector = vec![0f32; self.dims];
        for trigram in char_trigrams(&normalized) {
            let bucket = hash_trigram(&trigram) % self.dims as u64;
            vector[bucket as usize] += 1.0;
        }
        l2_normalize(&mut vector);
        vector
    }
}

/// Strips the transport placeholder tokens, collapses whitespace, but does
/// NOT lowercase (headings are case-significant per spec §4.5).
pub fn normalize_for_embedding(text: &str) -> String {
    let stripped = text
        .replace(crate::transport::PARAGRAPH_BREAK, " ")
        .replace(crate::transport::ITEM_BREAK, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn char_trigrams(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < 3 {
        return vec![text.to_string()];
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

fn hash_trigram(trigram: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    trigram.hash(&mut hasher);
    hasher.finish()
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_similarity_one() {
        let embedder = HashedTrigramEmbedder::default();
        let a = embedder.embed("The quick brown fox jumps over the lazy dog.");
        let b = embedder.embed("The quick brown fox jumps over the lazy dog.");
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn unrelated_text_has_low_similarity() {
        let embedder = HashedTrigramEmbedder::default();
        let a = embedder.embed("The quick brown fox jumps over the lazy dog.");
        let b = embedder.embed("Quantum entanglement defies classical intuition entirely.");
        assert!(cosine_similarity(&a, &b) < 0.5);
    }

    #[test]
    fn normalization_strips_transport_tokens_without_lowercasing() {
        let normalized = normalize_for_embedding(&format!(
            "Heading Text{}more   body   text",
            crate::transport::PARAGRAPH_BREAK
        ));
        assert!(!normalized.contains("PARAGRAPH_BREAK"));
        assert!(normalized.contains("Heading Text"));
    }
}
