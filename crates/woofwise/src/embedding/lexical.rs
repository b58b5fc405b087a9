use anyhow::Result;

use super::EmbeddingModel;
use crate::similarity;

// violet ignore chunk
/// Common English stop words to filter out
const STOP_WORDS: &[&str] = &[
  // Articles and determiners
  "the", "a", "an", "this", "that", // Conjunctions
  "and", "or", "but", // Prepositions
  "in", "on", "at", "to", "for", "of", "with", "by", "about", // Common verbs
  "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will",
  "would", "could", "should", "me", // Pronouns
  "i", "i'm", "you", "your", "we", "our", "us", "they", "them", "their", "it", "its", "what",
  "which", "what's",
];

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashed bag-of-words embeddings.
///
/// Deterministic and model-free: each non-stop-word token is hashed into one
/// of `dimension` buckets and the counts are L2-normalized. Texts that share
/// vocabulary end up close under cosine similarity.
#[derive(Debug, Clone)]
pub struct LexicalEmbeddingModel {
  dimension: usize,
}

impl LexicalEmbeddingModel {
  pub fn new(dimension: usize) -> Self {
    Self { dimension: dimension.max(1) }
  }

  fn embed_text(&self, text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; self.dimension];
    for word in extract_words(text) {
      let bucket = (fnv1a(word.as_bytes()) % self.dimension as u64) as usize;
      vector[bucket] += 1.0;
    }
    similarity::normalize(vector)
  }
}

impl Default for LexicalEmbeddingModel {
  fn default() -> Self {
    Self::new(384)
  }
}

impl EmbeddingModel for LexicalEmbeddingModel {
  fn compute_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    Ok(texts.iter().map(|text| self.embed_text(text)).collect())
  }

  fn dimension(&self) -> usize {
    self.dimension
  }

  fn model_name(&self) -> &str {
    "lexical-fnv1a"
  }
}

/// Extract meaningful lowercase words from text, filtering out stop words
pub fn extract_words(text: &str) -> Vec<String> {
  text
    .split_whitespace()
    .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
    .filter(|word| !word.is_empty() && !STOP_WORDS.contains(&word.as_str()))
    .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
  bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| (hash ^ byte as u64).wrapping_mul(FNV_PRIME))
}
