use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::EmbeddingModel;

/// Mock embedding model for testing
///
/// Texts registered with [`with_vector`](Self::with_vector) get their exact
/// vector back; anything else cycles through `response_embeddings`.
pub struct MockEmbeddingModel {
  pub fail_on_texts: Vec<String>,
  pub response_embeddings: Vec<Vec<f32>>,
  vectors: HashMap<String, Vec<f32>>,
  calls: AtomicUsize,
}

impl Default for MockEmbeddingModel {
  fn default() -> Self {
    Self::new()
  }
}

impl MockEmbeddingModel {
  pub fn new() -> Self {
    Self {
      fail_on_texts: vec![],
      response_embeddings: vec![vec![0.1, 0.2, 0.3]; 10], // Default mock embeddings
      vectors: HashMap::new(),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn with_failure_on(mut self, text: impl Into<String>) -> Self {
    self.fail_on_texts.push(text.into());
    self
  }

  pub fn with_embeddings(mut self, embeddings: Vec<Vec<f32>>) -> Self {
    self.response_embeddings = embeddings;
    self
  }

  pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
    self.vectors.insert(text.into(), vector);
    self
  }

  /// Number of `compute_embeddings` calls made so far
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl EmbeddingModel for MockEmbeddingModel {
  fn compute_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    self.calls.fetch_add(1, Ordering::SeqCst);

    // Check if we should fail for any of these texts
    for text in texts {
      if self.fail_on_texts.contains(text) {
        return Err(anyhow!("Mock failure for text: {}", text));
      }
    }

    let mut result = Vec::with_capacity(texts.len());
    for (i, text) in texts.iter().enumerate() {
      if let Some(vector) = self.vectors.get(text) {
        result.push(vector.clone());
        continue;
      }
      if self.response_embeddings.is_empty() {
        return Err(anyhow!("Mock has no embedding for text: {}", text));
      }
      let embedding_index = i % self.response_embeddings.len();
      result.push(self.response_embeddings[embedding_index].clone());
    }

    Ok(result)
  }

  fn dimension(&self) -> usize {
    self
      .vectors
      .values()
      .next()
      .or_else(|| self.response_embeddings.first())
      .map(Vec::len)
      .unwrap_or(0)
  }

  fn model_name(&self) -> &str {
    "mock"
  }
}
