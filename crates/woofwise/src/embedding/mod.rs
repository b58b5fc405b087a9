//! Text embedding providers.
//!
//! Every provider maps text to a fixed-length vector. Vectors are only
//! comparable when they come from the same provider, so components that
//! cache embeddings also remember the provider's dimension.

use anyhow::{anyhow, Result};
use std::sync::Arc;

mod lexical;
mod mock;
#[cfg(feature = "neural")]
mod onnx;

pub use lexical::LexicalEmbeddingModel;
pub use mock::MockEmbeddingModel;
#[cfg(feature = "neural")]
pub use onnx::OnnxEmbeddingModel;

use crate::config::{EmbeddingBackend, EmbeddingConfig};

/// Trait for computing text embeddings - allows for testing with mocks
pub trait EmbeddingModel: Send + Sync {
  /// Embed a batch of texts, one vector per input in input order
  fn compute_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

  /// Embed a single text
  fn embed(&self, text: &str) -> Result<Vec<f32>> {
    self
      .compute_embeddings(&[text.to_string()])?
      .into_iter()
      .next()
      .ok_or_else(|| anyhow!("Embedding provider returned no vector for query"))
  }

  /// Length of every vector this provider produces
  fn dimension(&self) -> usize;

  fn model_name(&self) -> &str;
}

pub type SharedEmbeddingModel = Arc<dyn EmbeddingModel>;

/// Build the embedding provider selected by configuration.
///
/// Loading a neural model is a one-time blocking operation; failures here
/// are fatal because no router or retriever can work without embeddings.
pub async fn create_model(config: &EmbeddingConfig) -> Result<SharedEmbeddingModel> {
  match config.backend {
    EmbeddingBackend::Lexical => {
      bentley::verbose!("using lexical embeddings ({} dimensions)", config.dimension);
      Ok(Arc::new(LexicalEmbeddingModel::new(config.dimension)))
    }
    EmbeddingBackend::Onnx => create_onnx_model(config).await,
  }
}

#[cfg(feature = "neural")]
async fn create_onnx_model(config: &EmbeddingConfig) -> Result<SharedEmbeddingModel> {
  let model = OnnxEmbeddingModel::load(&config.model).await?;
  Ok(Arc::new(model))
}

#[cfg(not(feature = "neural"))]
async fn create_onnx_model(config: &EmbeddingConfig) -> Result<SharedEmbeddingModel> {
  let _ = config;
  Err(anyhow!(
    "Neural features not enabled - rebuild with the `neural` feature or set embedding.backend to lexical"
  ))
}
