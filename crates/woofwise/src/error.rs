use thiserror::Error;

pub type Result<T> = std::result::Result<T, WoofwiseError>;

#[derive(Error, Debug)]
pub enum WoofwiseError {
  #[error("Breed dataset unavailable: {reason}")]
  DatasetUnavailable { reason: String },

  #[error("Malformed breed dataset: {0}")]
  Dataset(String),

  #[error("Embedding service failure: {0}")]
  Embedding(#[source] anyhow::Error),

  #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  #[error("Completion service failure: {0}")]
  Completion(String),

  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error("Invalid query plan: {0}")]
  QueryPlan(String),

  #[error("Configuration error: {0}")]
  Config(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

impl WoofwiseError {
  pub fn dataset_unavailable(reason: impl Into<String>) -> Self {
    Self::DatasetUnavailable { reason: reason.into() }
  }

  pub fn invalid_input(message: impl Into<String>) -> Self {
    Self::InvalidInput(message.into())
  }

  pub fn query_plan(message: impl Into<String>) -> Self {
    Self::QueryPlan(message.into())
  }

  pub fn config(message: impl Into<String>) -> Self {
    Self::Config(message.into())
  }

  pub fn completion(message: impl Into<String>) -> Self {
    Self::Completion(message.into())
  }

  /// True for failures that leave a component permanently unusable
  /// rather than failing a single query.
  pub fn is_unavailable(&self) -> bool {
    matches!(self, Self::DatasetUnavailable { .. })
  }
}
