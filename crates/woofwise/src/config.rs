//! Layered configuration: defaults, then a YAML file, then environment
//! overrides. CLI flags are applied last by the binary.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{Result, WoofwiseError};

pub const CONFIG_ENV: &str = "WOOFWISE_CONFIG";
pub const DATASET_ENV: &str = "WOOFWISE_DATASET";
pub const OLLAMA_URL_ENV: &str = "WOOFWISE_OLLAMA_URL";
pub const CHAT_MODEL_ENV: &str = "WOOFWISE_CHAT_MODEL";
pub const EMBEDDING_BACKEND_ENV: &str = "WOOFWISE_EMBEDDING_BACKEND";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WoofwiseConfig {
  pub dataset: DatasetConfig,
  pub embedding: EmbeddingConfig,
  pub retrieval: RetrievalConfig,
  pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
  pub path: PathBuf,
}

impl Default for DatasetConfig {
  fn default() -> Self {
    Self { path: PathBuf::from("data/dog_breeds.csv") }
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
  Onnx,
  Lexical,
}

impl Default for EmbeddingBackend {
  fn default() -> Self {
    if cfg!(feature = "neural") {
      EmbeddingBackend::Onnx
    } else {
      EmbeddingBackend::Lexical
    }
  }
}

impl std::str::FromStr for EmbeddingBackend {
  type Err = WoofwiseError;

  fn from_str(value: &str) -> Result<Self> {
    match value.trim().to_lowercase().as_str() {
      "onnx" => Ok(EmbeddingBackend::Onnx),
      "lexical" => Ok(EmbeddingBackend::Lexical),
      other => Err(WoofwiseError::config(format!("unknown embedding backend '{other}'"))),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
  pub backend: EmbeddingBackend,
  /// HuggingFace model id used by the onnx backend
  pub model: String,
  /// Vector length used by the lexical backend
  pub dimension: usize,
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    Self {
      backend: EmbeddingBackend::default(),
      model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
      dimension: 384,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
  pub top_k: usize,
}

impl Default for RetrievalConfig {
  fn default() -> Self {
    Self { top_k: 3 }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
  pub base_url: String,
  pub chat_model: String,
  pub timeout_secs: u64,
}

impl Default for OllamaConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:11434".to_string(),
      chat_model: "mistral".to_string(),
      timeout_secs: 120,
    }
  }
}

impl WoofwiseConfig {
  /// Resolve configuration from an explicit file, `$WOOFWISE_CONFIG`, or the
  /// user config directory, then apply environment overrides.
  pub fn load(explicit: Option<&Path>) -> Result<Self> {
    let mut config = match config_file_path(explicit) {
      Some(path) => Self::from_file(&path)?,
      None => Self::default(),
    };

    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_file(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path).map_err(|e| {
      WoofwiseError::config(format!("cannot read config file {}: {e}", path.display()))
    })?;
    Self::from_yaml(&content)
  }

  pub fn from_yaml(content: &str) -> Result<Self> {
    serde_yaml::from_str(content)
      .map_err(|e| WoofwiseError::config(format!("invalid config file: {e}")))
  }

  pub fn apply_env_overrides(&mut self) -> Result<()> {
    if let Ok(path) = env::var(DATASET_ENV) {
      self.dataset.path = PathBuf::from(path);
    }
    if let Ok(url) = env::var(OLLAMA_URL_ENV) {
      self.ollama.base_url = url;
    }
    if let Ok(model) = env::var(CHAT_MODEL_ENV) {
      self.ollama.chat_model = model;
    }
    if let Ok(backend) = env::var(EMBEDDING_BACKEND_ENV) {
      self.embedding.backend = backend.parse()?;
    }
    Ok(())
  }

  pub fn validate(&self) -> Result<()> {
    if self.retrieval.top_k == 0 {
      return Err(WoofwiseError::config("retrieval.top_k must be a positive integer"));
    }
    if self.embedding.dimension == 0 {
      return Err(WoofwiseError::config("embedding.dimension must be a positive integer"));
    }

    let url = Url::parse(&self.ollama.base_url)
      .map_err(|e| WoofwiseError::config(format!("invalid ollama.base_url: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(WoofwiseError::config("ollama.base_url must use http or https"));
    }

    Ok(())
  }
}

fn config_file_path(explicit: Option<&Path>) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return Some(path.to_path_buf());
  }
  if let Ok(path) = env::var(CONFIG_ENV) {
    return Some(PathBuf::from(path));
  }

  dirs::config_dir().map(|dir| dir.join("woofwise").join("config.yaml")).filter(|p| p.exists())
}
