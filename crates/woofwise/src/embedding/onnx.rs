use anyhow::{anyhow, Result};
use hf_hub::api::tokio::Api;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::PathBuf;
use std::sync::Mutex;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

use super::EmbeddingModel;
use crate::similarity;

const TOKENIZER_FILE: &str = "tokenizer.json";
const MODEL_FILE: &str = "onnx/model.onnx";
const MAX_SEQUENCE_LENGTH: usize = 256;
const MINILM_DIMENSION: usize = 384;

/// Sentence-transformer embeddings run locally through ONNX Runtime.
///
/// `ort` sessions need exclusive access to run, so the session sits behind a
/// mutex and the model can be shared across threads by reference.
pub struct OnnxEmbeddingModel {
  session: Mutex<Session>,
  tokenizer: Tokenizer,
  model_name: String,
  dimension: usize,
}

struct ModelFiles {
  tokenizer_file: PathBuf,
  model_path: PathBuf,
}

// Model initialization
#[cfg(not(tarpaulin_include))]
impl OnnxEmbeddingModel {
  /// Download (or reuse the cached copy of) a sentence-transformer from HuggingFace
  pub async fn load(model_name: &str) -> Result<Self> {
    bentley::info!("loading embedding model {model_name}...");

    let files = Self::download_model(model_name).await?;
    tracing::debug!(tokenizer = %files.tokenizer_file.display(), model = %files.model_path.display(), "model files ready");
    let tokenizer = Self::load_tokenizer(files.tokenizer_file)?;
    let session = Self::load_session(files.model_path)?;

    Ok(Self {
      session: Mutex::new(session),
      tokenizer,
      model_name: model_name.to_string(),
      dimension: MINILM_DIMENSION,
    })
  }

  async fn download_model(model_name: &str) -> Result<ModelFiles> {
    let api = Api::new().map_err(|e| anyhow!("HF API initialization failed: {}", e))?;
    let repo = api.model(model_name.to_string());

    let tokenizer_file = repo
      .get(TOKENIZER_FILE)
      .await
      .map_err(|e| anyhow!("Failed to download tokenizer: {}", e))?;
    let model_path =
      repo.get(MODEL_FILE).await.map_err(|e| anyhow!("Failed to download ONNX model: {}", e))?;

    Ok(ModelFiles { tokenizer_file, model_path })
  }

  fn load_tokenizer(path: PathBuf) -> Result<Tokenizer> {
    let mut tokenizer =
      Tokenizer::from_file(path).map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

    tokenizer.with_padding(Some(PaddingParams::default()));
    tokenizer
      .with_truncation(Some(TruncationParams {
        max_length: MAX_SEQUENCE_LENGTH,
        ..TruncationParams::default()
      }))
      .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

    Ok(tokenizer)
  }

  fn load_session(model_path: PathBuf) -> Result<Session> {
    Session::builder()
      .map_err(|e| anyhow!("Failed to create session builder: {}", e))?
      .with_optimization_level(GraphOptimizationLevel::Level1)
      .map_err(|e| anyhow!("Failed to set optimization level: {}", e))?
      .with_intra_threads(1)
      .map_err(|e| anyhow!("Failed to set thread count: {}", e))?
      .commit_from_file(model_path)
      .map_err(|e| anyhow!("Failed to load model: {}", e))
  }
}

#[cfg(not(tarpaulin_include))]
impl EmbeddingModel for OnnxEmbeddingModel {
  fn compute_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
      return Ok(vec![]);
    }

    let encodings = self
      .tokenizer
      .encode_batch(texts.to_vec(), true)
      .map_err(|e| anyhow!("Failed to encode texts: {}", e))?;

    // Padding makes every encoding the same length
    let batch = encodings.len();
    let length = encodings[0].len();

    let ids: Vec<i64> =
      encodings.iter().flat_map(|e| e.get_ids().iter().map(|&id| id as i64)).collect();
    let mask: Vec<i64> = encodings
      .iter()
      .flat_map(|e| e.get_attention_mask().iter().map(|&m| m as i64))
      .collect();
    let type_ids: Vec<i64> =
      encodings.iter().flat_map(|e| e.get_type_ids().iter().map(|&t| t as i64)).collect();

    let ids_tensor = Tensor::from_array(([batch, length], ids.into_boxed_slice()))?;
    let mask_tensor = Tensor::from_array(([batch, length], mask.clone().into_boxed_slice()))?;
    let type_tensor = Tensor::from_array(([batch, length], type_ids.into_boxed_slice()))?;

    let mut session =
      self.session.lock().map_err(|_| anyhow!("Embedding session lock poisoned"))?;
    let outputs = session.run(ort::inputs![
      "input_ids" => ids_tensor,
      "attention_mask" => mask_tensor,
      "token_type_ids" => type_tensor
    ])?;

    let output = outputs
      .get("last_hidden_state")
      .ok_or_else(|| anyhow!("No output found from model - expected 'last_hidden_state'"))?;
    let (shape, data) = output.try_extract_tensor::<f32>()?;

    let pooled = mean_pool(shape.as_ref(), data, &mask)?;
    Ok(pooled.into_iter().map(similarity::normalize).collect())
  }

  fn dimension(&self) -> usize {
    self.dimension
  }

  fn model_name(&self) -> &str {
    &self.model_name
  }
}

/// Attention-mask weighted mean over the token axis of a
/// `[batch, sequence, hidden]` tensor.
pub(crate) fn mean_pool(shape: &[i64], data: &[f32], mask: &[i64]) -> Result<Vec<Vec<f32>>> {
  if shape.len() != 3 {
    return Err(anyhow!("Expected a [batch, sequence, hidden] tensor, got shape {:?}", shape));
  }

  let (batch, seq_length, hidden_size) = (shape[0] as usize, shape[1] as usize, shape[2] as usize);
  if data.len() != batch * seq_length * hidden_size || mask.len() != batch * seq_length {
    return Err(anyhow!("Tensor data does not match shape {:?}", shape));
  }

  let mut pooled = Vec::with_capacity(batch);
  for b in 0..batch {
    let mut embedding = vec![0.0f32; hidden_size];
    let mut tokens = 0.0f32;

    for t in 0..seq_length {
      if mask[b * seq_length + t] == 0 {
        continue;
      }
      tokens += 1.0;
      let start = (b * seq_length + t) * hidden_size;
      for (i, &value) in data[start..start + hidden_size].iter().enumerate() {
        embedding[i] += value;
      }
    }

    if tokens > 0.0 {
      for value in embedding.iter_mut() {
        *value /= tokens;
      }
    }
    pooled.push(embedding);
  }

  Ok(pooled)
}
