//! Nearest-neighbour retrieval of breed records.
//!
//! A [`BreedIndex`] is built once from the dataset: one description and one
//! embedding per record, stored together so they can never fall out of
//! alignment. The index is immutable and shared by reference, so concurrent
//! queries need no locking.

use std::sync::Arc;

use crate::breed::{BreedRecord, BreedTable};
use crate::embedding::SharedEmbeddingModel;
use crate::error::{Result, WoofwiseError};
use crate::similarity;

pub const DEFAULT_TOP_K: usize = 3;

/// A breed record with its precomputed description and embedding
#[derive(Debug, Clone)]
pub struct IndexedBreed {
  pub record: BreedRecord,
  pub description: String,
  pub embedding: Vec<f32>,
}

/// Immutable embedding index over the breed dataset
#[derive(Debug)]
pub struct BreedIndex {
  entries: Vec<IndexedBreed>,
  dimension: usize,
  model_name: String,
}

impl BreedIndex {
  /// Describe and embed every record in one batch
  pub fn build(table: &BreedTable, model: &SharedEmbeddingModel) -> Result<Self> {
    let descriptions = table.descriptions();
    let embeddings =
      model.compute_embeddings(&descriptions).map_err(WoofwiseError::Embedding)?;

    if embeddings.len() != descriptions.len() {
      return Err(WoofwiseError::Embedding(anyhow::anyhow!(
        "expected {} breed embeddings, provider returned {}",
        descriptions.len(),
        embeddings.len()
      )));
    }

    let dimension = embeddings.first().map(Vec::len).unwrap_or_else(|| model.dimension());
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
      return Err(WoofwiseError::DimensionMismatch { expected: dimension, actual: bad.len() });
    }

    let entries = table
      .records()
      .iter()
      .cloned()
      .zip(descriptions)
      .zip(embeddings)
      .map(|((record, description), embedding)| IndexedBreed { record, description, embedding })
      .collect();

    Ok(Self { entries, dimension, model_name: model.model_name().to_string() })
  }

  pub fn entries(&self) -> &[IndexedBreed] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn dimension(&self) -> usize {
    self.dimension
  }

  pub fn model_name(&self) -> &str {
    &self.model_name
  }
}

/// One retrieved breed, ranked by similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
  pub record: BreedRecord,
  pub description: String,
  /// Raw cosine similarity in [-1, 1]
  pub similarity: f32,
  /// 1-based position in the ranking
  pub rank: usize,
  /// Row of the record in the dataset
  pub index: usize,
}

#[derive(Debug, Clone)]
enum IndexState {
  Ready(Arc<BreedIndex>),
  Unavailable { reason: String },
}

/// Retrieves the breeds most relevant to a free-text query
#[derive(Clone)]
pub struct BreedRetriever {
  model: SharedEmbeddingModel,
  state: IndexState,
}

impl BreedRetriever {
  /// Build from a dataset load result.
  ///
  /// A failed load or a dataset without rows leaves the retriever in an
  /// unavailable state rather than failing; an embedding failure is fatal
  /// because nothing could be served.
  pub fn build(model: SharedEmbeddingModel, dataset: Result<BreedTable>) -> Result<Self> {
    match dataset {
      Ok(table) if table.is_empty() => {
        let e = WoofwiseError::dataset_unavailable("dataset has no rows");
        bentley::warn!("{e}");
        Ok(Self::unavailable(model, e.to_string()))
      }
      Ok(table) => {
        let index = BreedIndex::build(&table, &model)?;
        bentley::success!("indexed {} breed descriptions ({} dimensions)", index.len(), index.dimension());
        Ok(Self::with_index(model, Arc::new(index)))
      }
      Err(e) if e.is_unavailable() => {
        bentley::warn!("{e}");
        Ok(Self::unavailable(model, e.to_string()))
      }
      Err(e) => Err(e),
    }
  }

  pub fn with_index(model: SharedEmbeddingModel, index: Arc<BreedIndex>) -> Self {
    Self { model, state: IndexState::Ready(index) }
  }

  pub fn unavailable(model: SharedEmbeddingModel, reason: impl Into<String>) -> Self {
    Self { model, state: IndexState::Unavailable { reason: reason.into() } }
  }

  pub fn is_available(&self) -> bool {
    matches!(self.state, IndexState::Ready(_))
  }

  pub fn index(&self) -> Option<&BreedIndex> {
    match &self.state {
      IndexState::Ready(index) => Some(index),
      IndexState::Unavailable { .. } => None,
    }
  }

  fn ready_index(&self) -> Result<&BreedIndex> {
    match &self.state {
      IndexState::Ready(index) => Ok(index),
      IndexState::Unavailable { reason } => Err(WoofwiseError::dataset_unavailable(reason.clone())),
    }
  }

  /// The `top_k` breeds most similar to `query`, best first. `top_k` larger
  /// than the dataset returns every breed.
  pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
    let index = self.ready_index()?;

    if top_k == 0 {
      return Err(WoofwiseError::invalid_input("top_k must be a positive integer"));
    }
    if query.trim().is_empty() {
      return Err(WoofwiseError::invalid_input("query must not be empty"));
    }

    let query_embedding = self.model.embed(query).map_err(WoofwiseError::Embedding)?;
    if query_embedding.len() != index.dimension() {
      return Err(WoofwiseError::DimensionMismatch {
        expected: index.dimension(),
        actual: query_embedding.len(),
      });
    }

    let candidates =
      index.entries().iter().enumerate().map(|(i, entry)| (i, entry.embedding.as_slice()));
    let ranked = similarity::top_k(&query_embedding, candidates, top_k);

    bentley::verbose!("retrieved {} of {} breeds for query", ranked.len(), index.len());

    Ok(
      ranked
        .into_iter()
        .enumerate()
        .map(|(position, hit)| {
          let entry = &index.entries()[hit.key];
          RetrievalResult {
            record: entry.record.clone(),
            description: entry.description.clone(),
            similarity: hit.score,
            rank: position + 1,
            index: hit.key,
          }
        })
        .collect(),
    )
  }
}
