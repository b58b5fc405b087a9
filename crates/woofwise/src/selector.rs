//! Query routing between the retrieval (NLU) and analytics pipelines.
//!
//! A query is embedded and compared against two fixed sets of example
//! questions; it goes to whichever set it is closer to on average. Exact
//! ties go to analytics because the NLU side must win strictly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::embedding::SharedEmbeddingModel;
use crate::error::{Result, WoofwiseError};
use crate::similarity;

/// The pipeline a query is handled by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
  Nlu,
  Analytics,
}

impl Route {
  pub fn as_str(self) -> &'static str {
    match self {
      Route::Nlu => "nlu",
      Route::Analytics => "analytics",
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A named, fixed list of example queries for one route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleSet {
  pub name: String,
  pub route: Route,
  pub texts: Vec<String>,
}

impl ExampleSet {
  pub fn new<S: Into<String>>(name: impl Into<String>, route: Route, texts: impl IntoIterator<Item = S>) -> Self {
    Self { name: name.into(), route, texts: texts.into_iter().map(Into::into).collect() }
  }

  /// Descriptive questions best answered from breed descriptions
  pub fn nlu() -> Self {
    Self::new(
      "nlu-examples",
      Route::Nlu,
      [
        "What breeds are good with children?",
        "I'm looking for a dog that's good in apartments",
        "Which breeds are easy to train?",
        "Tell me about breeds that don't shed much",
        "What's the best breed for first-time owners?",
      ],
    )
  }

  /// Sorting, ranking and comparison questions over the table
  pub fn analytics() -> Self {
    Self::new(
      "analytics-examples",
      Route::Analytics,
      [
        "What are the top 5 heaviest breeds?",
        "Show me breeds sorted by lifespan",
        "Which breeds have the highest energy levels?",
        "List breeds by popularity",
        "Compare the sizes of different breeds",
      ],
    )
  }
}

/// Mean similarity of a query to each example set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteScores {
  pub nlu: f32,
  pub analytics: f32,
}

impl RouteScores {
  pub fn route(&self) -> Route {
    if self.nlu > self.analytics {
      Route::Nlu
    } else {
      Route::Analytics
    }
  }
}

/// Example embeddings cached for the selector's lifetime
#[derive(Debug)]
struct EmbeddedExamples {
  set: ExampleSet,
  embeddings: Vec<Vec<f32>>,
}

impl EmbeddedExamples {
  fn build(set: ExampleSet, model: &SharedEmbeddingModel) -> Result<Self> {
    if set.texts.is_empty() {
      return Err(WoofwiseError::invalid_input(format!("example set '{}' is empty", set.name)));
    }

    let embeddings = model.compute_embeddings(&set.texts).map_err(WoofwiseError::Embedding)?;
    if embeddings.len() != set.texts.len() {
      return Err(WoofwiseError::Embedding(anyhow::anyhow!(
        "expected {} embeddings for '{}', provider returned {}",
        set.texts.len(),
        set.name,
        embeddings.len()
      )));
    }

    Ok(Self { set, embeddings })
  }
}

/// Nearest-centroid style router over two prototype example sets
pub struct PipelineSelector {
  model: SharedEmbeddingModel,
  nlu: EmbeddedExamples,
  analytics: EmbeddedExamples,
  dimension: usize,
}

impl PipelineSelector {
  /// Selector with the built-in example sets
  pub fn new(model: SharedEmbeddingModel) -> Result<Self> {
    Self::with_examples(model, ExampleSet::nlu(), ExampleSet::analytics())
  }

  /// Embeds both example sets once; failure here is fatal.
  pub fn with_examples(
    model: SharedEmbeddingModel,
    nlu: ExampleSet,
    analytics: ExampleSet,
  ) -> Result<Self> {
    let nlu = EmbeddedExamples::build(nlu, &model)?;
    let analytics = EmbeddedExamples::build(analytics, &model)?;

    let dimension = nlu.embeddings[0].len();
    if let Some(bad) =
      nlu.embeddings.iter().chain(&analytics.embeddings).find(|e| e.len() != dimension)
    {
      return Err(WoofwiseError::DimensionMismatch { expected: dimension, actual: bad.len() });
    }

    bentley::verbose!(
      "cached {} nlu and {} analytics example embeddings",
      nlu.embeddings.len(),
      analytics.embeddings.len()
    );

    Ok(Self { model, nlu, analytics, dimension })
  }

  /// Mean similarity of `query` to each example set
  pub fn scores(&self, query: &str) -> Result<RouteScores> {
    if query.trim().is_empty() {
      return Err(WoofwiseError::invalid_input("query must not be empty"));
    }

    let query_embedding = self.model.embed(query).map_err(WoofwiseError::Embedding)?;
    if query_embedding.len() != self.dimension {
      return Err(WoofwiseError::DimensionMismatch {
        expected: self.dimension,
        actual: query_embedding.len(),
      });
    }

    Ok(RouteScores {
      nlu: similarity::mean_similarity(&query_embedding, &self.nlu.embeddings),
      analytics: similarity::mean_similarity(&query_embedding, &self.analytics.embeddings),
    })
  }

  /// Pick the pipeline for `query`
  pub fn select(&self, query: &str) -> Result<Route> {
    let scores = self.scores(query)?;
    let route = scores.route();
    bentley::verbose!(
      "routed to {route} (nlu {:.4}, analytics {:.4})",
      scores.nlu,
      scores.analytics
    );
    Ok(route)
  }

  pub fn nlu_examples(&self) -> &ExampleSet {
    &self.nlu.set
  }

  pub fn analytics_examples(&self) -> &ExampleSet {
    &self.analytics.set
  }
}
