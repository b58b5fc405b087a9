//! Routes a question to a pipeline and returns its answer.

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;

use crate::breed::BreedTable;
use crate::completion::{OllamaClient, SharedCompletionService};
use crate::config::WoofwiseConfig;
use crate::embedding::{self, SharedEmbeddingModel};
use crate::error::{Result, WoofwiseError};
use crate::pipelines::{AnalyticsPipeline, NluPipeline};
use crate::retriever::BreedRetriever;
use crate::selector::{PipelineSelector, Route};

/// A routed answer. `route` is `None` when the query never reached a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
  pub route: Option<Route>,
  pub content: String,
}

impl Answer {
  fn unrouted(content: impl Into<String>) -> Self {
    Self { route: None, content: content.into() }
  }
}

pub struct Assistant {
  selector: PipelineSelector,
  nlu: NluPipeline,
  analytics: AnalyticsPipeline,
}

impl Assistant {
  /// Load everything the configuration names: embedding model, dataset and
  /// completion client.
  pub async fn load(config: &WoofwiseConfig) -> Result<Self> {
    config.validate()?;
    let model = embedding::create_model(&config.embedding).await.map_err(WoofwiseError::Embedding)?;
    let completion: SharedCompletionService = Arc::new(OllamaClient::new(&config.ollama)?);
    Self::from_parts(config, model, completion)
  }

  /// Build from an already-loaded model and completion service.
  ///
  /// A missing dataset leaves both pipelines answering with an error message;
  /// failing to embed the examples or the dataset is returned as an error.
  pub fn from_parts(
    config: &WoofwiseConfig,
    model: SharedEmbeddingModel,
    completion: SharedCompletionService,
  ) -> Result<Self> {
    let dataset = BreedTable::from_csv_path(&config.dataset.path);
    if let Ok(table) = &dataset {
      bentley::info!("loaded {} breeds from {}", table.len(), config.dataset.path.display());
    }
    let table = dataset.as_ref().ok().map(|table| Arc::new(table.clone()));

    let selector = PipelineSelector::new(model.clone())?;
    let retriever = BreedRetriever::build(model, dataset)?;

    Ok(Self {
      selector,
      nlu: NluPipeline::new(retriever, completion.clone()).with_top_k(config.retrieval.top_k),
      analytics: AnalyticsPipeline::new(table, completion),
    })
  }

  pub fn selector(&self) -> &PipelineSelector {
    &self.selector
  }

  pub fn retriever(&self) -> &BreedRetriever {
    self.nlu.retriever()
  }

  /// Route and answer one question. Never fails; problems become the answer text.
  pub async fn answer(&self, query: &str) -> Answer {
    if query.trim().is_empty() {
      return Answer::unrouted("Please ask a question about dog breeds.");
    }

    let route = match self.selector.select(query) {
      Ok(route) => route,
      Err(e) => {
        bentley::error!("could not route query: {e}");
        return Answer::unrouted(format!("Error processing query: {e}"));
      }
    };

    let content = match route {
      Route::Nlu => self.nlu.process(query).await,
      Route::Analytics => self.analytics.process(query).await,
    };
    Answer { route: Some(route), content }
  }
}

type AssistantFactory = Box<dyn Fn() -> Result<Assistant> + Send + Sync>;

/// Lazily constructed assistant shared between callers.
///
/// Concurrent first callers block on a single construction. A failed
/// construction is returned to its caller and the next call tries again.
pub struct SharedAssistant {
  cell: OnceCell<Assistant>,
  factory: AssistantFactory,
}

impl SharedAssistant {
  pub fn new(factory: impl Fn() -> Result<Assistant> + Send + Sync + 'static) -> Self {
    Self { cell: OnceCell::new(), factory: Box::new(factory) }
  }

  pub fn from_parts(
    config: WoofwiseConfig,
    model: SharedEmbeddingModel,
    completion: SharedCompletionService,
  ) -> Self {
    Self::new(move || Assistant::from_parts(&config, model.clone(), completion.clone()))
  }

  pub fn get(&self) -> Result<&Assistant> {
    self.cell.get_or_try_init(|| (self.factory)())
  }

  pub fn is_initialized(&self) -> bool {
    self.cell.get().is_some()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::breed::tests::SAMPLE_CSV;
  use crate::completion::ScriptedCompletionService;
  use crate::embedding::MockEmbeddingModel;
  use crate::selector::ExampleSet;
  use std::io::Write;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tempfile::NamedTempFile;

  /// Example questions point along x (nlu) or y (analytics); breed
  /// descriptions and unknown queries get a fixed z-ish vector.
  fn routing_model() -> MockEmbeddingModel {
    let mut model = MockEmbeddingModel::new().with_embeddings(vec![vec![0.1, 0.1, 1.0]]);
    for text in ExampleSet::nlu().texts {
      model = model.with_vector(text, vec![1.0, 0.0, 0.0]);
    }
    for text in ExampleSet::analytics().texts {
      model = model.with_vector(text, vec![0.0, 1.0, 0.0]);
    }
    model
      .with_vector("Which dogs are gentle with kids?", vec![0.9, 0.1, 0.0])
      .with_vector("How many breeds are large?", vec![0.1, 0.9, 0.0])
  }

  fn dataset_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SAMPLE_CSV.as_bytes()).unwrap();
    file
  }

  fn config_for(path: &std::path::Path) -> WoofwiseConfig {
    let mut config = WoofwiseConfig::default();
    config.dataset.path = path.to_path_buf();
    config
  }

  #[tokio::test]
  async fn test_descriptive_question_goes_to_nlu() {
    let file = dataset_file();
    let completion = Arc::new(ScriptedCompletionService::new().with_reply("Labradors are gentle."));
    let assistant =
      Assistant::from_parts(&config_for(file.path()), Arc::new(routing_model()), completion.clone())
        .unwrap();

    let answer = assistant.answer("Which dogs are gentle with kids?").await;
    assert_eq!(answer.route, Some(Route::Nlu));
    assert_eq!(answer.content, "Labradors are gentle.");
    assert!(completion.requests()[0].user.contains("User Question: Which dogs are gentle with kids?"));
  }

  #[tokio::test]
  async fn test_analytical_question_goes_to_analytics() {
    let file = dataset_file();
    let completion = Arc::new(
      ScriptedCompletionService::new()
        .with_reply(r#"{"steps":[{"op":"filter","column":"size","value":"Large"},{"op":"count"}]}"#)
        .with_reply("All three breeds are large."),
    );
    let assistant =
      Assistant::from_parts(&config_for(file.path()), Arc::new(routing_model()), completion.clone())
        .unwrap();

    let answer = assistant.answer("How many breeds are large?").await;
    assert_eq!(answer.route, Some(Route::Analytics));
    assert_eq!(answer.content, "All three breeds are large.");
    assert!(completion.requests()[1].user.contains("count: 3"));
  }

  #[tokio::test]
  async fn test_missing_dataset_answers_with_message() {
    let config = config_for(std::path::Path::new("/no/such/dog_breeds.csv"));
    let completion = Arc::new(ScriptedCompletionService::new());
    let assistant = Assistant::from_parts(&config, Arc::new(routing_model()), completion).unwrap();

    assert!(!assistant.retriever().is_available());
    let answer = assistant.answer("Which dogs are gentle with kids?").await;
    assert_eq!(answer.content, crate::pipelines::DATASET_NOT_LOADED);
  }

  #[tokio::test]
  async fn test_header_only_dataset_answers_with_message() {
    let mut file = NamedTempFile::new().unwrap();
    let header = SAMPLE_CSV.lines().next().unwrap();
    writeln!(file, "{header}").unwrap();
    let completion = Arc::new(ScriptedCompletionService::new());
    let assistant =
      Assistant::from_parts(&config_for(file.path()), Arc::new(routing_model()), completion.clone())
        .unwrap();

    assert!(!assistant.retriever().is_available());
    for query in ["Which dogs are gentle with kids?", "How many breeds are large?"] {
      let answer = assistant.answer(query).await;
      assert_eq!(answer.content, crate::pipelines::DATASET_NOT_LOADED);
    }
    assert_eq!(completion.call_count(), 0);
  }

  #[tokio::test]
  async fn test_routing_failure_does_not_crash() {
    let file = dataset_file();
    let model = routing_model().with_failure_on("boom");
    let assistant = Assistant::from_parts(
      &config_for(file.path()),
      Arc::new(model),
      Arc::new(ScriptedCompletionService::new()),
    )
    .unwrap();

    let answer = assistant.answer("boom").await;
    assert_eq!(answer.route, None);
    assert!(answer.content.starts_with("Error processing query: "));

    let empty = assistant.answer("  ").await;
    assert_eq!(empty.route, None);
  }

  #[test]
  fn test_shared_assistant_initializes_once() {
    let file = dataset_file();
    let config = config_for(file.path());
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let model: SharedEmbeddingModel = Arc::new(routing_model());
    let completion: SharedCompletionService = Arc::new(ScriptedCompletionService::new());

    let shared = Arc::new(SharedAssistant::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      Assistant::from_parts(&config, model.clone(), completion.clone())
    }));

    let handles: Vec<_> = (0..8)
      .map(|_| {
        let shared = shared.clone();
        std::thread::spawn(move || shared.get().is_ok())
      })
      .collect();
    for handle in handles {
      assert!(handle.join().unwrap());
    }

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(shared.is_initialized());
  }

  #[test]
  fn test_shared_assistant_retries_after_failure() {
    let file = dataset_file();
    let config = config_for(file.path());
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let completion: SharedCompletionService = Arc::new(ScriptedCompletionService::new());

    let shared = SharedAssistant::new(move || {
      let attempt = counter.fetch_add(1, Ordering::SeqCst);
      let model = if attempt == 0 {
        routing_model().with_failure_on("List breeds by popularity")
      } else {
        routing_model()
      };
      Assistant::from_parts(&config, Arc::new(model), completion.clone())
    });

    assert!(shared.get().is_err());
    assert!(!shared.is_initialized());
    assert!(shared.get().is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
  }
}
