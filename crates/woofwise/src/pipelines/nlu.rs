//! Retrieval-augmented answers for descriptive questions.

use crate::completion::{CompletionRequest, SharedCompletionService};
use crate::error::Result;
use crate::retriever::{BreedRetriever, RetrievalResult, DEFAULT_TOP_K};

use super::DATASET_NOT_LOADED;

const SYSTEM_PROMPT: &str =
  "You are a helpful dog breed expert. Provide clear, concise, and accurate information about dog breeds.";

pub struct NluPipeline {
  retriever: BreedRetriever,
  completion: SharedCompletionService,
  top_k: usize,
}

impl NluPipeline {
  pub fn new(retriever: BreedRetriever, completion: SharedCompletionService) -> Self {
    Self { retriever, completion, top_k: DEFAULT_TOP_K }
  }

  pub fn with_top_k(mut self, top_k: usize) -> Self {
    self.top_k = top_k;
    self
  }

  pub fn retriever(&self) -> &BreedRetriever {
    &self.retriever
  }

  /// Answer `query` from the most relevant breed descriptions
  pub async fn process(&self, query: &str) -> String {
    if !self.retriever.is_available() {
      return DATASET_NOT_LOADED.to_string();
    }

    match self.answer(query).await {
      Ok(answer) => answer,
      Err(e) => {
        bentley::verbose!("nlu pipeline failed: {e}");
        format!("Error processing query: {e}")
      }
    }
  }

  async fn answer(&self, query: &str) -> Result<String> {
    let hits = self.retriever.retrieve(query, self.top_k)?;
    let request = CompletionRequest::new(SYSTEM_PROMPT, build_prompt(query, &hits));
    let response = self.completion.complete(request).await?;
    Ok(response.content)
  }
}

pub(crate) fn build_context(hits: &[RetrievalResult]) -> String {
  let mut context = String::from("Based on the following dog breed information:\n\n");
  for hit in hits {
    context.push_str("- ");
    context.push_str(&hit.description);
    context.push('\n');
  }
  context
}

pub(crate) fn build_prompt(query: &str, hits: &[RetrievalResult]) -> String {
  format!(
    "{}\n\nUser Question: {query}\n\nPlease provide a helpful and informative answer based on the above \
     information. Focus on directly addressing the user's question while incorporating specific details \
     about the relevant breeds.",
    build_context(hits)
  )
}
