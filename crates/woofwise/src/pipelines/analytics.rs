//! Sorting, ranking and comparison questions answered from the table.
//!
//! The model is asked for a [`QueryPlan`], the plan is interpreted over the
//! breed table, and a second call explains the result in plain language.

use std::sync::Arc;

use crate::breed::{BreedColumn, BreedTable};
use crate::completion::{CompletionRequest, SharedCompletionService};
use crate::error::Result;
use crate::query::{QueryOutput, QueryPlan};

use super::DATASET_NOT_LOADED;

const PLAN_SYSTEM_PROMPT: &str =
  "You are a data analysis expert. Generate only a JSON query plan, no explanations.";
const EXPLAIN_SYSTEM_PROMPT: &str =
  "You are a helpful dog breed expert. Explain data analysis results in clear, natural language.";

const PLAN_FORMAT: &str = r#"Reply with a JSON object {"steps": [...]} where each step is one of:
  {"op": "filter", "column": <column>, "match": "eq" | "ne" | "contains", "value": <text>}
  {"op": "sort", "column": <column>, "descending": true | false}
  {"op": "limit", "n": <number>}
  {"op": "select", "columns": [<column>, ...]}
  {"op": "count_by", "column": <column>}
  {"op": "count"}
Steps run in order. count_by and count may only appear as the last step."#;

pub struct AnalyticsPipeline {
  table: Option<Arc<BreedTable>>,
  completion: SharedCompletionService,
}

impl AnalyticsPipeline {
  /// A missing or row-less table leaves the pipeline answering with the
  /// dataset-not-loaded message.
  pub fn new(table: Option<Arc<BreedTable>>, completion: SharedCompletionService) -> Self {
    Self { table: table.filter(|table| !table.is_empty()), completion }
  }

  pub async fn process(&self, query: &str) -> String {
    let Some(table) = &self.table else {
      return DATASET_NOT_LOADED.to_string();
    };

    let output = match self.plan_and_run(table, query).await {
      Ok(output) => output,
      Err(e) => {
        bentley::verbose!("analytics plan failed: {e}");
        return format!("Error processing analytics query: {e}");
      }
    };

    match self.explain(&output, query).await {
      Ok(answer) => answer,
      Err(e) => format!("Error formatting results: {e}"),
    }
  }

  async fn plan_and_run(&self, table: &BreedTable, query: &str) -> Result<QueryOutput> {
    let request = CompletionRequest::new(PLAN_SYSTEM_PROMPT, plan_prompt(table, query));
    let reply = self.completion.complete(request).await?;
    let plan = QueryPlan::parse(&reply.content)?;
    bentley::verbose!("executing query plan with {} steps", plan.steps.len());
    plan.execute(table)
  }

  async fn explain(&self, output: &QueryOutput, query: &str) -> Result<String> {
    let prompt = format!(
      "Given these analysis results:\n{output}\n\nAnd the original question:\n{query}\n\n\
       Please provide a clear, natural language response that explains the findings.\n\
       Focus on the key insights and present the information in a way that's easy to understand."
    );
    let response = self.completion.complete(CompletionRequest::new(EXPLAIN_SYSTEM_PROMPT, prompt)).await?;
    Ok(response.content)
  }
}

fn plan_prompt(table: &BreedTable, query: &str) -> String {
  let columns: Vec<&str> = BreedColumn::ALL.iter().map(|c| c.name()).collect();
  format!(
    "A table of dog breeds has these columns:\n{}\n\n{PLAN_FORMAT}\n\n\
     The table has {} rows. Build a plan that answers this question: \"{query}\"",
    columns.join(", "),
    table.len()
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::breed::tests::sample_table;
  use crate::completion::{CompletionResponse, MockCompletionService, ScriptedCompletionService};
  use crate::error::WoofwiseError;
  use mockall::Sequence;

  fn pipeline(completion: SharedCompletionService) -> AnalyticsPipeline {
    AnalyticsPipeline::new(Some(Arc::new(sample_table())), completion)
  }

  #[tokio::test]
  async fn test_plan_is_executed_and_explained() {
    let completion = Arc::new(
      ScriptedCompletionService::new()
        .with_reply(
          r#"```json
{"steps":[{"op":"filter","column":"grooming","value":"high"},{"op":"select","columns":["breed"]}]}
```"#,
        )
        .with_reply("Two breeds need a lot of grooming."),
    );
    let answer = pipeline(completion.clone()).process("Which breeds need lots of grooming?").await;

    assert_eq!(answer, "Two breeds need a lot of grooming.");
    let requests = completion.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].system, PLAN_SYSTEM_PROMPT);
    assert!(requests[0].user.contains("life_expectancy"));
    assert!(requests[0].user.contains("\"Which breeds need lots of grooming?\""));
    assert_eq!(requests[1].system, EXPLAIN_SYSTEM_PROMPT);
    assert!(requests[1].user.contains("breed\nGerman Shepherd\nGolden Retriever\n"));
    assert!(requests[1].user.contains("Which breeds need lots of grooming?"));
  }

  #[tokio::test]
  async fn test_missing_dataset() {
    let completion = Arc::new(ScriptedCompletionService::new());
    let pipeline = AnalyticsPipeline::new(None, completion.clone());

    assert_eq!(pipeline.process("top 5 heaviest").await, DATASET_NOT_LOADED);
    assert_eq!(completion.call_count(), 0);
  }

  #[tokio::test]
  async fn test_empty_dataset_is_not_loaded() {
    let completion = Arc::new(ScriptedCompletionService::new());
    let pipeline = AnalyticsPipeline::new(Some(Arc::new(BreedTable::default())), completion.clone());

    assert_eq!(pipeline.process("top 5 heaviest").await, DATASET_NOT_LOADED);
    assert_eq!(completion.call_count(), 0);
  }

  #[tokio::test]
  async fn test_unparseable_plan_is_reported() {
    let completion =
      Arc::new(ScriptedCompletionService::new().with_reply("df.nlargest(5, 'weight')"));
    let answer = pipeline(completion.clone()).process("top 5 heaviest").await;

    assert!(answer.starts_with("Error processing analytics query: Invalid query plan:"));
    assert_eq!(completion.call_count(), 1);
  }

  #[tokio::test]
  async fn test_plan_request_failure_is_reported() {
    let completion = Arc::new(ScriptedCompletionService::new().with_failure("timeout"));
    let answer = pipeline(completion).process("top 5 heaviest").await;

    assert_eq!(answer, "Error processing analytics query: Completion service failure: timeout");
  }

  #[tokio::test]
  async fn test_explain_failure_is_reported() {
    let mut seq = Sequence::new();
    let mut completion = MockCompletionService::new();
    completion
      .expect_complete()
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(CompletionResponse { content: r#"{"steps":[{"op":"count"}]}"#.to_string() }));
    completion
      .expect_complete()
      .times(1)
      .in_sequence(&mut seq)
      .withf(|request| request.user.contains("count: 3"))
      .returning(|_| Err(WoofwiseError::completion("model unloaded")));

    let answer = pipeline(Arc::new(completion)).process("How many breeds are there?").await;
    assert_eq!(answer, "Error formatting results: Completion service failure: model unloaded");
  }
}
