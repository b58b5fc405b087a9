use anyhow::Result;
use colored::*;
use std::io::{BufRead, Write};

use crate::assistant::{Answer, Assistant};
use crate::breed::BreedTable;
use crate::config::WoofwiseConfig;
use crate::embedding;
use crate::retriever::BreedRetriever;
use crate::selector::PipelineSelector;

/// Route and answer a single question
pub async fn ask(config: &WoofwiseConfig, question: &str) -> Result<()> {
  let assistant = Assistant::load(config).await?;
  let answer = assistant.answer(question).await;
  print_answer(&mut std::io::stdout(), &answer)?;
  Ok(())
}

/// Show which pipeline a question would go to, with both scores
pub async fn route(config: &WoofwiseConfig, question: &str) -> Result<()> {
  let model = embedding::create_model(&config.embedding).await?;
  let selector = PipelineSelector::new(model)?;
  let scores = selector.scores(question)?;

  println!("{}", scores.route().to_string().green().bold());
  println!("  nlu:       {:.4}", scores.nlu);
  println!("  analytics: {:.4}", scores.analytics);
  Ok(())
}

/// Print the breeds most similar to a question
pub async fn retrieve(config: &WoofwiseConfig, question: &str, top_k: usize) -> Result<()> {
  let model = embedding::create_model(&config.embedding).await?;
  let retriever = BreedRetriever::build(model, BreedTable::from_csv_path(&config.dataset.path))?;
  let results = retriever.retrieve(question, top_k)?;

  for result in results {
    println!(
      "{}. {} {}",
      result.rank,
      result.record.breed.cyan().bold(),
      format!("({:.4})", result.similarity).dimmed()
    );
    println!("   {}", result.description);
  }
  Ok(())
}

/// Print the description of every breed in the dataset
pub fn describe(config: &WoofwiseConfig) -> Result<()> {
  let table = BreedTable::from_csv_path(&config.dataset.path)?;
  for record in table.records() {
    println!("{}", record.describe());
  }
  Ok(())
}

/// Interactive question loop until `exit`, `quit` or end of input
pub async fn chat(config: &WoofwiseConfig) -> Result<()> {
  let assistant = Assistant::load(config).await?;
  let stdin = std::io::stdin();
  chat_loop(&assistant, stdin.lock(), std::io::stdout()).await
}

pub async fn chat_loop<R: BufRead, W: Write>(assistant: &Assistant, input: R, mut output: W) -> Result<()> {
  writeln!(output, "Ask me anything about dog breeds. Type 'exit' to quit.")?;
  prompt(&mut output)?;

  for line in input.lines() {
    let line = line?;
    let question = line.trim();
    if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
      break;
    }
    if !question.is_empty() {
      let answer = assistant.answer(question).await;
      print_answer(&mut output, &answer)?;
    }
    prompt(&mut output)?;
  }

  writeln!(output)?;
  Ok(())
}

fn prompt<W: Write>(output: &mut W) -> Result<()> {
  write!(output, "{} ", ">".bold())?;
  output.flush()?;
  Ok(())
}

fn print_answer<W: Write>(output: &mut W, answer: &Answer) -> Result<()> {
  match answer.route {
    Some(route) => writeln!(output, "{} {}", format!("[{route}]").blue(), answer.content)?,
    None => writeln!(output, "{}", answer.content.yellow())?,
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::completion::ScriptedCompletionService;
  use crate::embedding::LexicalEmbeddingModel;
  use std::sync::Arc;

  fn offline_assistant() -> Assistant {
    colored::control::set_override(false);
    let mut config = WoofwiseConfig::default();
    config.dataset.path = "/no/such/dog_breeds.csv".into();
    Assistant::from_parts(
      &config,
      Arc::new(LexicalEmbeddingModel::new(64)),
      Arc::new(ScriptedCompletionService::new()),
    )
    .unwrap()
  }

  #[tokio::test]
  async fn test_chat_loop_stops_at_exit() {
    let assistant = offline_assistant();
    let input = "Which breeds are easy to train?\n\nexit\nWhat about poodles?\n";
    let mut output = Vec::new();

    chat_loop(&assistant, input.as_bytes(), &mut output).await.unwrap();
    let text = String::from_utf8(output).unwrap();

    assert!(text.starts_with("Ask me anything about dog breeds."));
    assert_eq!(text.matches("Error: Dataset not loaded.").count(), 1);
    assert!(!text.contains("poodles"));
  }

  #[tokio::test]
  async fn test_chat_loop_ends_at_eof() {
    let assistant = offline_assistant();
    let mut output = Vec::new();

    chat_loop(&assistant, "Show me breeds sorted by lifespan".as_bytes(), &mut output).await.unwrap();
    let text = String::from_utf8(output).unwrap();

    assert!(text.contains("] Error: Dataset not loaded."));
    assert!(text.ends_with('\n'));
  }
}
