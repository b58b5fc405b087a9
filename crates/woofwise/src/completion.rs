//! Text-completion service boundary used to phrase answers.
//!
//! The pipelines only see [`CompletionService`]; [`OllamaClient`] talks to a
//! local Ollama server and [`ScriptedCompletionService`] replays scripted replies.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::OllamaConfig;
use crate::error::{Result, WoofwiseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
  pub system: String,
  pub user: String,
}

impl CompletionRequest {
  pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
    Self { system: system.into(), user: user.into() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
  pub content: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionService: Send + Sync {
  async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

pub type SharedCompletionService = Arc<dyn CompletionService>;

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
  stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
  message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
  content: String,
}

/// Client for the Ollama `/api/chat` endpoint
pub struct OllamaClient {
  client: Client,
  base_url: String,
  model: String,
}

impl OllamaClient {
  pub fn new(config: &OllamaConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      model: config.chat_model.clone(),
    })
  }

  pub fn model(&self) -> &str {
    &self.model
  }
}

#[async_trait]
impl CompletionService for OllamaClient {
  async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
    let body = ChatRequest {
      model: &self.model,
      messages: vec![
        ChatMessage { role: "system", content: &request.system },
        ChatMessage { role: "user", content: &request.user },
      ],
      stream: false,
    };

    let url = format!("{}/api/chat", self.base_url);
    tracing::debug!(model = %self.model, %url, prompt_chars = request.user.len(), "sending chat request");
    let response = self.client.post(&url).json(&body).send().await?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(WoofwiseError::completion(format!("Ollama returned {status}: {error_text}")));
    }

    let chat: ChatResponse = response.json().await?;
    tracing::debug!(reply_chars = chat.message.content.len(), "chat reply received");
    Ok(CompletionResponse { content: chat.message.content })
  }
}

/// Scripted completion service for tests and offline runs.
///
/// Replies are returned in order; once the script runs out the fallback
/// reply is used. Every request is recorded.
pub struct ScriptedCompletionService {
  replies: Mutex<VecDeque<Result<String>>>,
  fallback: String,
  requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for ScriptedCompletionService {
  fn default() -> Self {
    Self::new()
  }
}

impl ScriptedCompletionService {
  pub fn new() -> Self {
    Self {
      replies: Mutex::new(VecDeque::new()),
      fallback: "This is a mock response from the LLM.".to_string(),
      requests: Mutex::new(Vec::new()),
    }
  }

  pub fn with_reply(self, reply: impl Into<String>) -> Self {
    self.push(Ok(reply.into()));
    self
  }

  pub fn with_failure(self, message: impl Into<String>) -> Self {
    self.push(Err(WoofwiseError::completion(message)));
    self
  }

  fn push(&self, reply: Result<String>) {
    if let Ok(mut replies) = self.replies.lock() {
      replies.push_back(reply);
    }
  }

  /// Requests received so far, oldest first
  pub fn requests(&self) -> Vec<CompletionRequest> {
    self.requests.lock().map(|r| r.clone()).unwrap_or_default()
  }

  pub fn call_count(&self) -> usize {
    self.requests.lock().map(|r| r.len()).unwrap_or(0)
  }
}

#[async_trait]
impl CompletionService for ScriptedCompletionService {
  async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
    if let Ok(mut requests) = self.requests.lock() {
      requests.push(request);
    }

    let next = self.replies.lock().ok().and_then(|mut replies| replies.pop_front());
    match next {
      Some(Ok(content)) => Ok(CompletionResponse { content }),
      Some(Err(e)) => Err(e),
      None => Ok(CompletionResponse { content: self.fallback.clone() }),
    }
  }
}
