//! Side-by-side comparison of prompt engineering patterns.
//!
//! `promptlab` takes a user prompt and optional context, renders it through
//! one or more canned prompt patterns (basic, structured output, chain of
//! thought, few-shot, persona), sends each rendered prompt to an LLM, and
//! collects the answers per pattern so they can be compared.
//!
//! # Getting started
//!
//! ```ignore
//! use promptlab::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = api_key_from_env().map_err(|e| e.to_string())?;
//!     let client = AnthropicClient::new(api_key, ClientConfig::default())
//!         .map_err(|e| e.to_string())?;
//!
//!     let orchestrator = Orchestrator::new(Arc::new(client))
//!         .with_event_handler(LoggingHandler);
//!     orchestrator.set_prompt("Write a tagline");
//!     orchestrator.set_context("Acme Corp, a widget maker");
//!     orchestrator.toggle_selection(PatternId::Persona);
//!
//!     for (id, outcome) in orchestrator.run_selected().await {
//!         if let RunOutcome::Completed(result) = outcome {
//!             println!("== {id} ==\n{}", result.output);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`patterns`] | [`PatternId`](patterns::PatternId), descriptors, transforms, [`PatternRegistry`](patterns::PatternRegistry) |
//! | [`orchestrator`] | Selection, per-pattern runs, sequential batch runs, results |
//! | [`events`] | [`EventHandler`](events::EventHandler) hooks fired by the orchestrator |
//! | [`generator`] | The [`Generator`](generator::Generator) seam over the model API |
//! | [`config`] | [`ClientConfig`](config::ClientConfig) and API key lookup |
//! | [`error`] | Error enums |

pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod orchestrator;
pub mod patterns;
pub mod prelude;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use config::ClientConfig;
pub use error::{GenerateError, PatternError};
pub use generator::{GenerateFuture, Generator};

// ── Constants ──────────────────────────────────────────────────────

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Value sent in the `anthropic-version` header.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model for all pattern runs.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Shown when the service answered but returned no text.
pub const NO_RESPONSE: &str = "No response";

// ── Request types ──────────────────────────────────────────────────

/// Messages API request body.
#[derive(Serialize, Debug, Clone)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
}

impl MessagesRequest {
    /// A single-turn request: `system` plus one user message.
    pub fn single_turn(
        model: impl Into<String>,
        max_tokens: u32,
        system: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            system: system.into(),
            messages: vec![Message::user(prompt)],
        }
    }
}

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

/// Messages API response body. Only the fields the playground reads.
#[derive(Deserialize, Debug, Default)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Option<Vec<ContentBlock>>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// One content block. Non-text blocks (tool use, thinking) carry no `text`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub block_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            block_type: Some("text".into()),
            text: Some(text.into()),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Usage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: String,
}

/// Join the `text` of every block that has one, newline-separated.
///
/// Returns [`NO_RESPONSE`] when nothing was collected.
pub fn aggregate_text(blocks: &[ContentBlock]) -> String {
    let joined = blocks
        .iter()
        .filter_map(|b| b.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");
    if joined.is_empty() {
        NO_RESPONSE.to_string()
    } else {
        joined
    }
}

/// Extract a human-readable message from a non-success response body.
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    config: ClientConfig,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, config: ClientConfig) -> Result<Self, GenerateError> {
        let mut builder = reqwest::Client::builder().user_agent("promptlab/0.1");
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GenerateError::Client(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a Messages request and decode the response.
    pub async fn messages(&self, body: &MessagesRequest) -> Result<MessagesResponse, GenerateError> {
        debug!(
            "LLM request: model={}, max_tokens={}, system={} chars, prompt={} chars",
            body.model,
            body.max_tokens,
            body.system.len(),
            body.messages.iter().map(|m| m.content.len()).sum::<usize>(),
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(self.config.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(GenerateError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)?;

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: input={}, output={}",
                usage.input_tokens.unwrap_or(0),
                usage.output_tokens.unwrap_or(0),
            );
        }

        Ok(parsed)
    }
}

impl Generator for AnthropicClient {
    fn generate<'a>(&'a self, system: &'a str, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            let body = MessagesRequest::single_turn(
                &self.config.model,
                self.config.max_tokens,
                system,
                prompt,
            );
            let response = self.messages(&body).await?;
            Ok(aggregate_text(response.content.as_deref().unwrap_or_default()))
        })
    }
}
