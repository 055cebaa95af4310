//! Client configuration with defaults matching the demo deployment.
//!
//! [`ClientConfig`] carries everything [`AnthropicClient`](crate::AnthropicClient)
//! needs apart from the API key, which is read separately with
//! [`api_key_from_env`].

use std::time::Duration;

use crate::error::GenerateError;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Settings for the Messages API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API origin. Default: `"https://api.anthropic.com"`.
    pub base_url: String,
    /// Model identifier. Default: [`DEFAULT_MODEL`](crate::DEFAULT_MODEL).
    pub model: String,
    /// Maximum tokens per response. Default: `1000`.
    pub max_tokens: u32,
    /// Value of the `anthropic-version` header. Default: `"2023-06-01"`.
    pub api_version: String,
    /// Per-request timeout. Default: none, a slow service keeps the
    /// pattern in flight until it answers.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: crate::ANTHROPIC_BASE_URL.to_string(),
            model: crate::DEFAULT_MODEL.to_string(),
            max_tokens: crate::DEFAULT_MAX_TOKENS,
            api_version: crate::ANTHROPIC_VERSION.to_string(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Point the client at a different origin (proxies, local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of the Messages endpoint.
    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

/// Read the API key from [`API_KEY_ENV`].
pub fn api_key_from_env() -> Result<String, GenerateError> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(GenerateError::MissingApiKey(API_KEY_ENV)),
    }
}
