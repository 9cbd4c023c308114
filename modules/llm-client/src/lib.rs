//! Minimal Anthropic Messages API client.
//!
//! One entry point: [`Claude`]. Supports plain chat completion and a typed
//! JSON extraction helper that tolerates Markdown-fenced replies.

mod types;

use anyhow::{anyhow, bail, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

use types::{ChatRequest, WireMessage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a single user prompt and return the text reply.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .temperature(0.0);

        debug!(model = %self.model, "Claude chat request");

        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!("Claude API error ({status}): {}", response.text().await?);
        }

        let reply: types::ChatResponse = response.json().await?;
        reply
            .text()
            .ok_or_else(|| anyhow!("No text in Claude response"))
    }

    /// Chat, then deserialize the reply as JSON.
    ///
    /// Models habitually wrap JSON in ``` fences; those are stripped before
    /// decoding.
    pub async fn extract_json<T: DeserializeOwned>(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<T> {
        let raw = self.chat_completion(system, user).await?;
        let cleaned = strip_code_fences(&raw);
        serde_json::from_str(cleaned)
            .map_err(|e| anyhow!("Failed to decode JSON reply: {e}: {cleaned}"))
    }
}

/// Strip a leading/trailing Markdown code fence (```json ... ``` or ``` ... ```).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
