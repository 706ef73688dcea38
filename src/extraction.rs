//! AI extraction provider abstraction and implementations.
//!
//! Defines the [`ExtractionProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns errors; used when extraction is not
//!   configured.
//! - **[`OpenAiProvider`]** — calls the OpenAI chat completions API.
//!
//! A provider takes one fully built batch prompt and returns the raw model
//! text; parsing and schema validation happen in the batcher. Errors are
//! split into transient (retryable: rate limits, server errors, network)
//! and permanent (bad credential, malformed request) so the batcher's
//! retry state machine can tell them apart.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::ExtractionConfig;

/// Environment variable holding the API credential. Never written to any
/// output file.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Extraction call failure, split by retryability.
#[derive(Debug)]
pub enum ExtractionError {
    /// Rate limit, server error, or network failure. Retried with backoff.
    Transient(String),
    /// Invalid credential or malformed request. Never retried.
    Permanent(String),
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::Transient(e) => write!(f, "transient extraction error: {}", e),
            ExtractionError::Permanent(e) => write!(f, "permanent extraction error: {}", e),
        }
    }
}

impl std::error::Error for ExtractionError {}

/// An AI capability that turns a batch prompt into raw model output.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o"`).
    fn model_name(&self) -> &str;

    /// Run one extraction call and return the raw completion text.
    async fn extract(&self, prompt: &str) -> Result<String, ExtractionError>;
}

// ============ Disabled Provider ============

/// A no-op provider that always fails. Used when
/// `extraction.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

#[async_trait]
impl ExtractionProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn extract(&self, _prompt: &str) -> Result<String, ExtractionError> {
        Err(ExtractionError::Permanent(
            "extraction provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI Provider ============

/// Extraction provider using the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set. Each call
/// is subject to the configured request timeout; retrying is the batcher's
/// responsibility.
pub struct OpenAiProvider {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("extraction.model required for OpenAI provider"))?;

        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", API_KEY_ENV))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ExtractionProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn extract(&self, prompt: &str) -> Result<String, ExtractionError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 1500,
            "temperature": 0.1,
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::Transient(e.to_string()))?;

        let status = resp.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(ExtractionError::Transient(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(ExtractionError::Permanent(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ExtractionError::Transient(e.to_string()))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ExtractionError::Permanent("invalid OpenAI response: missing content".to_string())
            })
    }
}

/// Create the appropriate [`ExtractionProvider`] based on configuration.
pub fn create_provider(config: &ExtractionConfig) -> Result<Box<dyn ExtractionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        other => bail!("Unknown extraction provider: {}", other),
    }
}
