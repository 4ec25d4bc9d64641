//! External API provider for LLM
//! Speaks the OpenAI chat-completions protocol (OpenAI, OpenRouter, Ollama, ...)

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{GenerationConfig, LLMProvider, ProviderInfo};
use crate::config::LlmSettings;

/// External API provider
pub struct ExternalProvider {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl ExternalProvider {
    /// Create new external provider
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Ok(Self {
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            client: build_client(settings.timeout_secs)?,
        })
    }

    /// OpenAI-compatible generation
    async fn openai_compatible_generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String> {
        let request = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "top_p": config.top_p,
            "stream": false
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| describe_send_error(&self.endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", self.endpoint))?;

        if !status.is_success() {
            let preview: String = body.chars().take(300).collect();
            return Err(anyhow!("API error ({}): {}", status, preview));
        }

        let result: OpenAIResponse = parse_json_body(status, &body, &self.endpoint)?;
        result
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("{} returned an empty completion", self.endpoint))
    }
}

#[async_trait]
impl LLMProvider for ExternalProvider {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        self.openai_compatible_generate(prompt, config).await
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "openai-compatible".to_string(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

/// HTTP client shared by the hosted LLM and embedding calls.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .build()
        .context("Failed to build HTTP client")
}

pub(crate) fn describe_send_error(endpoint: &str, e: reqwest::Error) -> anyhow::Error {
    if e.is_timeout() {
        anyhow!("Request to {} timed out, check network connectivity", endpoint)
    } else if e.is_connect() {
        anyhow!("Failed to connect to {}: check network/firewall/proxy: {}", endpoint, e)
    } else {
        anyhow!("Request to {} failed: {}", endpoint, e)
    }
}

/// Parse a response body as JSON, returning a clear error if the server returned HTML.
pub(crate) fn parse_json_body<T: serde::de::DeserializeOwned>(
    status: StatusCode,
    body: &str,
    endpoint: &str,
) -> Result<T> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(anyhow!(
            "Endpoint {} returned HTML instead of JSON (HTTP {}), service may be down. Response: {}",
            endpoint,
            status,
            preview
        ));
    }
    serde_json::from_str::<T>(body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        anyhow!(
            "Failed to parse JSON from {} (HTTP {}): {}. Body: {}",
            endpoint,
            status,
            e,
            preview
        )
    })
}

/// Response structures
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: String,
}
