//! LLM Module - hosted chat-completion providers

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod external;

pub use external::ExternalProvider;

use crate::config::LlmSettings;

/// Core trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    /// Get provider info
    fn info(&self) -> ProviderInfo;
}

/// Generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl From<&LlmSettings> for GenerationConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: 1.0,
        }
    }
}

impl GenerationConfig {
    /// Settings for one-word classification calls.
    pub fn classification() -> Self {
        Self {
            max_tokens: 5,
            temperature: 0.0,
            top_p: 1.0,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from(&LlmSettings::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub endpoint: String,
}
