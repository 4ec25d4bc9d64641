//! In-process doubles for the model-facing traits.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::embeddings::EmbeddingModel;
use crate::llm::{GenerationConfig, LLMProvider, ProviderInfo};

pub struct MockLLM {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockLLM {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LLMProvider for MockLLM {
    async fn generate(&self, prompt: &str, _config: &GenerationConfig) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("API error (503 Service Unavailable): upstream down"))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "mock".to_string(),
            model: "mock".to_string(),
            endpoint: "memory://mock".to_string(),
        }
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingModel for FailingEmbedder {
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(anyhow!("embeddings endpoint unreachable"))
    }

    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(anyhow!("embeddings endpoint unreachable"))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}
