//! Shared doubles for handler and bot tests.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use parking_lot::Mutex;
use std::sync::Arc;

use terramagna_rag::embeddings::HashingEmbedder;
use terramagna_rag::{AgentConfig, GenerationConfig, LLMProvider, ProviderInfo, RealEstateAgent};

use crate::whatsapp_bot::MessageSender;

pub struct FixedLLM(pub String);

#[async_trait]
impl LLMProvider for FixedLLM {
    async fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> Result<String> {
        Ok(self.0.clone())
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "fixed".to_string(),
            model: "fixed".to_string(),
            endpoint: "memory://fixed".to_string(),
        }
    }
}

/// Agent over `dir` that always answers `reply`.
pub async fn ready_agent(dir: &Path, reply: &str) -> Arc<RealEstateAgent> {
    let config = AgentConfig {
        knowledge_dir: dir.to_path_buf(),
        ..AgentConfig::default()
    };
    Arc::new(
        RealEstateAgent::initialize(
            config,
            Arc::new(FixedLLM(reply.to_string())),
            Some(Arc::new(HashingEmbedder::default())),
        )
        .await,
    )
}

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        self.sent.lock().push((to.to_string(), body.to_string()));
        Ok(())
    }
}
