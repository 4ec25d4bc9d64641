pub mod agent;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod memory;
pub mod processing;
pub mod rag;
pub mod search;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export primary types for convenience
pub use agent::{AgentReport, AgentRequest, AgentStatus, RealEstateAgent, UNAVAILABLE_MESSAGE};
pub use config::AgentConfig;
pub use error::{validate_question, AgentError, InputError};
pub use memory::{SeenMessages, SessionStore};
pub use rag::{Language, Sentiment};
pub use types::{DocumentFormat, GeneratedResponse, KnowledgeChunk, MessagePlatform};

// Re-export LLM types
pub use llm::{GenerationConfig, LLMProvider, ProviderInfo};

// Re-export common types
pub use anyhow::{Error, Result};
