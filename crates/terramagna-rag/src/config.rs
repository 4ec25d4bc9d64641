use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::rag::language::Language;

/// Longest accepted session TTL (one year).
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub knowledge_dir: PathBuf,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub language: LanguageConfig,
    pub memory: MemoryConfig,
    pub platform: PlatformConfig,
    pub business_hours: Option<BusinessHoursConfig>,
    pub limits: InputLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Left empty when unset; the agent then starts in degraded mode.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model: String,
    /// Vector size of the hashing embedder; hosted models define their own.
    pub dimension: usize,
    /// Texts per request to the embeddings endpoint.
    pub batch_size: usize,
}

/// Where knowledge and query embeddings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings` endpoint at `llm.base_url`.
    #[default]
    OpenAi,
    /// Local feature hashing, no network.
    Hashing,
}

impl EmbeddingProvider {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "hashing" | "offline" => Some(Self::Hashing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    pub default: Language,
    /// Ambiguous texts shorter than this are not sent to the model.
    pub llm_min_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Exchanges (user + assistant pairs) kept per session.
    pub history_depth: usize,
    pub session_ttl_secs: u64,
    pub max_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Character budget for a single outbound WhatsApp message.
    pub whatsapp_max_chars: usize,
    pub truncation_notice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHoursConfig {
    pub open_hour: u32,
    pub close_hour: u32,
    pub weekdays_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputLimits {
    pub max_question_chars: usize,
}

impl AgentConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunking.chunk_size < 50 {
            return Err("chunking.chunk_size must be >= 50".into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err("chunking.chunk_overlap must be < chunk_size".into());
        }
        if self.search.top_k == 0 {
            return Err("search.top_k must be > 0".into());
        }
        if self.memory.history_depth == 0 {
            return Err("memory.history_depth must be > 0".into());
        }
        if self.memory.session_ttl_secs == 0 || self.memory.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(format!(
                "memory.session_ttl_secs must be in 1..={}",
                MAX_SESSION_TTL_SECS
            ));
        }
        if self.memory.max_sessions == 0 {
            return Err("memory.max_sessions must be > 0".into());
        }
        if self.embedding.batch_size == 0 {
            return Err("embedding.batch_size must be > 0".into());
        }
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be > 0".into());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err("llm.temperature must be in [0.0, 2.0]".into());
        }
        // The notice plus a few words of the answer must fit in one message.
        let notice_len = self.platform.truncation_notice.chars().count();
        if self.platform.whatsapp_max_chars < notice_len + 20 {
            return Err("platform.whatsapp_max_chars is too small for the truncation notice".into());
        }
        if self.limits.max_question_chars == 0 {
            return Err("limits.max_question_chars must be > 0".into());
        }
        if let Some(hours) = &self.business_hours {
            if hours.open_hour >= hours.close_hour || hours.close_hour > 24 {
                return Err("business_hours must satisfy open_hour < close_hour <= 24".into());
            }
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values taken from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("OPENAI_API_KEY") {
            self.llm.api_key = key.trim().to_string();
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(label) = var("EMBEDDING_PROVIDER") {
            match EmbeddingProvider::from_label(&label) {
                Some(provider) => self.embedding.provider = provider,
                None => tracing::warn!("Ignoring unknown EMBEDDING_PROVIDER: {}", label),
            }
        }
        if let Some(dir) = var("KNOWLEDGE_DIR") {
            self.knowledge_dir = PathBuf::from(dir);
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.llm.api_key.is_empty()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            knowledge_dir: PathBuf::from("conocimiento"),
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
            language: LanguageConfig::default(),
            memory: MemoryConfig::default(),
            platform: PlatformConfig::default(),
            business_hours: None,
            limits: InputLimits::default(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAi,
            model: "text-embedding-3-small".to_string(),
            dimension: 256,
            batch_size: 64,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 20,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            default: Language::Spanish,
            llm_min_chars: 12,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_depth: 5,
            session_ttl_secs: 24 * 60 * 60,
            max_sessions: 1000,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            whatsapp_max_chars: 1600,
            truncation_notice: "📱 *Respuesta completa disponible por teléfono*".to_string(),
        }
    }
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_question_chars: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.top_k, 4);
        assert_eq!(config.memory.history_depth, 5);
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = AgentConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_whatsapp_budget_must_fit_notice() {
        let mut config = AgentConfig::default();
        config.platform.whatsapp_max_chars = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_ttl_is_bounded() {
        let mut config = AgentConfig::default();
        config.memory.session_ttl_secs = u64::MAX;
        assert!(config.validate().is_err());
        config.memory.session_ttl_secs = 100_000_000_000_000_000;
        assert!(config.validate().is_err());
        config.memory.session_ttl_secs = 0;
        assert!(config.validate().is_err());
        config.memory.session_ttl_secs = MAX_SESSION_TTL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedding_provider_selection() {
        let mut config = AgentConfig::default();
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);

        config.apply_vars(|k| (k == "EMBEDDING_PROVIDER").then(|| "hashing".to_string()));
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);

        config.apply_vars(|k| (k == "EMBEDDING_PROVIDER").then(|| "word2vec".to_string()));
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);

        let parsed: EmbeddingSettings = serde_json::from_str(r#"{"provider": "hashing", "dimension": 64}"#).unwrap();
        assert_eq!(parsed.provider, EmbeddingProvider::Hashing);
        assert_eq!(parsed.dimension, 64);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", " sk-test "),
            ("OPENAI_BASE_URL", "http://localhost:11434/v1/"),
            ("KNOWLEDGE_DIR", "/srv/knowledge"),
        ]);
        let mut config = AgentConfig::default();
        config.apply_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key, "sk-test");
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.knowledge_dir, PathBuf::from("/srv/knowledge"));
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"search": {"top_k": 3}, "memory": {"history_depth": 2}}"#).unwrap();

        let config = AgentConfig::from_file(&path).unwrap();
        assert_eq!(config.search.top_k, 3);
        assert_eq!(config.memory.history_depth, 2);
        assert_eq!(config.memory.max_sessions, 1000);
        assert_eq!(config.chunking.chunk_size, 1000);
    }
}
