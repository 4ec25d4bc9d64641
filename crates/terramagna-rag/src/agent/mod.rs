//! Real-estate agent - ties loading, retrieval, language, prompting and
//! platform formatting into a single `answer` call that never fails.

pub mod business_hours;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::config::{AgentConfig, EmbeddingProvider};
use crate::embeddings::{EmbeddingModel, HashingEmbedder, OpenAIEmbedder};
use crate::error::{validate_question, AgentError, InputError};
use crate::llm::{ExternalProvider, GenerationConfig, LLMProvider};
use crate::memory::SessionStore;
use crate::processing::{chunk_documents, property_titles, DocumentLoader, TextChunker};
use crate::rag::{
    clean_whatsapp_text, compose, detect_heuristic, detect_sentiment, format_for_platform,
    is_urgent, Language, LanguageDetector, PromptInput,
};
use crate::search::{SearchHit, VectorIndex};
use crate::types::{GeneratedResponse, MessagePlatform, Query};

/// Reply used while the agent has no model behind it.
pub const UNAVAILABLE_MESSAGE: &str =
    "⚠️ Servicio temporalmente no disponible. Intenta en unos minutos.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    Ready,
    Degraded(AgentError),
}

#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub question: String,
    pub platform: MessagePlatform,
    /// Conversation key (phone number or web session id). `None` means stateless.
    pub session_id: Option<String>,
}

/// Capability report for the status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub available: bool,
    pub degraded_reason: Option<String>,
    pub grounded: bool,
    pub ungrounded_reason: Option<String>,
    pub documents: usize,
    pub chunks: usize,
    pub knowledge_dir: String,
    pub knowledge_dir_exists: bool,
    pub api_key_configured: bool,
    pub model: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_dimension: usize,
    pub sessions: usize,
}

pub struct RealEstateAgent {
    config: AgentConfig,
    llm: Option<Arc<dyn LLMProvider>>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
    detector: LanguageDetector,
    index: Arc<VectorIndex>,
    sessions: SessionStore,
    status: AgentStatus,
    ungrounded_reason: Option<String>,
}

impl RealEstateAgent {
    /// Build the hosted LLM and embedding clients from `config`, then initialize.
    /// A missing key or broken config yields a degraded agent rather than an error.
    pub async fn from_config(config: AgentConfig) -> Self {
        if let Err(reason) = config.validate() {
            return Self::degraded(config, AgentError::InvalidConfig(reason));
        }
        if !config.has_api_key() {
            return Self::degraded(config, AgentError::MissingApiKey);
        }

        let llm = match ExternalProvider::new(&config.llm) {
            Ok(provider) => Arc::new(provider) as Arc<dyn LLMProvider>,
            Err(e) => return Self::degraded(config, AgentError::ClientInit(format!("{:#}", e))),
        };
        let embedder = match config.embedding.provider {
            EmbeddingProvider::OpenAi => match OpenAIEmbedder::new(&config.llm, &config.embedding) {
                Ok(embedder) => Arc::new(embedder) as Arc<dyn EmbeddingModel>,
                Err(e) => return Self::degraded(config, AgentError::ClientInit(format!("{:#}", e))),
            },
            EmbeddingProvider::Hashing => {
                tracing::info!(dimension = config.embedding.dimension, "Using offline hashing embeddings");
                Arc::new(HashingEmbedder::new(config.embedding.dimension)) as Arc<dyn EmbeddingModel>
            }
        };

        Self::initialize(config, llm, Some(embedder)).await
    }

    /// Load the knowledge directory, embed it and build the index.
    /// Without an embedder, or when loading/embedding fails, the agent answers ungrounded.
    pub async fn initialize(
        config: AgentConfig,
        llm: Arc<dyn LLMProvider>,
        embedder: Option<Arc<dyn EmbeddingModel>>,
    ) -> Self {
        let (index, ungrounded_reason) = match embedder.as_ref() {
            Some(embedder) => match build_index(&config, embedder.as_ref()).await {
                Ok(index) if index.is_empty() => {
                    (VectorIndex::default(), Some("knowledge directory is empty".to_string()))
                }
                Ok(index) => (index, None),
                Err(e) => {
                    tracing::warn!("Knowledge base unavailable, answering without documents: {:#}", e);
                    (VectorIndex::default(), Some(format!("{:#}", e)))
                }
            },
            None => (VectorIndex::default(), Some("no embedding model configured".to_string())),
        };

        tracing::info!(
            chunks = index.len(),
            documents = index.document_count(),
            grounded = ungrounded_reason.is_none(),
            model = %llm.info().model,
            "Real-estate agent initialized"
        );

        Self {
            detector: LanguageDetector::new(
                Some(llm.clone()),
                config.language.default,
                config.language.llm_min_chars,
            ),
            sessions: SessionStore::new(&config.memory),
            llm: Some(llm),
            embedder,
            index: Arc::new(index),
            status: AgentStatus::Ready,
            ungrounded_reason,
            config,
        }
    }

    fn degraded(config: AgentConfig, reason: AgentError) -> Self {
        tracing::warn!("Agent starting in degraded mode: {}", reason);
        Self {
            detector: LanguageDetector::new(None, config.language.default, config.language.llm_min_chars),
            sessions: SessionStore::new(&config.memory),
            llm: None,
            embedder: None,
            index: Arc::new(VectorIndex::default()),
            status: AgentStatus::Degraded(reason),
            ungrounded_reason: Some("agent is degraded".to_string()),
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn status(&self) -> &AgentStatus {
        &self.status
    }

    pub fn is_available(&self) -> bool {
        self.status == AgentStatus::Ready
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn answer(&self, request: AgentRequest) -> GeneratedResponse {
        self.answer_at(request, Local::now().naive_local()).await
    }

    /// Web entry point without conversation memory; returns the delivered text.
    pub async fn answer_web(&self, question: &str) -> String {
        self.answer(AgentRequest {
            question: question.to_string(),
            platform: MessagePlatform::Web,
            session_id: None,
        })
        .await
        .formatted
    }

    /// WhatsApp entry point; the phone number keys the conversation.
    pub async fn answer_whatsapp(&self, question: &str, phone: &str) -> String {
        self.answer(AgentRequest {
            question: question.to_string(),
            platform: MessagePlatform::WhatsApp,
            session_id: Some(phone.to_string()),
        })
        .await
        .formatted
    }

    pub(crate) async fn answer_at(&self, request: AgentRequest, now: NaiveDateTime) -> GeneratedResponse {
        let Some(llm) = self.llm.as_ref().filter(|_| self.is_available()) else {
            return self.fixed_reply(
                UNAVAILABLE_MESSAGE.to_string(),
                self.detector.default_language(),
                request.platform,
            );
        };

        let cleaned = match request.platform {
            MessagePlatform::WhatsApp => clean_whatsapp_text(&request.question),
            MessagePlatform::Web => request.question.trim().to_string(),
        };
        // Emoji-only messages are empty once cleaned.
        let text = match validate_question(&cleaned, self.config.limits.max_question_chars) {
            Ok(text) => text.to_string(),
            Err(e) => {
                let language = detect_heuristic(&cleaned).unwrap_or_else(|| self.detector.default_language());
                tracing::info!(platform = request.platform.as_str(), "Question rejected: {}", e);
                return self.decorated_reply(invalid_question_reply(language, &e), language, request.platform);
            }
        };

        let language = self.detector.detect(&text).await;
        let query = Query {
            urgent: is_urgent(&text),
            sentiment: detect_sentiment(&text),
            text,
            language,
            platform: request.platform,
            session_id: request.session_id,
        };

        if query.platform == MessagePlatform::WhatsApp && !query.urgent {
            if let Some(hours) = self.config.business_hours.as_ref() {
                if !business_hours::is_open(hours, now) {
                    tracing::info!(language = %language, "Outside business hours, sending auto-reply");
                    let reply = business_hours::out_of_hours_reply(language, hours);
                    return self.decorated_reply(reply, language, query.platform);
                }
            }
        }

        let hits = self.retrieve(&query.text).await;

        // Held for the whole turn so concurrent messages from one sender queue up.
        let handle = query.session_id.as_deref().map(|id| self.sessions.get_or_create(id));
        let mut session = match handle.as_ref() {
            Some(handle) => Some(handle.lock().await),
            None => None,
        };
        let history = session.as_ref().map(|s| s.messages()).unwrap_or_default();

        let prompt = compose(&PromptInput {
            question: &query.text,
            language: query.language,
            platform: query.platform,
            urgent: query.urgent,
            sentiment: query.sentiment,
            context: &hits,
            history: &history,
            whatsapp_max_chars: self.config.platform.whatsapp_max_chars,
        });

        let raw = match llm
            .generate(&prompt.text, &GenerationConfig::from(&self.config.llm))
            .await
        {
            Ok(text) => {
                if let Some(session) = session.as_mut() {
                    session.push_exchange(&query.text, &text);
                }
                text
            }
            Err(e) => {
                tracing::error!(platform = query.platform.as_str(), "Generation failed: {:#}", e);
                apology(query.language).to_string()
            }
        };

        GeneratedResponse {
            formatted: format_for_platform(&raw, query.language, query.platform, &self.config.platform),
            flag: query.language.flag(),
            grounded: !hits.is_empty(),
            sources: hits.iter().map(|h| h.chunk.source.clone()).collect(),
            raw,
            language: query.language,
            platform: query.platform,
        }
    }

    async fn retrieve(&self, text: &str) -> Vec<SearchHit> {
        let Some(embedder) = self.embedder.as_ref() else {
            return Vec::new();
        };
        if self.index.is_empty() {
            return Vec::new();
        }
        match embedder.embed_query(text).await {
            Ok(vector) => self.index.search(&vector, self.config.search.top_k),
            Err(e) => {
                tracing::warn!("Query embedding failed, answering without documents: {:#}", e);
                Vec::new()
            }
        }
    }

    fn decorated_reply(&self, text: String, language: Language, platform: MessagePlatform) -> GeneratedResponse {
        GeneratedResponse {
            formatted: format_for_platform(&text, language, platform, &self.config.platform),
            raw: text,
            language,
            platform,
            flag: language.flag(),
            grounded: false,
            sources: Vec::new(),
        }
    }

    fn fixed_reply(&self, text: String, language: Language, platform: MessagePlatform) -> GeneratedResponse {
        GeneratedResponse {
            formatted: text.clone(),
            raw: text,
            language,
            platform,
            flag: "",
            grounded: false,
            sources: Vec::new(),
        }
    }

    /// Property sheets available in the knowledge directory.
    pub fn list_properties(&self) -> anyhow::Result<Vec<String>> {
        if !self.config.knowledge_dir.is_dir() {
            return Ok(Vec::new());
        }
        property_titles(&self.config.knowledge_dir)
    }

    pub fn report(&self) -> AgentReport {
        let degraded_reason = match &self.status {
            AgentStatus::Ready => None,
            AgentStatus::Degraded(reason) => Some(reason.to_string()),
        };
        AgentReport {
            available: self.is_available(),
            degraded_reason,
            grounded: self.ungrounded_reason.is_none(),
            ungrounded_reason: self.ungrounded_reason.clone(),
            documents: self.index.document_count(),
            chunks: self.index.len(),
            knowledge_dir: self.config.knowledge_dir.display().to_string(),
            knowledge_dir_exists: self.config.knowledge_dir.is_dir(),
            api_key_configured: self.config.has_api_key(),
            model: self.llm.as_ref().map(|l| l.info().model),
            embedding_model: self.embedder.as_ref().map(|e| e.model_name().to_string()),
            embedding_dimension: self.index.dimension(),
            sessions: self.sessions.len(),
        }
    }
}

async fn build_index(config: &AgentConfig, embedder: &dyn EmbeddingModel) -> anyhow::Result<VectorIndex> {
    let dir: &Path = &config.knowledge_dir;
    if !dir.exists() {
        tracing::warn!("Knowledge directory {} does not exist, creating it", dir.display());
        std::fs::create_dir_all(dir)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", dir.display(), e))?;
        return Ok(VectorIndex::default());
    }

    let documents = DocumentLoader::new().load_dir(dir)?;
    let chunks = chunk_documents(&documents, &TextChunker::from_config(&config.chunking));
    if chunks.is_empty() {
        return Ok(VectorIndex::default());
    }

    tracing::info!(documents = documents.len(), chunks = chunks.len(), "Embedding knowledge base");
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_documents(&texts).await?;
    VectorIndex::build(chunks, vectors)
}

/// Localised reply for a question rejected before reaching the model.
pub fn invalid_question_reply(language: Language, error: &InputError) -> String {
    match error {
        InputError::Empty => match language {
            Language::Spanish => "Por favor, envíame tu consulta por escrito para que pueda ayudarte.",
            Language::English => "Please send me your question as text so I can help you.",
            Language::German => "Bitte senden Sie mir Ihre Frage als Text, damit ich Ihnen helfen kann.",
            Language::Russian => "Пожалуйста, отправьте ваш вопрос текстом, чтобы я могла помочь.",
            Language::French => "Merci de m'envoyer votre question par écrit afin que je puisse vous aider.",
            Language::Italian => "Per favore, inviami la tua domanda per iscritto così posso aiutarti.",
        }
        .to_string(),
        InputError::TooLong { max, .. } => match language {
            Language::Spanish => format!("Tu mensaje es demasiado largo (máximo {} caracteres). ¿Puedes resumirlo?", max),
            Language::English => format!("Your message is too long (maximum {} characters). Could you shorten it?", max),
            Language::German => format!("Ihre Nachricht ist zu lang (maximal {} Zeichen). Können Sie sie kürzen?", max),
            Language::Russian => format!("Ваше сообщение слишком длинное (максимум {} символов). Можете сократить его?", max),
            Language::French => format!("Votre message est trop long ({} caractères maximum). Pouvez-vous le raccourcir ?", max),
            Language::Italian => format!("Il tuo messaggio è troppo lungo (massimo {} caratteri). Puoi riassumerlo?", max),
        },
    }
}

/// Localised message returned when the model call fails.
pub fn apology(language: Language) -> &'static str {
    match language {
        Language::Spanish => "⚠️ Lo siento, ha ocurrido un problema al procesar tu consulta. Por favor, inténtalo de nuevo en unos minutos.",
        Language::English => "⚠️ Sorry, something went wrong while processing your question. Please try again in a few minutes.",
        Language::German => "⚠️ Entschuldigung, bei der Bearbeitung Ihrer Anfrage ist ein Fehler aufgetreten. Bitte versuchen Sie es in ein paar Minuten erneut.",
        Language::Russian => "⚠️ Извините, при обработке вашего вопроса произошла ошибка. Пожалуйста, повторите попытку через несколько минут.",
        Language::French => "⚠️ Désolé, un problème est survenu lors du traitement de votre question. Veuillez réessayer dans quelques minutes.",
        Language::Italian => "⚠️ Spiacenti, si è verificato un problema durante l'elaborazione della tua domanda. Riprova tra qualche minuto.",
    }
}
