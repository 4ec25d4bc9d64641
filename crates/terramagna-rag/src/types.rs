use serde::{Deserialize, Serialize};

use crate::rag::language::Language;
use crate::rag::sentiment::Sentiment;

/// A bounded slice of a knowledge document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// File name the chunk was cut from.
    pub source: String,
    pub text: String,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentFormat {
    TXT,
    MD,
    PDF,
    DOCX,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" => Some(Self::TXT),
            "md" | "markdown" => Some(Self::MD),
            "pdf" => Some(Self::PDF),
            "docx" => Some(Self::DOCX),
            _ => None,
        }
    }
}

/// Delivery channel of a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessagePlatform {
    Web,
    WhatsApp,
}

impl MessagePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::WhatsApp => "whatsapp",
        }
    }
}

/// One user turn as seen by the agent after language detection.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub language: Language,
    pub platform: MessagePlatform,
    pub urgent: bool,
    pub sentiment: Sentiment,
    pub session_id: Option<String>,
}

/// The answer produced for a single [`Query`].
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedResponse {
    /// Text as returned by the model (or the fallback message).
    pub raw: String,
    pub language: Language,
    pub platform: MessagePlatform,
    /// Flag-decorated, platform-safe text ready for delivery.
    pub formatted: String,
    pub flag: &'static str,
    /// Whether retrieved knowledge was placed in the prompt.
    pub grounded: bool,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}
