//! Query-side pipeline pieces: language and mood detection, prompt
//! composition and platform formatting.

pub mod language;
pub mod platform;
pub mod prompt;
pub mod sentiment;

pub use language::{detect_heuristic, Language, LanguageDetector};
pub use platform::{clean_whatsapp_text, flag_for_label, format_for_platform, is_urgent, truncate_for_whatsapp};
pub use prompt::{compose, ComposedPrompt, PromptInput, AGENCY_NAME};
pub use sentiment::{detect_sentiment, Sentiment};
