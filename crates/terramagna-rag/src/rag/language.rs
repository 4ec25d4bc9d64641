//! Reply-language detection.
//!
//! A keyword heuristic settles most messages without a network call; only
//! ambiguous text of some length is sent to the model as a one-word
//! classification. Detection never fails: anything unexpected resolves to the
//! configured default language.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::llm::{GenerationConfig, LLMProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Spanish,
    English,
    German,
    Russian,
    French,
    Italian,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Spanish,
        Language::English,
        Language::German,
        Language::Russian,
        Language::French,
        Language::Italian,
    ];

    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Spanish => "es",
            Self::English => "en",
            Self::German => "de",
            Self::Russian => "ru",
            Self::French => "fr",
            Self::Italian => "it",
        }
    }

    /// English name, also the label the classifier is asked to answer with.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Spanish => "spanish",
            Self::English => "english",
            Self::German => "german",
            Self::Russian => "russian",
            Self::French => "french",
            Self::Italian => "italian",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Self::Spanish => "🇪🇸",
            Self::English => "🇬🇧",
            Self::German => "🇩🇪",
            Self::Russian => "🇷🇺",
            Self::French => "🇫🇷",
            Self::Italian => "🇮🇹",
        }
    }

    /// Map a free-form label ("Inglés", "deutsch", "en", "Español.") onto the set.
    pub fn from_label(label: &str) -> Option<Self> {
        let word = label
            .split_whitespace()
            .next()?
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        match word.as_str() {
            "spanish" | "español" | "espanol" | "castellano" | "es" => Some(Self::Spanish),
            "english" | "inglés" | "ingles" | "en" => Some(Self::English),
            "german" | "alemán" | "aleman" | "deutsch" | "de" => Some(Self::German),
            "russian" | "ruso" | "русский" | "ru" => Some(Self::Russian),
            "french" | "francés" | "frances" | "français" | "francais" | "fr" => {
                Some(Self::French)
            }
            "italian" | "italiano" | "it" => Some(Self::Italian),
            _ => None,
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::Spanish
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Lists are disjoint: a word shared by two languages ("casa", "de", "la")
// carries no signal and is left out.
const SPANISH_WORDS: &[&str] = &[
    "precio", "precios", "una", "casa", "casas", "qué", "que", "cuánto", "cuanto", "cuesta",
    "hola", "tiene", "tienen", "tienes", "propiedades", "propiedad", "vivienda", "piso", "quiero",
    "busco", "el", "los", "las", "por", "para", "con", "gracias", "habitaciones", "dónde", "donde",
    "cómo", "como", "está", "hay", "venta", "alquiler", "comprar", "buenos", "días", "dormitorios",
];
const ENGLISH_WORDS: &[&str] = &[
    "what", "which", "how", "much", "price", "prices", "house", "houses", "home", "properties",
    "property", "you", "your", "have", "do", "does", "is", "are", "the", "for", "sale", "rent",
    "buy", "hello", "hi", "thanks", "thank", "want", "looking", "apartment", "bedrooms", "where",
    "can", "i", "there", "any", "available", "with",
];
const GERMAN_WORDS: &[&str] = &[
    "was", "ist", "haben", "sie", "ich", "haus", "häuser", "preis", "wohnung", "kaufen", "wie",
    "viel", "kostet", "gibt", "welche", "hallo", "danke", "und", "der", "das", "nicht", "mit",
    "zimmer", "immobilien", "eine", "einen", "miete", "suche", "guten", "tag", "wo",
];
const RUSSIAN_WORDS: &[&str] = &[
    "что", "как", "сколько", "цена", "дом", "квартира", "привет", "есть", "вас", "стоит",
    "здравствуйте", "купить", "недвижимость", "спасибо",
];
const FRENCH_WORDS: &[&str] = &[
    "bonjour", "prix", "maison", "maisons", "combien", "vous", "avez", "je", "cherche",
    "appartement", "quel", "quelle", "quels", "merci", "une", "les", "est", "acheter", "louer",
    "chambres", "où", "propriétés", "avec", "des",
];
const ITALIAN_WORDS: &[&str] = &[
    "ciao", "prezzo", "quanto", "vorrei", "appartamento", "grazie", "sono", "avete", "cerco",
    "il", "della", "che", "di", "quale", "quali", "proprietà", "comprare", "affitto", "camere",
    "buongiorno", "dove", "gli",
];

fn keywords(language: Language) -> &'static [&'static str] {
    match language {
        Language::Spanish => SPANISH_WORDS,
        Language::English => ENGLISH_WORDS,
        Language::German => GERMAN_WORDS,
        Language::Russian => RUSSIAN_WORDS,
        Language::French => FRENCH_WORDS,
        Language::Italian => ITALIAN_WORDS,
    }
}

/// Keyword vote over lower-cased word tokens. Returns a language only when it
/// has strictly more hits than every other one.
pub fn detect_heuristic(text: &str) -> Option<Language> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let mut counts = [0usize; 6];
    for (i, language) in Language::ALL.iter().enumerate() {
        let words = keywords(*language);
        counts[i] = tokens.iter().filter(|t| words.contains(t)).count();
    }

    // Cyrillic script is decisive on its own.
    if lowered.chars().any(|c| matches!(c, '\u{0400}'..='\u{04FF}')) {
        counts[3] += tokens.len().max(1);
    }

    let (best, &best_count) = counts.iter().enumerate().max_by_key(|(_, c)| **c)?;
    if best_count == 0 {
        return None;
    }
    let dominant = counts
        .iter()
        .enumerate()
        .all(|(i, c)| i == best || *c < best_count);
    dominant.then(|| Language::ALL[best])
}

fn classification_prompt(text: &str) -> String {
    let labels: Vec<&str> = Language::ALL.iter().map(|l| l.name()).collect();
    format!(
        "Identify the language of the following message. Answer with exactly one word, \
         lowercase, chosen from: {}. Do not add anything else.\n\nMessage: {}\n\nLanguage:",
        labels.join(", "),
        text
    )
}

pub struct LanguageDetector {
    llm: Option<Arc<dyn LLMProvider>>,
    default: Language,
    llm_min_chars: usize,
}

impl LanguageDetector {
    pub fn new(llm: Option<Arc<dyn LLMProvider>>, default: Language, llm_min_chars: usize) -> Self {
        Self {
            llm,
            default,
            llm_min_chars,
        }
    }

    pub fn default_language(&self) -> Language {
        self.default
    }

    pub async fn detect(&self, text: &str) -> Language {
        if let Some(language) = detect_heuristic(text) {
            return language;
        }

        let text = text.trim();
        let Some(llm) = self.llm.as_ref() else {
            return self.default;
        };
        if text.chars().count() < self.llm_min_chars {
            return self.default;
        }

        match llm
            .generate(&classification_prompt(text), &GenerationConfig::classification())
            .await
        {
            Ok(answer) => Language::from_label(&answer).unwrap_or_else(|| {
                tracing::debug!(answer = %answer.trim(), "Unrecognised language label");
                self.default
            }),
            Err(e) => {
                tracing::warn!("Language classification failed: {:#}", e);
                self.default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLLM;

    #[test]
    fn test_keyword_messages_resolve_to_their_language() {
        let cases = [
            ("¿Precio de una casa?", Language::Spanish),
            ("What properties do you have?", Language::English),
            ("Was kostet das Haus?", Language::German),
            ("Сколько стоит квартира?", Language::Russian),
            ("Bonjour, combien coûte la maison?", Language::French),
            ("Ciao, quanto è il prezzo dell'appartamento?", Language::Italian),
        ];
        for (text, expected) in cases {
            assert_eq!(detect_heuristic(text), Some(expected), "{}", text);
        }
    }

    #[test]
    fn test_keyword_lists_are_disjoint() {
        for (i, a) in Language::ALL.iter().enumerate() {
            for b in Language::ALL.iter().skip(i + 1) {
                for word in keywords(*a) {
                    assert!(!keywords(*b).contains(word), "{} in {} and {}", word, a, b);
                }
            }
        }
    }

    #[test]
    fn test_tie_is_ambiguous() {
        assert_eq!(detect_heuristic("casa house"), None);
        assert_eq!(detect_heuristic("12345 ..."), None);
    }

    #[test]
    fn test_from_label() {
        assert_eq!(Language::from_label("Inglés."), Some(Language::English));
        assert_eq!(Language::from_label(" deutsch\n"), Some(Language::German));
        assert_eq!(Language::from_label("ESPAÑOL"), Some(Language::Spanish));
        assert_eq!(Language::from_label("klingon"), None);
        assert_eq!(Language::from_label(""), None);
    }

    #[tokio::test]
    async fn test_unknown_model_label_falls_back_to_default() {
        let llm = Arc::new(MockLLM::replying("klingon"));
        let detector = LanguageDetector::new(Some(llm.clone()), Language::Spanish, 12);
        let language = detector.detect("Zxqv plorth wumble grintavo spleek morrandu").await;
        assert_eq!(language, Language::Spanish);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_model_label_is_used_for_ambiguous_text() {
        let llm = Arc::new(MockLLM::replying("Italiano"));
        let detector = LanguageDetector::new(Some(llm), Language::Spanish, 12);
        assert_eq!(detector.detect("Zxqv plorth wumble grintavo").await, Language::Italian);
    }

    #[tokio::test]
    async fn test_short_ambiguous_text_skips_model() {
        let llm = Arc::new(MockLLM::replying("english"));
        let detector = LanguageDetector::new(Some(llm.clone()), Language::Spanish, 12);
        assert_eq!(detector.detect("ok").await, Language::Spanish);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_default() {
        let llm = Arc::new(MockLLM::failing());
        let detector = LanguageDetector::new(Some(llm), Language::German, 1);
        assert_eq!(detector.detect("Zxqv plorth wumble").await, Language::German);
    }
}
