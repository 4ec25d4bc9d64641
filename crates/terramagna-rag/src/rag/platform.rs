//! Delivery-side formatting: language flags, WhatsApp length limits, and
//! inbound WhatsApp text cleanup.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::PlatformConfig;
use crate::rag::language::Language;
use crate::types::MessagePlatform;

static DISALLOWED_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.?!¿¡]").expect("disallowed chars regex is valid"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

const URGENT_WORDS: &[&str] = &[
    "urgente", "urgent", "emergency", "emergencia", "notfall", "rapido", "rápido", "quick",
    "schnell", "ahora", "now", "jetzt", "inmediato", "immediate", "sofort",
];

const DEFAULT_FLAG: &str = "🇪🇸";

/// Flag for a free-form language label; unknown labels get the Spanish flag.
pub fn flag_for_label(label: &str) -> &'static str {
    Language::from_label(label)
        .map(|l| l.flag())
        .unwrap_or(DEFAULT_FLAG)
}

pub fn decorate(text: &str, language: Language) -> String {
    format!("{} {}", language.flag(), text.trim())
}

/// Decorate with the language flag, then fit the result to the platform.
pub fn format_for_platform(
    text: &str,
    language: Language,
    platform: MessagePlatform,
    config: &PlatformConfig,
) -> String {
    let decorated = decorate(text, language);
    match platform {
        MessagePlatform::Web => decorated,
        MessagePlatform::WhatsApp => {
            truncate_for_whatsapp(&decorated, config.whatsapp_max_chars, &config.truncation_notice)
        }
    }
}

/// Shorten `text` to at most `max_chars` characters.
///
/// Whole paragraphs are kept while they fit and the notice is appended after a
/// blank line. When not even the first paragraph fits it is cut at the last
/// whitespace inside the budget, or hard-cut when there is none.
pub fn truncate_for_whatsapp(text: &str, max_chars: usize, notice: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let notice_len = notice.chars().count();
    if notice_len + 2 >= max_chars {
        return text.chars().take(max_chars).collect();
    }
    let budget = max_chars - notice_len - 2;

    let mut kept = String::new();
    let mut kept_len = 0;
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim_end();
        let len = paragraph.chars().count();
        let extra = if kept.is_empty() { len } else { len + 2 };
        if kept_len + extra > budget {
            break;
        }
        if !kept.is_empty() {
            kept.push_str("\n\n");
        }
        kept.push_str(paragraph);
        kept_len += extra;
    }

    if kept.trim().is_empty() {
        kept = cut_at_whitespace(text, budget);
    }

    format!("{}\n\n{}", kept.trim_end(), notice)
}

fn cut_at_whitespace(text: &str, budget: usize) -> String {
    let prefix: String = text.chars().take(budget).collect();
    match prefix.rfind(char::is_whitespace) {
        Some(pos) if !prefix[..pos].trim().is_empty() => prefix[..pos].trim_end().to_string(),
        _ => prefix,
    }
}

/// Normalise inbound WhatsApp text: drop symbols and emoji, keep letters,
/// digits and sentence punctuation, collapse whitespace.
pub fn clean_whatsapp_text(text: &str) -> String {
    let stripped = DISALLOWED_CHARS_RE.replace_all(text, " ");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Whether the message asks for an immediate answer.
pub fn is_urgent(text: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| URGENT_WORDS.contains(&token))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTICE: &str = "📱 *Respuesta completa disponible por teléfono*";

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_for_whatsapp("Hola", 100, NOTICE), "Hola");
    }

    #[test]
    fn test_truncation_keeps_whole_paragraphs() {
        let paragraphs: Vec<String> = (0..40)
            .map(|i| format!("Párrafo {} con información de la villa en Adeje.", i))
            .collect();
        let text = paragraphs.join("\n\n");
        let out = truncate_for_whatsapp(&text, 400, NOTICE);

        assert!(out.chars().count() <= 400);
        assert!(out.ends_with(NOTICE));
        let body = out.trim_end_matches(NOTICE).trim_end();
        for part in body.split("\n\n") {
            assert!(paragraphs.iter().any(|p| p == part), "partial paragraph: {}", part);
        }
    }

    #[test]
    fn test_single_long_paragraph_cut_at_whitespace() {
        let text = "palabra ".repeat(500);
        let out = truncate_for_whatsapp(text.trim(), 200, NOTICE);
        assert!(out.chars().count() <= 200);
        assert!(out.ends_with(NOTICE));
        let body = out.trim_end_matches(NOTICE).trim_end();
        assert!(body.split(' ').all(|w| w == "palabra"));
    }

    #[test]
    fn test_no_whitespace_hard_cut() {
        let text = "ñ".repeat(3000);
        let out = truncate_for_whatsapp(&text, 1600, NOTICE);
        assert_eq!(out.chars().count(), 1600);
        assert!(out.ends_with(NOTICE));
    }

    #[test]
    fn test_limit_always_respected() {
        for limit in [60usize, 100, 333, 1600] {
            for text in ["a\n\n".repeat(900), "¿".repeat(2000), "word ".repeat(700)] {
                let out = truncate_for_whatsapp(&text, limit, NOTICE);
                assert!(out.chars().count() <= limit, "limit {}", limit);
                assert!(out.ends_with(NOTICE));
            }
        }
    }

    #[test]
    fn test_decoration_precedes_truncation() {
        let config = PlatformConfig {
            whatsapp_max_chars: 120,
            ..PlatformConfig::default()
        };
        let out = format_for_platform(&"x ".repeat(200), Language::English, MessagePlatform::WhatsApp, &config);
        assert!(out.starts_with("🇬🇧 "));
        assert!(out.chars().count() <= 120);

        let web = format_for_platform("Hello", Language::German, MessagePlatform::Web, &config);
        assert_eq!(web, "🇩🇪 Hello");
    }

    #[test]
    fn test_flag_for_label() {
        assert_eq!(flag_for_label("inglés"), "🇬🇧");
        assert_eq!(flag_for_label("deutsch"), "🇩🇪");
        assert_eq!(flag_for_label("italiano"), "🇮🇹");
        assert_eq!(flag_for_label("klingon"), "🇪🇸");
    }

    #[test]
    fn test_clean_whatsapp_text() {
        assert_eq!(
            clean_whatsapp_text("  ¡Hola! 😀 ¿Precio   del ático #3?\n"),
            "¡Hola! ¿Precio del ático 3?"
        );
    }

    #[test]
    fn test_urgency() {
        assert!(is_urgent("Necesito respuesta URGENTE por favor"));
        assert!(is_urgent("call me now!"));
        assert!(!is_urgent("I know the area well"));
    }
}
