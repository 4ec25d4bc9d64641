//! Prompt assembly for the real-estate persona.
//!
//! Sections, in order: persona, language constraint, platform formatting
//! rules, optional tone hints (urgency, mood), retrieved context, recent history, and the
//! client's question. The question is appended last and untouched so that
//! `ComposedPrompt::question` can recover it byte for byte.

use crate::rag::language::Language;
use crate::rag::sentiment::Sentiment;
use crate::search::SearchHit;
use crate::types::{ConversationMessage, MessagePlatform};

pub const AGENCY_NAME: &str = "Inmobiliaria Terramagna";

/// Everything the composer needs for one turn.
pub struct PromptInput<'a> {
    pub question: &'a str,
    pub language: Language,
    pub platform: MessagePlatform,
    pub urgent: bool,
    pub sentiment: Sentiment,
    pub context: &'a [SearchHit],
    pub history: &'a [ConversationMessage],
    /// WhatsApp character budget quoted in the formatting rules.
    pub whatsapp_max_chars: usize,
}

#[derive(Debug, Clone)]
pub struct ComposedPrompt {
    pub text: String,
    question_start: usize,
}

impl ComposedPrompt {
    /// The client's question exactly as it was passed in.
    pub fn question(&self) -> &str {
        &self.text[self.question_start..]
    }
}

struct Phrases {
    persona: &'static str,
    language_rule: &'static str,
    whatsapp_rules: &'static str,
    web_rules: &'static str,
    urgent_hint: &'static str,
    frustrated_hint: &'static str,
    positive_hint: &'static str,
    context_header: &'static str,
    no_context: &'static str,
    history_header: &'static str,
    client: &'static str,
    agent: &'static str,
    question_label: &'static str,
}

fn phrases(language: Language) -> Phrases {
    match language {
        Language::English => Phrases {
            persona: "You are a professional, elegant and very friendly real estate agent at {agency}, replying via {channel}. Always answer clearly, in a warm and professional tone.",
            language_rule: "IMPORTANT: You must respond COMPLETELY in English.",
            whatsapp_rules: "WHATSAPP FORMAT: at most {max} characters, use *bold* for key facts, short paragraphs separated by blank lines, prices written clearly with € or $. End with a friendly call to action.",
            web_rules: "WEB FORMAT: complete and detailed answer, markdown is welcome, lists and links are allowed. Be thorough in your explanations.",
            urgent_hint: "The client needs a prompt answer: get straight to the point.",
            frustrated_hint: "The client seems frustrated: respond with empathy and reassurance.",
            positive_hint: "The client is in a positive mood: respond with enthusiasm.",
            context_header: "Information from our property files:",
            no_context: "No property files are available; answer from general real-estate knowledge and offer to put the client in touch with an agent.",
            history_header: "Recent conversation:",
            client: "Client",
            agent: "Agent",
            question_label: "Client question:",
        },
        Language::German => Phrases {
            persona: "Sie sind ein professioneller, eleganter und sehr freundlicher Immobilienmakler bei {agency} und antworten über {channel}. Antworten Sie immer klar und in einem warmen, professionellen Ton.",
            language_rule: "WICHTIG: Sie müssen VOLLSTÄNDIG auf Deutsch antworten.",
            whatsapp_rules: "WHATSAPP-FORMAT: höchstens {max} Zeichen, *fett* für wichtige Angaben, kurze Absätze mit Leerzeilen, Preise klar mit € oder $. Schließen Sie mit einer freundlichen Handlungsaufforderung.",
            web_rules: "WEB-FORMAT: vollständige und ausführliche Antwort, Markdown ist erlaubt, ebenso Listen und Links. Erklären Sie gründlich.",
            urgent_hint: "Der Kunde braucht eine schnelle Antwort: kommen Sie direkt zur Sache.",
            frustrated_hint: "Der Kunde wirkt frustriert: antworten Sie mit Einfühlungsvermögen.",
            positive_hint: "Der Kunde ist positiv gestimmt: antworten Sie mit Begeisterung.",
            context_header: "Informationen aus unseren Objektunterlagen:",
            no_context: "Es liegen keine Objektunterlagen vor; antworten Sie mit allgemeinem Immobilienwissen und bieten Sie den Kontakt zu einem Makler an.",
            history_header: "Bisheriges Gespräch:",
            client: "Kunde",
            agent: "Makler",
            question_label: "Kundenfrage:",
        },
        Language::Russian => Phrases {
            persona: "Вы профессиональный, элегантный и очень доброжелательный агент по недвижимости в {agency}, отвечающий через {channel}. Всегда отвечайте ясно, тепло и профессионально.",
            language_rule: "ВАЖНО: отвечайте ПОЛНОСТЬЮ на русском языке.",
            whatsapp_rules: "ФОРМАТ WHATSAPP: не более {max} символов, *жирный* для важного, короткие абзацы через пустую строку, цены указывайте чётко в € или $. В конце дружелюбный призыв к действию.",
            web_rules: "ФОРМАТ WEB: полный и подробный ответ, можно использовать markdown, списки и ссылки. Объясняйте обстоятельно.",
            urgent_hint: "Клиенту нужен быстрый ответ: переходите сразу к сути.",
            frustrated_hint: "Клиент, похоже, расстроен: отвечайте с сочувствием.",
            positive_hint: "Клиент настроен позитивно: отвечайте с энтузиазмом.",
            context_header: "Информация из наших объектов:",
            no_context: "Описания объектов недоступны; отвечайте на основе общих знаний о недвижимости и предложите связаться с агентом.",
            history_header: "Недавний разговор:",
            client: "Клиент",
            agent: "Агент",
            question_label: "Вопрос клиента:",
        },
        Language::French => Phrases {
            persona: "Vous êtes un agent immobilier professionnel, élégant et très aimable chez {agency}, qui répond via {channel}. Répondez toujours clairement, sur un ton chaleureux et professionnel.",
            language_rule: "IMPORTANT : vous devez répondre ENTIÈREMENT en français.",
            whatsapp_rules: "FORMAT WHATSAPP : {max} caractères maximum, *gras* pour les points clés, paragraphes courts séparés par une ligne vide, prix clairs en € ou $. Terminez par un appel à l'action chaleureux.",
            web_rules: "FORMAT WEB : réponse complète et détaillée, le markdown, les listes et les liens sont permis. Soyez exhaustif.",
            urgent_hint: "Le client a besoin d'une réponse rapide : allez droit au but.",
            frustrated_hint: "Le client semble frustré : répondez avec empathie.",
            positive_hint: "Le client est de bonne humeur : répondez avec enthousiasme.",
            context_header: "Informations tirées de nos fiches de biens :",
            no_context: "Aucune fiche de bien n'est disponible ; répondez avec vos connaissances générales de l'immobilier et proposez un contact avec un agent.",
            history_header: "Conversation récente :",
            client: "Client",
            agent: "Agent",
            question_label: "Question du client :",
        },
        Language::Italian => Phrases {
            persona: "Sei un agente immobiliare professionale, elegante e molto cordiale di {agency} che risponde tramite {channel}. Rispondi sempre con chiarezza, con un tono caloroso e professionale.",
            language_rule: "IMPORTANTE: devi rispondere COMPLETAMENTE in italiano.",
            whatsapp_rules: "FORMATO WHATSAPP: massimo {max} caratteri, *grassetto* per le informazioni chiave, paragrafi brevi separati da righe vuote, prezzi chiari in € o $. Concludi con un invito all'azione cordiale.",
            web_rules: "FORMATO WEB: risposta completa e dettagliata, puoi usare markdown, elenchi e link. Sii esauriente.",
            urgent_hint: "Il cliente ha bisogno di una risposta rapida: vai dritto al punto.",
            frustrated_hint: "Il cliente sembra frustrato: rispondi con empatia.",
            positive_hint: "Il cliente è di buon umore: rispondi con entusiasmo.",
            context_header: "Informazioni dalle nostre schede immobili:",
            no_context: "Non ci sono schede immobili disponibili; rispondi con conoscenze generali del settore e offri il contatto con un agente.",
            history_header: "Conversazione recente:",
            client: "Cliente",
            agent: "Agente",
            question_label: "Domanda del cliente:",
        },
        Language::Spanish => Phrases {
            persona: "Eres una agente inmobiliaria profesional, elegante y muy amable de {agency} respondiendo por {channel}. Responde siempre con claridad y en un tono cálido y profesional.",
            language_rule: "IMPORTANTE: Debes responder COMPLETAMENTE en español.",
            whatsapp_rules: "FORMATO WHATSAPP: máximo {max} caracteres, usa *negritas* para los datos importantes, párrafos cortos separados por líneas en blanco, precios claros con € o $. Al final incluye una llamada a la acción amigable.",
            web_rules: "FORMATO WEB: respuesta completa y detallada, usa markdown si es apropiado, puedes incluir listas y enlaces. Sé exhaustiva en las explicaciones.",
            urgent_hint: "El cliente necesita una respuesta rápida: ve directo al grano.",
            frustrated_hint: "El cliente parece frustrado: responde con empatía.",
            positive_hint: "El cliente se muestra positivo: responde con entusiasmo.",
            context_header: "Información de nuestras fichas de propiedades:",
            no_context: "No hay fichas de propiedades disponibles; responde con conocimiento general del sector y ofrece poner al cliente en contacto con una agente.",
            history_header: "Conversación reciente:",
            client: "Cliente",
            agent: "Agente",
            question_label: "Pregunta del cliente:",
        },
    }
}

pub fn compose(input: &PromptInput<'_>) -> ComposedPrompt {
    let p = phrases(input.language);
    let channel = match input.platform {
        MessagePlatform::WhatsApp => "WhatsApp",
        MessagePlatform::Web => "web",
    };

    let mut text = String::new();
    text.push_str(
        &p.persona
            .replace("{agency}", AGENCY_NAME)
            .replace("{channel}", channel),
    );
    text.push('\n');
    text.push_str(p.language_rule);
    text.push('\n');
    match input.platform {
        MessagePlatform::WhatsApp => {
            text.push_str(&p.whatsapp_rules.replace("{max}", &input.whatsapp_max_chars.to_string()))
        }
        MessagePlatform::Web => text.push_str(p.web_rules),
    }
    text.push_str("\n\n");

    if input.urgent {
        text.push_str(p.urgent_hint);
        text.push_str("\n\n");
    }
    let mood_hint = match input.sentiment {
        Sentiment::Frustrated => Some(p.frustrated_hint),
        Sentiment::Positive => Some(p.positive_hint),
        Sentiment::Neutral => None,
    };
    if let Some(hint) = mood_hint {
        text.push_str(hint);
        text.push_str("\n\n");
    }

    if input.context.is_empty() {
        text.push_str(p.no_context);
        text.push_str("\n\n");
    } else {
        text.push_str(p.context_header);
        text.push('\n');
        for (i, hit) in input.context.iter().enumerate() {
            text.push_str(&format!("[{}] ({})\n", i + 1, hit.chunk.source));
            text.push_str(&hit.chunk.text);
            text.push_str("\n\n");
        }
    }

    if !input.history.is_empty() {
        text.push_str(p.history_header);
        text.push('\n');
        for message in input.history {
            let speaker = if message.role == "user" { p.client } else { p.agent };
            text.push_str(&format!("{}: {}\n", speaker, message.content));
        }
        text.push('\n');
    }

    text.push_str(p.question_label);
    text.push(' ');
    let question_start = text.len();
    text.push_str(input.question);

    ComposedPrompt {
        text,
        question_start,
    }
}
