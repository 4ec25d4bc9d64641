use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

use crate::config::BusinessHoursConfig;
use crate::rag::language::Language;

/// Whether `now` (local time) falls inside the configured opening hours.
pub fn is_open(config: &BusinessHoursConfig, now: NaiveDateTime) -> bool {
    if config.weekdays_only && matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    (config.open_hour..config.close_hour).contains(&now.hour())
}

/// Automatic reply sent instead of a model answer outside opening hours.
pub fn out_of_hours_reply(language: Language, config: &BusinessHoursConfig) -> String {
    let hours = format!("{}:00-{}:00", config.open_hour, config.close_hour);
    match language {
        Language::English => {
            let days = if config.weekdays_only { "Monday to Friday" } else { "Every day" };
            format!(
                "Hello! Thank you for contacting us. 🏠\n\n\
                 We're currently outside business hours, but we'll reply to your message first thing tomorrow.\n\n\
                 ⏰ *Business hours:* {} {}\n\n\
                 For urgent matters, write *URGENT* in your message.\n\n\
                 Thank you for your patience! 😊",
                days, hours
            )
        }
        Language::German => {
            let days = if config.weekdays_only { "Montag bis Freitag" } else { "Täglich" };
            format!(
                "Hallo! Vielen Dank für Ihre Nachricht. 🏠\n\n\
                 Wir sind derzeit außerhalb der Geschäftszeiten, antworten Ihnen aber morgen früh als Erstes.\n\n\
                 ⏰ *Geschäftszeiten:* {} {}\n\n\
                 Bei dringenden Anliegen schreiben Sie bitte *NOTFALL* in Ihre Nachricht.\n\n\
                 Vielen Dank für Ihr Verständnis! 😊",
                days, hours
            )
        }
        Language::Russian => {
            let days = if config.weekdays_only { "с понедельника по пятницу" } else { "ежедневно" };
            format!(
                "Здравствуйте! Спасибо за обращение. 🏠\n\n\
                 Сейчас нерабочее время, но мы ответим вам завтра в первую очередь.\n\n\
                 ⏰ *Часы работы:* {} {}\n\n\
                 Если вопрос срочный, напишите *URGENT* в сообщении.\n\n\
                 Спасибо за терпение! 😊",
                days, hours
            )
        }
        Language::French => {
            let days = if config.weekdays_only { "Du lundi au vendredi" } else { "Tous les jours" };
            format!(
                "Bonjour ! Merci de nous avoir contactés. 🏠\n\n\
                 Nous sommes actuellement fermés, mais nous répondrons à votre message dès demain matin.\n\n\
                 ⏰ *Horaires :* {} {}\n\n\
                 Pour une demande urgente, écrivez *URGENT* dans votre message.\n\n\
                 Merci de votre patience ! 😊",
                days, hours
            )
        }
        Language::Italian => {
            let days = if config.weekdays_only { "Dal lunedì al venerdì" } else { "Tutti i giorni" };
            format!(
                "Ciao! Grazie per averci contattato. 🏠\n\n\
                 Siamo fuori dall'orario di lavoro, ma risponderemo al tuo messaggio domattina per primo.\n\n\
                 ⏰ *Orario:* {} {}\n\n\
                 Per questioni urgenti, scrivi *URGENTE* nel messaggio.\n\n\
                 Grazie per la pazienza! 😊",
                days, hours
            )
        }
        Language::Spanish => {
            let days = if config.weekdays_only { "Lunes a Viernes" } else { "Todos los días" };
            format!(
                "¡Hola! Gracias por contactarnos. 🏠\n\n\
                 Estamos fuera del horario comercial, pero responderemos tu mensaje a primera hora mañana.\n\n\
                 ⏰ *Horario:* {} {}\n\n\
                 Para asuntos urgentes, escribe *URGENTE* en tu mensaje.\n\n\
                 ¡Gracias por tu paciencia! 😊",
                days, hours
            )
        }
    }
}
