//! Server-side settings: listen port, CORS origins and messaging credentials.
//! Agent settings live in `terramagna_rag::AgentConfig`.

use std::path::PathBuf;
use terramagna_rag::AgentConfig;

const DEFAULT_ORIGINS: &[&str] = &[
    "https://tenerifemy.com",
    "https://www.tenerifemy.com",
    "https://www.terramagna.net",
    "http://localhost:5500",
    "http://localhost:3000",
    "http://localhost:8080",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub whatsapp: CloudApiConfig,
    pub twilio: TwilioConfig,
    /// Inbound message ids remembered for duplicate detection.
    pub dedup_capacity: usize,
}

/// Meta WhatsApp Cloud API.
#[derive(Debug, Clone)]
pub struct CloudApiConfig {
    pub verify_token: String,
    pub access_token: String,
    pub phone_number_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number, with or without the `whatsapp:` prefix.
    pub whatsapp_number: String,
    pub api_base: String,
}

impl CloudApiConfig {
    pub fn is_configured(&self) -> bool {
        !self.access_token.is_empty() && !self.phone_number_id.is_empty()
    }
}

impl TwilioConfig {
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.whatsapp_number.is_empty()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            allowed_origins: DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect(),
            whatsapp: CloudApiConfig {
                verify_token: String::new(),
                access_token: String::new(),
                phone_number_id: String::new(),
                api_base: "https://graph.facebook.com/v18.0".to_string(),
            },
            twilio: TwilioConfig {
                account_sid: String::new(),
                auth_token: String::new(),
                whatsapp_number: String::new(),
                api_base: "https://api.twilio.com/2010-04-01".to_string(),
            },
            dedup_capacity: 500,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let text = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(port) = text("PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(origins) = text("ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(v) = text("WHATSAPP_VERIFY_TOKEN") {
            config.whatsapp.verify_token = v;
        }
        if let Some(v) = text("WHATSAPP_ACCESS_TOKEN") {
            config.whatsapp.access_token = v;
        }
        if let Some(v) = text("WHATSAPP_PHONE_NUMBER_ID") {
            config.whatsapp.phone_number_id = v;
        }
        if let Some(v) = text("TWILIO_ACCOUNT_SID") {
            config.twilio.account_sid = v;
        }
        if let Some(v) = text("TWILIO_AUTH_TOKEN") {
            config.twilio.auth_token = v;
        }
        if let Some(v) = text("TWILIO_WHATSAPP_NUMBER") {
            config.twilio.whatsapp_number = v;
        }
        config
    }
}

/// Agent settings: the JSON file named by `TERRAMAGNA_CONFIG` (if any),
/// then environment overrides.
pub fn load_agent_config() -> AgentConfig {
    let mut config = match std::env::var("TERRAMAGNA_CONFIG").ok().map(PathBuf::from) {
        Some(path) => match AgentConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!("Loaded agent config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Using default agent config: {}", e);
                AgentConfig::default()
            }
        },
        None => AgentConfig::default(),
    };
    config.apply_env();
    config
}
