//! WhatsApp Bot integration with the real-estate agent
//! Handles duplicate deliveries, per-contact statistics and outbound replies
//! through the Meta Cloud API or Twilio.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use terramagna_rag::{RealEstateAgent, SeenMessages};

use crate::config::{CloudApiConfig, ServerConfig, TwilioConfig};

const EMPTY_REPLY_FALLBACK: &str = "❌ No pude procesar tu mensaje. Intenta nuevamente.";

/// Provider that delivered an inbound message; replies go back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    CloudApi,
    Twilio,
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Provider message id (`wamid...` or Twilio `MessageSid`).
    pub id: String,
    pub from: String,
    pub name: Option<String>,
    pub body: String,
    pub channel: Channel,
}

/// Outbound text delivery.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;
}

pub struct CloudApiSender {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl CloudApiSender {
    pub fn new(config: &CloudApiConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            endpoint: format!(
                "{}/{}/messages",
                config.api_base.trim_end_matches('/'),
                config.phone_number_id
            ),
            access_token: config.access_token.clone(),
        })
    }
}

#[async_trait]
impl MessageSender for CloudApiSender {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": {"body": body}
            }))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.endpoint))?;

        ensure_success(response, "WhatsApp Cloud API").await
    }
}

pub struct TwilioSender {
    client: reqwest::Client,
    endpoint: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioSender {
    pub fn new(config: &TwilioConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            endpoint: format!(
                "{}/Accounts/{}/Messages.json",
                config.api_base.trim_end_matches('/'),
                config.account_sid
            ),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from: whatsapp_address(&config.whatsapp_number),
        })
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let to = whatsapp_address(to);
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", self.from.as_str()), ("To", to.as_str()), ("Body", body)])
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.endpoint))?;

        ensure_success(response, "Twilio").await
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(15))
        .build()
        .context("Failed to build HTTP client")
}

async fn ensure_success(response: reqwest::Response, provider: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    let preview: String = body.chars().take(300).collect();
    Err(anyhow!("{} error ({}): {}", provider, status, preview))
}

/// `whatsapp:+34600...` as Twilio expects it.
fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{}", number)
    }
}

/// Phone number without the provider prefix.
pub fn normalize_phone(number: &str) -> &str {
    number.trim().trim_start_matches("whatsapp:")
}

/// Only the last four digits survive, for logs and public stats.
pub fn mask_phone(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(|c| c.is_ascii_digit()).collect();
    let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
    format!("****{}", tail)
}

#[derive(Debug, Clone)]
struct ContactStats {
    name: Option<String>,
    messages: u64,
    last_message: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub numero: String,
    pub mensajes: u64,
    pub ultimo_contacto: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotStats {
    pub conversaciones_totales: usize,
    pub mensajes_totales: u64,
    pub mensajes_en_cache: usize,
    pub top_conversaciones: Vec<ConversationSummary>,
}

/// WhatsApp Bot State
pub struct WhatsAppBot {
    agent: Arc<RealEstateAgent>,
    seen: SeenMessages,
    contacts: DashMap<String, ContactStats>,
    /// Contacts silent for longer than this are dropped from the stats.
    contact_ttl: TimeDelta,
    cloud: Option<Arc<dyn MessageSender>>,
    twilio: Option<Arc<dyn MessageSender>>,
}

impl WhatsAppBot {
    /// Wire up whichever providers have credentials configured.
    pub fn new(agent: Arc<RealEstateAgent>, config: &ServerConfig) -> Result<Self> {
        let cloud = if config.whatsapp.is_configured() {
            Some(Arc::new(CloudApiSender::new(&config.whatsapp)?) as Arc<dyn MessageSender>)
        } else {
            tracing::warn!("WhatsApp Cloud API credentials missing, replies will not be sent");
            None
        };
        let twilio = if config.twilio.is_configured() {
            Some(Arc::new(TwilioSender::new(&config.twilio)?) as Arc<dyn MessageSender>)
        } else {
            tracing::info!("Twilio credentials not configured");
            None
        };
        Ok(Self::with_senders(agent, config.dedup_capacity, cloud, twilio))
    }

    pub fn with_senders(
        agent: Arc<RealEstateAgent>,
        dedup_capacity: usize,
        cloud: Option<Arc<dyn MessageSender>>,
        twilio: Option<Arc<dyn MessageSender>>,
    ) -> Self {
        let contact_ttl = i64::try_from(agent.config().memory.session_ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            agent,
            seen: SeenMessages::new(dedup_capacity),
            contacts: DashMap::new(),
            contact_ttl,
            cloud,
            twilio,
        }
    }

    pub fn cloud_configured(&self) -> bool {
        self.cloud.is_some()
    }

    pub fn twilio_configured(&self) -> bool {
        self.twilio.is_some()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Answer one inbound message and send the reply back through its channel.
    /// Returns the reply, or `None` when the message id was already handled.
    pub async fn process(&self, message: InboundMessage) -> Option<String> {
        if !self.seen.first_delivery(&message.id) {
            tracing::info!(id = %message.id, "Duplicate delivery ignored");
            return None;
        }

        let phone = normalize_phone(&message.from).to_string();
        let masked = mask_phone(&phone);
        let preview: String = message.body.chars().take(50).collect();
        tracing::info!(from = %masked, channel = ?message.channel, "Processing message: {}", preview);

        let mut reply = self.agent.answer_whatsapp(&message.body, &phone).await;
        if reply.trim().is_empty() {
            reply = EMPTY_REPLY_FALLBACK.to_string();
        }

        self.contacts
            .entry(phone.clone())
            .and_modify(|c| {
                c.messages += 1;
                c.last_message = Utc::now();
                if message.name.is_some() {
                    c.name = message.name.clone();
                }
            })
            .or_insert_with(|| ContactStats {
                name: message.name.clone(),
                messages: 1,
                last_message: Utc::now(),
            });

        let sender = match message.channel {
            Channel::CloudApi => self.cloud.as_ref(),
            Channel::Twilio => self.twilio.as_ref(),
        };
        match sender {
            Some(sender) => match sender.send_text(&phone, &reply).await {
                Ok(()) => tracing::info!(to = %masked, chars = reply.chars().count(), "Reply sent"),
                Err(e) => tracing::error!(to = %masked, "Failed to send reply: {:#}", e),
            },
            None => tracing::warn!(channel = ?message.channel, "No sender configured, reply dropped"),
        }

        Some(reply)
    }

    /// Forget contacts idle for longer than the conversation TTL.
    pub fn purge_inactive(&self) -> usize {
        self.purge_inactive_at(Utc::now())
    }

    fn purge_inactive_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.contacts.len();
        self.contacts
            .retain(|_, contact| now - contact.last_message <= self.contact_ttl);
        before.saturating_sub(self.contacts.len())
    }

    pub fn stats(&self) -> BotStats {
        let mut contacts: Vec<(String, ContactStats)> = self
            .contacts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        contacts.sort_by(|a, b| {
            b.1.messages
                .cmp(&a.1.messages)
                .then_with(|| b.1.last_message.cmp(&a.1.last_message))
        });

        BotStats {
            conversaciones_totales: contacts.len(),
            mensajes_totales: contacts.iter().map(|(_, c)| c.messages).sum(),
            mensajes_en_cache: self.seen.len(),
            top_conversaciones: contacts
                .iter()
                .take(5)
                .map(|(phone, c)| ConversationSummary {
                    numero: mask_phone(phone),
                    mensajes: c.messages,
                    ultimo_contacto: c.last_message,
                })
                .collect(),
        }
    }
}
