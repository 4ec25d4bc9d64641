//! Webhook endpoints for WhatsApp: Meta Cloud API (`/webhook`) and Twilio
//! (`/webhook/whatsapp`). Messages are answered in a background task so the
//! provider gets its acknowledgement immediately.

use axum::{
    extract::{Form, Query, State as AxumState},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::whatsapp_bot::{Channel, InboundMessage};
use crate::AppState;

const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Cloud API notification envelope; only the parts used for text messages.
#[derive(Debug, Default, Deserialize)]
struct CloudWebhookPayload {
    #[serde(default)]
    entry: Vec<CloudEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct CloudEntry {
    #[serde(default)]
    changes: Vec<CloudChange>,
}

#[derive(Debug, Default, Deserialize)]
struct CloudChange {
    #[serde(default)]
    value: CloudValue,
}

#[derive(Debug, Default, Deserialize)]
struct CloudValue {
    #[serde(default)]
    contacts: Vec<CloudContact>,
    #[serde(default)]
    messages: Vec<CloudMessage>,
}

#[derive(Debug, Deserialize)]
struct CloudContact {
    #[serde(default)]
    wa_id: Option<String>,
    #[serde(default)]
    profile: Option<CloudProfile>,
}

#[derive(Debug, Deserialize)]
struct CloudProfile {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<CloudText>,
}

#[derive(Debug, Deserialize)]
struct CloudText {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
pub struct TwilioForm {
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "Body")]
    body: String,
    #[serde(rename = "MessageSid")]
    message_sid: String,
    #[serde(rename = "ProfileName", default)]
    profile_name: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_cloud_webhook))
        .route("/webhook/whatsapp", post(receive_twilio_webhook))
        .route("/stats", get(stats))
}

async fn verify_webhook(
    AxumState(state): AxumState<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let expected = &state.config.whatsapp.verify_token;
    let token_ok = !expected.is_empty() && params.verify_token.as_deref() == Some(expected.as_str());

    if params.mode.as_deref() == Some("subscribe") && token_ok {
        tracing::info!("Webhook verified");
        return (StatusCode::OK, params.challenge.unwrap_or_default()).into_response();
    }

    tracing::warn!(mode = ?params.mode, "Webhook verification rejected");
    (StatusCode::FORBIDDEN, Json(json!({ "detail": "Token incorrecto" }))).into_response()
}

async fn receive_cloud_webhook(AxumState(state): AxumState<AppState>, body: String) -> Response {
    let payload: CloudWebhookPayload = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("Invalid webhook JSON: {}", e);
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "JSON inválido" })))
                .into_response();
        }
    };

    let messages = extract_text_messages(payload);
    tracing::info!(messages = messages.len(), "Cloud API webhook received");
    for message in messages {
        let bot = state.bot.clone();
        tokio::spawn(async move {
            bot.process(message).await;
        });
    }

    Json(json!({ "status": "ok" })).into_response()
}

/// Text messages with the fields needed to answer them; everything else is skipped.
fn extract_text_messages(payload: CloudWebhookPayload) -> Vec<InboundMessage> {
    let mut inbound = Vec::new();
    for change in payload.entry.into_iter().flat_map(|e| e.changes) {
        let CloudValue { contacts, messages } = change.value;
        for message in messages {
            if message.kind.as_deref() != Some("text") {
                tracing::debug!(kind = ?message.kind, "Skipping non-text message");
                continue;
            }
            let (Some(id), Some(from), Some(text)) = (message.id, message.from, message.text) else {
                tracing::warn!("Incomplete message in webhook payload");
                continue;
            };
            if text.body.trim().is_empty() {
                continue;
            }
            let name = contacts
                .iter()
                .find(|c| c.wa_id.as_deref() == Some(from.as_str()))
                .and_then(|c| c.profile.as_ref())
                .and_then(|p| p.name.clone());
            inbound.push(InboundMessage {
                id,
                from,
                name,
                body: text.body,
                channel: Channel::CloudApi,
            });
        }
    }
    inbound
}

async fn receive_twilio_webhook(
    AxumState(state): AxumState<AppState>,
    Form(form): Form<TwilioForm>,
) -> Response {
    if form.body.trim().is_empty() {
        tracing::debug!("Twilio message without text ignored");
    } else {
        let message = InboundMessage {
            id: form.message_sid,
            from: form.from,
            name: form.profile_name,
            body: form.body,
            channel: Channel::Twilio,
        };
        let bot = state.bot.clone();
        tokio::spawn(async move {
            bot.process(message).await;
        });
    }

    ([(header::CONTENT_TYPE, "application/xml")], EMPTY_TWIML).into_response()
}

async fn stats(AxumState(state): AxumState<AppState>) -> Json<serde_json::Value> {
    let stats = state.bot.stats();
    Json(json!({
        "conversaciones_totales": stats.conversaciones_totales,
        "mensajes_totales": stats.mensajes_totales,
        "mensajes_procesados": stats.mensajes_en_cache,
        "agente_status": if state.agent.is_available() { "activo" } else { "inactivo" },
        "top_conversaciones": stats.top_conversaciones,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::test_support::{ready_agent, RecordingSender};
    use crate::whatsapp_bot::WhatsAppBot;
    use crate::build_router;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn state_with_sender(dir: &std::path::Path, sender: Arc<RecordingSender>) -> AppState {
        let agent = ready_agent(dir, "Tenemos varias villas disponibles.").await;
        let mut config = ServerConfig::default();
        config.whatsapp.verify_token = "secreto".to_string();
        AppState {
            bot: Arc::new(WhatsAppBot::with_senders(agent.clone(), 500, Some(sender.clone()), Some(sender))),
            agent,
            config: Arc::new(config),
        }
    }

    fn cloud_payload(id: &str, kind: &str) -> serde_json::Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "contacts": [{"profile": {"name": "Ana"}, "wa_id": "34600111222"}],
                        "messages": [{
                            "from": "34600111222",
                            "id": id,
                            "timestamp": "1700000000",
                            "type": kind,
                            "text": {"body": "¿Precio de una casa?"}
                        }]
                    }
                }]
            }]
        })
    }

    async fn wait_for_sends(sender: &RecordingSender, expected: usize) {
        for _ in 0..100 {
            if sender.sent().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_verification_echoes_challenge() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state_with_sender(dir.path(), Arc::default()).await);

        let ok = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=secreto&hub.challenge=1158201444")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(ok.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"1158201444");

        let bad = app
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=otro&hub.challenge=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state_with_sender(dir.path(), Arc::default()).await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"entry\": ["))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_redelivered_cloud_message_answered_once() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(RecordingSender::default());
        let app = build_router(state_with_sender(dir.path(), sender.clone()).await);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/webhook")
                        .header("content-type", "application/json")
                        .body(Body::from(cloud_payload("wamid.XYZ", "text").to_string()))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        wait_for_sends(&sender, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "34600111222");
    }

    #[tokio::test]
    async fn test_twilio_webhook_returns_empty_twiml() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(RecordingSender::default());
        let app = build_router(state_with_sender(dir.path(), sender.clone()).await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/whatsapp")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "From=whatsapp%3A%2B34600111222&Body=Hola&MessageSid=SM123&ProfileName=Ana",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("<Response></Response>"));

        wait_for_sends(&sender, 1).await;
        assert_eq!(sender.sent()[0].0, "+34600111222");
    }

    #[test]
    fn test_only_complete_text_messages_extracted() {
        let text: CloudWebhookPayload = serde_json::from_value(cloud_payload("wamid.1", "text")).unwrap();
        let messages = extract_text_messages(text);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].name.as_deref(), Some("Ana"));

        let image: CloudWebhookPayload = serde_json::from_value(cloud_payload("wamid.2", "image")).unwrap();
        assert!(extract_text_messages(image).is_empty());

        let status_only: CloudWebhookPayload =
            serde_json::from_value(json!({"entry": [{"changes": [{"value": {"statuses": []}}]}]})).unwrap();
        assert!(extract_text_messages(status_only).is_empty());
    }
}
