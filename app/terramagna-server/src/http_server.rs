//! Web API: question endpoints, capability report and health.

use axum::{
    extract::{Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use terramagna_rag::{
    validate_question, AgentReport, AgentRequest, AgentStatus, InputError, MessagePlatform,
};

use crate::AppState;

/// Conversation key used by `/test`, so trial messages share one session.
const TEST_PHONE: &str = "+34600000000";

/// Handler errors, rendered as `{"detail": ...}` with a matching status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("El agente no está disponible. Error: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<InputError> for ApiError {
    fn from(e: InputError) -> Self {
        match e {
            InputError::Empty => ApiError::BadRequest("La pregunta no puede estar vacía.".to_string()),
            InputError::TooLong { max, .. } => ApiError::BadRequest(format!(
                "La pregunta es demasiado larga (máximo {} caracteres).",
                max
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PreguntarParams {
    pregunta: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    mensaje: String,
}

#[derive(Debug, Deserialize)]
pub struct ConversarRequest {
    pregunta: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TestRequest {
    #[serde(default)]
    mensaje: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    respuesta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    agent: AgentReport,
    whatsapp_configurado: bool,
    twilio_configurado: bool,
    mensajes_en_cache: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/preguntar", get(preguntar))
        .route("/chat", post(chat))
        .route("/conversar", post(conversar))
        .route("/propiedades", get(propiedades))
        .route("/test", post(trial_whatsapp_reply))
}

fn degraded_reason(state: &AppState) -> Option<String> {
    match state.agent.status() {
        AgentStatus::Ready => None,
        AgentStatus::Degraded(reason) => Some(reason.to_string()),
    }
}

fn ensure_available(state: &AppState) -> Result<(), ApiError> {
    match degraded_reason(state) {
        None => Ok(()),
        Some(reason) => Err(ApiError::Unavailable(reason)),
    }
}

fn checked_question<'a>(state: &AppState, text: &'a str) -> Result<&'a str, ApiError> {
    ensure_available(state)?;
    Ok(validate_question(text, state.agent.config().limits.max_question_chars)?)
}

async fn root(AxumState(state): AxumState<AppState>) -> Json<serde_json::Value> {
    let available = state.agent.is_available();
    let label = if available { "funcionando" } else { "sin agente" };
    Json(json!({
        "mensaje": format!("API Inmobiliaria IA {}.", label),
        "agente_disponible": available,
        "error_inicializacion": degraded_reason(&state),
    }))
}

async fn status(AxumState(state): AxumState<AppState>) -> Json<serde_json::Value> {
    let body = StatusResponse {
        agent: state.agent.report(),
        whatsapp_configurado: state.bot.cloud_configured(),
        twilio_configurado: state.bot.twilio_configured(),
        mensajes_en_cache: state.bot.seen_count(),
    };
    Json(serde_json::to_value(body).unwrap_or_else(|e| json!({ "error": e.to_string() })))
}

async fn health(AxumState(state): AxumState<AppState>) -> Json<serde_json::Value> {
    let available = state.agent.is_available();
    Json(json!({
        "status": if available { "healthy" } else { "degraded" },
        "agente": available,
        "whatsapp_configurado": state.bot.cloud_configured() || state.bot.twilio_configured(),
        "conversaciones_activas": state.agent.sessions().len(),
        "mensajes_en_cache": state.bot.seen_count(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn preguntar(
    AxumState(state): AxumState<AppState>,
    Query(params): Query<PreguntarParams>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let question = checked_question(&state, &params.pregunta)?;
    let respuesta = state.agent.answer_web(question).await;
    Ok(Json(AnswerResponse {
        respuesta,
        session_id: None,
    }))
}

async fn chat(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let question = checked_question(&state, &request.mensaje)?;
    let respuesta = state.agent.answer_web(question).await;
    Ok(Json(AnswerResponse {
        respuesta,
        session_id: None,
    }))
}

async fn conversar(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<ConversarRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let question = checked_question(&state, &request.pregunta)?;
    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let response = state
        .agent
        .answer(AgentRequest {
            question: question.to_string(),
            platform: MessagePlatform::Web,
            session_id: Some(session_id.clone()),
        })
        .await;

    Ok(Json(AnswerResponse {
        respuesta: response.formatted,
        session_id: Some(session_id),
    }))
}

async fn propiedades(
    AxumState(state): AxumState<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let propiedades = state.agent.list_properties().map_err(|e| {
        tracing::error!("Failed to list properties: {:#}", e);
        ApiError::Internal("No se pudieron listar las propiedades.".to_string())
    })?;
    Ok(Json(json!({ "propiedades": propiedades })))
}

/// Runs a message through the WhatsApp path without sending anything.
async fn trial_whatsapp_reply(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<TestRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mensaje = request.mensaje.trim();
    if mensaje.is_empty() {
        return Err(ApiError::BadRequest("Mensaje requerido".to_string()));
    }
    if mensaje.chars().count() > state.agent.config().limits.max_question_chars {
        return Err(ApiError::BadRequest("Mensaje demasiado largo".to_string()));
    }
    ensure_available(&state)?;

    let respuesta = state.agent.answer_whatsapp(mensaje, TEST_PHONE).await;
    Ok(Json(json!({
        "pregunta": mensaje,
        "chars_respuesta": respuesta.chars().count(),
        "respuesta": respuesta,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ready_agent;
    use crate::{build_router, AppState};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use terramagna_rag::{AgentConfig, RealEstateAgent};
    use tower::ServiceExt;

    use crate::config::ServerConfig;
    use crate::whatsapp_bot::WhatsAppBot;

    fn state_for(agent: Arc<RealEstateAgent>) -> AppState {
        AppState {
            bot: Arc::new(WhatsAppBot::with_senders(agent.clone(), 500, None, None)),
            agent,
            config: Arc::new(ServerConfig::default()),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_answers_with_flag() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state_for(ready_agent(dir.path(), "We have three villas.").await));

        let response = app
            .oneshot(post_json("/chat", json!({"mensaje": "What properties do you have?"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["respuesta"], "🇬🇧 We have three villas.");
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state_for(ready_agent(dir.path(), "ok").await));

        let response = app
            .oneshot(post_json("/chat", json!({"mensaje": "   "})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["detail"], "La pregunta no puede estar vacía.");
    }

    #[tokio::test]
    async fn test_overlong_question_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state_for(ready_agent(dir.path(), "ok").await));
        let long = "casa ".repeat(300);

        let response = app
            .oneshot(post_json("/chat", json!({ "mensaje": long })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_degraded_agent_returns_503() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig {
            knowledge_dir: dir.path().to_path_buf(),
            ..AgentConfig::default()
        };
        let agent = Arc::new(RealEstateAgent::from_config(config).await);
        let app = build_router(state_for(agent));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/preguntar?pregunta=Hola")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.contains("OPENAI_API_KEY"));

        let health = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(health).await["status"], "degraded");
    }

    #[tokio::test]
    async fn test_conversar_assigns_and_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let agent = ready_agent(dir.path(), "Claro.").await;
        let app = build_router(state_for(agent.clone()));

        let first = app
            .clone()
            .oneshot(post_json("/conversar", json!({"pregunta": "Busco un piso"})))
            .await
            .unwrap();
        let session_id = body_json(first).await["session_id"].as_str().unwrap().to_string();
        assert_eq!(session_id.len(), 36);

        let second = app
            .oneshot(post_json(
                "/conversar",
                json!({"pregunta": "¿Y el precio?", "session_id": session_id}),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(second).await["session_id"], session_id.as_str());
        assert_eq!(agent.sessions().history(&session_id).await.len(), 4);
    }

    #[tokio::test]
    async fn test_whatsapp_trial_reports_reply_length() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state_for(ready_agent(dir.path(), "We have three villas.").await));

        let response = app
            .clone()
            .oneshot(post_json("/test", json!({"mensaje": "What properties do you have?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let respuesta = body["respuesta"].as_str().unwrap();
        assert_eq!(respuesta, "🇬🇧 We have three villas.");
        assert_eq!(body["chars_respuesta"], respuesta.chars().count());
        assert_eq!(body["pregunta"], "What properties do you have?");

        let empty = app
            .clone()
            .oneshot(post_json("/test", json!({"mensaje": "  "})))
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(empty).await["detail"], "Mensaje requerido");

        let long = app
            .oneshot(post_json("/test", json!({ "mensaje": "casa ".repeat(300) })))
            .await
            .unwrap();
        assert_eq!(long.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(long).await["detail"], "Mensaje demasiado largo");
    }

    #[tokio::test]
    async fn test_root_status_and_properties() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("villa_los_cristianos.txt"), "Villa con vistas al mar en Los Cristianos.").unwrap();
        let app = build_router(state_for(ready_agent(dir.path(), "ok").await));

        let root = body_json(
            app.clone()
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(root["agente_disponible"], true);
        assert!(root["error_inicializacion"].is_null());

        let status = body_json(
            app.clone()
                .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(status["available"], true);
        assert_eq!(status["documents"], 1);
        assert_eq!(status["whatsapp_configurado"], false);

        let properties = body_json(
            app.oneshot(Request::builder().uri("/propiedades").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(properties["propiedades"], json!(["villa los cristianos"]));
    }
}
