mod config;
mod http_server;
mod whatsapp_bot;
mod whatsapp_http_server;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use terramagna_rag::RealEstateAgent;

pub use config::{load_agent_config, ServerConfig};
pub use whatsapp_bot::WhatsAppBot;

const PURGE_INTERVAL: Duration = Duration::from_secs(600);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<RealEstateAgent>,
    pub bot: Arc<WhatsAppBot>,
    pub config: Arc<ServerConfig>,
}

/// Web API and webhook routes behind CORS and request tracing.
pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(http_server::routes())
        .merge(whatsapp_http_server::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(ServerConfig::from_env());
    let agent = Arc::new(RealEstateAgent::from_config(load_agent_config()).await);
    if !agent.is_available() {
        tracing::warn!("Starting in degraded mode, questions will be refused");
    }
    let bot = Arc::new(WhatsAppBot::new(agent.clone(), &config)?);

    let purge_agent = agent.clone();
    let purge_bot = bot.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = purge_agent.sessions().purge_expired();
            let contacts = purge_bot.purge_inactive();
            if purged > 0 || contacts > 0 {
                tracing::info!(purged, contacts, "Expired conversations removed");
            }
        }
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let app = build_router(AppState { agent, bot, config });

    tracing::info!("🚀 Terramagna API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
