//! Gateway HTTP + WebSocket server (single port).

use crate::config::Config;
use crate::gateway::protocol::{InboundMessage, ReplyFrame};
use crate::gateway::registry::ConnectionRegistry;
use crate::gateway::session;
use crate::relay::{Relay, WebhookRelay};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{ws::WebSocketUpgrade, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Downstream relay used by both `/chat` and `/ws/chat`.
    pub relay: Arc<dyn Relay>,
    /// Live streaming sessions.
    pub registry: Arc<ConnectionRegistry>,
}

impl GatewayState {
    /// State with the webhook relay built from config.
    pub fn new(config: Config) -> Result<Self> {
        let relay = WebhookRelay::from_config(&config).context("creating webhook relay")?;
        Ok(Self::with_relay(config, Arc::new(relay)))
    }

    pub fn with_relay(config: Config, relay: Arc<dyn Relay>) -> Self {
        Self {
            config: Arc::new(config),
            relay,
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }
}

/// Routes plus the CORS policy for the configured origin.
pub fn router(state: GatewayState) -> Result<Router> {
    let origin = state.config.gateway.allowed_origin.trim();
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("invalid gateway.allowedOrigin: {:?}", origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT]);

    Ok(Router::new()
        .route("/", get(health_http))
        .route("/chat", post(chat_http))
        .route("/ws/chat", get(ws_handler))
        .layer(cors)
        .with_state(state))
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let state = GatewayState::new(config)?;
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);
    serve(listener, state).await
}

/// Serve on an already bound listener until shutdown.
pub async fn serve(listener: TcpListener, state: GatewayState) -> Result<()> {
    let app = router(state)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes on SIGINT or SIGTERM. In-flight sessions end with their sockets.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
        "connections": state.registry.len().await,
    }))
}

/// POST /chat — one message, one reply. Failures from the relay answer 500, malformed bodies 400.
async fn chat_http(State(state): State<GatewayState>, body: Bytes) -> (StatusCode, Json<ReplyFrame>) {
    let inbound: InboundMessage = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(e) => {
            log::debug!("chat: invalid request body: {}", e);
            return (StatusCode::BAD_REQUEST, Json(ReplyFrame::invalid_request()));
        }
    };
    log::info!("chat: received message ({} chars)", inbound.message.chars().count());

    let outcome = state.relay.relay(&inbound.message).await;
    let status = if outcome.is_failure() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(ReplyFrame::from(&outcome)))
}

/// GET /ws/chat upgrades to WebSocket; plain requests get 426, foreign browser origins 403.
async fn ws_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let Some(ws) = ws else {
        return StatusCode::UPGRADE_REQUIRED.into_response();
    };
    if !origin_allowed(&headers, &state.config.gateway.allowed_origin) {
        log::debug!("ws: rejected origin {:?}", headers.get(header::ORIGIN));
        return StatusCode::FORBIDDEN.into_response();
    }
    let relay = state.relay.clone();
    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| session::run(socket, relay, registry))
}

/// Non-browser clients send no Origin and are accepted.
fn origin_allowed(headers: &HeaderMap, allowed: &str) -> bool {
    match headers.get(header::ORIGIN) {
        None => true,
        Some(origin) => origin
            .to_str()
            .map(|o| o.trim_end_matches('/') == allowed.trim().trim_end_matches('/'))
            .unwrap_or(false),
    }
}
