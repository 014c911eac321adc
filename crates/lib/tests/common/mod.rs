//! Shared helpers: a scripted webhook and a gateway on an ephemeral port.
#![allow(dead_code)]

use axum::{http::StatusCode, routing::post, Json, Router};
use lib::config::Config;
use lib::gateway::{self, GatewayState};
use lib::relay::Relay;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Webhook whose answer depends on the message:
/// `slow:<ms>:<tag>` sleeps then replies `tag`; a few keywords return the awkward shapes.
async fn scripted_webhook(Json(body): Json<serde_json::Value>) -> (StatusCode, String) {
    let msg = body.get("message").and_then(|v| v.as_str()).unwrap_or("");
    if let Some((ms, tag)) = msg.strip_prefix("slow:").and_then(|r| r.split_once(':')) {
        let ms: u64 = ms.parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        return (StatusCode::OK, json!({ "reply": tag }).to_string());
    }
    match msg {
        "greet" => (StatusCode::OK, "Halo, ada yang bisa dibantu?".to_string()),
        "number" => (StatusCode::OK, r#"{"reply":42}"#.to_string()),
        "missing" => (
            StatusCode::NOT_FOUND,
            r#"{"code":404,"message":"Workflow not active"}"#.to_string(),
        ),
        "silent" => (StatusCode::OK, String::new()),
        "odd" => (StatusCode::OK, r#"{"foo":"bar"}"#.to_string()),
        other => (StatusCode::OK, json!({ "reply": format!("echo: {}", other) }).to_string()),
    }
}

/// Start the scripted webhook; returns its URL.
pub async fn start_webhook() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind webhook");
    let addr = listener.local_addr().expect("local_addr");
    let app = Router::new().route("/webhook/web-chatbot", post(scripted_webhook));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}/webhook/web-chatbot", addr)
}

pub fn config_for(webhook_url: &str) -> Config {
    let mut config = Config::default();
    config.webhook.url = webhook_url.to_string();
    config.webhook.timeout_ms = 5_000;
    config
}

/// Serve the gateway on `listener`; returns the HTTP base URL once GET / answers.
pub async fn start_gateway_on(listener: TcpListener, state: GatewayState) -> String {
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = gateway::serve(listener, state).await;
    });
    let base = format!("http://{}", addr);
    wait_for_health(&base).await;
    base
}

pub async fn start_gateway(config: Config) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind gateway");
    let state = GatewayState::new(config).expect("gateway state");
    start_gateway_on(listener, state).await
}

pub async fn start_gateway_with_relay(config: Config, relay: Arc<dyn Relay>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind gateway");
    start_gateway_on(listener, GatewayState::with_relay(config, relay)).await
}

pub async fn wait_for_health(base: &str) -> serde_json::Value {
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(format!("{}/", base)).send().await {
            Ok(resp) if resp.status().is_success() => {
                return resp.json().await.expect("parse health JSON");
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "GET {}/ did not return 200 within 5s; last error: {:?}",
        base, last_err
    );
}

pub fn ws_url(base: &str) -> String {
    format!("{}/ws/chat", base.replacen("http://", "ws://", 1))
}
