//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.hookchat/config.json`) and environment.
//! Every field has a default, so a missing file or an empty object is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Downstream automation webhook.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Terminal chat client settings.
    #[serde(default)]
    pub client: ClientConfig,
}

/// Gateway bind, port, and origin policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP and WebSocket (default 8080).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// The single browser origin allowed to call `/chat` and `/ws/chat`.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

/// Downstream webhook endpoint and response handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Webhook URL. Overridden by HOOKCHAT_WEBHOOK_URL env.
    #[serde(default = "default_webhook_url")]
    pub url: String,

    /// Whole-request timeout in milliseconds. Zero falls back to the default.
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,

    /// Treat bodies starting with a known greeting letter as plain text without trying JSON.
    #[serde(default = "default_true")]
    pub sniff_plain_text: bool,
}

/// Chat client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Gateway base URL (e.g. "http://127.0.0.1:8080"). Derived from gateway bind/port when unset.
    pub url: Option<String>,

    /// Delay before the single scheduled reconnect attempt after a close (default 3000).
    #[serde(default)]
    pub reconnect_delay_ms: Option<u64>,
}

const DEFAULT_WEBHOOK_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_allowed_origin() -> String {
    "http://localhost:4321".to_string()
}

fn default_webhook_url() -> String {
    "http://127.0.0.1:5678/webhook/web-chatbot".to_string()
}

fn default_webhook_timeout_ms() -> u64 {
    DEFAULT_WEBHOOK_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: default_webhook_url(),
            timeout_ms: default_webhook_timeout_ms(),
            sniff_plain_text: true,
        }
    }
}

/// Resolve the webhook URL: env HOOKCHAT_WEBHOOK_URL overrides config.
pub fn resolve_webhook_url(config: &Config) -> String {
    std::env::var("HOOKCHAT_WEBHOOK_URL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.webhook.url.trim().to_string())
}

/// Relay timeout; never unbounded.
pub fn relay_timeout(config: &Config) -> Duration {
    let ms = match config.webhook.timeout_ms {
        0 => DEFAULT_WEBHOOK_TIMEOUT_MS,
        ms => ms,
    };
    Duration::from_millis(ms)
}

pub fn reconnect_delay(config: &Config) -> Duration {
    Duration::from_millis(
        config
            .client
            .reconnect_delay_ms
            .unwrap_or(DEFAULT_RECONNECT_DELAY_MS),
    )
}

/// Base HTTP URL the client talks to. Wildcard binds are dialed on loopback.
pub fn client_base_url(config: &Config) -> String {
    if let Some(url) = config
        .client
        .url
        .as_ref()
        .map(|u| u.trim().trim_end_matches('/'))
        .filter(|u| !u.is_empty())
    {
        return url.to_string();
    }
    let host = match config.gateway.bind.trim() {
        "0.0.0.0" | "" => "127.0.0.1",
        "::" => "[::1]",
        other => other,
    };
    format!("http://{}:{}", host, config.gateway.port)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("HOOKCHAT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".hookchat").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, else the default path (or HOOKCHAT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
