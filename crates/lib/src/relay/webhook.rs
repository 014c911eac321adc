//! Webhook relay client: POST `{ "message" }` to the automation engine and classify the body.

use super::normalize::{Normalizer, RelayOutcome, UNREACHABLE_REPLY, UNREADABLE_REPLY};
use super::Relay;
use crate::config::{self, Config};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("building webhook client failed: {0}")]
    Build(#[source] reqwest::Error),
    #[error("webhook request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("reading webhook body failed: {0}")]
    Body(#[source] reqwest::Error),
}

#[derive(Serialize)]
struct WebhookRequest<'a> {
    message: &'a str,
}

/// Relay backed by a single configured webhook URL. No retries.
#[derive(Clone)]
pub struct WebhookRelay {
    url: String,
    client: reqwest::Client,
    normalizer: Normalizer,
}

impl WebhookRelay {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        normalizer: Normalizer,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RelayError::Build)?;
        Ok(Self {
            url: url.into(),
            client,
            normalizer,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RelayError> {
        Self::new(
            config::resolve_webhook_url(config),
            config::relay_timeout(config),
            Normalizer::new(config.webhook.sniff_plain_text),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST and read the whole body. The response is consumed here, so the connection goes back to the pool on every path.
    async fn fetch(&self, message: &str) -> Result<Vec<u8>, RelayError> {
        let res = self
            .client
            .post(&self.url)
            .json(&WebhookRequest { message })
            .send()
            .await
            .map_err(RelayError::Request)?;
        let status = res.status();
        if !status.is_success() {
            log::debug!("webhook answered {}, classifying body anyway", status);
        }
        let body = res.bytes().await.map_err(RelayError::Body)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Relay for WebhookRelay {
    async fn relay(&self, message: &str) -> RelayOutcome {
        match self.fetch(message).await {
            Ok(body) => {
                log::debug!("raw webhook body: {}", String::from_utf8_lossy(&body));
                self.normalizer.normalize(&body)
            }
            Err(e @ RelayError::Request(_)) => {
                log::warn!("{}", e);
                RelayOutcome::TransportError(UNREACHABLE_REPLY.to_string())
            }
            Err(e) => {
                log::warn!("{}", e);
                RelayOutcome::TransportError(UNREADABLE_REPLY.to_string())
            }
        }
    }
}
