//! Chat client: streaming first, one-shot fallback, reconnect on a fixed delay.

use super::state::{ConnectionState, PendingReply, ReconnectMachine, SendPath};
use crate::config::{self, Config};
use crate::gateway::{InboundMessage, ReplyFrame};
use futures_util::{FutureExt, SinkExt, StreamExt};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("a message is already awaiting its reply")]
    Busy,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected reply: {0}")]
    Protocol(String),
    #[error("gateway answered {0}")]
    Status(reqwest::StatusCode),
}

/// A reply frame plus the path that delivered it.
#[derive(Debug, Clone)]
pub struct ClientReply {
    pub frame: ReplyFrame,
    pub path: SendPath,
}

/// Streaming send failure: whether the frame left the client decides if falling back is safe.
enum StreamFailure {
    NotSent(String),
    Sent(ClientError),
}

pub struct ChatClient {
    base_url: String,
    ws_url: String,
    http: reqwest::Client,
    ws: Option<WsStream>,
    machine: ReconnectMachine,
    pending: PendingReply,
    active: bool,
}

impl ChatClient {
    /// `base_url` is the gateway's HTTP root (e.g. "http://127.0.0.1:8080").
    pub fn new(base_url: &str, reconnect_delay: Duration) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            ws_url: ws_url_for(&base_url),
            base_url,
            http: reqwest::Client::new(),
            ws: None,
            machine: ReconnectMachine::new(reconnect_delay),
            pending: PendingReply::default(),
            active: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config::client_base_url(config),
            config::reconnect_delay(config),
        )
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Deadline of the scheduled reconnect attempt, if one is pending.
    pub fn reconnect_due(&self) -> Option<Instant> {
        self.machine.reconnect_at()
    }

    /// The message currently awaiting a reply (drives a loading indicator).
    pub fn awaiting_reply(&self) -> Option<&str> {
        self.pending.awaiting()
    }

    /// Liveness signal: while inactive, due reconnects are skipped.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if active {
            self.machine.resumed(Instant::now());
        }
    }

    /// Open the streaming connection. On failure a reconnect is scheduled.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.machine.connecting();
        match tokio_tungstenite::connect_async(self.ws_url.as_str()).await {
            Ok((ws, _)) => {
                self.ws = Some(ws);
                self.machine.opened();
                log::info!("connected to {}", self.ws_url);
                Ok(())
            }
            Err(e) => {
                self.lost_connection();
                Err(ClientError::Transport(e.to_string()))
            }
        }
    }

    /// Run the scheduled reconnect if it is due and the client is active. Returns true when connected.
    pub async fn maybe_reconnect(&mut self) -> bool {
        if !self.machine.poll(Instant::now(), self.active) {
            return false;
        }
        match self.connect().await {
            Ok(()) => true,
            Err(e) => {
                log::debug!("reconnect failed: {}", e);
                false
            }
        }
    }

    /// Wait until the open stream ends while no message is in flight, then schedule a
    /// reconnect. Never completes while disconnected; safe to drop at any await point.
    pub async fn watch(&mut self) {
        let Some(ws) = self.ws.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            match ws.next().await {
                None | Some(Ok(Message::Close(_))) => break,
                Some(Err(e)) => {
                    log::debug!("stream read error while idle: {}", e);
                    break;
                }
                Some(Ok(Message::Text(text))) => {
                    log::debug!("ignoring unsolicited frame ({} bytes)", text.len());
                }
                Some(Ok(_)) => {}
            }
        }
        log::info!("connection to {} closed", self.ws_url);
        self.lost_connection();
    }

    /// Send one message and wait for its reply. Uses the stream when connected, otherwise
    /// (or when the frame could not be written) POSTs to `/chat`.
    pub async fn send(&mut self, text: &str) -> Result<ClientReply, ClientError> {
        if !self.pending.begin(text) {
            return Err(ClientError::Busy);
        }
        let result = self.dispatch(text).await;
        self.pending.finish();
        result
    }

    /// Forget the awaited message after the future from [`ChatClient::send`] was dropped.
    pub fn cancel(&mut self) {
        self.pending.finish();
    }

    async fn dispatch(&mut self, text: &str) -> Result<ClientReply, ClientError> {
        if self.machine.send_path() == SendPath::Streaming {
            match self.send_streaming(text).await {
                Ok(frame) => {
                    return Ok(ClientReply {
                        frame,
                        path: SendPath::Streaming,
                    })
                }
                Err(StreamFailure::NotSent(reason)) => {
                    log::debug!("streaming send failed ({}), falling back to /chat", reason);
                    self.lost_connection();
                }
                Err(StreamFailure::Sent(e)) => {
                    self.lost_connection();
                    return Err(e);
                }
            }
        }
        let frame = self.send_one_shot(text).await?;
        Ok(ClientReply {
            frame,
            path: SendPath::OneShot,
        })
    }

    async fn send_streaming(&mut self, text: &str) -> Result<ReplyFrame, StreamFailure> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| StreamFailure::NotSent("no open connection".to_string()))?;
        let payload = serde_json::to_string(&InboundMessage {
            message: text.to_string(),
        })
        .map_err(|e| StreamFailure::NotSent(e.to_string()))?;
        if !drain_queued(ws) {
            return Err(StreamFailure::NotSent("connection closed while idle".to_string()));
        }
        ws.send(Message::Text(payload))
            .await
            .map_err(|e| StreamFailure::NotSent(e.to_string()))?;

        while let Some(msg) = ws.next().await {
            let msg = msg.map_err(|e| StreamFailure::Sent(ClientError::Transport(e.to_string())))?;
            match msg {
                Message::Text(text) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| StreamFailure::Sent(ClientError::Protocol(e.to_string())));
                }
                Message::Close(_) => break,
                _ => continue,
            }
        }
        // A close before any reply means the gateway dropped the message unanswered.
        Err(StreamFailure::NotSent("connection closed before reply".to_string()))
    }

    async fn send_one_shot(&self, text: &str) -> Result<ReplyFrame, ClientError> {
        let url = format!("{}/chat", self.base_url);
        let res = self
            .http
            .post(&url)
            .json(&InboundMessage {
                message: text.to_string(),
            })
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = res.status();
        let body = res
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        match serde_json::from_slice::<ReplyFrame>(&body) {
            Ok(frame) => Ok(frame),
            Err(_) if !status.is_success() => Err(ClientError::Status(status)),
            Err(e) => Err(ClientError::Protocol(e.to_string())),
        }
    }

    fn lost_connection(&mut self) {
        self.ws = None;
        if let Some(at) = self.machine.closed(Instant::now()) {
            log::debug!("reconnect scheduled in {:?}", at.saturating_duration_since(Instant::now()));
        }
    }
}

/// Consume frames that already arrived on an idle socket. False once the stream has ended.
fn drain_queued(ws: &mut WsStream) -> bool {
    loop {
        match ws.next().now_or_never() {
            None => return true,
            Some(None) | Some(Some(Err(_))) | Some(Some(Ok(Message::Close(_)))) => return false,
            Some(Some(Ok(_))) => {}
        }
    }
}

fn ws_url_for(base_url: &str) -> String {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base_url.to_string()
    };
    format!("{}/ws/chat", ws_base)
}
