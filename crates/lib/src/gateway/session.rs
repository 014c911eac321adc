//! One streaming session: register, read/relay/reply until the socket ends, then clean up once.

use crate::gateway::protocol::{InboundMessage, ReplyFrame};
use crate::gateway::registry::{ConnectionId, ConnectionRegistry};
use crate::relay::Relay;
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;

/// Why a session left its read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    ReadFailed,
    Malformed,
    WriteFailed,
}

/// Drive one WebSocket connection. Replies go out in the order messages were read;
/// the next frame is not read until the current reply is written.
pub(crate) async fn run(mut socket: WebSocket, relay: Arc<dyn Relay>, registry: Arc<ConnectionRegistry>) {
    let id = ConnectionId::new();
    if !registry.register(id.clone()).await {
        log::debug!("ws {} was already registered", id);
    }
    log::info!("ws {} connected", id);

    let reason = read_loop(&mut socket, relay.as_ref(), &id).await;
    close(socket, &registry, &id, reason).await;
}

async fn read_loop(socket: &mut WebSocket, relay: &dyn Relay, id: &ConnectionId) -> CloseReason {
    loop {
        let msg = match socket.recv().await {
            None => return CloseReason::ClientClosed,
            Some(Err(e)) => {
                log::debug!("ws {} read error: {}", id, e);
                return CloseReason::ReadFailed;
            }
            Some(Ok(msg)) => msg,
        };
        let text = match msg {
            Message::Text(text) => text,
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => return CloseReason::Malformed,
            },
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return CloseReason::ClientClosed,
        };
        let inbound: InboundMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                log::debug!("ws {} sent a non-conforming frame: {}", id, e);
                return CloseReason::Malformed;
            }
        };
        log::info!("ws {} received message ({} chars)", id, inbound.message.chars().count());

        let outcome = relay.relay(&inbound.message).await;
        let frame = ReplyFrame::from(&outcome);
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("ws {} could not encode reply: {}", id, e);
                return CloseReason::WriteFailed;
            }
        };
        if let Err(e) = socket.send(Message::Text(json)).await {
            log::debug!("ws {} write error: {}", id, e);
            return CloseReason::WriteFailed;
        }
    }
}

/// Unregister and close as a single step; runs exactly once per session.
async fn close(mut socket: WebSocket, registry: &ConnectionRegistry, id: &ConnectionId, reason: CloseReason) {
    registry.unregister(id).await;
    if !matches!(reason, CloseReason::WriteFailed | CloseReason::ReadFailed) {
        let _ = socket.send(Message::Close(None)).await;
    }
    drop(socket);
    log::info!("ws {} closed ({:?})", id, reason);
}
