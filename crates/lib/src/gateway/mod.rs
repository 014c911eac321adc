//! Gateway: HTTP + WebSocket entry points for the chat relay.
//!
//! Single port serves `POST /chat` (one-shot) and `GET /ws/chat` (streaming, one
//! message in flight per connection). Both relay through the same [`crate::relay::Relay`].

mod protocol;
mod registry;
mod server;
mod session;

pub use protocol::{InboundMessage, ReplyFrame, INVALID_REQUEST_REPLY};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use server::{router, run_gateway, serve, GatewayState};
