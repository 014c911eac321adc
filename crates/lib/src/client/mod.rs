//! Consumer side of the relay: connection lifecycle and dual-path send.
//!
//! The [`ChatClient`] keeps one streaming connection to `/ws/chat` and falls back to
//! `POST /chat` whenever it is not connected, so a message is never dropped because of
//! a transient disconnect.

mod chat;
mod state;

pub use chat::{ChatClient, ClientError, ClientReply};
pub use state::{ConnectionState, PendingReply, ReconnectMachine, SendPath};
