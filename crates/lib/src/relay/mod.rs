//! Relay to the downstream automation webhook.
//!
//! Both gateway entry points go through a [`Relay`]; classification of the webhook body
//! lives in one place ([`Normalizer`]).

mod normalize;
mod webhook;

use async_trait::async_trait;

pub use normalize::{
    normalize, Normalizer, RelayOutcome, EMPTY_REPLY, UNREACHABLE_REPLY, UNREADABLE_REPLY,
};
pub use webhook::{RelayError, WebhookRelay};

/// Forward one user message downstream and return the classified outcome. Never fails.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn relay(&self, message: &str) -> RelayOutcome;
}
