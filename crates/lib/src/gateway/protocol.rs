//! Wire types shared by `/chat` and `/ws/chat`.

use crate::relay::RelayOutcome;
use serde::{Deserialize, Serialize};

/// Inbound frame / request body: `{ "message": string }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message: String,
}

/// Outbound frame / response body: `{ "reply": string, "error"?: string }`.
///
/// `reply` is always user-safe text. `error` is set only for failures:
/// "transport", "downstream" or "invalid_request".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub const INVALID_REQUEST_REPLY: &str = "Invalid request";

impl ReplyFrame {
    pub fn invalid_request() -> Self {
        Self {
            reply: INVALID_REQUEST_REPLY.to_string(),
            error: Some("invalid_request".to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<&RelayOutcome> for ReplyFrame {
    fn from(outcome: &RelayOutcome) -> Self {
        Self {
            reply: outcome.reply_text(),
            error: outcome.error_kind().map(str::to_string),
        }
    }
}
