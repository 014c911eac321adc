//! Classify a raw webhook body into a [`RelayOutcome`].
//!
//! The downstream engine answers with a JSON envelope most of the time, but may also
//! send a bare sentence, an error object, or nothing. `normalize` never fails.

use serde_json::{Map, Value};

/// Leading bytes that mark a canned plain-text answer (e.g. "Halo", "Selamat").
const PLAIN_TEXT_LEADS: &[u8] = b"HS";

const DEFAULT_NOT_FOUND_MESSAGE: &str = "Webhook not found or not registered.";

pub const EMPTY_REPLY: &str = "No response received from the server.";
pub const UNREACHABLE_REPLY: &str = "Sorry, I couldn't process your message. Please try again later.";
pub const UNREADABLE_REPLY: &str = "Sorry, I couldn't read the response from the server.";

/// Normalized result of one relay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// A user-facing answer.
    Reply(String),
    /// The webhook could not be reached or its body could not be read. The reason is user-safe.
    TransportError(String),
    /// The webhook reported a structured failure (only 404 is recognized).
    DownstreamError { code: u16, message: String },
    /// Zero-length or whitespace-only body.
    Empty,
}

impl RelayOutcome {
    /// Text shown to the user for this outcome.
    pub fn reply_text(&self) -> String {
        match self {
            RelayOutcome::Reply(text) => text.clone(),
            RelayOutcome::TransportError(reason) => reason.clone(),
            RelayOutcome::DownstreamError { message, .. } => format!("Error: {}", message),
            RelayOutcome::Empty => EMPTY_REPLY.to_string(),
        }
    }

    /// Stable error kind for the wire `error` field; None for non-failures.
    pub fn error_kind(&self) -> Option<&'static str> {
        match self {
            RelayOutcome::TransportError(_) => Some("transport"),
            RelayOutcome::DownstreamError { .. } => Some("downstream"),
            RelayOutcome::Reply(_) | RelayOutcome::Empty => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error_kind().is_some()
    }
}

/// Response classifier. `sniff_plain_text` enables the leading-letter shortcut.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    pub sniff_plain_text: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            sniff_plain_text: true,
        }
    }
}

impl Normalizer {
    pub fn new(sniff_plain_text: bool) -> Self {
        Self { sniff_plain_text }
    }

    pub fn normalize(&self, raw: &[u8]) -> RelayOutcome {
        let text = String::from_utf8_lossy(raw);
        if text.trim().is_empty() {
            return RelayOutcome::Empty;
        }
        if self.sniff_plain_text && raw.first().is_some_and(|b| PLAIN_TEXT_LEADS.contains(b)) {
            log::debug!("webhook body starts with a plain-text lead, using it verbatim");
            return RelayOutcome::Reply(text.into_owned());
        }
        let object: Map<String, Value> = match serde_json::from_slice(raw) {
            Ok(o) => o,
            Err(e) => {
                log::debug!("webhook body is not a JSON object, using it verbatim: {}", e);
                return RelayOutcome::Reply(text.into_owned());
            }
        };
        if object.get("code").and_then(Value::as_f64) == Some(404.0) {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_NOT_FOUND_MESSAGE)
                .to_string();
            return RelayOutcome::DownstreamError { code: 404, message };
        }
        match object.get("reply") {
            Some(value) => RelayOutcome::Reply(stringify(value)),
            None => RelayOutcome::Reply(text.into_owned()),
        }
    }
}

/// Classify with the default normalizer (plain-text sniffing on).
pub fn normalize(raw: &[u8]) -> RelayOutcome {
    Normalizer::default().normalize(raw)
}

/// Strings as-is, numbers in canonical decimal, everything else as compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_bodies_are_empty() {
        assert_eq!(normalize(b""), RelayOutcome::Empty);
        assert_eq!(normalize(b"   "), RelayOutcome::Empty);
        assert_eq!(normalize(b"\n\t \r\n"), RelayOutcome::Empty);
    }

    #[test]
    fn greeting_lead_is_plain_text() {
        assert_eq!(normalize(b"Hello there"), RelayOutcome::Reply("Hello there".into()));
        assert_eq!(
            normalize(b"Selamat pagi!"),
            RelayOutcome::Reply("Selamat pagi!".into())
        );
    }

    #[test]
    fn greeting_lead_is_case_sensitive() {
        assert_eq!(normalize(b"hello there"), RelayOutcome::Reply("hello there".into()));
        // Without sniffing, bare text still ends up verbatim through the JSON fallback.
        let n = Normalizer::new(false);
        assert_eq!(n.normalize(b"Hi"), RelayOutcome::Reply("Hi".into()));
    }

    #[test]
    fn not_found_code_maps_to_downstream_error() {
        assert_eq!(
            normalize(br#"{"code":404,"message":"not found"}"#),
            RelayOutcome::DownstreamError {
                code: 404,
                message: "not found".into()
            }
        );
        assert_eq!(
            normalize(br#"{"code":404.0}"#),
            RelayOutcome::DownstreamError {
                code: 404,
                message: DEFAULT_NOT_FOUND_MESSAGE.into()
            }
        );
    }

    #[test]
    fn other_codes_fall_through_to_reply_or_raw() {
        assert_eq!(
            normalize(br#"{"code":500,"reply":"still fine"}"#),
            RelayOutcome::Reply("still fine".into())
        );
        assert_eq!(
            normalize(br#"{"code":"404"}"#),
            RelayOutcome::Reply(r#"{"code":"404"}"#.into())
        );
    }

    #[test]
    fn reply_field_is_stringified() {
        assert_eq!(normalize(br#"{"reply":42}"#), RelayOutcome::Reply("42".into()));
        assert_eq!(normalize(br#"{"reply":2.5}"#), RelayOutcome::Reply("2.5".into()));
        assert_eq!(normalize(br#"{"reply":"hi"}"#), RelayOutcome::Reply("hi".into()));
        assert_eq!(normalize(br#"{"reply":true}"#), RelayOutcome::Reply("true".into()));
        assert_eq!(
            normalize(br#"{"reply":["a",1]}"#),
            RelayOutcome::Reply(r#"["a",1]"#.into())
        );
    }

    #[test]
    fn unknown_object_is_passed_through() {
        assert_eq!(
            normalize(br#"{"foo":"bar"}"#),
            RelayOutcome::Reply(r#"{"foo":"bar"}"#.into())
        );
    }

    #[test]
    fn non_json_and_non_object_json_are_raw() {
        assert_eq!(
            normalize(b"not json at all"),
            RelayOutcome::Reply("not json at all".into())
        );
        assert_eq!(normalize(b"[1,2]"), RelayOutcome::Reply("[1,2]".into()));
        assert_eq!(normalize(b"42"), RelayOutcome::Reply("42".into()));
    }

    #[test]
    fn garbage_bytes_never_panic() {
        let samples: [&[u8]; 5] = [
            &[0xff, 0xfe, 0x00],
            &[0x80],
            b"{\"reply\":",
            b"{{{{",
            &[b'{', 0xc3, b'}'],
        ];
        for raw in samples {
            let outcome = normalize(raw);
            assert!(matches!(outcome, RelayOutcome::Reply(_)));
        }
    }

    #[test]
    fn reply_text_and_error_kinds() {
        assert_eq!(RelayOutcome::Empty.reply_text(), EMPTY_REPLY);
        assert!(!RelayOutcome::Empty.is_failure());
        let nf = RelayOutcome::DownstreamError {
            code: 404,
            message: "gone".into(),
        };
        assert_eq!(nf.reply_text(), "Error: gone");
        assert_eq!(nf.error_kind(), Some("downstream"));
        let t = RelayOutcome::TransportError(UNREACHABLE_REPLY.into());
        assert_eq!(t.reply_text(), UNREACHABLE_REPLY);
        assert_eq!(t.error_kind(), Some("transport"));
    }
}
