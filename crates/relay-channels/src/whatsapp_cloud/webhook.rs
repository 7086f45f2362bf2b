//! Inbound side of the WhatsApp Cloud API: handshake, signature, payload.

use chrono::Utc;
use hmac::{Hmac, Mac};
use relay_core::{
    error::RelayError,
    identity::normalize,
    message::{InboundMessage, MessageType},
};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

/// Query parameters Meta sends on `GET /webhook`.
///
/// Meta uses dotted names (`hub.mode`); the bare names are accepted too.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    #[serde(rename = "hub.mode", alias = "mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token", alias = "verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge", alias = "challenge")]
    pub challenge: Option<String>,
}

/// Constant-time string comparison to prevent timing attacks on token checks.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Answer the subscription handshake.
///
/// Returns the challenge to echo only when mode is `subscribe`, the token
/// matches `expected_token`, and the challenge is non-empty.
pub fn verify_handshake(query: &HandshakeQuery, expected_token: &str) -> Result<String, RelayError> {
    if query.mode.as_deref() != Some("subscribe") {
        return Err(RelayError::Unauthorized("handshake mode is not subscribe".into()));
    }
    let token_matches = !expected_token.is_empty()
        && query
            .verify_token
            .as_deref()
            .is_some_and(|t| constant_time_eq(t, expected_token));
    if !token_matches {
        return Err(RelayError::Unauthorized("verify token mismatch".into()));
    }
    match query.challenge.as_deref() {
        Some(challenge) if !challenge.is_empty() => Ok(challenge.to_string()),
        _ => Err(RelayError::Unauthorized("missing challenge".into())),
    }
}

/// Verify `X-Hub-Signature-256` (`sha256=<hex>`) over the raw body.
pub fn verify_signature(app_secret: &str, body: &[u8], signature_header: &str) -> bool {
    let Some(hex_sig) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// What a delivery webhook turned out to contain.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    /// Nothing to act on: status receipts, empty batches, blank text.
    NoEvent,
    /// A message; `message_type` tells text from everything else.
    Message(InboundMessage),
}

/// `entry[0].changes[0].value`, if every level is present.
fn first_change_value(payload: &Value) -> Option<&Value> {
    payload
        .get("entry")?
        .as_array()?
        .first()?
        .get("changes")?
        .as_array()?
        .first()?
        .get("value")
}

/// Prefer the platform's canonical `contacts[0].wa_id` over the raw `from`.
fn resolve_sender(value: &Value, message: &Value) -> String {
    let canonical = value
        .get("contacts")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("wa_id"))
        .and_then(Value::as_str)
        .map(|id| normalize(Some(id)))
        .filter(|id| !id.is_empty());

    canonical.unwrap_or_else(|| normalize(message.get("from").and_then(Value::as_str)))
}

/// Reduce a delivery webhook payload to a single [`WebhookEvent`].
///
/// Only the first message of the first change of the first entry is
/// considered; the platform sends one message per delivery in practice.
pub fn parse_event(payload: &Value) -> WebhookEvent {
    let Some(value) = first_change_value(payload) else {
        return WebhookEvent::NoEvent;
    };
    let Some(message) = value
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|m| m.first())
    else {
        return WebhookEvent::NoEvent;
    };

    let sender = resolve_sender(value, message);

    let platform_id = message.get("id").and_then(Value::as_str).map(String::from);

    if message.get("type").and_then(Value::as_str) != Some("text") {
        return WebhookEvent::Message(InboundMessage {
            sender_key: sender,
            message_type: MessageType::Other,
            text: None,
            platform_id,
            received_at: Utc::now(),
        });
    }

    let text = message
        .get("text")
        .and_then(|t| t.get("body"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        return WebhookEvent::NoEvent;
    }

    WebhookEvent::Message(InboundMessage {
        sender_key: sender,
        message_type: MessageType::Text,
        text: Some(text.to_string()),
        platform_id,
        received_at: Utc::now(),
    })
}
