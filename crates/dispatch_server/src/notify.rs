//! Notification derivation: decodes bus push envelopes into chat-ready
//! notifications.
//!
//! The bus pushes `{message: {attributes: {type}, data: <base64 JSON>}}`;
//! the forwarder turns that into `{event_type, additional_data}` and hands
//! it to the configured webhook. No acknowledgement is expected.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event_type: String,
    pub additional_data: Value,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope is missing {0}")]
    MissingField(&'static str),
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode one push envelope into a notification.
pub fn parse_push_envelope(envelope: &Value) -> Result<Notification, EnvelopeError> {
    let message = envelope
        .get("message")
        .ok_or(EnvelopeError::MissingField("message"))?;
    let event_type = message
        .pointer("/attributes/type")
        .and_then(Value::as_str)
        .ok_or(EnvelopeError::MissingField("message.attributes.type"))?
        .to_string();
    let data = message
        .get("data")
        .and_then(Value::as_str)
        .ok_or(EnvelopeError::MissingField("message.data"))?;

    let decoded = BASE64.decode(data)?;
    let additional_data = serde_json::from_slice(&decoded)?;

    Ok(Notification {
        event_type,
        additional_data,
    })
}
