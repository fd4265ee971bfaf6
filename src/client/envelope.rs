//! Response-shape tolerance.
//!
//! The gateway answers either with a bare value or with an envelope
//! `{"data": ..., "message": ...}`. Both shapes are decoded here so call
//! sites only ever see `T`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// A decoded success body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    /// `{"data": T, "message"?: String}`
    Enveloped { data: T, message: Option<String> },
    /// `T` as-is
    Bare(T),
}

impl<T: DeserializeOwned> Payload<T> {
    /// Decode a raw body. An empty body decodes as JSON `null`.
    pub fn decode(body: &[u8]) -> Result<Self, ApiError> {
        Self::from_value(parse_body(body)?)
    }

    /// Decode an already-parsed body.
    ///
    /// An object with a `data` key is treated as an envelope first. If its
    /// `data` does not fit `T`, the whole object is tried as a bare `T`
    /// before giving up.
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        if let Value::Object(map) = &value {
            if let Some(data) = map.get("data") {
                if let Ok(data) = T::deserialize(data) {
                    let message = map
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    return Ok(Payload::Enveloped { data, message });
                }
            }
        }
        Ok(Payload::Bare(serde_json::from_value(value)?))
    }
}

impl<T> Payload<T> {
    pub fn into_inner(self) -> T {
        match self {
            Payload::Enveloped { data, .. } | Payload::Bare(data) => data,
        }
    }

    /// Server message carried by an envelope.
    pub fn message(&self) -> Option<&str> {
        match self {
            Payload::Enveloped { message, .. } => message.as_deref(),
            Payload::Bare(_) => None,
        }
    }
}

fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(body)?)
}

/// Human-readable message from an error body.
///
/// Looks at `message`, then `error`, at the top level and inside `data`.
/// Non-JSON bodies and bodies without either field give `None`; callers
/// fall back to the status phrase.
pub fn error_message(body: &[u8]) -> Option<String> {
    let value = serde_json::from_slice::<Value>(body).ok()?;
    find_message(&value).or_else(|| value.get("data").and_then(find_message))
}

fn find_message(value: &Value) -> Option<String> {
    ["message", "error"].iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    })
}
