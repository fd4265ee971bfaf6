//! Credential value, derived claims and durable persistence.
//!
//! The bearer token lives in `"{namespace}:token"` and the refresh token in
//! `"{namespace}:refresh_token"`. Both slots hold a JSON string.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::traits::Storage;

/// Bearer token plus optional refresh token.
///
/// `Debug` never prints the tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Credential {
    pub fn new(token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token,
        }
    }

    /// Best-effort decode of the token's claims.
    pub fn claims(&self) -> Option<Claims> {
        Claims::decode(&self.token)
    }

    /// True when the decoded expiry falls within `skew` from now.
    ///
    /// Tokens without a readable expiry are never considered expiring.
    pub fn expires_within(&self, skew: Duration) -> bool {
        let Some(expires_at) = self.claims().and_then(|c| c.expires_at()) else {
            return false;
        };
        let skew = chrono::Duration::from_std(skew).unwrap_or_else(|_| chrono::Duration::zero());
        expires_at <= Utc::now() + skew
    }
}

/// Claims read from a JWT payload segment.
///
/// Signatures are not checked; the verify endpoint is the authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Subject id, from `sub`, `id` or `userId`
    #[serde(default, alias = "id", alias = "userId", deserialize_with = "string_or_number")]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    /// Decode the payload segment of `token`. Returns `None` for anything
    /// that is not a three-part JWT with a JSON payload.
    pub fn decode(token: &str) -> Option<Claims> {
        let mut parts = token.split('.');
        let (_, payload, _) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|iat| Utc.timestamp_opt(iat, 0).single())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Reads and writes the credential slots.
///
/// Failures never propagate: they are logged and treated as "no credential".
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
    token_slot: String,
    refresh_slot: String,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("token_slot", &self.token_slot)
            .field("refresh_slot", &self.refresh_slot)
            .finish()
    }
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn Storage>, config: &ClientConfig) -> Self {
        Self {
            storage,
            token_slot: config.slot("token"),
            refresh_slot: config.slot("refresh_token"),
        }
    }

    pub fn token_slot(&self) -> &str {
        &self.token_slot
    }

    pub fn refresh_slot(&self) -> &str {
        &self.refresh_slot
    }

    /// Load the persisted credential, if any.
    pub fn load(&self) -> Option<Credential> {
        let token = self.read_slot(&self.token_slot)?;
        let refresh_token = self.read_slot(&self.refresh_slot);
        Some(Credential::new(token, refresh_token))
    }

    /// Persist `credential`. A missing refresh token empties its slot.
    pub fn save(&self, credential: &Credential) {
        self.write_slot(&self.token_slot, &credential.token);
        match &credential.refresh_token {
            Some(refresh) => self.write_slot(&self.refresh_slot, refresh),
            None => self.remove_slot(&self.refresh_slot),
        }
    }

    /// Remove both slots.
    pub fn clear(&self) {
        self.remove_slot(&self.token_slot);
        self.remove_slot(&self.refresh_slot);
    }

    fn read_slot(&self, key: &str) -> Option<String> {
        let raw = match self.storage.read(key) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(key, error = %err, "Failed to read credential slot");
                return None;
            }
        };
        decode_slot(&raw)
    }

    fn write_slot(&self, key: &str, value: &str) {
        let encoded = Value::String(value.to_string()).to_string();
        if let Err(err) = self.storage.write(key, &encoded) {
            tracing::warn!(key, error = %err, "Failed to persist credential slot");
        }
    }

    fn remove_slot(&self, key: &str) {
        if let Err(err) = self.storage.remove(key) {
            tracing::warn!(key, error = %err, "Failed to remove credential slot");
        }
    }
}

/// A slot holds a JSON string; raw tokens written by other tools are
/// accepted as-is.
fn decode_slot(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(s)) => s,
        Ok(Value::Null) => return None,
        Ok(_) | Err(_) => raw.to_string(),
    };
    (!value.is_empty()).then_some(value)
}
