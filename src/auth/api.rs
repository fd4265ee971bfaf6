//! Wire types for the `/auth/*` endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The authenticated user as reported by the gateway.
///
/// Fields the crate does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Case-insensitive role check.
    pub fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(role))
    }
}

/// `POST /auth/login` body.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub identifier: &'a str,
    pub secret: &'a str,
}

/// Success body of login and register.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthGrant {
    pub user: UserProfile,
    pub token: String,
    #[serde(default, rename = "refreshToken", alias = "refresh_token")]
    pub refresh_token: Option<String>,
}

/// Success body of `GET /auth/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyBody {
    pub user: UserProfile,
}

/// `POST /auth/refresh` body.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    pub refresh_token: &'a str,
}

/// Success body of `POST /auth/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshGrant {
    pub token: String,
    #[serde(default, rename = "refreshToken", alias = "refresh_token")]
    pub refresh_token: Option<String>,
}
