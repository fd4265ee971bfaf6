//! Errors surfaced by the remote client.
//!
//! Every gateway call ends in one of these variants. The retry executor
//! consults [`ApiError::is_retryable`] and the client consults
//! [`ApiError::requires_reauth`] to decide whether the session must be
//! invalidated.

use thiserror::Error;

use super::ErrorCategory;
use crate::traits::HttpError;

/// Classified outcome of a failed gateway call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Timeout, refused connection, or another transport failure.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The gateway answered 401 or 403.
    #[error("Authentication failed ({status}): {}", describe(.status, .message))]
    Auth {
        status: u16,
        message: Option<String>,
    },

    /// Any other 4xx answer.
    #[error("Request rejected ({status}): {}", describe(.status, .message))]
    Validation {
        status: u16,
        message: Option<String>,
    },

    /// A 5xx answer.
    #[error("Server error ({status}): {}", describe(.status, .message))]
    Server {
        status: u16,
        message: Option<String>,
    },

    /// The caller's abort signal fired while the call was running.
    #[error("Request aborted")]
    Aborted,

    /// The request could not be built (bad URL, unserializable body).
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// A 2xx answer whose body could not be decoded.
    #[error("Invalid response: {message}")]
    Decode { message: String },
}

/// Fallback text for a status when the server sent no message.
pub fn status_phrase(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

fn describe(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(message) => message.clone(),
        None => status_phrase(*status),
    }
}

impl ApiError {
    /// Build the error for a non-2xx status.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            401 | 403 => ApiError::Auth { status, message },
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Validation { status, message },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Network { .. } => ErrorCategory::Network,
            ApiError::Auth { .. } => ErrorCategory::Auth,
            ApiError::Validation { .. } => ErrorCategory::User,
            ApiError::Server { .. } => ErrorCategory::Server,
            ApiError::Aborted => ErrorCategory::Cancelled,
            ApiError::InvalidRequest { .. } | ApiError::Decode { .. } => ErrorCategory::System,
        }
    }

    /// Check if this error is likely transient and can be retried.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Check if this error means the credential is no longer accepted.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }

    /// HTTP status, when the gateway answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. }
            | ApiError::Validation { status, .. }
            | ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The message the server put in its error envelope, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Auth { message, .. }
            | ApiError::Validation { message, .. }
            | ApiError::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network { .. } => {
                "Unable to reach the server. Please check your internet connection.".to_string()
            }
            ApiError::Auth { status: 403, .. } => {
                "Access denied. You don't have permission for this action.".to_string()
            }
            ApiError::Auth { .. } => "Your session has expired. Please sign in again.".to_string(),
            ApiError::Validation { status, message } => describe(status, message),
            ApiError::Server { .. } => {
                "The server is experiencing issues. Please try again later.".to_string()
            }
            ApiError::Aborted => "The request was cancelled.".to_string(),
            ApiError::InvalidRequest { .. } => {
                "The request could not be prepared. Please try again.".to_string()
            }
            ApiError::Decode { .. } => {
                "Received an invalid response from the server. Please try again.".to_string()
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Network { .. } => "E_NET",
            ApiError::Auth { .. } => "E_AUTH",
            ApiError::Validation { .. } => "E_VALIDATION",
            ApiError::Server { .. } => "E_SERVER",
            ApiError::Aborted => "E_ABORTED",
            ApiError::InvalidRequest { .. } => "E_REQUEST",
            ApiError::Decode { .. } => "E_DECODE",
        }
    }
}

impl From<HttpError> for ApiError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::InvalidUrl(message) => ApiError::InvalidRequest { message },
            other => ApiError::Network {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode {
            message: err.to_string(),
        }
    }
}
