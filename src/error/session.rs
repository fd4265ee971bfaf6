//! Errors raised by session lifecycle operations.

use thiserror::Error;

use super::{ApiError, ErrorCategory};

/// Shown when a login fails without a server-supplied message.
pub const LOGIN_FALLBACK_MESSAGE: &str = "Login failed. Please try again.";

/// Shown when a registration fails without a server-supplied message.
pub const REGISTER_FALLBACK_MESSAGE: &str = "Registration failed. Please try again.";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Login was rejected; `message` is what the caller should display.
    #[error("{message}")]
    Login {
        message: String,
        #[source]
        source: ApiError,
    },

    /// Registration was rejected; `message` is what the caller should display.
    #[error("{message}")]
    Register {
        message: String,
        #[source]
        source: ApiError,
    },

    /// The refresh exchange failed and the session was cleared.
    #[error("Session refresh failed: {0}")]
    Refresh(#[source] ApiError),

    /// The operation needs a credential and there is none.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Any other gateway failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    pub(crate) fn login(source: ApiError) -> Self {
        let message = source
            .server_message()
            .unwrap_or(LOGIN_FALLBACK_MESSAGE)
            .to_string();
        SessionError::Login { message, source }
    }

    pub(crate) fn register(source: ApiError) -> Self {
        let message = source
            .server_message()
            .unwrap_or(REGISTER_FALLBACK_MESSAGE)
            .to_string();
        SessionError::Register { message, source }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SessionError::Login { source, .. }
            | SessionError::Register { source, .. }
            | SessionError::Api(source) => source.category(),
            SessionError::Refresh(_) | SessionError::NotAuthenticated => ErrorCategory::Auth,
        }
    }

    /// Check if the caller should send the user back to a login flow.
    pub fn requires_reauth(&self) -> bool {
        match self {
            SessionError::Refresh(_) | SessionError::NotAuthenticated => true,
            SessionError::Api(source) => source.requires_reauth(),
            SessionError::Login { .. } | SessionError::Register { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_uses_server_message() {
        let err = SessionError::login(ApiError::from_status(
            401,
            Some("Invalid email or password".to_string()),
        ));
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[test]
    fn test_login_falls_back_without_server_message() {
        let err = SessionError::login(ApiError::Network {
            message: "connection refused".to_string(),
        });
        assert_eq!(err.to_string(), LOGIN_FALLBACK_MESSAGE);

        let err = SessionError::login(ApiError::from_status(500, None));
        assert_eq!(err.to_string(), LOGIN_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_register_fallback() {
        let err = SessionError::register(ApiError::from_status(400, None));
        assert_eq!(err.to_string(), REGISTER_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_requires_reauth() {
        assert!(SessionError::NotAuthenticated.requires_reauth());
        assert!(SessionError::Refresh(ApiError::from_status(401, None)).requires_reauth());
        assert!(!SessionError::login(ApiError::from_status(401, None)).requires_reauth());
        assert!(SessionError::Api(ApiError::from_status(403, None)).requires_reauth());
    }
}
