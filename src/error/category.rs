//! Error category classification.
//!
//! Categories drive the retry decision in the executor and the log level
//! used when an operation degrades.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, DNS, or per-attempt timeout failures.
    /// Transient and retryable.
    Network,

    /// The gateway rejected the credential (401/403).
    /// Never retried; the session is invalidated instead.
    Auth,

    /// Gateway-side failures (HTTP 5xx).
    /// Transient and retryable after a delay.
    Server,

    /// The request was rejected as invalid (other 4xx).
    /// Not retryable until the caller changes the input.
    User,

    /// The caller cancelled the operation.
    Cancelled,

    /// Local failures: durable storage, malformed responses, bad requests.
    System,
}

impl ErrorCategory {
    /// Returns true if errors in this category are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Short label for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Server => "server",
            ErrorCategory::User => "user",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::System => "system",
        }
    }

    /// Suggested recovery action for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Check your internet connection and try again",
            ErrorCategory::Auth => "Sign in again to continue",
            ErrorCategory::Server => {
                "The server may be experiencing issues. Please try again later"
            }
            ErrorCategory::User => "Please check your input and try again",
            ErrorCategory::Cancelled => "The operation was cancelled",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
