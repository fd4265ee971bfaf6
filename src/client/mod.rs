//! Gateway adapter.
//!
//! [`RemoteClient`] turns logical operations into HTTP calls, attaches the
//! session's bearer token, runs every call through the retry executor and
//! classifies the outcome into [`ApiError`](crate::error::ApiError).
//!
//! The client never owns session state. It reads the token and reports auth
//! failures through [`SessionHooks`], which the session handle implements.

pub mod envelope;
mod remote;

pub use envelope::Payload;
pub use remote::RemoteClient;

use crate::retry::AbortSignal;

/// Seam between the client and whoever owns the session.
pub trait SessionHooks: Send + Sync {
    /// Current bearer token, read once per attempt.
    fn bearer_token(&self) -> Option<String>;

    /// Called for every 401/403 on a credentialed request.
    ///
    /// `sent_token` is the bearer the failing request carried. A failure for
    /// a token that is no longer current must not clear a newer session.
    /// Implementations must be idempotent: concurrent failures call this
    /// once each.
    fn on_auth_failure(&self, status: u16, sent_token: Option<&str>);
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Send no session token and never invalidate on 401/403.
    pub skip_auth: bool,
    /// Explicit bearer token used instead of the session's.
    pub bearer: Option<String>,
    /// Cancels the whole retry sequence when fired.
    pub abort: Option<AbortSignal>,
}

impl RequestOptions {
    /// Options for login and register.
    pub fn anonymous() -> Self {
        Self {
            skip_auth: true,
            ..Self::default()
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn with_abort(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }
}
