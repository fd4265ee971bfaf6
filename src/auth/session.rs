//! Session lifecycle: restore, login, register, verify, refresh, logout.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use super::api::{AuthGrant, LoginRequest, RefreshGrant, RefreshRequest, UserProfile, VerifyBody};
use super::credentials::{Credential, CredentialStore};
use super::handle::{Session, SessionHandle};
use crate::bus::{ChangeBus, CredentialChange};
use crate::client::{RemoteClient, RequestOptions};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::traits::{HttpClient, Method, Storage};

/// Owns the session and the remote client bound to it.
///
/// # Example
///
/// ```ignore
/// use sessionkit::auth::SessionManager;
///
/// let manager = SessionManager::new(&config, http, storage, ChangeBus::global());
/// let session = manager.restore().await;
/// if !session.is_authenticated() {
///     manager.login("user@example.com", "secret").await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionManager {
    handle: Arc<SessionHandle>,
    client: RemoteClient,
    config: ClientConfig,
}

impl SessionManager {
    pub fn new(
        config: &ClientConfig,
        http: Arc<dyn HttpClient>,
        storage: Arc<dyn Storage>,
        bus: ChangeBus,
    ) -> Self {
        let store = CredentialStore::new(storage, config);
        let handle = Arc::new(SessionHandle::new(store, bus));
        let client = RemoteClient::new(http, config).with_session(handle.clone());
        Self {
            handle,
            client,
            config: config.clone(),
        }
    }

    /// Client that carries this session's token and invalidates it on 401/403.
    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    pub fn handle(&self) -> Arc<SessionHandle> {
        Arc::clone(&self.handle)
    }

    pub fn snapshot(&self) -> Session {
        self.handle.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.handle.subscribe()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.handle.snapshot().has_role(role)
    }

    /// Rebuild the session from storage and verify it.
    ///
    /// Never fails: any problem leaves the session anonymous.
    pub async fn restore(&self) -> Session {
        let Some(credential) = self.handle.store().load() else {
            tracing::debug!("No persisted credential");
            return self.snapshot();
        };

        self.handle.begin_verify(credential);
        if let Err(err) = self.verify().await {
            tracing::info!(error = %err, "Persisted credential rejected");
        }
        self.snapshot()
    }

    /// Check the current credential with the gateway.
    ///
    /// Any failure, transport errors included, clears the session.
    pub async fn verify(&self) -> Result<UserProfile, SessionError> {
        let token = self.handle.snapshot().token().map(str::to_string);
        let Some(token) = token else {
            return Err(SessionError::NotAuthenticated);
        };

        let result = self
            .client
            .request::<VerifyBody, ()>(Method::Get, "/auth/verify", None, &RequestOptions::default())
            .await;

        match result {
            Ok(body) => match self.handle.confirm(&token, body.user.clone()) {
                Some(_) => Ok(body.user),
                None => Err(SessionError::NotAuthenticated),
            },
            Err(err) => {
                self.handle.clear_if_current(Some(&token));
                Err(SessionError::Api(err))
            }
        }
    }

    /// Exchange an identifier and secret for a credential.
    ///
    /// On failure the previous session is left untouched.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<Session, SessionError> {
        let body = LoginRequest { identifier, secret };
        let grant: AuthGrant = self
            .client
            .request(Method::Post, "/auth/login", Some(&body), &RequestOptions::anonymous())
            .await
            .map_err(SessionError::login)?;

        tracing::info!(user_id = grant.user.id, "Logged in");
        Ok(self.adopt(grant))
    }

    /// Create an account and sign in with the returned credential.
    pub async fn register<B>(&self, fields: &B) -> Result<Session, SessionError>
    where
        B: Serialize + ?Sized,
    {
        let grant: AuthGrant = self
            .client
            .request(Method::Post, "/auth/register", Some(fields), &RequestOptions::anonymous())
            .await
            .map_err(SessionError::register)?;

        tracing::info!(user_id = grant.user.id, "Registered");
        Ok(self.adopt(grant))
    }

    /// Exchange the refresh token for a new bearer token.
    ///
    /// Any failure clears the session locally; the remote logout is skipped
    /// because the credential is already known to be bad.
    pub async fn refresh(&self) -> Result<Session, SessionError> {
        let current = self.handle.snapshot().credential().cloned();
        let Some(Credential {
            token,
            refresh_token: Some(refresh_token),
        }) = current
        else {
            tracing::warn!("Refresh requested without a refresh token");
            self.handle.clear();
            return Err(SessionError::NotAuthenticated);
        };

        let body = RefreshRequest {
            refresh_token: &refresh_token,
        };
        let options = RequestOptions::default().with_bearer(refresh_token.as_str());
        let grant = self
            .client
            .request::<RefreshGrant, _>(Method::Post, "/auth/refresh", Some(&body), &options)
            .await;

        match grant {
            Ok(grant) => {
                let refreshed =
                    Credential::new(grant.token, grant.refresh_token.or(Some(refresh_token)));
                match self.handle.replace_credential(&token, refreshed) {
                    Some(session) => {
                        tracing::info!("Bearer token refreshed");
                        Ok(session)
                    }
                    None => Err(SessionError::NotAuthenticated),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Token refresh failed");
                self.handle.clear();
                Err(SessionError::Refresh(err))
            }
        }
    }

    /// Refresh ahead of time when the bearer token is about to expire.
    pub async fn ensure_fresh(&self) -> Result<(), SessionError> {
        let snapshot = self.handle.snapshot();
        let Some(credential) = snapshot.credential() else {
            return Ok(());
        };
        if credential.refresh_token.is_none() || !credential.expires_within(self.config.refresh_skew) {
            return Ok(());
        }

        tracing::debug!("Bearer token expiring soon, refreshing");
        self.refresh().await.map(|_| ())
    }

    /// Tell the gateway we are leaving, then clear everything locally.
    ///
    /// The remote call is best-effort. `Cleared` is always emitted, once.
    pub async fn logout(&self) {
        let result = if self.handle.snapshot().credential().is_some() {
            self.client
                .request::<serde_json::Value, ()>(
                    Method::Post,
                    "/auth/logout",
                    None,
                    &RequestOptions::default(),
                )
                .await
                .map(|_| ())
        } else {
            Ok(())
        };

        let intercepted = match &result {
            Err(err) => {
                tracing::warn!(error = %err, "Remote logout failed");
                err.requires_reauth()
            }
            Ok(()) => false,
        };

        if !self.handle.clear() && !intercepted {
            self.handle.bus().emit(CredentialChange::Cleared);
        }
        tracing::info!("Logged out");
    }

    /// Clear the session after an authorization failure seen elsewhere.
    ///
    /// Returns whether a credential was actually dropped.
    pub fn invalidate(&self) -> bool {
        self.handle.clear()
    }

    fn adopt(&self, grant: AuthGrant) -> Session {
        let credential = Credential::new(grant.token, grant.refresh_token);
        self.handle.establish(credential, grant.user)
    }
}
