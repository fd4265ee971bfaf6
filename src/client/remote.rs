use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::envelope::{self, Payload};
use super::{RequestOptions, SessionHooks};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::traits::{HttpClient, Method, Request, Response};

/// HTTP client for the resource gateway.
///
/// Cheap to clone; clones share the transport and the session hooks.
///
/// # Example
///
/// ```ignore
/// use sessionkit::client::{RemoteClient, RequestOptions};
///
/// let client = RemoteClient::new(http, &config).with_session(handle);
/// let venues: Vec<Venue> = client.get("/venues").await?;
/// ```
#[derive(Clone)]
pub struct RemoteClient {
    http: Arc<dyn HttpClient>,
    config: ClientConfig,
    executor: RetryExecutor,
    session: Option<Arc<dyn SessionHooks>>,
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("base_url", &self.config.base_url)
            .field("policy", self.executor.policy())
            .field("has_session", &self.session.is_some())
            .finish()
    }
}

impl RemoteClient {
    pub fn new(http: Arc<dyn HttpClient>, config: &ClientConfig) -> Self {
        Self {
            http,
            config: config.clone(),
            executor: RetryExecutor::new(RetryPolicy::from_config(config)),
            session: None,
        }
    }

    /// Attach the session that supplies tokens and receives auth failures.
    pub fn with_session(mut self, session: Arc<dyn SessionHooks>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Issue a call and decode its success body as `T`.
    ///
    /// Bare and enveloped bodies are both accepted.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.send(method, path, body, options).await?;
        Ok(Payload::<T>::decode(&response.body)?.into_inner())
    }

    /// Issue a call and return the raw success response.
    pub async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::InvalidRequest {
                message: format!("Failed to serialize request body: {}", e),
            })?;
        let url = self.config.endpoint(path);

        self.executor
            .run(options.abort.as_ref(), |attempt| {
                let token = self.resolve_token(options);
                let request = self.build_request(method, &url, body.clone(), token.as_deref());
                async move {
                    tracing::debug!(%method, url = %request.url, attempt, "Sending request");
                    let response = self.http.send(request).await?;
                    self.classify(method, response, options, token.as_deref())
                }
            })
            .await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::Get, path, None, &RequestOptions::default())
            .await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::Post, path, Some(body), &RequestOptions::default())
            .await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::Put, path, Some(body), &RequestOptions::default())
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::Delete, path, None, &RequestOptions::default())
            .await
    }

    /// Token for one attempt. The session token is re-read every time, so a
    /// retry after invalidation goes out without one.
    fn resolve_token(&self, options: &RequestOptions) -> Option<String> {
        match (&options.bearer, options.skip_auth) {
            (Some(token), _) => Some(token.clone()),
            (None, false) => self.session.as_ref().and_then(|s| s.bearer_token()),
            (None, true) => None,
        }
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        token: Option<&str>,
    ) -> Request {
        let mut request = Request::new(method, url).header("Accept", "application/json");
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }
        request
    }

    fn classify(
        &self,
        method: Method,
        response: Response,
        options: &RequestOptions,
        sent_token: Option<&str>,
    ) -> Result<Response, ApiError> {
        if response.is_success() {
            return Ok(response);
        }

        let err = ApiError::from_status(response.status, envelope::error_message(&response.body));
        tracing::debug!(%method, status = response.status, error = %err, "Request failed");

        if err.requires_reauth() && !options.skip_auth {
            if let Some(session) = &self.session {
                session.on_auth_failure(response.status, sent_token);
            }
        }
        Err(err)
    }
}
