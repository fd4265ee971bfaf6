//! Client configuration.
//!
//! Every knob has a default and can be overridden with the builder methods or
//! through `SESSIONKIT_*` environment variables.

use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
/// Default storage namespace.
pub const DEFAULT_NAMESPACE: &str = "sessionkit";

/// Configuration for the remote client, retry executor and session store.
///
/// # Example
///
/// ```ignore
/// use sessionkit::config::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_base_url("https://api.example.com")
///     .with_retry_attempts(5)
///     .with_request_timeout(Duration::from_secs(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL, without a trailing slash
    pub base_url: String,
    /// Total attempts per call, including the first (default: 3)
    pub retry_attempts: u32,
    /// Bound on each individual attempt (default: 10s)
    pub request_timeout: Duration,
    /// Base of the linear backoff between attempts (default: 1s)
    pub retry_base_delay: Duration,
    /// Prefix for every storage slot (default: "sessionkit")
    pub storage_namespace: String,
    /// Refresh the bearer token when it expires within this window (default: 60s)
    pub refresh_skew: Duration,
    /// Resources served from local storage instead of the API
    pub local_resources: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            retry_attempts: 3,
            request_timeout: Duration::from_millis(10_000),
            retry_base_delay: Duration::from_millis(1_000),
            storage_namespace: DEFAULT_NAMESPACE.to_string(),
            refresh_skew: Duration::from_secs(60),
            local_resources: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Create a new ClientConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL. A trailing slash is dropped.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the number of attempts per call. Zero is treated as one.
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_storage_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.storage_namespace = namespace.into();
        self
    }

    pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    /// Mark a resource as locally authoritative.
    pub fn with_local_resource(mut self, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        if !self.local_resources.contains(&resource) {
            self.local_resources.push(resource);
        }
        self
    }

    /// Storage slot name for `suffix` under this namespace.
    pub fn slot(&self, suffix: &str) -> String {
        format!("{}:{}", self.storage_namespace, suffix)
    }

    /// Storage slot for a locally persisted collection.
    ///
    /// Collections live under their own prefix so a resource named `token`
    /// cannot overwrite the credential slots.
    pub fn collection_slot(&self, resource: &str) -> String {
        self.slot(&format!("collection:{resource}"))
    }

    /// Full URL for an API path such as `/auth/login`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Create config from the process environment.
    ///
    /// Reads `SESSIONKIT_API_URL`, `SESSIONKIT_RETRY_ATTEMPTS`,
    /// `SESSIONKIT_TIMEOUT_MS`, `SESSIONKIT_RETRY_DELAY_MS`,
    /// `SESSIONKIT_NAMESPACE` and `SESSIONKIT_LOCAL_RESOURCES`
    /// (comma separated). Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("SESSIONKIT_API_URL").filter(|v| !v.trim().is_empty()) {
            config = config.with_base_url(url.trim());
        }
        if let Some(attempts) = parse_number(&lookup, "SESSIONKIT_RETRY_ATTEMPTS") {
            config = config.with_retry_attempts(attempts as u32);
        }
        if let Some(ms) = parse_number(&lookup, "SESSIONKIT_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_number(&lookup, "SESSIONKIT_RETRY_DELAY_MS") {
            config.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(ns) = lookup("SESSIONKIT_NAMESPACE").filter(|v| !v.trim().is_empty()) {
            config.storage_namespace = ns.trim().to_string();
        }
        if let Some(list) = lookup("SESSIONKIT_LOCAL_RESOURCES") {
            for resource in list.split(',').map(str::trim).filter(|r| !r.is_empty()) {
                config = config.with_local_resource(resource);
            }
        }

        config
    }
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value <= u32::MAX as u64 => Some(value),
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring invalid configuration value");
            None
        }
    }
}
