//! Common test utilities for integration tests.
//!
//! Fixtures wire the real reqwest adapter to a wiremock server, with a
//! private change bus and in-memory or temp-dir storage.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sessionkit::adapters::{InMemoryStorage, ReqwestHttpClient};
use sessionkit::auth::SessionManager;
use sessionkit::bus::{ChangeBus, CredentialChange, Subscription};
use sessionkit::config::ClientConfig;
use sessionkit::traits::Storage;

/// Namespace used by every fixture.
pub const NAMESPACE: &str = "itest";

/// Config pointed at `server` with short retry delays.
pub fn test_config(server: &MockServer) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(server.uri())
        .with_storage_namespace(NAMESPACE)
        .with_retry_base_delay(Duration::from_millis(10))
        .with_request_timeout(Duration::from_secs(2))
}

/// Login success body in the gateway's envelope shape.
pub fn grant_body(token: &str, user: Value) -> Value {
    json!({
        "data": { "user": user, "token": token },
        "message": "Login successful"
    })
}

/// Mount a successful `POST /auth/login`.
pub async fn mount_login(server: &MockServer, token: &str, user: Value) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant_body(token, user)))
        .mount(server)
        .await;
}

/// A session manager on a private bus, plus the storage it writes to.
pub struct Harness {
    pub config: ClientConfig,
    pub storage: InMemoryStorage,
    pub bus: ChangeBus,
    pub manager: SessionManager,
}

impl Harness {
    pub fn new(server: &MockServer) -> Self {
        Self::with_storage(test_config(server), InMemoryStorage::new())
    }

    pub fn with_storage(config: ClientConfig, storage: InMemoryStorage) -> Self {
        let bus = ChangeBus::new();
        let manager = SessionManager::new(
            &config,
            Arc::new(ReqwestHttpClient::new()),
            Arc::new(storage.clone()) as Arc<dyn Storage>,
            bus.clone(),
        );
        Self {
            config,
            storage,
            bus,
            manager,
        }
    }

    /// Stored token slot, as raw JSON text.
    pub fn stored_token(&self) -> Option<String> {
        self.storage.get(&self.config.slot("token"))
    }
}

/// Records every change emitted on a bus.
pub struct ChangeLog {
    changes: Arc<Mutex<Vec<CredentialChange>>>,
    _subscription: Subscription,
}

impl ChangeLog {
    pub fn attach(bus: &ChangeBus) -> Self {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        let subscription = bus.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
        Self {
            changes,
            _subscription: subscription,
        }
    }

    pub fn changes(&self) -> Vec<CredentialChange> {
        self.changes.lock().unwrap().clone()
    }

    pub fn cleared_count(&self) -> usize {
        self.changes()
            .iter()
            .filter(|change| matches!(change, CredentialChange::Cleared))
            .count()
    }
}
