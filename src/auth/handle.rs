//! The single owner of session state.
//!
//! [`SessionHandle`] holds the authoritative [`Session`] behind a mutex and
//! publishes every change on a `watch` channel and the change bus. The lock
//! is never held while the bus runs handlers, so they may read the snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;

use super::api::UserProfile;
use super::credentials::{Credential, CredentialStore};
use crate::bus::{ChangeBus, CredentialChange};
use crate::client::SessionHooks;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// A credential is held but has not been verified yet.
    Loading,
    Anonymous,
    Authenticated,
}

/// Snapshot of the session.
///
/// Only the constructors below build a `Session`, so a missing credential
/// always means [`LifecycleState::Anonymous`].
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    credential: Option<Credential>,
    profile: Option<UserProfile>,
    state: LifecycleState,
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            credential: None,
            profile: None,
            state: LifecycleState::Anonymous,
        }
    }

    pub(crate) fn loading(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
            profile: None,
            state: LifecycleState::Loading,
        }
    }

    pub(crate) fn authenticated(credential: Credential, profile: Option<UserProfile>) -> Self {
        Self {
            credential: Some(credential),
            profile,
            state: LifecycleState::Authenticated,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// The bearer token, if any.
    pub fn token(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.token.as_str())
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == LifecycleState::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.state == LifecycleState::Loading
    }

    /// Role check against the verified profile, falling back to the
    /// token's decoded claims.
    pub fn has_role(&self, role: &str) -> bool {
        if let Some(profile) = &self.profile {
            return profile.has_role(role);
        }
        self.credential
            .as_ref()
            .and_then(Credential::claims)
            .and_then(|claims| claims.role)
            .is_some_and(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Shared owner of the current [`Session`].
///
/// Every transition updates the state, the storage slots and the `watch`
/// value under one lock, so those three never disagree. Bus events are
/// emitted after the lock is released and carry the revision they were
/// made at; an event whose revision has been superseded is dropped.
#[derive(Debug)]
pub struct SessionHandle {
    state: Mutex<Session>,
    revision: AtomicU64,
    updates: watch::Sender<Session>,
    store: CredentialStore,
    bus: ChangeBus,
}

impl SessionHandle {
    pub fn new(store: CredentialStore, bus: ChangeBus) -> Self {
        let (updates, _rx) = watch::channel(Session::anonymous());
        Self {
            state: Mutex::new(Session::anonymous()),
            revision: AtomicU64::new(0),
            updates,
            store,
            bus,
        }
    }

    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.updates.subscribe()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Adopt a restored credential pending verification. Nothing is emitted
    /// on the bus: the credential came from the shared slot.
    pub(crate) fn begin_verify(&self, credential: Credential) {
        let mut state = self.lock();
        self.transition(&mut state, Session::loading(credential));
    }

    /// Persist a freshly granted credential and become authenticated.
    pub(crate) fn establish(&self, credential: Credential, profile: UserProfile) -> Session {
        let (session, revision) = {
            let mut state = self.lock();
            self.store.save(&credential);
            let session = Session::authenticated(credential.clone(), Some(profile));
            (session.clone(), self.transition(&mut state, session))
        };
        self.announce(revision, CredentialChange::Set(credential));
        session
    }

    /// Record a verified profile for `token`.
    ///
    /// Returns `None` when the session moved on (cleared or replaced) while
    /// verification was in flight.
    pub(crate) fn confirm(&self, token: &str, profile: UserProfile) -> Option<Session> {
        let (session, revision, was_loading) = {
            let mut state = self.lock();
            let credential = state.credential().filter(|c| c.token == token)?.clone();
            let was_loading = state.is_loading();
            let session = Session::authenticated(credential, Some(profile));
            let revision = self.transition(&mut state, session.clone());
            (session, revision, was_loading)
        };

        if was_loading {
            if let Some(credential) = session.credential() {
                self.announce(revision, CredentialChange::Set(credential.clone()));
            }
        }
        Some(session)
    }

    /// Swap in a refreshed credential for the session holding `old_token`.
    pub(crate) fn replace_credential(&self, old_token: &str, credential: Credential) -> Option<Session> {
        let (session, revision) = {
            let mut state = self.lock();
            if state.token() != Some(old_token) {
                return None;
            }
            self.store.save(&credential);
            let session = Session::authenticated(credential.clone(), state.profile().cloned());
            (session.clone(), self.transition(&mut state, session))
        };

        self.announce(revision, CredentialChange::Set(credential));
        Some(session)
    }

    /// Drop the credential and both storage slots.
    ///
    /// Returns whether a credential was actually held. `Cleared` is emitted
    /// only in that case, so concurrent callers produce one event.
    pub fn clear(&self) -> bool {
        let mut state = self.lock();
        let held = state.credential.is_some();
        self.finish_clear(state, held)
    }

    /// Like [`clear`](Self::clear), but only if `token` is still current.
    pub fn clear_if_current(&self, token: Option<&str>) -> bool {
        let state = self.lock();
        if state.credential.is_none() || state.token() != token {
            return false;
        }
        self.finish_clear(state, true)
    }

    fn finish_clear(&self, mut state: MutexGuard<'_, Session>, held: bool) -> bool {
        self.store.clear();
        if !held {
            return false;
        }
        let revision = self.transition(&mut state, Session::anonymous());
        drop(state);

        tracing::info!("Session cleared");
        self.announce(revision, CredentialChange::Cleared);
        true
    }

    /// Install `next` and publish it on the `watch` channel. Must be called
    /// with the state lock held; returns the new revision.
    fn transition(&self, state: &mut MutexGuard<'_, Session>, next: Session) -> u64 {
        **state = next.clone();
        self.updates.send_replace(next);
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Emit `change` unless a later transition has already happened.
    fn announce(&self, revision: u64, change: CredentialChange) {
        if self.revision.load(Ordering::SeqCst) != revision {
            tracing::debug!(revision, "Dropping superseded credential change");
            return;
        }
        self.bus.emit(change);
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionHooks for SessionHandle {
    fn bearer_token(&self) -> Option<String> {
        self.lock().token().map(str::to_string)
    }

    fn on_auth_failure(&self, status: u16, sent_token: Option<&str>) {
        if self.clear_if_current(sent_token) {
            tracing::warn!(status, "Credential rejected by the gateway; session invalidated");
        } else {
            tracing::debug!(status, "Auth failure for a credential that is no longer current");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::InMemoryStorage;
    use crate::config::ClientConfig;
    use serde_json::Map;
    use std::sync::Arc;

    fn profile(id: i64, role: &str) -> UserProfile {
        UserProfile {
            id,
            email: None,
            name: None,
            role: Some(role.to_string()),
            extra: Map::new(),
        }
    }

    fn handle_with(storage: &InMemoryStorage, bus: &ChangeBus) -> SessionHandle {
        let config = ClientConfig::default().with_storage_namespace("test");
        SessionHandle::new(
            CredentialStore::new(Arc::new(storage.clone()), &config),
            bus.clone(),
        )
    }

    fn record(bus: &ChangeBus) -> (Arc<Mutex<Vec<CredentialChange>>>, crate::bus::Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let sub = bus.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
        (log, sub)
    }

    #[test]
    fn test_starts_anonymous() {
        let handle = handle_with(&InMemoryStorage::new(), &ChangeBus::new());
        let session = handle.snapshot();
        assert_eq!(session.state(), LifecycleState::Anonymous);
        assert!(!session.is_authenticated());
        assert!(!session.is_loading());
        assert!(handle.bearer_token().is_none());
    }

    #[test]
    fn test_establish_persists_and_emits() {
        let storage = InMemoryStorage::new();
        let bus = ChangeBus::new();
        let (log, _sub) = record(&bus);
        let handle = handle_with(&storage, &bus);
        let mut rx = handle.subscribe();

        let credential = Credential::new("t1", Some("r1".to_string()));
        handle.establish(credential.clone(), profile(1, "ADMIN"));

        assert!(handle.snapshot().is_authenticated());
        assert!(handle.snapshot().has_role("admin"));
        assert_eq!(storage.get("test:token").as_deref(), Some("\"t1\""));
        assert_eq!(*log.lock().unwrap(), vec![CredentialChange::Set(credential)]);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let storage = InMemoryStorage::new();
        let bus = ChangeBus::new();
        let (log, _sub) = record(&bus);
        let handle = handle_with(&storage, &bus);
        handle.establish(Credential::new("t1", None), profile(1, "USER"));

        assert!(handle.clear());
        assert!(!handle.clear());
        assert!(!handle.clear_if_current(None));

        let events = log.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], CredentialChange::Cleared);
        assert!(storage.get("test:token").is_none());
        assert_eq!(handle.snapshot(), Session::anonymous());
    }

    #[test]
    fn test_stale_auth_failure_keeps_new_session() {
        let bus = ChangeBus::new();
        let handle = handle_with(&InMemoryStorage::new(), &bus);
        handle.establish(Credential::new("new-token", None), profile(1, "USER"));

        handle.on_auth_failure(401, Some("old-token"));
        assert!(handle.snapshot().is_authenticated());

        handle.on_auth_failure(401, Some("new-token"));
        assert!(!handle.snapshot().is_authenticated());
    }

    #[test]
    fn test_concurrent_auth_failures_clear_once() {
        let bus = ChangeBus::new();
        let (log, _sub) = record(&bus);
        let handle = Arc::new(handle_with(&InMemoryStorage::new(), &bus));
        handle.establish(Credential::new("t", None), profile(1, "USER"));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                std::thread::spawn(move || handle.on_auth_failure(401, Some("t")))
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let cleared = log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == CredentialChange::Cleared)
            .count();
        assert_eq!(cleared, 1);
    }

    #[test]
    fn test_confirm_after_loading_emits_set() {
        let bus = ChangeBus::new();
        let (log, _sub) = record(&bus);
        let handle = handle_with(&InMemoryStorage::new(), &bus);
        let credential = Credential::new("t", None);

        handle.begin_verify(credential.clone());
        assert!(handle.snapshot().is_loading());
        assert_eq!(handle.bearer_token().as_deref(), Some("t"));
        assert!(log.lock().unwrap().is_empty());

        assert!(handle.confirm("other", profile(2, "USER")).is_none());
        let session = handle.confirm("t", profile(2, "USER")).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(*log.lock().unwrap(), vec![CredentialChange::Set(credential)]);

        // Re-verifying an authenticated session is silent
        handle.confirm("t", profile(2, "USER")).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_replace_credential_keeps_profile() {
        let storage = InMemoryStorage::new();
        let handle = handle_with(&storage, &ChangeBus::new());
        handle.establish(Credential::new("t1", Some("r1".to_string())), profile(3, "VENDOR"));

        assert!(handle
            .replace_credential("stale", Credential::new("x", None))
            .is_none());
        let session = handle
            .replace_credential("t1", Credential::new("t2", Some("r1".to_string())))
            .unwrap();

        assert_eq!(session.token(), Some("t2"));
        assert_eq!(session.profile().map(|p| p.id), Some(3));
        assert_eq!(storage.get("test:token").as_deref(), Some("\"t2\""));
    }

    #[test]
    fn test_bus_handler_can_read_snapshot() {
        let bus = ChangeBus::new();
        let handle = Arc::new(handle_with(&InMemoryStorage::new(), &bus));
        let seen = Arc::new(Mutex::new(None));

        let reader = Arc::clone(&handle);
        let sink = Arc::clone(&seen);
        let _sub = bus.subscribe(move |_| {
            *sink.lock().unwrap() = Some(reader.snapshot().is_authenticated());
        });

        handle.establish(Credential::new("t", None), profile(1, "USER"));
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn test_superseded_change_is_not_announced() {
        let bus = ChangeBus::new();
        let (log, _sub) = record(&bus);
        let handle = handle_with(&InMemoryStorage::new(), &bus);
        let credential = Credential::new("t", None);
        handle.establish(credential.clone(), profile(1, "USER"));
        let revision = handle.revision.load(Ordering::SeqCst);

        assert!(handle.clear_if_current(Some("t")));
        handle.announce(revision, CredentialChange::Set(credential.clone()));

        assert_eq!(
            *log.lock().unwrap(),
            vec![CredentialChange::Set(credential), CredentialChange::Cleared]
        );
    }

    #[test]
    fn test_racing_establish_and_clear_keep_watch_and_storage_in_step() {
        let storage = InMemoryStorage::new();
        let handle = Arc::new(handle_with(&storage, &ChangeBus::new()));
        let rx = handle.subscribe();

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let handle = Arc::clone(&handle);
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let token = format!("t{i}-{round}");
                        handle.establish(Credential::new(token.clone(), None), profile(1, "USER"));
                        handle.clear_if_current(Some(&token));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let session = handle.snapshot();
        assert_eq!(*rx.borrow(), session);
        let stored = storage.get("test:token").map(|raw| raw.trim_matches('"').to_string());
        assert_eq!(stored.as_deref(), session.token());
    }
}
