//! Independent observers of the session.
//!
//! A [`SessionMirror`] is for code that cannot hold the [`SessionManager`]
//! (another front end in the same process, a plugin). It follows the change
//! bus and, when a change arrives without a payload, re-reads the credential
//! slot instead of assuming the session is gone.
//!
//! [`SessionManager`]: super::SessionManager

use std::sync::{Arc, Mutex};

use super::credentials::{Credential, CredentialStore};
use crate::bus::{ChangeBus, CredentialChange, Subscription};

/// A locally held copy of the current credential, kept in sync by the bus.
///
/// Dropping the mirror unsubscribes it.
#[derive(Debug)]
pub struct SessionMirror {
    credential: Arc<Mutex<Option<Credential>>>,
    store: CredentialStore,
    _subscription: Subscription,
}

impl SessionMirror {
    /// Load the persisted credential and start following `bus`.
    pub fn attach(bus: &ChangeBus, store: CredentialStore) -> Self {
        let credential = Arc::new(Mutex::new(store.load()));

        let shared = Arc::clone(&credential);
        let reader = store.clone();
        let subscription = bus.subscribe(move |change| {
            let next = match change {
                CredentialChange::Set(credential) => Some(credential.clone()),
                CredentialChange::Cleared => None,
                CredentialChange::Unknown => reader.load(),
            };
            *lock(&shared) = next;
        });

        Self {
            credential,
            store,
            _subscription: subscription,
        }
    }

    pub fn credential(&self) -> Option<Credential> {
        lock(&self.credential).clone()
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.credential).as_ref().map(|c| c.token.clone())
    }

    /// Holding a credential; it may not have been verified.
    pub fn is_authenticated(&self) -> bool {
        lock(&self.credential).is_some()
    }

    /// Re-read the credential slot now.
    pub fn resync(&self) {
        *lock(&self.credential) = self.store.load();
    }
}

fn lock(credential: &Mutex<Option<Credential>>) -> std::sync::MutexGuard<'_, Option<Credential>> {
    credential
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
