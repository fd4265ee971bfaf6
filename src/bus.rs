//! In-process change bus for credential updates.
//!
//! One topic, synchronous delivery, subscription order. Observers that do
//! not share ownership of the session (mirrors held by independent parts of
//! an application) learn about logins and logouts here.
//!
//! Delivery happens inside [`ChangeBus::emit`] on the caller's thread. The
//! handler list is snapshotted before delivery, so a handler may drop its own
//! [`Subscription`] or subscribe new handlers without deadlocking; newly added
//! handlers only see later emits. A handler that emits again on the same bus
//! delivers that nested change to every handler before the outer emit
//! continues.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use once_cell::sync::Lazy;

use crate::auth::Credential;

/// Payload of a credential change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialChange {
    /// A new credential is active.
    Set(Credential),
    /// The credential was removed.
    Cleared,
    /// Something changed but the emitter does not know the new value.
    /// Subscribers must re-read durable storage rather than assume emptiness.
    Unknown,
}

type Handler = Arc<dyn Fn(&CredentialChange) + Send + Sync>;

struct Inner {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler)>>,
}

/// Synchronous publish/subscribe channel. Clones share subscribers.
#[derive(Clone)]
pub struct ChangeBus {
    inner: Arc<Inner>,
}

static GLOBAL: Lazy<ChangeBus> = Lazy::new(ChangeBus::new);

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ChangeBus {
    /// Create a private bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The process-wide bus.
    pub fn global() -> ChangeBus {
        GLOBAL.clone()
    }

    /// Register a handler. It stays registered until the returned guard is
    /// dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CredentialChange) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_handlers().push((id, Arc::new(handler)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `change` to every current subscriber, in subscription order.
    pub fn emit(&self, change: CredentialChange) {
        let snapshot: Vec<Handler> = self
            .lock_handlers()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        tracing::debug!(
            change = change_kind(&change),
            subscribers = snapshot.len(),
            "Emitting credential change"
        );
        for handler in snapshot {
            handler(&change);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_handlers().len()
    }

    fn lock_handlers(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Handler)>> {
        lock(&self.inner.handlers)
    }
}

fn lock(handlers: &Mutex<Vec<(u64, Handler)>>) -> std::sync::MutexGuard<'_, Vec<(u64, Handler)>> {
    // Handlers never run under this lock.
    handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn change_kind(change: &CredentialChange) -> &'static str {
    match change {
        CredentialChange::Set(_) => "set",
        CredentialChange::Cleared => "cleared",
        CredentialChange::Unknown => "unknown",
    }
}

/// Guard returned by [`ChangeBus::subscribe`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<Inner>,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            lock(&inner.handlers).retain(|(id, _)| *id != self.id);
        }
    }
}
