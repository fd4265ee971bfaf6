//! Resource key to store mapping for one application.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CacheStrategy, Entity, LocalStore, RemoteCache, ResourceStore};
use crate::client::RemoteClient;
use crate::config::ClientConfig;
use crate::traits::Storage;

type StoreKey = (String, TypeId);

/// Hands out one shared store per resource key and entity type.
///
/// Resources listed in [`ClientConfig::local_resources`] or registered as
/// [`CacheStrategy::LocalAuthoritative`] are kept in storage; everything else
/// is fetched from the gateway.
pub struct ResourceRegistry {
    client: RemoteClient,
    storage: Arc<dyn Storage>,
    config: ClientConfig,
    strategies: Mutex<HashMap<String, CacheStrategy>>,
    stores: Mutex<HashMap<StoreKey, Arc<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("strategies", &*lock(&self.strategies))
            .field("open_stores", &lock(&self.stores).len())
            .finish()
    }
}

impl ResourceRegistry {
    pub fn new(client: RemoteClient, storage: Arc<dyn Storage>, config: &ClientConfig) -> Self {
        let strategies = config
            .local_resources
            .iter()
            .map(|resource| (resource.clone(), CacheStrategy::LocalAuthoritative))
            .collect();

        Self {
            client,
            storage,
            config: config.clone(),
            strategies: Mutex::new(strategies),
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Pin `resource` to a strategy. Stores opened earlier keep theirs.
    pub fn register(&self, resource: impl Into<String>, strategy: CacheStrategy) {
        lock(&self.strategies).insert(resource.into(), strategy);
    }

    pub fn strategy_for(&self, resource: &str) -> CacheStrategy {
        lock(&self.strategies)
            .get(resource)
            .copied()
            .unwrap_or_default()
    }

    /// The store for `resource`, created on first use.
    ///
    /// Every call with the same key and entity type returns the same store,
    /// so callers share one cached list.
    pub fn open<T: Entity>(&self, resource: &str) -> Arc<dyn ResourceStore<T>> {
        let key = (resource.to_string(), TypeId::of::<T>());
        let mut stores = lock(&self.stores);

        if let Some(store) = stores
            .get(&key)
            .and_then(|any| any.downcast_ref::<Arc<dyn ResourceStore<T>>>())
        {
            return Arc::clone(store);
        }

        let store: Arc<dyn ResourceStore<T>> = match self.strategy_for(resource) {
            CacheStrategy::RemoteBacked => Arc::new(RemoteCache::new(self.client.clone(), resource)),
            CacheStrategy::LocalAuthoritative => {
                Arc::new(LocalStore::new(Arc::clone(&self.storage), &self.config, resource))
            }
        };
        tracing::debug!(resource, strategy = %store.strategy(), "Opened resource store");

        stores.insert(key, Arc::new(Arc::clone(&store)));
        store
    }
}

fn lock<K, V>(map: &Mutex<HashMap<K, V>>) -> MutexGuard<'_, HashMap<K, V>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
