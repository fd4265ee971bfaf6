//! Locally authoritative store: the collection lives in durable storage.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{merge_patch, CacheStrategy, Entity, ResourceStore};
use crate::config::ClientConfig;
use crate::error::ResourceError;
use crate::traits::Storage;

/// Highest id handed out by any store in this process.
static LAST_ISSUED_ID: AtomicI64 = AtomicI64::new(0);

/// Issue an id strictly greater than `floor` and than every id issued before.
///
/// The base is the wall clock in milliseconds scaled by 1000, plus a random
/// tiebreaker below 1000. Returns `None` once no larger id exists.
fn next_id(floor: i64) -> Option<i64> {
    let tiebreaker = (Uuid::new_v4().as_u128() % 1000) as i64;
    let candidate = chrono::Utc::now()
        .timestamp_millis()
        .saturating_mul(1000)
        .saturating_add(tiebreaker);
    let pick = |last: i64| -> Option<i64> {
        Some(candidate.max(last.checked_add(1)?).max(floor.checked_add(1)?))
    };

    LAST_ISSUED_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, pick)
        .ok()
        .and_then(pick)
}

/// A collection persisted under `"{namespace}:collection:{resource}"` that never talks
/// to the network.
///
/// The slot is read once, lazily; afterwards the in-memory copy is the
/// authority and the whole collection is written back after every mutation.
/// A failed write is logged and the mutation still succeeds.
pub struct LocalStore<T> {
    resource: String,
    slot: String,
    storage: Arc<dyn Storage>,
    items: Mutex<Option<Vec<T>>>,
}

impl<T> std::fmt::Debug for LocalStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("resource", &self.resource)
            .field("slot", &self.slot)
            .finish()
    }
}

impl<T: Entity> LocalStore<T> {
    pub fn new(storage: Arc<dyn Storage>, config: &ClientConfig, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self {
            slot: config.collection_slot(&resource),
            resource,
            storage,
            items: Mutex::new(None),
        }
    }

    /// Storage slot holding this collection.
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Populate the collection if it is empty. Returns whether `items` were
    /// written.
    pub fn seed(&self, items: Vec<T>) -> bool {
        let mut guard = self.loaded();
        let current = guard.get_or_insert_with(Vec::new);
        if !current.is_empty() {
            return false;
        }
        *current = items;
        self.persist(current);
        true
    }

    /// Forget the in-memory copy; the next access re-reads storage.
    pub fn reload(&self) {
        *lock(&self.items) = None;
    }

    fn loaded(&self) -> MutexGuard<'_, Option<Vec<T>>> {
        let mut guard = lock(&self.items);
        if guard.is_none() {
            *guard = Some(self.read_slot());
        }
        guard
    }

    fn read_slot(&self) -> Vec<T> {
        let raw = match self.storage.read(&self.slot) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(resource = %self.resource, error = %e, "Failed to read collection, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(resource = %self.resource, error = %e, "Stored collection is unreadable, starting empty");
                Vec::new()
            }
        }
    }

    fn persist(&self, items: &[T]) {
        let serialized = match serde_json::to_string(items) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::warn!(resource = %self.resource, error = %e, "Failed to serialize collection");
                return;
            }
        };
        if let Err(e) = self.storage.write(&self.slot, &serialized) {
            tracing::warn!(resource = %self.resource, error = %e, "Failed to persist collection");
        }
    }

    fn not_found(&self, id: i64) -> ResourceError {
        ResourceError::NotFound {
            resource: self.resource.clone(),
            id,
        }
    }
}

#[async_trait]
impl<T: Entity> ResourceStore<T> for LocalStore<T> {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn strategy(&self) -> CacheStrategy {
        CacheStrategy::LocalAuthoritative
    }

    async fn list(&self) -> Result<Vec<T>, ResourceError> {
        Ok(self.loaded().as_ref().cloned().unwrap_or_default())
    }

    async fn get_by_id(&self, id: i64) -> Result<T, ResourceError> {
        self.loaded()
            .iter()
            .flatten()
            .find(|item| item.id() == id)
            .cloned()
            .ok_or_else(|| self.not_found(id))
    }

    async fn add(&self, item: T) -> Result<T, ResourceError> {
        let mut guard = self.loaded();
        let items = guard.get_or_insert_with(Vec::new);

        let highest = items.iter().map(Entity::id).max().unwrap_or(0);
        let id = next_id(highest).ok_or_else(|| ResourceError::Payload {
            resource: self.resource.clone(),
            message: format!("no id above {highest} is available"),
        })?;
        let created = item.with_id(id);
        items.push(created.clone());
        self.persist(items);

        tracing::debug!(resource = %self.resource, id = created.id(), "Added local entity");
        Ok(created)
    }

    async fn update(&self, id: i64, patch: Value) -> Result<(), ResourceError> {
        let mut guard = self.loaded();
        let items = guard.get_or_insert_with(Vec::new);

        let position = items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| self.not_found(id))?;
        let patched = merge_patch(&self.resource, &items[position], &patch)?;
        items[position] = patched;
        self.persist(items);
        Ok(())
    }

    async fn remove(&self, id: i64) -> Result<(), ResourceError> {
        let mut guard = self.loaded();
        let items = guard.get_or_insert_with(Vec::new);

        let before = items.len();
        items.retain(|item| item.id() != id);
        if items.len() != before {
            self.persist(items);
        }
        Ok(())
    }
}

fn lock<T>(items: &Mutex<Option<Vec<T>>>) -> MutexGuard<'_, Option<Vec<T>>> {
    items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::InMemoryStorage;
    use crate::cache::Record;
    use serde_json::json;

    fn store_for(storage: &InMemoryStorage) -> LocalStore<Record> {
        let config = ClientConfig::default().with_storage_namespace("portal");
        LocalStore::new(Arc::new(storage.clone()), &config, "orders")
    }

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_back_to_back_adds_get_distinct_ids() {
        let store = store_for(&InMemoryStorage::new());

        let first = store.add(record(json!({"total": 10}))).await.unwrap();
        let second = store.add(record(json!({"total": 20}))).await.unwrap();

        assert_ne!(first.id, second.id);
        assert!(second.id > first.id);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[test]
    fn test_next_id_is_monotonic_and_above_floor() {
        let ids: Vec<i64> = (0..200).filter_map(|_| next_id(0)).collect();
        assert_eq!(ids.len(), 200);
        assert!(ids.windows(2).all(|pair| pair[1] > pair[0]));

        let far_future = i64::MAX / 2;
        assert_eq!(next_id(far_future), Some(far_future + 1));
    }

    #[tokio::test]
    async fn test_add_fails_when_stored_ids_are_exhausted() {
        let storage = InMemoryStorage::new();
        let stored = json!([{"id": i64::MAX, "total": 5}]).to_string();
        storage.set("portal:collection:orders", &stored);
        let store = store_for(&storage);

        let err = store.add(record(json!({"total": 6}))).await.unwrap_err();

        assert!(matches!(err, ResourceError::Payload { ref resource, .. } if resource == "orders"));
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(storage.get("portal:collection:orders"), Some(stored));

        let fresh = store_for(&InMemoryStorage::new());
        assert!(fresh.add(record(json!({}))).await.is_ok());
    }

    #[tokio::test]
    async fn test_mutations_persist_full_collection() {
        let storage = InMemoryStorage::new();
        let store = store_for(&storage);

        let created = store.add(record(json!({"status": "new"}))).await.unwrap();
        store.update(created.id, json!({"status": "paid"})).await.unwrap();

        let persisted: Vec<Record> = serde_json::from_str(&storage.get("portal:collection:orders").unwrap()).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id, created.id);
        assert_eq!(persisted[0].get("status"), Some(&json!("paid")));
        assert_eq!(storage.write_count(), 2);

        store.remove(created.id).await.unwrap();
        assert_eq!(storage.get("portal:collection:orders").as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_update_then_list_reflects_patch() {
        let store = store_for(&InMemoryStorage::new());
        let created = store.add(record(json!({"qty": 1, "sku": "A"}))).await.unwrap();

        store.update(created.id, json!({"qty": 3})).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].get("qty"), Some(&json!(3)));
        assert_eq!(listed[0].get("sku"), Some(&json!("A")));
    }

    #[tokio::test]
    async fn test_loads_existing_slot_and_issues_larger_ids() {
        let storage = InMemoryStorage::new();
        let existing = i64::MAX / 4;
        storage.set("portal:collection:orders", &json!([{"id": existing, "total": 5}]).to_string());
        let store = store_for(&storage);

        assert_eq!(store.get_by_id(existing).await.unwrap().get("total"), Some(&json!(5)));
        let created = store.add(record(json!({}))).await.unwrap();
        assert!(created.id > existing);
    }

    #[tokio::test]
    async fn test_write_failure_does_not_fail_mutation() {
        let storage = InMemoryStorage::new();
        storage.set_write_should_fail(true);
        let store = store_for(&storage);

        let created = store.add(record(json!({"total": 1}))).await.unwrap();

        assert_eq!(store.get_by_id(created.id).await.unwrap(), created);
        assert!(storage.get("portal:collection:orders").is_none());
    }

    #[tokio::test]
    async fn test_unreadable_slot_degrades_to_empty() {
        let storage = InMemoryStorage::new();
        storage.set("portal:collection:orders", "not json");
        assert!(store_for(&storage).list().await.unwrap().is_empty());

        let failing = InMemoryStorage::new();
        failing.set_read_should_fail(true);
        assert!(store_for(&failing).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_ids() {
        let store = store_for(&InMemoryStorage::new());

        assert!(matches!(store.get_by_id(9).await, Err(ResourceError::NotFound { id: 9, .. })));
        assert!(matches!(
            store.update(9, json!({"a": 1})).await,
            Err(ResourceError::NotFound { .. })
        ));
        store.remove(9).await.unwrap();
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let storage = InMemoryStorage::new();
        let store = store_for(&storage);

        assert!(store.seed(vec![record(json!({"id": 1, "name": "Starter"}))]));
        assert!(!store.seed(vec![record(json!({"id": 2}))]));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reload_rereads_storage() {
        let storage = InMemoryStorage::new();
        let store = store_for(&storage);
        assert!(store.list().await.unwrap().is_empty());

        storage.set("portal:collection:orders", &json!([{"id": 4}]).to_string());
        assert!(store.list().await.unwrap().is_empty());

        store.reload();
        assert_eq!(store.list().await.unwrap()[0].id, 4);
    }

    #[tokio::test]
    async fn test_collection_named_token_keeps_credential_slot() {
        let storage = InMemoryStorage::new();
        let config = ClientConfig::default().with_storage_namespace("portal");
        storage.set(&config.slot("token"), "\"abc.def.ghi\"");
        let store: LocalStore<Record> = LocalStore::new(Arc::new(storage.clone()), &config, "token");

        assert!(store.list().await.unwrap().is_empty());
        store.add(record(json!({"note": "x"}))).await.unwrap();

        assert_eq!(store.slot(), "portal:collection:token");
        assert_eq!(storage.get("portal:token").as_deref(), Some("\"abc.def.ghi\""));
    }
}
