//! Remote-backed cache: fetch, memoize, invalidate on write.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;

use super::{to_json, CacheStrategy, Entity, MutationKind, PendingMutation, ResourceStore};
use crate::client::{RemoteClient, RequestOptions};
use crate::error::{ApiError, ResourceError};
use crate::traits::Method;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<Vec<T>>, ApiError>>>;

struct CacheState<T> {
    items: Option<Arc<Vec<T>>>,
    stale: bool,
    /// Bumped by every invalidation. A fetch only stores its result if the
    /// generation it started under is still current.
    generation: u64,
    in_flight: Option<(u64, SharedFetch<T>)>,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self {
            items: None,
            stale: true,
            generation: 0,
            in_flight: None,
        }
    }
}

/// Gateway-backed collection for one resource key.
///
/// Concurrent `list` calls share a single request. Writes go straight to
/// the gateway and, once confirmed, mark the cached list stale; nothing is
/// applied to the cache before confirmation.
///
/// Cheap to clone; clones share the cached list.
pub struct RemoteCache<T> {
    resource: String,
    client: RemoteClient,
    state: Arc<Mutex<CacheState<T>>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for RemoteCache<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            client: self.client.clone(),
            state: Arc::clone(&self.state),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> RemoteCache<T> {
    pub fn new(client: RemoteClient, resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            client,
            state: Arc::new(Mutex::new(CacheState::default())),
            _entity: PhantomData,
        }
    }

    /// Drop the memoized list; the next `list` refetches.
    pub fn invalidate(&self) {
        let mut state = lock(&self.state);
        state.stale = true;
        state.generation += 1;
        tracing::debug!(resource = %self.resource, generation = state.generation, "Cache invalidated");
    }

    pub fn is_stale(&self) -> bool {
        lock(&self.state).stale
    }

    /// Whether a list request is currently running.
    pub fn is_fetching(&self) -> bool {
        lock(&self.state).in_flight.is_some()
    }

    /// The memoized list, if one is fresh.
    pub fn cached(&self) -> Option<Vec<T>> {
        let state = lock(&self.state);
        match (&state.items, state.stale) {
            (Some(items), false) => Some(items.as_ref().clone()),
            _ => None,
        }
    }

    fn collection_path(&self) -> String {
        format!("/{}", urlencoding::encode(&self.resource))
    }

    fn item_path(&self, id: i64) -> String {
        format!("{}/{}", self.collection_path(), id)
    }

    fn shared_fetch(&self) -> SharedFetch<T> {
        let mut state = lock(&self.state);
        let generation = state.generation;
        if let Some((started, fetch)) = &state.in_flight {
            if *started == generation {
                return fetch.clone();
            }
        }

        let client = self.client.clone();
        let path = self.collection_path();
        let shared_state = Arc::clone(&self.state);
        let fetch = async move {
            let result = client.get::<Vec<T>>(&path).await.map(Arc::new);

            let mut state = lock(&shared_state);
            if matches!(&state.in_flight, Some((started, _)) if *started == generation) {
                state.in_flight = None;
            }
            if let Ok(items) = &result {
                if state.generation == generation {
                    state.items = Some(Arc::clone(items));
                    state.stale = false;
                }
            }
            result
        }
        .boxed()
        .shared();

        state.in_flight = Some((generation, fetch.clone()));
        fetch
    }

    fn mutation_error(&self, kind: MutationKind, payload: Value, source: ApiError) -> ResourceError {
        tracing::warn!(resource = %self.resource, %kind, error = %source, "Mutation rejected");
        ResourceError::Mutation {
            pending: PendingMutation::new(self.resource.clone(), kind, payload),
            source,
        }
    }
}

#[async_trait]
impl<T: Entity> ResourceStore<T> for RemoteCache<T> {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn strategy(&self) -> CacheStrategy {
        CacheStrategy::RemoteBacked
    }

    async fn list(&self) -> Result<Vec<T>, ResourceError> {
        if let Some(items) = self.cached() {
            return Ok(items);
        }
        let items = self.shared_fetch().await?;
        Ok(items.as_ref().clone())
    }

    async fn get_by_id(&self, id: i64) -> Result<T, ResourceError> {
        if let Some(item) = self
            .cached()
            .and_then(|items| items.into_iter().find(|item| item.id() == id))
        {
            return Ok(item);
        }

        match self.client.get::<T>(&self.item_path(id)).await {
            Ok(item) => Ok(item),
            Err(ApiError::Validation { status: 404, .. }) => Err(ResourceError::NotFound {
                resource: self.resource.clone(),
                id,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn add(&self, item: T) -> Result<T, ResourceError> {
        let payload = to_json(&self.resource, &item)?;
        let created = self
            .client
            .request::<Value, Value>(
                Method::Post,
                &self.collection_path(),
                Some(&payload),
                &RequestOptions::default(),
            )
            .await
            .map_err(|source| self.mutation_error(MutationKind::Create, payload.clone(), source))?;

        self.invalidate();
        // Only a body that carries an id describes the created entity.
        let describes_entity = created.get("id").is_some_and(|id| !id.is_null());
        if !describes_entity {
            return Ok(item);
        }
        Ok(serde_json::from_value(created).unwrap_or(item))
    }

    async fn update(&self, id: i64, patch: Value) -> Result<(), ResourceError> {
        self.client
            .request::<Value, Value>(
                Method::Put,
                &self.item_path(id),
                Some(&patch),
                &RequestOptions::default(),
            )
            .await
            .map_err(|source| {
                let mut payload = patch.clone();
                if let Value::Object(fields) = &mut payload {
                    fields.insert("id".to_string(), Value::from(id));
                }
                self.mutation_error(MutationKind::Update, payload, source)
            })?;

        self.invalidate();
        Ok(())
    }

    async fn remove(&self, id: i64) -> Result<(), ResourceError> {
        self.client
            .request::<Value, ()>(Method::Delete, &self.item_path(id), None, &RequestOptions::default())
            .await
            .map_err(|source| {
                self.mutation_error(MutationKind::Delete, serde_json::json!({ "id": id }), source)
            })?;

        self.invalidate();
        Ok(())
    }
}

fn lock<T>(state: &Mutex<CacheState<T>>) -> MutexGuard<'_, CacheState<T>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
