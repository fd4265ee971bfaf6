//! Cached access to resource collections.
//!
//! Two consistency models share the [`ResourceStore`] contract and are kept
//! apart on purpose:
//!
//! | Strategy | Authority | After a write |
//! |----------|-----------|---------------|
//! | [`CacheStrategy::RemoteBacked`] | the gateway | the cached list is marked stale and refetched on the next `list` |
//! | [`CacheStrategy::LocalAuthoritative`] | durable storage | the in-memory list is the result; it is persisted immediately |
//!
//! A remote-backed list reflects server truth; a local store reflects the
//! last local write.

mod local;
mod mutation;
mod registry;
mod remote;

pub use local::LocalStore;
pub use mutation::{MutationKind, PendingMutation};
pub use registry::ResourceRegistry;
pub use remote::RemoteCache;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ResourceError;

/// An item of a resource collection.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> i64;

    /// The same entity under another id.
    fn with_id(self, id: i64) -> Self;
}

/// The contract shared by both cache strategies.
#[async_trait]
pub trait ResourceStore<T: Entity>: Send + Sync {
    /// Resource key, such as `venues`.
    fn resource(&self) -> &str;

    fn strategy(&self) -> CacheStrategy;

    async fn list(&self) -> Result<Vec<T>, ResourceError>;

    async fn get_by_id(&self, id: i64) -> Result<T, ResourceError>;

    /// Create `item`. The returned entity carries its assigned id.
    async fn add(&self, item: T) -> Result<T, ResourceError>;

    /// Apply a partial update. `patch` must be a JSON object.
    async fn update(&self, id: i64, patch: Value) -> Result<(), ResourceError>;

    async fn remove(&self, id: i64) -> Result<(), ResourceError>;
}

/// Which consistency model a resource uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheStrategy {
    /// Fetch from the gateway; invalidate and refetch after writes.
    #[default]
    RemoteBacked,
    /// Keep the collection in durable storage; never touch the network.
    LocalAuthoritative,
}

impl CacheStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::RemoteBacked => "remote",
            CacheStrategy::LocalAuthoritative => "local",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schemaless entity: an id plus whatever fields the gateway returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { id: 0, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl Entity for Record {
    fn id(&self) -> i64 {
        self.id
    }

    fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
}

/// Shallow-merge `patch` into `item`. The id never changes.
pub(crate) fn merge_patch<T: Entity>(resource: &str, item: &T, patch: &Value) -> Result<T, ResourceError> {
    let Value::Object(fields) = patch else {
        return Err(payload_error(resource, "patch must be a JSON object"));
    };

    let mut merged = to_json(resource, item)?;
    if let Value::Object(target) = &mut merged {
        for (key, value) in fields.iter().filter(|(key, _)| key.as_str() != "id") {
            target.insert(key.clone(), value.clone());
        }
    }

    let id = item.id();
    serde_json::from_value::<T>(merged)
        .map(|patched| patched.with_id(id))
        .map_err(|e| payload_error(resource, e))
}

pub(crate) fn to_json<T: Serialize>(resource: &str, item: &T) -> Result<Value, ResourceError> {
    serde_json::to_value(item).map_err(|e| payload_error(resource, e))
}

fn payload_error(resource: &str, message: impl fmt::Display) -> ResourceError {
    ResourceError::Payload {
        resource: resource.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Venue {
        id: i64,
        name: String,
        capacity: u32,
    }

    impl Entity for Venue {
        fn id(&self) -> i64 {
            self.id
        }
        fn with_id(self, id: i64) -> Self {
            Self { id, ..self }
        }
    }

    #[test]
    fn test_merge_patch_keeps_id_and_untouched_fields() {
        let venue = Venue {
            id: 3,
            name: "Hall".to_string(),
            capacity: 100,
        };
        let patched = merge_patch("venues", &venue, &json!({"capacity": 250, "id": 99})).unwrap();
        assert_eq!(
            patched,
            Venue {
                id: 3,
                name: "Hall".to_string(),
                capacity: 250
            }
        );
    }

    #[test]
    fn test_merge_patch_rejects_bad_patches() {
        let venue = Venue {
            id: 3,
            name: "Hall".to_string(),
            capacity: 100,
        };
        assert!(matches!(
            merge_patch("venues", &venue, &json!([1, 2])),
            Err(ResourceError::Payload { .. })
        ));
        assert!(matches!(
            merge_patch("venues", &venue, &json!({"capacity": "lots"})),
            Err(ResourceError::Payload { .. })
        ));
    }

    #[test]
    fn test_record_roundtrips_unknown_fields() {
        let record: Record = serde_json::from_value(json!({"id": 5, "name": "Stall", "tags": ["a"]})).unwrap();
        assert_eq!(record.id(), 5);
        assert_eq!(record.get("name"), Some(&json!("Stall")));

        let fresh: Record = serde_json::from_value(json!({"name": "New"})).unwrap();
        assert_eq!(fresh.id, 0);
        assert_eq!(fresh.with_id(8).id, 8);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(CacheStrategy::default(), CacheStrategy::RemoteBacked);
        assert_eq!(CacheStrategy::LocalAuthoritative.to_string(), "local");
    }
}
