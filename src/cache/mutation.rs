//! Attempted mutations, kept so a failed write never loses the caller's input.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Kind of write against a resource collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write that has been attempted but not confirmed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingMutation {
    pub resource_key: String,
    pub kind: MutationKind,
    /// What the caller submitted: the new entity, the patch (with its `id`),
    /// or `{"id": ..}` for a delete.
    pub optimistic_payload: Value,
}

impl PendingMutation {
    pub fn new(resource_key: impl Into<String>, kind: MutationKind, optimistic_payload: Value) -> Self {
        Self {
            resource_key: resource_key.into(),
            kind,
            optimistic_payload,
        }
    }

    /// Id of the targeted entity, when the payload names one.
    pub fn target_id(&self) -> Option<i64> {
        self.optimistic_payload.get("id").and_then(Value::as_i64)
    }
}
