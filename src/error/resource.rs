//! Errors raised by resource caches and stores.

use thiserror::Error;

use super::{ApiError, ErrorCategory};
use crate::cache::PendingMutation;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResourceError {
    /// Fetching the collection or an entity failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A mutation was rejected. The cache was left untouched and `pending`
    /// carries the attempted payload so the caller can keep the user's input.
    #[error("{} on '{}' failed: {source}", .pending.kind, .pending.resource_key)]
    Mutation {
        pending: PendingMutation,
        #[source]
        source: ApiError,
    },

    /// No entity with this id exists in the collection.
    #[error("{resource} #{id} not found")]
    NotFound { resource: String, id: i64 },

    /// The entity or patch could not be converted to or from JSON.
    #[error("Invalid {resource} payload: {message}")]
    Payload { resource: String, message: String },
}

impl ResourceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ResourceError::Api(source) | ResourceError::Mutation { source, .. } => {
                source.category()
            }
            ResourceError::NotFound { .. } | ResourceError::Payload { .. } => ErrorCategory::User,
        }
    }

    /// The underlying gateway error, if the failure came from the network.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ResourceError::Api(source) | ResourceError::Mutation { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The attempted mutation, for callers that keep unsaved input around.
    pub fn pending(&self) -> Option<&PendingMutation> {
        match self {
            ResourceError::Mutation { pending, .. } => Some(pending),
            _ => None,
        }
    }
}
