//! Durable storage trait abstraction.
//!
//! Storage is a set of named string slots, the same shape as a browser's
//! local storage. Values are JSON text written by the caller.
//!
//! The trait is synchronous on purpose: change-bus subscribers run inside
//! the emitting call and must be able to re-read a slot without suspending.
//! Access is not coordinated between processes; two processes writing the
//! same slot race and the last write wins.

use crate::error::StorageError;

/// Trait for durable key/value slot storage.
///
/// Implementations include the production file-based storage and an
/// in-memory store for tests.
///
/// # Example
///
/// ```ignore
/// use sessionkit::traits::Storage;
///
/// fn remember_theme<S: Storage>(storage: &S) -> Result<(), StorageError> {
///     storage.write("portal:theme", "\"dark\"")?;
///     assert_eq!(storage.read("portal:theme")?.as_deref(), Some("\"dark\""));
///     storage.remove("portal:theme")
/// }
/// ```
pub trait Storage: Send + Sync {
    /// Read a slot.
    ///
    /// # Returns
    /// - `Ok(Some(value))` if the slot holds a value
    /// - `Ok(None)` if nothing is stored
    /// - `Err(error)` if reading failed
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the contents of a slot.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a slot. Removing an empty slot succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
