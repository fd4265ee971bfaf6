//! In-memory storage for testing.
//!
//! Provides a [`Storage`] implementation backed by a shared map, with
//! switches to make reads or writes fail.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::StorageError;
use crate::traits::Storage;

/// In-memory storage for testing.
///
/// Clones share the same slots, so a test can hand one clone to the code
/// under test and inspect the other.
///
/// # Example
///
/// ```ignore
/// use sessionkit::adapters::mock::InMemoryStorage;
/// use sessionkit::traits::Storage;
///
/// let storage = InMemoryStorage::new();
/// storage.write("app:token", "\"abc\"")?;
/// assert_eq!(storage.get("app:token").as_deref(), Some("\"abc\""));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
    read_should_fail: Arc<Mutex<bool>>,
    write_should_fail: Arc<Mutex<bool>>,
    writes: Arc<Mutex<usize>>,
}

impl InMemoryStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure whether reads should fail.
    pub fn set_read_should_fail(&self, should_fail: bool) {
        *self.read_should_fail.lock().unwrap() = should_fail;
    }

    /// Configure whether writes and removals should fail.
    pub fn set_write_should_fail(&self, should_fail: bool) {
        *self.write_should_fail.lock().unwrap() = should_fail;
    }

    /// Get a slot synchronously, bypassing the failure switches.
    pub fn get(&self, key: &str) -> Option<String> {
        self.slots.lock().unwrap().get(key).cloned()
    }

    /// Set a slot directly, bypassing the failure switches.
    pub fn set(&self, key: &str, value: &str) {
        self.slots
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

impl Storage for InMemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        if *self.read_should_fail.lock().unwrap() {
            return Err(StorageError::Io {
                key: key.to_string(),
                message: "Mock read failure".to_string(),
            });
        }
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if *self.write_should_fail.lock().unwrap() {
            return Err(StorageError::Io {
                key: key.to_string(),
                message: "Mock write failure".to_string(),
            });
        }
        self.set(key, value);
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if *self.write_should_fail.lock().unwrap() {
            return Err(StorageError::Io {
                key: key.to_string(),
                message: "Mock remove failure".to_string(),
            });
        }
        self.slots.lock().unwrap().remove(key);
        Ok(())
    }
}
