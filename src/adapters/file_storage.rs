//! File-based storage adapter.
//!
//! Each slot is one JSON file under `~/.sessionkit/`. Slot names are
//! namespaced (`portal:token`), so characters that are unsafe in file names
//! are replaced before the path is built.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::traits::Storage;

/// The storage directory name under the home directory.
const STORAGE_DIR: &str = ".sessionkit";

/// File-based storage.
///
/// # Example
///
/// ```ignore
/// use sessionkit::adapters::FileStorage;
/// use sessionkit::traits::Storage;
///
/// let storage = FileStorage::new()?;
/// storage.write("portal:token", "\"abc.def.ghi\"")?;
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `~/.sessionkit`.
    ///
    /// Fails if the home directory cannot be determined.
    pub fn new() -> Result<Self, StorageError> {
        dirs::home_dir()
            .map(|home| Self {
                root: home.join(STORAGE_DIR),
            })
            .ok_or_else(|| {
                StorageError::Unavailable("Failed to determine home directory".to_string())
            })
    }

    /// Create storage rooted at a custom directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the slot files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing a slot.
    pub fn slot_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
                _ => '_',
            })
            .collect();
        self.root.join(format!("{}.json", name))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.slot_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(key, err)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(|e| StorageError::io(key, e))?;
        }

        let file = File::create(self.slot_path(key)).map_err(|e| StorageError::io(key, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(value.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| StorageError::io(key, e))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io(key, err)),
        }
    }
}
