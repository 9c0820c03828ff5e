use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::profile::Profile;
use crate::types::Context;

/// File holding the persisted conversation context
pub const CONTEXT_FILE: &str = "conversationContext.json";
/// File holding the persisted user profile
pub const PROFILE_FILE: &str = "userProfile.json";

/// One persisted value, read on demand and written after each mutation
pub trait SessionStore<T>: Send + Sync {
    /// Current value, or the default when nothing was saved yet.
    fn load(&self) -> Result<T, StoreError>;

    /// Replace the stored value as a whole.
    fn save(&self, value: &T) -> Result<(), StoreError>;
}

/// JSON blob stored in a single file
pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> SessionStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> Result<T, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Serde {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serde {
            path: self.path.clone(),
            source,
        })?;

        fs::write(&self.path, content).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), "Saved session blob");
        Ok(())
    }
}

/// In-process store, used when nothing should touch the disk
#[derive(Default)]
pub struct MemoryStore<T> {
    value: Mutex<T>,
}

impl<T> MemoryStore<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }
}

impl<T> SessionStore<T> for MemoryStore<T>
where
    T: Clone + Send,
{
    fn load(&self) -> Result<T, StoreError> {
        self.value
            .lock()
            .map(|guard| guard.clone())
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        let mut guard = self
            .value
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        *guard = value.clone();
        Ok(())
    }
}

/// Lays out the persisted blobs inside the data directory
pub struct StorageManager {
    data_dir: PathBuf,
}

impl StorageManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn ensure_directories(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| StoreError::Io {
            path: self.data_dir.clone(),
            source,
        })
    }

    pub fn context_store(&self) -> JsonFileStore<Context> {
        JsonFileStore::new(self.data_dir.join(CONTEXT_FILE))
    }

    pub fn profile_store(&self) -> JsonFileStore<Profile> {
        JsonFileStore::new(self.data_dir.join(PROFILE_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContextEntry;

    #[test]
    fn test_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path());
        assert!(storage.context_store().load().unwrap().is_empty());
        assert!(storage.profile_store().load().unwrap().is_empty());
    }

    #[test]
    fn test_context_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path().join("nested"));
        let store = storage.context_store();

        let context = vec![ContextEntry::user("Hello"), ContextEntry::assistant("Hi there")];
        store.save(&context).unwrap();

        assert_eq!(store.load().unwrap(), context);
        assert!(dir.path().join("nested").join(CONTEXT_FILE).exists());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONTEXT_FILE);
        fs::write(&path, "not json").unwrap();

        let store: JsonFileStore<Context> = JsonFileStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::Serde { .. }));
    }

    #[test]
    fn test_profile_file_keeps_field_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = StorageManager::new(dir.path()).profile_store();
        fs::write(store.path(), r#"{"department":"ARO","fullName":"Eva"}"#).unwrap();

        let profile = store.load().unwrap();
        let keys: Vec<_> = profile.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["department", "fullName"]);
    }

    #[test]
    fn test_memory_store_replaces_value() {
        let store = MemoryStore::new(vec![ContextEntry::user("a")]);
        store.save(&Vec::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
