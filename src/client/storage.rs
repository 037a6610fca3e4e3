//! Persisted key-value storage on the consumer device.
//!
//! The real-time layer reads the stored auth token and user profile and
//! writes the notification cache under fixed keys. Writes are synchronous:
//! once `set` returns, the value survives a process restart.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Key of the stored bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";
/// Key of the stored user profile.
pub const USER_DATA_KEY: &str = "user_data";
/// Key of the persisted notification cache.
pub const NOTIFICATIONS_KEY: &str = "notifications";

/// Minimal persisted string store.
pub trait ClientStorage: Send + Sync + std::fmt::Debug {
    /// Reads a value; `Ok(None)` if the key was never set.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deletes a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// The stored user profile, as far as this layer cares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProfile {
    /// User identifier; `_id` is accepted for backends that use it.
    #[serde(alias = "_id", alias = "id")]
    pub user_id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Reads and parses the stored user profile.
///
/// Missing or unparsable profiles yield `None`.
pub fn load_profile(storage: &dyn ClientStorage) -> Option<StoredProfile> {
    match storage.get(USER_DATA_KEY) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(error = %e, "stored user profile is not valid JSON");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read stored user profile");
            None
        }
    }
}

/// One file per key under a directory.
///
/// Writes go to a temporary file that is then renamed over the target, so
/// a crash mid-write never leaves a truncated document.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (and creates if needed) the storage directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl ClientStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let target = self.path_for(key);
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Volatile storage for tests and ephemeral consumers.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trip() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir failed");
        };
        let Ok(storage) = FileStorage::open(dir.path().join("nested")) else {
            panic!("open failed");
        };

        assert!(matches!(storage.get(AUTH_TOKEN_KEY), Ok(None)));
        assert!(storage.set(AUTH_TOKEN_KEY, "tok123").is_ok());
        assert_eq!(
            storage.get(AUTH_TOKEN_KEY).ok().flatten().as_deref(),
            Some("tok123")
        );

        let Ok(reopened) = FileStorage::open(dir.path().join("nested")) else {
            panic!("reopen failed");
        };
        assert_eq!(
            reopened.get(AUTH_TOKEN_KEY).ok().flatten().as_deref(),
            Some("tok123")
        );

        assert!(reopened.remove(AUTH_TOKEN_KEY).is_ok());
        assert!(reopened.remove(AUTH_TOKEN_KEY).is_ok());
        assert!(matches!(reopened.get(AUTH_TOKEN_KEY), Ok(None)));
    }

    #[test]
    fn keys_are_sanitized() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir failed");
        };
        let Ok(storage) = FileStorage::open(dir.path()) else {
            panic!("open failed");
        };
        assert!(storage.set("../escape", "x").is_ok());
        assert!(dir.path().join("___escape.json").exists());
    }

    #[test]
    fn profile_accepts_mongo_style_id() {
        let storage = MemoryStorage::new();
        assert!(load_profile(&storage).is_none());

        let _ = storage.set(USER_DATA_KEY, r#"{"_id":"U42","name":"Ada"}"#);
        let profile = load_profile(&storage);
        assert_eq!(
            profile.and_then(|p| p.user_id).as_deref(),
            Some("U42")
        );

        let _ = storage.set(USER_DATA_KEY, "{broken");
        assert!(load_profile(&storage).is_none());
    }
}
