//! Key/value backends behind the credential store.
//!
//! Secrets (the OAuth token) go to the OS keychain through `keyring`.
//! Plain identity attributes go to a small JSON preferences file.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use tracing::{debug, warn};

use super::AuthError;

/// Secret key/value storage.
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
    /// Removing a key that is not stored is not an error.
    fn delete(&self, key: &str) -> Result<(), AuthError>;
}

/// Plain preference storage with string values.
pub trait PreferencesStore: Send + Sync {
    fn get_string(&self, key: &str, default: &str) -> String;
    /// Write several keys in one operation.
    fn set_strings(&self, values: &[(&str, &str)]) -> Result<(), AuthError>;
    fn remove(&self, keys: &[&str]) -> Result<(), AuthError>;
}

// ============================================================================
// Keychain
// ============================================================================

/// Secrets in the OS keychain, one entry per key under a fixed service name.
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, AuthError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), AuthError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local secrets. Nothing survives the process.
#[derive(Default)]
pub struct MemorySecretStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), AuthError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

// ============================================================================
// Preferences
// ============================================================================

/// Preferences kept as a flat JSON object on disk.
///
/// Every read goes to the file. Writes replace the whole file through a
/// temp file and rename, so a multi-key write lands all at once.
pub struct FilePreferences {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePreferences {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Current file contents. A missing file is empty and a corrupt one is
    /// logged and treated as empty; any other read failure is an error so a
    /// following write cannot drop keys it never saw.
    fn load(&self) -> Result<BTreeMap<String, String>, AuthError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read preferences file");
                return Err(e.into());
            }
        };
        match serde_json::from_str(&contents) {
            Ok(values) => Ok(values),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Preferences file unreadable, using defaults");
                Ok(BTreeMap::new())
            }
        }
    }

    fn store(&self, values: &BTreeMap<String, String>) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), keys = values.len(), "Preferences saved");
        Ok(())
    }
}

impl PreferencesStore for FilePreferences {
    fn get_string(&self, key: &str, default: &str) -> String {
        self.load()
            .ok()
            .and_then(|mut values| values.remove(key))
            .unwrap_or_else(|| default.to_string())
    }

    fn set_strings(&self, values: &[(&str, &str)]) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut current = self.load()?;
        for (key, value) in values {
            current.insert(key.to_string(), value.to_string());
        }
        self.store(&current)
    }

    fn remove(&self, keys: &[&str]) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut current = self.load()?;
        let before = current.len();
        for key in keys {
            current.remove(*key);
        }
        if current.len() == before {
            return Ok(());
        }
        self.store(&current)
    }
}

/// Process-local preferences.
#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferencesStore for MemoryPreferences {
    fn get_string(&self, key: &str, default: &str) -> String {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn set_strings(&self, values: &[(&str, &str)]) -> Result<(), AuthError> {
        let mut current = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in values {
            current.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), AuthError> {
        let mut current = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            current.remove(*key);
        }
        Ok(())
    }
}
