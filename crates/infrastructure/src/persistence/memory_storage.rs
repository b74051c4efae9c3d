//! In-memory key-value storage.

use std::collections::HashMap;

use cm_application::ports::{KeyValueStorage, StorageEntry, StorageError};
use parking_lot::RwLock;

/// Non-durable [`KeyValueStorage`], for ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn write(&self, entries: &[StorageEntry<'_>]) -> Result<(), StorageError> {
        let mut values = self.values.write();
        for (key, value) in entries {
            match value {
                Some(value) => {
                    values.insert((*key).to_string(), (*value).to_string());
                }
                None => {
                    values.remove(*key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_removes() {
        let storage = MemoryStorage::new();
        storage
            .write(&[("access_token", Some("A1")), ("refresh_token", Some("R1"))])
            .unwrap();
        storage.write(&[("access_token", None)]).unwrap();

        assert_eq!(storage.get("access_token").unwrap(), None);
        assert_eq!(storage.get("refresh_token").unwrap().as_deref(), Some("R1"));
    }
}
