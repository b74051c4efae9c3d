//! JSON-file key-value storage.
//!
//! The durable equivalent of browser local storage. All keys live in one
//! file:
//! ```json
//! {
//!   "schema_version": 1,
//!   "values": {
//!     "access_token": "...",
//!     "lang": "pl",
//!     "refresh_token": "..."
//!   }
//! }
//! ```
//! Every batch is written to a sibling temporary file and renamed over the
//! original, so a crash never leaves one token updated and the other not.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use cm_application::ports::{KeyValueStorage, StorageEntry, StorageError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageDocument {
    schema_version: u32,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

/// File-backed [`KeyValueStorage`].
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStorage {
    /// Opens the storage file, starting empty if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) => {
                let document: StorageDocument = serde_json::from_slice(&bytes).map_err(|e| {
                    StorageError::Serialization(format!("{}: {e}", path.display()))
                })?;
                document.values
            }
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "storage opened");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Returns the storage file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let document = StorageDocument {
            schema_version: SCHEMA_VERSION,
            values: values.clone(),
        };
        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"  ");
        let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
        document
            .serialize(&mut serializer)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        buffer.push(b'\n');

        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, &buffer)?;
        restrict_permissions(&temp)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl KeyValueStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn write(&self, entries: &[StorageEntry<'_>]) -> Result<(), StorageError> {
        let mut values = self.values.lock();
        let mut next = values.clone();
        for (key, value) in entries {
            match value {
                Some(value) => {
                    next.insert((*key).to_string(), (*value).to_string());
                }
                None => {
                    next.remove(*key);
                }
            }
        }

        self.persist(&next)?;
        *values = next;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn storage_in(dir: &TempDir) -> JsonFileStorage {
        JsonFileStorage::open(dir.path().join("nested").join("storage.json")).unwrap()
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);

        assert_eq!(storage.get("access_token").unwrap(), None);
        assert!(!storage.path().exists());
    }

    #[test]
    fn batch_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);

        storage
            .write(&[("access_token", Some("A1")), ("refresh_token", Some("R1"))])
            .unwrap();
        let reopened = storage_in(&dir);

        assert_eq!(reopened.get("access_token").unwrap().as_deref(), Some("A1"));
        assert_eq!(reopened.get("refresh_token").unwrap().as_deref(), Some("R1"));
    }

    #[test]
    fn none_removes_key() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        storage
            .write(&[("access_token", Some("A1")), ("lang", Some("en"))])
            .unwrap();

        storage.write(&[("access_token", None)]).unwrap();

        let reopened = storage_in(&dir);
        assert_eq!(reopened.get("access_token").unwrap(), None);
        assert_eq!(reopened.get("lang").unwrap().as_deref(), Some("en"));
    }

    #[test]
    fn file_is_stable_json_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        storage.write(&[("lang", Some("pl"))]).unwrap();

        let content = fs::read_to_string(storage.path()).unwrap();

        assert_eq!(
            content,
            "{\n  \"schema_version\": 1,\n  \"values\": {\n    \"lang\": \"pl\"\n  }\n}\n"
        );
        assert!(!storage.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonFileStorage::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        storage.write(&[("access_token", Some("A1"))]).unwrap();

        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
