//! Durable key-value storage port
//!
//! Plays the role browser local storage plays for a web client: a handful
//! of string values under fixed keys, surviving restarts.

use thiserror::Error;

/// Errors that can occur while reading or writing storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be parsed or written.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A pending change to one key: `Some` writes, `None` removes.
pub type StorageEntry<'a> = (&'a str, Option<&'a str>);

/// Synchronous string key-value storage.
///
/// `write` applies all entries at once: readers observe either none or all
/// of them.
pub trait KeyValueStorage: Send + Sync {
    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Applies a batch of writes and removals atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be persisted; in that case
    /// none of the entries were applied.
    fn write(&self, entries: &[StorageEntry<'_>]) -> Result<(), StorageError>;
}
