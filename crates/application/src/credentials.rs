//! Credential store.
//!
//! Holds the current access/refresh pair in memory and mirrors it to
//! durable storage so a restart does not silently log the user out.
//! Mutation is crate-private: only the session coordinator writes.

use std::sync::Arc;

use cm_domain::CredentialPair;
use parking_lot::RwLock;

use crate::ports::{KeyValueStorage, StorageError};

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// The credential pair shared by the session and the request pipeline.
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStorage>,
    current: RwLock<CredentialPair>,
}

impl CredentialStore {
    /// Loads persisted credentials.
    ///
    /// An unreadable store yields an empty pair so startup falls through to
    /// the logged-out state instead of failing.
    #[must_use]
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let pair = match Self::read(storage.as_ref()) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted credentials");
                CredentialPair::empty()
            }
        };
        Self {
            storage,
            current: RwLock::new(pair),
        }
    }

    fn read(storage: &dyn KeyValueStorage) -> Result<CredentialPair, StorageError> {
        Ok(CredentialPair::from_parts(
            storage.get(ACCESS_TOKEN_KEY)?,
            storage.get(REFRESH_TOKEN_KEY)?,
        ))
    }

    /// Returns a snapshot of the current pair.
    #[must_use]
    pub fn get(&self) -> CredentialPair {
        self.current.read().clone()
    }

    /// Returns the current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.current.read().access_token.clone()
    }

    /// Returns the current refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.current.read().refresh_token.clone()
    }

    /// Replaces both tokens.
    ///
    /// The in-memory pair is always updated; a persistence failure is
    /// returned so the caller can log it.
    pub(crate) fn set(&self, pair: CredentialPair) -> Result<(), StorageError> {
        let mut current = self.current.write();
        *current = pair;
        self.persist(&current)
    }

    /// Empties both tokens.
    pub(crate) fn clear(&self) -> Result<(), StorageError> {
        self.set(CredentialPair::empty())
    }

    fn persist(&self, pair: &CredentialPair) -> Result<(), StorageError> {
        self.storage.write(&[
            (ACCESS_TOKEN_KEY, pair.access_token.as_deref()),
            (REFRESH_TOKEN_KEY, pair.refresh_token.as_deref()),
        ])
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}
