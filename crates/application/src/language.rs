//! Language store.
//!
//! Remembers the interface language across restarts and supplies it to the
//! request pipeline as the locale collaborator.

use std::sync::Arc;

use cm_domain::{DomainError, Language};
use parking_lot::RwLock;

use crate::ports::{KeyValueStorage, LocaleSource, StorageError};

/// Storage key of the selected language.
pub const LANGUAGE_KEY: &str = "lang";

/// Errors from changing the language.
#[derive(Debug, thiserror::Error)]
pub enum LanguageError {
    /// The code is not a valid language tag.
    #[error(transparent)]
    Invalid(#[from] DomainError),

    /// The choice could not be persisted.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Persisted language preference.
pub struct LanguageStore {
    storage: Arc<dyn KeyValueStorage>,
    selected: RwLock<Language>,
}

impl LanguageStore {
    /// Loads the stored language, falling back to the default when the
    /// stored value is missing, unreadable or invalid.
    #[must_use]
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let selected = match storage.get(LANGUAGE_KEY) {
            Ok(Some(code)) => Language::parse(&code).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring stored language");
                Language::default()
            }),
            Ok(None) => Language::default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read stored language");
                Language::default()
            }
        };
        Self {
            storage,
            selected: RwLock::new(selected),
        }
    }

    /// Returns the selected language.
    #[must_use]
    pub fn selected(&self) -> Language {
        self.selected.read().clone()
    }

    /// Validates, selects and persists a language.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is invalid or cannot be stored; the
    /// selection is left unchanged in either case.
    pub fn set_language(&self, code: &str) -> Result<Language, LanguageError> {
        let language = Language::parse(code)?;
        let mut selected = self.selected.write();
        self.storage
            .write(&[(LANGUAGE_KEY, Some(language.as_str()))])?;
        *selected = language.clone();
        tracing::info!(language = %language, "language changed");
        Ok(language)
    }
}

impl LocaleSource for LanguageStore {
    fn current(&self) -> Language {
        self.selected()
    }
}
