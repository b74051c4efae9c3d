//! Interface language code sent with every request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Language used when nothing has been chosen yet.
pub const DEFAULT_LANGUAGE: &str = "pl";

/// A validated language tag such as `pl`, `en` or `pt-BR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    /// Parses a language tag.
    ///
    /// # Errors
    ///
    /// Returns an error unless the tag is a 2-3 letter primary subtag,
    /// optionally followed by `-` and a 2-8 character alphanumeric subtag.
    pub fn parse(code: &str) -> DomainResult<Self> {
        let code = code.trim();
        let mut parts = code.split('-');
        let primary = parts.next().unwrap_or_default();
        let primary_ok =
            (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_alphabetic());
        let rest_ok = parts.all(|p| (2..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()));

        if primary_ok && rest_ok {
            Ok(Self(code.to_string()))
        } else {
            Err(DomainError::InvalidLanguage(code.to_string()))
        }
    }

    /// Returns the tag as sent in the `Accept-Language` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Language {
    fn default() -> Self {
        Self(DEFAULT_LANGUAGE.to_string())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Language {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Language {
    type Error = DomainError;

    fn try_from(value: String) -> DomainResult<Self> {
        Self::parse(&value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.0
    }
}
