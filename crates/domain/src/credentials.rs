//! Access/refresh credential pair.
//!
//! Tokens are opaque strings: nothing here inspects or validates their
//! content. The pair is always replaced or cleared as a whole.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The credentials held by a session.
///
/// `access_token` present means the session has identity material; being
/// logged in additionally requires a loaded user profile.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived bearer credential.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Longer-lived credential used only to obtain a new access token.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    /// Creates a pair from a fresh login.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// Creates an empty pair.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
        }
    }

    /// Creates a pair from optional parts, treating empty strings as absent.
    #[must_use]
    pub fn from_parts(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.filter(|t| !t.is_empty()),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
        }
    }

    /// Returns true if an access token is held.
    #[must_use]
    pub const fn has_identity_material(&self) -> bool {
        self.access_token.is_some()
    }

    /// Returns true if a refresh token is held.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Returns true if neither token is held.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// Returns the pair produced by a successful refresh.
    ///
    /// The refresh token is only replaced when the server rotated it.
    #[must_use]
    pub fn refreshed(&self, access_token: String, rotated_refresh: Option<String>) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token: rotated_refresh
                .filter(|t| !t.is_empty())
                .or_else(|| self.refresh_token.clone()),
        }
    }

    /// Formats the `Authorization` header value for the access token.
    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.access_token.as_deref().map(bearer)
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &self.access_token.as_deref().map(token_preview))
            .field(
                "refresh_token",
                &self.refresh_token.as_deref().map(token_preview),
            )
            .finish()
    }
}

/// Formats a bearer `Authorization` header value.
#[must_use]
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Returns a loggable preview of a token (first 8 chars + ...).
#[must_use]
pub fn token_preview(token: &str) -> String {
    match token.char_indices().nth(8) {
        Some((idx, _)) if token.len() > 12 => format!("{}...", &token[..idx]),
        _ => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn refresh_without_rotation_keeps_refresh_token() {
        let pair = CredentialPair::new("A1", "R1");
        let next = pair.refreshed("A2".to_string(), None);

        assert_eq!(next, CredentialPair::new("A2", "R1"));
    }

    #[test]
    fn refresh_with_rotation_replaces_refresh_token() {
        let pair = CredentialPair::new("A1", "R1");
        let next = pair.refreshed("A2".to_string(), Some("R2".to_string()));

        assert_eq!(next, CredentialPair::new("A2", "R2"));
    }

    #[test]
    fn empty_rotated_token_is_ignored() {
        let pair = CredentialPair::new("A1", "R1");
        let next = pair.refreshed("A2".to_string(), Some(String::new()));

        assert_eq!(next.refresh_token.as_deref(), Some("R1"));
    }

    #[test]
    fn from_parts_drops_empty_strings() {
        let pair = CredentialPair::from_parts(Some(String::new()), Some("R1".to_string()));
        assert!(!pair.has_identity_material());
        assert!(pair.can_refresh());
        assert!(!pair.is_empty());
    }

    #[test]
    fn debug_output_never_contains_tokens() {
        let pair = CredentialPair::new("eyJhbGciOiJIUzI1NiJ9.payload", "short");
        let debug = format!("{pair:?}");

        assert!(debug.contains("eyJhbGci..."));
        assert!(!debug.contains("payload"));
        assert!(!debug.contains("short"));
    }

    #[test]
    fn bearer_header_value() {
        assert_eq!(
            CredentialPair::new("A1", "R1").bearer().as_deref(),
            Some("Bearer A1")
        );
        assert_eq!(CredentialPair::empty().bearer(), None);
    }
}
