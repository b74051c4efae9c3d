//! User profile returned by the "who am I" endpoint.

use serde::{Deserialize, Serialize};

/// Identity attributes of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Server-side user id
    pub id: i64,
    /// Login name
    pub username: String,
    /// Given name
    #[serde(default)]
    pub first_name: String,
    /// Family name
    #[serde(default)]
    pub last_name: String,
    /// Whether the account is active
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Contact email
    #[serde(default)]
    pub email: String,
}

const fn default_active() -> bool {
    true
}

impl UserProfile {
    /// Returns "First Last", falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Payload for creating a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Desired login name
    pub username: String,
    /// Contact email
    pub email: String,
    /// Account password
    pub password: String,
    /// Given name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    /// Family name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
}
