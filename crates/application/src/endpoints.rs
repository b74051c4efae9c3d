//! Authentication endpoint paths, relative to the API base URL.

/// Paths of the endpoints the session talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    /// Exchanges identifier/secret for a credential pair.
    pub token: String,
    /// Exchanges a refresh token for a new access token.
    pub refresh: String,
    /// Returns the profile of the bearer.
    pub me: String,
    /// Creates an account.
    pub register: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            token: "auth/token/".to_string(),
            refresh: "auth/token/refresh/".to_string(),
            me: "auth/users/me/".to_string(),
            register: "auth/register/".to_string(),
        }
    }
}
