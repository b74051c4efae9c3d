//! Session state machine types.
//!
//! ```text
//! Unauthenticated -> Authenticating -> Authenticated
//!        ^                                  |
//!        |                        (expiry detected)
//!        |                                  v
//!        +------------------------------ Refreshing -> Authenticated
//! ```
//!
//! `Refreshing` is transient and always exits to one of the two stable
//! states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current position of a session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No usable credentials.
    #[default]
    Unauthenticated,
    /// Login or startup bootstrap in progress.
    Authenticating,
    /// Credentials and profile loaded.
    Authenticated,
    /// Access token rejected; a refresh is in flight.
    Refreshing,
}

impl SessionState {
    /// Returns true for the two resting states.
    #[must_use]
    pub const fn is_stable(self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Authenticated)
    }

    /// Returns true if the session holds a loaded identity.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Refreshing)
    }

    /// Returns the state as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Refreshing => "refreshing",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// Explicit logout.
    UserRequested,
    /// Access token rejected with no refresh token to recover.
    SessionExpired,
    /// The refresh endpoint rejected the refresh token.
    RefreshFailed,
    /// Startup could not establish an authenticated session.
    BootstrapFailed,
    /// Credentials were accepted but the profile could not be loaded.
    ProfileUnavailable,
}

impl LogoutReason {
    /// Returns true if the user did not ask for the logout.
    ///
    /// Involuntary logouts send the user back to the login page with the
    /// current destination preserved.
    #[must_use]
    pub const fn is_involuntary(self) -> bool {
        !matches!(self, Self::UserRequested)
    }
}

/// Notifications emitted as the session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Login or bootstrap produced an authenticated session.
    LoggedIn {
        /// Username of the loaded profile.
        username: String,
    },
    /// A refresh issued a new access token.
    Refreshed {
        /// Whether the server also rotated the refresh token.
        rotated: bool,
    },
    /// Credentials and profile were cleared.
    LoggedOut {
        /// Why the session ended.
        reason: LogoutReason,
    },
}
