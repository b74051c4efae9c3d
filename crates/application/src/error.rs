//! Application error types

use cm_domain::{ApiResponse, DomainError};
use thiserror::Error;

use crate::ports::HttpClientError;

/// Failures of session operations (login, refresh, profile, bootstrap).
///
/// `Clone` so a single refresh outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The authentication endpoint rejected the identifier/secret.
    #[error("invalid credentials: {message}")]
    CredentialsInvalid {
        /// Server-provided reason
        message: String,
    },

    /// The access token was rejected and no refresh token is available.
    #[error("session expired")]
    SessionExpired,

    /// The refresh endpoint rejected the refresh token.
    #[error("token refresh failed: {message}")]
    RefreshFailed {
        /// Server-provided reason
        message: String,
    },

    /// No response was received.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(#[from] HttpClientError),

    /// The server answered with a status the operation does not handle.
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Server-provided reason
        message: String,
    },

    /// The server answered with a body that could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Failures returned to callers of the request pipeline.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was rejected with 401 and could not be recovered.
    #[error("request unauthorized (session ended: {session_ended})")]
    Unauthorized {
        /// The original 401 response
        response: Box<ApiResponse>,
        /// Whether the session was logged out as a consequence
        session_ended: bool,
        /// Why recovery failed, when a refresh was attempted
        cause: Option<SessionError>,
    },

    /// No response was received.
    #[error("network error: {0}")]
    Network(#[from] HttpClientError),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Server-provided reason
        message: String,
    },

    /// The response body could not be decoded.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The request itself was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] DomainError),
}

impl ApiError {
    /// Returns true if this error logged the session out.
    #[must_use]
    pub const fn session_ended(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized {
                session_ended: true,
                ..
            }
        )
    }
}

/// Result type alias for pipeline operations.
pub type ApiResult<T> = Result<T, ApiError>;
