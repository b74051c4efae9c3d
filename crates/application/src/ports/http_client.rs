//! HTTP Client port

use async_trait::async_trait;
use cm_domain::{ApiRequest, ApiResponse};
use thiserror::Error;

/// Transport-level failures. A response with any status code, including
/// 4xx and 5xx, is not an error at this level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpClientError {
    /// The request did not complete in time.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// Configured timeout
        timeout_ms: u64,
    },

    /// The host name could not be resolved.
    #[error("could not resolve host {host}: {message}")]
    DnsError {
        /// Host that failed to resolve
        host: String,
        /// Underlying error message
        message: String,
    },

    /// The server refused the connection.
    #[error("connection refused by {host}:{port}")]
    ConnectionRefused {
        /// Target host
        host: String,
        /// Target port
        port: u16,
    },

    /// The connection failed for another reason.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Port for sending requests to the API.
///
/// Implementations resolve `request.path` against their configured base URL
/// and send the request exactly as given: no headers are added or rewritten
/// at this level.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends the request and returns the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error only if no response was received.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpClientError>;
}
