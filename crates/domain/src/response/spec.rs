//! API response type

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::request::Headers;

/// Status code the server uses to signal a rejected or expired credential.
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// A response received from the API.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Raw response body
    pub body: Vec<u8>,
    /// Round-trip time
    pub duration: Duration,
}

impl ApiResponse {
    /// Creates a response with an empty header set.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the status code indicates success (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns true if the server rejected the credential.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.status == STATUS_UNAUTHORIZED
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Extracts a human-readable error message from a JSON error body.
    ///
    /// Understands `{"detail": ...}` bodies and field-error maps such as
    /// `{"username": ["This field is required."]}`; falls back to the raw text.
    #[must_use]
    pub fn error_message(&self) -> String {
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(&self.body) else {
            return self.text();
        };
        if let Some(detail) = value.get("detail").and_then(serde_json::Value::as_str) {
            return detail.to_string();
        }
        match value.as_object() {
            Some(fields) if !fields.is_empty() => fields
                .iter()
                .map(|(field, errors)| {
                    let joined = errors.as_array().map_or_else(
                        || errors.to_string(),
                        |list| {
                            list.iter()
                                .map(|e| e.as_str().map_or_else(|| e.to_string(), str::to_string))
                                .collect::<Vec<_>>()
                                .join(" ")
                        },
                    );
                    format!("{field}: {joined}")
                })
                .collect::<Vec<_>>()
                .join("; "),
            _ => self.text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_checks() {
        assert!(ApiResponse::new(200, "").is_success());
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(401, "").is_success());
        assert!(ApiResponse::new(401, "").is_unauthorized());
        assert!(!ApiResponse::new(403, "").is_unauthorized());
    }

    #[test]
    fn test_detail_message() {
        let response = ApiResponse::new(
            401,
            r#"{"detail": "No active account found with the given credentials"}"#,
        );
        assert_eq!(
            response.error_message(),
            "No active account found with the given credentials"
        );
    }

    #[test]
    fn test_field_errors_message() {
        let response = ApiResponse::new(400, r#"{"password": ["This field is required."]}"#);
        assert_eq!(response.error_message(), "password: This field is required.");
    }

    #[test]
    fn test_non_json_message() {
        let response = ApiResponse::new(502, "Bad Gateway");
        assert_eq!(response.error_message(), "Bad Gateway");
    }
}
