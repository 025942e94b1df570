//! Fetch error types.

use serde_json::Value;
use thiserror::Error;

use crate::schema::SchemaError;

/// Errors returned by [`FetchClient`](crate::FetchClient) operations.
///
/// A call fails either before a usable 2xx JSON body exists ([`Transport`](Self::Transport))
/// or because that body did not satisfy the caller's schema ([`Schema`](Self::Schema)).
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request did not produce a successful JSON response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body did not match the schema.
    #[error("Schema validation failed: {0}")]
    Schema(#[from] SchemaError),
}

impl FetchError {
    /// Check if this is a transport failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if this is a schema failure.
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    /// HTTP status of the response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(TransportError::Status { status, .. })
            | Self::Transport(TransportError::Decode { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Decoded body of a non-2xx response.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Transport(TransportError::Status { payload, .. }) => Some(payload),
            _ => None,
        }
    }

    /// The validation error, for schema failures.
    pub fn schema_error(&self) -> Option<&SchemaError> {
        match self {
            Self::Schema(e) => Some(e),
            _ => None,
        }
    }
}

/// Failures at or below the HTTP response level.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The request could not be constructed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Connection or I/O failure while sending the request or reading the body.
    #[error("Request failed: {0}")]
    Network(String),

    /// The response body was not valid JSON.
    #[error("Failed to decode response (HTTP {status}): {message}")]
    Decode { status: u16, message: String },

    /// Non-2xx response. `payload` is the decoded body.
    #[error("HTTP {status}: {payload}")]
    Status { status: u16, payload: Value },
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::InvalidRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaIssue;
    use serde_json::json;

    #[test]
    fn test_status_error_exposes_payload() {
        let err = FetchError::from(TransportError::Status {
            status: 404,
            payload: json!({"error": "not found"}),
        });
        assert!(err.is_transport());
        assert!(!err.is_schema());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.payload(), Some(&json!({"error": "not found"})));
        assert_eq!(err.to_string(), r#"HTTP 404: {"error":"not found"}"#);
    }

    #[test]
    fn test_decode_error_has_status_but_no_payload() {
        let err = FetchError::from(TransportError::Decode {
            status: 502,
            message: "expected value".to_string(),
        });
        assert_eq!(err.status(), Some(502));
        assert!(err.payload().is_none());
    }

    #[test]
    fn test_network_error_has_no_status() {
        let err = FetchError::from(TransportError::Network("connection refused".into()));
        assert!(err.status().is_none());
        assert!(err.schema_error().is_none());
    }

    #[test]
    fn test_schema_error_accessors() {
        let err = FetchError::from(SchemaError::from(SchemaIssue::root("expected object")));
        assert!(err.is_schema());
        assert_eq!(err.schema_error().map(|e| e.issues().len()), Some(1));
        assert_eq!(
            err.to_string(),
            "Schema validation failed: (root): expected object"
        );
    }
}
