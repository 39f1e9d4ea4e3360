//! Error types for run submission.

use serde::{Deserialize, Serialize};

/// Result type for submission operations.
pub type SubmitResult<T> = Result<T, SubmitError>;

/// Why the backend refused a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// The serialized graph failed backend validation.
    MalformedGraph,
    /// The target namespace does not exist on the backend.
    NamespaceNotFound,
    /// Any other reason code, or none.
    Other(String),
}

impl RejectionReason {
    /// Map a backend reason code, falling back to the HTTP status when no code is given.
    pub fn from_code(code: Option<&str>, status: u16) -> Self {
        match code {
            Some("malformed_graph") => Self::MalformedGraph,
            Some("namespace_not_found") => Self::NamespaceNotFound,
            Some(other) => Self::Other(other.to_string()),
            None => match status {
                400 | 422 => Self::MalformedGraph,
                _ => Self::Other(format!("http_{}", status)),
            },
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedGraph => f.write_str("malformed_graph"),
            Self::NamespaceNotFound => f.write_str("namespace_not_found"),
            Self::Other(code) => f.write_str(code),
        }
    }
}

/// Errors that can occur while submitting a run.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Credential missing or refused by the backend.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Backend unreachable, or TLS trust material missing or unusable.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The caller-supplied timeout elapsed.
    #[error("Request timed out")]
    Timeout,

    /// Backend explicitly rejected the run.
    #[error("Run rejected ({reason}, status {status}): {message}")]
    Rejected {
        status: u16,
        reason: RejectionReason,
        message: String,
        details: Option<String>,
    },

    /// HTTP failure not covered above.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// The graph could not be compiled into a run request.
    #[error("Compilation failed: {0}")]
    Compile(#[from] trainflow_core::PipelineError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl SubmitError {
    /// Classify a transport-level failure.
    pub fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connection(error.to_string())
        } else {
            Self::Http(error)
        }
    }

    /// Create an error from a non-success status code and response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorResponse>(body).ok();

        if status == 401 || status == 403 {
            let message = parsed
                .map(|r| r.error)
                .unwrap_or_else(|| format!("backend returned status {}", status));
            return Self::Authentication(message);
        }

        match parsed {
            Some(response) => Self::Rejected {
                status,
                reason: RejectionReason::from_code(response.code.as_deref(), status),
                message: response.error,
                details: response.details,
            },
            None => Self::Rejected {
                status,
                reason: RejectionReason::from_code(None, status),
                message: body.to_string(),
                details: None,
            },
        }
    }
}

impl From<reqwest::Error> for SubmitError {
    fn from(error: reqwest::Error) -> Self {
        Self::from_transport(error)
    }
}

/// Error response from the pipeline backend.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_is_authentication() {
        let err = SubmitError::from_response(401, r#"{"error": "token expired"}"#);
        assert!(matches!(err, SubmitError::Authentication(ref m) if m == "token expired"));

        let err = SubmitError::from_response(403, "forbidden");
        assert!(matches!(err, SubmitError::Authentication(_)));
    }

    #[test]
    fn test_reason_code_parsed() {
        let body = r#"{"error": "namespace mlops-dev-zone not found", "code": "namespace_not_found"}"#;
        match SubmitError::from_response(404, body) {
            SubmitError::Rejected { reason, message, .. } => {
                assert_eq!(reason, RejectionReason::NamespaceNotFound);
                assert!(message.contains("mlops-dev-zone"));
            }
            other => panic!("Expected Rejected error, got {:?}", other),
        }
    }

    #[test]
    fn test_reason_falls_back_to_status() {
        match SubmitError::from_response(400, "bad graph") {
            SubmitError::Rejected { reason, message, .. } => {
                assert_eq!(reason, RejectionReason::MalformedGraph);
                assert_eq!(message, "bad graph");
            }
            other => panic!("Expected Rejected error, got {:?}", other),
        }

        assert_eq!(
            RejectionReason::from_code(None, 503),
            RejectionReason::Other("http_503".to_string())
        );
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(RejectionReason::MalformedGraph.to_string(), "malformed_graph");
        assert_eq!(
            RejectionReason::Other("quota_exceeded".to_string()).to_string(),
            "quota_exceeded"
        );
    }
}
