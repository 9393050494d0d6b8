//! Error taxonomy for API requests.
//!
//! The class of a failure decides what the UI does next:
//! end-of-data silently stops pagination, transient failures stay
//! retryable by scrolling, rejected requests surface their server message
//! inline, and anything unclassified conservatively halts pagination.

use reqwest::StatusCode;
use thiserror::Error;

/// Substring the backend uses when a page past the end is requested.
/// Fragile by design: the backend offers no structured signal, so the
/// exact contract is preserved.
const INVALID_PAGE_MARKER: &str = "Invalid page";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Requested past the last page. Normal termination, never shown.
    #[error("no more pages")]
    EndOfData,
    /// Network or server-unavailable class failure; retry may succeed.
    #[error("{0}")]
    Transient(String),
    /// The server understood and refused (invalid PIN, bad request).
    #[error("{0}")]
    Rejected(String),
    /// Anything else; treated as permanent.
    #[error("{0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }

    /// Classify a non-2xx response from its status and raw body.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = error_message(body).unwrap_or_else(|| format!("HTTP {status}"));
        if message.contains(INVALID_PAGE_MARKER) {
            return ApiError::EndOfData;
        }
        match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                ApiError::Transient(message)
            }
            s if s.is_server_error() => ApiError::Transient(message),
            s if s.is_client_error() => ApiError::Rejected(message),
            _ => ApiError::Unexpected(message),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Unexpected(format!("invalid response: {err}"))
        } else {
            // Connect failures, timeouts and mid-transfer drops all land
            // here; the next scroll past the sentinel retries them.
            ApiError::Transient(err.to_string())
        }
    }
}

/// Pull a human-readable message out of an error body. The backend is not
/// consistent about the key, so `error`, `detail` and `message` are tried
/// in that order.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    for key in ["error", "detail", "message"] {
        if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
            return Some(text.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_page_is_end_of_data() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, r#"{"detail": "Invalid page."}"#);
        assert_eq!(err, ApiError::EndOfData);
    }

    #[test]
    fn test_plain_not_found_is_rejected() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, r#"{"detail": "Not found."}"#);
        assert_eq!(err, ApiError::Rejected("Not found.".into()));
    }

    #[test]
    fn test_server_errors_are_transient() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(ApiError::from_status(status, "").is_transient());
        }
    }

    #[test]
    fn test_throttling_is_transient() {
        assert!(ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
    }

    #[test]
    fn test_rejection_carries_server_message() {
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"error": "Invalid PIN for this album"}"#,
        );
        assert_eq!(err, ApiError::Rejected("Invalid PIN for this album".into()));
    }

    #[test]
    fn test_non_json_body_falls_back_to_status() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, "<html>oops</html>");
        assert_eq!(err, ApiError::Rejected("HTTP 400 Bad Request".into()));
    }

    #[test]
    fn test_message_key_order() {
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"message": "second", "error": "first"}"#,
        );
        assert_eq!(err, ApiError::Rejected("first".into()));
    }
}
