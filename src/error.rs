//! Error type for the backend integration layer.
//!
//! Every failed operation surfaces as an [`ApiError`] carrying a
//! human-readable message. The backend reports failures in several shapes
//! (structured JSON with `_server_messages`/`message`, HTML error pages,
//! plain text), so extraction tries the structured fields first, then
//! strips markup from the raw body and truncates it, and finally falls
//! back to the HTTP status text.

use reqwest::StatusCode;
use thiserror::Error;

/// Longest body snippet kept when falling back to raw response text.
const MAX_BODY_SNIPPET: usize = 240;

/// Error raised by [`crate::FrappeClient`] operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("{0}")]
    Transport(String),
    /// The backend answered with a non-success status.
    #[error("{0}")]
    Backend(String),
    /// The response arrived but did not have the expected shape.
    #[error("{0}")]
    InvalidResponse(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// The extracted or mapped message, regardless of origin.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Transport(m) | ApiError::Backend(m) | ApiError::InvalidResponse(m) => m,
        }
    }
}

/// Convert a `reqwest::Error` into a user-friendly transport message.
pub(crate) fn friendly_transport_error(url: &str, err: &reqwest::Error) -> ApiError {
    let message = if err.is_connect() {
        format!("Cannot reach backend at {url}")
    } else if err.is_timeout() {
        format!("Connection to {url} timed out")
    } else if err.is_builder() {
        format!("Invalid backend URL: {url}")
    } else {
        format!("Network error communicating with {url}: {err}")
    };
    ApiError::Transport(message)
}

/// Extract the most useful message from a non-success response body.
///
/// Order: structured `_server_messages` / `message` / `exc` JSON fields,
/// then the markup-stripped and truncated raw body, then the status text.
pub(crate) fn extract_error_message(status: StatusCode, body: &str) -> ApiError {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let structured = ["_server_messages", "message", "exc"]
            .iter()
            .find_map(|key| json.get(*key))
            .and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(message) = structured {
            return ApiError::Backend(message);
        }
        // Valid JSON without a usable message field: the raw body is
        // noise, so report the status instead.
        return ApiError::Backend(status_text(status));
    }

    let plain = strip_markup(body);
    let plain = plain.trim();
    if !plain.is_empty() {
        return ApiError::Backend(truncate(plain, MAX_BODY_SNIPPET));
    }

    ApiError::Backend(status_text(status))
}

/// HTTP status text fallback when the body carries nothing usable.
fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}

/// Drop `<...>` tag spans from an HTML-ish body, keeping the text between.
fn strip_markup(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut in_tag = false;
    for c in body.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // Tag boundaries act as whitespace so adjacent text does
                // not run together.
                if !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Truncate at a char boundary, never mid-codepoint.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_structured_server_messages() {
        let body = r#"{"_server_messages": "Insufficient Permission for Sales Order", "message": "other"}"#;
        let err = extract_error_message(StatusCode::FORBIDDEN, body);
        assert_eq!(err.message(), "Insufficient Permission for Sales Order");
    }

    #[test]
    fn falls_back_to_message_field() {
        let body = r#"{"message": "Customer ACME not found"}"#;
        let err = extract_error_message(StatusCode::NOT_FOUND, body);
        assert_eq!(err.message(), "Customer ACME not found");
    }

    #[test]
    fn strips_markup_from_html_bodies() {
        let body = "<html><body><h1>Server Error</h1><p>Something broke</p></body></html>";
        let err = extract_error_message(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert!(err.message().contains("Server Error"));
        assert!(err.message().contains("Something broke"));
        assert!(!err.message().contains('<'));
    }

    #[test]
    fn truncates_long_plain_bodies() {
        let body = "x".repeat(1000);
        let err = extract_error_message(StatusCode::BAD_GATEWAY, &body);
        assert_eq!(err.message().chars().count(), 240);
    }

    #[test]
    fn empty_body_yields_status_text() {
        let err = extract_error_message(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.message(), "503 Service Unavailable");
    }

    #[test]
    fn markup_only_body_yields_status_text() {
        let err = extract_error_message(StatusCode::BAD_GATEWAY, "<html></html>");
        assert_eq!(err.message(), "502 Bad Gateway");
    }

    #[test]
    fn non_string_message_is_stringified() {
        let body = r#"{"message": {"code": 417, "hint": "retry later"}}"#;
        let err = extract_error_message(StatusCode::EXPECTATION_FAILED, body);
        assert!(err.message().contains("retry later"));
    }
}
