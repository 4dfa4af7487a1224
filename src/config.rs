//! Client configuration.
//!
//! Holds the backend base URL and request timeouts. The base URL is
//! normalized once at construction so the rest of the crate can append
//! `/api/...` paths without re-checking scheme or trailing slashes.

use std::time::Duration;

/// Default timeout for API requests (30 seconds).
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity probe.
pub(crate) const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`crate::FrappeClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Build a config from a raw base URL, normalizing it.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Normalise the backend base URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Strip trailing /api
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    // Strip trailing slashes again (in case "/api/" was present)
    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_https_scheme_by_default() {
        assert_eq!(normalize_base_url("erp.example.com"), "https://erp.example.com");
    }

    #[test]
    fn adds_http_scheme_for_localhost() {
        assert_eq!(normalize_base_url("localhost:8000"), "http://localhost:8000");
        assert_eq!(normalize_base_url("127.0.0.1:8000"), "http://127.0.0.1:8000");
    }

    #[test]
    fn strips_trailing_slashes_and_api() {
        assert_eq!(
            normalize_base_url("https://erp.example.com/api/"),
            "https://erp.example.com"
        );
        assert_eq!(
            normalize_base_url("https://erp.example.com///"),
            "https://erp.example.com"
        );
    }

    #[test]
    fn keeps_explicit_http_scheme() {
        assert_eq!(
            normalize_base_url("http://erp.internal/api"),
            "http://erp.internal"
        );
    }

    #[test]
    fn config_defaults() {
        let cfg = ClientConfig::new(" erp.example.com ");
        assert_eq!(cfg.base_url, "https://erp.example.com");
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    }
}
