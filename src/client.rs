//! Backend API client.
//!
//! Translates domain operations into HTTP calls against the backend's
//! resource (`/api/resource/<Doctype>`) and RPC (`/api/method/<name>`)
//! endpoints, and normalizes the two response envelope shapes (`data` or
//! `message`) into typed results. One `reqwest::Client` with a shared
//! cookie jar per instance keeps the backend session alive across calls;
//! writes carry the CSRF token resolved by [`crate::token`].

use std::sync::Arc;
use std::time::Instant;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{ClientConfig, PING_TIMEOUT};
use crate::defaults::SellingDefaults;
use crate::error::{extract_error_message, friendly_transport_error, ApiError, ApiResult};
use crate::query::ListQuery;
use crate::token::{TokenCache, TokenProvider};
use crate::types::UserSession;

/// Namespace of the backend app's whitelisted RPC methods.
pub(crate) const RPC_NS: &str = "salesdesk.api";

const CSRF_HEADER: &str = "X-Frappe-CSRF-Token";

/// Client for the remote sales backend.
pub struct FrappeClient {
    http: reqwest::Client,
    base_url: String,
    cookies: Arc<Jar>,
    pub(crate) tokens: TokenCache,
    pub(crate) defaults: SellingDefaults,
}

impl FrappeClient {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let cookies = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .cookie_provider(cookies.clone())
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url,
            cookies,
            tokens: TokenCache::new(),
            defaults: SellingDefaults::new(),
        })
    }

    /// Register an embedder token source, consulted after the environment
    /// and the OS credential store.
    pub fn with_token_provider(mut self, provider: TokenProvider) -> Self {
        self.tokens.push_provider(provider);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Drop the memoized selling defaults so the next lookup re-reads the
    /// backend. Intended for tests and for embedders that know the remote
    /// configuration changed.
    pub fn reset_cached_defaults(&self) {
        self.defaults.reset();
    }

    /// Forget the cached signing token and its persisted copy.
    pub fn reset_token(&self) {
        self.tokens.clear();
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn resource_path(doctype: &str, name: Option<&str>) -> String {
        match name {
            Some(name) => format!(
                "/api/resource/{}/{}",
                encode_segment(doctype),
                encode_segment(name)
            ),
            None => format!("/api/resource/{}", encode_segment(doctype)),
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        pairs: Option<&[(String, String)]>,
        body: Option<&Value>,
    ) -> ApiResult<Value> {
        let url = self.url(path);
        let mut req = self.http.request(method, url.as_str());
        if let Some(pairs) = pairs {
            req = req.query(pairs);
        }
        if let Some(token) = self.tokens.get() {
            req = req.header(CSRF_HEADER, token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| friendly_transport_error(&self.base_url, &e))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| friendly_transport_error(&self.base_url, &e))?;

        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "backend request failed");
            return Err(extract_error_message(status, &text));
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Invalid JSON from backend: {e}")))
    }

    pub(crate) async fn get(&self, path: &str, pairs: &[(String, String)]) -> ApiResult<Value> {
        self.send(Method::GET, path, Some(pairs), None).await
    }

    pub(crate) async fn post(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.send(Method::POST, path, None, Some(body)).await
    }

    pub(crate) async fn put(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.send(Method::PUT, path, None, Some(body)).await
    }

    // -----------------------------------------------------------------------
    // Envelope handling
    // -----------------------------------------------------------------------

    /// List rows from a resource endpoint, unwrapping either envelope.
    pub(crate) async fn list_resource<T: DeserializeOwned>(
        &self,
        doctype: &str,
        query: &ListQuery,
    ) -> ApiResult<Vec<T>> {
        let body = self
            .get(&Self::resource_path(doctype, None), &query.to_pairs())
            .await?;
        from_value(unwrap_rows(body))
    }

    /// Read a single document, optionally restricted to selected fields.
    pub(crate) async fn read_resource(
        &self,
        doctype: &str,
        name: &str,
        fields: Option<&[&str]>,
    ) -> ApiResult<Value> {
        let mut pairs = Vec::new();
        if let Some(fields) = fields {
            pairs.push((
                "fields".to_string(),
                serde_json::to_string(fields).unwrap_or_else(|_| "[]".to_string()),
            ));
        }
        let body = self
            .get(&Self::resource_path(doctype, Some(name)), &pairs)
            .await?;
        unwrap_doc(body)
    }

    pub(crate) async fn update_resource(
        &self,
        doctype: &str,
        name: &str,
        body: &Value,
    ) -> ApiResult<Value> {
        let resp = self
            .put(&Self::resource_path(doctype, Some(name)), body)
            .await?;
        unwrap_doc(resp)
    }

    pub(crate) async fn call_method_get(
        &self,
        method: &str,
        pairs: &[(String, String)],
    ) -> ApiResult<Value> {
        self.get(&format!("/api/method/{method}"), pairs).await
    }

    pub(crate) async fn call_method_post(&self, method: &str, body: &Value) -> ApiResult<Value> {
        self.post(&format!("/api/method/{method}"), body).await
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// Log in with username and password, persist the issued signing
    /// token, and return the resulting session.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<UserSession> {
        let body = serde_json::json!({ "usr": username, "pwd": password });
        let resp = self.post("/api/method/login", &body).await?;
        if let Some(token) = resp.get("csrf_token").and_then(Value::as_str) {
            self.tokens.set(token);
        }
        let session = self.get_session().await?;
        info!(user = %session.user, "logged in");
        Ok(session)
    }

    /// End the backend session. The local token is cleared even when the
    /// remote call fails; the failure still propagates.
    pub async fn logout(&self) -> ApiResult<()> {
        let result = self
            .post("/api/method/logout", &Value::Null)
            .await
            .map(|_| ());
        self.tokens.clear();
        if result.is_ok() {
            info!("logged out");
        }
        result
    }

    /// Probe the active backend session and resolve the user's display
    /// name. Fails with "No active session" when nobody is logged in.
    pub async fn get_session(&self) -> ApiResult<UserSession> {
        let resp = self
            .call_method_get("frappe.auth.get_logged_user", &[])
            .await?;
        let user = resp
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::Backend("No active session".to_string()))?
            .to_string();

        let details = self
            .read_resource("User", &user, Some(&["full_name"]))
            .await?;
        let full_name = details
            .get("full_name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(&user)
            .to_string();

        Ok(UserSession {
            user,
            full_name,
            sid: self.session_cookie(),
        })
    }

    /// Raw cookie string currently held for the backend origin.
    fn session_cookie(&self) -> String {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|url| self.cookies.cookies(&url))
            .and_then(|hv| hv.to_str().map(str::to_string).ok())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Connectivity probe
    // -----------------------------------------------------------------------

    /// Lightweight reachability check against the backend's ping method.
    /// Never fails; problems are reported inside the result.
    pub async fn ping(&self) -> Connectivity {
        let url = self.url("/api/method/frappe.ping");
        let start = Instant::now();
        let resp = match self.http.get(url.as_str()).timeout(PING_TIMEOUT).send().await {
            Ok(r) => r,
            Err(e) => {
                return Connectivity {
                    ok: false,
                    latency_ms: None,
                    error: Some(friendly_transport_error(&self.base_url, &e).message().to_string()),
                };
            }
        };

        let latency = start.elapsed().as_millis() as u64;
        let status = resp.status();
        if status.is_success() {
            info!(latency_ms = latency, "connectivity probe passed");
            Connectivity {
                ok: true,
                latency_ms: Some(latency),
                error: None,
            }
        } else {
            let body = resp.text().await.unwrap_or_default();
            Connectivity {
                ok: false,
                latency_ms: Some(latency),
                error: Some(extract_error_message(status, &body).message().to_string()),
            }
        }
    }
}

/// Result of a connectivity probe.
#[derive(Debug, serde::Serialize)]
pub struct Connectivity {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

/// Unwrap a single-document body: `data` key, `message` key, or the body
/// itself when it is already a bare object.
pub(crate) fn unwrap_doc(body: Value) -> ApiResult<Value> {
    if let Some(doc) = non_null(&body, "data") {
        return Ok(doc);
    }
    if let Some(doc) = non_null(&body, "message") {
        return Ok(doc);
    }
    if body.is_object() {
        return Ok(body);
    }
    Err(ApiError::InvalidResponse(
        "Backend response missing document payload".to_string(),
    ))
}

/// Unwrap a list body into its rows; an absent payload is an empty list.
pub(crate) fn unwrap_rows(body: Value) -> Value {
    non_null(&body, "data")
        .or_else(|| non_null(&body, "message"))
        .unwrap_or_else(|| Value::Array(Vec::new()))
}

fn non_null(body: &Value, key: &str) -> Option<Value> {
    body.get(key).filter(|v| !v.is_null()).cloned()
}

pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::InvalidResponse(format!("Unexpected backend payload: {e}")))
}

/// Percent-encode a URL path segment (doctype and document names may
/// contain spaces and other reserved characters).
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '?' => out.push_str("%3F"),
            '#' => out.push_str("%23"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            '+' => out.push_str("%2B"),
            '/' => out.push_str("%2F"),
            _ => out.push(c),
        }
    }
    out
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_paths_encode_names() {
        assert_eq!(
            FrappeClient::resource_path("Sales Order", Some("SO-0042")),
            "/api/resource/Sales%20Order/SO-0042"
        );
        assert_eq!(
            FrappeClient::resource_path("Item Price", None),
            "/api/resource/Item%20Price"
        );
        assert_eq!(
            FrappeClient::resource_path("Customer", Some("A&B / Söhne")),
            "/api/resource/Customer/A%26B%20%2F%20Söhne"
        );
    }

    #[test]
    fn unwrap_doc_accepts_both_envelopes() {
        let data = serde_json::json!({ "data": { "name": "SO-1" } });
        assert_eq!(unwrap_doc(data).unwrap()["name"], "SO-1");

        let message = serde_json::json!({ "message": { "name": "SO-2" } });
        assert_eq!(unwrap_doc(message).unwrap()["name"], "SO-2");
    }

    #[test]
    fn unwrap_doc_prefers_data_over_message() {
        let both = serde_json::json!({ "data": { "name": "a" }, "message": { "name": "b" } });
        assert_eq!(unwrap_doc(both).unwrap()["name"], "a");
    }

    #[test]
    fn unwrap_doc_rejects_scalar_bodies() {
        assert!(unwrap_doc(serde_json::json!("pong")).is_err());
    }

    #[test]
    fn unwrap_rows_defaults_to_empty() {
        let rows = unwrap_rows(serde_json::json!({ "message": null }));
        assert_eq!(rows, serde_json::json!([]));

        let rows = unwrap_rows(serde_json::json!({ "data": [{ "name": "x" }] }));
        assert_eq!(rows[0]["name"], "x");
    }

    #[tokio::test]
    async fn transport_failure_surfaces_friendly_message() {
        let client = FrappeClient::new(ClientConfig::new("http://127.0.0.1:1")).unwrap();
        let err = client.get_session().await.unwrap_err();
        assert!(
            err.message().contains("127.0.0.1:1"),
            "unexpected message: {}",
            err.message()
        );
    }
}
