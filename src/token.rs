//! Request-signing token discovery and caching.
//!
//! Every write to the backend must carry an `X-Frappe-CSRF-Token` header.
//! The token is resolved from an ordered candidate list, evaluated
//! short-circuit, and the first hit is cached for the client's lifetime:
//!
//! 1. process environment (`SALESDESK_CSRF_TOKEN`)
//! 2. OS credential store (DPAPI on Windows, Keychain on macOS, Secret
//!    Service on Linux — via the `keyring` crate)
//! 3. an embedder-registered fallback provider
//!
//! A token returned by a successful login replaces the cache and the
//! persisted copy; logout clears both.

use keyring::Entry;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Environment variable consulted first during token discovery.
pub const TOKEN_ENV_VAR: &str = "SALESDESK_CSRF_TOKEN";

const SERVICE_NAME: &str = "salesdesk";
const KEY_SESSION_TOKEN: &str = "csrf_token";

/// Embedder-supplied token source, consulted after env and keyring.
pub type TokenProvider = Box<dyn Fn() -> Option<String> + Send + Sync>;

/// One source in the discovery chain.
pub(crate) enum TokenCandidate {
    /// A process environment variable.
    Env(&'static str),
    /// The OS credential store entry written by previous logins.
    Keyring,
    /// A caller-registered closure.
    Provider(TokenProvider),
}

impl TokenCandidate {
    fn resolve(&self) -> Option<String> {
        let raw = match self {
            TokenCandidate::Env(var) => std::env::var(var).ok(),
            TokenCandidate::Keyring => get_credential(KEY_SESSION_TOKEN),
            TokenCandidate::Provider(f) => f(),
        };
        raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }

    fn persists(&self) -> bool {
        matches!(self, TokenCandidate::Keyring)
    }
}

/// Lifetime-scoped token state owned by [`crate::FrappeClient`].
pub(crate) struct TokenCache {
    cached: Mutex<Option<String>>,
    candidates: Vec<TokenCandidate>,
}

impl TokenCache {
    pub(crate) fn new() -> Self {
        Self::with_candidates(vec![
            TokenCandidate::Env(TOKEN_ENV_VAR),
            TokenCandidate::Keyring,
        ])
    }

    pub(crate) fn with_candidates(candidates: Vec<TokenCandidate>) -> Self {
        Self {
            cached: Mutex::new(None),
            candidates,
        }
    }

    pub(crate) fn push_provider(&mut self, provider: TokenProvider) {
        self.candidates.push(TokenCandidate::Provider(provider));
    }

    /// Cached token, or the first candidate that yields one.
    pub(crate) fn get(&self) -> Option<String> {
        let mut cached = self.cached.lock().unwrap();
        if cached.is_some() {
            return cached.clone();
        }
        for candidate in &self.candidates {
            if let Some(token) = candidate.resolve() {
                *cached = Some(token.clone());
                return Some(token);
            }
        }
        None
    }

    /// Replace the cache with a freshly issued token and persist it.
    pub(crate) fn set(&self, token: &str) {
        let token = token.trim();
        if token.is_empty() {
            return;
        }
        *self.cached.lock().unwrap() = Some(token.to_string());
        if self.candidates.iter().any(TokenCandidate::persists) {
            if let Err(e) = set_credential(KEY_SESSION_TOKEN, token) {
                warn!(error = %e, "keyring: failed to persist session token");
            }
        }
    }

    /// Forget the cached token and the persisted copy.
    pub(crate) fn clear(&self) {
        *self.cached.lock().unwrap() = None;
        if self.candidates.iter().any(TokenCandidate::persists) {
            if let Err(e) = delete_credential(KEY_SESSION_TOKEN) {
                warn!(error = %e, "keyring: failed to delete session token");
            }
        }
        debug!("session token cleared");
    }
}

// ---------------------------------------------------------------------------
// OS credential store
// ---------------------------------------------------------------------------

/// Retrieve a credential from the OS keyring. Returns `None` when the
/// entry does not exist (or the platform returns a "not found" error).
fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())?;
    Ok(())
}

/// Delete a credential. Silently succeeds if the entry does not exist.
fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn provider(value: Option<&'static str>) -> TokenCandidate {
        TokenCandidate::Provider(Box::new(move || value.map(String::from)))
    }

    #[test]
    #[serial]
    fn env_candidate_resolves() {
        std::env::set_var(TOKEN_ENV_VAR, "env-token");
        let cache = TokenCache::with_candidates(vec![TokenCandidate::Env(TOKEN_ENV_VAR)]);
        assert_eq!(cache.get().as_deref(), Some("env-token"));
        std::env::remove_var(TOKEN_ENV_VAR);
    }

    #[test]
    #[serial]
    fn env_wins_over_later_candidates() {
        std::env::set_var(TOKEN_ENV_VAR, "env-token");
        let cache = TokenCache::with_candidates(vec![
            TokenCandidate::Env(TOKEN_ENV_VAR),
            provider(Some("provider-token")),
        ]);
        assert_eq!(cache.get().as_deref(), Some("env-token"));
        std::env::remove_var(TOKEN_ENV_VAR);
    }

    #[test]
    #[serial]
    fn blank_env_value_falls_through() {
        std::env::set_var(TOKEN_ENV_VAR, "   ");
        let cache = TokenCache::with_candidates(vec![
            TokenCandidate::Env(TOKEN_ENV_VAR),
            provider(Some("provider-token")),
        ]);
        assert_eq!(cache.get().as_deref(), Some("provider-token"));
        std::env::remove_var(TOKEN_ENV_VAR);
    }

    #[test]
    fn first_hit_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache = TokenCache::with_candidates(vec![TokenCandidate::Provider(Box::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some("once".to_string())
            },
        ))]);
        assert_eq!(cache.get().as_deref(), Some("once"));
        assert_eq!(cache.get().as_deref(), Some("once"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_overrides_candidates_and_clear_forgets() {
        let cache = TokenCache::with_candidates(vec![provider(Some("discovered"))]);
        cache.set("issued-by-login");
        assert_eq!(cache.get().as_deref(), Some("issued-by-login"));

        cache.clear();
        // After clearing, discovery runs again.
        assert_eq!(cache.get().as_deref(), Some("discovered"));
    }

    #[test]
    fn missing_everywhere_yields_none() {
        let cache = TokenCache::with_candidates(vec![provider(None)]);
        assert_eq!(cache.get(), None);
    }
}
