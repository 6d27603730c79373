//! Signing-key cache — fetches and caches the identity provider's JWKS.
//!
//! # Behavior
//!
//! - A hit within the freshness window returns the cached set with zero
//!   network access.
//! - A miss or stale entry triggers a fetch that replaces the cached set
//!   wholesale together with its fetch timestamp.
//! - Concurrent callers during a refetch share one in-flight fetch: the
//!   refresh mutex serializes fetchers, and whoever loses the race re-checks
//!   freshness before issuing a redundant request.
//! - On fetch failure with a stale set present, the stale set is returned.

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Error variants for signing-key fetch failures.
#[derive(Debug, thiserror::Error)]
pub enum KeyFetchError {
    /// Network or HTTP error while fetching the JWKS.
    #[error("JWKS fetch error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Cached JWKS entry.
struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedJwks {
    fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() >= self.ttl
    }
}

/// Signing-key cache for a single JWKS endpoint.
///
/// Owned by the verifier rather than held in module-level state, so tests
/// can point it at a fake endpoint and force staleness with a zero TTL.
pub struct KeyCache {
    jwks_url: String,
    http: reqwest::Client,
    /// How long to cache a fetched JWKS (default 1 hour).
    ttl: Duration,
    cached: RwLock<Option<CachedJwks>>,
    /// Serializes refetches so concurrent misses share one in-flight fetch.
    refresh: Mutex<()>,
}

impl KeyCache {
    /// Create a cache for `jwks_url` with the given freshness window and
    /// fetch timeout.
    #[must_use]
    pub fn new(jwks_url: String, ttl: Duration, fetch_timeout: Duration) -> Self {
        if !jwks_url.starts_with("https://") {
            warn!(url = %jwks_url, "JWKS endpoint is not HTTPS");
        }

        Self {
            jwks_url,
            http: reqwest::Client::builder()
                .timeout(fetch_timeout)
                .build()
                .unwrap_or_default(),
            ttl,
            cached: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Return the cached JWKS, fetching if absent or stale.
    ///
    /// # Errors
    ///
    /// Returns [`KeyFetchError`] only when the fetch fails and no previous
    /// set is cached; a stale set degrades gracefully.
    pub async fn get(&self) -> Result<JwkSet, KeyFetchError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if !cached.is_stale() {
                return Ok(cached.keys.clone());
            }
        }

        self.refresh(false).await
    }

    /// Fetch the JWKS, replacing the cached set on success.
    ///
    /// With `force` unset, a caller that waited on another in-flight fetch
    /// re-checks freshness and reuses that result instead of fetching again.
    /// `force` bypasses the re-check (used once on an unknown key id).
    pub async fn refresh(&self, force: bool) -> Result<JwkSet, KeyFetchError> {
        let _guard = self.refresh.lock().await;

        if !force {
            if let Some(cached) = self.cached.read().await.as_ref() {
                if !cached.is_stale() {
                    return Ok(cached.keys.clone());
                }
            }
        }

        debug!(url = %self.jwks_url, "Fetching JWKS");
        match self.fetch().await {
            Ok(keys) => {
                *self.cached.write().await = Some(CachedJwks {
                    keys: keys.clone(),
                    fetched_at: Instant::now(),
                    ttl: self.ttl,
                });
                Ok(keys)
            }
            Err(e) => {
                // Degrade to the previous set if we have one
                if let Some(cached) = self.cached.read().await.as_ref() {
                    warn!(url = %self.jwks_url, error = %e, "JWKS fetch failed, serving stale key set");
                    return Ok(cached.keys.clone());
                }
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<JwkSet, KeyFetchError> {
        let jwks: JwkSet = self
            .http
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(jwks)
    }
}

/// Derive the default JWKS URL from a Descope project id.
#[must_use]
pub fn default_jwks_url(project_id: &str) -> String {
    format!("https://api.descope.com/{project_id}/.well-known/jwks.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_jwks_url_embeds_project_id() {
        // GIVEN/WHEN: a project id
        let url = default_jwks_url("P2abc123");

        // THEN: the standard discovery path is produced
        assert_eq!(
            url,
            "https://api.descope.com/P2abc123/.well-known/jwks.json"
        );
    }

    #[test]
    fn zero_ttl_entry_is_immediately_stale() {
        let cached = CachedJwks {
            keys: JwkSet { keys: Vec::new() },
            fetched_at: Instant::now(),
            ttl: Duration::ZERO,
        };
        assert!(cached.is_stale());
    }

    #[test]
    fn fresh_entry_is_not_stale() {
        let cached = CachedJwks {
            keys: JwkSet { keys: Vec::new() },
            fetched_at: Instant::now(),
            ttl: Duration::from_secs(3600),
        };
        assert!(!cached.is_stale());
    }
}
