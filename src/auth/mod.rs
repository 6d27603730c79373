//! Token exchange and session verification.
//!
//! This module implements the gateway's core authentication path:
//!
//! 1. **Token exchange**: accept a Descope session JWT
//!    (`POST /api/auth/descope-sso-callback`), verify it against the cached
//!    signing-key set, upsert the user record, and set a first-party
//!    HTTP-only session cookie.
//!
//! 2. **Session verification**: the [`guard`] middleware verifies the cookie
//!    on every protected request and injects the session claims.
//!
//! 3. **Logout**: unconditionally instructs the client to discard the
//!    cookie; idempotent regardless of prior session state.
//!
//! There is no server-side revocation list: a stolen-but-unexpired
//! credential stays valid until its expiry instant.

pub mod descope;
pub mod guard;
pub mod handler;
pub mod jwks;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AuthConfig;
use crate::store::UserStore;

pub use descope::{DescopeVerifier, ExternalIdentity, VerifyError};
pub use jwks::{KeyCache, KeyFetchError, default_jwks_url};
pub use session::{SessionClaims, SessionError, SessionSigner};

/// Central coordinator for the authentication path.
///
/// Holds the external verifier, the first-party session signer, and the
/// user store; the HTTP handlers in [`handler`] orchestrate them.
pub struct AuthService {
    /// External token verifier (signing-key cache + signature verification)
    pub verifier: DescopeVerifier,
    /// First-party session credential issuer/verifier
    pub sessions: Arc<SessionSigner>,
    /// User upsert service
    pub users: Arc<dyn UserStore>,
}

impl AuthService {
    /// Create the service from configuration and a user store.
    #[must_use]
    pub fn new(config: &AuthConfig, users: Arc<dyn UserStore>) -> Self {
        let jwks_url = config
            .jwks_url
            .clone()
            .unwrap_or_else(|| default_jwks_url(&config.descope_project_id));

        let keys = KeyCache::new(
            jwks_url,
            Duration::from_secs(config.jwks_ttl_secs),
            Duration::from_secs(config.jwks_fetch_timeout_secs),
        );

        Self {
            verifier: DescopeVerifier::new(keys),
            sessions: Arc::new(SessionSigner::new(
                &config.session_secret,
                Duration::from_secs(config.session_ttl_secs),
            )),
            users,
        }
    }
}
