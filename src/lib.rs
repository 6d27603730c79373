//! SSO Session Gateway
//!
//! A session-authentication gateway in front of a relational data store.
//! Descope-issued SSO tokens are exchanged for a first-party session
//! credential (HTTP-only cookie), which authorizes access to protected
//! resources and a small "students" CRUD collection.
//!
//! # Flow
//!
//! 1. The frontend completes its Descope login and POSTs the resulting JWT
//!    to `/api/auth/descope-sso-callback`.
//! 2. The gateway verifies the JWT against Descope's published signing keys
//!    (fetched and cached with a freshness window).
//! 3. The user record is upserted atomically, a first-party HS256 session
//!    credential is minted, and it is set as an HTTP-only cookie.
//! 4. Subsequent requests to protected routes are gated on verification of
//!    that cookie; logout deletes it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod store;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
