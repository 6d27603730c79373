//! HTTP handlers for the authentication endpoints.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/auth/descope-sso-callback` | Exchange a Descope JWT for a session cookie |
//! | `POST` | `/api/logout` | Delete the session cookie |
//! | `GET`  | `/api/user-data` | Protected greeting (behind the session guard) |
//!
//! All failure bodies stay generic; the detail goes to the server log.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite, time::Duration as CookieDuration},
};
use tracing::{error, info, warn};

use super::{SessionClaims, VerifyError};
use crate::gateway::AppState;

/// Name of the first-party session cookie.
pub const SESSION_COOKIE: &str = "sessionToken";

/// Login request body posted by the frontend after its Descope flow.
#[derive(Debug, Deserialize)]
pub struct SsoCallbackRequest {
    /// The Descope session JWT.
    #[serde(rename = "sessionToken", default)]
    pub session_token: String,
}

/// Build the session cookie carrying `credential`, valid for `max_age`.
///
/// HttpOnly, Secure, and SameSite=Lax are non-negotiable: the credential
/// must never be readable from script or sent over plain HTTP.
fn build_session_cookie(credential: String, max_age: std::time::Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, credential))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(max_age.as_secs() as i64))
        .build()
}

/// Build a removal cookie with the same security attributes as the login
/// cookie, so the browser matches and deletes it.
fn build_removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE)
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::ZERO)
        .build()
}

/// `POST /api/auth/descope-sso-callback` — exchange an external token for a
/// first-party session cookie.
pub async fn sso_callback(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(body): Json<SsoCallbackRequest>,
) -> impl IntoResponse {
    if body.session_token.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "No session token provided",
        );
    }

    // Verify the external token
    let identity = match state.auth.verifier.verify(&body.session_token).await {
        Ok(identity) => identity,
        Err(VerifyError::KeyFetch(e)) => {
            error!(error = %e, "Signing keys unavailable during login");
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "keys_unavailable",
                "Authentication temporarily unavailable",
            );
        }
        Err(e) => {
            warn!(error = %e, "External token verification failed");
            return error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Authentication failed",
            );
        }
    };

    // Create or refresh the user record
    let user = match state.auth.users.upsert(&identity).await {
        Ok(user) => user,
        Err(e) => {
            error!(error = %e, subject = %identity.subject, "User upsert failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Database operation failed",
            );
        }
    };

    // Mint the first-party session credential
    let credential = match state.auth.sessions.issue(&identity.subject, &identity.email) {
        Ok(credential) => credential,
        Err(e) => {
            error!(error = %e, "Session credential signing failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "session_error",
                "An internal server error occurred",
            );
        }
    };

    cookies.add(build_session_cookie(credential, state.auth.sessions.ttl()));

    info!(subject = %user.descope_user_id, "Login successful");
    (
        StatusCode::OK,
        Json(json!({
            "message": "Login successful",
            "email": user.email,
            "name": user.name,
        })),
    )
        .into_response()
}

/// `POST /api/logout` — delete the session cookie. Idempotent: succeeds
/// whether or not a session existed.
pub async fn logout(cookies: Cookies) -> impl IntoResponse {
    cookies.add(build_removal_cookie());

    (
        StatusCode::OK,
        Json(json!({"message": "Successfully logged out."})),
    )
}

/// `GET /api/user-data` — protected greeting; the guard has already
/// verified the cookie and injected the claims.
pub async fn user_data(Extension(claims): Extension<SessionClaims>) -> impl IntoResponse {
    Json(json!({
        "message": format!("Hello, {}! This is protected data.", claims.email)
    }))
}

/// Create a JSON error response.
pub(crate) fn error_response(
    status: StatusCode,
    error: &str,
    message: &str,
) -> axum::response::Response {
    (status, Json(json!({"error": error, "message": message}))).into_response()
}
