//! Session-guard middleware for protected routes.
//!
//! Reads the `sessionToken` cookie, verifies it, and injects the verified
//! [`SessionClaims`] for downstream handlers. A missing cookie or a failed
//! verification short-circuits to 401 before the handler runs.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;
use tracing::{debug, warn};

use super::handler::{SESSION_COOKIE, error_response};
use super::{SessionError, SessionSigner};

/// Authentication middleware for the guarded-access track.
pub async fn session_guard(
    axum::extract::State(signer): axum::extract::State<Arc<SessionSigner>>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(cookie) = cookies.get(SESSION_COOKIE) else {
        warn!(path = %path, "Missing session cookie");
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized");
    };

    match signer.verify(cookie.value()) {
        Ok(claims) => {
            debug!(subject = %claims.sub, path = %path, "Session verified");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(SessionError::Expired) => {
            warn!(path = %path, "Session credential expired");
            error_response(
                StatusCode::UNAUTHORIZED,
                "session_expired",
                "Session expired, please log in again.",
            )
        }
        Err(_) => {
            warn!(path = %path, "Session credential invalid");
            error_response(
                StatusCode::UNAUTHORIZED,
                "session_invalid",
                "Invalid session token.",
            )
        }
    }
}
