//! Cross-origin policy — fixed allow-list with explicit deny.
//!
//! Two cooperating pieces:
//!
//! - [`cors_layer`] echoes the exact matching origin in
//!   `Access-Control-Allow-Origin` and permits credentialed requests for
//!   allow-listed origins.
//! - [`origin_guard`] runs outside the CORS layer and refuses preflight and
//!   state-changing requests from unlisted origins with 403, rather than
//!   silently dropping the CORS headers.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::auth::handler::error_response;

/// The fixed origin allow-list.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Vec<String>,
}

impl CorsPolicy {
    /// Create a policy from resolved origin strings.
    #[must_use]
    pub fn new(origins: Vec<String>) -> Self {
        Self { origins }
    }

    /// Whether `origin` is in the allow-list (exact match).
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    /// The allow-listed origins.
    #[must_use]
    pub fn origins(&self) -> &[String] {
        &self.origins
    }
}

/// Build the CORS layer for the allow-listed origins.
///
/// `AllowOrigin::list` mirrors back the exact matching origin, which is
/// required for credentialed requests (a wildcard is rejected by browsers
/// when cookies are involved).
#[must_use]
pub fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    let origins: Vec<HeaderValue> = policy
        .origins()
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Refuse preflight and state-changing requests from unlisted origins.
///
/// Requests without an `Origin` header (same-origin, curl, probes) pass
/// through untouched, as do cross-origin `GET`s — those carry no CORS grant
/// anyway because the inner layer withholds the allow-origin header.
pub async fn origin_guard(
    axum::extract::State(policy): axum::extract::State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(origin) = origin {
        let state_changing = matches!(
            *request.method(),
            Method::OPTIONS | Method::POST | Method::PUT | Method::DELETE
        );

        if state_changing && !policy.is_allowed(&origin) {
            warn!(origin = %origin, path = %request.uri().path(), "Origin not in allow-list");
            return error_response(
                StatusCode::FORBIDDEN,
                "origin_not_allowed",
                "Origin not allowed",
            );
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_allowed_matches_exactly() {
        // GIVEN: a two-origin allow-list
        let policy = CorsPolicy::new(vec![
            "http://localhost:3000".to_string(),
            "https://app.example.com".to_string(),
        ]);

        // THEN: exact matches pass, everything else is refused
        assert!(policy.is_allowed("http://localhost:3000"));
        assert!(policy.is_allowed("https://app.example.com"));
        assert!(!policy.is_allowed("https://evil.example"));
        assert!(!policy.is_allowed("http://localhost:3000/"));
        assert!(!policy.is_allowed("http://localhost:30000"));
    }

    #[test]
    fn empty_allow_list_refuses_everything() {
        let policy = CorsPolicy::new(Vec::new());
        assert!(!policy.is_allowed("http://localhost:3000"));
    }
}
