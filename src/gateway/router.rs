//! HTTP router and liveness handlers

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_cookies::CookieManagerLayer;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use super::cors::{self, CorsPolicy};
use super::students;
use crate::auth::{AuthService, guard::session_guard, handler};
use crate::store::StudentStore;

/// Shared application state
pub struct AppState {
    /// Authentication path: verifier + session signer + user store
    pub auth: AuthService,
    /// Students collection store
    pub students: Arc<dyn StudentStore>,
}

/// Create the router
pub fn create_router(state: Arc<AppState>, policy: Arc<CorsPolicy>) -> Router {
    let signer = Arc::clone(&state.auth.sessions);

    // Routes gated on a verified session cookie
    let protected = Router::new()
        .route("/api/user-data", get(handler::user_data))
        .route(
            "/api/students",
            get(students::list).post(students::create),
        )
        .route(
            "/api/students/{id}",
            get(students::get_one)
                .put(students::update)
                .delete(students::remove),
        )
        .layer(middleware::from_fn_with_state(signer, session_guard));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        // The callback must be unauthenticated — it IS the authentication step
        .route("/api/auth/descope-sso-callback", post(handler::sso_callback))
        .route("/api/logout", post(handler::logout))
        .merge(protected)
        .layer(cors::cors_layer(&policy))
        // Origin guard sits outside the CORS layer so a disallowed preflight
        // gets an explicit 403 instead of a header-less 200
        .layer(middleware::from_fn_with_state(policy, cors::origin_guard))
        .layer(CookieManagerLayer::new())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe — literal `OK`, no auth.
async fn health_handler() -> &'static str {
    "OK"
}

/// Root banner.
async fn root_handler() -> &'static str {
    "SSO session gateway is running"
}
