//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use super::cors::CorsPolicy;
use super::router::{AppState, create_router};
use crate::auth::AuthService;
use crate::config::Config;
use crate::store::{self, PgStudentStore, PgUserStore};
use crate::{Error, Result};

/// SSO gateway server
pub struct Gateway {
    config: Config,
    state: Arc<AppState>,
    policy: Arc<CorsPolicy>,
}

impl Gateway {
    /// Create a new gateway: connect the pool, bootstrap the schema, and
    /// wire the authentication path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or the schema
    /// bootstrap fails.
    pub async fn new(config: Config) -> Result<Self> {
        let pool = store::connect(&config.database).await?;
        store::bootstrap_schema(&pool).await?;

        let users = Arc::new(PgUserStore::new(pool.clone()));
        let auth = AuthService::new(&config.auth, users);

        let state = Arc::new(AppState {
            auth,
            students: Arc::new(PgStudentStore::new(pool)),
        });
        let policy = Arc::new(CorsPolicy::new(config.cors.resolved_origins()));

        Ok(Self {
            config,
            state,
            policy,
        })
    }

    /// Run the gateway
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the server fails.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let app = create_router(self.state, Arc::clone(&self.policy));

        let listener = TcpListener::bind(addr).await?;

        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(origins = ?self.policy.origins(), "CORS allow-list");
        info!("Login endpoint:  POST /api/auth/descope-sso-callback");
        info!("Protected data:  GET  /api/user-data");
        info!("Students CRUD:   /api/students");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            tracing::error!("Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
