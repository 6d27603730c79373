//! Persistent storage — pool setup, schema bootstrap, and store traits.
//!
//! The [`UserStore`] and [`StudentStore`] traits abstract over storage
//! backends. Production uses the Postgres implementations over a shared
//! `sqlx` pool; the in-memory twins back offline tests.

pub mod students;
pub mod users;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::Result;
use crate::config::DatabaseConfig;

pub use students::{MemoryStudentStore, NewStudent, PgStudentStore, Student, StudentStore};
pub use users::{MemoryUserStore, PgUserStore, UserRecord, UserStore};

/// Connect to Postgres with the configured pool limits.
///
/// # Errors
///
/// Returns [`crate::Error::Storage`] if the pool cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await?;

    info!(max_connections = config.max_connections, "Database pool ready");
    Ok(pool)
}

/// Create the `users` and `students` tables if they do not exist.
///
/// Runs once at process startup; idempotent, never part of steady-state
/// request handling.
///
/// # Errors
///
/// Returns [`crate::Error::Storage`] if a DDL statement fails.
pub async fn bootstrap_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS users (
            descope_user_id VARCHAR(255) PRIMARY KEY,
            email VARCHAR(255) NOT NULL,
            name VARCHAR(255),
            created_at TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP,
            last_login_at TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS students (
            id SERIAL PRIMARY KEY,
            first_name VARCHAR(255) NOT NULL,
            last_name VARCHAR(255) NOT NULL,
            email VARCHAR(255) NOT NULL UNIQUE,
            major VARCHAR(255),
            enrollment_date DATE DEFAULT CURRENT_DATE
        )
        ",
    )
    .execute(pool)
    .await?;

    info!("Database schema ready");
    Ok(())
}
