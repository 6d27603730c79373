//! User records — atomic upsert keyed by external identity.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use tokio::sync::Mutex;
use tracing::debug;

use crate::Result;
use crate::auth::descope::ExternalIdentity;

/// Persistent user entity, one row per external subject identifier.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    /// External subject identifier (unique, immutable identity key).
    pub descope_user_id: String,
    /// Email at most recent login.
    pub email: String,
    /// Display name (optional).
    pub name: Option<String>,
    /// First successful login.
    pub created_at: DateTime<Utc>,
    /// Most recent successful login.
    pub last_login_at: DateTime<Utc>,
}

/// Trait abstracting the user storage backend.
///
/// Implementations must be `Send + Sync` because the store is shared across
/// request tasks.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Create or refresh the user record for a verified identity.
    ///
    /// Must be a single atomic insert-or-update: concurrent logins for the
    /// same subject never create duplicates, and the loser of the race
    /// advances `last_login_at` rather than inserting.
    async fn upsert(&self, identity: &ExternalIdentity) -> Result<UserRecord>;

    /// Number of stored user records.
    async fn count(&self) -> Result<i64>;
}

/// Postgres-backed user store.
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a store over the shared pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn upsert(&self, identity: &ExternalIdentity) -> Result<UserRecord> {
        // Native upsert: one statement, atomic in Postgres. A read-then-write
        // pair would race under concurrent logins for the same subject.
        let record = sqlx::query_as::<_, UserRecord>(
            r"
            INSERT INTO users (descope_user_id, email, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (descope_user_id)
            DO UPDATE SET last_login_at = CURRENT_TIMESTAMP
            RETURNING descope_user_id, email, name, created_at, last_login_at
            ",
        )
        .bind(&identity.subject)
        .bind(&identity.email)
        .bind(&identity.name)
        .fetch_one(&self.pool)
        .await?;

        debug!(subject = %record.descope_user_id, "User record upserted");
        Ok(record)
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// In-memory user store with the same upsert contract, for offline tests.
#[derive(Default)]
pub struct MemoryUserStore {
    records: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store behind an `Arc`, ready to share with a router.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert(&self, identity: &ExternalIdentity) -> Result<UserRecord> {
        let mut records = self.records.lock().await;
        let now = Utc::now();

        let record = records
            .entry(identity.subject.clone())
            .and_modify(|r| r.last_login_at = now)
            .or_insert_with(|| UserRecord {
                descope_user_id: identity.subject.clone(),
                email: identity.email.clone(),
                name: identity.name.clone(),
                created_at: now,
                last_login_at: now,
            });

        Ok(record.clone())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.records.lock().await.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(subject: &str, email: &str) -> ExternalIdentity {
        ExternalIdentity {
            subject: subject.to_string(),
            email: email.to_string(),
            name: Some("Test User".to_string()),
            expires_at: u64::MAX,
        }
    }

    #[tokio::test]
    async fn first_upsert_creates_record_with_equal_timestamps() {
        // GIVEN: an empty store
        let store = MemoryUserStore::new();

        // WHEN: first login
        let record = store.upsert(&identity("usr_123", "a@b.com")).await.unwrap();

        // THEN: first-seen == last-seen
        assert_eq!(record.descope_user_id, "usr_123");
        assert_eq!(record.email, "a@b.com");
        assert_eq!(record.created_at, record.last_login_at);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn repeat_upsert_advances_last_login_only() {
        // GIVEN: a store with one existing record
        let store = MemoryUserStore::new();
        let first = store.upsert(&identity("usr_123", "a@b.com")).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        // WHEN: the same subject logs in again
        let second = store.upsert(&identity("usr_123", "a@b.com")).await.unwrap();

        // THEN: same row, created_at stable, last_login_at advanced
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_login_at > first.last_login_at);
    }

    #[tokio::test]
    async fn concurrent_upserts_for_one_subject_yield_one_record() {
        // GIVEN: many concurrent logins for the same subject
        let store = Arc::new(MemoryUserStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.upsert(&identity("usr_123", "a@b.com")).await
            }));
        }

        // WHEN: all complete
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // THEN: exactly one record exists
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn distinct_subjects_get_distinct_records() {
        let store = MemoryUserStore::new();
        store.upsert(&identity("usr_1", "a@b.com")).await.unwrap();
        store.upsert(&identity("usr_2", "c@d.com")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
