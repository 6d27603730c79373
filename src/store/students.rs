//! Students collection — CRUD queries behind the [`StudentStore`] trait.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use tokio::sync::Mutex;

use crate::{Error, Result};

/// A student row. `enrollment_date` serializes as an ISO-8601 date string.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    /// Row id (serial primary key).
    pub id: i32,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Email, unique across the collection.
    pub email: String,
    /// Declared major (optional).
    pub major: Option<String>,
    /// Enrollment date, defaults to the insertion date.
    pub enrollment_date: NaiveDate,
}

/// Fields accepted when creating or updating a student.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    /// Given name (required).
    #[serde(default)]
    pub first_name: String,
    /// Family name (required).
    #[serde(default)]
    pub last_name: String,
    /// Email (required, unique).
    #[serde(default)]
    pub email: String,
    /// Declared major (optional).
    #[serde(default)]
    pub major: Option<String>,
}

impl NewStudent {
    /// Required-field check used by the create and update handlers.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.first_name.is_empty() && !self.last_name.is_empty() && !self.email.is_empty()
    }
}

/// Trait abstracting the students storage backend.
#[async_trait::async_trait]
pub trait StudentStore: Send + Sync + 'static {
    /// All students ordered by id.
    async fn list(&self) -> Result<Vec<Student>>;

    /// One student by id, `None` if absent.
    async fn get(&self, id: i32) -> Result<Option<Student>>;

    /// Insert a student. Fails with [`Error::Conflict`] on a duplicate email.
    async fn create(&self, new: &NewStudent) -> Result<Student>;

    /// Update a student. `None` if absent; [`Error::Conflict`] on a duplicate
    /// email.
    async fn update(&self, id: i32, new: &NewStudent) -> Result<Option<Student>>;

    /// Delete a student, returning the deleted id, `None` if absent.
    async fn delete(&self, id: i32) -> Result<Option<i32>>;
}

/// Postgres-backed student store.
pub struct PgStudentStore {
    pool: PgPool,
}

impl PgStudentStore {
    /// Create a store over the shared pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const STUDENT_COLUMNS: &str = "id, first_name, last_name, email, major, enrollment_date";

/// Map a unique-constraint violation to [`Error::Conflict`]; everything else
/// stays a storage error.
fn map_conflict_error(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return Error::Conflict("email already exists".to_string());
        }
    }
    Error::Storage(e)
}

#[async_trait::async_trait]
impl StudentStore for PgStudentStore {
    async fn list(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: i32) -> Result<Option<Student>> {
        let row = sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create(&self, new: &NewStudent) -> Result<Student> {
        sqlx::query_as::<_, Student>(&format!(
            "INSERT INTO students (first_name, last_name, email, major)
             VALUES ($1, $2, $3, $4)
             RETURNING {STUDENT_COLUMNS}"
        ))
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.major)
        .fetch_one(&self.pool)
        .await
        .map_err(map_conflict_error)
    }

    async fn update(&self, id: i32, new: &NewStudent) -> Result<Option<Student>> {
        sqlx::query_as::<_, Student>(&format!(
            "UPDATE students
             SET first_name = $1, last_name = $2, email = $3, major = $4
             WHERE id = $5
             RETURNING {STUDENT_COLUMNS}"
        ))
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.major)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_conflict_error)
    }

    async fn delete(&self, id: i32) -> Result<Option<i32>> {
        let row: Option<(i32,)> = sqlx::query_as("DELETE FROM students WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(deleted,)| deleted))
    }
}

/// In-memory student store with the same contract, for offline tests.
#[derive(Default)]
pub struct MemoryStudentStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: i32,
    rows: Vec<Student>,
}

impl MemoryStudentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StudentStore for MemoryStudentStore {
    async fn list(&self) -> Result<Vec<Student>> {
        Ok(self.inner.lock().await.rows.clone())
    }

    async fn get(&self, id: i32) -> Result<Option<Student>> {
        Ok(self
            .inner
            .lock()
            .await
            .rows
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn create(&self, new: &NewStudent) -> Result<Student> {
        let mut inner = self.inner.lock().await;
        if inner.rows.iter().any(|s| s.email == new.email) {
            return Err(Error::Conflict("email already exists".to_string()));
        }

        inner.next_id += 1;
        let student = Student {
            id: inner.next_id,
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            email: new.email.clone(),
            major: new.major.clone(),
            enrollment_date: Utc::now().date_naive(),
        };
        inner.rows.push(student.clone());
        Ok(student)
    }

    async fn update(&self, id: i32, new: &NewStudent) -> Result<Option<Student>> {
        let mut inner = self.inner.lock().await;
        if inner.rows.iter().any(|s| s.email == new.email && s.id != id) {
            return Err(Error::Conflict("email already exists".to_string()));
        }

        let Some(student) = inner.rows.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        student.first_name = new.first_name.clone();
        student.last_name = new.last_name.clone();
        student.email = new.email.clone();
        student.major = new.major.clone();
        Ok(Some(student.clone()))
    }

    async fn delete(&self, id: i32) -> Result<Option<i32>> {
        let mut inner = self.inner.lock().await;
        let before = inner.rows.len();
        inner.rows.retain(|s| s.id != id);
        Ok((inner.rows.len() < before).then_some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_student(email: &str) -> NewStudent {
        NewStudent {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            major: Some("Mathematics".to_string()),
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = MemoryStudentStore::new();
        let a = store.create(&new_student("a@uni.edu")).await.unwrap();
        let b = store.create(&new_student("b@uni.edu")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn duplicate_email_on_create_is_a_conflict() {
        // GIVEN: a stored student
        let store = MemoryStudentStore::new();
        store.create(&new_student("a@uni.edu")).await.unwrap();

        // WHEN: another student reuses the email
        let err = store.create(&new_student("a@uni.edu")).await.unwrap_err();

        // THEN: conflict, and the collection is unchanged
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_rejects_email_taken_by_another_row() {
        let store = MemoryStudentStore::new();
        store.create(&new_student("a@uni.edu")).await.unwrap();
        let b = store.create(&new_student("b@uni.edu")).await.unwrap();

        let err = store
            .update(b.id, &new_student("a@uni.edu"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn update_keeps_own_email_without_conflict() {
        let store = MemoryStudentStore::new();
        let a = store.create(&new_student("a@uni.edu")).await.unwrap();

        let updated = store
            .update(a.id, &new_student("a@uni.edu"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.email, "a@uni.edu");
    }

    #[tokio::test]
    async fn get_and_delete_missing_rows_return_none() {
        let store = MemoryStudentStore::new();
        assert!(store.get(99).await.unwrap().is_none());
        assert!(store.delete(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_returns_the_removed_id() {
        let store = MemoryStudentStore::new();
        let a = store.create(&new_student("a@uni.edu")).await.unwrap();

        assert_eq!(store.delete(a.id).await.unwrap(), Some(a.id));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn is_complete_requires_all_three_fields() {
        let mut s = new_student("a@uni.edu");
        assert!(s.is_complete());

        s.email = String::new();
        assert!(!s.is_complete());
    }
}
