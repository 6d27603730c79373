//! HTTP handlers for the students collection.
//!
//! All routes sit behind the session guard; status mapping is 400 for an
//! incomplete body, 404 for a missing row, 409 for a duplicate email, and
//! 500 for any other storage failure.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::error;

use super::AppState;
use crate::Error;
use crate::auth::handler::error_response;
use crate::store::NewStudent;

/// `GET /api/students` — all students ordered by id.
pub async fn list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.students.list().await {
        Ok(rows) => (StatusCode::OK, Json(json!(rows))).into_response(),
        Err(e) => storage_error("listing students", &e),
    }
}

/// `GET /api/students/{id}` — one student, 404 if absent.
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match state.students.get(id).await {
        Ok(Some(student)) => (StatusCode::OK, Json(json!(student))).into_response(),
        Ok(None) => not_found(),
        Err(e) => storage_error("fetching student", &e),
    }
}

/// `POST /api/students` — create, 201 with the row.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewStudent>,
) -> impl IntoResponse {
    if !body.is_complete() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "First name, last name, and email are required.",
        );
    }

    match state.students.create(&body).await {
        Ok(student) => (StatusCode::CREATED, Json(json!(student))).into_response(),
        Err(Error::Conflict(_)) => duplicate_email(),
        Err(e) => storage_error("adding student", &e),
    }
}

/// `PUT /api/students/{id}` — full update, 404 if absent.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(body): Json<NewStudent>,
) -> impl IntoResponse {
    if !body.is_complete() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "First name, last name, and email are required.",
        );
    }

    match state.students.update(id, &body).await {
        Ok(Some(student)) => (StatusCode::OK, Json(json!(student))).into_response(),
        Ok(None) => not_found(),
        Err(Error::Conflict(_)) => duplicate_email(),
        Err(e) => storage_error("updating student", &e),
    }
}

/// `DELETE /api/students/{id}` — 200 with the deleted id, 404 if absent.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match state.students.delete(id).await {
        Ok(Some(deleted_id)) => (
            StatusCode::OK,
            Json(json!({
                "message": "Student deleted successfully",
                "deleted_id": deleted_id,
            })),
        )
            .into_response(),
        Ok(None) => not_found(),
        Err(e) => storage_error("deleting student", &e),
    }
}

fn not_found() -> axum::response::Response {
    error_response(StatusCode::NOT_FOUND, "not_found", "Student not found")
}

fn duplicate_email() -> axum::response::Response {
    error_response(StatusCode::CONFLICT, "conflict", "Email already exists.")
}

fn storage_error(context: &str, e: &Error) -> axum::response::Response {
    error!(error = %e, "Error {context}");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "Internal server error",
    )
}
