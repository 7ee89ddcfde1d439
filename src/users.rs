//! User roster endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::db::models::User;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        email: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        crn: row.get(3)?,
        group_id: row.get(4)?,
        current_page: row.get(5)?,
        role: row.get(6)?,
    })
}

const USER_COLUMNS: &str = "email, first_name, last_name, crn, group_id, current_page, role";

/// GET /api/users/{email}
pub async fn get_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<User>> {
    let db = state.db.clone();
    let lookup = email.clone();

    let user = tokio::task::spawn_blocking(move || -> Result<Option<User>, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        let result = conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            [&lookup],
            user_from_row,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ApiError::db("query user", e)),
        }
    })
    .await??;

    user.map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No user: {}", email)))
}

/// GET /api/classes/{crn}/students
pub async fn list_class_students(
    State(state): State<AppState>,
    Path(crn): Path<i64>,
) -> ApiResult<Json<Vec<User>>> {
    let db = state.db.clone();

    let students = tokio::task::spawn_blocking(move || -> Result<Vec<User>, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM users WHERE crn = ?1 AND role = 'student' ORDER BY group_id, email",
                USER_COLUMNS
            ))
            .map_err(|e| ApiError::db("prepare roster query", e))?;
        let rows = stmt
            .query_map([crn], user_from_row)
            .map_err(|e| ApiError::db("query roster", e))?;
        rows.collect::<rusqlite::Result<Vec<User>>>()
            .map_err(|e| ApiError::db("read roster rows", e))
    })
    .await??;

    Ok(Json(students))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePageRequest {
    pub page: String,
}

/// PUT /api/users/{email}/page — update the student's navigation pointer.
pub async fn update_current_page(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(req): Json<UpdatePageRequest>,
) -> ApiResult<StatusCode> {
    let db = state.db.clone();

    let updated = tokio::task::spawn_blocking(move || -> Result<usize, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        conn.execute(
            "UPDATE users SET current_page = ?1 WHERE email = ?2",
            rusqlite::params![req.page, email],
        )
        .map_err(|e| ApiError::db("update current page", e))
    })
    .await??;

    if updated == 0 {
        return Err(ApiError::not_found("No such user"));
    }
    Ok(StatusCode::NO_CONTENT)
}
